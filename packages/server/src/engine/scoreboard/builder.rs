//! Pure scoreboard assembly from pre-fetched rows.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use common::BloodRank;
use common::scoring::BloodBonus;

use super::model::*;

/// Teams shown per timeline.
pub const TIMELINE_TOP_N: usize = 10;

#[derive(Debug, Clone)]
pub struct GameFacts {
    pub id: i32,
    pub end_time: DateTime<Utc>,
    pub no_bonus: bool,
    pub blood_bonus: BloodBonus,
    pub organizations: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ChallengeFacts {
    pub id: i32,
    pub title: String,
    pub category: String,
    /// Current score of the challenge.
    pub score: i32,
}

#[derive(Debug, Clone)]
pub struct TeamFacts {
    pub participation_id: i32,
    pub team_id: i32,
    pub team_name: String,
    pub organization: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct SolveFacts {
    pub participation_id: i32,
    pub challenge_id: i32,
    pub submit_time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BoardInput {
    pub game: GameFacts,
    /// Enabled challenges only.
    pub challenges: Vec<ChallengeFacts>,
    /// Accepted participations only.
    pub teams: Vec<TeamFacts>,
    /// (participation_id, challenge_id) pairs with an instance row.
    pub instances: Vec<(i32, i32)>,
    /// Accepted submissions. Need not be reduced to one per pair.
    pub solves: Vec<SolveFacts>,
}

fn classify(time: DateTime<Utc>, cutoffs: &[DateTime<Utc>]) -> BloodRank {
    cutoffs
        .iter()
        .position(|cutoff| time <= *cutoff)
        .map(|i| BloodRank::from_solve_order(i as i32 + 1))
        .unwrap_or(BloodRank::Normal)
}

/// Higher score first, then whoever reached it earlier, then participation id.
fn standing_order(a: &ScoreboardItem, b: &ScoreboardItem) -> Ordering {
    let last = |item: &ScoreboardItem| match item.last_submission_time {
        Some(t) => (0, t),
        None => (1, DateTime::<Utc>::MAX_UTC),
    };
    Reverse(a.score)
        .cmp(&Reverse(b.score))
        .then_with(|| last(a).cmp(&last(b)))
        .then_with(|| a.participation_id.cmp(&b.participation_id))
}

fn timeline(item: &ScoreboardItem) -> TeamTimeline {
    let mut solved: Vec<&ChallengeItem> = item.challenges.iter().filter(|c| c.solved).collect();
    solved.sort_by_key(|c| (c.submit_time, c.challenge_id));

    let mut total = 0i64;
    let points = solved
        .into_iter()
        .filter_map(|c| {
            total += c.score as i64;
            c.submit_time.map(|time| TimelinePoint { time, score: total })
        })
        .collect();

    TeamTimeline {
        participation_id: item.participation_id,
        team_name: item.team_name.clone(),
        points,
    }
}

pub fn build_scoreboard(input: BoardInput, now: DateTime<Utc>) -> ScoreboardModel {
    let BoardInput {
        game,
        challenges,
        teams,
        instances,
        solves,
    } = input;

    let team_by_id: HashMap<i32, &TeamFacts> =
        teams.iter().map(|t| (t.participation_id, t)).collect();
    let challenge_by_id: HashMap<i32, &ChallengeFacts> =
        challenges.iter().map(|c| (c.id, c)).collect();

    // Earliest counted solve per (participation, challenge).
    let mut best: HashMap<(i32, i32), DateTime<Utc>> = HashMap::new();
    for solve in solves {
        if solve.submit_time >= game.end_time
            || !team_by_id.contains_key(&solve.participation_id)
            || !challenge_by_id.contains_key(&solve.challenge_id)
        {
            continue;
        }
        best.entry((solve.participation_id, solve.challenge_id))
            .and_modify(|t| *t = (*t).min(solve.submit_time))
            .or_insert(solve.submit_time);
    }

    let mut solves_by_challenge: HashMap<i32, Vec<(DateTime<Utc>, i32)>> = HashMap::new();
    for (&(participation_id, challenge_id), &time) in &best {
        solves_by_challenge
            .entry(challenge_id)
            .or_default()
            .push((time, participation_id));
    }
    for list in solves_by_challenge.values_mut() {
        list.sort();
    }

    let cutoffs: HashMap<i32, Vec<DateTime<Utc>>> = solves_by_challenge
        .iter()
        .map(|(&cid, list)| (cid, list.iter().take(3).map(|(t, _)| *t).collect()))
        .collect();

    let summaries: Vec<ChallengeSummary> = challenges
        .iter()
        .map(|c| {
            let list = solves_by_challenge.get(&c.id);
            ChallengeSummary {
                id: c.id,
                title: c.title.clone(),
                category: c.category.clone(),
                score: c.score,
                solved_count: list.map_or(0, |l| l.len() as i32),
                bloods: list
                    .into_iter()
                    .flatten()
                    .take(3)
                    .map(|&(submit_time, participation_id)| Blood {
                        participation_id,
                        team_name: team_by_id
                            .get(&participation_id)
                            .map(|t| t.team_name.clone())
                            .unwrap_or_default(),
                        submit_time,
                    })
                    .collect(),
            }
        })
        .collect();

    let mut entitled: HashMap<i32, BTreeSet<i32>> = HashMap::new();
    for (participation_id, challenge_id) in instances.into_iter().chain(best.keys().copied()) {
        if team_by_id.contains_key(&participation_id)
            && challenge_by_id.contains_key(&challenge_id)
        {
            entitled
                .entry(participation_id)
                .or_default()
                .insert(challenge_id);
        }
    }

    let mut items: Vec<ScoreboardItem> = teams
        .iter()
        .map(|team| {
            let challenge_items: Vec<ChallengeItem> = entitled
                .get(&team.participation_id)
                .into_iter()
                .flatten()
                .map(|&challenge_id| {
                    let score = challenge_by_id[&challenge_id].score;
                    match best.get(&(team.participation_id, challenge_id)) {
                        Some(&time) => {
                            let rank = classify(time, &cutoffs[&challenge_id]);
                            ChallengeItem {
                                challenge_id,
                                solved: true,
                                rank,
                                score: game.blood_bonus.award(score, rank, game.no_bonus),
                                submit_time: Some(time),
                            }
                        }
                        None => ChallengeItem {
                            challenge_id,
                            solved: false,
                            rank: BloodRank::Unaccepted,
                            score: 0,
                            submit_time: None,
                        },
                    }
                })
                .collect();

            ScoreboardItem {
                rank: 0,
                participation_id: team.participation_id,
                team_id: team.team_id,
                team_name: team.team_name.clone(),
                organization: team.organization.clone(),
                organization_rank: None,
                score: challenge_items.iter().map(|c| c.score as i64).sum(),
                solved_count: challenge_items.iter().filter(|c| c.solved).count() as u32,
                last_submission_time: challenge_items.iter().filter_map(|c| c.submit_time).max(),
                challenges: challenge_items,
            }
        })
        .collect();

    items.sort_by(standing_order);

    let mut org_counters: HashMap<&str, u32> = HashMap::new();
    for (idx, item) in items.iter_mut().enumerate() {
        item.rank = idx as u32 + 1;
        let known = item
            .organization
            .as_deref()
            .and_then(|org| game.organizations.iter().find(|o| o.as_str() == org));
        if let Some(org) = known {
            let counter = org_counters.entry(org.as_str()).or_insert(0);
            *counter += 1;
            item.organization_rank = Some(*counter);
        }
    }

    let mut timelines = vec![TopTimeline {
        organization: None,
        teams: items.iter().take(TIMELINE_TOP_N).map(timeline).collect(),
    }];
    for org in &game.organizations {
        let teams: Vec<TeamTimeline> = items
            .iter()
            .filter(|i| i.organization.as_deref() == Some(org.as_str()))
            .take(TIMELINE_TOP_N)
            .map(timeline)
            .collect();
        timelines.push(TopTimeline {
            organization: Some(org.clone()),
            teams,
        });
    }

    ScoreboardModel {
        game_id: game.id,
        updated_at: now,
        blood_bonus: game.blood_bonus,
        no_bonus: game.no_bonus,
        challenges: summaries,
        items,
        timelines,
    }
}
