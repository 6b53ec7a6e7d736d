use chrono::{DateTime, Utc};
use common::BloodRank;
use common::scoring::BloodBonus;
use serde::{Deserialize, Serialize};

/// Point-in-time standings of one game.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ScoreboardModel {
    #[schema(example = 1)]
    pub game_id: i32,
    /// When this snapshot was computed.
    pub updated_at: DateTime<Utc>,
    pub blood_bonus: BloodBonus,
    pub no_bonus: bool,
    pub challenges: Vec<ChallengeSummary>,
    /// Teams in rank order.
    pub items: Vec<ScoreboardItem>,
    /// Global top-10 first, then one entry per organization.
    pub timelines: Vec<TopTimeline>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ChallengeSummary {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = "pwn-1")]
    pub title: String,
    #[schema(example = "Pwn")]
    pub category: String,
    /// Current score before blood bonus.
    #[schema(example = 500)]
    pub score: i32,
    pub solved_count: i32,
    /// Up to three earliest solvers.
    pub bloods: Vec<Blood>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Blood {
    pub participation_id: i32,
    pub team_name: String,
    pub submit_time: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ScoreboardItem {
    #[schema(example = 1)]
    pub rank: u32,
    pub participation_id: i32,
    pub team_id: i32,
    pub team_name: String,
    pub organization: Option<String>,
    /// Rank among teams of the same organization.
    pub organization_rank: Option<u32>,
    #[schema(example = 1545)]
    pub score: i64,
    pub solved_count: u32,
    /// Time of the team's latest counted solve.
    pub last_submission_time: Option<DateTime<Utc>>,
    pub challenges: Vec<ChallengeItem>,
}

/// One team's standing on one challenge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ChallengeItem {
    pub challenge_id: i32,
    pub solved: bool,
    pub rank: BloodRank,
    /// Awarded score including any blood bonus.
    pub score: i32,
    pub submit_time: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TopTimeline {
    /// `None` for the global ranking.
    pub organization: Option<String>,
    pub teams: Vec<TeamTimeline>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TeamTimeline {
    pub participation_id: i32,
    pub team_name: String,
    /// Cumulative score after each solve, in time order.
    pub points: Vec<TimelinePoint>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TimelinePoint {
    pub time: DateTime<Utc>,
    pub score: i64,
}
