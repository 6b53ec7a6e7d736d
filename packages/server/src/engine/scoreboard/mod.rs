pub mod builder;
pub mod model;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::{AnswerStatus, ParticipationStatus};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::cache::{CacheStore, CacheStoreExt};
use crate::entity::{challenge, game, game_instance, participation, submission, team};

use super::error::EngineError;
use builder::{BoardInput, ChallengeFacts, GameFacts, SolveFacts, TeamFacts, build_scoreboard};
pub use model::ScoreboardModel;

pub fn cache_key(game_id: i32) -> String {
    format!("_ScoreBoard_{game_id}")
}

/// Key of the marker rewritten on every invalidation of a game's scoreboard.
pub fn generation_key(game_id: i32) -> String {
    format!("_ScoreBoardGeneration_{game_id}")
}

/// Compute a fresh scoreboard from the database.
///
/// Rows are fetched with one query per table; nothing is queried per team.
#[instrument(skip(db))]
pub async fn generate_scoreboard(
    db: &DatabaseConnection,
    game_id: i32,
) -> Result<ScoreboardModel, EngineError> {
    let game = game::Entity::find_by_id(game_id)
        .one(db)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("game {game_id}")))?;

    let challenges = challenge::Entity::find()
        .filter(challenge::Column::GameId.eq(game_id))
        .filter(challenge::Column::IsEnabled.eq(true))
        .order_by_asc(challenge::Column::Id)
        .all(db)
        .await?;
    let challenge_ids: Vec<i32> = challenges.iter().map(|c| c.id).collect();

    let participations = participation::Entity::find()
        .filter(participation::Column::GameId.eq(game_id))
        .filter(participation::Column::Status.eq(ParticipationStatus::Accepted))
        .order_by_asc(participation::Column::Id)
        .all(db)
        .await?;

    let teams = team::Entity::find()
        .filter(team::Column::Id.is_in(participations.iter().map(|p| p.team_id)))
        .all(db)
        .await?;

    let instances: Vec<(i32, i32)> = game_instance::Entity::find()
        .select_only()
        .column(game_instance::Column::ParticipationId)
        .column(game_instance::Column::ChallengeId)
        .filter(game_instance::Column::ChallengeId.is_in(challenge_ids.clone()))
        .into_tuple()
        .all(db)
        .await?;

    let solves: Vec<(i32, i32, DateTime<Utc>)> = submission::Entity::find()
        .select_only()
        .column(submission::Column::ParticipationId)
        .column(submission::Column::ChallengeId)
        .column_as(
            Expr::from(Func::min(Expr::col(submission::Column::SubmitTime))),
            "first_accepted",
        )
        .filter(submission::Column::GameId.eq(game_id))
        .filter(submission::Column::Status.eq(AnswerStatus::Accepted))
        .filter(submission::Column::SubmitTime.lt(game.end_time))
        .filter(submission::Column::ChallengeId.is_in(challenge_ids))
        .group_by(submission::Column::ParticipationId)
        .group_by(submission::Column::ChallengeId)
        .into_tuple()
        .all(db)
        .await?;

    let team_names: std::collections::HashMap<i32, String> =
        teams.into_iter().map(|t| (t.id, t.name)).collect();

    let input = BoardInput {
        game: GameFacts {
            id: game.id,
            end_time: game.end_time,
            no_bonus: game.no_bonus,
            blood_bonus: game.blood_bonus(),
            organizations: game.organization_names(),
        },
        challenges: challenges
            .iter()
            .map(|c| ChallengeFacts {
                id: c.id,
                title: c.title.clone(),
                category: c.category.clone(),
                score: c.current_score(),
            })
            .collect(),
        teams: participations
            .into_iter()
            .map(|p| TeamFacts {
                participation_id: p.id,
                team_id: p.team_id,
                team_name: team_names.get(&p.team_id).cloned().unwrap_or_default(),
                organization: p.organization,
            })
            .collect(),
        instances,
        solves: solves
            .into_iter()
            .map(|(participation_id, challenge_id, submit_time)| SolveFacts {
                participation_id,
                challenge_id,
                submit_time,
            })
            .collect(),
    };

    let board = build_scoreboard(input, Utc::now());
    info!(
        game_id,
        teams = board.items.len(),
        challenges = board.challenges.len(),
        "Scoreboard generated"
    );
    Ok(board)
}

/// Cached scoreboard access with explicit invalidation.
///
/// Each invalidation writes a fresh generation marker next to the cached board, in the same
/// store, so replicas sharing a Redis cache observe each other's invalidations. A snapshot
/// computed across an invalidation is returned to its caller but evicted again right after
/// being stored.
pub struct ScoreboardService {
    db: DatabaseConnection,
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
    generation_timeout: Duration,
    shutdown: CancellationToken,
}

impl ScoreboardService {
    pub fn new(
        db: DatabaseConnection,
        cache: Arc<dyn CacheStore>,
        ttl: Duration,
        generation_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            db,
            cache,
            ttl,
            generation_timeout,
            shutdown,
        }
    }

    async fn generation(&self, game_id: i32) -> Result<Option<String>, EngineError> {
        Ok(self.cache.get::<String>(&generation_key(game_id)).await?)
    }

    /// Return the cached scoreboard, generating it on a miss.
    #[instrument(skip(self))]
    pub async fn get(&self, game_id: i32) -> Result<ScoreboardModel, EngineError> {
        let key = cache_key(game_id);
        let started = self.generation(game_id).await?;

        let board: ScoreboardModel = self
            .cache
            .get_or_create(&key, self.ttl, || async {
                tokio::select! {
                    _ = self.shutdown.cancelled() => Err(EngineError::Cancelled),
                    res = tokio::time::timeout(
                        self.generation_timeout,
                        generate_scoreboard(&self.db, game_id),
                    ) => res.map_err(|_| EngineError::Cancelled)?,
                }
            })
            .await?;

        if self.generation(game_id).await? != started {
            debug!(game_id, "Scoreboard invalidated during generation, dropping cached copy");
            self.cache.remove(&key).await?;
        }

        Ok(board)
    }

    /// Drop the cached scoreboard. The next read regenerates it.
    #[instrument(skip(self))]
    pub async fn invalidate(&self, game_id: i32) -> Result<(), EngineError> {
        let marker = Uuid::new_v4().to_string();
        self.cache
            .set(&generation_key(game_id), &marker, self.ttl)
            .await?;
        self.cache.remove(&cache_key(game_id)).await?;
        debug!(game_id, "Scoreboard cache invalidated");
        Ok(())
    }
}
