use common::ChallengeType;
use common::flag::{FlagSource, render_flag};
use sea_orm::sea_query::{LockBehavior, LockType};
use sea_orm::*;
use tracing::{debug, info, instrument, warn};

use crate::entity::{challenge, flag, game_instance};

use super::error::EngineError;

/// A materialized instance with its challenge and dispatched flag.
#[derive(Debug, Clone)]
pub struct LoadedInstance {
    pub instance: game_instance::Model,
    pub challenge: challenge::Model,
    /// `None` for static challenges.
    pub flag: Option<flag::Model>,
}

impl LoadedInstance {
    pub fn flag_text(&self) -> Option<&str> {
        self.flag.as_ref().map(|f| f.flag.as_str())
    }
}

/// Find the instance row for a (participation, challenge) pair.
pub(crate) async fn find_instance<C: ConnectionTrait>(
    conn: &C,
    participation_id: i32,
    challenge_id: i32,
) -> Result<Option<game_instance::Model>, DbErr> {
    game_instance::Entity::find()
        .filter(game_instance::Column::ParticipationId.eq(participation_id))
        .filter(game_instance::Column::ChallengeId.eq(challenge_id))
        .one(conn)
        .await
}

async fn find_enabled_challenge<C: ConnectionTrait>(
    conn: &C,
    challenge_id: i32,
) -> Result<challenge::Model, EngineError> {
    challenge::Entity::find_by_id(challenge_id)
        .filter(challenge::Column::IsEnabled.eq(true))
        .one(conn)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("challenge {challenge_id}")))
}

async fn load_flag<C: ConnectionTrait>(
    conn: &C,
    instance: &game_instance::Model,
) -> Result<Option<flag::Model>, DbErr> {
    match instance.flag_id {
        Some(id) => flag::Entity::find_by_id(id).one(conn).await,
        None => Ok(None),
    }
}

/// Return the instance for a participation and challenge, dispatching its flag on first access.
///
/// Missing instance rows mean the team is not entitled and are never created here.
/// Dispatch runs in one transaction holding the instance row lock, so concurrent first
/// accesses see exactly one flag. Any failure rolls back and leaves the instance unloaded.
#[instrument(skip(db))]
pub async fn get_instance(
    db: &DatabaseConnection,
    participation_id: i32,
    challenge_id: i32,
) -> Result<LoadedInstance, EngineError> {
    let instance = find_instance(db, participation_id, challenge_id)
        .await?
        .ok_or_else(|| {
            EngineError::not_found(format!(
                "instance of challenge {challenge_id} for participation {participation_id}"
            ))
        })?;
    let challenge = find_enabled_challenge(db, challenge_id).await?;

    if instance.is_loaded {
        let flag = load_flag(db, &instance).await?;
        return Ok(LoadedInstance {
            instance,
            challenge,
            flag,
        });
    }

    let txn = db.begin().await?;

    let instance = game_instance::Entity::find_by_id(instance.id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("instance {}", instance.id)))?;

    if instance.is_loaded {
        debug!(instance_id = instance.id, "Instance loaded by a concurrent caller");
        let flag = load_flag(&txn, &instance).await?;
        txn.commit().await?;
        return Ok(LoadedInstance {
            instance,
            challenge,
            flag,
        });
    }

    let flag = match challenge.challenge_type {
        ChallengeType::DynamicContainer => {
            let text = render_flag(FlagSource {
                template: challenge.flag_template.as_deref(),
                secret: &challenge.flag_secret,
                challenge_id: challenge.id,
                participation_id,
                enable_leet: challenge.enable_leet,
            });
            let row = flag::ActiveModel {
                challenge_id: Set(challenge.id),
                flag: Set(text),
                attachment_ref: Set(None),
                is_occupied: Set(true),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            Some(row)
        }
        ChallengeType::DynamicAttachment => {
            let candidate = flag::Entity::find()
                .filter(flag::Column::ChallengeId.eq(challenge.id))
                .filter(flag::Column::IsOccupied.eq(false))
                .order_by_asc(flag::Column::Id)
                .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
                .one(&txn)
                .await?;

            let Some(candidate) = candidate else {
                txn.rollback().await?;
                warn!(
                    challenge_id = challenge.id,
                    participation_id, "No unclaimed flag left in pool"
                );
                return Err(EngineError::PoolExhausted {
                    challenge_id: challenge.id,
                });
            };

            let mut claim: flag::ActiveModel = candidate.into();
            claim.is_occupied = Set(true);
            Some(claim.update(&txn).await?)
        }
        ChallengeType::StaticAttachment | ChallengeType::StaticContainer => None,
    };

    let mut loaded: game_instance::ActiveModel = instance.into();
    loaded.is_loaded = Set(true);
    loaded.flag_id = Set(flag.as_ref().map(|f| f.id));
    let instance = loaded.update(&txn).await?;

    txn.commit().await?;

    info!(
        instance_id = instance.id,
        challenge_id,
        participation_id,
        challenge_type = %challenge.challenge_type,
        flag_id = ?instance.flag_id,
        "Instance materialized"
    );

    Ok(LoadedInstance {
        instance,
        challenge,
        flag,
    })
}
