use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::event::{GameEvent, game_channel};
use common::{ContainerLimitPolicy, ContainerStatus};
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::driver::{ContainerDriver, ContainerSpec, DestroyOutcome, DriverError};
use crate::entity::{container, game, game_instance, participation};
use crate::notify::{EventSink, EventSinkExt};

use super::error::EngineError;
use super::instance::get_instance;

/// Deployment-wide container policy.
#[derive(Debug, Clone)]
pub struct ContainerSettings {
    pub lifetime: chrono::Duration,
    pub extension: chrono::Duration,
    /// Prolonging is only allowed when at most this much lifetime remains. Zero disables the check.
    pub renewal_window: chrono::Duration,
    pub limit_policy: ContainerLimitPolicy,
    /// Minimum time between two container operations on one instance.
    pub operation_cooldown: chrono::Duration,
    pub driver_timeout: Duration,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            lifetime: chrono::Duration::minutes(120),
            extension: chrono::Duration::minutes(120),
            renewal_window: chrono::Duration::minutes(10),
            limit_policy: ContainerLimitPolicy::Evict,
            operation_cooldown: chrono::Duration::seconds(10),
            driver_timeout: Duration::from_secs(60),
        }
    }
}

/// Creates, destroys and prolongs challenge containers.
pub struct ContainerManager {
    db: DatabaseConnection,
    driver: Arc<dyn ContainerDriver>,
    events: Arc<dyn EventSink>,
    settings: ContainerSettings,
    shutdown: CancellationToken,
}

impl ContainerManager {
    pub fn new(
        db: DatabaseConnection,
        driver: Arc<dyn ContainerDriver>,
        events: Arc<dyn EventSink>,
        settings: ContainerSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            db,
            driver,
            events,
            settings,
            shutdown,
        }
    }

    pub fn settings(&self) -> &ContainerSettings {
        &self.settings
    }

    /// Run a driver call under the configured timeout and the shutdown token.
    async fn drive<T, F>(&self, call: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, DriverError>>,
    {
        tokio::select! {
            _ = self.shutdown.cancelled() => Err(EngineError::Cancelled),
            res = tokio::time::timeout(self.settings.driver_timeout, call) => match res {
                Ok(inner) => inner.map_err(EngineError::from),
                Err(_) => Err(DriverError::Timeout(self.settings.driver_timeout.as_secs()).into()),
            },
        }
    }

    fn check_cooldown(&self, instance: &game_instance::Model) -> Result<(), EngineError> {
        if let Some(last) = instance.last_container_operation
            && Utc::now() - last < self.settings.operation_cooldown
        {
            return Err(EngineError::denied(
                "container operations are too frequent, try again later",
            ));
        }
        Ok(())
    }

    fn publish_state(
        &self,
        game_id: i32,
        participation_id: i32,
        challenge_id: i32,
        status: ContainerStatus,
    ) {
        self.events.publish_event(
            &game_channel(game_id),
            &GameEvent::ContainerStateChanged {
                game_id,
                participation_id,
                challenge_id,
                status,
            },
        );
    }

    /// Start the container of a participation's challenge instance.
    ///
    /// Returns the existing container when one is already bound to the instance. Creations
    /// for one participation are serialized by a lock on its row so the running count cannot
    /// be raced past the game's limit.
    #[instrument(skip(self))]
    pub async fn create_container(
        &self,
        participation_id: i32,
        challenge_id: i32,
        actor_user_id: i32,
    ) -> Result<container::Model, EngineError> {
        let loaded = get_instance(&self.db, participation_id, challenge_id).await?;
        let challenge = &loaded.challenge;

        if !challenge.challenge_type.is_container() {
            return Err(EngineError::denied("challenge does not provide a container"));
        }
        let (Some(image), Some(exposed_port)) = (
            challenge.container_image.clone().filter(|i| !i.trim().is_empty()),
            challenge.container_exposed_port.filter(|p| *p > 0),
        ) else {
            return Err(EngineError::denied(
                "challenge has no container image or exposed port configured",
            ));
        };

        if let Some(existing) = container::Entity::find()
            .filter(container::Column::InstanceId.eq(loaded.instance.id))
            .one(&self.db)
            .await?
        {
            return Ok(existing);
        }

        self.check_cooldown(&loaded.instance)?;

        let txn = self.db.begin().await?;

        let participation = participation::Entity::find_by_id(participation_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("participation {participation_id}")))?;

        let game = game::Entity::find_by_id(participation.game_id)
            .one(&txn)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("game {}", participation.game_id)))?;

        // Re-check under the participation lock.
        if let Some(existing) = container::Entity::find()
            .filter(container::Column::InstanceId.eq(loaded.instance.id))
            .one(&txn)
            .await?
        {
            txn.commit().await?;
            return Ok(existing);
        }

        self.enforce_limit(&txn, game.id, participation_id, game.container_count_limit)
            .await?;

        let spec = ContainerSpec {
            image: image.clone(),
            exposed_port,
            cpu_count: challenge.cpu_count,
            memory_limit: challenge.memory_limit,
            storage_limit: challenge.storage_limit,
            flag: loaded.flag_text().map(str::to_string),
            owner: format!("p{participation_id}-c{challenge_id}"),
        };

        // A failed or cancelled call drops `txn`; evictions are already committed.
        let handle = self.drive(self.driver.create_container(&spec)).await?;

        let now = Utc::now();
        let row = container::ActiveModel {
            id: Set(Uuid::now_v7()),
            instance_id: Set(loaded.instance.id),
            participation_id: Set(participation_id),
            runtime_id: Set(handle.runtime_id.clone()),
            image: Set(image),
            status: Set(ContainerStatus::Running),
            public_host: Set(handle.public_host.clone()),
            public_port: Set(handle.public_port),
            started_at: Set(now),
            expect_stop_at: Set(now + self.settings.lifetime),
            ..Default::default()
        };

        let persisted = async {
            let row = row.insert(&txn).await?;
            game_instance::ActiveModel {
                id: Set(loaded.instance.id),
                last_container_operation: Set(Some(now)),
                ..Default::default()
            }
            .update(&txn)
            .await?;
            txn.commit().await?;
            Ok::<_, DbErr>(row)
        }
        .await;

        let row = match persisted {
            Ok(row) => row,
            Err(err) => {
                error!(
                    runtime_id = %handle.runtime_id,
                    error = %err,
                    "Bookkeeping failed, removing the created container"
                );
                let cleanup = self
                    .drive(self.driver.destroy_container(&handle.runtime_id))
                    .await;
                if let Err(cleanup) = cleanup {
                    error!(runtime_id = %handle.runtime_id, error = %cleanup, "Container leaked");
                }
                return Err(err.into());
            }
        };

        self.publish_state(game.id, participation_id, challenge_id, ContainerStatus::Running);

        info!(
            container_id = %row.id,
            runtime_id = %row.runtime_id,
            participation_id,
            challenge_id,
            actor_user_id,
            expect_stop_at = %row.expect_stop_at,
            "Container created"
        );

        Ok(row)
    }

    /// Make room for one more container.
    ///
    /// Each evicted container's row is deleted outside `txn` as soon as the runtime confirms
    /// it is gone, so a later failure of the new container cannot bring the row back.
    async fn enforce_limit(
        &self,
        txn: &DatabaseTransaction,
        game_id: i32,
        participation_id: i32,
        limit: i32,
    ) -> Result<(), EngineError> {
        if limit <= 0 {
            return Ok(());
        }

        let running = container::Entity::find()
            .filter(container::Column::ParticipationId.eq(participation_id))
            .order_by_asc(container::Column::StartedAt)
            .all(txn)
            .await?;

        if (running.len() as i64) < limit as i64 {
            return Ok(());
        }

        if self.settings.limit_policy == ContainerLimitPolicy::Reject {
            return Err(EngineError::denied(format!(
                "container limit of {limit} reached"
            )));
        }

        let excess = running.len() - limit as usize + 1;

        for oldest in running.into_iter().take(excess) {
            let outcome = self.drive(self.driver.destroy_container(&oldest.runtime_id)).await?;
            if outcome != DestroyOutcome::Terminated {
                return Err(DriverError::NotTerminal(oldest.runtime_id).into());
            }

            let instance = game_instance::Entity::find_by_id(oldest.instance_id)
                .one(txn)
                .await?;
            container::Entity::delete_by_id(oldest.id).exec(&self.db).await?;

            info!(
                container_id = %oldest.id,
                runtime_id = %oldest.runtime_id,
                participation_id,
                "Evicted oldest container"
            );
            if let Some(instance) = instance {
                self.publish_state(
                    game_id,
                    instance.participation_id,
                    instance.challenge_id,
                    ContainerStatus::Destroyed,
                );
            }
        }

        Ok(())
    }

    /// Destroy the container bound to a participation's challenge instance.
    #[instrument(skip(self))]
    pub async fn destroy_for_instance(
        &self,
        participation_id: i32,
        challenge_id: i32,
    ) -> Result<(), EngineError> {
        let instance = super::instance::find_instance(&self.db, participation_id, challenge_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("instance of challenge {challenge_id}")))?;

        let container = container::Entity::find()
            .filter(container::Column::InstanceId.eq(instance.id))
            .one(&self.db)
            .await?
            .ok_or_else(|| EngineError::not_found("container"))?;

        self.check_cooldown(&instance)?;
        self.destroy_container(container.id).await
    }

    /// Destroy a container through the driver.
    ///
    /// The bookkeeping row is removed only when the runtime confirms the container is gone.
    #[instrument(skip(self))]
    pub async fn destroy_container(&self, container_id: Uuid) -> Result<(), EngineError> {
        let row = container::Entity::find_by_id(container_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("container {container_id}")))?;

        let outcome = self.drive(self.driver.destroy_container(&row.runtime_id)).await?;
        if outcome != DestroyOutcome::Terminated {
            warn!(
                container_id = %row.id,
                runtime_id = %row.runtime_id,
                "Container still present after destroy, keeping its row"
            );
            return Err(DriverError::NotTerminal(row.runtime_id).into());
        }

        let txn = self.db.begin().await?;
        container::Entity::delete_by_id(row.id).exec(&txn).await?;
        let instance = game_instance::Entity::find_by_id(row.instance_id)
            .one(&txn)
            .await?;
        if let Some(instance) = &instance {
            game_instance::ActiveModel {
                id: Set(instance.id),
                last_container_operation: Set(Some(Utc::now())),
                ..Default::default()
            }
            .update(&txn)
            .await?;
        }
        txn.commit().await?;

        if let Some(instance) = instance {
            let game_id = participation::Entity::find_by_id(instance.participation_id)
                .one(&self.db)
                .await?
                .map(|p| p.game_id);
            if let Some(game_id) = game_id {
                self.publish_state(
                    game_id,
                    instance.participation_id,
                    instance.challenge_id,
                    ContainerStatus::Destroyed,
                );
            }
        }

        info!(container_id = %row.id, runtime_id = %row.runtime_id, "Container destroyed");
        Ok(())
    }

    /// Push back the expected stop time of a participation's container.
    #[instrument(skip(self))]
    pub async fn prolong_for_instance(
        &self,
        participation_id: i32,
        challenge_id: i32,
    ) -> Result<container::Model, EngineError> {
        let instance = super::instance::find_instance(&self.db, participation_id, challenge_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("instance of challenge {challenge_id}")))?;

        let container = container::Entity::find()
            .filter(container::Column::InstanceId.eq(instance.id))
            .one(&self.db)
            .await?
            .ok_or_else(|| EngineError::not_found("container"))?;

        self.prolong_container(container.id, self.settings.extension)
            .await
    }

    /// Extend a container's expected stop time. Bookkeeping only; the runtime is not called.
    #[instrument(skip(self))]
    pub async fn prolong_container(
        &self,
        container_id: Uuid,
        extension: chrono::Duration,
    ) -> Result<container::Model, EngineError> {
        let txn = self.db.begin().await?;

        let row = container::Entity::find_by_id(container_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("container {container_id}")))?;

        let window = self.settings.renewal_window;
        if window > chrono::Duration::zero() && row.expect_stop_at - Utc::now() > window {
            return Err(EngineError::denied(format!(
                "containers can only be extended within {} minutes of expiry",
                window.num_minutes()
            )));
        }

        let expect_stop_at = row.expect_stop_at + extension;
        let mut active: container::ActiveModel = row.into();
        active.expect_stop_at = Set(expect_stop_at);
        let row = active.update(&txn).await?;
        txn.commit().await?;

        info!(container_id = %row.id, expect_stop_at = %row.expect_stop_at, "Container prolonged");
        Ok(row)
    }

    /// Destroy every container whose expected stop time has passed.
    pub async fn reap_expired(&self) -> Result<usize, EngineError> {
        let expired: Vec<Uuid> = container::Entity::find()
            .select_only()
            .column(container::Column::Id)
            .filter(container::Column::ExpectStopAt.lt(Utc::now()))
            .into_tuple()
            .all(&self.db)
            .await?;

        let mut reaped = 0;
        for container_id in expired {
            match self.destroy_container(container_id).await {
                Ok(()) => reaped += 1,
                Err(EngineError::NotFound(_)) => {}
                Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
                Err(e) => {
                    error!(container_id = %container_id, error = %e, "Failed to reap container");
                }
            }
        }
        Ok(reaped)
    }
}

/// Run the container expiry reaper until shutdown.
pub async fn run_container_reaper(
    manager: Arc<ContainerManager>,
    scan_interval: Duration,
    shutdown: CancellationToken,
) {
    info!(
        scan_interval_secs = scan_interval.as_secs(),
        "Starting container reaper"
    );

    let mut interval = tokio::time::interval(scan_interval);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }

        match manager.reap_expired().await {
            Ok(0) => {}
            Ok(count) => info!(count, "Reaped expired containers"),
            Err(EngineError::Cancelled) => break,
            Err(e) => error!(error = %e, "Container reaping failed"),
        }
    }

    info!("Container reaper stopped");
}
