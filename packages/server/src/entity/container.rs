use common::ContainerStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "container")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub instance_id: i32,
    #[sea_orm(belongs_to, from = "instance_id", to = "id")]
    pub instance: HasOne<super::game_instance::Entity>,

    /// Denormalized from the instance for per-participation limit queries.
    pub participation_id: i32,

    /// Identifier assigned by the container runtime.
    pub runtime_id: String,
    pub image: String,
    pub status: ContainerStatus,

    pub public_host: Option<String>,
    pub public_port: Option<i32>,

    pub started_at: DateTimeUtc,
    pub expect_stop_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
