use common::ParticipationStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A team's entry into one game.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "participation")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub game_id: i32,
    #[sea_orm(belongs_to, from = "game_id", to = "id")]
    pub game: HasOne<super::game::Entity>,

    pub team_id: i32,
    #[sea_orm(belongs_to, from = "team_id", to = "id")]
    pub team: HasOne<super::team::Entity>,

    /// One of the game's organizations, if it defines any.
    pub organization: Option<String>,

    pub status: ParticipationStatus,

    #[sea_orm(has_many)]
    pub instances: HasMany<super::game_instance::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
