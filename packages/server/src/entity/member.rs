use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Which participation a user plays for in a game.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "member")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub game_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i32,

    pub participation_id: i32,
    #[sea_orm(belongs_to, from = "participation_id", to = "id")]
    pub participation: HasOne<super::participation::Entity>,

    pub joined_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
