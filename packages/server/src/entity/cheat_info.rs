use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Evidence that a submission carried another participation's flag.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cheat_info")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub game_id: i32,

    #[sea_orm(unique)]
    pub submission_id: i32,
    #[sea_orm(belongs_to, from = "submission_id", to = "id")]
    pub submission: HasOne<super::submission::Entity>,

    /// Participation that submitted the leaked flag.
    pub submit_participation_id: i32,
    /// Participation whose instance the flag was dispatched to.
    pub source_participation_id: i32,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
