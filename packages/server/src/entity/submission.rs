use common::AnswerStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One answer attempt. Immutable except for `status`, which leaves `Unchecked` once.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "submission")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub game_id: i32,

    pub challenge_id: i32,
    #[sea_orm(belongs_to, from = "challenge_id", to = "id")]
    pub challenge: HasOne<super::challenge::Entity>,

    pub participation_id: i32,
    #[sea_orm(belongs_to, from = "participation_id", to = "id")]
    pub participation: HasOne<super::participation::Entity>,

    pub team_id: i32,
    pub user_id: i32,

    pub answer: String,
    pub status: AnswerStatus,

    pub submit_time: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
