use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The pairing of one participation with one challenge.
///
/// Rows are created when a team is entitled to a challenge. `flag_id` is written at
/// most once, by the transaction that flips `is_loaded`.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "game_instance")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub participation_id: i32,
    #[sea_orm(belongs_to, from = "participation_id", to = "id")]
    pub participation: HasOne<super::participation::Entity>,

    pub challenge_id: i32,
    #[sea_orm(belongs_to, from = "challenge_id", to = "id")]
    pub challenge: HasOne<super::challenge::Entity>,

    #[sea_orm(default_value = false)]
    pub is_loaded: bool,
    #[sea_orm(default_value = false)]
    pub is_solved: bool,

    /// Dispatched flag. NULL for static challenges and before loading.
    pub flag_id: Option<i32>,

    #[sea_orm(has_one)]
    pub container: HasOne<super::container::Entity>,

    pub last_container_operation: Option<DateTimeUtc>,
}

impl ActiveModelBehavior for ActiveModel {}
