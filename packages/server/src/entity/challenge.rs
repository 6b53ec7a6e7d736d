use common::ChallengeType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "challenge")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub game_id: i32,
    #[sea_orm(belongs_to, from = "game_id", to = "id")]
    pub game: HasOne<super::game::Entity>,

    pub title: String,
    pub category: String,
    pub challenge_type: ChallengeType,
    pub is_enabled: bool,

    /// Template for dynamic-container flags, e.g. `flag{[TEAM_HASH]}`.
    pub flag_template: Option<String>,
    /// Salt mixed into generated flags.
    pub flag_secret: String,
    #[sea_orm(default_value = false)]
    pub enable_leet: bool,

    pub container_image: Option<String>,
    pub container_exposed_port: Option<i32>,
    #[sea_orm(default_value = 1)]
    pub cpu_count: i32,
    /// In megabytes.
    #[sea_orm(default_value = 64)]
    pub memory_limit: i32,
    /// In megabytes.
    #[sea_orm(default_value = 256)]
    pub storage_limit: i32,

    pub original_score: i32,
    pub min_score_rate: f64,
    pub difficulty: f64,
    /// Solves accepted before the game ended. Drives blood rank and score decay.
    #[sea_orm(default_value = 0)]
    pub accepted_count: i32,

    #[sea_orm(has_many)]
    pub flags: HasMany<super::flag::Entity>,

    #[sea_orm(has_many)]
    pub instances: HasMany<super::game_instance::Entity>,

    pub created_at: DateTimeUtc,
}

impl Model {
    pub fn current_score(&self) -> i32 {
        common::scoring::current_score(
            self.original_score,
            self.min_score_rate,
            self.difficulty,
            self.accepted_count,
        )
    }
}

impl ActiveModelBehavior for ActiveModel {}
