use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "game")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,
    pub start_time: DateTimeUtc,
    pub end_time: DateTimeUtc,

    /// Accept answers after `end_time` without ranking them.
    #[sea_orm(default_value = false)]
    pub practice_mode: bool,

    /// Award full score regardless of blood rank.
    #[sea_orm(default_value = false)]
    pub no_bonus: bool,
    /// Blood bonuses in per-mille of the challenge score.
    #[sea_orm(default_value = 50)]
    pub first_blood_bonus: i32,
    #[sea_orm(default_value = 30)]
    pub second_blood_bonus: i32,
    #[sea_orm(default_value = 10)]
    pub third_blood_bonus: i32,

    /// Concurrently running containers per participation. 0 = unlimited.
    #[sea_orm(default_value = 3)]
    pub container_count_limit: i32,

    /// Organization names as a JSON array of strings. NULL when the game has none.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub organizations: Option<serde_json::Value>,

    #[sea_orm(has_many)]
    pub challenges: HasMany<super::challenge::Entity>,

    #[sea_orm(has_many)]
    pub participations: HasMany<super::participation::Entity>,

    pub created_at: DateTimeUtc,
}

impl Model {
    pub fn blood_bonus(&self) -> common::scoring::BloodBonus {
        common::scoring::BloodBonus {
            first: self.first_blood_bonus,
            second: self.second_blood_bonus,
            third: self.third_blood_bonus,
        }
    }

    pub fn organization_names(&self) -> Vec<String> {
        self.organizations
            .as_ref()
            .and_then(|v| serde_json::from_value::<Vec<String>>(v.clone()).ok())
            .unwrap_or_default()
    }
}

impl ActiveModelBehavior for ActiveModel {}
