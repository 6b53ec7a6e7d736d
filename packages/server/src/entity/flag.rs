use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A flag belonging to a challenge.
///
/// For static challenges these rows are the valid answer set. For dynamic-attachment
/// challenges they form the pre-uploaded pool, claimed one per instance via `is_occupied`.
/// Generated dynamic-container flags are stored here as already-occupied rows.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "flag")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub challenge_id: i32,
    #[sea_orm(belongs_to, from = "challenge_id", to = "id")]
    pub challenge: HasOne<super::challenge::Entity>,

    pub flag: String,

    /// Reference to the attachment handed out with this flag, resolved by blob storage.
    pub attachment_ref: Option<String>,

    #[sea_orm(default_value = false)]
    pub is_occupied: bool,
}

impl ActiveModelBehavior for ActiveModel {}
