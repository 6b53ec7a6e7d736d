use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entity::cheat_info;

#[derive(Serialize, utoipa::ToSchema)]
pub struct CheatInfoResponse {
    #[schema(example = 1)]
    pub id: i32,
    pub submission_id: i32,
    /// Participation that submitted another team's flag.
    pub submit_participation_id: i32,
    /// Participation the flag was dispatched to.
    pub source_participation_id: i32,
    pub created_at: DateTime<Utc>,
}

impl From<cheat_info::Model> for CheatInfoResponse {
    fn from(c: cheat_info::Model) -> Self {
        Self {
            id: c.id,
            submission_id: c.submission_id,
            submit_participation_id: c.submit_participation_id,
            source_participation_id: c.source_participation_id,
            created_at: c.created_at,
        }
    }
}
