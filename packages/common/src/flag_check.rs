use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A flag-check job sent to the checker queue.
///
/// Carries only identifiers: the checker re-reads the submission and instance
/// rows itself, so a job can be delivered late or twice without harm.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagCheckJob {
    /// Job identifier (UUID)
    pub job_id: String,
    /// ID of the submission to verify
    pub submission_id: i32,
    /// ID of the game the submission belongs to
    pub game_id: i32,
}

impl FlagCheckJob {
    /// Create a new job with a generated UUID.
    pub fn new(submission_id: i32, game_id: i32) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            submission_id,
            game_id,
        }
    }
}
