use common::ChallengeType;
use serde::Serialize;

use super::container::ContainerResponse;

/// A challenge from the point of view of one team.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ChallengeInstanceResponse {
    #[schema(example = 1)]
    pub challenge_id: i32,
    #[schema(example = "pwn-1")]
    pub title: String,
    #[schema(example = "Pwn")]
    pub category: String,
    pub challenge_type: ChallengeType,
    /// Current score before any blood bonus.
    #[schema(example = 500)]
    pub score: i32,
    pub is_solved: bool,
    /// Attachment handed out with a dynamic-attachment flag.
    pub attachment: Option<String>,
    pub container: Option<ContainerResponse>,
}
