use chrono::{DateTime, Utc};
use common::AnswerStatus;
use serde::{Deserialize, Serialize};

use crate::entity::submission;
use crate::error::AppError;

/// Longest accepted answer, in characters.
pub const MAX_ANSWER_LEN: usize = 127;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct SubmitAnswerRequest {
    #[schema(example = "flag{s0me_fl4g}")]
    pub answer: String,
}

impl SubmitAnswerRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let answer = self.answer.trim();
        if answer.is_empty() || answer.chars().count() > MAX_ANSWER_LEN {
            return Err(AppError::Validation(format!(
                "Answer must be 1-{MAX_ANSWER_LEN} characters"
            )));
        }
        Ok(())
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct SubmissionResponse {
    #[schema(example = 1)]
    pub id: i32,
    pub challenge_id: i32,
    pub status: AnswerStatus,
    pub submit_time: DateTime<Utc>,
}

impl From<submission::Model> for SubmissionResponse {
    fn from(s: submission::Model) -> Self {
        Self {
            id: s.id,
            challenge_id: s.challenge_id,
            status: s.status,
            submit_time: s.submit_time,
        }
    }
}
