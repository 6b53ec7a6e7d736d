#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a challenge, deciding how its flag is resolved.
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in SeaORM entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "PascalCase")]
pub enum ChallengeType {
    /// Author-supplied flag set, attachment only.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "StaticAttachment"))]
    StaticAttachment,
    /// Author-supplied flag set baked into a container image.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "StaticContainer"))]
    StaticContainer,
    /// One pre-uploaded flag (and attachment) claimed per participation.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "DynamicAttachment"))]
    DynamicAttachment,
    /// Flag generated per participation and injected into its container.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "DynamicContainer"))]
    DynamicContainer,
}

impl ChallengeType {
    pub fn is_static(&self) -> bool {
        matches!(self, Self::StaticAttachment | Self::StaticContainer)
    }

    pub fn is_dynamic(&self) -> bool {
        !self.is_static()
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Self::StaticContainer | Self::DynamicContainer)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StaticAttachment => "StaticAttachment",
            Self::StaticContainer => "StaticContainer",
            Self::DynamicAttachment => "DynamicAttachment",
            Self::DynamicContainer => "DynamicContainer",
        }
    }
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of checking one answer.
///
/// A submission is stored as `Unchecked` and moves to exactly one final status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "PascalCase")]
pub enum AnswerStatus {
    /// Stored, waiting for the flag checker.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Unchecked"))]
    Unchecked,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Accepted"))]
    Accepted,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "WrongAnswer"))]
    WrongAnswer,
    /// The answer is another participation's dispatched flag.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "CheatDetected"))]
    CheatDetected,
    /// The team has no instance for the challenge.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "NotFound"))]
    NotFound,
}

impl AnswerStatus {
    /// All possible status values.
    pub const ALL: &'static [AnswerStatus] = &[
        Self::Unchecked,
        Self::Accepted,
        Self::WrongAnswer,
        Self::CheatDetected,
        Self::NotFound,
    ];

    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Unchecked)
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unchecked => "Unchecked",
            Self::Accepted => "Accepted",
            Self::WrongAnswer => "WrongAnswer",
            Self::CheatDetected => "CheatDetected",
            Self::NotFound => "NotFound",
        }
    }
}

impl fmt::Display for AnswerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for AnswerStatus {
    fn default() -> Self {
        Self::Unchecked
    }
}

/// Error when parsing an invalid status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError {
    invalid: String,
}

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid status '{}'. Valid values: {}",
            self.invalid,
            AnswerStatus::ALL
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for AnswerStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unchecked" => Ok(Self::Unchecked),
            "Accepted" => Ok(Self::Accepted),
            "WrongAnswer" => Ok(Self::WrongAnswer),
            "CheatDetected" => Ok(Self::CheatDetected),
            "NotFound" => Ok(Self::NotFound),
            _ => Err(ParseStatusError {
                invalid: s.to_string(),
            }),
        }
    }
}

/// Solve ranking of an answer within its challenge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "PascalCase")]
pub enum BloodRank {
    Unaccepted,
    FirstBlood,
    SecondBlood,
    ThirdBlood,
    Normal,
}

impl BloodRank {
    /// Rank of the n-th accepted solve (1-based).
    pub fn from_solve_order(order: i32) -> Self {
        match order {
            1 => Self::FirstBlood,
            2 => Self::SecondBlood,
            3 => Self::ThirdBlood,
            _ => Self::Normal,
        }
    }

    pub fn is_blood(&self) -> bool {
        matches!(self, Self::FirstBlood | Self::SecondBlood | Self::ThirdBlood)
    }
}

/// Lifecycle state of a challenge container.
///
/// Rows are only written once the runtime has started the container, so no pending state is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "PascalCase")]
pub enum ContainerStatus {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Running"))]
    Running,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Destroyed"))]
    Destroyed,
}

/// Review state of a team's entry into a game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "PascalCase")]
pub enum ParticipationStatus {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Pending"))]
    Pending,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Accepted"))]
    Accepted,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Rejected"))]
    Rejected,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Suspended"))]
    Suspended,
}

/// What to do when a participation already runs its maximum number of containers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerLimitPolicy {
    /// Destroy the oldest-started container and continue.
    #[default]
    Evict,
    /// Refuse the new container.
    Reject,
}
