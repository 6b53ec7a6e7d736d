use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::status::{BloodRank, ContainerStatus};

/// Core event trait
pub trait Event: Send + Sync + Sized + Serialize + DeserializeOwned {
    /// Get the event topic (e.g., "new_blood", "container_state_changed")
    fn topic(&self) -> &str;

    /// Convert event to a generic event
    fn to_generic_event(&self) -> GenericEvent {
        GenericEvent {
            topic: self.topic().to_string(),
            payload: serde_json::to_value(self).unwrap_or_default(),
        }
    }

    /// Create an event from a generic event
    fn from_generic_event(e: &GenericEvent) -> Result<Self, anyhow::Error> {
        let payload: Self = serde_json::from_value(e.payload.clone())?;
        Ok(payload)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericEvent {
    pub topic: String,
    pub payload: serde_json::Value,
}

impl Event for GenericEvent {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn from_generic_event(e: &GenericEvent) -> Result<Self, anyhow::Error> {
        Ok(e.clone())
    }
}

/// Events broadcast to a game's channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    NewBlood {
        game_id: i32,
        challenge_id: i32,
        participation_id: i32,
        rank: BloodRank,
        submit_time: DateTime<Utc>,
    },
    ContainerStateChanged {
        game_id: i32,
        participation_id: i32,
        challenge_id: i32,
        status: ContainerStatus,
    },
    CheatDetected {
        game_id: i32,
        challenge_id: i32,
        submission_id: i32,
        submit_participation_id: i32,
        source_participation_id: i32,
    },
}

impl Event for GameEvent {
    fn topic(&self) -> &str {
        match self {
            Self::NewBlood { .. } => "new_blood",
            Self::ContainerStateChanged { .. } => "container_state_changed",
            Self::CheatDetected { .. } => "cheat_detected",
        }
    }
}

/// Channel name for a game's broadcast events.
pub fn game_channel(game_id: i32) -> String {
    format!("game:{game_id}")
}
