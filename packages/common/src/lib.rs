pub mod config;
pub mod event;
pub mod flag;
pub mod flag_check;
pub mod scoring;
pub mod status;

pub use config::MqAppConfig;
pub use status::{
    AnswerStatus, BloodRank, ChallengeType, ContainerLimitPolicy, ContainerStatus,
    ParticipationStatus,
};
