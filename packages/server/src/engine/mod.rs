//! Instance lifecycle, answer verification and scoring.

pub mod checker;
pub mod cheat;
pub mod container;
pub mod error;
pub mod instance;
pub mod scoreboard;
pub mod verifier;

pub use checker::{FlagChecker, SubmitAnswer, submit_answer};
pub use cheat::{CheatCheckInfo, check_cheat, list_cheat_info};
pub use container::{ContainerManager, ContainerSettings, run_container_reaper};
pub use error::{EngineError, ErrorKind};
pub use instance::{LoadedInstance, get_instance};
pub use scoreboard::{ScoreboardModel, ScoreboardService, generate_scoreboard};
pub use verifier::{Verdict, verify_answer};
