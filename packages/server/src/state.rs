use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::engine::{ContainerManager, FlagChecker, ScoreboardService};
use crate::queue::Mq;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    pub containers: Arc<ContainerManager>,
    pub checker: Arc<FlagChecker>,
    pub scoreboard: Arc<ScoreboardService>,
    /// `None` when the queue is disabled; answers are then checked inline.
    pub mq: Option<Arc<Mq>>,
}
