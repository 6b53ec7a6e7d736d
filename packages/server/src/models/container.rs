use chrono::{DateTime, Utc};
use common::ContainerStatus;
use serde::Serialize;
use uuid::Uuid;

use crate::entity::container;

/// A running challenge container as seen by its team.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ContainerResponse {
    pub id: Uuid,
    pub status: ContainerStatus,
    /// Host to connect to.
    #[schema(example = "ctf.example.org")]
    pub host: Option<String>,
    #[schema(example = 49153)]
    pub port: Option<i32>,
    pub started_at: DateTime<Utc>,
    /// The container is destroyed after this time unless extended.
    pub expect_stop_at: DateTime<Utc>,
}

impl From<container::Model> for ContainerResponse {
    fn from(c: container::Model) -> Self {
        Self {
            id: c.id,
            status: c.status,
            host: c.public_host,
            port: c.public_port,
            started_at: c.started_at,
            expect_stop_at: c.expect_stop_at,
        }
    }
}
