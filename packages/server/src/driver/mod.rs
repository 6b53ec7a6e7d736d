pub mod disabled;
pub mod docker;
pub mod error;

use async_trait::async_trait;

pub use disabled::DisabledDriver;
pub use docker::DockerDriver;
pub use error::DriverError;

/// Environment variable carrying the instance flag into the container.
pub const FLAG_ENV: &str = "ARENA_FLAG";

/// Everything the runtime needs to start one challenge container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub image: String,
    pub exposed_port: i32,
    pub cpu_count: i32,
    /// In megabytes.
    pub memory_limit: i32,
    /// In megabytes.
    pub storage_limit: i32,
    pub flag: Option<String>,
    /// Stable owner label, used to find leaked containers by hand.
    pub owner: String,
}

/// Runtime-side identity of a started container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeHandle {
    pub runtime_id: String,
    pub public_host: Option<String>,
    pub public_port: Option<i32>,
}

/// Result of a destroy call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyOutcome {
    /// The resource is gone, or was never there.
    Terminated,
    /// The runtime accepted the call but the resource still exists.
    Lingering,
}

#[async_trait]
pub trait ContainerDriver: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_container(&self, spec: &ContainerSpec) -> Result<RuntimeHandle, DriverError>;

    async fn destroy_container(&self, runtime_id: &str) -> Result<DestroyOutcome, DriverError>;
}
