use async_trait::async_trait;

use super::{ContainerDriver, ContainerSpec, DestroyOutcome, DriverError, RuntimeHandle};

/// Driver for deployments without a container runtime.
///
/// Creation is always refused. Destroy reports success so stale rows can be cleaned up.
#[derive(Debug, Default)]
pub struct DisabledDriver;

#[async_trait]
impl ContainerDriver for DisabledDriver {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn create_container(&self, _spec: &ContainerSpec) -> Result<RuntimeHandle, DriverError> {
        Err(DriverError::Refused(
            "no container runtime is configured".into(),
        ))
    }

    async fn destroy_container(&self, _runtime_id: &str) -> Result<DestroyOutcome, DriverError> {
        Ok(DestroyOutcome::Terminated)
    }
}
