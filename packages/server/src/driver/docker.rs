use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, warn};

use super::{
    ContainerDriver, ContainerSpec, DestroyOutcome, DriverError, FLAG_ENV, RuntimeHandle,
};

/// Drives a local Docker daemon through the `docker` CLI.
#[derive(Debug, Clone)]
pub struct DockerDriver {
    docker_bin: String,
    public_host: String,
    /// `--storage-opt size` needs overlay2 on xfs with pquota; off by default.
    storage_limit: bool,
}

impl DockerDriver {
    pub fn new(docker_bin: impl Into<String>, public_host: impl Into<String>) -> Self {
        Self {
            docker_bin: docker_bin.into(),
            public_host: public_host.into(),
            storage_limit: false,
        }
    }

    pub fn with_storage_limit(mut self, enabled: bool) -> Self {
        self.storage_limit = enabled;
        self
    }

    fn run_args(&self, spec: &ContainerSpec) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--rm".to_string(),
            format!("--label=arena.owner={}", spec.owner),
            format!("--cpus={}", spec.cpu_count.max(1)),
            format!("--memory={}m", spec.memory_limit.max(8)),
            "-p".to_string(),
            format!("{}", spec.exposed_port),
        ];
        if self.storage_limit {
            args.push(format!("--storage-opt=size={}m", spec.storage_limit.max(8)));
        }
        if let Some(flag) = &spec.flag {
            args.push("-e".to_string());
            args.push(format!("{FLAG_ENV}={flag}"));
        }
        args.push(spec.image.clone());
        args
    }

    async fn published_port(&self, runtime_id: &str, exposed_port: i32) -> Result<i32, DriverError> {
        let output = Command::new(&self.docker_bin)
            .args(["port", runtime_id, &format!("{exposed_port}/tcp")])
            .output()
            .await
            .map_err(|err| DriverError::Command(format!("failed to spawn docker: {err}")))?;

        if !output.status.success() {
            return Err(DriverError::Command(format!(
                "docker port failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_port_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse `0.0.0.0:49153` (possibly several lines, IPv4 and IPv6) into the host port.
fn parse_port_output(stdout: &str) -> Result<i32, DriverError> {
    stdout
        .lines()
        .filter_map(|line| line.trim().rsplit_once(':'))
        .find_map(|(_, port)| port.parse::<i32>().ok())
        .ok_or_else(|| DriverError::Output(format!("no published port in {stdout:?}")))
}

#[async_trait]
impl ContainerDriver for DockerDriver {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<RuntimeHandle, DriverError> {
        let output = Command::new(&self.docker_bin)
            .args(self.run_args(spec))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| DriverError::Command(format!("failed to spawn docker: {err}")))?;

        if !output.status.success() {
            return Err(DriverError::Command(format!(
                "docker run failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let runtime_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if runtime_id.is_empty() {
            return Err(DriverError::Output("docker run printed no container id".into()));
        }

        let public_port = match self.published_port(&runtime_id, spec.exposed_port).await {
            Ok(port) => port,
            Err(err) => {
                warn!(runtime_id = %runtime_id, error = %err, "Removing container without a published port");
                match self.destroy_container(&runtime_id).await {
                    Ok(DestroyOutcome::Terminated) => {}
                    Ok(DestroyOutcome::Lingering) => {
                        error!(runtime_id = %runtime_id, "Container leaked")
                    }
                    Err(cleanup) => {
                        error!(runtime_id = %runtime_id, error = %cleanup, "Container leaked")
                    }
                }
                return Err(err);
            }
        };

        debug!(runtime_id = %runtime_id, public_port, image = %spec.image, "Docker container started");

        Ok(RuntimeHandle {
            runtime_id,
            public_host: Some(self.public_host.clone()),
            public_port: Some(public_port),
        })
    }

    async fn destroy_container(&self, runtime_id: &str) -> Result<DestroyOutcome, DriverError> {
        let output = Command::new(&self.docker_bin)
            .args(["rm", "-f", runtime_id])
            .output()
            .await
            .map_err(|err| DriverError::Command(format!("failed to spawn docker: {err}")))?;

        if output.status.success() {
            return Ok(DestroyOutcome::Terminated);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("No such container") {
            return Ok(DestroyOutcome::Terminated);
        }

        warn!(runtime_id, stderr = %stderr.trim(), "docker rm did not remove the container");
        Ok(DestroyOutcome::Lingering)
    }
}
