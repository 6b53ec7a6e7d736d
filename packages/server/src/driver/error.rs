use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("container creation refused: {0}")]
    Refused(String),

    #[error("container runtime command failed: {0}")]
    Command(String),

    #[error("unexpected runtime output: {0}")]
    Output(String),

    #[error("container {0} did not reach a terminal state")]
    NotTerminal(String),

    #[error("container runtime call timed out after {0} seconds")]
    Timeout(u64),
}
