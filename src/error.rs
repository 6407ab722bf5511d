use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON document: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Topology '{0}' has no nodes to distribute")]
    NoNodesToDistribute(String),

    #[error("Failed to provision a new compute target: {0}")]
    ProvisioningError(String),

    #[error("Deployment '{0}' not found in the registry")]
    DeploymentNotFound(String),

    #[error("Remote command on '{target}' failed: {message}")]
    RemoteExecError { target: String, message: String },

    #[error("Remote operation on '{target}' timed out after {seconds}s")]
    RemoteTimeout { target: String, seconds: u64 },
}

pub type Result<T> = std::result::Result<T, Error>;
