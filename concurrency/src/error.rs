use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatManagerError {
    #[error("there is already a user with name '{name}'")]
    DuplicateUser { name: String },
    #[error("not enough capacity to create chat '{name}' within {timeout:?}")]
    CapacityTimeout { name: String, timeout: Duration },
    #[error("trying to close an unknown chat with name '{name}'")]
    UnknownChat { name: String },
    #[error("could not start delivery worker for user '{name}': {reason}")]
    WorkerSpawn { name: String, reason: String },
    #[error("chat manager is closed")]
    Closed,
    #[error("chat manager task was cancelled")]
    Cancelled,
}
