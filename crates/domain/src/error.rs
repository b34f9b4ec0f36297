use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid score data: {0}")]
    Validation(String),
    #[error("invalid practice configuration: {0}")]
    Config(String),
    #[error("score encoding error: {0}")]
    Serialization(String),
}

impl DomainError {
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation(message.into())
    }

    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config(message.into())
    }
}
