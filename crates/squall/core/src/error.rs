use thiserror::Error;

#[derive(Error, Debug)]
pub enum SquallError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("{0}")]
    Message(String),
}

impl From<String> for SquallError {
    fn from(message: String) -> Self {
        SquallError::Message(message)
    }
}

impl From<&str> for SquallError {
    fn from(message: &str) -> Self {
        SquallError::Message(message.to_string())
    }
}
