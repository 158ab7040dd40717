use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Contract {contract} declares operation {operation} more than once")]
    DuplicateOperation { contract: String, operation: String },

    #[error("Invalid description: {0}")]
    InvalidDescription(String),

    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
