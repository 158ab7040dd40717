use constellation_core::SessionMode;
use thiserror::Error;

use crate::factory::CommunicationState;
use crate::shape::ChannelShape;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Binding cannot build a {shape} channel factory (session mode {session_mode:?})")]
    ShapeNotSupported {
        shape: ChannelShape,
        session_mode: SessionMode,
    },

    #[error("Endpoint is missing its {0}")]
    EndpointNotResolved(&'static str),

    #[error("Channel factory is already {0:?}")]
    AlreadyTerminal(CommunicationState),

    #[error("Binding parameter {0} was added twice")]
    DuplicateParameter(&'static str),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid endpoint address: {0}")]
    InvalidAddress(String),

    #[error("{0} timeout exceeded")]
    Timeout(&'static str),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("{operation} is not supported on a {shape} channel")]
    UnsupportedOperation {
        operation: &'static str,
        shape: ChannelShape,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Description(#[from] constellation_core::Error),

    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
