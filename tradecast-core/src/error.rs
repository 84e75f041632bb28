//! Error types shared across the hub

use thiserror::Error;

/// Failure on a client transport. Always terminal for the affected connection.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Read error: {0}")]
    Read(String),

    #[error("Write error: {0}")]
    Write(String),

    #[error("Connection closed by peer")]
    Closed,
}

impl TransportError {
    pub fn read(msg: impl Into<String>) -> Self {
        TransportError::Read(msg.into())
    }

    pub fn write(msg: impl Into<String>) -> Self {
        TransportError::Write(msg.into())
    }
}

/// A client payload that could not be decoded into a trade action.
///
/// Decode errors are always recoverable: the connection stays open.
#[derive(Error, Debug)]
#[error("Invalid trade action format: {0}")]
pub struct DecodeError(#[from] pub serde_json::Error);
