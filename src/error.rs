use serde::Serialize;
use thiserror::Error;

use crate::rooms::RoomId;

pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    #[error("not a member of room {0}")]
    NotJoined(RoomId),

    #[error("file {0} not found")]
    FileNotFound(String),

    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    Oversized { size: usize, limit: usize },

    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed request: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    NotFound,
    Oversized,
    Io,
    Malformed,
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        use ChatError::*;
        match self {
            RoomNotFound(_) | NotJoined(_) | FileNotFound(_) => ErrorKind::NotFound,
            Oversized { .. } => ErrorKind::Oversized,
            Io(_) => ErrorKind::Io,
            Malformed(_) => ErrorKind::Malformed,
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<base64::DecodeError> for ChatError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Malformed(format!("file is not valid base64: {err}"))
    }
}
