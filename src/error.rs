use std::fmt;

use crate::namespace::Namespace;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Io(std::io::Error),
    Json(serde_json::Error),
    Timeout,
    Protocol(String),
    NotAcknowledged(Namespace),
    UnknownEntity(String),
    Unsupported(String),
    Payload { namespace: Namespace, reason: String },
}

impl Error {
    pub(crate) fn payload(namespace: Namespace, reason: impl Into<String>) -> Self {
        Error::Payload {
            namespace,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::Json(e) => write!(f, "JSON error: {e}"),
            Error::Timeout => write!(f, "request timed out"),
            Error::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Error::NotAcknowledged(ns) => write!(f, "{ns} not acknowledged by device"),
            Error::UnknownEntity(id) => write!(f, "unknown entity: {id}"),
            Error::Unsupported(msg) => write!(f, "unsupported: {msg}"),
            Error::Payload { namespace, reason } => {
                write!(f, "malformed {namespace} payload: {reason}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::Http(e)
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
