// src/error.rs
//! Error taxonomy for the polling pipeline.
//!
//! Fetch and parse errors are per-source and never leave that source's cycle.
//! Configuration errors are fatal at startup.

use std::time::Duration;

use thiserror::Error;

/// Why a conditional fetch produced no usable body.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("unexpected HTTP status {0}")]
    UnexpectedStatus(u16),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Transport(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("feed body is not valid UTF-8")]
    NotUtf8,
    #[error("unrecognized feed container: {0}")]
    UnknownFormat(String),
    #[error("malformed feed xml: {0}")]
    Xml(String),
}

impl From<quick_xml::DeError> for ParseError {
    fn from(e: quick_xml::DeError) -> Self {
        ParseError::Xml(e.to_string())
    }
}

impl From<quick_xml::Error> for ParseError {
    fn from(e: quick_xml::Error) -> Self {
        ParseError::Xml(e.to_string())
    }
}

/// Startup-time validation failures. The process never starts polling on these.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no feed sources configured")]
    EmptyRegistry,
    #[error("feed source with empty name")]
    EmptySourceName,
    #[error("duplicate feed source name `{0}`")]
    DuplicateSource(String),
    #[error("feed source `{name}` has invalid url `{url}`")]
    InvalidUrl { name: String, url: String },
    #[error("`{0}` must be greater than zero")]
    ZeroDuration(&'static str),
    #[error("product pattern needs a non-empty needle and label")]
    InvalidProductPattern,
}
