// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use thiserror::Error;

/// Failures surfaced by a catalog load.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("source returned no channels")]
    EmptyResult,
}

impl CatalogError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::SourceUnavailable(_) => "Channel source is temporarily unavailable",
            Self::EmptyResult => "No channels found",
        }
    }
}

impl From<ClientError> for CatalogError {
    fn from(err: ClientError) -> Self {
        Self::SourceUnavailable(err.to_string())
    }
}

impl From<TransportError> for CatalogError {
    fn from(err: TransportError) -> Self {
        Self::SourceUnavailable(err.to_string())
    }
}

/// The single failure kind of the Xtream client. Network errors, non-2xx
/// statuses and malformed bodies all land here; the message is for logs only.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ClientError(pub String);

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        Self(err.to_string())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("request timed out")]
    Timeout,
}
