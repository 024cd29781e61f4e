//! Typed provider error.
//!
//! Every call on [`crate::ProviderClient`] fails with a `ProviderError`
//! carrying a machine-readable code. The engine branches on a small
//! subset of codes (`cannot_resend_yet`, `disconnected_account`,
//! `not_configured`); everything else is opaque detail.

use thiserror::Error;

/// Machine-readable provider error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// An invitation to this profile was sent too recently.
    CannotResendYet,
    /// The sender account lost its provider session.
    DisconnectedAccount,
    /// The sender account is not set up for this operation.
    NotConfigured,
    /// The provider rejected the call for throughput reasons.
    RateLimited,
    /// Transport-level failure (DNS, TLS, timeout, …).
    Network,
    /// Anything the client does not recognise.
    Unknown,
}

impl ErrorCode {
    /// Parse the wire representation used in provider error bodies.
    pub fn from_wire(code: &str) -> Self {
        match code {
            "cannot_resend_yet" => Self::CannotResendYet,
            "disconnected_account" => Self::DisconnectedAccount,
            "not_configured" => Self::NotConfigured,
            "rate_limited" => Self::RateLimited,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CannotResendYet => "cannot_resend_yet",
            Self::DisconnectedAccount => "disconnected_account",
            Self::NotConfigured => "not_configured",
            Self::RateLimited => "rate_limited",
            Self::Network => "network",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every provider operation.
#[derive(Debug, Clone, Error)]
#[error("provider error ({code}): {detail}")]
pub struct ProviderError {
    pub code: ErrorCode,
    pub detail: String,
}

impl ProviderError {
    pub fn new(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self { code, detail: detail.into() }
    }

    /// Shorthand used by the engine's cooldown logic.
    pub fn is_cannot_resend_yet(&self) -> bool {
        self.code == ErrorCode::CannotResendYet
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(ErrorCode::Network, err.to_string())
    }
}
