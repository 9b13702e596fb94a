//! Fetch failure taxonomy and classification
//!
//! Every failed fetch is reduced to a [`CrawlError`] carrying one [`ErrorKind`],
//! an optional transport error code and an optional HTTP status. The kind drives
//! retry and escalation decisions; kind, code and status feed run statistics.

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    Dns,
    Connection,
    BotChallenge,
    HttpStatus,
    Unknown,
}

impl ErrorKind {
    /// Transient transport failures worth retrying on the HTTP tier
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Connection)
    }

    /// Failures the browser tier may recover from
    ///
    /// DNS failures are excluded: a domain that does not resolve will not
    /// resolve in a browser either. Plain status failures (404, 410, 500) are
    /// the server's real answer and would come back the same way.
    pub fn can_escalate(&self) -> bool {
        !matches!(self, Self::Dns | Self::HttpStatus)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Dns => "dns",
            Self::Connection => "connection",
            Self::BotChallenge => "bot_challenge",
            Self::HttpStatus => "http_status",
            Self::Unknown => "unknown",
        }
    }

    pub fn all() -> [Self; 6] {
        [
            Self::Timeout,
            Self::Dns,
            Self::Connection,
            Self::BotChallenge,
            Self::HttpStatus,
            Self::Unknown,
        ]
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified fetch failure
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind} error: {message}")]
pub struct CrawlError {
    pub kind: ErrorKind,

    /// Transport error code (e.g. `ENOTFOUND`, `ECONNREFUSED`)
    pub code: Option<String>,

    /// HTTP status, when a response was received
    pub status: Option<u16>,

    pub message: String,
}

impl CrawlError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message).with_code("ETIMEDOUT")
    }

    pub fn http_status(status: u16) -> Self {
        Self::new(ErrorKind::HttpStatus, format!("HTTP {}", status)).with_status(status)
    }

    pub fn bot_challenge(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BotChallenge, message)
    }

    pub fn is_retriable(&self) -> bool {
        self.kind.is_retriable()
    }

    pub fn can_escalate(&self) -> bool {
        self.kind.can_escalate()
    }

    /// Key used for the code/status histogram
    pub fn diagnostic_key(&self) -> String {
        match (&self.code, self.status) {
            (Some(code), _) => code.clone(),
            (None, Some(status)) => format!("HTTP_{}", status),
            (None, None) => self.kind.as_str().to_uppercase(),
        }
    }

    /// Classifies a failure known only by its message
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let (kind, code) = classify_message(&message);
        let error = Self::new(kind, message);
        match code {
            Some(code) => error.with_code(code),
            None => error,
        }
    }

    /// Classifies a transport-level reqwest failure
    ///
    /// Only the error's source chain is inspected; reqwest's own message
    /// embeds the request URL, whose path must not sway the classification.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            let status = status.as_u16();
            return classify_status(status).unwrap_or_else(|| Self::http_status(status));
        }

        let cause = source_chain_message(err);
        let (kind, code) = classify_transport(&cause, err.is_timeout(), err.is_connect());

        let message = if cause.is_empty() {
            err.to_string()
        } else {
            cause
        };
        let error = Self::new(kind, message);
        match code {
            Some(code) => error.with_code(code),
            None => error,
        }
    }
}

/// Maps an HTTP status to a failure, or `None` for success statuses
///
/// 403 and 503 are how bot-protection layers usually answer automated clients,
/// so they are reported as challenges rather than plain status failures.
pub fn classify_status(status: u16) -> Option<CrawlError> {
    match status {
        200..=399 => None,
        403 | 503 => Some(
            CrawlError::bot_challenge(format!("HTTP {} (possible bot protection)", status))
                .with_status(status),
        ),
        _ => Some(CrawlError::http_status(status)),
    }
}

/// Classifies a transport failure from reqwest's flags and its cause text
///
/// Timeouts win outright. A connect failure is DNS when its cause says so and
/// a connection failure otherwise.
pub fn classify_transport(
    cause: &str,
    is_timeout: bool,
    is_connect: bool,
) -> (ErrorKind, Option<&'static str>) {
    if is_timeout {
        return (ErrorKind::Timeout, Some("ETIMEDOUT"));
    }

    match classify_message(cause) {
        (ErrorKind::Unknown, _) if is_connect => (ErrorKind::Connection, None),
        classified => classified,
    }
}

/// Classifies a transport error from its message text
///
/// Returns the kind and, when recognizable, a POSIX-style error code.
pub fn classify_message(message: &str) -> (ErrorKind, Option<&'static str>) {
    let msg = message.to_lowercase();

    const DNS_MARKERS: &[&str] = &[
        "dns error",
        "failed to lookup address",
        "name or service not known",
        "no such host",
        "nodename nor servname",
        "enotfound",
        "name resolution",
        "no address associated",
        "err_name_not_resolved",
    ];

    if DNS_MARKERS.iter().any(|m| msg.contains(m)) {
        return (ErrorKind::Dns, Some("ENOTFOUND"));
    }

    if msg.contains("timed out")
        || msg.contains("timeout")
        || msg.contains("timed_out")
        || msg.contains("etimedout")
    {
        return (ErrorKind::Timeout, Some("ETIMEDOUT"));
    }

    if msg.contains("connection refused")
        || msg.contains("connection_refused")
        || msg.contains("econnrefused")
    {
        return (ErrorKind::Connection, Some("ECONNREFUSED"));
    }

    if msg.contains("connection reset")
        || msg.contains("connection_reset")
        || msg.contains("econnreset")
        || msg.contains("broken pipe")
    {
        return (ErrorKind::Connection, Some("ECONNRESET"));
    }

    if msg.contains("unreachable") {
        return (ErrorKind::Connection, Some("EHOSTUNREACH"));
    }

    if msg.contains("certificate") || msg.contains("tls") || msg.contains("handshake") {
        return (ErrorKind::Connection, Some("TLS_ERROR"));
    }

    if msg.contains("connection closed") || msg.contains("unexpected eof") {
        return (ErrorKind::Connection, Some("ECONNABORTED"));
    }

    (ErrorKind::Unknown, None)
}

/// Joins the sources of an error (not the error itself) into one message
fn source_chain_message(err: &dyn StdError) -> String {
    let mut parts = Vec::new();
    let mut source = err.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}
