use crate::preflight::PreflightResult;
use std::fmt;

#[derive(Debug)]
pub enum SignError {
    InvalidDimension(String),
    InvalidArgument(String),
    InvalidConfiguration(String),
    MissingRequiredField(&'static str),
    Preflight(PreflightError),
    Storage(String),
    Render(String),
    Io(std::io::Error),
}

impl fmt::Display for SignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignError::InvalidDimension(message) => write!(f, "invalid dimension: {}", message),
            SignError::InvalidArgument(message) => write!(f, "invalid argument: {}", message),
            SignError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            SignError::MissingRequiredField(field) => {
                write!(f, "missing required field: {}", field)
            }
            SignError::Preflight(err) => write!(f, "{}", err),
            SignError::Storage(message) => write!(f, "storage error: {}", message),
            SignError::Render(message) => write!(f, "render error: {}", message),
            SignError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for SignError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SignError::Io(err) => Some(err),
            SignError::Preflight(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SignError {
    fn from(value: std::io::Error) -> Self {
        SignError::Io(value)
    }
}

impl From<PreflightError> for SignError {
    fn from(value: PreflightError) -> Self {
        SignError::Preflight(value)
    }
}

/// Raised by the strict preflight wrapper. Carries the complete result so
/// callers can still report every violation and the measured metrics.
#[derive(Debug, Clone)]
pub struct PreflightError {
    pub result: PreflightResult,
}

impl fmt::Display for PreflightError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Preflight failed: {}", self.result.errors.join("; "))
    }
}

impl std::error::Error for PreflightError {}

/// Why an optional asset (headshot, brokerage logo) could not be used.
/// Renderers match on this to pick the documented fallback; it never
/// escapes a render call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetUnavailable {
    NoKey,
    Missing(String),
    Fetch { key: String, reason: String },
    Decode { key: String, reason: String },
}

impl fmt::Display for AssetUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetUnavailable::NoKey => write!(f, "no asset key supplied"),
            AssetUnavailable::Missing(key) => write!(f, "asset not found: {}", key),
            AssetUnavailable::Fetch { key, reason } => {
                write!(f, "asset fetch failed for {}: {}", key, reason)
            }
            AssetUnavailable::Decode { key, reason } => {
                write!(f, "asset decode failed for {}: {}", key, reason)
            }
        }
    }
}

impl std::error::Error for AssetUnavailable {}
