//! Unified error types for the OccuCount firmware.
//!
//! A single `Error` enum that every subsystem converts into, so the FSM
//! handlers can route any failure to the same recovery path.  All variants
//! are `Copy` so they travel through the FSM context without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The register store is absent or an access failed.
    Storage(StorageError),
    /// The cellular link or cloud endpoint failed.
    Comms(CommsError),
    /// A configuration value or operator command was rejected.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

/// Errors from the persistent register store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The store did not answer at boot.
    Absent,
    /// A bus transaction failed mid-operation.
    Bus,
    /// The schema version byte is still wrong after a reset attempt.
    SchemaMismatch { found: u8 },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "register store not present"),
            Self::Bus => write!(f, "register store bus error"),
            Self::SchemaMismatch { found } => write!(f, "schema version mismatch (found {found})"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    /// The link did not come up inside the connect window.
    ConnectTimeout,
    /// Publish was attempted while the link was down.
    NotConnected,
    /// The transport refused or dropped a publish.
    PublishFailed,
    /// A report is already awaiting acknowledgment.
    ReportOutstanding,
    /// The report payload could not be encoded.
    Encode,
    /// The modem did not answer an AT command.
    ModemUnresponsive,
    /// Neither the silent reset nor the reset line brought the modem back.
    ModemResetFailed,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectTimeout => write!(f, "cellular connect timed out"),
            Self::NotConnected => write!(f, "cellular link down"),
            Self::PublishFailed => write!(f, "publish failed"),
            Self::ReportOutstanding => write!(f, "report already in flight"),
            Self::Encode => write!(f, "report encoding failed"),
            Self::ModemUnresponsive => write!(f, "modem not answering"),
            Self::ModemResetFailed => write!(f, "modem reset failed"),
        }
    }
}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration validation and the operator console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A value failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// The argument could not be parsed at all.
    Malformed(&'static str),
    /// No console function with that name exists.
    UnknownFunction,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::Malformed(msg) => write!(f, "malformed argument: {msg}"),
            Self::UnknownFunction => write!(f, "unknown function"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_subsystem() {
        let e: Error = StorageError::SchemaMismatch { found: 7 }.into();
        assert_eq!(e.to_string(), "storage: schema version mismatch (found 7)");
        let e: Error = CommsError::ModemResetFailed.into();
        assert_eq!(e.to_string(), "comms: modem reset failed");
    }

    #[test]
    fn config_error_carries_field() {
        let e: Error = ConfigError::ValidationFailed("open_hour must be 0..=23").into();
        assert!(e.to_string().contains("open_hour"));
    }
}
