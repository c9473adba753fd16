//! Provisioning frame parsing.
//!
//! During provisioning the appliance pushes a sequence of independent,
//! order-agnostic text frames over its notification characteristic.  Each
//! frame is UTF-8 of the form `<FIELD>:<value>`:
//!
//! ```text
//! IP:192.168.0.47
//! PORT:1883
//! USER:Mariano_Sanchez
//! PASSWORD:0001
//! CLIENT_ID:TK-2025-MA00-0001
//! Error:Datos de red incorrectos
//! ```
//!
//! The `Error` sentinel carries a human-readable failure reason exactly as
//! the appliance produced it.  Frames may repeat; the consumer applies
//! last-write-wins per field.  A malformed frame (missing delimiter, unknown
//! field name) must never crash the assembler — the parser reports a typed
//! error and the caller drops the frame.

use thiserror::Error;

/// Error type for frame parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The frame has no `:` delimiter.
    #[error("frame has no field delimiter: {0:?}")]
    MissingDelimiter(String),
    /// The field name before the delimiter is not part of the protocol.
    #[error("unknown provisioning field: {0:?}")]
    UnknownField(String),
    /// The frame bytes are not valid UTF-8.
    #[error("frame is not valid UTF-8")]
    NotUtf8,
}

/// One parsed provisioning frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Ip(String),
    Port(String),
    User(String),
    Password(String),
    ClientId(String),
    /// Appliance-reported provisioning failure, message verbatim.
    Error(String),
}

/// Parses one text frame into a [`Fragment`].
///
/// The value is everything after the *first* `:`, unaltered — broker
/// passwords may legitimately contain colons.
///
/// # Errors
///
/// Returns [`FrameError`] for frames without a delimiter or with an
/// unrecognised field name.
pub fn parse_fragment(frame: &str) -> Result<Fragment, FrameError> {
    let (field, value) = frame
        .split_once(':')
        .ok_or_else(|| FrameError::MissingDelimiter(frame.to_string()))?;

    let value = value.to_string();
    match field {
        "IP" => Ok(Fragment::Ip(value)),
        "PORT" => Ok(Fragment::Port(value)),
        "USER" => Ok(Fragment::User(value)),
        "PASSWORD" => Ok(Fragment::Password(value)),
        "CLIENT_ID" => Ok(Fragment::ClientId(value)),
        "Error" => Ok(Fragment::Error(value)),
        other => Err(FrameError::UnknownField(other.to_string())),
    }
}

/// Decodes raw notification bytes and parses them as a frame.
pub fn parse_notification(bytes: &[u8]) -> Result<Fragment, FrameError> {
    let text = std::str::from_utf8(bytes).map_err(|_| FrameError::NotUtf8)?;
    parse_fragment(text)
}
