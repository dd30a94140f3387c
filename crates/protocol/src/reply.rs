//! Numeric control-channel replies.
//!
//! # Wire format
//!
//! ```text
//! single line:  "150 Opening data connection\r\n"
//! multi line:   "226-first\r\n226-second\r\n226 last\r\n"
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reply codes emitted by the upload core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum ReplyCode {
    /// 150: data connection opening, transfer starting.
    DataConnectionOpening,
    /// 226: transfer complete.
    TransferComplete,
    /// 402: the storage backend cannot write.
    NotSupported,
    /// 425: the data connection was not established in time.
    CantOpenDataConnection,
    /// 550: the requested action was not taken.
    FileUnavailable,
}

impl ReplyCode {
    /// Numeric value sent on the wire.
    pub fn as_u16(self) -> u16 {
        match self {
            Self::DataConnectionOpening => 150,
            Self::TransferComplete => 226,
            Self::NotSupported => 402,
            Self::CantOpenDataConnection => 425,
            Self::FileUnavailable => 550,
        }
    }

    /// Text used when a reply carries no payload of its own.
    pub fn default_text(self) -> &'static str {
        match self {
            Self::DataConnectionOpening => "File status okay; about to open data connection.",
            Self::TransferComplete => "Closing data connection. Requested file action successful.",
            Self::NotSupported => "Command not supported.",
            Self::CantOpenDataConnection => "Can't open data connection.",
            Self::FileUnavailable => "Requested action not taken. File unavailable.",
        }
    }

    /// Returns `true` for 1yz codes, which are followed by another reply.
    pub fn is_preliminary(self) -> bool {
        self.as_u16() < 200
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

impl From<ReplyCode> for u16 {
    fn from(code: ReplyCode) -> Self {
        code.as_u16()
    }
}

/// Error returned when a numeric code is not one the upload core emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown reply code: {0}")]
pub struct UnknownReplyCode(pub u16);

impl TryFrom<u16> for ReplyCode {
    type Error = UnknownReplyCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            150 => Ok(Self::DataConnectionOpening),
            226 => Ok(Self::TransferComplete),
            402 => Ok(Self::NotSupported),
            425 => Ok(Self::CantOpenDataConnection),
            550 => Ok(Self::FileUnavailable),
            other => Err(UnknownReplyCode(other)),
        }
    }
}

/// A reply to the client: a code plus optional text payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub code: ReplyCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Reply {
    /// A reply that uses the code's default text.
    pub fn new(code: ReplyCode) -> Self {
        Self { code, text: None }
    }

    /// A reply with an explicit payload.
    pub fn with_text(code: ReplyCode, text: impl Into<String>) -> Self {
        Self {
            code,
            text: Some(text.into()),
        }
    }

    /// The payload, falling back to the code's default text.
    pub fn text(&self) -> &str {
        match self.text.as_deref() {
            Some(text) if !text.is_empty() => text,
            _ => self.code.default_text(),
        }
    }
}

impl fmt::Display for Reply {
    /// Formats the reply as CRLF-terminated wire lines.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<&str> = self.text().lines().collect();
        match lines.split_last() {
            Some((last, rest)) => {
                for line in rest {
                    write!(f, "{}-{}\r\n", self.code, line)?;
                }
                write!(f, "{} {}\r\n", self.code, last)
            }
            None => write!(f, "{}\r\n", self.code),
        }
    }
}
