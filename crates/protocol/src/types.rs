use std::fmt;

use serde::{Deserialize, Serialize};

/// How the destination file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferMode {
    /// `STOR`: create or overwrite.
    #[serde(rename = "STOR")]
    Write,
    /// `APPE`: append to an existing file, creating it if missing.
    #[serde(rename = "APPE")]
    Append,
}

impl TransferMode {
    /// Every directive handled by the upload core.
    pub const ALL: [TransferMode; 2] = [TransferMode::Write, TransferMode::Append];

    /// Maps a command directive to a mode (case-insensitive).
    pub fn from_directive(directive: &str) -> Option<Self> {
        if directive.eq_ignore_ascii_case("STOR") {
            Some(Self::Write)
        } else if directive.eq_ignore_ascii_case("APPE") {
            Some(Self::Append)
        } else {
            None
        }
    }

    /// The command directive for this mode.
    pub fn directive(self) -> &'static str {
        match self {
            Self::Write => "STOR",
            Self::Append => "APPE",
        }
    }

    /// Usage line shown by HELP.
    pub fn syntax(self) -> String {
        format!("{} <path>", self.directive())
    }

    /// One-line description shown by HELP.
    pub fn description(self) -> &'static str {
        match self {
            Self::Write => "Store data as a file at the server site",
            Self::Append => "Append to a file at the server site",
        }
    }

    pub fn is_append(self) -> bool {
        matches!(self, Self::Append)
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.directive())
    }
}

/// A single upload, as dispatched from the control channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    /// Path as sent by the client.
    pub target_path: String,
    pub mode: TransferMode,
    /// Byte offset from a preceding REST, zero when none was given.
    #[serde(default)]
    pub resume_offset: u64,
}

impl UploadRequest {
    pub fn new(target_path: impl Into<String>, mode: TransferMode) -> Self {
        Self {
            target_path: target_path.into(),
            mode,
            resume_offset: 0,
        }
    }

    pub fn with_resume_offset(mut self, offset: u64) -> Self {
        self.resume_offset = offset;
        self
    }
}
