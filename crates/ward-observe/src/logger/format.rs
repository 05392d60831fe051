use std::{fmt, str::FromStr};

use crate::logger::error::LoggerError;

/// Output format of the agent log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoggerFormat {
    /// Human readable lines, optionally colored.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
    /// Native journald fields (linux, `journald` feature).
    Journald,
}

impl LoggerFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoggerFormat::Text => "text",
            LoggerFormat::Json => "json",
            LoggerFormat::Journald => "journald",
        }
    }

    pub fn is_supported(&self) -> bool {
        match self {
            LoggerFormat::Text | LoggerFormat::Json => true,
            LoggerFormat::Journald => cfg!(all(target_os = "linux", feature = "journald")),
        }
    }
}

impl fmt::Display for LoggerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoggerFormat {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format = match s.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" => LoggerFormat::Text,
            "json" => LoggerFormat::Json,
            "journald" | "journal" => LoggerFormat::Journald,
            _ => return Err(LoggerError::InvalidFormat(s.to_string())),
        };
        if !format.is_supported() {
            return Err(LoggerError::JournaldNotSupported);
        }
        Ok(format)
    }
}
