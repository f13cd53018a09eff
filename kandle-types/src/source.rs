use core::fmt;
use serde::{Deserialize, Serialize};

/// Provenance tag for a frame of candles.
///
/// The numeric priority decides which row survives when two sources emit
/// the same `open_time`: REST > CACHE > VISION > UNKNOWN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataSource {
    /// Provenance untracked (lowest priority on conflicts).
    Unknown,
    /// Bulk daily archive (zipped CSV + checksum).
    Vision,
    /// Local daily Arrow IPC cache.
    Cache,
    /// Live REST API (highest priority on conflicts).
    Rest,
}

impl DataSource {
    /// Merge priority; higher wins on duplicate `open_time`.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Vision => 1,
            Self::Cache => 2,
            Self::Rest => 3,
        }
    }

    /// Uppercase tag stored in the `_data_source` provenance column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Vision => "VISION",
            Self::Cache => "CACHE",
            Self::Rest => "REST",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Restricts `get_data` to a subset of the source chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EnforceSource {
    /// Run the full CACHE → VISION → REST chain.
    #[default]
    Auto,
    /// Consult only the local cache.
    Cache,
    /// Consult only the bulk archive.
    Vision,
    /// Consult only the live REST API.
    Rest,
}

impl EnforceSource {
    /// The single source selected, or `None` for the full chain.
    #[must_use]
    pub const fn only(self) -> Option<DataSource> {
        match self {
            Self::Auto => None,
            Self::Cache => Some(DataSource::Cache),
            Self::Vision => Some(DataSource::Vision),
            Self::Rest => Some(DataSource::Rest),
        }
    }
}
