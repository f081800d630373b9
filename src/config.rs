use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::format::record::RecordLimits;
use crate::relocator::Relocator;

pub const DEFAULT_MEMORY_CAPACITY: usize = 16384;
pub const DEFAULT_PAGE_SIZE: u32 = 64;
pub const DEFAULT_MIN_RELOCATION: u32 = 0x1230;
pub const DEFAULT_MAX_RELOCATION: u32 = 0x6000;
/// Highest load address the six-digit output field can carry.
pub const MAX_LOAD_ADDRESS: u32 = 0x00ff_ffff;

// Smallest token buffers that still hold every fixed field plus terminator.
const MIN_TEXT_RECORD_SIZE: usize = 10;
const MIN_MODIFICATION_RECORD_SIZE: usize = 8;
const MIN_END_RECORD_SIZE: usize = 8;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("memory capacity must be non-zero")]
    ZeroCapacity,
    #[error("page size must be non-zero")]
    ZeroPageSize,
    #[error("relocation window {min:#x}..={max:#x} holds no address aligned to {page_size}")]
    EmptyWindow { min: u32, max: u32, page_size: u32 },
    #[error("relocation window ends at {0:#x}, past the six-digit address range")]
    WindowTooWide(u32),
    #[error("load address {0:#x} is not a page-aligned address inside the relocation window")]
    LoadAddressNotCandidate(u32),
    #[error("{name} must be at least {min}, got {value}")]
    LimitTooSmall {
        name: &'static str,
        min: usize,
        value: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    pub memory_capacity: usize,
    pub page_size: u32,
    pub min_relocation: u32,
    pub max_relocation: u32,
    /// Fixed load address; when set no random choice is made.
    pub load_address: Option<u32>,
    pub seed: Option<u64>,
    pub limits: RecordLimits,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            page_size: DEFAULT_PAGE_SIZE,
            min_relocation: DEFAULT_MIN_RELOCATION,
            max_relocation: DEFAULT_MAX_RELOCATION,
            load_address: None,
            seed: None,
            limits: RecordLimits::default(),
        }
    }
}

impl LoaderConfig {
    /// # Errors
    /// Returns `ConfigError::Parse` for invalid TOML or unknown keys.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// # Errors
    /// Returns `ConfigError::Read` when the file cannot be read and
    /// `ConfigError::Parse` when it is not a valid config.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Checks every setting and returns the relocator for the window.
    ///
    /// # Errors
    /// Returns the first `ConfigError` found.
    pub fn validate(&self) -> Result<Relocator, ConfigError> {
        if self.memory_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        if self.max_relocation > MAX_LOAD_ADDRESS {
            return Err(ConfigError::WindowTooWide(self.max_relocation));
        }
        let relocator = Relocator::new(self.page_size, self.min_relocation, self.max_relocation)
            .ok_or(ConfigError::EmptyWindow {
                min: self.min_relocation,
                max: self.max_relocation,
                page_size: self.page_size,
            })?;
        if let Some(address) = self.load_address {
            if !relocator.is_candidate(address) {
                return Err(ConfigError::LoadAddressNotCandidate(address));
            }
        }
        for (name, min, value) in [
            ("text_record_size", MIN_TEXT_RECORD_SIZE, self.limits.text_record_size),
            (
                "modification_record_size",
                MIN_MODIFICATION_RECORD_SIZE,
                self.limits.modification_record_size,
            ),
            ("end_record_size", MIN_END_RECORD_SIZE, self.limits.end_record_size),
        ] {
            if value < min {
                return Err(ConfigError::LimitTooSmall { name, min, value });
            }
        }
        Ok(relocator)
    }
}
