//! Architecture configuration.
//!
//! Holds the tunable parameters of the machine: the active word length,
//! the display base used by front ends, and the (fixed) memory size.
//! Changes are validated against the supported sets before taking effect.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Word lengths the machine supports, in bits.
pub const SUPPORTED_WORD_LENGTHS: [u32; 2] = [10, 16];

/// Number of addressable memory cells.
pub const MEMORY_SIZE: usize = 64;

/// Numeric base used when rendering register and memory values.
///
/// Display-only: has no effect on execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayBase {
    Bin,
    Hex,
    Dec,
}

impl DisplayBase {
    /// Format a word value in this base.
    pub fn format(&self, value: u32, word_length: u32) -> String {
        match self {
            DisplayBase::Bin => format!("{:0width$b}", value, width = word_length as usize),
            DisplayBase::Hex => format!("{:0width$x}", value, width = (word_length as usize + 3) / 4),
            DisplayBase::Dec => format!("{}", value),
        }
    }
}

impl fmt::Display for DisplayBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayBase::Bin => write!(f, "bin"),
            DisplayBase::Hex => write!(f, "hex"),
            DisplayBase::Dec => write!(f, "dec"),
        }
    }
}

impl FromStr for DisplayBase {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bin" => Ok(DisplayBase::Bin),
            "hex" => Ok(DisplayBase::Hex),
            "dec" => Ok(DisplayBase::Dec),
            _ => Err(ConfigError::UnsupportedDisplayBase(s.to_string())),
        }
    }
}

/// Machine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Active word length in bits. Always a member of [`SUPPORTED_WORD_LENGTHS`].
    pub word_length: u32,
    /// Base used by display consumers.
    pub display_base: DisplayBase,
    /// Number of memory cells.
    pub memory_size: usize,
}

impl Config {
    /// Default configuration: 16-bit words, binary display, 64 cells.
    pub fn new() -> Self {
        Self {
            word_length: 16,
            display_base: DisplayBase::Bin,
            memory_size: MEMORY_SIZE,
        }
    }

    /// Change the word length, rejecting unsupported widths.
    pub fn set_word_length(&mut self, bits: u32) -> Result<(), ConfigError> {
        if !SUPPORTED_WORD_LENGTHS.contains(&bits) {
            return Err(ConfigError::UnsupportedWordLength(bits));
        }
        self.word_length = bits;
        Ok(())
    }

    /// Change the display base. `DisplayBase` values are valid by
    /// construction; unknown base names are rejected in `FromStr`.
    pub fn set_display_base(&mut self, base: DisplayBase) {
        self.display_base = base;
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors from configuration changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unsupported word length: {0} (supported: 10, 16)")]
    UnsupportedWordLength(u32),

    #[error("unsupported display base: '{0}' (supported: bin, hex, dec)")]
    UnsupportedDisplayBase(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert_eq!(config.word_length, 16);
        assert_eq!(config.display_base, DisplayBase::Bin);
        assert_eq!(config.memory_size, 64);
    }

    #[test]
    fn test_word_length_validation() {
        let mut config = Config::new();

        config.set_word_length(10).unwrap();
        assert_eq!(config.word_length, 10);

        let err = config.set_word_length(12).unwrap_err();
        assert_eq!(err, ConfigError::UnsupportedWordLength(12));
        // Rejected change leaves the config untouched
        assert_eq!(config.word_length, 10);
    }

    #[test]
    fn test_display_base_parse() {
        assert_eq!("bin".parse::<DisplayBase>().unwrap(), DisplayBase::Bin);
        assert_eq!("HEX".parse::<DisplayBase>().unwrap(), DisplayBase::Hex);
        assert_eq!("dec".parse::<DisplayBase>().unwrap(), DisplayBase::Dec);
        assert!("oct".parse::<DisplayBase>().is_err());
    }

    #[test]
    fn test_display_base_format() {
        assert_eq!(DisplayBase::Bin.format(5, 10), "0000000101");
        assert_eq!(DisplayBase::Hex.format(255, 16), "00ff");
        assert_eq!(DisplayBase::Dec.format(65535, 16), "65535");
    }
}
