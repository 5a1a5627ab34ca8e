//! Chip database for runtime loading and lookup
//!
//! This module provides the `ChipDatabase` type for loading chip definitions
//! from JSON files at runtime, plus the process-wide database used by the
//! flash runner.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use thiserror::Error;

use super::types::{EraseBlock, FlashChip, WriteGranularity};
use super::Features;

/// Chip definitions compiled into the binary
pub const BUILTIN_CHIPS_JSON: &str = include_str!("../../../../chips/spi_flash_chips.json");

/// Error type for chip database operations
#[derive(Debug, Error)]
pub enum ChipDbError {
    /// I/O error reading a database file or directory
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File or directory being read
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },
    /// JSON parsing error
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// Validation error
    #[error("validation error: {0}")]
    Validation(String),
}

// ============================================================================
// JSON deserialization types (intermediate format)
// ============================================================================

/// Size specification with human-readable units, e.g. `{"KiB": 4}`
#[derive(Debug, Clone, Copy, Deserialize)]
pub enum Size {
    /// Size in bytes
    B(u32),
    /// Size in kibibytes (1024 bytes)
    KiB(u32),
    /// Size in mebibytes (1024 * 1024 bytes)
    MiB(u32),
}

impl Size {
    /// Convert to bytes, `None` if the result does not fit in 32 bits
    pub fn to_bytes(self) -> Option<u32> {
        match self {
            Size::B(n) => Some(n),
            Size::KiB(n) => n.checked_mul(1024),
            Size::MiB(n) => n.checked_mul(1024 * 1024),
        }
    }
}

/// Sector sizes must be powers of two no larger than the chip; a block
/// covering the whole chip is the chip erase
fn valid_erase_size(size: u32, total_size: u32) -> bool {
    size == total_size || (size.is_power_of_two() && size < total_size)
}

/// Accepts either a JSON number or a `"0x..."` / decimal string
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

fn parse_number(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

fn deserialize_hex<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    let value = match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => n,
        NumberOrString::String(s) => parse_number(&s)
            .ok_or_else(|| de::Error::custom(format!("invalid number: {:?}", s)))?,
    };
    T::try_from(value).map_err(|_| de::Error::custom(format!("value out of range: {:#x}", value)))
}

/// Feature flags for flash chips (JSON format)
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
struct FeaturesDef {
    four_byte_enter: bool,
    four_byte_native: bool,
}

impl From<FeaturesDef> for Features {
    fn from(def: FeaturesDef) -> Self {
        let mut f = Features::empty();
        if def.four_byte_enter {
            f |= Features::FOUR_BYTE_ENTER;
        }
        if def.four_byte_native {
            f |= Features::FOUR_BYTE_NATIVE;
        }
        f
    }
}

/// Erase block definition in JSON format
#[derive(Debug, Clone, Deserialize)]
struct EraseBlockDef {
    #[serde(deserialize_with = "deserialize_hex")]
    opcode: u8,
    size: Size,
}

/// Write granularity (JSON format)
#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
enum WriteGranularityDef {
    Bit,
    Byte,
    #[default]
    Page,
}

impl From<WriteGranularityDef> for WriteGranularity {
    fn from(def: WriteGranularityDef) -> Self {
        match def {
            WriteGranularityDef::Bit => WriteGranularity::Bit,
            WriteGranularityDef::Byte => WriteGranularity::Byte,
            WriteGranularityDef::Page => WriteGranularity::Page,
        }
    }
}

/// Single chip definition in JSON format
#[derive(Debug, Clone, Deserialize)]
struct ChipDef {
    name: String,
    #[serde(deserialize_with = "deserialize_hex")]
    device_id: u16,
    total_size: Size,
    #[serde(default = "default_page_size")]
    page_size: u16,
    #[serde(default)]
    features: FeaturesDef,
    #[serde(default)]
    write_granularity: WriteGranularityDef,
    #[serde(default)]
    erase_blocks: Vec<EraseBlockDef>,
}

fn default_page_size() -> u16 {
    256
}

/// Vendor definition containing multiple chips
#[derive(Debug, Clone, Deserialize)]
struct VendorDef {
    vendor: String,
    #[serde(deserialize_with = "deserialize_hex")]
    manufacturer_id: u8,
    chips: Vec<ChipDef>,
}

// ============================================================================
// Chip database
// ============================================================================

/// Runtime chip database
///
/// Holds a collection of flash chip definitions that can be loaded from JSON
/// files. Lookup is by JEDEC (manufacturer, device) pair.
#[derive(Debug, Clone, Default)]
pub struct ChipDatabase {
    chips: Vec<FlashChip>,
}

impl ChipDatabase {
    /// Create an empty chip database
    pub fn new() -> Self {
        Self { chips: Vec::new() }
    }

    /// Create a database holding the built-in chip definitions
    pub fn builtin() -> Result<Self, ChipDbError> {
        let mut db = Self::new();
        db.load_json(BUILTIN_CHIPS_JSON)?;
        Ok(db)
    }

    /// Load chip definitions from a JSON file or a directory of JSON files
    pub fn load_path(&mut self, path: &Path) -> Result<usize, ChipDbError> {
        if path.is_dir() {
            self.load_dir(path)
        } else {
            self.load_file(path)
        }
    }

    /// Load chip definitions from a single JSON file
    pub fn load_file(&mut self, path: &Path) -> Result<usize, ChipDbError> {
        let content = fs::read_to_string(path).map_err(|source| ChipDbError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_json(&content)
    }

    /// Load chip definitions from a JSON string
    ///
    /// Returns the number of chips added. Chips whose JEDEC ID is already
    /// known are skipped with a warning.
    pub fn load_json(&mut self, content: &str) -> Result<usize, ChipDbError> {
        let vendors: Vec<VendorDef> = serde_json::from_str(content)?;
        let mut added = 0;

        for vendor_def in vendors {
            for chip_def in vendor_def.chips {
                if chip_def.erase_blocks.is_empty() {
                    return Err(ChipDbError::Validation(format!(
                        "{} {} has no erase blocks",
                        vendor_def.vendor, chip_def.name
                    )));
                }

                let total_size = chip_def.total_size.to_bytes().ok_or_else(|| {
                    ChipDbError::Validation(format!(
                        "{} {} total size {:?} does not fit in 32 bits",
                        vendor_def.vendor, chip_def.name, chip_def.total_size
                    ))
                })?;
                if chip_def.page_size == 0 || total_size == 0 {
                    return Err(ChipDbError::Validation(format!(
                        "{} {} has a zero page or total size",
                        vendor_def.vendor, chip_def.name
                    )));
                }

                let mut erase_blocks = Vec::with_capacity(chip_def.erase_blocks.len());
                for eb in &chip_def.erase_blocks {
                    let size = eb
                        .size
                        .to_bytes()
                        .filter(|&size| valid_erase_size(size, total_size))
                        .ok_or_else(|| {
                            ChipDbError::Validation(format!(
                                "{} {} erase block 0x{:02X} has invalid size {:?}",
                                vendor_def.vendor, chip_def.name, eb.opcode, eb.size
                            ))
                        })?;
                    erase_blocks.push(EraseBlock::new(eb.opcode, size));
                }
                erase_blocks.sort_by_key(|eb| eb.size);

                let chip = FlashChip {
                    vendor: vendor_def.vendor.clone(),
                    name: chip_def.name,
                    jedec_manufacturer: vendor_def.manufacturer_id,
                    jedec_device: chip_def.device_id,
                    total_size,
                    page_size: chip_def.page_size,
                    features: chip_def.features.into(),
                    write_granularity: chip_def.write_granularity.into(),
                    erase_blocks,
                };

                if let Some(existing) =
                    self.find_by_jedec_id(chip.jedec_manufacturer, chip.jedec_device)
                {
                    log::warn!(
                        "Duplicate JEDEC ID {} for {} {}, keeping {} {}",
                        chip.jedec_id(),
                        chip.vendor,
                        chip.name,
                        existing.vendor,
                        existing.name
                    );
                    continue;
                }

                self.chips.push(chip);
                added += 1;
            }
        }

        Ok(added)
    }

    /// Load all JSON files from a directory
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, ChipDbError> {
        let io_err = |source| ChipDbError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        // Directory order is unspecified; sort so duplicate handling is stable
        paths.sort();

        let mut total = 0;
        for path in paths {
            total += self.load_file(&path)?;
        }
        Ok(total)
    }

    /// Get all chips in the database
    pub fn chips(&self) -> &[FlashChip] {
        &self.chips
    }

    /// Get the number of chips in the database
    pub fn len(&self) -> usize {
        self.chips.len()
    }

    /// Check if the database is empty
    pub fn is_empty(&self) -> bool {
        self.chips.is_empty()
    }

    /// Find a chip by its JEDEC ID
    pub fn find_by_jedec_id(&self, manufacturer: u8, device: u16) -> Option<&FlashChip> {
        self.chips
            .iter()
            .find(|c| c.matches_jedec_id(manufacturer, device))
    }

    /// Find chips by vendor (case-insensitive partial match)
    pub fn find_by_vendor(&self, vendor: &str) -> Vec<&FlashChip> {
        let vendor_lower = vendor.to_lowercase();
        self.chips
            .iter()
            .filter(|c| c.vendor.to_lowercase().contains(&vendor_lower))
            .collect()
    }

    /// Iterate over all chips
    pub fn iter(&self) -> impl Iterator<Item = &FlashChip> {
        self.chips.iter()
    }
}

// ============================================================================
// Process-wide database
// ============================================================================

static GLOBAL_DB: OnceCell<ChipDatabase> = OnceCell::new();

/// Initialize the process-wide chip database
///
/// The first successful call loads either the built-in definitions or, when
/// `path` is given, the file or directory it names. Later calls return the
/// same instance and ignore `path`. A failed load leaves the database
/// uninitialized so a later call may try again.
pub fn initialize(path: Option<&Path>) -> Result<&'static ChipDatabase, ChipDbError> {
    if let (Some(db), Some(path)) = (GLOBAL_DB.get(), path) {
        log::debug!(
            "Chip database already loaded ({} chips), ignoring {}",
            db.len(),
            path.display()
        );
    }

    GLOBAL_DB.get_or_try_init(|| {
        let mut db = ChipDatabase::new();
        let count = match path {
            Some(path) => {
                log::debug!("Loading chip database from {}", path.display());
                db.load_path(path)?
            }
            None => db.load_json(BUILTIN_CHIPS_JSON)?,
        };
        log::debug!("Loaded {} chip definitions", count);
        Ok(db)
    })
}
