//! Identified flash chip

use ftflasher_core::chip::{FlashChip, JedecId};

/// JEDEC ID read from the chip, plus its database entry if there is one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipIdentity {
    /// Raw ID (an all-ones answer is already folded to zero)
    pub jedec: JedecId,
    /// Matching database entry
    pub chip: Option<FlashChip>,
}

impl ChipIdentity {
    /// Identity for an ID and its lookup result
    pub fn new(jedec: JedecId, chip: Option<FlashChip>) -> Self {
        Self { jedec, chip }
    }

    /// Whether the database knows the chip
    pub fn is_known(&self) -> bool {
        self.chip.is_some()
    }

    /// ID as uppercase, space separated hex (`EF 40 18`)
    pub fn jedec_hex(&self) -> String {
        self.jedec.to_string()
    }

    /// One-line description: the chip if known, the raw ID otherwise
    pub fn summary(&self) -> String {
        match &self.chip {
            Some(chip) => format!("Flash: {}", chip),
            None => format!("Flash: {}", self.jedec_hex()),
        }
    }

    /// Label/value rows for an identify report
    pub fn rows(&self) -> Vec<(String, String)> {
        let device = self
            .chip
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        vec![
            ("JEDEC ID".to_string(), self.jedec_hex()),
            ("Device".to_string(), device),
        ]
    }
}
