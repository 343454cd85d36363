use cdmload_core::{record, Mapping, Record, Storage, StoreError, Value};
use serde::Serialize;

use crate::error::CdmError;

/// Codes at or above this value are reserved and never minted.
pub const RESERVED_FROM: i64 = 90;

pub const SD_TABLE: &str = "SD";

/// One suppression code with its display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SdEntry {
    pub value: i64,
    pub symbol: String,
    pub desc_eng: String,
    pub desc_chi: String,
    pub suppressed: bool,
}

impl SdEntry {
    fn from_record(row: &Record) -> Option<Self> {
        let text = |col: &str| row.get(col).and_then(Value::as_text).unwrap_or_default().to_string();
        Some(Self {
            value: row.get("sd_value")?.as_int()?,
            symbol: row.get("sd_symbol")?.as_text()?.to_string(),
            desc_eng: text("sd_desc_eng"),
            desc_chi: text("sd_desc_chi"),
            suppressed: row.get("sd_suppressed").and_then(Value::as_int).unwrap_or(0) != 0,
        })
    }
}

/// Symbol ↔ numeric suppression code, backed by the `SD` table. The code
/// space is shared by every table processed in one run.
#[derive(Debug, Clone, Default)]
pub struct SuppressionRegistry {
    entries: Vec<SdEntry>,
    by_symbol: Mapping<i64>,
}

impl SuppressionRegistry {
    pub fn from_entries(entries: Vec<SdEntry>) -> Self {
        let by_symbol = entries.iter().map(|e| (e.symbol.clone(), e.value)).collect();
        Self { entries, by_symbol }
    }

    /// Read the full `SD` table.
    pub fn load(store: &mut dyn Storage) -> Result<Self, CdmError> {
        let rows = store.select(SD_TABLE, &Record::new())?;
        let entries = rows
            .iter()
            .filter_map(|row| {
                let entry = SdEntry::from_record(row);
                if entry.is_none() {
                    log::warn!("SD: skipping malformed row {row:?}");
                }
                entry
            })
            .collect();
        Ok(Self::from_entries(entries))
    }

    pub fn code(&self, symbol: &str) -> Option<i64> {
        self.by_symbol.get(symbol).copied()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.by_symbol.contains_key(symbol)
    }

    pub fn entries(&self) -> &[SdEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `max(code < 90) + 1`, or 1 on an empty registry.
    pub fn next_code(&self) -> Result<i64, CdmError> {
        let next = self
            .entries
            .iter()
            .map(|e| e.value)
            .filter(|v| *v < RESERVED_FROM)
            .max()
            .unwrap_or(0)
            + 1;
        if next >= RESERVED_FROM {
            return Err(CdmError::SuppressionExhausted);
        }
        Ok(next)
    }

    /// Register `symbol` under the next free code, persist it and reload the
    /// registry so later rows in the same pass see it.
    pub fn mint(
        &mut self,
        store: &mut dyn Storage,
        symbol: &str,
        desc_eng: &str,
        desc_chi: &str,
        suppressed: bool,
    ) -> Result<i64, CdmError> {
        let code = self.next_code()?;
        let mut row = record! {
            "sd_value" => code,
            "sd_symbol" => symbol,
            "sd_desc_eng" => desc_eng,
            "sd_desc_chi" => desc_chi,
        };
        if suppressed {
            row.insert("sd_suppressed".into(), Value::Int(1));
        }
        match store.insert(SD_TABLE, &row) {
            Ok(()) => log::info!("SD: minted code {code} for '{symbol}'"),
            Err(StoreError::DuplicateKey { .. }) => log::warn!("SD: '{symbol}' already stored"),
            Err(e) => return Err(e.into()),
        }

        *self = Self::load(store)?;
        self.code(symbol)
            .ok_or_else(|| CdmError::Reference(format!("suppression symbol '{symbol}' missing after insert")))
    }
}
