//! FAS row reconciliation: footnote markers are attached to the catalog,
//! measure symbols are resolved against the suppression registry and every
//! row that fully matches the sheet's descriptions becomes an [`Observation`].

use cdmload_core::{FasRow, Storage};
use indexmap::IndexMap;
use serde::Serialize;

use crate::catalog::{FieldCatalog, Section, FOOTNOTE_SUFFIX};
use crate::error::CdmError;
use crate::footnote::{strip_parens, FootnoteRegistry};
use crate::suppression::SuppressionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Measure {
    pub obs_value: f64,
    pub sd_value: i64,
}

/// One accepted FAS row, split by section.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Observation {
    /// Classification field → matched description.
    pub cv: IndexMap<String, String>,
    /// Statistical-variable field → matched description.
    pub sv: IndexMap<String, String>,
    /// Measure field → value and suppression code.
    pub mdt: IndexMap<String, Measure>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reconciliation {
    pub observations: Vec<Observation>,
    pub rows: usize,
    pub excluded: usize,
}

/// Drop `<br>` from value cells, fix the `N.A` typo and leave out empty cells.
pub fn normalize_row(raw: &FasRow) -> FasRow {
    raw.iter()
        .filter_map(|(column, value)| {
            let mut v = if column.ends_with(FOOTNOTE_SUFFIX) {
                value.clone()
            } else {
                value.replace("<br>", "")
            };
            if v == "N.A" {
                v = "N.A.".to_string();
            }
            (!v.trim().is_empty()).then(|| (column.clone(), v))
        })
        .collect()
}

/// Measure text without spaces and thousands separators.
pub fn normalize_measure(text: &str) -> String {
    text.chars().filter(|c| *c != ' ' && *c != ',').collect()
}

pub struct Reconciler<'a> {
    table_code: &'a str,
    catalog: &'a mut FieldCatalog,
    footnotes: &'a FootnoteRegistry,
    suppression: &'a mut SuppressionRegistry,
    store: &'a mut dyn Storage,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        table_code: &'a str,
        catalog: &'a mut FieldCatalog,
        footnotes: &'a FootnoteRegistry,
        suppression: &'a mut SuppressionRegistry,
        store: &'a mut dyn Storage,
    ) -> Self {
        Self {
            table_code,
            catalog,
            footnotes,
            suppression,
            store,
        }
    }

    /// Reconcile every row. Only storage failures and suppression-code
    /// exhaustion abort; mismatching rows are logged and skipped.
    pub fn run(&mut self, rows: &[FasRow]) -> Result<Reconciliation, CdmError> {
        let mut out = Reconciliation {
            rows: rows.len(),
            ..Default::default()
        };
        for (i, raw) in rows.iter().enumerate() {
            let mut row = normalize_row(raw);
            self.attach_footnotes(&row)?;
            self.register_symbols(&mut row)?;
            match self.observe(i + 1, &row) {
                Some(obs) => out.observations.push(obs),
                None => out.excluded += 1,
            }
        }
        log::info!(
            "table {}: {} of {} FAS row(s) reconciled",
            self.table_code,
            out.observations.len(),
            out.rows
        );
        Ok(out)
    }

    /// Footnote markers: one character per note, positionally numbered.
    fn attach_footnotes(&mut self, row: &FasRow) -> Result<(), CdmError> {
        for (field, fn_col) in self.catalog.tracked_columns() {
            let (Some(desc), Some(markers)) = (row.get(&field), row.get(&fn_col)) else {
                continue;
            };
            let symbols: Vec<String> = strip_parens(markers)
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(String::from)
                .collect();

            for section in self.catalog.sections_of(&field) {
                if section == Section::Mdt {
                    let value = normalize_measure(desc);
                    for symbol in &symbols {
                        let code = self.resolve_symbol(symbol)?;
                        self.catalog.stash_suppression(&field, &value, code);
                    }
                    continue;
                }
                if !self.catalog.knows(section, &field, desc) {
                    continue;
                }
                for (i, symbol) in symbols.iter().enumerate() {
                    let Some(note) = self.footnotes.get(symbol) else {
                        log::debug!("table {}: no footnote text for marker '{symbol}'", self.table_code);
                        continue;
                    };
                    let slot = u8::try_from(i + 1).unwrap_or(u8::MAX);
                    self.catalog.attach_footnote(section, &field, desc, slot, note.clone());
                }
            }
        }
        Ok(())
    }

    /// Normalize measure cells in place; unseen non-numeric values become
    /// suppression symbols.
    fn register_symbols(&mut self, row: &mut FasRow) -> Result<(), CdmError> {
        for field in self.catalog.measure_fields() {
            let Some(cell) = row.get_mut(&field) else {
                continue;
            };
            *cell = normalize_measure(cell);
            if cell.is_empty() {
                row.shift_remove(&field);
                continue;
            }
            let value = cell.clone();
            if value.parse::<f64>().is_err() && !self.suppression.contains(&value) {
                self.resolve_symbol(&value)?;
            }
        }
        Ok(())
    }

    /// Code of `symbol`, minting it (with footnote text when there is some)
    /// on first sight.
    fn resolve_symbol(&mut self, symbol: &str) -> Result<i64, CdmError> {
        if let Some(code) = self.suppression.code(symbol) {
            return Ok(code);
        }
        let (en, tc) = match self.footnotes.get(symbol) {
            Some(note) => (note.en.clone(), note.tc.clone()),
            None => {
                log::warn!(
                    "table {}: suppression symbol '{symbol}' has no footnote text",
                    self.table_code
                );
                (String::new(), String::new())
            }
        };
        self.suppression.mint(&mut *self.store, symbol, &en, &tc, false)
    }

    fn observe(&self, row_no: usize, row: &FasRow) -> Option<Observation> {
        let mut obs = Observation::default();
        for (field, value) in row {
            if field.ends_with("footnote") {
                continue;
            }
            if !self.catalog.is_field(field) {
                log::warn!(
                    "table {} row {row_no}: FAS field '{field}' is not used in the sheet; row skipped",
                    self.table_code
                );
                return None;
            }
            let mut matched = false;
            for section in self.catalog.sections_of(field) {
                match section {
                    Section::Mdt => {
                        let measure = match value.parse::<f64>() {
                            Ok(v) => Measure {
                                obs_value: v,
                                sd_value: self.catalog.stashed_suppression(field, value).unwrap_or(0),
                            },
                            Err(_) => match self.suppression.code(value) {
                                Some(code) => Measure {
                                    obs_value: 0.0,
                                    sd_value: code,
                                },
                                None => continue,
                            },
                        };
                        obs.mdt.insert(field.clone(), measure);
                        matched = true;
                    }
                    Section::Cv | Section::Sv if self.catalog.knows(section, field, value) => {
                        let target = if section == Section::Cv { &mut obs.cv } else { &mut obs.sv };
                        target.insert(field.clone(), value.clone());
                        matched = true;
                    }
                    _ => {}
                }
            }
            if !matched {
                log::warn!(
                    "table {} row {row_no}: '{value}' is not a description of '{field}'; row skipped",
                    self.table_code
                );
                return None;
            }
        }
        if obs.cv.is_empty() {
            log::warn!(
                "table {} row {row_no}: no classification field matched; row skipped",
                self.table_code
            );
            return None;
        }
        Some(obs)
    }
}
