//! Contracts of the collaborators the engine consumes but does not own:
//! translation lookup, the reference source (FAS tables, footnotes, field
//! lookup) and read-only reference data loaded at startup.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::error::StoreError;
use crate::node::NoteText;

/// Sentinel returned by a [`Translator`] that has no translation.
pub const NOT_FOUND: &str = "NOT FOUND";

/// `desc → localized desc`. A miss yields [`NOT_FOUND`] rather than an error;
/// the sentinel is stored verbatim and surfaces downstream.
pub trait Translator {
    fn translate(&self, text: &str, is_unit: bool) -> String;
}

/// One FAS reference-table row: column name → raw cell text.
pub type FasRow = IndexMap<String, String>;

/// Raw footnote registry row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FootnoteRow {
    pub note_no: i64,
    /// Note symbol, possibly parenthesized, empty for unsymbolled info notes.
    pub note: String,
    pub note_eng: String,
    pub note_chi: String,
    pub note_type: i64,
}

/// Raw field-lookup (translation) row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLookupRow {
    pub table_id: String,
    pub desc_eng: String,
    pub desc_chi: String,
}

pub trait ReferenceSource {
    /// Rows of the FAS table for `table_code`, restricted to `columns`.
    fn fas_rows(&mut self, table_code: &str, columns: &[String]) -> Result<Vec<FasRow>, StoreError>;

    /// Footnote rows of `table_code`, in note-number order.
    fn footnote_rows(&mut self, table_code: &str) -> Result<Vec<FootnoteRow>, StoreError>;

    /// The whole field-lookup table (all table ids).
    fn field_lookup(&mut self) -> Result<Vec<FieldLookupRow>, StoreError>;
}

/// Read-only lookup tables loaded once per run.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    /// Theme code → bilingual description.
    pub themes: HashMap<String, NoteText>,
    /// English unit description → Chinese unit description.
    pub units: Vec<(String, String)>,
    /// Table code → note symbols that belong to the table info lines.
    pub table_info_notes: HashMap<String, Vec<String>>,
}

impl ReferenceData {
    pub fn table_info_notes(&self, table_code: &str) -> &[String] {
        self.table_info_notes
            .get(table_code)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
