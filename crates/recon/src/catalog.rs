//! Known FAS fields per section and the descriptions each one accepts.
//! Footnotes found while reconciling accumulate here before the parser
//! attaches them to the model.

use std::fmt;

use cdmload_core::{FootnoteBag, Mapping, NoteText};

use crate::frame::Frame;
use crate::parse::col;

/// Field name used for rows whose source-table pairing is not known up front.
pub const UNDEFINED_FIELD: &str = "undefined";

/// Suffix of the footnote-marker column paired with each value column.
pub const FOOTNOTE_SUFFIX: &str = "_footnote";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    /// Classification variables.
    Cv,
    /// Statistical variables.
    Sv,
    /// Measures.
    Mdt,
}

impl Section {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "CV" => Some(Self::Cv),
            "SV" => Some(Self::Sv),
            "MDT" => Some(Self::Mdt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cv => "CV",
            Self::Sv => "SV",
            Self::Mdt => "MDT",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
struct FieldEntry {
    /// Lower-cased description → footnotes found for it.
    descs: Mapping<FootnoteBag>,
    /// Measure fields only: normalized value text → suppression code.
    suppression: Mapping<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct FieldCatalog {
    sections: Vec<(Section, Mapping<FieldEntry>)>,
}

impl FieldCatalog {
    /// Build from the parsed sheet sections. Sections other than CV, SV and
    /// MDT are ignored.
    pub fn from_sections(sections: &Mapping<Frame>) -> Self {
        let mut catalog = Self::default();
        for (name, frame) in sections.iter() {
            let Some(section) = Section::from_name(name) else {
                log::debug!("catalog: ignoring section '{name}'");
                continue;
            };
            let (desc_col, alt_col) = match section {
                Section::Cv => (col::CC_DESC, col::CC_ALT),
                _ => (col::FAS_DESC, col::ALT),
            };
            let mut fields = Mapping::new();
            for (fas, block) in frame.group_by(col::FAS_FIELD) {
                let mut entry = FieldEntry::default();
                if section != Section::Mdt {
                    for row in block.rows() {
                        for column in [desc_col, alt_col] {
                            if let Some(text) = row.get(column) {
                                entry.descs.insert(text.to_lowercase(), FootnoteBag::default());
                            }
                        }
                    }
                }
                fields.insert(fas, entry);
            }
            catalog.sections.push((section, fields));
        }
        catalog
    }

    fn fields(&self, section: Section) -> Option<&Mapping<FieldEntry>> {
        self.sections.iter().find(|(s, _)| *s == section).map(|(_, f)| f)
    }

    fn entry_mut(&mut self, section: Section, field: &str) -> Option<&mut FieldEntry> {
        self.sections
            .iter_mut()
            .find(|(s, _)| *s == section)
            .and_then(|(_, f)| f.get_mut(field))
    }

    /// `(value column, footnote column)` for every tracked field except
    /// `undefined`, deduplicated, in section order.
    pub fn tracked_columns(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = Vec::new();
        for field in self.field_names() {
            if field != UNDEFINED_FIELD && !out.iter().any(|(f, _)| f == field) {
                out.push((field.to_string(), format!("{field}{FOOTNOTE_SUFFIX}")));
            }
        }
        out
    }

    /// Every field name of every section (may repeat across sections).
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().flat_map(|(_, f)| f.keys())
    }

    pub fn is_field(&self, field: &str) -> bool {
        self.sections.iter().any(|(_, f)| f.contains_key(field))
    }

    /// Sections that own `field`, in section order.
    pub fn sections_of(&self, field: &str) -> Vec<Section> {
        self.sections
            .iter()
            .filter(|(_, f)| f.contains_key(field))
            .map(|(s, _)| *s)
            .collect()
    }

    pub fn is_measure(&self, field: &str) -> bool {
        self.fields(Section::Mdt).map_or(false, |f| f.contains_key(field))
    }

    pub fn measure_fields(&self) -> Vec<String> {
        self.fields(Section::Mdt)
            .map(|f| f.keys().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Whether `desc` (any case) is a known description of `field`.
    pub fn knows(&self, section: Section, field: &str, desc: &str) -> bool {
        self.fields(section)
            .and_then(|f| f.get(field))
            .map_or(false, |e| e.descs.contains_key(&desc.to_lowercase()))
    }

    /// Known descriptions (lower-cased) of `field`.
    pub fn descriptions(&self, section: Section, field: &str) -> Vec<String> {
        self.fields(section)
            .and_then(|f| f.get(field))
            .map(|e| e.descs.keys().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Attach a note to the footnote bag of a known description. Returns
    /// false when the description is unknown or the slot is out of range.
    pub fn attach_footnote(&mut self, section: Section, field: &str, desc: &str, slot: u8, note: NoteText) -> bool {
        match self
            .entry_mut(section, field)
            .and_then(|e| e.descs.get_mut(&desc.to_lowercase()))
        {
            Some(bag) => bag.attach(slot, note),
            None => {
                log::debug!("catalog: '{desc}' is not a description of {section}.{field}");
                false
            }
        }
    }

    /// Footnotes collected for a description; empty when none or unknown.
    pub fn footnote(&self, section: Section, field: &str, desc: &str) -> FootnoteBag {
        self.fields(section)
            .and_then(|f| f.get(field))
            .and_then(|e| e.descs.get(&desc.to_lowercase()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn stash_suppression(&mut self, field: &str, value: &str, code: i64) {
        if let Some(entry) = self.entry_mut(Section::Mdt, field) {
            entry.suppression.insert(value, code);
        }
    }

    pub fn stashed_suppression(&self, field: &str, value: &str) -> Option<i64> {
        self.fields(Section::Mdt)
            .and_then(|f| f.get(field))
            .and_then(|e| e.suppression.get(value))
            .copied()
    }
}
