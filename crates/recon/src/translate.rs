use std::collections::HashMap;

use cdmload_core::{FieldLookupRow, Translator, NOT_FOUND};

/// Prefix marking a translation found only in the current table's lookup rows.
pub const TABLE_ONLY_PREFIX: &str = "(NOT IN FIELDLOOKUP)";

/// Dictionary-backed [`Translator`] built from the field-lookup table and the
/// unit lookup.
#[derive(Debug, Clone, Default)]
pub struct LookupTranslator {
    /// English (lower-cased) → most frequent translation across the other tables.
    all_fields: HashMap<String, String>,
    /// English (lower-cased) → translation, current table only.
    table_fields: HashMap<String, String>,
    /// English unit description (case kept) → translation.
    units: HashMap<String, String>,
}

impl LookupTranslator {
    pub fn new(table_code: &str, lookup: &[FieldLookupRow], units: &[(String, String)]) -> Self {
        let clean = |s: &str| s.replace("<br>", "");

        let mut table_fields = HashMap::new();
        let mut counts: Vec<((String, String), usize)> = Vec::new();
        for row in lookup {
            let en = clean(&row.desc_eng).to_lowercase();
            let tc = clean(&row.desc_chi);
            if row.table_id == table_code {
                table_fields.insert(en, tc);
                continue;
            }
            match counts.iter_mut().find(|(pair, _)| pair.0 == en && pair.1 == tc) {
                Some((_, n)) => *n += 1,
                None => counts.push(((en, tc), 1)),
            }
        }

        let mut best: HashMap<String, (String, usize)> = HashMap::new();
        for ((en, tc), n) in counts {
            match best.get(&en) {
                Some((_, top)) if *top > n => {}
                _ => {
                    best.insert(en, (tc, n));
                }
            }
        }

        Self {
            all_fields: best.into_iter().map(|(en, (tc, _))| (en, tc)).collect(),
            table_fields,
            units: units
                .iter()
                .map(|(en, tc)| (en.clone(), tc.to_lowercase()))
                .collect(),
        }
    }
}

impl Translator for LookupTranslator {
    fn translate(&self, text: &str, is_unit: bool) -> String {
        let (check, key) = if is_unit {
            (&self.units, text.to_string())
        } else {
            (&self.all_fields, text.to_lowercase())
        };
        let variants = [key.clone(), key.replace(" (", "("), key.replace('(', " (")];
        for variant in &variants {
            if let Some(hit) = check.get(variant) {
                return hit.clone();
            }
            if let Some(hit) = self.table_fields.get(variant) {
                return format!("{TABLE_ONLY_PREFIX}{hit}");
            }
        }
        log::debug!("no translation for '{text}'");
        NOT_FOUND.to_string()
    }
}
