// Lookup tables loaded once per run: themes, unit translations and the
// table-info note list

use std::collections::HashMap;
use std::path::Path;

use cdmload_core::{NoteText, ReferenceData};
use serde::Deserialize;

use crate::sheet::read_file_as_utf8;

#[derive(Debug, Deserialize)]
struct ThemeRow {
    #[serde(rename = "THEME")]
    theme: String,
    #[serde(rename = "THEME_DESC_ENG", default)]
    desc_eng: String,
    #[serde(rename = "THEME_DESC_CHI", default)]
    desc_chi: String,
}

#[derive(Debug, Deserialize)]
struct UnitRow {
    #[serde(rename = "Unit_desc_eng")]
    desc_eng: String,
    #[serde(rename = "Unit_desc_chi", default)]
    desc_chi: String,
}

#[derive(Debug, Deserialize)]
struct TableInfoRow {
    #[serde(rename = "Table")]
    table: String,
    #[serde(rename = "NOTE")]
    note: String,
}

fn read_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>, String> {
    let content = read_file_as_utf8(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    reader
        .deserialize()
        .enumerate()
        .map(|(i, row)| row.map_err(|e| format!("{} row {}: {e}", path.display(), i + 2)))
        .collect()
}

/// `theme.csv`: `THEME`, `THEME_DESC_ENG`, `THEME_DESC_CHI`.
pub fn load_themes(path: &Path) -> Result<HashMap<String, NoteText>, String> {
    Ok(read_rows::<ThemeRow>(path)?
        .into_iter()
        .map(|r| (r.theme, NoteText::new(r.desc_eng, r.desc_chi)))
        .collect())
}

/// `unit.csv`: `Unit_desc_eng`, `Unit_desc_chi`. Translations are lower-cased.
pub fn load_units(path: &Path) -> Result<Vec<(String, String)>, String> {
    Ok(read_rows::<UnitRow>(path)?
        .into_iter()
        .map(|r| (r.desc_eng, r.desc_chi.to_lowercase()))
        .collect())
}

/// `table_info.csv`: `Table`, `NOTE`, grouped by table code.
pub fn load_table_info(path: &Path) -> Result<HashMap<String, Vec<String>>, String> {
    let mut notes: HashMap<String, Vec<String>> = HashMap::new();
    for row in read_rows::<TableInfoRow>(path)? {
        notes.entry(row.table).or_default().push(row.note);
    }
    Ok(notes)
}

/// Load all three lookup files.
pub fn load_reference(theme: &Path, unit: &Path, table_info: &Path) -> Result<ReferenceData, String> {
    let data = ReferenceData {
        themes: load_themes(theme)?,
        units: load_units(unit)?,
        table_info_notes: load_table_info(table_info)?,
    };
    log::debug!(
        "lookup: {} theme(s), {} unit(s), {} table-info table(s)",
        data.themes.len(),
        data.units.len(),
        data.table_info_notes.len()
    );
    Ok(data)
}
