// Classification sheet import (CSV, Excel) into a rectangular text grid

use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use cdmload_core::RawSheet;

/// File extensions accepted as classification sheets.
pub const SHEET_EXTENSIONS: &[&str] = &["csv", "xlsx", "xlsm", "xls"];

pub fn is_sheet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SHEET_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Read a sheet, picking the reader by extension. The sheet is named after
/// the file stem.
pub fn read_sheet(path: &Path) -> Result<RawSheet, String> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => {
            let content = read_file_as_utf8(path)?;
            import_csv(&name, &content)
        }
        "xlsx" | "xlsm" | "xls" => import_excel(&name, path),
        other => Err(format!("Unsupported sheet format '.{other}': {}", path.display())),
    }
}

/// Read file and convert to UTF-8 if needed (handles a BOM and Windows-1252)
pub fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let mut file = std::fs::File::open(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| e.to_string())?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(s)),
        Err(e) => {
            let bytes = e.into_bytes();
            // Excel-exported CSVs
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

pub fn import_csv(name: &str, content: &str) -> Result<RawSheet, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| e.to_string())?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(RawSheet::from_rows(name, rows))
}

/// First worksheet of an Excel workbook.
pub fn import_excel(name: &str, path: &Path) -> Result<RawSheet, String> {
    let mut workbook = open_workbook_auto(path).map_err(|e| format!("Failed to open Excel file: {e}"))?;
    let Some(sheet_name) = workbook.sheet_names().first().cloned() else {
        return Err("Excel file contains no sheets".to_string());
    };
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| format!("Failed to read sheet '{sheet_name}': {e}"))?;

    // Range start offset (data may not begin at A1)
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut rows: Vec<Vec<String>> = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut cells = vec![String::new(); start_col as usize];
        cells.extend(row.iter().map(cell_text));
        rows.push(cells);
    }
    Ok(RawSheet::from_rows(name, rows))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        // integers without decimals
        Data::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        Data::Float(n) => format!("{n}"),
        Data::Int(n) => format!("{n}"),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::DateTime(dt) => format!("{}", dt.as_f64()),
        other => other.to_string(),
    }
}
