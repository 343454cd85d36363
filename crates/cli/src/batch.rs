// Batch run: settings, lookup files and databases once, then one sheet at a time

use std::fs;
use std::path::{Path, PathBuf};

use cdmload_config::Settings;
use cdmload_core::{MemoryStore, RawSheet, ReferenceData, ReferenceSource};
use cdmload_io::{is_sheet, json, load_reference, read_sheet, SqliteReference, SqliteStore};
use cdmload_recon::{process_table, CdmError, LoadSummary, LoadedTable};
use tracing::{error, info};

use crate::exit_codes::{load_exit_code, EXIT_PARTIAL};
use crate::{Cli, CliError};

/// Where facts end up. A SQLite warehouse commits one transaction per table.
enum Warehouse {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl Warehouse {
    fn open(settings: &Settings, dry_run: bool) -> Result<Self, CliError> {
        if dry_run {
            info!("dry run: warehouse database is not written");
            return Ok(Self::Memory(MemoryStore::warehouse()));
        }
        let path = &settings.database.warehouse;
        SqliteStore::open(path)
            .map(Self::Sqlite)
            .map_err(|e| CliError::storage(format!("{}: {e}", path.display())))
    }

    fn load(
        &mut self,
        sheet: &RawSheet,
        reference: &ReferenceData,
        source: &mut dyn ReferenceSource,
    ) -> Result<LoadedTable, CdmError> {
        match self {
            Self::Memory(store) => process_table(sheet, reference, source, store),
            Self::Sqlite(store) => store.transaction(|store| process_table(sheet, reference, source, store)),
        }
    }
}

/// Sheets named by `--file` or found in `--folder`, sorted by file name.
/// Excel lock files (`~$...`) are skipped.
pub fn sheet_paths(file: Option<&Path>, folder: Option<&Path>) -> Result<Vec<PathBuf>, CliError> {
    if let Some(file) = file {
        if !file.is_file() {
            return Err(CliError::input(format!("{}: no such file", file.display())));
        }
        return Ok(vec![file.to_path_buf()]);
    }
    let Some(folder) = folder else {
        return Err(CliError::usage("either --file or --folder is required"));
    };
    if !folder.is_dir() {
        return Err(CliError::usage(format!("{}: not a directory", folder.display())));
    }

    let entries = fs::read_dir(folder).map_err(|e| CliError::input(format!("{}: {e}", folder.display())))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| CliError::input(e.to_string()))?.path();
        let locked = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("~$"));
        if path.is_file() && is_sheet(&path) && !locked {
            paths.push(path);
        }
    }
    if paths.is_empty() {
        return Err(CliError::input(format!("{}: no sheets found", folder.display()))
            .with_hint("expected .csv or .xlsx files"));
    }
    paths.sort();
    Ok(paths)
}

pub fn run(cli: &Cli) -> Result<(), CliError> {
    let settings = Settings::load(cli.config.as_deref()).map_err(|e| {
        CliError::config(e.to_string()).with_hint(format!(
            "settings are read from --config or {}",
            Settings::config_path().display()
        ))
    })?;
    let sheets = sheet_paths(cli.file.as_deref(), cli.folder.as_deref())?;

    let lookup = &settings.lookup;
    let reference = load_reference(&lookup.theme_path(), &lookup.unit_path(), &lookup.table_info_path())
        .map_err(|e| {
            CliError::input(e).with_hint(format!("lookup files are read from {}", lookup.dir.display()))
        })?;
    let mut source = SqliteReference::open(&settings.database.reference)
        .map_err(|e| CliError::storage(e.to_string()).with_hint("set [database] reference in the settings file"))?;
    let mut warehouse = Warehouse::open(&settings, cli.dry_run)?;
    let output = cli.output.clone().or_else(|| settings.output.dir.clone());

    if cli.file.is_some() {
        return load_sheet(&sheets[0], &reference, &mut source, &mut warehouse, output.as_deref()).map(|_| ());
    }

    let mut failed = 0usize;
    for path in &sheets {
        if let Err(err) = load_sheet(path, &reference, &mut source, &mut warehouse, output.as_deref()) {
            error!("{}", err.message);
            failed += 1;
        }
    }
    info!("{} of {} sheet(s) loaded", sheets.len() - failed, sheets.len());
    if failed > 0 {
        return Err(CliError::new(
            EXIT_PARTIAL,
            format!("{failed} of {} sheet(s) failed", sheets.len()),
        )
        .with_hint("failed sheets were rolled back; the others are committed"));
    }
    Ok(())
}

fn load_sheet(
    path: &Path,
    reference: &ReferenceData,
    source: &mut dyn ReferenceSource,
    warehouse: &mut Warehouse,
    output: Option<&Path>,
) -> Result<LoadSummary, CliError> {
    info!("loading {}", path.display());
    let sheet = read_sheet(path).map_err(CliError::input)?;
    let loaded = warehouse
        .load(&sheet, reference, source)
        .map_err(|e| CliError::new(load_exit_code(&e), format!("{}: {e}", path.display())))?;

    let exported = match output {
        Some(dir) => {
            let target = json::export_path(dir, &loaded.summary.table_code);
            json::export(&loaded, &target).map_err(CliError::general)?;
            Some(target)
        }
        None => None,
    };

    print_summary(&loaded.summary, exported.as_deref());
    Ok(loaded.summary)
}

fn print_summary(summary: &LoadSummary, exported: Option<&Path>) {
    eprintln!(
        "table {} (theme {}): {} fact(s) from {} FAS row(s), {} excluded",
        summary.table_code, summary.theme_code, summary.facts, summary.fas_rows, summary.excluded_rows
    );
    eprintln!(
        "  {} classification variable(s), {} code(s), {} presentation(s), {} statistical variable(s)",
        summary.classification_variables,
        summary.classification_codes,
        summary.presentations,
        summary.statistical_variables
    );
    if let Some(path) = exported {
        eprintln!("  exported {}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit_codes::{EXIT_INPUT, EXIT_USAGE};
    use tempfile::tempdir;

    #[test]
    fn folder_sheets_are_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        for name in ["b.csv", "a.xlsx", "notes.txt", "~$a.xlsx"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("sub.csv")).unwrap();

        let paths = sheet_paths(None, Some(dir.path())).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.xlsx", "b.csv"]);
    }

    #[test]
    fn empty_folder_is_an_input_error() {
        let dir = tempdir().unwrap();
        let err = sheet_paths(None, Some(dir.path())).unwrap_err();
        assert_eq!(err.code, EXIT_INPUT);
        assert!(err.hint.is_some());
    }

    #[test]
    fn bad_paths_are_reported() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.csv");
        assert_eq!(sheet_paths(Some(&missing), None).unwrap_err().code, EXIT_INPUT);
        assert_eq!(sheet_paths(None, Some(&missing)).unwrap_err().code, EXIT_USAGE);
    }
}
