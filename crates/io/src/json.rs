// JSON export of processed tables

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::Serialize;

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    generated_at: String,
    #[serde(flatten)]
    payload: &'a T,
}

/// `<dir>/table_<code>.json`
pub fn export_path(dir: &Path, table_code: &str) -> PathBuf {
    dir.join(format!("table_{table_code}.json"))
}

/// Write `payload` as pretty JSON with a `generated_at` timestamp (RFC 3339,
/// UTC). Parent directories are created.
pub fn export<T: Serialize>(payload: &T, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| format!("{}: {e}", parent.display()))?;
    }
    let file = File::create(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let writer = BufWriter::new(file);
    let envelope = Envelope {
        generated_at: chrono::Utc::now().to_rfc3339(),
        payload,
    };
    serde_json::to_writer_pretty(writer, &envelope).map_err(|e| e.to_string())?;
    Ok(())
}
