// SQLite-backed warehouse (Storage) and reference database (ReferenceSource)

use std::path::Path;

use cdmload_core::table::MAX_CV_SLOTS;
use cdmload_core::{
    FasRow, FieldLookupRow, FootnoteRow, Record, ReferenceSource, Storage, StoreError, Value,
};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension};

/// Highest footnote slot flattened onto `*_TB` rows.
const FOOTNOTE_COLUMNS: u8 = 5;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS TB_INFO (
    tb_id INTEGER PRIMARY KEY AUTOINCREMENT,
    tb_code TEXT NOT NULL UNIQUE,
    tb_title_en TEXT,
    tb_title_tc TEXT,
    tb_fn_en TEXT,
    tb_fn_tc TEXT,
    tb_src_en TEXT,
    tb_src_tc TEXT
);

CREATE TABLE IF NOT EXISTS THEME (
    theme_id INTEGER PRIMARY KEY AUTOINCREMENT,
    theme TEXT NOT NULL UNIQUE,
    theme_desc_en TEXT,
    theme_desc_tc TEXT,
    {THEME_SLOTS}
);

CREATE TABLE IF NOT EXISTS CV (
    cv_id INTEGER PRIMARY KEY AUTOINCREMENT,
    theme_id INTEGER NOT NULL,
    class_var TEXT NOT NULL,
    def_class_desc_en TEXT,
    def_class_desc_tc TEXT,
    UNIQUE (theme_id, class_var)
);

CREATE TABLE IF NOT EXISTS CV_TB (
    cv_id INTEGER NOT NULL,
    tb_id INTEGER NOT NULL,
    class_desc_en TEXT,
    class_desc_tc TEXT,
    UNIQUE (cv_id, tb_id)
);

CREATE TABLE IF NOT EXISTS CCG (
    ccg_id INTEGER PRIMARY KEY AUTOINCREMENT,
    cv_id INTEGER NOT NULL,
    class_code_group INTEGER NOT NULL,
    UNIQUE (cv_id, class_code_group)
);

CREATE TABLE IF NOT EXISTS CC (
    cc_id INTEGER PRIMARY KEY AUTOINCREMENT,
    cv_id INTEGER NOT NULL,
    class_code TEXT NOT NULL,
    def_class_code_desc_en TEXT,
    def_class_code_desc_tc TEXT,
    UNIQUE (cv_id, class_code)
);

CREATE TABLE IF NOT EXISTS CCG_CC (
    ccg_id INTEGER NOT NULL,
    cc_id INTEGER NOT NULL,
    cv_id INTEGER,
    class_code_seq INTEGER,
    UNIQUE (ccg_id, cc_id)
);

CREATE TABLE IF NOT EXISTS CC_TB (
    cc_id INTEGER NOT NULL,
    tb_id INTEGER NOT NULL,
    class_code_desc_en TEXT,
    class_code_desc_tc TEXT,
    ccg_id INTEGER,
    {FOOTNOTES},
    UNIQUE (cc_id, tb_id)
);

CREATE TABLE IF NOT EXISTS PAC (
    parent_ccg_id INTEGER NOT NULL,
    parent_cc_id INTEGER NOT NULL,
    child_ccg_id INTEGER NOT NULL,
    child_cc_id INTEGER NOT NULL,
    UNIQUE (parent_ccg_id, parent_cc_id, child_ccg_id, child_cc_id)
);

CREATE TABLE IF NOT EXISTS SP (
    sp_id INTEGER PRIMARY KEY AUTOINCREMENT,
    theme_id INTEGER NOT NULL,
    stat_pres TEXT NOT NULL,
    def_stat_pres_desc_en TEXT,
    def_stat_pres_desc_tc TEXT,
    def_stat_type TEXT,
    def_unit TEXT,
    def_unit_desc_en TEXT,
    def_unit_desc_tc TEXT,
    def_decimals INTEGER,
    def_unit_mult INTEGER,
    def_separator_format TEXT,
    UNIQUE (theme_id, stat_pres, def_stat_pres_desc_en)
);

CREATE TABLE IF NOT EXISTS SP_TB (
    sp_id INTEGER NOT NULL,
    tb_id INTEGER NOT NULL,
    stat_pres_desc_en TEXT,
    stat_pres_desc_tc TEXT,
    stat_type TEXT,
    unit TEXT,
    unit_desc_en TEXT,
    unit_desc_tc TEXT,
    decimals INTEGER,
    unit_mult INTEGER,
    separator_format TEXT,
    {FOOTNOTES},
    UNIQUE (sp_id, tb_id)
);

CREATE TABLE IF NOT EXISTS SV (
    sv_id INTEGER PRIMARY KEY AUTOINCREMENT,
    theme_id INTEGER NOT NULL,
    stat_var TEXT NOT NULL,
    def_stat_desc_en TEXT,
    def_stat_desc_tc TEXT,
    UNIQUE (theme_id, stat_var)
);

CREATE TABLE IF NOT EXISTS SV_TB (
    sv_id INTEGER NOT NULL,
    tb_id INTEGER NOT NULL,
    stat_desc_en TEXT,
    stat_desc_tc TEXT,
    {FOOTNOTES},
    UNIQUE (sv_id, tb_id)
);

CREATE TABLE IF NOT EXISTS MDT (
    mdt_id INTEGER PRIMARY KEY AUTOINCREMENT,
    theme_id INTEGER NOT NULL,
    sv_id INTEGER NOT NULL,
    sp_id INTEGER NOT NULL,
    obs_value REAL,
    sd_value INTEGER NOT NULL DEFAULT 0,
    {MDT_SLOTS}
);

CREATE TABLE IF NOT EXISTS TB_COMP (
    tb_id INTEGER NOT NULL,
    sv_id INTEGER,
    sp_id INTEGER,
    ccg_id INTEGER
);

CREATE TABLE IF NOT EXISTS SD (
    sd_value INTEGER NOT NULL UNIQUE,
    sd_symbol TEXT NOT NULL UNIQUE,
    sd_desc_eng TEXT,
    sd_desc_chi TEXT,
    sd_suppressed INTEGER NOT NULL DEFAULT 0
);
"#;

/// Warehouse DDL with the slot and footnote column families expanded.
pub fn schema() -> String {
    let slots = |suffix: &str| {
        (1..=MAX_CV_SLOTS)
            .map(|n| format!("cv{n}{suffix} INTEGER"))
            .collect::<Vec<_>>()
            .join(",\n    ")
    };
    let footnotes = (1..=FOOTNOTE_COLUMNS)
        .map(|n| format!("fn{n}_en TEXT,\n    fn{n}_tc TEXT"))
        .collect::<Vec<_>>()
        .join(",\n    ");
    SCHEMA
        .replace("{THEME_SLOTS}", &slots("_id"))
        .replace("{MDT_SLOTS}", &slots("_cc_id"))
        .replace("{FOOTNOTES}", &footnotes)
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Int(n) => SqlValue::Integer(*n),
        Value::Real(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Int(n),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Text(String::from_utf8_lossy(b).into_owned()),
    }
}

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// `WHERE` clause over `filter`, numbering parameters from `first`. Null
/// filter values compare with `IS NULL`.
fn where_clause(filter: &Record, first: usize) -> (String, Vec<SqlValue>) {
    let mut terms = Vec::new();
    let mut values = Vec::new();
    for (col, value) in filter {
        if value.is_null() {
            terms.push(format!("{} IS NULL", quote(col)));
        } else {
            values.push(to_sql(value));
            terms.push(format!("{} = ?{}", quote(col), first + values.len() - 1));
        }
    }
    if terms.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", terms.join(" AND ")), values)
    }
}

// ---------------------------------------------------------------------------
// Warehouse
// ---------------------------------------------------------------------------

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (creating if needed) a warehouse database and ensure its schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(backend)?;
        conn.execute_batch(&schema()).map_err(backend)?;
        Ok(Self { conn })
    }

    /// Run `f` inside one transaction; rolled back when it fails.
    pub fn transaction<T, E: From<StoreError>>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        self.conn.execute_batch("BEGIN TRANSACTION").map_err(backend)?;
        match f(self) {
            Ok(v) => {
                self.conn.execute_batch("COMMIT").map_err(backend)?;
                Ok(v)
            }
            Err(e) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    log::warn!("warehouse: rollback failed: {rollback}");
                }
                Err(e)
            }
        }
    }
}

impl Storage for SqliteStore {
    fn lookup(&mut self, table: &str, field: &str, filter: &Record) -> Result<Option<i64>, StoreError> {
        let (clause, values) = where_clause(filter, 1);
        let sql = format!("SELECT {} FROM {}{clause} LIMIT 1", quote(field), quote(table));
        let found: Option<Option<i64>> = self
            .conn
            .query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))
            .optional()
            .map_err(backend)?;
        Ok(found.flatten())
    }

    fn insert(&mut self, table: &str, record: &Record) -> Result<(), StoreError> {
        let cols: Vec<String> = record.keys().map(|c| quote(c)).collect();
        let marks: Vec<String> = (1..=record.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(table),
            cols.join(", "),
            marks.join(", ")
        );
        let values: Vec<SqlValue> = record.values().map(to_sql).collect();
        match self.conn.execute(&sql, params_from_iter(values.iter())) {
            Ok(_) => Ok(()),
            Err(e) if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
                Err(StoreError::DuplicateKey { table: table.to_string() })
            }
            Err(e) => Err(backend(e)),
        }
    }

    fn latest_id(&mut self, table: &str, id_column: &str) -> Result<i64, StoreError> {
        let sql = format!("SELECT MAX({}) FROM {}", quote(id_column), quote(table));
        let max: Option<i64> = self.conn.query_row(&sql, [], |row| row.get(0)).map_err(backend)?;
        Ok(max.unwrap_or(0))
    }

    fn update(&mut self, table: &str, set: &Record, filter: &Record) -> Result<(), StoreError> {
        if set.is_empty() {
            return Ok(());
        }
        let assignments: Vec<String> = set
            .keys()
            .enumerate()
            .map(|(i, c)| format!("{} = ?{}", quote(c), i + 1))
            .collect();
        let (clause, filter_values) = where_clause(filter, set.len() + 1);
        let sql = format!("UPDATE {} SET {}{clause}", quote(table), assignments.join(", "));
        let values: Vec<SqlValue> = set.values().map(to_sql).chain(filter_values).collect();
        self.conn
            .execute(&sql, params_from_iter(values.iter()))
            .map_err(backend)?;
        Ok(())
    }

    fn select(&mut self, table: &str, filter: &Record) -> Result<Vec<Record>, StoreError> {
        let (clause, values) = where_clause(filter, 1);
        let sql = format!("SELECT * FROM {}{clause}", quote(table));
        let mut stmt = self.conn.prepare(&sql).map_err(backend)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                let mut record = Record::new();
                for (i, name) in names.iter().enumerate() {
                    record.insert(name.clone(), from_sql(row.get_ref(i)?));
                }
                Ok(record)
            })
            .map_err(backend)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(backend)
    }
}

// ---------------------------------------------------------------------------
// Reference database
// ---------------------------------------------------------------------------

/// Read-only view of the reference database: per-table FAS tables
/// (`TABLE{code}`), `TB_FOOTNOTE` and `TB_FIELDLOOKUP`.
pub struct SqliteReference {
    conn: Connection,
}

impl SqliteReference {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::Backend(format!(
                "reference database not found: {}",
                path.display()
            )));
        }
        let conn = Connection::open(path).map_err(backend)?;
        Ok(Self { conn })
    }

    fn table_columns(&self, table: &str) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote(table)))
            .map_err(backend)?;
        let cols = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;
        Ok(cols)
    }
}

fn cell_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(n) => Some(n.to_string()),
        ValueRef::Real(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", f as i64)),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) | ValueRef::Blob(t) => Some(String::from_utf8_lossy(t).into_owned()),
    }
}

impl ReferenceSource for SqliteReference {
    /// Value columns must exist; missing footnote columns are skipped.
    fn fas_rows(&mut self, table_code: &str, columns: &[String]) -> Result<Vec<FasRow>, StoreError> {
        let table = format!("TABLE{table_code}");
        let existing = self.table_columns(&table)?;
        if existing.is_empty() {
            return Err(StoreError::Backend(format!("no FAS table {table}")));
        }
        let mut selected = Vec::new();
        for column in columns {
            if existing.contains(column) {
                selected.push(column.clone());
            } else if column.ends_with("_footnote") {
                log::debug!("{table}: no column '{column}'");
            } else {
                return Err(StoreError::Backend(format!("{table} has no FAS field '{column}'")));
            }
        }
        if selected.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM {}",
            selected.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", "),
            quote(&table)
        );
        let mut stmt = self.conn.prepare(&sql).map_err(backend)?;
        let rows = stmt
            .query_map([], |row| {
                let mut fas = FasRow::new();
                for (i, name) in selected.iter().enumerate() {
                    if let Some(text) = cell_text(row.get_ref(i)?) {
                        fas.insert(name.clone(), text);
                    }
                }
                Ok(fas)
            })
            .map_err(backend)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(backend)
    }

    fn footnote_rows(&mut self, table_code: &str) -> Result<Vec<FootnoteRow>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT NOTE_NO, NOTE, NOTE_ENG, NOTE_CHI, NOTE_TYPE FROM TB_FOOTNOTE \
                 WHERE TABLE_ID = ?1 AND NOTE_TYPE < 4 ORDER BY NOTE_NO",
            )
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![table_code], |row| {
                Ok(FootnoteRow {
                    note_no: row.get(0)?,
                    note: row.get::<_, Option<String>>(1)?.unwrap_or_default().trim().to_string(),
                    note_eng: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    note_chi: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    note_type: row.get(4)?,
                })
            })
            .map_err(backend)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(backend)
    }

    fn field_lookup(&mut self) -> Result<Vec<FieldLookupRow>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT table_id, desc_eng, desc_chi FROM TB_FIELDLOOKUP")
            .map_err(backend)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(FieldLookupRow {
                    table_id: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    desc_eng: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    desc_chi: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                })
            })
            .map_err(backend)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(backend)
    }
}
