use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Values + records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Real(n) if n.fract() == 0.0 => Some(*n as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Equality that treats `Int(2)` and `Real(2.0)` as the same value.
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Real(b)) | (Self::Real(b), Self::Int(a)) => (*a as f64) == *b,
            _ => self == other,
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Real(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Self::Text(s.clone())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Column → value, in column order.
pub type Record = IndexMap<String, Value>;

/// Build a [`Record`] from `column => value` pairs.
#[macro_export]
macro_rules! record {
    ($($col:expr => $val:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut r = $crate::store::Record::new();
        $( r.insert($col.to_string(), $crate::store::Value::from($val)); )*
        r
    }};
}

// ---------------------------------------------------------------------------
// Storage contract
// ---------------------------------------------------------------------------

/// Generic key-lookup / insert / update collaborator that hands out
/// surrogate ids.
pub trait Storage {
    /// `field` of the first row matching every `filter` column, if any.
    fn lookup(&mut self, table: &str, field: &str, filter: &Record) -> Result<Option<i64>, StoreError>;

    /// Insert one row. Uniqueness violations surface as
    /// [`StoreError::DuplicateKey`].
    fn insert(&mut self, table: &str, record: &Record) -> Result<(), StoreError>;

    /// Largest value of `id_column` in `table` (0 when empty).
    fn latest_id(&mut self, table: &str, id_column: &str) -> Result<i64, StoreError>;

    /// Set the `set` columns on every row matching `filter`.
    fn update(&mut self, table: &str, set: &Record, filter: &Record) -> Result<(), StoreError>;

    /// Every row matching `filter` (all rows for an empty filter).
    fn select(&mut self, table: &str, filter: &Record) -> Result<Vec<Record>, StoreError>;
}

/// Shape of one warehouse table as far as id assignment and uniqueness go.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub identity: Option<&'static str>,
    pub unique: &'static [&'static [&'static str]],
}

pub const WAREHOUSE_TABLES: &[TableSpec] = &[
    TableSpec { name: "TB_INFO", identity: Some("tb_id"), unique: &[&["tb_code"]] },
    TableSpec { name: "THEME", identity: Some("theme_id"), unique: &[&["theme"]] },
    TableSpec { name: "CV", identity: Some("cv_id"), unique: &[&["theme_id", "class_var"]] },
    TableSpec { name: "CV_TB", identity: None, unique: &[&["cv_id", "tb_id"]] },
    TableSpec { name: "CCG", identity: Some("ccg_id"), unique: &[&["cv_id", "class_code_group"]] },
    TableSpec { name: "CC", identity: Some("cc_id"), unique: &[&["cv_id", "class_code"]] },
    TableSpec { name: "CCG_CC", identity: None, unique: &[&["ccg_id", "cc_id"]] },
    TableSpec { name: "CC_TB", identity: None, unique: &[&["cc_id", "tb_id"]] },
    TableSpec {
        name: "PAC",
        identity: None,
        unique: &[&["parent_ccg_id", "parent_cc_id", "child_ccg_id", "child_cc_id"]],
    },
    TableSpec {
        name: "SP",
        identity: Some("sp_id"),
        unique: &[&["theme_id", "stat_pres", "def_stat_pres_desc_en"]],
    },
    TableSpec { name: "SP_TB", identity: None, unique: &[&["sp_id", "tb_id"]] },
    TableSpec { name: "SV", identity: Some("sv_id"), unique: &[&["theme_id", "stat_var"]] },
    TableSpec { name: "SV_TB", identity: None, unique: &[&["sv_id", "tb_id"]] },
    TableSpec { name: "MDT", identity: Some("mdt_id"), unique: &[] },
    TableSpec { name: "TB_COMP", identity: None, unique: &[] },
    TableSpec { name: "SD", identity: None, unique: &[&["sd_symbol"], &["sd_value"]] },
];

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemTable {
    identity: Option<String>,
    unique: Vec<Vec<String>>,
    rows: Vec<Record>,
}

impl MemTable {
    fn matches(row: &Record, filter: &Record) -> bool {
        filter
            .iter()
            .all(|(col, want)| row.get(col).map(|have| have.same_as(want)).unwrap_or(want.is_null()))
    }
}

/// Storage kept in process memory. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<String, MemTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preconfigured with the warehouse identity columns and keys.
    pub fn warehouse() -> Self {
        let mut store = Self::new();
        for spec in WAREHOUSE_TABLES {
            store.define(spec);
        }
        store
    }

    pub fn define(&mut self, spec: &TableSpec) {
        self.tables.insert(
            spec.name.to_string(),
            MemTable {
                identity: spec.identity.map(str::to_string),
                unique: spec
                    .unique
                    .iter()
                    .map(|cols| cols.iter().map(|c| c.to_string()).collect())
                    .collect(),
                rows: Vec::new(),
            },
        );
    }

    pub fn rows(&self, table: &str) -> &[Record] {
        self.tables.get(table).map(|t| t.rows.as_slice()).unwrap_or(&[])
    }

    fn table(&self, table: &str) -> Result<&MemTable, StoreError> {
        self.tables
            .get(table)
            .ok_or_else(|| StoreError::Backend(format!("no such table: {table}")))
    }

    fn table_mut(&mut self, table: &str) -> Result<&mut MemTable, StoreError> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| StoreError::Backend(format!("no such table: {table}")))
    }
}

impl Storage for MemoryStore {
    fn lookup(&mut self, table: &str, field: &str, filter: &Record) -> Result<Option<i64>, StoreError> {
        let t = self.table(table)?;
        Ok(t
            .rows
            .iter()
            .find(|row| MemTable::matches(row, filter))
            .and_then(|row| row.get(field))
            .and_then(Value::as_int))
    }

    fn insert(&mut self, table: &str, record: &Record) -> Result<(), StoreError> {
        let t = self.table_mut(table)?;
        for key in &t.unique {
            let clash = t.rows.iter().any(|row| {
                key.iter().all(|col| {
                    let have = row.get(col).unwrap_or(&Value::Null);
                    let want = record.get(col).unwrap_or(&Value::Null);
                    have.same_as(want)
                })
            });
            if clash {
                return Err(StoreError::DuplicateKey { table: table.to_string() });
            }
        }

        let mut row = record.clone();
        if let Some(identity) = t.identity.clone() {
            if row.get(&identity).map_or(true, Value::is_null) {
                let next = t
                    .rows
                    .iter()
                    .filter_map(|r| r.get(&identity).and_then(Value::as_int))
                    .max()
                    .unwrap_or(0)
                    + 1;
                row.shift_insert(0, identity, Value::Int(next));
            }
        }
        t.rows.push(row);
        Ok(())
    }

    fn latest_id(&mut self, table: &str, id_column: &str) -> Result<i64, StoreError> {
        let t = self.table(table)?;
        Ok(t.rows
            .iter()
            .filter_map(|r| r.get(id_column).and_then(Value::as_int))
            .max()
            .unwrap_or(0))
    }

    fn update(&mut self, table: &str, set: &Record, filter: &Record) -> Result<(), StoreError> {
        let t = self.table_mut(table)?;
        for row in t.rows.iter_mut().filter(|row| MemTable::matches(row, filter)) {
            for (col, value) in set {
                row.insert(col.clone(), value.clone());
            }
        }
        Ok(())
    }

    fn select(&mut self, table: &str, filter: &Record) -> Result<Vec<Record>, StoreError> {
        let t = self.table(table)?;
        Ok(t.rows
            .iter()
            .filter(|row| MemTable::matches(row, filter))
            .cloned()
            .collect())
    }
}
