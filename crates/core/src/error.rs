use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Extension attribute key that the model does not carry.
    UnknownAttribute(String),
    /// Attribute value of the wrong kind for its key (e.g. text for `seq`).
    AttributeKind { key: String, expected: &'static str },
    /// Write-once attribute set again with a different value.
    AttributeReassigned(String),
    /// A surrogate id was already assigned with a different value.
    IdReassigned { code: String, current: i64, new: i64 },
    /// Group code not present in the model.
    UnknownGroup { model: String, code: String },
    /// Child code not present in its group.
    UnknownChild { model: String, group: String, code: String },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAttribute(key) => write!(f, "unknown attribute '{key}'"),
            Self::AttributeKind { key, expected } => {
                write!(f, "attribute '{key}' expects a {expected} value")
            }
            Self::AttributeReassigned(key) => write!(f, "attribute '{key}' is already set"),
            Self::IdReassigned { code, current, new } => {
                write!(f, "'{code}' already has id {current}, refusing {new}")
            }
            Self::UnknownGroup { model, code } => write!(f, "{model}: no group '{code}'"),
            Self::UnknownChild { model, group, code } => {
                write!(f, "{model}: group '{group}' has no child '{code}'")
            }
        }
    }
}

impl std::error::Error for ModelError {}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Uniqueness constraint violated on insert. Callers treat this as
    /// "already exists" and carry on.
    DuplicateKey { table: String },
    /// Any other backend failure (SQL error, missing table, ...).
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateKey { table } => write!(f, "an entry already exists in {table}"),
            Self::Backend(msg) => write!(f, "storage error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}
