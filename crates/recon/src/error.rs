use std::fmt;

use cdmload_core::{ModelError, StoreError};

#[derive(Debug)]
pub enum CdmError {
    /// Sheet has fewer rows than the identity + header layout needs.
    EmptySheet { rows: usize },
    /// Section (`CV`, `SV`, …) the sheet does not contain.
    MissingSection(String),
    /// Required column absent from a section.
    MissingColumn { section: String, column: String },
    /// Required cell empty.
    MissingValue { section: String, column: String, row: usize },
    /// Numeric field that does not parse.
    BadNumber { column: String, value: String },
    /// Period template expression that cannot be evaluated.
    Template(String),
    /// All suppression codes below the reserved range are taken.
    SuppressionExhausted,
    /// Reference data (themes, FAS table, lookups) missing or inconsistent.
    Reference(String),
    Model(ModelError),
    Store(StoreError),
}

impl fmt::Display for CdmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySheet { rows } => {
                write!(f, "sheet has {rows} row(s); identity, header and data rows are required")
            }
            Self::MissingSection(name) => write!(f, "sheet has no '{name}' section"),
            Self::MissingColumn { section, column } => {
                write!(f, "section '{section}': missing column '{column}'")
            }
            Self::MissingValue { section, column, row } => {
                write!(f, "section '{section}', row {row}: '{column}' is empty")
            }
            Self::BadNumber { column, value } => {
                write!(f, "'{column}': cannot parse '{value}' as a number")
            }
            Self::Template(msg) => write!(f, "period template error: {msg}"),
            Self::SuppressionExhausted => write!(f, "no free suppression code below the reserved range"),
            Self::Reference(msg) => write!(f, "reference data error: {msg}"),
            Self::Model(e) => write!(f, "{e}"),
            Self::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CdmError {}

impl From<ModelError> for CdmError {
    fn from(e: ModelError) -> Self {
        Self::Model(e)
    }
}

impl From<StoreError> for CdmError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}
