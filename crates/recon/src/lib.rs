//! `cdmload-recon` - classification resolution for statistical tables.
//!
//! Parses classification sheets, reconciles FAS reference rows against them,
//! keeps the footnote and suppression registries, assembles fact records and
//! drives persistence through the `Storage` contract. No file or database IO.

pub mod assemble;
pub mod catalog;
pub mod error;
pub mod footnote;
pub mod frame;
pub mod load;
pub mod parse;
pub mod reconcile;
pub mod suppression;
pub mod template;
pub mod translate;

pub use assemble::{disambiguate, Candidate, FactAssembler};
pub use catalog::{FieldCatalog, Section};
pub use error::CdmError;
pub use footnote::{FootnoteRegistry, HeaderText};
pub use load::{process_table, LoadSummary, LoadedTable};
pub use parse::{parse_sheet, ParsedSheet};
pub use reconcile::{Measure, Observation, Reconciler, Reconciliation};
pub use suppression::{SdEntry, SuppressionRegistry};
pub use translate::LookupTranslator;
