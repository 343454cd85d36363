//! `cdmload-core` - classification model, table aggregate and the contracts
//! of the collaborators the engine talks to.
//!
//! No IO: storage, translation and reference sources are traits here and are
//! implemented elsewhere (`MemoryStore` is the exception, kept for dry runs).

pub mod cdm;
pub mod collab;
pub mod error;
pub mod mapping;
pub mod node;
pub mod sheet;
pub mod store;
pub mod table;

pub use cdm::{CommonDataModel, DescMatch};
pub use collab::{FasRow, FieldLookupRow, FootnoteRow, ReferenceData, ReferenceSource, Translator, NOT_FOUND};
pub use error::{ModelError, StoreError};
pub use mapping::Mapping;
pub use node::{AttrKey, AttrValue, Extension, FootnoteBag, GroupNode, Locale, Node, NoteText, Presentation};
pub use sheet::RawSheet;
pub use store::{MemoryStore, Record, Storage, Value};
pub use table::{FactRecord, Table, Theme};
