// File and database I/O: classification sheets, lookup tables, the SQLite
// warehouse and reference database, JSON export

pub mod json;
pub mod lookup;
pub mod sheet;
pub mod sqlite;

pub use lookup::load_reference;
pub use sheet::{is_sheet, read_sheet};
pub use sqlite::{SqliteReference, SqliteStore};
