//! CLI Exit Code Registry
//!
//! Single source of truth for `cdmload` exit codes. Batch scripts that drive
//! nightly loads branch on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Every sheet loaded                                   |
//! | 1    | General error (unspecified)                          |
//! | 2    | Usage error (bad arguments)                          |
//! | 3    | Settings file unreadable or invalid                  |
//! | 4    | Input error: lookup files, sheet contents, FAS data  |
//! | 5    | Storage error: reference or warehouse database       |
//! | 6    | Folder run where some sheets failed                  |

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - every requested sheet was loaded.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments. clap exits with this code on its own.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Loader (3-6)
// =============================================================================

/// Settings file missing (when given explicitly), unparsable or invalid.
pub const EXIT_CONFIG: u8 = 3;

/// Lookup files, the sheet itself, or reference data it points at.
pub const EXIT_INPUT: u8 = 4;

/// Reference or warehouse database could not be opened or written.
pub const EXIT_STORAGE: u8 = 5;

/// Folder mode: at least one sheet failed, the rest were committed.
pub const EXIT_PARTIAL: u8 = 6;

use cdmload_recon::CdmError;

/// Map a table-processing failure to its exit code.
pub fn load_exit_code(err: &CdmError) -> u8 {
    match err {
        CdmError::Store(_) => EXIT_STORAGE,
        _ => EXIT_INPUT,
    }
}
