//! CLI Exit Code Registry
//!
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Reconciled: every source row matched an identical row     |
//! | 1    | Differences: differing pairs or one-sided rows were found |
//! | 2    | Usage error (bad args; emitted by clap)                   |
//! | 3    | Invalid config (parse or validation failure)              |
//! | 4    | Runtime failure (lookup, IO, CSV, report write)           |

/// Success - reconciled, nothing to report.
pub const EXIT_SUCCESS: u8 = 0;

/// Differences found. Like `diff(1)`, exit 1 means "inputs differ."
pub const EXIT_RECON_DIFFS: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Config could not be parsed or failed validation.
pub const EXIT_RECON_INVALID_CONFIG: u8 = 3;

/// Reference lookup, source read or report write failed.
pub const EXIT_RECON_RUNTIME: u8 = 4;
