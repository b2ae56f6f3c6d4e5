//! Error taxonomy for the `ember_core` crate.
//!
//! See `SPEC_FULL.md` §7 for the full taxonomy split across crates; this
//! crate only ever produces the subset that can occur below the RHI and
//! scene layers (logic assertions on math types, config validation).

use thiserror::Error;

/// Errors that can originate from `ember_core`.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A logic invariant was violated (double-free of an id, index out of
    /// range, etc). Fatal: debug builds should panic on this, release
    /// builds should log and abort, per the engine's error-handling design.
    #[error("logic error: {0}")]
    Logic(String),

    /// A configuration value was out of its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Alias for `Result<T, CoreError>`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Logs and then panics (debug) or aborts the process (release), matching
/// the engine-wide convention for `LogicError`/`ASSERT`-class failures
/// (`SPEC_FULL.md` §7, §9).
#[track_caller]
pub fn fatal_logic_error(message: &str) -> ! {
    log::error!("logic error: {message}");
    if cfg!(debug_assertions) {
        panic!("logic error: {message}");
    } else {
        std::process::abort();
    }
}
