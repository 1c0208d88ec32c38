use std::{io, path::PathBuf};
use thiserror::Error;

/// Errors raised while loading a rule catalog or compiling the matcher.
///
/// All of these are fatal at startup; nothing here is recoverable at
/// scan time.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot read rule catalog {path:?}")]
    CatalogUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed rule catalog, record {record}: {reason}")]
    CatalogMalformed { record: usize, reason: String },
    #[error("rule set too large: {reason}")]
    RuleSetTooLarge { reason: String },
}

pub type Result<T, E = BuildError> = std::result::Result<T, E>;
