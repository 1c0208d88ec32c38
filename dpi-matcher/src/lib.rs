//! Multi-pattern payload matching.
//!
//! A rule catalog is read into [`MatchRule`]s, built into a goto/failure
//! automaton and flattened into a [`TableMachine`] whose scan loop needs no
//! failure walking: one table lookup and one bit test per payload byte.

pub mod catalog;
pub mod error;
pub mod rule;
pub mod table;
pub mod trie;

pub use crate::catalog::{load_rules, parse_records};
pub use crate::error::{BuildError, Result};
pub use crate::rule::{
    decode_pattern, MatchRule, PatternError, MAX_PATTERN_LENGTH, MIN_PATTERN_LENGTH,
};
pub use crate::table::{MatchReport, StateId, TableMachine, MAX_REPORTS};
pub use crate::trie::{build_trie, Trie, MAX_RULES_PER_STATE, MAX_STATES};
