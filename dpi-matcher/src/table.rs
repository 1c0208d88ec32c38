//! Runtime form of the automaton: a dense `num_states x 256` transition
//! table with every failure resolved at compile time, a bit-packed accepting
//! set and per-state rule lists. Scanning is one table load, one bit test
//! and one conditional push per payload byte.

use std::{collections::VecDeque, path::Path};

use crate::{
    catalog,
    error::Result,
    rule::{MatchRule, MIN_PATTERN_LENGTH},
    trie::{build_trie, Trie, ROOT},
};

/// Narrowest integer that holds any state index below [`crate::MAX_STATES`].
pub type StateId = u16;

/// Hard cap on reports recorded for one payload; once reached, further
/// matches in the same packet are silently dropped.
pub const MAX_REPORTS: usize = 65_535;

/// One scanner hit: the accepting state entered and the payload offset of
/// the byte that entered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchReport {
    pub state: StateId,
    pub position: usize,
}

/// The compiled matcher. Logically immutable after construction and safe to
/// share read-only across threads.
#[derive(Debug, Clone)]
pub struct TableMachine {
    num_states: usize,
    total_rules: usize,
    table: Vec<StateId>,
    matches: Vec<u8>,
    match_rules: Vec<Vec<MatchRule>>,
}

impl TableMachine {
    /// Reads the catalog at `path` and compiles it with the default minimum
    /// pattern length. The intermediate trie is dropped before returning.
    pub fn from_catalog(path: impl AsRef<Path>) -> Result<TableMachine> {
        let rules = catalog::load_rules(path)?;
        TableMachine::from_rules(rules, MIN_PATTERN_LENGTH)
    }

    pub fn from_rules<I>(rules: I, min_len: usize) -> Result<TableMachine>
    where
        I: IntoIterator<Item = MatchRule>,
    {
        let trie = build_trie(rules, min_len)?;
        Ok(TableMachine::compile(&trie))
    }

    /// Flattens the trie breadth-first. Each state's row starts from its
    /// explicit gotos, then the failure chain (walked up to and including
    /// the root) fills the remaining bytes; anything still unset goes to
    /// the root. Accepting states get their bit and a deep copy of their
    /// own rules only, never rules inherited through failure links.
    pub fn compile(trie: &Trie) -> TableMachine {
        let num_states = trie.num_states();
        let mut machine = TableMachine {
            num_states,
            total_rules: 0,
            table: vec![0; num_states * 256],
            matches: vec![0; (num_states + 7) / 8],
            match_rules: vec![Vec::new(); num_states],
        };

        let mut row = [0 as StateId; 256];
        let mut has_value = [false; 256];
        let mut queue = VecDeque::new();
        queue.push_back(ROOT);
        while let Some(id) = queue.pop_front() {
            row.fill(0);
            has_value.fill(false);

            let node = trie.node(id);
            if node.is_match() {
                machine.matches[id / 8] |= 1 << (id % 8);
                machine.match_rules[id] = node.rules.clone();
                machine.total_rules += node.rules.len();
            }

            for (&byte, &child) in &node.gotos {
                row[byte as usize] = child as StateId;
                has_value[byte as usize] = true;
                queue.push_back(child);
            }

            let mut fail = node.failure;
            loop {
                let fail_node = trie.node(fail);
                for (&byte, &child) in &fail_node.gotos {
                    if !has_value[byte as usize] {
                        row[byte as usize] = child as StateId;
                        has_value[byte as usize] = true;
                    }
                }
                if fail == ROOT {
                    break;
                }
                fail = fail_node.failure;
            }

            machine.table[id * 256..(id + 1) * 256].copy_from_slice(&row);
        }

        tracing::info!(
            states = num_states,
            rules = machine.total_rules,
            table_bytes = num_states * 256 * std::mem::size_of::<StateId>(),
            "compiled transition table"
        );
        machine
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    /// Rules held across all accepting states.
    pub fn num_rules(&self) -> usize {
        self.total_rules
    }

    /// The fully-resolved successor of `state` on `byte`; never needs
    /// failure walking.
    pub fn next_state(&self, state: StateId, byte: u8) -> StateId {
        self.table[state as usize * 256 + byte as usize]
    }

    pub fn is_accepting(&self, state: StateId) -> bool {
        let s = state as usize;
        self.matches[s / 8] >> (s % 8) & 1 != 0
    }

    /// The rules terminating exactly in `state`; empty for non-accepting
    /// states.
    pub fn rules_for(&self, state: StateId) -> &[MatchRule] {
        &self.match_rules[state as usize]
    }

    /// Drives the payload through the table from `start`, recording every
    /// accepting state entered until `limit` reports have been taken.
    /// Returns the state reached, so a caller may chain scans.
    pub fn scan(
        &self,
        start: StateId,
        payload: &[u8],
        reports: &mut Vec<MatchReport>,
        limit: usize,
    ) -> StateId {
        debug_assert!((start as usize) < self.num_states);
        let mut current = start as usize;
        for (position, &byte) in payload.iter().enumerate() {
            let next = self.table[current * 256 + byte as usize] as usize;
            if self.matches[next / 8] >> (next % 8) & 1 != 0 {
                reports.push(MatchReport {
                    state: next as StateId,
                    position,
                });
                if reports.len() >= limit {
                    return current as StateId;
                }
            }
            current = next;
        }
        current as StateId
    }
}
