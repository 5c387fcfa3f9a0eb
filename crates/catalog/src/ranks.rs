//! Rank-list loading and matching.
//!
//! Each configured list is a CSV file with one code-bearing column. Lists
//! are re-read from disk on every pass so hand-replaced files are picked
//! up without a restart.

use std::collections::BTreeSet;
use std::path::Path;

use cineshelf_core::types::RankList;
use tracing::{info, warn};

use crate::code::extract_code;

/// The codes of every configured rank list, loaded for one matcher pass.
#[derive(Debug, Clone, Default)]
pub struct LoadedLists {
    entries: Vec<(RankList, BTreeSet<String>)>,
}

impl LoadedLists {
    /// Read every configured list. A missing or unreadable file contributes
    /// an empty code set and a warning, never a failure of the whole pass.
    pub fn load(lists: &[RankList]) -> Self {
        let mut entries = Vec::with_capacity(lists.len());
        for list in lists {
            let codes = match std::fs::read(Path::new(&list.path)) {
                Ok(bytes) => {
                    // Lossy decode: bad bytes in one row must not sink the file.
                    let text = String::from_utf8_lossy(&bytes);
                    let codes = parse_rank_csv(&text);
                    info!(list = %list.name, codes = codes.len(), "rank list loaded");
                    codes
                }
                Err(e) => {
                    warn!(list = %list.name, path = %list.path, error = %e, "rank list unreadable");
                    BTreeSet::new()
                }
            };
            entries.push((list.clone(), codes));
        }
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RankList, &BTreeSet<String>)> {
        self.entries.iter().map(|(l, c)| (l, c))
    }

    pub fn get(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.entries
            .iter()
            .find(|(l, _)| l.name == name)
            .map(|(_, c)| c)
    }

    /// Names of every list the code appears on, in configuration order.
    pub fn flags_for(&self, code: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, codes)| codes.contains(code))
            .map(|(l, _)| l.name.clone())
            .collect()
    }

    pub fn on_annual_list(&self, code: &str) -> bool {
        self.entries
            .iter()
            .any(|(l, codes)| l.annual && codes.contains(code))
    }

    /// Union of all codes across every list.
    pub fn all_codes(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .flat_map(|(_, codes)| codes.iter().cloned())
            .collect()
    }

    #[cfg(test)]
    pub fn from_entries(entries: Vec<(RankList, BTreeSet<String>)>) -> Self {
        Self { entries }
    }
}

/// Parse one rank CSV into its code set. The first line is the header; the
/// code-bearing column is the first header containing `name` (the exports
/// sometimes carry a raw projection like `SUBSTR(name,0,40)`), falling back
/// to column zero. Rows that lack the column or carry no code are skipped.
pub fn parse_rank_csv(text: &str) -> BTreeSet<String> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());

    let Some(header) = lines.next() else {
        return BTreeSet::new();
    };
    let column = header
        .split(',')
        .position(|field| field.to_lowercase().contains("name"))
        .unwrap_or(0);

    let mut codes = BTreeSet::new();
    for line in lines {
        let Some(field) = line.split(',').nth(column) else {
            continue;
        };
        if let Some(code) = extract_code(field) {
            codes.insert(code);
        }
    }
    codes
}
