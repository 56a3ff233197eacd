// ABOUTME: Compares the frozen checksum maps of the two servers
// ABOUTME: Produces the set of tables whose data differs or is missing on one side

use super::SchemaChecksumMap;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComparisonMode {
    /// Only walk the source map; tables that exist only on the target are not reported
    SourceOnly,
    /// Also report tables that exist only on the target
    #[default]
    Symmetric,
}

/// Why a table is in the mismatch report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    ChecksumDiffers { source: i64, target: i64 },
    MissingFromTarget,
    MissingFromSource,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::ChecksumDiffers { source, target } => {
                write!(f, "checksum differs (source={}, target={})", source, target)
            }
            Mismatch::MissingFromTarget => write!(f, "missing on target"),
            Mismatch::MissingFromSource => write!(f, "missing on source"),
        }
    }
}

/// Tables that failed verification, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MismatchReport {
    mismatches: BTreeMap<String, Mismatch>,
}

impl MismatchReport {
    /// True when every compared table matched
    pub fn is_empty(&self) -> bool {
        self.mismatches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mismatches.len()
    }

    pub fn contains(&self, table: &str) -> bool {
        self.mismatches.contains_key(table)
    }

    pub fn get(&self, table: &str) -> Option<Mismatch> {
        self.mismatches.get(table).copied()
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.mismatches.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Mismatch)> {
        self.mismatches
            .iter()
            .map(|(table, mismatch)| (table.as_str(), *mismatch))
    }
}

/// Diff two frozen checksum maps
///
/// Every table in `source` that is absent from `target` or carries a different
/// checksum is reported. In [`ComparisonMode::Symmetric`] tables present only in
/// `target` are reported as well.
pub fn compare_checksums(
    source: &SchemaChecksumMap,
    target: &SchemaChecksumMap,
    mode: ComparisonMode,
) -> MismatchReport {
    let mut mismatches = BTreeMap::new();

    for (table, &source_checksum) in source {
        match target.get(table) {
            None => {
                mismatches.insert(table.clone(), Mismatch::MissingFromTarget);
            }
            Some(&target_checksum) if target_checksum != source_checksum => {
                mismatches.insert(
                    table.clone(),
                    Mismatch::ChecksumDiffers {
                        source: source_checksum,
                        target: target_checksum,
                    },
                );
            }
            Some(_) => {}
        }
    }

    if mode == ComparisonMode::Symmetric {
        for table in target.keys().filter(|table| !source.contains_key(*table)) {
            mismatches.insert(table.clone(), Mismatch::MissingFromSource);
        }
    }

    MismatchReport { mismatches }
}
