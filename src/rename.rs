//! Rename inference
//!
//! Deleted and added entries that share a fingerprint are reclassified as
//! renames. For each fingerprint present on both sides, the deleted and added
//! candidates are each ordered by relative path and paired positionally, one
//! to one, up to the smaller count. Unpaired candidates stay where they were.
//!
//! # Ambiguity
//!
//! When a fingerprint group has more than one candidate on either side the
//! pairing is best-effort. It carries no file-identity provenance and may not
//! match the rename that actually happened: with deletions `a`, `b` and one
//! addition `c`, the result is `a -> c` with `b` left deleted only because
//! `a` sorts first. Callers that need certainty should treat renames from
//! ambiguous groups, and renames on metadata fingerprints
//! ([`FingerprintKind::Metadata`](crate::types::FingerprintKind)), as hints.

use crate::collections::HashMap;
use crate::types::{FileRecord, Fingerprint, RenamedEntry};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Which fingerprints may pair a deletion with an addition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenamePolicy {
    /// Any equal fingerprint pairs, including metadata fallbacks
    #[default]
    AnyFingerprint,
    /// Only content digests pair; metadata-fingerprinted files are never
    /// reported as renamed
    ContentOnly,
}

impl RenamePolicy {
    fn allows(self, fingerprint: &Fingerprint) -> bool {
        match self {
            RenamePolicy::AnyFingerprint => true,
            RenamePolicy::ContentOnly => !fingerprint.is_metadata(),
        }
    }
}

/// Added, deleted and renamed lists after pairing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameResolution {
    /// Additions that were not paired, ascending by path
    pub added: Vec<FileRecord>,
    /// Deletions that were not paired, ascending by path
    pub deleted: Vec<FileRecord>,
    /// Pairs, ascending by `from` then `to`
    pub renamed: Vec<RenamedEntry>,
}

/// Pair deletions with additions that share a fingerprint
///
/// Pure: the inputs are not modified and a path ends up in exactly one of
/// the three output lists.
pub fn resolve_renames(added: &[FileRecord], deleted: &[FileRecord], policy: RenamePolicy) -> RenameResolution {
    let deleted_groups = group_by_fingerprint(deleted, policy);
    let added_groups = group_by_fingerprint(added, policy);

    let mut deleted_paired = vec![false; deleted.len()];
    let mut added_paired = vec![false; added.len()];
    let mut renamed = Vec::new();

    for (fingerprint, deleted_idx) in &deleted_groups {
        let Some(added_idx) = added_groups.get(fingerprint) else {
            continue;
        };

        if deleted_idx.len() > 1 || added_idx.len() > 1 {
            debug!(
                "Ambiguous rename group for {}: {} deleted, {} added; pairing by path order",
                fingerprint.short(),
                deleted_idx.len(),
                added_idx.len()
            );
        }

        for (&d, &a) in deleted_idx.iter().zip(added_idx) {
            deleted_paired[d] = true;
            added_paired[a] = true;
            trace!("Rename {} -> {}", deleted[d].rel_path, added[a].rel_path);
            renamed.push(RenamedEntry {
                from: deleted[d].rel_path.clone(),
                to: added[a].rel_path.clone(),
                fingerprint: (*fingerprint).clone(),
            });
        }
    }

    renamed.sort_by(|x, y| x.from.cmp(&y.from).then_with(|| x.to.cmp(&y.to)));

    let resolution = RenameResolution {
        added: unpaired(added, &added_paired),
        deleted: unpaired(deleted, &deleted_paired),
        renamed,
    };

    debug!(
        "Paired {} renames ({} added, {} deleted remain)",
        resolution.renamed.len(),
        resolution.added.len(),
        resolution.deleted.len()
    );

    resolution
}

/// Indices per fingerprint, each group ordered by relative path
fn group_by_fingerprint(records: &[FileRecord], policy: RenamePolicy) -> HashMap<&Fingerprint, Vec<usize>> {
    let mut groups: HashMap<&Fingerprint, Vec<usize>> = HashMap::default();
    for (idx, record) in records.iter().enumerate() {
        if policy.allows(&record.fingerprint) {
            groups.entry(&record.fingerprint).or_default().push(idx);
        }
    }
    for indices in groups.values_mut() {
        indices.sort_by(|&x, &y| records[x].rel_path.cmp(&records[y].rel_path));
    }
    groups
}

fn unpaired(records: &[FileRecord], paired: &[bool]) -> Vec<FileRecord> {
    let mut rest: Vec<FileRecord> = records
        .iter()
        .zip(paired)
        .filter(|(_, &was_paired)| !was_paired)
        .map(|(record, _)| record.clone())
        .collect();
    rest.sort_by(|x, y| x.rel_path.cmp(&y.rel_path));
    rest
}
