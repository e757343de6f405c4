//! Dataset merge and deduplication.
//!
//! `primary` is the source of truth and `secondary` fills its gaps; which
//! side wins a conflict between two non-empty values is a [`MergePolicy`].
//! Output order is every primary record in input order followed by the
//! records only `secondary` introduced, also in input order.
use crate::error::MergeRejection;
use crate::record::{EnrichmentStatus, IdentityKey, Record};
use serde::Serialize;
use std::collections::HashMap;

/// Tie-break for two non-empty values under the same identity key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum MergePolicy {
    #[default]
    #[value(name = "primary")]
    PrimaryWins,
    #[value(name = "secondary")]
    SecondaryWins,
}

/// Counts reported alongside a merge; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub primary_in: usize,
    pub secondary_in: usize,
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub rejected: usize,
    pub output: usize,
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub records: Vec<Record>,
    pub stats: MergeStats,
    pub rejections: Vec<MergeRejection>,
}

/// Merge two record collections by identity key.
pub fn merge(primary: &[Record], secondary: &[Record], policy: MergePolicy) -> MergeOutcome {
    let mut stats = MergeStats {
        primary_in: primary.len(),
        secondary_in: secondary.len(),
        ..MergeStats::default()
    };
    let mut rejections = Vec::new();
    let mut records: Vec<Record> = Vec::with_capacity(primary.len() + secondary.len());
    let mut index: HashMap<IdentityKey, usize> = HashMap::new();

    for (position, record) in primary.iter().enumerate() {
        let Some(key) = record.identity_key() else {
            rejections.push(reject("primary", position));
            continue;
        };
        match index.get(&key) {
            // Duplicate inside primary folds into its first occurrence.
            Some(&slot) => {
                reconcile(&mut records[slot], record, MergePolicy::PrimaryWins);
            }
            None => {
                index.insert(key, records.len());
                records.push(record.clone());
            }
        }
    }

    // Fold duplicates inside secondary first-wins before any policy applies.
    let mut incoming: Vec<(IdentityKey, Record)> = Vec::with_capacity(secondary.len());
    let mut incoming_index: HashMap<IdentityKey, usize> = HashMap::new();
    for (position, record) in secondary.iter().enumerate() {
        let Some(key) = record.identity_key() else {
            rejections.push(reject("secondary", position));
            continue;
        };
        match incoming_index.get(&key) {
            Some(&slot) => {
                reconcile(&mut incoming[slot].1, record, MergePolicy::PrimaryWins);
            }
            None => {
                incoming_index.insert(key.clone(), incoming.len());
                incoming.push((key, record.clone()));
            }
        }
    }

    for (key, record) in incoming {
        match index.get(&key) {
            Some(&slot) => {
                if reconcile(&mut records[slot], &record, policy) {
                    stats.updated += 1;
                } else {
                    stats.unchanged += 1;
                }
            }
            None => {
                index.insert(key, records.len());
                records.push(record);
                stats.added += 1;
            }
        }
    }

    for rejection in &rejections {
        tracing::warn!(%rejection, "merge rejected record");
    }
    stats.rejected = rejections.len();
    stats.output = records.len();
    MergeOutcome {
        records,
        stats,
        rejections,
    }
}

fn reject(source_label: &'static str, index: usize) -> MergeRejection {
    MergeRejection {
        source_label,
        index,
        reason: "empty identity key".to_string(),
    }
}

/// Reconcile `incoming` into `target` field by field. Returns whether
/// `target` changed. The name, and therefore the identity key, never changes.
fn reconcile(target: &mut Record, incoming: &Record, policy: MergePolicy) -> bool {
    let overwrite = policy == MergePolicy::SecondaryWins;
    let mut changed = false;
    changed |= merge_text(&mut target.organization, &incoming.organization, overwrite);
    changed |= merge_text(
        &mut target.registration_url,
        &incoming.registration_url,
        overwrite,
    );
    changed |= merge_optional(&mut target.description, &incoming.description, overwrite);
    changed |= merge_optional(
        &mut target.latest_submission_date,
        &incoming.latest_submission_date,
        overwrite,
    );
    changed |= merge_optional(&mut target.remote_id, &incoming.remote_id, overwrite);
    changed |= merge_list(&mut target.winning_books, &incoming.winning_books, overwrite);
    changed |= merge_list(&mut target.competitors, &incoming.competitors, overwrite);
    changed |= merge_list(&mut target.categories, &incoming.categories, overwrite);
    if incoming.status == EnrichmentStatus::Enriched && !target.is_enriched() {
        target.status = EnrichmentStatus::Enriched;
        changed = true;
    }
    changed
}

fn merge_text(target: &mut String, incoming: &str, overwrite: bool) -> bool {
    if incoming.trim().is_empty() || target == incoming {
        return false;
    }
    if target.trim().is_empty() || overwrite {
        *target = incoming.to_string();
        return true;
    }
    false
}

fn merge_optional(target: &mut Option<String>, incoming: &Option<String>, overwrite: bool) -> bool {
    let Some(value) = incoming.as_deref().filter(|v| !v.trim().is_empty()) else {
        return false;
    };
    let current_empty = target.as_deref().is_none_or(|v| v.trim().is_empty());
    if target.as_deref() == Some(value) || !(current_empty || overwrite) {
        return false;
    }
    *target = Some(value.to_string());
    true
}

fn merge_list<T: Clone + PartialEq>(target: &mut Vec<T>, incoming: &[T], overwrite: bool) -> bool {
    if incoming.is_empty() || target.as_slice() == incoming {
        return false;
    }
    if target.is_empty() || overwrite {
        *target = incoming.to_vec();
        return true;
    }
    false
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;
