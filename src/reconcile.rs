//! Last-write-wins merge of an authoritative order list with a terminal's
//! local cache.
//!
//! For every key present on either side:
//!
//! - present on one side only: taken as is
//! - present on both: the strictly newer `last_modified` wins; a tie goes to
//!   the authoritative side. A missing timestamp counts as the Unix epoch.
//!
//! The merge is pure: inputs are borrowed, output is a fresh list ordered by
//! key, so the result never depends on input iteration order. Merging the
//! authoritative list into an already merged view changes nothing.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::order::Order;

/// A record that can take part in last-write-wins reconciliation.
pub trait Reconcilable: Clone {
    type Key: Ord + Clone;

    fn key(&self) -> Self::Key;

    /// `None` is treated as the earliest possible time.
    fn last_modified(&self) -> Option<DateTime<Utc>>;
}

impl Reconcilable for Order {
    type Key = Uuid;

    fn key(&self) -> Uuid {
        self.id
    }

    fn last_modified(&self) -> Option<DateTime<Utc>> {
        Some(self.updated_at)
    }
}

/// Which side supplied each record of a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub authoritative_only: usize,
    pub local_only: usize,
    pub authoritative_wins: usize,
    pub local_wins: usize,
}

impl MergeReport {
    pub fn total(&self) -> usize {
        self.authoritative_only + self.local_only + self.authoritative_wins + self.local_wins
    }
}

fn stamp<T: Reconcilable>(record: &T) -> DateTime<Utc> {
    record.last_modified().unwrap_or_default()
}

/// Newest record per key within one side; the first occurrence wins ties.
fn latest_by_key<T: Reconcilable>(records: &[T]) -> BTreeMap<T::Key, &T> {
    let mut latest: BTreeMap<T::Key, &T> = BTreeMap::new();
    for record in records {
        match latest.entry(record.key()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                if stamp(record) > stamp(*slot.get()) {
                    slot.insert(record);
                }
            }
        }
    }
    latest
}

/// Merge `authoritative` with `local`, returning the reconciled view.
pub fn merge<T: Reconcilable>(authoritative: &[T], local: &[T]) -> Vec<T> {
    merge_with_report(authoritative, local).0
}

/// [`merge`] plus a count of where each record came from.
pub fn merge_with_report<T: Reconcilable>(authoritative: &[T], local: &[T]) -> (Vec<T>, MergeReport) {
    let remote = latest_by_key(authoritative);
    let mut cached = latest_by_key(local);
    let mut report = MergeReport::default();
    let mut merged: BTreeMap<T::Key, T> = BTreeMap::new();

    for (key, remote_record) in remote {
        let winner = match cached.remove(&key) {
            None => {
                report.authoritative_only += 1;
                remote_record
            }
            Some(local_record) if stamp(local_record) > stamp(remote_record) => {
                report.local_wins += 1;
                local_record
            }
            Some(_) => {
                report.authoritative_wins += 1;
                remote_record
            }
        };
        merged.insert(key, winner.clone());
    }

    for (key, local_record) in cached {
        report.local_only += 1;
        merged.insert(key, local_record.clone());
    }

    (merged.into_values().collect(), report)
}
