//! Content-key deduplication of candidate records.
//!
//! Records sharing a content key are folded into one canonical record:
//!
//! - the member with the highest confidence is the base (first seen on ties)
//! - the longest description wins, compared by character count
//! - source pages are the sorted union over every member
//!
//! Groups keep the order in which their first member appeared.

use std::collections::HashMap;

use crate::processing::CandidateRecord;

/// A record the dedup engine can group and fold.
///
/// The engine owns the merge rules; implementors only expose the fields
/// those rules read and write.
pub trait MergeCandidate: Clone {
    /// Grouping key.
    fn merge_key(&self) -> String;

    /// Confidence used to pick the base record; absent counts as zero.
    fn rank_confidence(&self) -> f64;

    /// Caller-supplied id, if any.
    fn explicit_id(&self) -> Option<&str>;

    fn set_explicit_id(&mut self, id: String);

    fn description(&self) -> Option<&str>;

    fn set_description(&mut self, description: String);

    /// Every page the record mentions.
    fn pages(&self) -> Vec<u32>;

    /// Store the merged, sorted page set.
    fn set_pages(&mut self, pages: Vec<u32>);

    /// Fold kind-specific fields of an absorbed member into the base.
    fn absorb(&mut self, _other: &Self) {}
}

impl MergeCandidate for CandidateRecord {
    fn merge_key(&self) -> String {
        self.content_key()
    }

    fn rank_confidence(&self) -> f64 {
        self.confidence.unwrap_or(0.0)
    }

    fn explicit_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_explicit_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn set_description(&mut self, description: String) {
        self.description = Some(description);
    }

    fn pages(&self) -> Vec<u32> {
        self.all_pages()
    }

    fn set_pages(&mut self, pages: Vec<u32>) {
        self.source_pages = pages;
        self.source_page = None;
    }

    fn absorb(&mut self, other: &Self) {
        if let Some(longer) = longer_text(self.response.as_deref(), other.response.as_deref()) {
            self.response = Some(longer.to_string());
        }
        for (key, value) in &other.metadata {
            self.metadata
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        if self.parent_id.as_deref().map_or(true, |p| p.trim().is_empty()) {
            if let Some(ref parent) = other.parent_id {
                self.parent_id = Some(parent.clone());
            }
        }
    }
}

/// A canonical record and what was folded into it.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord<T = CandidateRecord> {
    pub record: T,
    /// Key shared by the group.
    pub key: String,
    /// Explicit ids of absorbed members, for redirecting references.
    pub merged_ids: Vec<String>,
    /// Number of input records in the group.
    pub group_size: usize,
}

impl<T> MergedRecord<T> {
    pub fn is_merged(&self) -> bool {
        self.group_size > 1
    }
}

/// Collapse records that share a key.
///
/// Pure and order-preserving; applying it to its own output is a no-op.
pub fn deduplicate<T: MergeCandidate>(records: Vec<T>) -> Vec<MergedRecord<T>> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<T>> = HashMap::new();

    for record in records {
        let key = record.merge_key();
        match groups.get_mut(&key) {
            Some(members) => members.push(record),
            None => {
                order.push(key.clone());
                groups.insert(key, vec![record]);
            }
        }
    }

    let mut output = Vec::with_capacity(order.len());
    for key in order {
        let Some(members) = groups.remove(&key) else {
            continue;
        };
        let group_size = members.len();
        if group_size == 1 {
            output.extend(members.into_iter().map(|record| MergedRecord {
                record,
                key: key.clone(),
                merged_ids: Vec::new(),
                group_size,
            }));
            continue;
        }

        tracing::debug!("Merging {} duplicates for key: {}", group_size, key);
        let (record, merged_ids) = merge_group(members);
        output.push(MergedRecord {
            record,
            key,
            merged_ids,
            group_size,
        });
    }

    output
}

/// Canonical records only.
pub fn deduplicate_records<T: MergeCandidate>(records: Vec<T>) -> Vec<T> {
    deduplicate(records).into_iter().map(|m| m.record).collect()
}

fn merge_group<T: MergeCandidate>(members: Vec<T>) -> (T, Vec<String>) {
    let mut base_index = 0;
    for (i, member) in members.iter().enumerate().skip(1) {
        if member.rank_confidence() > members[base_index].rank_confidence() {
            base_index = i;
        }
    }

    let mut base = members[base_index].clone();
    let mut pages: Vec<u32> = Vec::new();
    let mut merged_ids: Vec<String> = Vec::new();

    for (i, member) in members.iter().enumerate() {
        pages.extend(member.pages());
        if i == base_index {
            continue;
        }

        if let Some(longer) = longer_text(base.description(), member.description()) {
            let longer = longer.to_string();
            base.set_description(longer);
        }
        base.absorb(member);

        if let Some(id) = member.explicit_id() {
            match base.explicit_id() {
                None => base.set_explicit_id(id.to_string()),
                Some(base_id) if base_id != id => {
                    if !merged_ids.iter().any(|m| m == id) {
                        merged_ids.push(id.to_string());
                    }
                }
                Some(_) => {}
            }
        }
    }

    pages.sort_unstable();
    pages.dedup();
    base.set_pages(pages);

    (base, merged_ids)
}

/// The candidate text when it is strictly longer than the current one.
///
/// The extractor's placeholder is the exact lowercase word `unknown`;
/// other spellings are treated as real text.
fn longer_text<'a>(current: Option<&str>, candidate: Option<&'a str>) -> Option<&'a str> {
    let candidate = candidate?.trim();
    if candidate == "unknown" {
        return None;
    }
    let current_len = current.map_or(0, |c| c.trim().chars().count());
    (candidate.chars().count() > current_len).then_some(candidate)
}
