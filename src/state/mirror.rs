/// Live mirror shared by both controllers
///
/// The mirror is the controller's local copy of the subscribed record
/// set. Every store notification replaces it wholesale — no incremental
/// patching — then the derived category set is rebuilt and the view
/// re-rendered from scratch.

use std::collections::BTreeSet;

use crate::state::data::CardRecord;
use crate::text;

/// Sentinel for "no category filter selected".
pub const ALL_CATEGORIES: &str = "__all__";

#[derive(Debug, Default)]
pub struct Mirror {
    pub records: Vec<CardRecord>,
    pub categories: BTreeSet<String>,
}

impl Mirror {
    pub fn new() -> Self {
        Mirror::default()
    }

    /// Replace the mirror with a fresh snapshot. Soft-deleted records
    /// are always dropped; `admit` applies the controller's own
    /// admission policy on top (the public view requires complete
    /// metadata, the admin view takes everything).
    pub fn replace<F>(&mut self, snapshot: &[CardRecord], admit: F)
    where
        F: Fn(&CardRecord) -> bool,
    {
        self.records.clear();
        self.categories.clear();
        for record in snapshot {
            if record.deleted || !admit(record) {
                continue;
            }
            let category = record.category.trim();
            if !category.is_empty() {
                self.categories.insert(category.to_string());
            }
            self.records.push(record.clone());
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.categories.clear();
    }

    /// Sorted category options for the filter selector.
    pub fn category_options(&self) -> Vec<String> {
        self.categories.iter().cloned().collect()
    }
}

/// Keep the current category selection if it still exists after a
/// snapshot, otherwise fall back to "all".
pub fn retained_category(current: &str, categories: &BTreeSet<String>) -> String {
    if current != ALL_CATEGORIES && categories.contains(current) {
        current.to_string()
    } else {
        ALL_CATEGORIES.to_string()
    }
}

/// The shared filter rule: exact category match (unless "all"), then a
/// case-insensitive substring match against "<category> <side> <order>".
/// `text_filter` must already be trimmed and lowercased.
pub fn matches_filters(record: &CardRecord, text_filter: &str, category_filter: &str) -> bool {
    let category = record.category.trim();
    if category_filter != ALL_CATEGORIES && category != category_filter {
        return false;
    }
    if text_filter.is_empty() {
        return true;
    }
    text::search_haystack(category, record.side.as_str(), record.order).contains(text_filter)
}
