/// Public controller
///
/// Read-only, unauthenticated mirror of the same record set. Groups the
/// filtered records into front/back pairs keyed by (category, order)
/// and offers per-card PNG downloads with synthesized filenames.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::state::data::{CardPair, CardRecord, Side};
use crate::state::mirror::{self, Mirror, ALL_CATEGORIES};
use crate::store::blobs::{BlobError, BlobStore};
use crate::store::records::{RecordStore, Subscription};
use crate::text;

/// What one of the two slots in a pair renders as.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotView {
    /// No record for this side, or its upload never completed
    Placeholder(String),
    Image(CardRecord),
}

/// A resolved client-side download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub url: String,
    pub filename: String,
}

pub struct PublicController {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    mirror: Arc<Mutex<Mirror>>,
    subscription: Option<Subscription>,
    /// Signed URLs are requested once per path per page session
    url_cache: Mutex<HashMap<String, String>>,
    text_filter: String,
    category_filter: String,
}

impl PublicController {
    pub fn new(records: Arc<dyn RecordStore>, blobs: Arc<dyn BlobStore>) -> Self {
        PublicController {
            records,
            blobs,
            mirror: Arc::new(Mutex::new(Mirror::new())),
            subscription: None,
            url_cache: Mutex::new(HashMap::new()),
            text_filter: String::new(),
            category_filter: ALL_CATEGORIES.to_string(),
        }
    }

    /// Open the live subscription. No auth, no-op when already open.
    pub fn start(&mut self) {
        if self.subscription.is_some() {
            return;
        }
        let mirror = Arc::clone(&self.mirror);
        self.subscription = Some(self.records.subscribe(Arc::new(move |snapshot| {
            // The gallery only admits records with complete metadata;
            // an empty storage path is fine and renders as a placeholder
            mirror
                .lock()
                .expect("public mirror poisoned")
                .replace(snapshot, |r| {
                    !r.category.trim().is_empty() && r.order.is_finite()
                });
        })));
    }

    pub fn stop(&mut self) {
        self.subscription = None;
        self.mirror.lock().expect("public mirror poisoned").clear();
    }

    pub fn is_live(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn set_text_filter(&mut self, raw: &str) {
        self.text_filter = raw.trim().to_lowercase();
    }

    pub fn set_category_filter(&mut self, raw: &str) {
        self.category_filter = raw.to_string();
    }

    pub fn category_options(&self) -> Vec<String> {
        self.mirror
            .lock()
            .expect("public mirror poisoned")
            .category_options()
    }

    /// The filtered, sorted pair list the gallery shows. Derived fresh
    /// from the mirror on every call.
    pub fn pairs(&self) -> Vec<CardPair> {
        let mirror = self.mirror.lock().expect("public mirror poisoned");
        let category = mirror::retained_category(&self.category_filter, &mirror.categories);
        build_pairs(&mirror.records, &self.text_filter, &category)
    }

    /// Resolve the gallery image URL for a stored path, once per path
    /// per session.
    pub async fn image_url(&self, storage_path: &str) -> Result<String, BlobError> {
        {
            let cache = self.url_cache.lock().expect("url cache poisoned");
            if let Some(url) = cache.get(storage_path) {
                return Ok(url.clone());
            }
        }
        let url = self.blobs.download_url(storage_path).await?;
        self.url_cache
            .lock()
            .expect("url cache poisoned")
            .insert(storage_path.to_string(), url.clone());
        Ok(url)
    }

    /// Resolve the download link and synthesized filename for one face.
    pub async fn download(&self, record: &CardRecord) -> Result<Download, BlobError> {
        let url = self.image_url(&record.storage_path).await?;
        Ok(Download {
            url,
            filename: text::download_filename(
                record.category.trim(),
                record.order,
                record.side.as_str(),
            ),
        })
    }
}

/// Pure render core: filter, group by (category, order), sort.
///
/// When duplicates share a pairing key the last record encountered in
/// store iteration order wins its slot; the store's delivery order for
/// such ties is not defined, and neither is the winner.
pub fn build_pairs(
    records: &[CardRecord],
    text_filter: &str,
    category_filter: &str,
) -> Vec<CardPair> {
    let mut pair_map: HashMap<String, CardPair> = HashMap::new();

    for record in records {
        if !mirror::matches_filters(record, text_filter, category_filter) {
            continue;
        }
        let category = record.category.trim().to_string();
        let key = format!("{}__{}", category, text::format_order(record.order));
        let pair = pair_map.entry(key).or_insert_with(|| CardPair {
            category,
            order: record.order,
            front: None,
            back: None,
        });
        match record.side {
            Side::Front => pair.front = Some(record.clone()),
            Side::Back => pair.back = Some(record.clone()),
        }
    }

    let mut pairs: Vec<CardPair> = pair_map.into_values().collect();
    pairs.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then_with(|| a.order.total_cmp(&b.order))
    });
    pairs
}

/// How one side of a pair renders.
pub fn slot_view(pair: &CardPair, side: Side) -> SlotView {
    let record = match side {
        Side::Front => &pair.front,
        Side::Back => &pair.back,
    };
    match record {
        Some(r) if r.is_path_linked() => SlotView::Image(r.clone()),
        _ => SlotView::Placeholder(CardPair::placeholder_label(side)),
    }
}
