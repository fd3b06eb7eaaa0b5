/// Admin controller
///
/// Authenticates an operator, mirrors the full record set over a live
/// subscription, and performs the create / update / replace-image /
/// delete operations. Every mutation is a single async task; a
/// per-action busy guard stops the same record (or the create form)
/// from being hit twice concurrently, while different records may be
/// acted on in parallel.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::convert::{self, ConvertError};
use crate::state::data::{validate_fields, CardRecord, ValidationError};
use crate::state::mirror::{self, Mirror, ALL_CATEGORIES};
use crate::store::auth::{AuthError, AuthGateway, Session};
use crate::store::blobs::{BlobError, BlobMeta, BlobStore};
use crate::store::records::{NewRecord, RecordPatch, RecordStore, StoreError, Subscription};

/// Busy-guard key for the create form, which targets no record id yet.
const CREATE_ACTION: &str = "__create__";

/// How far a create got before it stopped. The flow is a three-step
/// state machine and none of the steps are transactional: a failure
/// leaves the record in the named state, visible but incomplete, and
/// nothing rolls it back. (A repair sweep for stranded metadata-only
/// records is a known follow-up.)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatePhase {
    /// Document written, no blob yet; `storage_path` is empty
    MetadataOnly,
    /// Blob uploaded but the document still points nowhere
    ImageUploaded,
    /// Document patched with the blob path; the record is complete
    PathLinked,
}

/// Successful create result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedCard {
    pub id: String,
    pub storage_path: String,
    pub phase: CreatePhase,
}

/// What a delete request ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The operator declined the confirmation prompt
    Cancelled,
}

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("not signed in")]
    NotSignedIn,
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("{}", .0.friendly_message())]
    Auth(AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error("another operation is already running for {0}")]
    Busy(String),
    #[error("create stopped at {phase:?} for record {id}: {source}")]
    PartialCreate {
        id: String,
        phase: CreatePhase,
        #[source]
        source: Box<AdminError>,
    },
}

pub struct AdminController {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    auth: Arc<dyn AuthGateway>,
    session: Option<Session>,
    mirror: Arc<Mutex<Mirror>>,
    subscription: Option<Subscription>,
    busy: Arc<Mutex<HashSet<String>>>,
    /// Resolved thumbnail URLs, one per storage path per session
    url_cache: Mutex<HashMap<String, String>>,
    text_filter: String,
    category_filter: String,
}

impl AdminController {
    pub fn new(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        auth: Arc<dyn AuthGateway>,
    ) -> Self {
        AdminController {
            records,
            blobs,
            auth,
            session: None,
            mirror: Arc::new(Mutex::new(Mirror::new())),
            subscription: None,
            busy: Arc::new(Mutex::new(HashSet::new())),
            url_cache: Mutex::new(HashMap::new()),
            text_filter: String::new(),
            category_filter: ALL_CATEGORIES.to_string(),
        }
    }

    // ---- auth & subscription lifecycle ----

    /// Sign the operator in and open the live subscription.
    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<(), AdminError> {
        let session = self
            .auth
            .sign_in(email, password)
            .await
            .map_err(AdminError::Auth)?;
        self.session = Some(session);
        self.start_realtime();
        Ok(())
    }

    /// Drop the session, close the subscription, clear the mirror.
    pub fn sign_out(&mut self) {
        self.session = None;
        self.stop_realtime();
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Open the standing subscription. No-op when already live.
    fn start_realtime(&mut self) {
        if self.subscription.is_some() {
            return;
        }
        let mirror = Arc::clone(&self.mirror);
        self.subscription = Some(self.records.subscribe(Arc::new(move |snapshot| {
            // Admin mirrors everything that is not soft-deleted,
            // including records whose upload never finished
            mirror
                .lock()
                .expect("admin mirror poisoned")
                .replace(snapshot, |_| true);
        })));
    }

    fn stop_realtime(&mut self) {
        self.subscription = None;
        self.mirror.lock().expect("admin mirror poisoned").clear();
    }

    pub fn is_live(&self) -> bool {
        self.subscription.is_some()
    }

    // ---- local filter state ----

    pub fn set_text_filter(&mut self, raw: &str) {
        self.text_filter = raw.trim().to_lowercase();
    }

    pub fn set_category_filter(&mut self, raw: &str) {
        self.category_filter = raw.to_string();
    }

    /// Sorted category options for the filter selector.
    pub fn category_options(&self) -> Vec<String> {
        self.mirror
            .lock()
            .expect("admin mirror poisoned")
            .category_options()
    }

    /// The filtered, sorted list the admin page shows. Pure derivation
    /// from the mirror; calling it twice without a snapshot in between
    /// yields the identical list.
    pub fn visible_records(&self) -> Vec<CardRecord> {
        let mirror = self.mirror.lock().expect("admin mirror poisoned");
        let category = mirror::retained_category(&self.category_filter, &mirror.categories);
        filter_and_sort(&mirror.records, &self.text_filter, &category)
    }

    fn record(&self, id: &str) -> Option<CardRecord> {
        self.mirror
            .lock()
            .expect("admin mirror poisoned")
            .records
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    // ---- operations ----

    /// Create a card face: validate, re-encode to PNG, write the
    /// document, upload the blob, link the path back. The three writes
    /// are deliberately not atomic; see `CreatePhase`.
    pub async fn create_record(
        &self,
        category: &str,
        side: &str,
        order: f64,
        image: Option<&[u8]>,
    ) -> Result<CreatedCard, AdminError> {
        self.require_session()?;
        let _busy = self.mark_busy(CREATE_ACTION)?;

        let (category, side) = validate_fields(category, side, order)?;
        let image = match image {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => return Err(ValidationError::MissingImage.into()),
        };

        let png = convert::image_to_png(image.to_vec()).await?;

        // Document first, to get the id the blob path derives from
        let id = self
            .records
            .add(NewRecord {
                category,
                side,
                order,
                storage_path: String::new(),
            })
            .await?;

        let storage_path = deterministic_path(&id);

        if let Err(e) = self
            .blobs
            .put(&storage_path, png, BlobMeta::png())
            .await
        {
            return Err(partial(&id, CreatePhase::MetadataOnly, e.into()));
        }

        if let Err(e) = self
            .records
            .update(
                &id,
                RecordPatch {
                    storage_path: Some(storage_path.clone()),
                    ..Default::default()
                },
            )
            .await
        {
            return Err(partial(&id, CreatePhase::ImageUploaded, e.into()));
        }

        Ok(CreatedCard {
            id,
            storage_path,
            phase: CreatePhase::PathLinked,
        })
    }

    /// Patch the three editable metadata fields. Never touches
    /// `storage_path`.
    pub async fn update_record(
        &self,
        id: &str,
        category: &str,
        side: &str,
        order: f64,
    ) -> Result<(), AdminError> {
        self.require_session()?;
        let _busy = self.mark_busy(id)?;

        let (category, side) = validate_fields(category, side, order)?;
        self.records
            .update(
                id,
                RecordPatch {
                    category: Some(category),
                    side: Some(side),
                    order: Some(order),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }

    /// Upload a replacement image over the record's existing path (or
    /// the deterministic one if the original upload never linked), then
    /// refresh the cached thumbnail URL with a cache-busting suffix.
    pub async fn replace_image(&self, id: &str, image: &[u8]) -> Result<String, AdminError> {
        self.require_session()?;
        let _busy = self.mark_busy(id)?;

        if image.is_empty() {
            return Err(ValidationError::MissingImage.into());
        }

        let storage_path = match self.record(id) {
            Some(r) if r.is_path_linked() => r.storage_path,
            Some(_) => deterministic_path(id),
            None => return Err(StoreError::NotFound(id.to_string()).into()),
        };

        let png = convert::image_to_png(image.to_vec()).await?;
        self.blobs.put(&storage_path, png, BlobMeta::png()).await?;
        self.records
            .update(
                id,
                RecordPatch {
                    storage_path: Some(storage_path.clone()),
                    ..Default::default()
                },
            )
            .await?;

        // Re-resolve past any stale cached URL; failures here only
        // affect the preview, same as a thumbnail that never loads
        let _ = self.thumbnail_url(&storage_path, true).await;

        Ok(storage_path)
    }

    /// Delete a record, blob first (best effort), document second.
    /// `confirmed` carries the operator's answer to the confirmation
    /// prompt. No success message is needed on the happy path: the row
    /// disappears when the next snapshot lands.
    pub async fn delete_record(
        &self,
        id: &str,
        confirmed: bool,
    ) -> Result<DeleteOutcome, AdminError> {
        self.require_session()?;
        if !confirmed {
            return Ok(DeleteOutcome::Cancelled);
        }
        let _busy = self.mark_busy(id)?;

        if let Some(record) = self.record(id) {
            if record.is_path_linked() {
                // A blob that is already gone is not an error
                let _ = self.blobs.remove(&record.storage_path).await;
            }
        }

        self.records.remove(id).await?;
        Ok(DeleteOutcome::Deleted)
    }

    /// Resolve a thumbnail URL, cached per storage path. `bust` forces
    /// a re-resolve and appends a timestamp parameter to defeat
    /// aggressive image caching after a replacement.
    pub async fn thumbnail_url(&self, storage_path: &str, bust: bool) -> Result<String, AdminError> {
        if !bust {
            let cache = self.url_cache.lock().expect("url cache poisoned");
            if let Some(url) = cache.get(storage_path) {
                return Ok(url.clone());
            }
        }

        let mut url = self.blobs.download_url(storage_path).await?;
        if bust {
            let sep = if url.contains('?') { '&' } else { '?' };
            url = format!(
                "{}{}t={}",
                url,
                sep,
                chrono::Utc::now().timestamp_millis()
            );
        }
        self.url_cache
            .lock()
            .expect("url cache poisoned")
            .insert(storage_path.to_string(), url.clone());
        Ok(url)
    }

    // ---- guards ----

    fn require_session(&self) -> Result<(), AdminError> {
        if self.session.is_some() {
            Ok(())
        } else {
            Err(AdminError::NotSignedIn)
        }
    }

    fn mark_busy(&self, key: &str) -> Result<BusyToken, AdminError> {
        let mut busy = self.busy.lock().expect("busy set poisoned");
        if !busy.insert(key.to_string()) {
            return Err(AdminError::Busy(key.to_string()));
        }
        Ok(BusyToken {
            set: Arc::clone(&self.busy),
            key: key.to_string(),
        })
    }
}

/// Blob path derived from the document id.
pub fn deterministic_path(id: &str) -> String {
    format!("templates/{}.png", id)
}

fn partial(id: &str, phase: CreatePhase, source: AdminError) -> AdminError {
    AdminError::PartialCreate {
        id: id.to_string(),
        phase,
        source: Box::new(source),
    }
}

/// Pure render core for the admin list: shared category/text filter,
/// then sort by category (lexicographic) and order (numeric ascending).
pub fn filter_and_sort(
    records: &[CardRecord],
    text_filter: &str,
    category_filter: &str,
) -> Vec<CardRecord> {
    let mut out: Vec<CardRecord> = records
        .iter()
        .filter(|r| mirror::matches_filters(r, text_filter, category_filter))
        .cloned()
        .collect();
    out.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then_with(|| a.order.total_cmp(&b.order))
    });
    out
}

/// Releases the busy slot when the operation finishes, however it ends.
struct BusyToken {
    set: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for BusyToken {
    fn drop(&mut self) {
        self.set
            .lock()
            .expect("busy set poisoned")
            .remove(&self.key);
    }
}
