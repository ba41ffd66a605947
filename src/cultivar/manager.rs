//! Cultivar mutation facade.
//!
//! Every mutating operation reads the current document, computes the change
//! set against its normalized form, and commits field writes, the `updatedAt`
//! sentinel and one history entry in a single store write.

use super::mapper::{map_to_entity, superseded_legacy_field};
use super::models::*;
use super::timestamp::now_iso;
use super::validation::{
    validate_profile, validate_rating, validate_review_input, ValidationError,
};
use crate::audit::history::{
    append_history, build_entry, changed_fields_write, CREATED_AT_FIELD,
};
use crate::audit::{self, diff_fields, list_logs, Actor, ChangeSet, LogPage, LogQuery, MutationKind, EXCLUDED_FIELDS};
use crate::document_store::{Document, DocumentStore, DocumentWrite, OrderBy, StoreError};
use crate::review_generator::{ReviewGenerationError, ReviewGenerator, ReviewRequest};
use crate::server::metrics;
use crate::storage::{ObjectStorage, StorageError};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const CULTIVARS_COLLECTION: &str = "cultivars";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Review generation failed: {0}")]
    ReviewGeneration(#[from] ReviewGenerationError),
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id, .. } => CatalogError::NotFound(format!("cultivar {}", id)),
            other => CatalogError::Store(other),
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CultivarOrder {
    #[default]
    Name,
    /// Newest first.
    Created,
}

/// True for null, blank strings, and arrays or objects holding only blanks.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.values().all(is_blank),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn non_blank_fields(record: &Map<String, Value>) -> Map<String, Value> {
    record
        .iter()
        .filter(|(_, value)| !is_blank(value))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Patched `status` and `genetics` labels go through the same lenient parse
/// as the status endpoint. Unrecognized labels are left for serde to reject.
fn canonical_label(field: &str, value: &Value) -> Value {
    let Some(label) = value.as_str() else {
        return value.clone();
    };
    let canonical = match field {
        "status" => CultivarStatus::parse(label).map(|s| s.as_str()),
        "genetics" => Genetics::parse(label).map(|g| g.as_str()),
        _ => None,
    };
    canonical.map_or_else(|| value.clone(), |c| Value::String(c.to_string()))
}

/// Keep the base name of an uploaded file, restricted to a safe alphabet.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

pub struct CultivarManager {
    store: Arc<dyn DocumentStore>,
    storage: Arc<dyn ObjectStorage>,
    review_generator: Option<Arc<dyn ReviewGenerator>>,
}

impl CultivarManager {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        storage: Arc<dyn ObjectStorage>,
        review_generator: Option<Arc<dyn ReviewGenerator>>,
    ) -> Self {
        Self {
            store,
            storage,
            review_generator,
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    fn load(&self, id: &str) -> CatalogResult<Document> {
        self.store
            .get(CULTIVARS_COLLECTION, id)?
            .ok_or_else(|| CatalogError::NotFound(format!("cultivar {}", id)))
    }

    fn load_entity(&self, id: &str) -> CatalogResult<Cultivar> {
        self.load(id).map(|doc| map_to_entity(&doc.id, &doc.data))
    }

    pub fn get_cultivar(&self, id: &str) -> CatalogResult<Option<Cultivar>> {
        Ok(self
            .store
            .get(CULTIVARS_COLLECTION, id)?
            .map(|doc| map_to_entity(&doc.id, &doc.data)))
    }

    pub fn list_cultivars(&self, order: CultivarOrder) -> CatalogResult<Vec<Cultivar>> {
        let order_by = match order {
            CultivarOrder::Name => OrderBy::ascending("name"),
            CultivarOrder::Created => OrderBy::descending(CREATED_AT_FIELD),
        };
        Ok(self
            .store
            .list(CULTIVARS_COLLECTION, Some(&order_by))?
            .iter()
            .map(|doc| map_to_entity(&doc.id, &doc.data))
            .collect())
    }

    pub fn count(&self) -> CatalogResult<usize> {
        Ok(self.store.list(CULTIVARS_COLLECTION, None)?.len())
    }

    pub fn list_logs(&self, query: &LogQuery) -> CatalogResult<LogPage> {
        let cultivars: Vec<Cultivar> = self
            .store
            .list(CULTIVARS_COLLECTION, None)?
            .iter()
            .map(|doc| map_to_entity(&doc.id, &doc.data))
            .collect();
        Ok(list_logs(&cultivars, query))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Commit `changes` plus one history entry to an existing cultivar.
    fn commit(
        &self,
        id: &str,
        kind: MutationKind,
        changes: &ChangeSet,
        actor: &Actor,
        extra: Map<String, Value>,
        write: DocumentWrite,
    ) -> CatalogResult<()> {
        let entry = build_entry(kind, changes, actor, extra);
        let mut full_write = changed_fields_write(changes);
        for (field, _) in changes.iter() {
            if let Some(legacy) = superseded_legacy_field(field) {
                full_write = full_write.remove(legacy);
            }
        }
        for (field, field_write) in write.fields() {
            full_write.push(field.clone(), field_write.clone());
        }
        let full_write = append_history(full_write, &entry)?;
        if let Err(err) = self.store.update(CULTIVARS_COLLECTION, id, &full_write) {
            error!("Failed to commit {} on cultivar {}: {}", kind.as_str(), id, err);
            return Err(err.into());
        }
        metrics::record_cultivar_mutation(kind.as_str());
        info!(
            "{} on cultivar {} by {}: {}",
            kind.as_str(),
            id,
            actor.describe(),
            entry.event
        );
        Ok(())
    }

    /// Commit the profile change from `current` to `updated`.
    fn commit_profile(
        &self,
        current: &Cultivar,
        updated: &CultivarProfile,
        kind: MutationKind,
        actor: &Actor,
        extra: Map<String, Value>,
    ) -> CatalogResult<()> {
        let changes = diff_fields(
            &current.profile.to_record(),
            &updated.to_record(),
            EXCLUDED_FIELDS,
        );
        self.commit(&current.id, kind, &changes, actor, extra, DocumentWrite::new())
    }

    fn insert_new(
        &self,
        profile: &CultivarProfile,
        kind: MutationKind,
        actor: &Actor,
        extra_fields: DocumentWrite,
    ) -> CatalogResult<String> {
        let record = profile.to_record();
        let changes = diff_fields(&Map::new(), &non_blank_fields(&record), EXCLUDED_FIELDS);
        let entry = build_entry(kind, &changes, actor, Map::new());

        let mut write = DocumentWrite::new();
        for (field, value) in record {
            write = write.set(field, value);
        }
        write = write
            .set("reviews", json!([]))
            .set("history", json!([]));
        for (field, field_write) in extra_fields.fields() {
            write.push(field.clone(), field_write.clone());
        }
        let write = append_history(write.server_timestamp(CREATED_AT_FIELD), &entry)?;

        let id = self.store.add(CULTIVARS_COLLECTION, &write)?;
        metrics::record_cultivar_mutation(kind.as_str());
        Ok(id)
    }

    pub fn create_cultivar(
        &self,
        profile: CultivarProfile,
        actor: &Actor,
    ) -> CatalogResult<Cultivar> {
        validate_profile(&profile)?;
        let id = self.insert_new(&profile, MutationKind::Create, actor, DocumentWrite::new())?;
        info!("Created cultivar {} ({}) by {}", id, profile.name, actor.describe());
        self.load_entity(&id)
    }

    /// Apply a JSON patch of editable fields. Unknown and bookkeeping keys are
    /// ignored. An update that changes nothing still records an entry.
    pub fn update_cultivar(
        &self,
        id: &str,
        patch: &Map<String, Value>,
        actor: &Actor,
    ) -> CatalogResult<Cultivar> {
        let current = self.load_entity(id)?;
        let mut merged = current.profile.to_record();
        for (field, value) in patch {
            if EDITABLE_FIELDS.contains(&field.as_str()) {
                merged.insert(field.clone(), canonical_label(field, value));
            }
        }
        let updated: CultivarProfile =
            serde_json::from_value(Value::Object(merged)).map_err(|e| {
                ValidationError::InvalidValue {
                    field: "patch".to_string(),
                    reason: e.to_string(),
                }
            })?;
        validate_profile(&updated)?;

        self.commit_profile(&current, &updated, MutationKind::Update, actor, Map::new())?;
        self.load_entity(id)
    }

    pub fn set_status(
        &self,
        id: &str,
        status: CultivarStatus,
        actor: &Actor,
    ) -> CatalogResult<Cultivar> {
        let entry = audit::status::set_status(
            self.store.as_ref(),
            CULTIVARS_COLLECTION,
            id,
            status,
            actor,
        )?;
        metrics::record_cultivar_mutation("status");
        info!("Cultivar {}: {} by {}", id, entry.event, actor.describe());
        self.load_entity(id)
    }

    /// Returns the ids that were updated, duplicates removed.
    pub fn set_status_bulk(
        &self,
        ids: &[String],
        status: CultivarStatus,
        actor: &Actor,
    ) -> CatalogResult<Vec<String>> {
        let entries = audit::status::set_status_bulk(
            self.store.as_ref(),
            CULTIVARS_COLLECTION,
            ids,
            status,
            actor,
        )
        .inspect_err(|err| error!("Bulk status change to {} failed: {}", status, err))?;
        if !entries.is_empty() {
            metrics::record_cultivar_mutation("status_bulk");
            info!(
                "Bulk status change to {} on {} cultivars by {}",
                status,
                entries.len(),
                actor.describe()
            );
        }
        Ok(entries.into_iter().map(|(id, _)| id).collect())
    }

    /// Generate a review from the experience text and append it.
    pub async fn add_review(
        &self,
        id: &str,
        author: &str,
        rating: i64,
        experience: &str,
        actor: &Actor,
    ) -> CatalogResult<Review> {
        let rating = validate_rating(rating)?;
        validate_review_input(author, experience)?;
        let current = self.load_entity(id)?;
        let generator = self
            .review_generator
            .as_ref()
            .ok_or(ReviewGenerationError::NotConfigured)?;

        let generated = generator
            .generate(&ReviewRequest {
                cultivar_name: current.profile.name.clone(),
                experience_text: experience.to_string(),
            })
            .await
            .inspect_err(|err| {
                error!("Review generation for cultivar {} failed: {}", id, err)
            })?;

        let review = Review {
            id: Uuid::new_v4().to_string(),
            author: author.trim().to_string(),
            rating,
            text: generated.review,
            sentiment_score: Some(generated.sentiment_score),
            created_at: now_iso(),
        };
        let mut extra = Map::new();
        extra.insert("reviewId".to_string(), json!(review.id));
        extra.insert("reviewAuthor".to_string(), json!(review.author));
        extra.insert("rating".to_string(), json!(review.rating));
        extra.insert("sentimentScore".to_string(), json!(review.sentiment_score));

        let write = DocumentWrite::new().append("reviews", serde_json::to_value(&review).map_err(StoreError::from)?);
        self.commit(
            id,
            MutationKind::ReviewAdded,
            &ChangeSet::default(),
            actor,
            extra,
            write,
        )?;
        Ok(review)
    }

    /// Upload an object, then run `commit`. The object is deleted again if
    /// the commit fails.
    async fn upload_and_commit<F>(&self, bytes: Vec<u8>, path: &str, commit: F) -> CatalogResult<String>
    where
        F: FnOnce(&str) -> CatalogResult<()>,
    {
        let url = self.storage.upload(bytes, path).await?;
        if let Err(err) = commit(&url) {
            if let Err(cleanup) = self.storage.delete(&url).await {
                warn!("Failed to clean up {} after failed write: {}", url, cleanup);
            }
            return Err(err);
        }
        Ok(url)
    }

    async fn delete_object(&self, url: &str) {
        if let Err(err) = self.storage.delete(url).await {
            warn!("Failed to delete stored object {}: {}", url, err);
        }
    }

    pub async fn add_image(
        &self,
        id: &str,
        bytes: Vec<u8>,
        alt: Option<String>,
        actor: &Actor,
    ) -> CatalogResult<CultivarImage> {
        let current = self.load_entity(id)?;
        let kind = infer::get(&bytes)
            .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "image".to_string(),
                reason: "not a supported image format".to_string(),
            })?;

        let image_id = Uuid::new_v4().to_string();
        let path = format!("cultivars/{}/images/{}.{}", id, image_id, kind.extension());
        let alt = alt
            .filter(|alt| !alt.trim().is_empty())
            .unwrap_or_else(|| current.profile.name.clone());

        let mut image = CultivarImage {
            id: image_id,
            url: String::new(),
            alt,
            data_ai_hint: None,
        };
        let url = self
            .upload_and_commit(bytes, &path, |url| {
                // Re-read so writes landing during the upload are kept.
                let current = self.load_entity(id)?;
                let mut updated = current.profile.clone();
                updated.images.push(CultivarImage {
                    url: url.to_string(),
                    ..image.clone()
                });
                let mut extra = Map::new();
                extra.insert("imageId".to_string(), json!(image.id));
                extra.insert("imageUrl".to_string(), json!(url));
                self.commit_profile(&current, &updated, MutationKind::ImageAdded, actor, extra)
            })
            .await?;
        image.url = url;
        Ok(image)
    }

    pub async fn remove_image(&self, id: &str, image_id: &str, actor: &Actor) -> CatalogResult<()> {
        let current = self.load_entity(id)?;
        let mut updated = current.profile.clone();
        let position = updated
            .images
            .iter()
            .position(|image| image.id == image_id)
            .ok_or_else(|| CatalogError::NotFound(format!("image {} of cultivar {}", image_id, id)))?;
        let removed = updated.images.remove(position);

        let mut extra = Map::new();
        extra.insert("imageId".to_string(), json!(removed.id));
        extra.insert("imageUrl".to_string(), json!(removed.url));
        self.commit_profile(&current, &updated, MutationKind::ImageRemoved, actor, extra)?;
        self.delete_object(&removed.url).await;
        Ok(())
    }

    pub async fn add_additional_info(
        &self,
        id: &str,
        category: InfoCategory,
        file_name: &str,
        bytes: Vec<u8>,
        actor: &Actor,
    ) -> CatalogResult<AdditionalFile> {
        if bytes.is_empty() {
            return Err(ValidationError::EmptyField { field: "file" }.into());
        }
        // Fail with 404 before anything is uploaded.
        self.load(id)?;
        let file_type = infer::get(&bytes)
            .map(|kind| kind.mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let file_id = Uuid::new_v4().to_string();
        let path = format!(
            "cultivars/{}/{}/{}-{}",
            id,
            category.as_str(),
            file_id,
            sanitize_file_name(file_name)
        );

        let mut file = AdditionalFile {
            id: file_id,
            name: file_name.trim().to_string(),
            url: String::new(),
            file_type,
            category,
        };
        let url = self
            .upload_and_commit(bytes, &path, |url| {
                let current = self.load_entity(id)?;
                let mut updated = current.profile.clone();
                updated.additional_info.files_mut(category).push(AdditionalFile {
                    url: url.to_string(),
                    ..file.clone()
                });
                let mut extra = Map::new();
                extra.insert("category".to_string(), json!(category.as_str()));
                extra.insert("fileId".to_string(), json!(file.id));
                extra.insert("fileName".to_string(), json!(file.name));
                self.commit_profile(
                    &current,
                    &updated,
                    MutationKind::AdditionalInfoAdded,
                    actor,
                    extra,
                )
            })
            .await?;
        file.url = url;
        Ok(file)
    }

    pub async fn remove_additional_info(
        &self,
        id: &str,
        category: InfoCategory,
        file_id: &str,
        actor: &Actor,
    ) -> CatalogResult<()> {
        let current = self.load_entity(id)?;
        let mut updated = current.profile.clone();
        let files = updated.additional_info.files_mut(category);
        let position = files
            .iter()
            .position(|file| file.id == file_id)
            .ok_or_else(|| {
                CatalogError::NotFound(format!(
                    "{} file {} of cultivar {}",
                    category.as_str(),
                    file_id,
                    id
                ))
            })?;
        let removed = files.remove(position);

        let mut extra = Map::new();
        extra.insert("category".to_string(), json!(category.as_str()));
        extra.insert("fileId".to_string(), json!(removed.id));
        extra.insert("fileName".to_string(), json!(removed.name));
        self.commit_profile(
            &current,
            &updated,
            MutationKind::AdditionalInfoRemoved,
            actor,
            extra,
        )?;
        self.delete_object(&removed.url).await;
        Ok(())
    }

    /// Import raw records. Each is normalized, validated and stored with its
    /// reviews and prior history plus one seed entry. Invalid records are
    /// skipped. Returns the new ids.
    pub fn seed(&self, records: &[Map<String, Value>]) -> CatalogResult<Vec<String>> {
        let mut ids = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let cultivar = map_to_entity("", record);
            if let Err(err) = validate_profile(&cultivar.profile) {
                warn!("Skipping seed record #{}: {}", index, err);
                continue;
            }
            let carried = DocumentWrite::new()
                .set(
                    "reviews",
                    serde_json::to_value(&cultivar.reviews).map_err(StoreError::from)?,
                )
                .set(
                    "history",
                    serde_json::to_value(&cultivar.history).map_err(StoreError::from)?,
                );
            let id = self.insert_new(&cultivar.profile, MutationKind::Seed, &Actor::System, carried)?;
            ids.push(id);
        }
        info!("Seeded {} of {} cultivar records", ids.len(), records.len());
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::history::{EVENT_CREATED, EVENT_DETAILS_UPDATED, EVENT_SEEDED};
    use crate::document_store::SqliteDocumentStore;
    use crate::identity::UserIdentity;
    use crate::review_generator::{GeneratedReview, MockReviewGenerator};
    use crate::storage::{LocalObjectStorage, MockObjectStorage};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    /// Delegates to an in-memory store, failing every write while `fail` is set.
    struct FlakyStore {
        inner: SqliteDocumentStore,
        fail: AtomicBool,
    }

    impl FlakyStore {
        fn check(&self) -> Result<(), StoreError> {
            if self.fail.load(Ordering::SeqCst) {
                Err(StoreError::Unavailable("simulated failure".to_string()))
            } else {
                Ok(())
            }
        }
    }

    impl DocumentStore for FlakyStore {
        fn get(&self, c: &str, id: &str) -> Result<Option<Document>, StoreError> {
            self.inner.get(c, id)
        }
        fn list(&self, c: &str, o: Option<&OrderBy>) -> Result<Vec<Document>, StoreError> {
            self.inner.list(c, o)
        }
        fn add(&self, c: &str, w: &DocumentWrite) -> Result<String, StoreError> {
            self.check()?;
            self.inner.add(c, w)
        }
        fn update(&self, c: &str, id: &str, w: &DocumentWrite) -> Result<(), StoreError> {
            self.check()?;
            self.inner.update(c, id, w)
        }
        fn batch_update(&self, c: &str, u: &[(String, DocumentWrite)]) -> Result<(), StoreError> {
            self.check()?;
            self.inner.batch_update(c, u)
        }
    }

    struct Fixture {
        _media: TempDir,
        store: Arc<FlakyStore>,
        manager: CultivarManager,
    }

    fn fixture_with(generator: Option<Arc<dyn ReviewGenerator>>) -> Fixture {
        let media = TempDir::new().unwrap();
        let store = Arc::new(FlakyStore {
            inner: SqliteDocumentStore::in_memory().unwrap(),
            fail: AtomicBool::new(false),
        });
        let storage = Arc::new(LocalObjectStorage::new(media.path(), "/media"));
        let manager = CultivarManager::new(store.clone(), storage, generator);
        Fixture {
            _media: media,
            store,
            manager,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(None)
    }

    fn admin() -> Actor {
        Actor::User(UserIdentity {
            id: "admin-1".to_string(),
            email: Some("admin@example.com".to_string()),
            display_name: None,
        })
    }

    fn profile(name: &str) -> CultivarProfile {
        CultivarProfile {
            name: name.to_string(),
            genetics: Some(Genetics::Hybrid),
            effects: vec!["Happy".to_string(), "Relaxed".to_string()],
            ..Default::default()
        }
    }

    fn patch(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    // 1x1 transparent PNG.
    const PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89,
    ];

    #[test]
    fn create_records_creation_entry() {
        let f = fixture();
        let cultivar = f.manager.create_cultivar(profile("Blue Dream"), &admin()).unwrap();

        assert_eq!(cultivar.name(), "Blue Dream");
        assert_eq!(cultivar.status(), CultivarStatus::RecentlyAdded);
        assert_eq!(cultivar.history.len(), 1);
        let entry = &cultivar.history[0];
        assert_eq!(entry.event, EVENT_CREATED);
        assert_eq!(entry.user_id.as_deref(), Some("admin-1"));
        assert_eq!(
            entry.details["updatedFields"],
            json!(["effects", "genetics", "name", "status"])
        );

        let raw = f.store.get(CULTIVARS_COLLECTION, &cultivar.id).unwrap().unwrap();
        assert!(raw.data["createdAt"].is_object());
        assert!(raw.data["updatedAt"].is_object());
    }

    #[test]
    fn create_rejects_invalid_profile() {
        let f = fixture();
        let result = f.manager.create_cultivar(profile(""), &admin());
        assert!(matches!(result, Err(CatalogError::Validation(_))));
        assert_eq!(f.manager.count().unwrap(), 0);
    }

    #[test]
    fn update_writes_only_changed_fields() {
        let f = fixture();
        let created = f.manager.create_cultivar(profile("Haze"), &admin()).unwrap();

        let updated = f
            .manager
            .update_cultivar(
                &created.id,
                &patch(json!({
                    "description": "Classic sativa",
                    "effects": ["Relaxed", "Happy"],
                    "history": [],
                    "bogus": 1,
                })),
                &Actor::System,
            )
            .unwrap();

        assert_eq!(updated.profile.description, "Classic sativa");
        // Reordered tag list is not a change, so the stored order is kept.
        assert_eq!(updated.profile.effects, vec!["Happy", "Relaxed"]);
        assert_eq!(updated.history.len(), 2);
        let entry = &updated.history[1];
        assert_eq!(entry.event, EVENT_DETAILS_UPDATED);
        assert_eq!(entry.details["updatedFields"], json!(["description"]));
        assert_eq!(entry.details["source"], json!("Anonymous or System"));
    }

    #[test]
    fn update_with_status_uses_transition_label() {
        let f = fixture();
        let created = f.manager.create_cultivar(profile("Haze"), &admin()).unwrap();
        let updated = f
            .manager
            .update_cultivar(&created.id, &patch(json!({"status": "verified"})), &admin())
            .unwrap();
        let entry = updated.history.last().unwrap();
        assert_eq!(entry.event, "Status changed from recentlyAdded to verified");
        assert_eq!(entry.details["oldStatus"], json!("recentlyAdded"));
    }

    #[test]
    fn update_accepts_status_and_genetics_in_any_case() {
        let f = fixture();
        let created = f.manager.create_cultivar(profile("Haze"), &admin()).unwrap();
        let updated = f
            .manager
            .update_cultivar(
                &created.id,
                &patch(json!({"status": " live", "genetics": "SATIVA"})),
                &admin(),
            )
            .unwrap();
        assert_eq!(updated.status(), CultivarStatus::Live);
        assert_eq!(updated.profile.genetics, Some(Genetics::Sativa));
        assert_eq!(
            updated.history.last().unwrap().event,
            "Status changed from recentlyAdded to Live"
        );
    }

    #[test]
    fn writing_a_field_drops_its_legacy_key() {
        let f = fixture();
        let id = f
            .store
            .add(
                CULTIVARS_COLLECTION,
                &DocumentWrite::new()
                    .set("name", json!("Haze"))
                    .set("thcLevel", json!(18))
                    .set("imageUrl", json!("https://img.example/old.png")),
            )
            .unwrap();

        let updated = f
            .manager
            .update_cultivar(&id, &patch(json!({"thc": {"min": 15, "max": 20}})), &admin())
            .unwrap();
        assert_eq!(updated.profile.thc, Range::new(Some(15.0), Some(20.0)));
        assert_eq!(
            updated.history.last().unwrap().details["updatedFields"],
            json!(["thc"])
        );

        let raw = f.store.get(CULTIVARS_COLLECTION, &id).unwrap().unwrap().data;
        assert!(!raw.contains_key("thcLevel"));
        // Images were not written, so the legacy url is still the source.
        assert_eq!(raw["imageUrl"], json!("https://img.example/old.png"));
        assert_eq!(updated.profile.images[0].id, "legacy-image");
    }

    #[test]
    fn noop_update_still_records_entry() {
        let f = fixture();
        let created = f.manager.create_cultivar(profile("Haze"), &admin()).unwrap();
        let updated = f
            .manager
            .update_cultivar(&created.id, &Map::new(), &admin())
            .unwrap();
        assert_eq!(updated.history.len(), 2);
        assert!(!updated.history[1].details.contains_key("updatedFields"));
    }

    #[test]
    fn update_rejects_bad_values_and_missing_ids() {
        let f = fixture();
        let created = f.manager.create_cultivar(profile("Haze"), &admin()).unwrap();
        assert!(matches!(
            f.manager
                .update_cultivar(&created.id, &patch(json!({"status": "gone"})), &admin()),
            Err(CatalogError::Validation(_))
        ));
        assert!(matches!(
            f.manager
                .update_cultivar(&created.id, &patch(json!({"thc": {"min": 30, "max": 10}})), &admin()),
            Err(CatalogError::Validation(_))
        ));
        assert!(matches!(
            f.manager.update_cultivar("missing", &Map::new(), &admin()),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn failed_write_changes_nothing() {
        let f = fixture();
        let created = f.manager.create_cultivar(profile("Haze"), &admin()).unwrap();
        let before = f.store.get(CULTIVARS_COLLECTION, &created.id).unwrap().unwrap();

        f.store.fail.store(true, Ordering::SeqCst);
        let result = f.manager.update_cultivar(
            &created.id,
            &patch(json!({"name": "Purple Haze", "status": "Live"})),
            &admin(),
        );
        assert!(matches!(result, Err(CatalogError::Store(_))));
        let status = f
            .manager
            .set_status_bulk(&[created.id.clone()], CultivarStatus::Hide, &admin());
        assert!(status.is_err());

        let after = f.store.get(CULTIVARS_COLLECTION, &created.id).unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn status_changes() {
        let f = fixture();
        let a = f.manager.create_cultivar(profile("A"), &admin()).unwrap();
        let b = f.manager.create_cultivar(profile("B"), &admin()).unwrap();

        let a = f
            .manager
            .set_status(&a.id, CultivarStatus::Verified, &admin())
            .unwrap();
        assert_eq!(
            a.history.last().unwrap().event,
            "Status changed from recentlyAdded to verified"
        );

        let updated = f
            .manager
            .set_status_bulk(&[a.id.clone(), b.id.clone()], CultivarStatus::Archived, &admin())
            .unwrap();
        assert_eq!(updated, vec![a.id.clone(), b.id.clone()]);
        let a = f.manager.get_cultivar(&a.id).unwrap().unwrap();
        let b = f.manager.get_cultivar(&b.id).unwrap().unwrap();
        assert_eq!(a.status(), CultivarStatus::Archived);
        assert_eq!(
            a.history.last().unwrap().event,
            "Status mass-changed from verified to archived"
        );
        assert_eq!(
            b.history.last().unwrap().event,
            "Status mass-changed from recentlyAdded to archived"
        );
    }

    #[tokio::test]
    async fn add_review_appends_review_and_entry() {
        let mut generator = MockReviewGenerator::new();
        generator
            .expect_generate()
            .withf(|request| request.cultivar_name == "Haze")
            .times(1)
            .returning(|_| {
                Ok(GeneratedReview {
                    review: "Bright and uplifting.".to_string(),
                    sentiment_score: 0.9,
                })
            });
        let f = fixture_with(Some(Arc::new(generator)));
        let created = f.manager.create_cultivar(profile("Haze"), &admin()).unwrap();

        let review = f
            .manager
            .add_review(&created.id, "Ann", 5, "felt great", &admin())
            .await
            .unwrap();
        assert_eq!(review.text, "Bright and uplifting.");
        assert_eq!(review.sentiment_score, Some(0.9));

        let cultivar = f.manager.get_cultivar(&created.id).unwrap().unwrap();
        assert_eq!(cultivar.reviews, vec![review.clone()]);
        let entry = cultivar.history.last().unwrap();
        assert_eq!(entry.event, "Review Added");
        assert_eq!(entry.details["reviewAuthor"], json!("Ann"));
        assert_eq!(entry.details["rating"], json!(5));
    }

    #[tokio::test]
    async fn review_generation_failure_writes_nothing() {
        let mut generator = MockReviewGenerator::new();
        generator
            .expect_generate()
            .returning(|_| Err(ReviewGenerationError::Timeout));
        let f = fixture_with(Some(Arc::new(generator)));
        let created = f.manager.create_cultivar(profile("Haze"), &admin()).unwrap();

        let result = f
            .manager
            .add_review(&created.id, "Ann", 4, "nice", &admin())
            .await;
        assert!(matches!(result, Err(CatalogError::ReviewGeneration(_))));
        let cultivar = f.manager.get_cultivar(&created.id).unwrap().unwrap();
        assert!(cultivar.reviews.is_empty());
        assert_eq!(cultivar.history.len(), 1);
    }

    #[tokio::test]
    async fn review_rating_is_validated_before_generation() {
        let generator = MockReviewGenerator::new();
        let f = fixture_with(Some(Arc::new(generator)));
        let created = f.manager.create_cultivar(profile("Haze"), &admin()).unwrap();
        let result = f
            .manager
            .add_review(&created.id, "Ann", 9, "nice", &admin())
            .await;
        assert!(matches!(result, Err(CatalogError::Validation(_))));
    }

    #[tokio::test]
    async fn image_lifecycle() {
        let f = fixture();
        let created = f.manager.create_cultivar(profile("Haze"), &admin()).unwrap();

        let image = f
            .manager
            .add_image(&created.id, PNG.to_vec(), None, &admin())
            .await
            .unwrap();
        assert!(image.url.starts_with("/media/cultivars/"));
        assert!(image.url.ends_with(".png"));
        assert_eq!(image.alt, "Haze");

        let cultivar = f.manager.get_cultivar(&created.id).unwrap().unwrap();
        assert_eq!(cultivar.profile.images, vec![image.clone()]);
        let entry = cultivar.history.last().unwrap();
        assert_eq!(entry.event, "Image Added");
        assert_eq!(entry.details["updatedFields"], json!(["images"]));

        f.manager
            .remove_image(&created.id, &image.id, &admin())
            .await
            .unwrap();
        let cultivar = f.manager.get_cultivar(&created.id).unwrap().unwrap();
        assert!(cultivar.profile.images.is_empty());
        assert_eq!(cultivar.history.last().unwrap().event, "Image Removed");

        assert!(matches!(
            f.manager.remove_image(&created.id, &image.id, &admin()).await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn non_image_upload_is_rejected() {
        let f = fixture();
        let created = f.manager.create_cultivar(profile("Haze"), &admin()).unwrap();
        let result = f
            .manager
            .add_image(&created.id, b"plain text".to_vec(), None, &admin())
            .await;
        assert!(matches!(result, Err(CatalogError::Validation(_))));
    }

    #[tokio::test]
    async fn failed_commit_deletes_uploaded_object() {
        let mut storage = MockObjectStorage::new();
        storage
            .expect_upload()
            .times(1)
            .returning(|_, path| Ok(format!("/media/{}", path)));
        storage.expect_delete().times(1).returning(|_| Ok(()));

        let store = FlakyStore {
            inner: SqliteDocumentStore::in_memory().unwrap(),
            fail: AtomicBool::new(false),
        };
        let id = store
            .add(CULTIVARS_COLLECTION, &DocumentWrite::new().set("name", json!("Haze")))
            .unwrap();
        store.fail.store(true, Ordering::SeqCst);
        let manager = CultivarManager::new(Arc::new(store), Arc::new(storage), None);

        let result = manager.add_image(&id, PNG.to_vec(), None, &admin()).await;
        assert!(matches!(result, Err(CatalogError::Store(_))));
    }

    #[tokio::test]
    async fn image_added_during_upload_is_kept() {
        let store = Arc::new(SqliteDocumentStore::in_memory().unwrap());
        let id = store
            .add(CULTIVARS_COLLECTION, &DocumentWrite::new().set("name", json!("Haze")))
            .unwrap();

        // Another editor adds an image while this upload is in flight.
        let mut storage = MockObjectStorage::new();
        let concurrent_store = store.clone();
        let concurrent_id = id.clone();
        storage.expect_upload().times(1).returning(move |_, path| {
            concurrent_store
                .update(
                    CULTIVARS_COLLECTION,
                    &concurrent_id,
                    &DocumentWrite::new().set(
                        "images",
                        json!([{"id": "other", "url": "/media/other.png", "alt": "Other"}]),
                    ),
                )
                .unwrap();
            Ok(format!("/media/{}", path))
        });
        let manager = CultivarManager::new(store.clone(), Arc::new(storage), None);

        let image = manager.add_image(&id, PNG.to_vec(), None, &admin()).await.unwrap();

        let cultivar = manager.get_cultivar(&id).unwrap().unwrap();
        let ids: Vec<&str> = cultivar.profile.images.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["other", image.id.as_str()]);
        assert_eq!(cultivar.history.last().unwrap().event, "Image Added");
    }

    #[tokio::test]
    async fn additional_info_lifecycle() {
        let f = fixture();
        let created = f.manager.create_cultivar(profile("Haze"), &admin()).unwrap();

        let file = f
            .manager
            .add_additional_info(
                &created.id,
                InfoCategory::CannabinoidInfo,
                "../lab results.pdf",
                b"%PDF-1.4 test".to_vec(),
                &admin(),
            )
            .await
            .unwrap();
        assert_eq!(file.file_type, "application/pdf");
        assert_eq!(file.name, "../lab results.pdf");
        assert!(file.url.ends_with("lab_results.pdf"));

        let cultivar = f.manager.get_cultivar(&created.id).unwrap().unwrap();
        assert_eq!(cultivar.profile.additional_info.cannabinoid_info, vec![file.clone()]);
        let entry = cultivar.history.last().unwrap();
        assert_eq!(entry.event, "Additional Info Added");
        assert_eq!(entry.details["category"], json!("cannabinoidInfo"));

        assert!(matches!(
            f.manager
                .remove_additional_info(&created.id, InfoCategory::TerpeneInfo, &file.id, &admin())
                .await,
            Err(CatalogError::NotFound(_))
        ));
        f.manager
            .remove_additional_info(&created.id, InfoCategory::CannabinoidInfo, &file.id, &admin())
            .await
            .unwrap();
        let cultivar = f.manager.get_cultivar(&created.id).unwrap().unwrap();
        assert!(cultivar.profile.additional_info.cannabinoid_info.is_empty());
        assert_eq!(cultivar.history.last().unwrap().event, "Additional Info Removed");
    }

    #[test]
    fn seed_imports_valid_records() {
        let f = fixture();
        let records = vec![
            patch(json!({
                "name": "Northern Lights",
                "thcLevel": 18,
                "history": [{"timestamp": "2023-01-01T00:00:00Z", "event": "Imported"}],
            })),
            patch(json!({"description": "nameless"})),
        ];
        let ids = f.manager.seed(&records).unwrap();
        assert_eq!(ids.len(), 1);

        let cultivar = f.manager.get_cultivar(&ids[0]).unwrap().unwrap();
        assert_eq!(cultivar.profile.thc, Range::new(Some(18.0), Some(18.0)));
        assert_eq!(cultivar.history.len(), 2);
        assert_eq!(cultivar.history[0].event, "Imported");
        assert_eq!(cultivar.history[1].event, EVENT_SEEDED);
        assert_eq!(cultivar.history[1].details["seed"], json!(true));
    }

    #[test]
    fn list_orders_and_logs() {
        let f = fixture();
        f.manager.create_cultivar(profile("b-strain"), &admin()).unwrap();
        f.manager.create_cultivar(profile("A-strain"), &admin()).unwrap();

        let names: Vec<String> = f
            .manager
            .list_cultivars(CultivarOrder::Name)
            .unwrap()
            .into_iter()
            .map(|c| c.profile.name)
            .collect();
        assert_eq!(names, vec!["A-strain", "b-strain"]);

        let newest_first = f.manager.list_cultivars(CultivarOrder::Created).unwrap();
        assert_eq!(newest_first[0].profile.name, "A-strain");

        let page = f.manager.list_logs(&LogQuery::default()).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.entries[0].user_display, "admin@example.com");
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_file_name("a b.pdf"), "a_b.pdf");
        assert_eq!(sanitize_file_name("dir/x.png"), "x.png");
        assert_eq!(sanitize_file_name("..\\.."), "file");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
    }
}
