use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use bytes::Bytes;
use chrono::Utc;
use taskboard_attachments_api::AttachmentRef;
use taskboard_attachments_api::BlobStore;
use taskboard_attachments_api::DeleteError;
use taskboard_attachments_api::DeleteOutcome;
use taskboard_attachments_api::OwnerId;
use taskboard_attachments_api::RecordError;
use taskboard_attachments_api::RecordStore;
use taskboard_attachments_api::TaskFields;
use taskboard_attachments_api::TaskId;
use taskboard_attachments_api::TaskRecord;
use taskboard_attachments_api::TaskUpdate;
use taskboard_attachments_api::UploadError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredBlob {
    pub owner: OwnerId,
    pub payload: Bytes,
    pub mime: String,
}

#[derive(Default)]
struct BlobState {
    next_id: u64,
    objects: HashMap<AttachmentRef, StoredBlob>,
    failing_payloads: Vec<Bytes>,
    failing_deletes: HashSet<AttachmentRef>,
    upload_calls: usize,
    delete_requests: Vec<AttachmentRef>,
}

/// In-memory blob store with failure injection, for tests and `mode = "mock"`.
#[derive(Default)]
pub struct MockBlobStore {
    state: Mutex<BlobState>,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds one object per ref.
    pub fn with_objects<'a>(refs: impl IntoIterator<Item = &'a str>) -> Self {
        let store = Self::new();
        for r in refs {
            store.insert(AttachmentRef::new(r), Bytes::from(r.as_bytes().to_vec()));
        }
        store
    }

    pub fn insert(&self, attachment_ref: AttachmentRef, payload: Bytes) {
        self.state().objects.insert(
            attachment_ref,
            StoredBlob {
                owner: OwnerId::new("seed"),
                payload,
                mime: "application/octet-stream".to_string(),
            },
        );
    }

    /// Uploads whose payload equals `payload` fail.
    pub fn fail_uploads_of(&self, payload: impl Into<Bytes>) {
        self.state().failing_payloads.push(payload.into());
    }

    /// Deletes of `attachment_ref` fail and leave the object in place.
    pub fn fail_deletes_of(&self, attachment_ref: AttachmentRef) {
        self.state().failing_deletes.insert(attachment_ref);
    }

    pub fn contains(&self, attachment_ref: &AttachmentRef) -> bool {
        self.state().objects.contains_key(attachment_ref)
    }

    pub fn get(&self, attachment_ref: &AttachmentRef) -> Option<StoredBlob> {
        self.state().objects.get(attachment_ref).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.state().objects.len()
    }

    pub fn upload_calls(&self) -> usize {
        self.state().upload_calls
    }

    /// Every ref passed to `delete`, in request order.
    pub fn delete_requests(&self) -> Vec<AttachmentRef> {
        self.state().delete_requests.clone()
    }

    fn state(&self) -> MutexGuard<'_, BlobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl BlobStore for MockBlobStore {
    async fn upload(
        &self,
        owner: &OwnerId,
        payload: Bytes,
        mime_hint: &str,
    ) -> Result<AttachmentRef, UploadError> {
        let mut state = self.state();
        state.upload_calls += 1;
        if state.failing_payloads.contains(&payload) {
            return Err(UploadError::new("mock upload failure"));
        }
        state.next_id += 1;
        let attachment_ref = AttachmentRef::new(format!("{owner}/mock-{}", state.next_id));
        state.objects.insert(
            attachment_ref.clone(),
            StoredBlob {
                owner: owner.clone(),
                payload,
                mime: mime_hint.to_string(),
            },
        );
        Ok(attachment_ref)
    }

    fn resolve_public_ref(&self, attachment_ref: &AttachmentRef) -> String {
        format!("mock://{attachment_ref}")
    }

    async fn delete(&self, refs: &[AttachmentRef]) -> Vec<DeleteOutcome> {
        let mut state = self.state();
        refs.iter()
            .map(|r| {
                state.delete_requests.push(r.clone());
                let outcome = if state.failing_deletes.contains(r) {
                    Err(DeleteError::new("mock delete failure"))
                } else if state.objects.remove(r).is_none() {
                    Err(DeleteError::new(format!("no such object: {r}")))
                } else {
                    Ok(())
                };
                (r.clone(), outcome)
            })
            .collect()
    }
}

#[derive(Default)]
struct RecordState {
    records: HashMap<TaskId, TaskRecord>,
    fail_next_update: Option<RecordError>,
    updates: Vec<(TaskId, TaskUpdate)>,
}

/// In-memory task records.
#[derive(Default)]
pub struct MockRecordStore {
    state: Mutex<RecordState>,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: TaskRecord) {
        self.state().records.insert(record.id.clone(), record);
    }

    /// Insert a task with default fields and the given refs.
    pub fn seed(&self, task_id: &TaskId, owner: &OwnerId, refs: &[&str]) -> TaskRecord {
        let record = TaskRecord {
            id: task_id.clone(),
            owner_id: owner.clone(),
            fields: TaskFields::default(),
            ordered_refs: refs.iter().map(|r| AttachmentRef::new(*r)).collect(),
            updated_at: None,
        };
        self.insert(record.clone());
        record
    }

    /// The next `update_task` call fails with `error` and changes nothing.
    pub fn fail_next_update(&self, error: RecordError) {
        self.state().fail_next_update = Some(error);
    }

    pub fn record(&self, task_id: &TaskId) -> Option<TaskRecord> {
        self.state().records.get(task_id).cloned()
    }

    /// Every update attempted, including failed ones.
    pub fn updates(&self) -> Vec<(TaskId, TaskUpdate)> {
        self.state().updates.clone()
    }

    fn state(&self) -> MutexGuard<'_, RecordState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl RecordStore for MockRecordStore {
    async fn get_task(&self, task_id: &TaskId) -> Result<TaskRecord, RecordError> {
        self.record(task_id)
            .ok_or_else(|| RecordError::not_found(task_id))
    }

    async fn update_task(
        &self,
        task_id: &TaskId,
        update: TaskUpdate,
    ) -> Result<TaskRecord, RecordError> {
        let mut state = self.state();
        state.updates.push((task_id.clone(), update.clone()));
        if let Some(error) = state.fail_next_update.take() {
            return Err(error);
        }
        let Some(record) = state.records.get_mut(task_id) else {
            return Err(RecordError::not_found(task_id));
        };
        record.fields = update.fields;
        record.ordered_refs = update.ordered_refs;
        record.updated_at = Some(Utc::now());
        Ok(record.clone())
    }
}
