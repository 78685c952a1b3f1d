use bytes::Bytes;

use crate::AttachmentRef;
use crate::DeleteError;
use crate::OwnerId;
use crate::RecordError;
use crate::TaskId;
use crate::TaskRecord;
use crate::TaskUpdate;
use crate::UploadError;

/// Result of deleting one ref within a batch.
pub type DeleteOutcome = (AttachmentRef, Result<(), DeleteError>);

/// Remote storage for attachment payloads.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `payload` on behalf of `owner` and return the ref that now addresses it.
    async fn upload(
        &self,
        owner: &OwnerId,
        payload: Bytes,
        mime_hint: &str,
    ) -> Result<AttachmentRef, UploadError>;

    /// Externally retrievable locator (typically a URL) for an existing ref.
    fn resolve_public_ref(&self, attachment_ref: &AttachmentRef) -> String;

    /// Delete every ref in `refs`. Each ref gets its own outcome; one failure
    /// never affects the others.
    async fn delete(&self, refs: &[AttachmentRef]) -> Vec<DeleteOutcome>;
}

/// Durable storage for task records.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_task(&self, task_id: &TaskId) -> Result<TaskRecord, RecordError>;

    async fn update_task(
        &self,
        task_id: &TaskId,
        update: TaskUpdate,
    ) -> Result<TaskRecord, RecordError>;
}
