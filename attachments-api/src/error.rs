use crate::TaskId;

/// Rejections raised by local attachment-set mutations. These never touch the network.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum AttachmentError {
    #[error("attachment limit reached: at most {max} attachments per task")]
    CapacityExceeded { max: usize },
}

/// Per-attachment upload failure. Non-fatal to a save.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("upload failed: {message}")]
pub struct UploadError {
    pub message: String,
}

impl UploadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Per-ref delete failure. Non-fatal to a save; the blob is left orphaned.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("delete failed: {message}")]
pub struct DeleteError {
    pub message: String,
}

impl DeleteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure reading or writing the task record. Fatal to a reconciliation.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("task {task_id} not found")]
    NotFound { task_id: TaskId },
    #[error("record store returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("record store unreachable: {0}")]
    Transport(String),
    #[error("could not decode task record: {0}")]
    Decode(String),
    /// The store refused the write for a reason of its own (validation, policy).
    #[error("record update rejected: {0}")]
    Rejected(String),
}

impl RecordError {
    pub fn not_found(task_id: &TaskId) -> Self {
        Self::NotFound {
            task_id: task_id.clone(),
        }
    }
}
