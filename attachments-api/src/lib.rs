#![deny(clippy::unwrap_used, clippy::expect_used)]

mod error;
mod store;
mod types;

pub use error::AttachmentError;
pub use error::DeleteError;
pub use error::RecordError;
pub use error::UploadError;
pub use store::BlobStore;
pub use store::DeleteOutcome;
pub use store::RecordStore;
pub use types::AttachmentRef;
pub use types::LocalId;
pub use types::MAX_ATTACHMENTS;
pub use types::OwnerId;
pub use types::Priority;
pub use types::TaskFields;
pub use types::TaskId;
pub use types::TaskRecord;
pub use types::TaskUpdate;
