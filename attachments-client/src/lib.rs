#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod media;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "online")]
mod http;

#[cfg(feature = "mock")]
pub use mock::MockBlobStore;
#[cfg(feature = "mock")]
pub use mock::MockRecordStore;
#[cfg(feature = "mock")]
pub use mock::StoredBlob;

#[cfg(feature = "online")]
pub use http::HttpBlobStore;
#[cfg(feature = "online")]
pub use http::HttpConfig;
#[cfg(feature = "online")]
pub use http::HttpRecordStore;

pub use taskboard_attachments_api::BlobStore;
pub use taskboard_attachments_api::RecordStore;
