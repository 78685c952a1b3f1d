#![deny(clippy::unwrap_used, clippy::expect_used)]

//! Attachment lifecycle for a task edit session: stage local files, reorder
//! and remove slots, then reconcile the result against the blob and record
//! stores on save.

mod reconcile;
mod reorder;
mod session;
mod set;

pub use reconcile::ReconcileError;
pub use reconcile::ReconcileOutcome;
pub use reconcile::ReconcilePlan;
pub use reconcile::ReconcileWarning;
pub use reconcile::Reconciler;
pub use reorder::DragReorderController;
pub use reorder::Point;
pub use reorder::SlotRect;
pub use session::EditSession;
pub use set::AttachmentSet;
pub use set::AttachmentSlot;
pub use set::SlotKey;

pub use taskboard_attachments_api::AttachmentError;
pub use taskboard_attachments_api::AttachmentRef;
pub use taskboard_attachments_api::LocalId;
pub use taskboard_attachments_api::MAX_ATTACHMENTS;
