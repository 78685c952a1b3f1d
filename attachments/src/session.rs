use taskboard_attachments_api::AttachmentError;
use taskboard_attachments_api::TaskFields;
use taskboard_attachments_api::TaskId;
use taskboard_attachments_api::TaskRecord;
use tracing::debug;

use crate::AttachmentSet;
use crate::ReconcileError;
use crate::ReconcileOutcome;
use crate::ReconcilePlan;
use crate::Reconciler;

/// One open edit of a task. Holds the attachments as they were when the
/// session opened next to the working copy the user mutates.
#[derive(Clone, Debug)]
pub struct EditSession {
    task_id: TaskId,
    initial: AttachmentSet,
    working: AttachmentSet,
    fields: TaskFields,
}

impl EditSession {
    /// Open a session over the committed state of `record`.
    pub fn open(record: &TaskRecord) -> Result<Self, AttachmentError> {
        let initial = AttachmentSet::from_refs(record.ordered_refs.iter().cloned())?;
        debug!(
            "attachments.session.open task={} refs={}",
            record.id,
            initial.len()
        );
        Ok(Self {
            task_id: record.id.clone(),
            working: initial.clone(),
            initial,
            fields: record.fields.clone(),
        })
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn initial(&self) -> &AttachmentSet {
        &self.initial
    }

    pub fn attachments(&self) -> &AttachmentSet {
        &self.working
    }

    pub fn attachments_mut(&mut self) -> &mut AttachmentSet {
        &mut self.working
    }

    pub fn fields(&self) -> &TaskFields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut TaskFields {
        &mut self.fields
    }

    /// True when the attachment list differs from the committed one, in
    /// content or order.
    pub fn is_dirty(&self) -> bool {
        self.initial != self.working
    }

    pub fn plan(&self) -> ReconcilePlan {
        ReconcilePlan::compute(&self.initial, &self.working)
    }

    /// Drop the session. Nothing was sent anywhere, so nothing is undone.
    pub fn cancel(self) {
        debug!(
            "attachments.session.cancel task={} pending={}",
            self.task_id,
            self.working.pending_count()
        );
    }

    pub async fn commit(self, reconciler: &Reconciler) -> Result<ReconcileOutcome, ReconcileError> {
        reconciler
            .reconcile(&self.task_id, &self.initial, &self.working, &self.fields)
            .await
    }
}
