use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::join_all;
use taskboard_attachments_api::AttachmentRef;
use taskboard_attachments_api::BlobStore;
use taskboard_attachments_api::DeleteError;
use taskboard_attachments_api::LocalId;
use taskboard_attachments_api::OwnerId;
use taskboard_attachments_api::RecordError;
use taskboard_attachments_api::RecordStore;
use taskboard_attachments_api::TaskFields;
use taskboard_attachments_api::TaskId;
use taskboard_attachments_api::TaskRecord;
use taskboard_attachments_api::TaskUpdate;
use taskboard_attachments_api::UploadError;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::AttachmentSet;
use crate::AttachmentSlot;

/// Blob operations implied by going from one attachment set to another.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Refs persisted at session start that no longer appear, in their original order.
    pub to_delete: Vec<AttachmentRef>,
    /// Pending slots of the final set, in final order.
    pub to_upload: Vec<LocalId>,
}

impl ReconcilePlan {
    pub fn compute(initial: &AttachmentSet, final_set: &AttachmentSet) -> Self {
        let kept: HashSet<&AttachmentRef> = final_set.persisted_refs().collect();
        let to_delete = initial
            .persisted_refs()
            .filter(|r| !kept.contains(r))
            .cloned()
            .collect();
        let to_upload = final_set
            .snapshot()
            .iter()
            .filter_map(|slot| match slot {
                AttachmentSlot::Pending { local_id, .. } => Some(*local_id),
                AttachmentSlot::Persisted { .. } => None,
            })
            .collect();
        Self {
            to_delete,
            to_upload,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.to_delete.is_empty() && self.to_upload.is_empty()
    }
}

/// A per-item blob failure that did not block the save.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileWarning {
    /// The attachment was dropped from the saved order.
    #[error("attachment {local_id} was not saved: {error}")]
    Upload { local_id: LocalId, error: UploadError },
    /// The blob stays in storage unreferenced.
    #[error("attachment {attachment_ref} could not be deleted: {error}")]
    Delete {
        attachment_ref: AttachmentRef,
        error: DeleteError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// The task record was not written. Blob operations already issued are
    /// not rolled back; `orphaned_refs` were uploaded during this attempt and
    /// are referenced by nothing.
    #[error("failed to save task: {error}")]
    Record {
        #[source]
        error: RecordError,
        orphaned_refs: Vec<AttachmentRef>,
        warnings: Vec<ReconcileWarning>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub ordered_refs: Vec<AttachmentRef>,
    pub record: TaskRecord,
    pub warnings: Vec<ReconcileWarning>,
}

impl ReconcileOutcome {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// The saved attachments as a fully persisted set, ready for further editing.
    pub fn into_attachment_set(self) -> AttachmentSet {
        AttachmentSet::from_reconciled(&self.ordered_refs)
    }
}

/// Applies an edited attachment set to the blob and record stores.
#[derive(Clone)]
pub struct Reconciler {
    blob_store: Arc<dyn BlobStore>,
    record_store: Arc<dyn RecordStore>,
    owner: OwnerId,
}

impl Reconciler {
    pub fn new(
        blob_store: Arc<dyn BlobStore>,
        record_store: Arc<dyn RecordStore>,
        owner: OwnerId,
    ) -> Self {
        Self {
            blob_store,
            record_store,
            owner,
        }
    }

    pub fn blob_store(&self) -> &Arc<dyn BlobStore> {
        &self.blob_store
    }

    pub fn record_store(&self) -> &Arc<dyn RecordStore> {
        &self.record_store
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Delete refs dropped since `initial`, upload the pending slots of
    /// `final_set`, and write the resulting order with `fields` in one record
    /// update. Per-item blob failures come back as warnings; only a failed
    /// record write is an error.
    pub async fn reconcile(
        &self,
        task_id: &TaskId,
        initial: &AttachmentSet,
        final_set: &AttachmentSet,
        fields: &TaskFields,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let plan = ReconcilePlan::compute(initial, final_set);
        debug!(
            "attachments.reconcile.plan task={task_id} delete={} upload={}",
            plan.to_delete.len(),
            plan.to_upload.len()
        );

        let uploads = join_all(final_set.snapshot().iter().filter_map(|slot| match slot {
            AttachmentSlot::Pending {
                local_id,
                payload,
                mime_hint,
            } => Some(self.upload_one(*local_id, payload.clone(), mime_hint)),
            AttachmentSlot::Persisted { .. } => None,
        }));
        let (upload_results, delete_failures) =
            tokio::join!(uploads, self.delete_batch(&plan.to_delete));

        let deleted = plan.to_delete.len() - delete_failures.len();
        let mut warnings: Vec<ReconcileWarning> = delete_failures
            .into_iter()
            .map(|(attachment_ref, error)| ReconcileWarning::Delete {
                attachment_ref,
                error,
            })
            .collect();

        let mut uploaded: HashMap<LocalId, AttachmentRef> = HashMap::new();
        for (local_id, result) in upload_results {
            match result {
                Ok(attachment_ref) => {
                    uploaded.insert(local_id, attachment_ref);
                }
                Err(error) => {
                    warn!("attachments.reconcile.upload_failed local_id={local_id} error={error}");
                    warnings.push(ReconcileWarning::Upload { local_id, error });
                }
            }
        }

        let ordered_refs = ordered_refs(final_set, &uploaded);
        let update = TaskUpdate {
            fields: fields.clone(),
            ordered_refs: ordered_refs.clone(),
        };
        let record = match self.record_store.update_task(task_id, update).await {
            Ok(record) => record,
            Err(error) => {
                let orphaned_refs: Vec<AttachmentRef> = plan
                    .to_upload
                    .iter()
                    .filter_map(|id| uploaded.get(id).cloned())
                    .collect();
                warn!(
                    "attachments.reconcile.record_failed task={task_id} orphaned={} error={error}",
                    orphaned_refs.len()
                );
                return Err(ReconcileError::Record {
                    error,
                    orphaned_refs,
                    warnings,
                });
            }
        };

        info!(
            "attachments.reconcile.saved task={task_id} refs={} uploaded={} deleted={deleted} warnings={}",
            ordered_refs.len(),
            uploaded.len(),
            warnings.len()
        );
        Ok(ReconcileOutcome {
            ordered_refs,
            record,
            warnings,
        })
    }

    /// Best-effort delete of blobs left behind by a failed record write.
    /// Returns the refs that still could not be deleted.
    pub async fn cleanup_orphans(
        &self,
        refs: &[AttachmentRef],
    ) -> Vec<(AttachmentRef, DeleteError)> {
        let failures = self.delete_batch(refs).await;
        info!(
            "attachments.reconcile.cleanup requested={} failed={}",
            refs.len(),
            failures.len()
        );
        failures
    }

    async fn upload_one(
        &self,
        local_id: LocalId,
        payload: Bytes,
        mime_hint: &str,
    ) -> (LocalId, Result<AttachmentRef, UploadError>) {
        let result = self.blob_store.upload(&self.owner, payload, mime_hint).await;
        if let Ok(attachment_ref) = &result {
            debug!("attachments.reconcile.uploaded local_id={local_id} ref={attachment_ref}");
        }
        (local_id, result)
    }

    /// Issue one delete batch and return the failures, in request order. A
    /// ref the store did not report on counts as failed.
    async fn delete_batch(&self, refs: &[AttachmentRef]) -> Vec<(AttachmentRef, DeleteError)> {
        if refs.is_empty() {
            return Vec::new();
        }
        let mut outcomes: HashMap<AttachmentRef, Result<(), DeleteError>> =
            self.blob_store.delete(refs).await.into_iter().collect();
        let mut failures = Vec::new();
        for attachment_ref in refs {
            let outcome = outcomes
                .remove(attachment_ref)
                .unwrap_or_else(|| Err(DeleteError::new("no outcome reported by blob store")));
            match outcome {
                Ok(()) => debug!("attachments.reconcile.deleted ref={attachment_ref}"),
                Err(error) => {
                    warn!("attachments.reconcile.delete_failed ref={attachment_ref} error={error}");
                    failures.push((attachment_ref.clone(), error));
                }
            }
        }
        failures
    }
}

/// Walk `final_set` in order: persisted refs stay, uploaded pending slots are
/// replaced by their new ref, failed ones are dropped. A ref is never emitted twice.
fn ordered_refs(
    final_set: &AttachmentSet,
    uploaded: &HashMap<LocalId, AttachmentRef>,
) -> Vec<AttachmentRef> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(final_set.len());
    for slot in final_set.snapshot() {
        let attachment_ref = match slot {
            AttachmentSlot::Persisted { attachment_ref } => attachment_ref,
            AttachmentSlot::Pending { local_id, .. } => match uploaded.get(local_id) {
                Some(attachment_ref) => attachment_ref,
                None => continue,
            },
        };
        if seen.insert(attachment_ref.clone()) {
            out.push(attachment_ref.clone());
        } else {
            warn!("attachments.reconcile.duplicate_ref_skipped ref={attachment_ref}");
        }
    }
    out
}
