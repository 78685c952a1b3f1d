use std::collections::HashSet;
use std::fmt;

use bytes::Bytes;
use taskboard_attachments_api::AttachmentError;
use taskboard_attachments_api::AttachmentRef;
use taskboard_attachments_api::LocalId;
use taskboard_attachments_api::MAX_ATTACHMENTS;
use tracing::debug;
use tracing::warn;

/// One position in an attachment set.
#[derive(Clone, PartialEq, Eq)]
pub enum AttachmentSlot {
    /// Picked locally, not uploaded yet. Always a new upload at reconciliation.
    Pending {
        local_id: LocalId,
        payload: Bytes,
        mime_hint: String,
    },
    /// Already stored remotely.
    Persisted { attachment_ref: AttachmentRef },
}

impl AttachmentSlot {
    pub fn key(&self) -> SlotKey {
        match self {
            Self::Pending { local_id, .. } => SlotKey::Local(*local_id),
            Self::Persisted { attachment_ref } => SlotKey::Persisted(attachment_ref.clone()),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    pub fn persisted_ref(&self) -> Option<&AttachmentRef> {
        match self {
            Self::Pending { .. } => None,
            Self::Persisted { attachment_ref } => Some(attachment_ref),
        }
    }

    fn matches(&self, key: &SlotKey) -> bool {
        match (self, key) {
            (Self::Pending { local_id, .. }, SlotKey::Local(id)) => local_id == id,
            (Self::Persisted { attachment_ref }, SlotKey::Persisted(r)) => attachment_ref == r,
            (Self::Pending { .. }, SlotKey::Persisted(_))
            | (Self::Persisted { .. }, SlotKey::Local(_)) => false,
        }
    }
}

impl fmt::Debug for AttachmentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending {
                local_id,
                payload,
                mime_hint,
            } => f
                .debug_struct("Pending")
                .field("local_id", local_id)
                .field("payload_len", &payload.len())
                .field("mime_hint", mime_hint)
                .finish(),
            Self::Persisted { attachment_ref } => f
                .debug_struct("Persisted")
                .field("attachment_ref", attachment_ref)
                .finish(),
        }
    }
}

/// Identity of a slot for remove and reorder: the local id of a pending
/// slot, or the ref of a persisted one.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlotKey {
    Local(LocalId),
    Persisted(AttachmentRef),
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(id) => write!(f, "{id}"),
            Self::Persisted(r) => write!(f, "{r}"),
        }
    }
}

/// Ordered attachments of a task being edited. Order is display and storage order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttachmentSet {
    slots: Vec<AttachmentSlot>,
}

impl AttachmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set of persisted slots from a committed ref list. Duplicate
    /// refs keep their first position.
    pub fn from_refs<I>(refs: I) -> Result<Self, AttachmentError>
    where
        I: IntoIterator<Item = AttachmentRef>,
    {
        let mut seen = HashSet::new();
        let mut slots = Vec::new();
        for attachment_ref in refs {
            if !seen.insert(attachment_ref.clone()) {
                warn!("attachments.set.duplicate_ref_dropped ref={attachment_ref}");
                continue;
            }
            slots.push(AttachmentSlot::Persisted { attachment_ref });
        }
        if slots.len() > MAX_ATTACHMENTS {
            return Err(AttachmentError::CapacityExceeded {
                max: MAX_ATTACHMENTS,
            });
        }
        Ok(Self { slots })
    }

    /// Persisted slots from refs already known to be unique and within the cap.
    pub(crate) fn from_reconciled(refs: &[AttachmentRef]) -> Self {
        Self {
            slots: refs
                .iter()
                .cloned()
                .map(|attachment_ref| AttachmentSlot::Persisted { attachment_ref })
                .collect(),
        }
    }

    /// Append a new pending slot. Rejected once the set is full.
    pub fn add(
        &mut self,
        payload: impl Into<Bytes>,
        mime_hint: impl Into<String>,
    ) -> Result<AttachmentSlot, AttachmentError> {
        if self.slots.len() >= MAX_ATTACHMENTS {
            return Err(AttachmentError::CapacityExceeded {
                max: MAX_ATTACHMENTS,
            });
        }
        let slot = AttachmentSlot::Pending {
            local_id: LocalId::new(),
            payload: payload.into(),
            mime_hint: mime_hint.into(),
        };
        debug!("attachments.set.added key={}", slot.key());
        self.slots.push(slot.clone());
        Ok(slot)
    }

    /// Remove the slot named by `key`. Deleting the blob is left to reconciliation.
    pub fn remove(&mut self, key: &SlotKey) -> Option<AttachmentSlot> {
        let idx = self.position(key)?;
        debug!("attachments.set.removed key={key} index={idx}");
        Some(self.slots.remove(idx))
    }

    /// Move the slot named by `key` to `new_index` (clamped), shifting the rest.
    /// Returns false when nothing moved.
    pub fn reorder(&mut self, key: &SlotKey, new_index: usize) -> bool {
        let Some(from) = self.position(key) else {
            return false;
        };
        let to = new_index.min(self.slots.len() - 1);
        if from == to {
            return false;
        }
        let slot = self.slots.remove(from);
        self.slots.insert(to, slot);
        debug!("attachments.set.reordered key={key} from={from} to={to}");
        true
    }

    pub fn snapshot(&self) -> &[AttachmentSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn remaining_capacity(&self) -> usize {
        MAX_ATTACHMENTS.saturating_sub(self.slots.len())
    }

    pub fn position(&self, key: &SlotKey) -> Option<usize> {
        self.slots.iter().position(|slot| slot.matches(key))
    }

    pub fn keys(&self) -> Vec<SlotKey> {
        self.slots.iter().map(AttachmentSlot::key).collect()
    }

    pub fn persisted_refs(&self) -> impl Iterator<Item = &AttachmentRef> {
        self.slots.iter().filter_map(AttachmentSlot::persisted_ref)
    }

    pub fn pending_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_pending()).count()
    }
}
