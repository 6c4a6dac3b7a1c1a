use time::OffsetDateTime;
use uuid::Uuid;

/// The pair written into `deleted_at` / `deletion_seq` by one soft deletion.
///
/// `seq` comes from a single strictly increasing sequence shared by users and
/// posts, so two deletions are always ordered even when their timestamps are
/// equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionMarker {
    pub at: OffsetDateTime,
    pub seq: i64,
}

impl DeletionMarker {
    pub fn from_columns(at: Option<OffsetDateTime>, seq: Option<i64>) -> Option<Self> {
        match (at, seq) {
            (Some(at), Some(seq)) => Some(Self { at, seq }),
            _ => None,
        }
    }

    /// A post marker at or after its owner's marker was written by the owner's
    /// deletion (or later), so restoring the owner restores the post.
    pub fn restored_with(&self, owner: &DeletionMarker) -> bool {
        self.seq >= owner.seq
    }
}

#[derive(Debug, Clone)]
pub struct CascadeOutcome {
    pub user_id: Uuid,
    pub marker: DeletionMarker,
    pub posts_affected: u64,
}

#[derive(Debug, Clone)]
pub enum CascadeResult {
    Applied(CascadeOutcome),
    NotFound,
    /// Deleting a trashed user or restoring a live one.
    Unchanged,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(seq: i64) -> DeletionMarker {
        DeletionMarker {
            at: OffsetDateTime::UNIX_EPOCH,
            seq,
        }
    }

    #[test]
    fn same_marker_is_restored() {
        assert!(marker(7).restored_with(&marker(7)));
    }

    #[test]
    fn earlier_deletion_is_kept() {
        assert!(!marker(6).restored_with(&marker(7)));
    }

    #[test]
    fn later_deletion_is_restored() {
        assert!(marker(8).restored_with(&marker(7)));
    }

    #[test]
    fn equal_timestamps_are_ordered_by_sequence() {
        let owner = marker(10);
        let manual = DeletionMarker {
            at: owner.at,
            seq: 9,
        };
        assert!(!manual.restored_with(&owner));
    }

    #[test]
    fn partial_columns_are_not_a_marker() {
        assert!(DeletionMarker::from_columns(Some(OffsetDateTime::UNIX_EPOCH), None).is_none());
        assert!(DeletionMarker::from_columns(None, Some(1)).is_none());
    }
}
