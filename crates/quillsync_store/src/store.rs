//! The in-memory entity store.

use crate::error::{StoreError, StoreResult};
use crate::tables::{merge_file, FileRow, FolderRow, NoteRow, TagRow};
use crate::watermark::WatermarkClock;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use quillsync_protocol::{FileMeta, Folder, Note, SyncBatch, Tag};
use std::collections::HashMap;

/// Hard ceiling on entity identifier length.
const MAX_ID_LEN: usize = 255;

/// Outcome of a single upsert within a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The record was staged for commit.
    Applied,
    /// The identifier exists under a different owner; the write was
    /// dropped without error and without touching the stored row.
    OwnershipRejected,
}

#[derive(Default)]
struct Inner {
    notes: HashMap<String, NoteRow>,
    folders: HashMap<String, FolderRow>,
    files: HashMap<String, FileRow>,
    tags: HashMap<String, TagRow>,
}

/// The entity store: four typed collections behind one lock, with a
/// watermark clock that stamps every write.
pub struct MemoryStore {
    inner: RwLock<Inner>,
    clock: WatermarkClock,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            clock: WatermarkClock::new(),
        }
    }

    /// Applies a batch of writes atomically.
    ///
    /// The closure stages writes against a read view of the store; the
    /// staged rows are committed only if it returns `Ok`. The write lock
    /// is held for the whole scope, so watermark order equals commit
    /// order and readers see either all of the batch or none of it.
    ///
    /// Returns the watermark stamped on every row the batch touched.
    pub fn apply<F>(&self, f: F) -> StoreResult<DateTime<Utc>>
    where
        F: FnOnce(&mut Transaction<'_>) -> StoreResult<()>,
    {
        let mut guard = self.inner.write();
        let watermark = self.clock.next();
        let staged = {
            let mut txn = Transaction {
                inner: &*guard,
                staged: Staged::default(),
                watermark,
            };
            f(&mut txn)?;
            txn.staged
        };
        guard.notes.extend(staged.notes);
        guard.folders.extend(staged.folders);
        guard.files.extend(staged.files);
        guard.tags.extend(staged.tags);
        Ok(watermark)
    }

    /// Returns every record owned by `owner` with a watermark strictly
    /// greater than `cursor`, per kind, capped at `limit` records per kind
    /// (0 = unbounded).
    ///
    /// All four sequences are always present in the result, possibly
    /// empty. Each kind is ordered by watermark, oldest first, so a capped
    /// pull is resumable: re-pulling from the highest returned watermark
    /// picks up exactly the rows the cap cut off. Each returned record
    /// carries its watermark in `serverUpdatedAt`.
    pub fn changed_since(
        &self,
        owner: &str,
        cursor: DateTime<Utc>,
        limit: usize,
    ) -> SyncBatch {
        fn collect<R>(
            rows: impl Iterator<Item = (DateTime<Utc>, R)>,
            limit: usize,
            stamp: impl Fn(&mut R, DateTime<Utc>),
        ) -> Vec<R> {
            let mut changed: Vec<(DateTime<Utc>, R)> = rows.collect();
            changed.sort_by_key(|(watermark, _)| *watermark);
            if limit > 0 {
                changed.truncate(limit);
            }
            changed
                .into_iter()
                .map(|(watermark, mut record)| {
                    stamp(&mut record, watermark);
                    record
                })
                .collect()
        }

        let inner = self.inner.read();
        SyncBatch {
            notes: collect(
                inner
                    .notes
                    .values()
                    .filter(|row| row.owner == owner && row.watermark() > cursor)
                    .map(|row| (row.watermark(), row.record.clone())),
                limit,
                |record, watermark| record.server_updated_at = Some(watermark),
            ),
            folders: collect(
                inner
                    .folders
                    .values()
                    .filter(|row| row.owner == owner && row.watermark() > cursor)
                    .map(|row| (row.watermark(), row.record.clone())),
                limit,
                |record, watermark| record.server_updated_at = Some(watermark),
            ),
            files: collect(
                inner
                    .files
                    .values()
                    .filter(|row| row.owner == owner && row.watermark() > cursor)
                    .map(|row| (row.watermark(), row.record.clone())),
                limit,
                |record, watermark| record.server_updated_at = Some(watermark),
            ),
            tags: collect(
                inner
                    .tags
                    .values()
                    .filter(|row| row.owner == owner && row.watermark() > cursor)
                    .map(|row| (row.watermark(), row.record.clone())),
                limit,
                |record, watermark| record.server_updated_at = Some(watermark),
            ),
        }
    }

    /// Storage used by a user: the summed sizes of files whose upload has
    /// been confirmed. Unconfirmed records do not count against quota.
    pub fn storage_used(&self, owner: &str) -> i64 {
        self.inner
            .read()
            .files
            .values()
            .filter(|row| row.owner == owner && row.record.is_uploaded)
            .map(|row| row.record.size)
            .sum()
    }

    /// Records a confirmed blob upload.
    ///
    /// Upserts the file row with the stat'ed size, the blob key, and the
    /// uploaded flag set. This is the authoritative confirmation path, so
    /// unlike the push merge it overwrites the blob key unconditionally.
    /// A row held by a different owner is left untouched, mirroring the
    /// push-side ownership rule.
    pub fn commit_file_record(
        &self,
        owner: &str,
        id: &str,
        blob_key: &str,
        size: i64,
    ) -> StoreResult<()> {
        check_id(id)?;
        let mut guard = self.inner.write();
        let watermark = self.clock.next();
        match guard.files.get_mut(id) {
            Some(row) if row.owner != owner => {
                tracing::debug!(id, "cross-owner upload commit dropped");
            }
            Some(row) => {
                row.record.blob_key = Some(blob_key.to_string());
                row.record.size = size;
                row.record.is_uploaded = true;
                row.record.updated_at = Some(watermark);
                row.server_updated_at = Some(watermark);
            }
            None => {
                let record = FileMeta {
                    blob_key: Some(blob_key.to_string()),
                    size,
                    is_uploaded: true,
                    created_at: Some(watermark),
                    updated_at: Some(watermark),
                    ..FileMeta::new(id)
                };
                guard.files.insert(
                    id.to_string(),
                    FileRow {
                        owner: owner.to_string(),
                        record,
                        server_updated_at: Some(watermark),
                    },
                );
            }
        }
        Ok(())
    }

    /// Permanently removes a note row.
    ///
    /// Owner-scoped; removing an absent or foreign row is a no-op. This
    /// is the only path that actually deletes a note (the sync path only
    /// flips the soft-delete flag).
    pub fn delete_note(&self, owner: &str, id: &str) {
        let mut guard = self.inner.write();
        if guard.notes.get(id).is_some_and(|row| row.owner == owner) {
            guard.notes.remove(id);
        }
    }

    /// Blob keys of every file attached to a note, for external cleanup.
    pub fn note_file_keys(&self, owner: &str, note_id: &str) -> Vec<String> {
        self.inner
            .read()
            .files
            .values()
            .filter(|row| row.owner == owner && row.record.note_id.as_deref() == Some(note_id))
            .filter_map(|row| row.record.blob_key.clone())
            .collect()
    }

    /// Looks up a single note by owner and id.
    pub fn note(&self, owner: &str, id: &str) -> Option<Note> {
        self.inner
            .read()
            .notes
            .get(id)
            .filter(|row| row.owner == owner)
            .map(|row| row.record.clone())
    }

    /// Looks up a single file record by owner and id.
    pub fn file(&self, owner: &str, id: &str) -> Option<FileMeta> {
        self.inner
            .read()
            .files
            .get(id)
            .filter(|row| row.owner == owner)
            .map(|row| row.record.clone())
    }

    #[cfg(test)]
    fn insert_raw_note(&self, row: NoteRow) {
        self.inner.write().notes.insert(row.record.id.clone(), row);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct Staged {
    notes: HashMap<String, NoteRow>,
    folders: HashMap<String, FolderRow>,
    files: HashMap<String, FileRow>,
    tags: HashMap<String, TagRow>,
}

/// A staged write batch against a read view of the store.
///
/// Lookups see earlier staged writes from the same batch first, so a
/// batch that touches one identifier twice merges against its own
/// intermediate state.
pub struct Transaction<'a> {
    inner: &'a Inner,
    staged: Staged,
    watermark: DateTime<Utc>,
}

impl Transaction<'_> {
    /// The watermark every row in this batch will be stamped with.
    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark
    }

    /// Upserts a note: whole-row last-write-wins.
    pub fn upsert_note(&mut self, owner: &str, record: Note) -> StoreResult<UpsertOutcome> {
        check_id(&record.id)?;
        let existing = self
            .staged
            .notes
            .get(&record.id)
            .or_else(|| self.inner.notes.get(&record.id));
        if rejected(existing.map(|row| row.owner.as_str()), owner, &record.id, "note") {
            return Ok(UpsertOutcome::OwnershipRejected);
        }
        let mut record = record;
        record.server_updated_at = None;
        let size = record.content.len() as i64;
        self.staged.notes.insert(
            record.id.clone(),
            NoteRow {
                owner: owner.to_string(),
                record,
                size,
                server_updated_at: Some(self.watermark),
            },
        );
        Ok(UpsertOutcome::Applied)
    }

    /// Upserts a folder: whole-row last-write-wins.
    pub fn upsert_folder(&mut self, owner: &str, record: Folder) -> StoreResult<UpsertOutcome> {
        check_id(&record.id)?;
        let existing = self
            .staged
            .folders
            .get(&record.id)
            .or_else(|| self.inner.folders.get(&record.id));
        if rejected(existing.map(|row| row.owner.as_str()), owner, &record.id, "folder") {
            return Ok(UpsertOutcome::OwnershipRejected);
        }
        let mut record = record;
        record.server_updated_at = None;
        self.staged.folders.insert(
            record.id.clone(),
            FolderRow {
                owner: owner.to_string(),
                record,
                server_updated_at: Some(self.watermark),
            },
        );
        Ok(UpsertOutcome::Applied)
    }

    /// Upserts a file record with the field-conservative merge.
    pub fn upsert_file(&mut self, owner: &str, record: FileMeta) -> StoreResult<UpsertOutcome> {
        check_id(&record.id)?;
        let existing = self
            .staged
            .files
            .get(&record.id)
            .or_else(|| self.inner.files.get(&record.id));
        if rejected(existing.map(|row| row.owner.as_str()), owner, &record.id, "file") {
            return Ok(UpsertOutcome::OwnershipRejected);
        }
        let merged = match existing {
            Some(row) => merge_file(&row.record, record),
            None => {
                let mut record = record;
                record.server_updated_at = None;
                record
            }
        };
        self.staged.files.insert(
            merged.id.clone(),
            FileRow {
                owner: owner.to_string(),
                record: merged,
                server_updated_at: Some(self.watermark),
            },
        );
        Ok(UpsertOutcome::Applied)
    }

    /// Upserts a tag: whole-row last-write-wins.
    pub fn upsert_tag(&mut self, owner: &str, record: Tag) -> StoreResult<UpsertOutcome> {
        check_id(&record.id)?;
        let existing = self
            .staged
            .tags
            .get(&record.id)
            .or_else(|| self.inner.tags.get(&record.id));
        if rejected(existing.map(|row| row.owner.as_str()), owner, &record.id, "tag") {
            return Ok(UpsertOutcome::OwnershipRejected);
        }
        let mut record = record;
        record.server_updated_at = None;
        self.staged.tags.insert(
            record.id.clone(),
            TagRow {
                owner: owner.to_string(),
                record,
                server_updated_at: Some(self.watermark),
            },
        );
        Ok(UpsertOutcome::Applied)
    }
}

fn check_id(id: &str) -> StoreResult<()> {
    if id.is_empty() {
        return Err(StoreError::constraint("empty entity id"));
    }
    if id.len() > MAX_ID_LEN {
        return Err(StoreError::constraint(format!(
            "entity id exceeds {MAX_ID_LEN} bytes"
        )));
    }
    Ok(())
}

fn rejected(existing_owner: Option<&str>, owner: &str, id: &str, kind: &str) -> bool {
    match existing_owner {
        Some(current) if current != owner => {
            tracing::debug!(id, kind, "cross-owner write dropped");
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn note(id: &str, title: &str, content: &str) -> Note {
        Note {
            title: title.into(),
            content: content.into(),
            ..Note::new(id)
        }
    }

    fn push_notes(store: &MemoryStore, owner: &str, notes: Vec<Note>) -> DateTime<Utc> {
        store
            .apply(|txn| {
                for n in notes {
                    txn.upsert_note(owner, n)?;
                }
                Ok(())
            })
            .unwrap()
    }

    #[test]
    fn upsert_then_pull() {
        let store = MemoryStore::new();
        push_notes(&store, "u1", vec![note("n1", "A", "hello")]);

        let batch = store.changed_since("u1", DateTime::<Utc>::UNIX_EPOCH, 0);
        assert_eq!(batch.notes.len(), 1);
        assert_eq!(batch.notes[0].title, "A");
        assert!(batch.notes[0].server_updated_at.is_some());
        assert!(batch.folders.is_empty());
    }

    #[test]
    fn last_write_wins_replaces_whole_row() {
        let store = MemoryStore::new();
        let w1 = push_notes(&store, "u1", vec![note("n1", "A", "hello")]);
        push_notes(&store, "u1", vec![note("n1", "B", "world")]);

        // Pull from the first watermark sees only the second write.
        let batch = store.changed_since("u1", w1, 0);
        assert_eq!(batch.notes.len(), 1);
        assert_eq!(batch.notes[0].title, "B");

        // Pull from the epoch still sees exactly one row for the id.
        let batch = store.changed_since("u1", DateTime::<Utc>::UNIX_EPOCH, 0);
        assert_eq!(batch.notes.len(), 1);
    }

    #[test]
    fn idempotent_reapply() {
        let store = MemoryStore::new();
        let n = note("n1", "A", "hello");
        push_notes(&store, "u1", vec![n.clone()]);
        let before = store.note("u1", "n1").unwrap();
        push_notes(&store, "u1", vec![n]);
        let after = store.note("u1", "n1").unwrap();
        assert_eq!(before, after);
        assert_eq!(
            store.changed_since("u1", DateTime::<Utc>::UNIX_EPOCH, 0).notes.len(),
            1
        );
    }

    #[test]
    fn ownership_isolation() {
        let store = MemoryStore::new();
        push_notes(&store, "u2", vec![note("shared", "theirs", "data")]);

        // u1 reuses the identifier; the write is dropped, not errored.
        let result = store.apply(|txn| {
            let outcome = txn.upsert_note("u1", note("shared", "mine", "stolen"))?;
            assert_eq!(outcome, UpsertOutcome::OwnershipRejected);
            txn.upsert_note("u1", note("own", "ok", ""))?;
            Ok(())
        });
        assert!(result.is_ok());

        assert_eq!(store.note("u2", "shared").unwrap().title, "theirs");
        assert!(store.note("u1", "shared").is_none());
        assert!(store.note("u1", "own").is_some());
    }

    #[test]
    fn constraint_failure_rolls_back_whole_batch() {
        let store = MemoryStore::new();
        let long_id = "x".repeat(300);
        let result = store.apply(|txn| {
            txn.upsert_note("u1", note("good", "A", ""))?;
            txn.upsert_note("u1", note(&long_id, "B", ""))?;
            Ok(())
        });
        assert!(matches!(result, Err(StoreError::Constraint(_))));
        assert!(store.note("u1", "good").is_none());
    }

    #[test]
    fn per_kind_limit() {
        let store = MemoryStore::new();
        store
            .apply(|txn| {
                for i in 0..10 {
                    txn.upsert_note("u1", note(&format!("n{i}"), "t", ""))?;
                    txn.upsert_tag("u1", Tag::new(format!("t{i}")))?;
                }
                Ok(())
            })
            .unwrap();

        let batch = store.changed_since("u1", DateTime::<Utc>::UNIX_EPOCH, 3);
        assert_eq!(batch.notes.len(), 3);
        assert_eq!(batch.tags.len(), 3);
    }

    #[test]
    fn capped_pull_is_resumable_from_last_watermark() {
        let store = MemoryStore::new();
        for i in 0..6 {
            push_notes(&store, "u1", vec![note(&format!("n{i}"), "t", "")]);
        }

        let first = store.changed_since("u1", DateTime::<Utc>::UNIX_EPOCH, 4);
        assert_eq!(first.notes.len(), 4);
        let ids: Vec<&str> = first.notes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["n0", "n1", "n2", "n3"]);

        let resume = first.notes[3].server_updated_at.unwrap();
        let rest = store.changed_since("u1", resume, 4);
        let ids: Vec<&str> = rest.notes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["n4", "n5"]);
    }

    #[test]
    fn client_watermark_is_never_authoritative() {
        let store = MemoryStore::new();
        let mut n = note("n1", "A", "");
        n.server_updated_at = Some(Utc::now() + chrono::Duration::days(365));
        let w = push_notes(&store, "u1", vec![n]);

        let batch = store.changed_since("u1", DateTime::<Utc>::UNIX_EPOCH, 0);
        assert_eq!(batch.notes[0].server_updated_at, Some(w));
    }

    #[test]
    fn missing_watermark_falls_back_to_update_time() {
        let store = MemoryStore::new();
        let updated = Utc::now();
        store.insert_raw_note(NoteRow {
            owner: "u1".into(),
            record: Note {
                updated_at: Some(updated),
                ..note("legacy", "old", "")
            },
            size: 0,
            server_updated_at: None,
        });

        let batch = store.changed_since("u1", DateTime::<Utc>::UNIX_EPOCH, 0);
        assert_eq!(batch.notes.len(), 1);
        assert_eq!(batch.notes[0].server_updated_at, Some(updated));
        assert!(store
            .changed_since("u1", updated, 0)
            .notes
            .is_empty());
    }

    #[test]
    fn soft_deleted_note_occupies_its_id() {
        let store = MemoryStore::new();
        let mut n = note("n1", "A", "hello");
        n.is_deleted = true;
        push_notes(&store, "u1", vec![n.clone()]);

        // Re-pushing with the flag still set does not resurrect.
        push_notes(&store, "u1", vec![n]);
        assert!(store.note("u1", "n1").unwrap().is_deleted);

        // Only an explicit un-set brings it back.
        push_notes(&store, "u1", vec![note("n1", "A", "hello")]);
        assert!(!store.note("u1", "n1").unwrap().is_deleted);
    }

    #[test]
    fn duplicate_id_in_one_batch_merges_against_staged_state() {
        let store = MemoryStore::new();
        store
            .apply(|txn| {
                let mut first = FileMeta::new("f1");
                first.name = "report.pdf".into();
                first.is_uploaded = true;
                txn.upsert_file("u1", first)?;
                // Second record for the same id in the same batch.
                txn.upsert_file("u1", FileMeta::new("f1"))?;
                Ok(())
            })
            .unwrap();
        let merged = store.file("u1", "f1").unwrap();
        assert_eq!(merged.name, "report.pdf");
        assert!(merged.is_uploaded);
    }

    #[test]
    fn storage_counts_only_uploaded_files() {
        let store = MemoryStore::new();
        store
            .apply(|txn| {
                let mut confirmed = FileMeta::new("f1");
                confirmed.size = 100;
                confirmed.is_uploaded = true;
                txn.upsert_file("u1", confirmed)?;
                let mut pending = FileMeta::new("f2");
                pending.size = 50;
                txn.upsert_file("u1", pending)?;
                Ok(())
            })
            .unwrap();
        assert_eq!(store.storage_used("u1"), 100);
        assert_eq!(store.storage_used("u2"), 0);
    }

    #[test]
    fn commit_file_record_confirms_upload() {
        let store = MemoryStore::new();
        store
            .apply(|txn| {
                let mut pending = FileMeta::new("f1");
                pending.size = 50;
                txn.upsert_file("u1", pending)?;
                Ok(())
            })
            .unwrap();

        store.commit_file_record("u1", "f1", "u1/f1", 64).unwrap();
        let record = store.file("u1", "f1").unwrap();
        assert!(record.is_uploaded);
        assert_eq!(record.size, 64);
        assert_eq!(record.blob_key.as_deref(), Some("u1/f1"));
        assert_eq!(store.storage_used("u1"), 64);

        // Commit for an id held by someone else changes nothing.
        store.commit_file_record("u2", "f1", "u2/f1", 999).unwrap();
        assert_eq!(store.file("u1", "f1").unwrap().size, 64);
    }

    #[test]
    fn delete_note_is_owner_scoped() {
        let store = MemoryStore::new();
        push_notes(&store, "u1", vec![note("n1", "A", "")]);

        store.delete_note("u2", "n1");
        assert!(store.note("u1", "n1").is_some());

        store.delete_note("u1", "n1");
        assert!(store.note("u1", "n1").is_none());
        // Idempotent.
        store.delete_note("u1", "n1");
    }

    #[test]
    fn note_file_keys_collects_attachments() {
        let store = MemoryStore::new();
        store
            .apply(|txn| {
                for (id, key) in [("f1", Some("u1/f1")), ("f2", None), ("f3", Some("u1/f3"))] {
                    let mut f = FileMeta::new(id);
                    f.note_id = Some("n1".into());
                    f.blob_key = key.map(String::from);
                    txn.upsert_file("u1", f)?;
                }
                Ok(())
            })
            .unwrap();
        let mut keys = store.note_file_keys("u1", "n1");
        keys.sort();
        assert_eq!(keys, vec!["u1/f1", "u1/f3"]);
        assert!(store.note_file_keys("u2", "n1").is_empty());
    }

    proptest! {
        // Monotone-complete pull: for any two commit watermarks w_i < w_j,
        // pulling from w_i yields a superset of pulling from w_j.
        #[test]
        fn monotone_complete_pull(
            titles in proptest::collection::vec("[a-d]{1,4}", 2..12),
            (i, j) in (0usize..11, 0usize..11),
        ) {
            let store = MemoryStore::new();
            let mut marks = Vec::new();
            for (k, title) in titles.iter().enumerate() {
                // Reuse a small id space so later writes overwrite earlier ones.
                let id = format!("n{}", k % 4);
                marks.push(push_notes(&store, "u1", vec![note(&id, title, "")]));
            }
            let (lo, hi) = (i.min(j) % marks.len(), j.max(i) % marks.len());
            let (lo, hi) = (lo.min(hi), lo.max(hi));

            let early: std::collections::HashSet<String> = store
                .changed_since("u1", marks[lo], 0)
                .notes
                .into_iter()
                .map(|n| n.id)
                .collect();
            let late: std::collections::HashSet<String> = store
                .changed_since("u1", marks[hi], 0)
                .notes
                .into_iter()
                .map(|n| n.id)
                .collect();
            prop_assert!(late.is_subset(&early));
        }
    }
}
