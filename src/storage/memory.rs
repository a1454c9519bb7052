use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};

use crate::edit::EditApplier;
use crate::error::{InvalidState, Result};
use crate::types::{ItemId, StaleCommentItem, Status};

use super::dismissed::DismissedSet;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ItemStoreMetadata {
    pub total_items: usize,
    pub total_files: usize,
    pub dismissed: usize,
    pub with_regenerated_text: usize,
    pub languages: Vec<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Inner {
    // Sorted by score desc, then path, then range start
    items: Vec<StaleCommentItem>,
    index: HashMap<ItemId, usize>,
    last_updated: Option<DateTime<Utc>>,
}

impl Inner {
    fn set_items(&mut self, mut items: Vec<StaleCommentItem>) {
        items.sort_by(compare_items);
        items.dedup_by(|a, b| a.id == b.id);
        self.index = items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.id.clone(), i))
            .collect();
        self.items = items;
        self.last_updated = Some(Utc::now());
    }

    fn get_mut(&mut self, id: &ItemId) -> Option<&mut StaleCommentItem> {
        let idx = *self.index.get(id)?;
        self.items.get_mut(idx)
    }

    fn remove(&mut self, id: &ItemId) -> Option<StaleCommentItem> {
        let idx = *self.index.get(id)?;
        let removed = self.items.remove(idx);
        let remaining = std::mem::take(&mut self.items);
        self.set_items(remaining);
        Some(removed)
    }
}

/// Deterministic ordering: score descending, then file path, then range start.
pub fn compare_items(a: &StaleCommentItem, b: &StaleCommentItem) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.file_path.cmp(&b.file_path))
        .then_with(|| a.range.start.cmp(&b.range.start))
        .then_with(|| a.id.cmp(&b.id))
}

/// The current global view of stale comments.
///
/// Dismissed identities are never returned, whatever was stored.
pub struct ItemStore {
    inner: RwLock<Inner>,
    dismissed: Arc<DismissedSet>,
    editor: Arc<dyn EditApplier>,
}

impl std::fmt::Debug for ItemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemStore")
            .field("items", &self.inner.read().items.len())
            .field("dismissed", &self.dismissed)
            .finish()
    }
}

impl ItemStore {
    pub fn new(dismissed: Arc<DismissedSet>, editor: Arc<dyn EditApplier>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            dismissed,
            editor,
        }
    }

    pub fn dismissed(&self) -> &Arc<DismissedSet> {
        &self.dismissed
    }

    /// Sorted snapshot, excluding dismissed identities
    pub fn get_all(&self) -> Vec<StaleCommentItem> {
        self.inner
            .read()
            .items
            .iter()
            .filter(|item| !self.dismissed.contains(&item.id))
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &ItemId) -> Option<StaleCommentItem> {
        if self.dismissed.contains(id) {
            return None;
        }
        let inner = self.inner.read();
        inner.index.get(id).and_then(|&i| inner.items.get(i)).cloned()
    }

    pub fn len(&self) -> usize {
        self.get_all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the whole view with the result of a complete scan
    pub fn replace_all(&self, items: Vec<StaleCommentItem>) {
        let mut inner = self.inner.write();
        let items = self.carry_over(&inner, items);
        debug!(count = items.len(), "replacing item store contents");
        inner.set_items(items);
    }

    /// Replace only the items belonging to `files`, keeping everything else
    pub fn replace_for_files(&self, files: &HashSet<PathBuf>, items: Vec<StaleCommentItem>) {
        let mut inner = self.inner.write();
        let incoming = self.carry_over(&inner, items);
        let mut merged: Vec<StaleCommentItem> = inner
            .items
            .iter()
            .filter(|item| !files.contains(&item.file_path))
            .cloned()
            .collect();
        merged.extend(incoming);
        debug!(files = files.len(), total = merged.len(), "merging rescanned files into item store");
        inner.set_items(merged);
    }

    /// Drop dismissed items, and keep lifecycle state for identities that are already known.
    fn carry_over(&self, inner: &Inner, items: Vec<StaleCommentItem>) -> Vec<StaleCommentItem> {
        items
            .into_iter()
            .filter(|item| !self.dismissed.contains(&item.id))
            .map(|mut item| {
                if let Some(existing) = inner.index.get(&item.id).and_then(|&i| inner.items.get(i)) {
                    item.status = existing.status;
                    item.regenerated_text = existing.regenerated_text.clone();
                }
                item
            })
            .collect()
    }

    /// Mutate one item under the write lock. The closure decides whether the change is allowed.
    pub fn update<T>(
        &self,
        id: &ItemId,
        f: impl FnOnce(&mut StaleCommentItem) -> std::result::Result<T, InvalidState>,
    ) -> std::result::Result<T, InvalidState> {
        if self.dismissed.contains(id) {
            return Err(InvalidState::UnknownItem(id.clone()));
        }
        let mut inner = self.inner.write();
        let item = inner
            .get_mut(id)
            .ok_or_else(|| InvalidState::UnknownItem(id.clone()))?;
        f(item)
    }

    pub fn remove(&self, id: &ItemId) -> Option<StaleCommentItem> {
        self.inner.write().remove(id)
    }

    /// Hide an item permanently. Dismissing an already dismissed identity is a no-op.
    pub fn dismiss(&self, id: &ItemId) -> Result<()> {
        if self.dismissed.contains(id) {
            self.inner.write().remove(id);
            return Ok(());
        }

        let status = self
            .get(id)
            .map(|item| item.status)
            .ok_or_else(|| InvalidState::UnknownItem(id.clone()))?;
        if !status.can_transition_to(Status::Dismissed) {
            return Err(InvalidState::StatusConflict {
                id: id.clone(),
                expected: Status::Detected,
                actual: status,
            }
            .into());
        }

        self.dismissed.insert(id.clone())?;
        self.inner.write().remove(id);
        Ok(())
    }

    /// Write the regenerated text into the file and drop the item.
    ///
    /// Nothing is mutated unless the item exists and carries regenerated text.
    pub async fn apply(&self, id: &ItemId) -> Result<StaleCommentItem> {
        let item = self
            .get(id)
            .ok_or_else(|| InvalidState::UnknownItem(id.clone()))?;
        let Some(text) = item.regenerated_text.clone() else {
            return Err(InvalidState::MissingRegeneratedText(id.clone()).into());
        };
        if !item.status.can_transition_to(Status::Applied) {
            return Err(InvalidState::StatusConflict {
                id: id.clone(),
                expected: Status::Updated,
                actual: item.status,
            }
            .into());
        }

        self.editor
            .apply(&item.file_path, &item.range, &item.original_comment_text, &text)
            .await?;

        let mut applied = self.remove(id).unwrap_or(item);
        applied.status = Status::Applied;
        info!(id = %id, path = %applied.file_path.display(), "applied regenerated comment");
        Ok(applied)
    }

    /// Re-attach regenerated text from `previous` to items whose identity changed only because
    /// an edit moved them. Items are matched within a file by their comment text, in order.
    pub fn carry_over_moved(&self, previous: &[StaleCommentItem]) -> usize {
        let mut inner = self.inner.write();
        let mut claimed: HashSet<ItemId> = HashSet::new();
        let mut restored = 0;

        for old in previous.iter().filter(|item| item.status == Status::Updated) {
            if inner.index.contains_key(&old.id) {
                continue;
            }
            let target = inner
                .items
                .iter()
                .find(|item| {
                    item.file_path == old.file_path
                        && item.original_comment_text == old.original_comment_text
                        && item.status == Status::Detected
                        && item.regenerated_text.is_none()
                        && !claimed.contains(&item.id)
                })
                .map(|item| item.id.clone());
            let Some(id) = target else {
                continue;
            };
            if let Some(item) = inner.get_mut(&id) {
                item.status = old.status;
                item.regenerated_text = old.regenerated_text.clone();
                claimed.insert(id);
                restored += 1;
            }
        }

        if restored > 0 {
            debug!(restored, "carried lifecycle state over to moved items");
        }
        restored
    }

    /// Items in one file, sorted.
    pub fn items_for_file(&self, path: &Path) -> Vec<StaleCommentItem> {
        self.get_all()
            .into_iter()
            .filter(|item| item.file_path == path)
            .collect()
    }

    pub fn metadata(&self) -> ItemStoreMetadata {
        let items = self.get_all();
        let files: HashSet<&PathBuf> = items.iter().map(|i| &i.file_path).collect();
        let mut languages: Vec<String> = items
            .iter()
            .map(|i| i.language_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        languages.sort();

        ItemStoreMetadata {
            total_items: items.len(),
            total_files: files.len(),
            dismissed: self.dismissed.len(),
            with_regenerated_text: items.iter().filter(|i| i.has_regenerated_text()).count(),
            languages,
            last_updated: self.inner.read().last_updated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::MockEditApplier;
    use crate::error::{EditError, StaleError};
    use crate::storage::kv::MemoryStore;
    use crate::types::TextRange;
    use mockall::predicate::*;

    fn item(path: &str, line: u32, score: f64) -> StaleCommentItem {
        let range = TextRange::lines(line, 0, line, 8);
        let text = format!("// c{}", line);
        StaleCommentItem {
            id: ItemId::compute(Path::new(path), &range, &text),
            file_path: PathBuf::from(path),
            range,
            original_comment_text: text,
            surrounding_code: "fn f() {}".into(),
            score,
            reasons: Vec::new(),
            language_id: "rust".into(),
            status: Status::Detected,
            regenerated_text: None,
            last_modified: Utc::now(),
        }
    }

    fn store_with(editor: MockEditApplier) -> ItemStore {
        let dismissed = Arc::new(DismissedSet::load(Arc::new(MemoryStore::new())).unwrap());
        ItemStore::new(dismissed, Arc::new(editor))
    }

    fn store() -> ItemStore {
        store_with(MockEditApplier::new())
    }

    #[test]
    fn test_sorted_by_score_then_path_then_range() {
        let store = store();
        store.replace_all(vec![
            item("b.rs", 1, 60.0),
            item("a.rs", 9, 60.0),
            item("a.rs", 2, 60.0),
            item("z.rs", 0, 90.0),
        ]);
        let order: Vec<(String, u32)> = store
            .get_all()
            .iter()
            .map(|i| (i.file_path.display().to_string(), i.range.start.line))
            .collect();
        assert_eq!(
            order,
            vec![
                ("z.rs".to_string(), 0),
                ("a.rs".to_string(), 2),
                ("a.rs".to_string(), 9),
                ("b.rs".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_replace_for_files_keeps_other_files() {
        let store = store();
        store.replace_all(vec![item("a.rs", 1, 70.0), item("b.rs", 1, 70.0)]);

        let files: HashSet<PathBuf> = [PathBuf::from("a.rs")].into_iter().collect();
        store.replace_for_files(&files, vec![item("a.rs", 5, 80.0)]);

        let all = store.get_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].range.start.line, 5);
        assert_eq!(all[1].file_path, PathBuf::from("b.rs"));
    }

    #[test]
    fn test_rescan_keeps_regenerated_text() {
        let store = store();
        let first = item("a.rs", 1, 70.0);
        let id = first.id.clone();
        store.replace_all(vec![first.clone()]);
        store
            .update(&id, |item| {
                item.status = Status::Updated;
                item.regenerated_text = Some("// new".into());
                Ok(())
            })
            .unwrap();

        store.replace_all(vec![first]);
        let kept = store.get(&id).unwrap();
        assert_eq!(kept.status, Status::Updated);
        assert_eq!(kept.regenerated_text.as_deref(), Some("// new"));
    }

    #[test]
    fn test_dismiss_hides_item_and_is_idempotent() {
        let store = store();
        let target = item("a.rs", 1, 70.0);
        let id = target.id.clone();
        store.replace_all(vec![target.clone(), item("a.rs", 4, 60.0)]);

        store.dismiss(&id).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.get(&id).is_none());
        store.dismiss(&id).unwrap();

        // Still hidden after a rescan that finds it again
        store.replace_all(vec![target]);
        assert!(store.get_all().is_empty());
    }

    #[test]
    fn test_dismiss_unknown_item() {
        let err = store().dismiss(&ItemId::from("nope")).unwrap_err();
        assert!(matches!(err, StaleError::InvalidState(InvalidState::UnknownItem(_))));
    }

    #[tokio::test]
    async fn test_apply_without_text_is_invalid_state() {
        let mut editor = MockEditApplier::new();
        editor.expect_apply().never();
        let store = store_with(editor);
        let target = item("a.rs", 1, 70.0);
        let id = target.id.clone();
        store.replace_all(vec![target]);

        let err = store.apply(&id).await.unwrap_err();
        assert!(matches!(
            err,
            StaleError::InvalidState(InvalidState::MissingRegeneratedText(_))
        ));
        assert_eq!(store.get(&id).unwrap().status, Status::Detected);
    }

    #[tokio::test]
    async fn test_apply_delegates_edit_and_removes_item() {
        let target = item("a.rs", 1, 70.0);
        let id = target.id.clone();

        let mut editor = MockEditApplier::new();
        editor
            .expect_apply()
            .with(
                eq(PathBuf::from("a.rs")),
                eq(target.range),
                eq("// c1"),
                eq("// fixed"),
            )
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        let store = store_with(editor);
        store.replace_all(vec![target]);
        store
            .update(&id, |item| {
                item.status = Status::Updated;
                item.regenerated_text = Some("// fixed".into());
                Ok(())
            })
            .unwrap();

        let applied = store.apply(&id).await.unwrap();
        assert_eq!(applied.status, Status::Applied);
        assert!(store.get(&id).is_none());
    }

    #[tokio::test]
    async fn test_apply_conflict_leaves_item_updated() {
        let target = item("a.rs", 1, 70.0);
        let id = target.id.clone();

        let mut editor = MockEditApplier::new();
        editor.expect_apply().times(1).returning(|path, range, _, _| {
            Err(EditError::Conflict {
                path: path.to_path_buf(),
                range: range.to_string(),
            })
        });
        let store = store_with(editor);
        store.replace_all(vec![target]);
        store
            .update(&id, |item| {
                item.status = Status::Updated;
                item.regenerated_text = Some("// fixed".into());
                Ok(())
            })
            .unwrap();

        let err = store.apply(&id).await.unwrap_err();
        assert!(matches!(err, StaleError::Edit(EditError::Conflict { .. })));
        let current = store.get(&id).unwrap();
        assert_eq!(current.status, Status::Updated);
        assert_eq!(current.regenerated_text.as_deref(), Some("// fixed"));
    }

    #[test]
    fn test_carry_over_moved_matches_by_text() {
        let store = store_with(MockEditApplier::new());
        let mut before = item("a.rs", 1, 70.0);
        before.status = Status::Updated;
        before.regenerated_text = Some("// fixed".into());

        // Same comment, three lines further down
        let mut moved = item("a.rs", 4, 70.0);
        moved.original_comment_text = before.original_comment_text.clone();
        moved.id = ItemId::compute(Path::new("a.rs"), &moved.range, &moved.original_comment_text);
        let untouched = item("a.rs", 9, 60.0);
        store.replace_all(vec![moved.clone(), untouched.clone()]);

        assert_eq!(store.carry_over_moved(&[before]), 1);
        let restored = store.get(&moved.id).unwrap();
        assert_eq!(restored.status, Status::Updated);
        assert_eq!(restored.regenerated_text.as_deref(), Some("// fixed"));
        assert_eq!(store.get(&untouched.id).unwrap().status, Status::Detected);
    }

    #[test]
    fn test_metadata() {
        let store = store();
        store.replace_all(vec![item("a.rs", 1, 70.0), item("b.rs", 1, 60.0)]);
        let meta = store.metadata();
        assert_eq!(meta.total_items, 2);
        assert_eq!(meta.total_files, 2);
        assert_eq!(meta.languages, vec!["rust".to_string()]);
        assert!(meta.last_updated.is_some());
    }
}
