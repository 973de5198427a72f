//! File-backed user store.
//!
//! Every call reopens the sheet, so edits made to the file between calls are
//! always visible. Mutations hold an exclusive lock across load, change and
//! save; a failed mutation writes nothing.

pub mod sheet;

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::actor_framework::{Backend, Entity};
use crate::domain::{User, UserCreate, UserLookup, UserPatch};
use crate::error::{StoreError, StoreResult};

use self::sheet::{LockMode, Sheet};

/// Which uniqueness rules `insert` and `update` enforce.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Uniqueness {
    /// Only ids must be unique; callers may pick their own id on insert.
    #[default]
    IdOnly,
    /// Names and emails must also be unique; ids are always store-assigned.
    Identity,
}

#[derive(Clone, Debug)]
pub struct RecordStore {
    path: PathBuf,
    uniqueness: Uniqueness,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>, uniqueness: Uniqueness) -> Self {
        Self {
            path: path.into(),
            uniqueness,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn uniqueness(&self) -> Uniqueness {
        self.uniqueness
    }

    /// Load the whole sheet under a shared lock.
    pub fn open(&self) -> StoreResult<Sheet> {
        if !self.path.exists() {
            return Err(StoreError::unavailable(&self.path, "file not found"));
        }
        let _lock = sheet::lock(&self.path, LockMode::Shared)?;
        sheet::load(&self.path)
    }

    pub fn list(&self) -> StoreResult<Vec<User>> {
        Ok(self.open()?.rows)
    }

    pub fn find_by_id(&self, id: u64) -> StoreResult<Option<User>> {
        Ok(self.open()?.rows.into_iter().find(|user| user.id == id))
    }

    pub fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let lookup = UserLookup::Email(email.to_string());
        Ok(self.open()?.rows.into_iter().find(|user| user.matches(&lookup)))
    }

    #[instrument(skip(self, payload), fields(path = %self.path.display(), name = %payload.name))]
    pub fn insert(&self, payload: UserCreate) -> StoreResult<u64> {
        require_text("nombre", &payload.name)?;
        require_text("email", &payload.email)?;
        let uniqueness = self.uniqueness;

        self.mutate(move |sheet| {
            let id = match (uniqueness, payload.id) {
                (Uniqueness::Identity, Some(_)) => {
                    return Err(StoreError::Validation(
                        "id is assigned by the store".to_string(),
                    ));
                }
                (Uniqueness::IdOnly, Some(id)) => {
                    // Ids at or below the high-water mark belong to a live row
                    // or to a deleted one; neither may be handed out again.
                    if id <= sheet.last_id() {
                        return Err(StoreError::IdTaken(id));
                    }
                    id
                }
                (_, None) => sheet
                    .next_id()
                    .ok_or_else(|| StoreError::Conflict("id space exhausted".to_string()))?,
            };
            if uniqueness == Uniqueness::Identity {
                check_identity(
                    sheet,
                    None,
                    Some(payload.name.as_str()),
                    Some(payload.email.as_str()),
                )?;
            }

            sheet.rows.push(User::from_create(id, payload));
            sheet.high_water = sheet.high_water.max(id);
            debug!(id, "Row appended");
            Ok(id)
        })
    }

    #[instrument(skip(self, patch), fields(path = %self.path.display()))]
    pub fn update(&self, id: u64, patch: UserPatch) -> StoreResult<User> {
        if let Some(name) = &patch.name {
            require_text("nombre", name)?;
        }
        if let Some(email) = &patch.email {
            require_text("email", email)?;
        }
        let uniqueness = self.uniqueness;

        self.mutate(move |sheet| {
            let index = sheet.position(id).ok_or(StoreError::NotFound(id))?;
            if uniqueness == Uniqueness::Identity {
                check_identity(sheet, Some(id), patch.name.as_deref(), patch.email.as_deref())?;
            }
            let user = &mut sheet.rows[index];
            user.on_update(patch);
            Ok(user.clone())
        })
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn delete(&self, id: u64) -> StoreResult<()> {
        self.mutate(|sheet| {
            let index = sheet.position(id).ok_or(StoreError::NotFound(id))?;
            sheet.high_water = sheet.last_id();
            sheet.rows.remove(index);
            Ok(())
        })
    }

    fn mutate<R>(&self, change: impl FnOnce(&mut Sheet) -> StoreResult<R>) -> StoreResult<R> {
        let _lock = sheet::lock(&self.path, LockMode::Exclusive)?;
        let mut current = sheet::load(&self.path)?;
        let result = change(&mut current)?;
        sheet::save(&self.path, &current)?;
        Ok(result)
    }
}

impl Backend<User> for RecordStore {
    fn list(&self) -> StoreResult<Vec<User>> {
        RecordStore::list(self)
    }

    fn get(&self, id: u64) -> StoreResult<Option<User>> {
        self.find_by_id(id)
    }

    fn find(&self, lookup: &UserLookup) -> StoreResult<Option<User>> {
        match lookup {
            UserLookup::Email(email) => self.find_by_email(email),
        }
    }

    fn create(&self, payload: UserCreate) -> StoreResult<u64> {
        self.insert(payload)
    }

    fn update(&self, id: u64, patch: UserPatch) -> StoreResult<User> {
        RecordStore::update(self, id, patch)
    }

    fn delete(&self, id: u64) -> StoreResult<()> {
        RecordStore::delete(self, id)
    }
}

fn require_text(field: &str, value: &str) -> StoreResult<()> {
    if value.trim().is_empty() {
        return Err(StoreError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Reject a name or email already held by a row other than `except`.
fn check_identity(
    sheet: &Sheet,
    except: Option<u64>,
    name: Option<&str>,
    email: Option<&str>,
) -> StoreResult<()> {
    for user in sheet.rows.iter().filter(|user| Some(user.id) != except) {
        if name == Some(user.name.as_str()) {
            return Err(StoreError::Conflict(format!("nombre {:?} already exists", user.name)));
        }
        if email == Some(user.email.as_str()) {
            return Err(StoreError::Conflict(format!("email {:?} already exists", user.email)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn store(dir: &Path, uniqueness: Uniqueness) -> RecordStore {
        let path = dir.join("datos.csv");
        sheet::init(&path, false).expect("init");
        RecordStore::new(path, uniqueness)
    }

    fn insert(store: &RecordStore, name: &str, email: &str) -> u64 {
        store.insert(UserCreate::new(name, email)).expect("insert")
    }

    #[test]
    fn ids_grow_and_are_never_reused() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path(), Uniqueness::Identity);

        assert_eq!(insert(&store, "Ana", "ana@x.com"), 1);
        assert_eq!(insert(&store, "Bea", "bea@x.com"), 2);
        store.delete(1).expect("delete");
        assert_eq!(store.list().expect("list"), vec![User::new(2, "Bea", "bea@x.com")]);
        assert_eq!(insert(&store, "Cal", "cal@x.com"), 3);

        store.delete(3).expect("delete newest");
        assert_eq!(insert(&store, "Dan", "dan@x.com"), 4);
    }

    #[test]
    fn find_after_insert_returns_the_row() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path(), Uniqueness::Identity);
        let id = insert(&store, "Ana", "ana@x.com");

        assert_eq!(store.find_by_id(id).expect("find"), Some(User::new(id, "Ana", "ana@x.com")));
        assert_eq!(store.find_by_id(99).expect("find"), None);
        assert_eq!(
            store.find_by_email("ana@x.com").expect("find").map(|u| u.id),
            Some(id)
        );
        assert_eq!(store.find_by_email("bea@x.com").expect("find"), None);
    }

    #[test]
    fn duplicate_identity_is_a_conflict_and_writes_nothing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path(), Uniqueness::Identity);
        insert(&store, "Ana", "ana@x.com");
        let before = fs::read_to_string(store.path()).expect("read");

        let by_name = store.insert(UserCreate::new("Ana", "other@x.com"));
        assert!(matches!(by_name, Err(StoreError::Conflict(_))));
        let by_email = store.insert(UserCreate::new("Other", "ana@x.com"));
        assert!(matches!(by_email, Err(StoreError::Conflict(_))));

        assert_eq!(fs::read_to_string(store.path()).expect("read"), before);
    }

    #[test]
    fn identity_mode_rejects_caller_ids() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path(), Uniqueness::Identity);
        let err = store
            .insert(UserCreate::new("Ana", "ana@x.com").with_id(5))
            .expect_err("caller id");
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn id_only_mode_allows_duplicate_names_but_not_ids() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path(), Uniqueness::IdOnly);

        assert_eq!(store.insert(UserCreate::new("Ana", "a@x.com").with_id(10)), Ok(10));
        assert_eq!(insert(&store, "Ana", "a@x.com"), 11);
        assert_eq!(
            store.insert(UserCreate::new("Bea", "b@x.com").with_id(10)),
            Err(StoreError::IdTaken(10))
        );
    }

    #[test]
    fn caller_ids_of_deleted_rows_are_refused() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path(), Uniqueness::IdOnly);
        insert(&store, "Ana", "ana@x.com");
        insert(&store, "Bea", "bea@x.com");
        store.delete(1).expect("delete");
        store.delete(2).expect("delete newest");
        let before = fs::read_to_string(store.path()).expect("read");

        for id in [1, 2] {
            assert_eq!(
                store.insert(UserCreate::new("Zed", "zed@x.com").with_id(id)),
                Err(StoreError::IdTaken(id))
            );
        }
        assert_eq!(fs::read_to_string(store.path()).expect("read"), before);
        assert_eq!(store.list().expect("list"), vec![]);

        assert_eq!(store.insert(UserCreate::new("Zed", "zed@x.com").with_id(5)), Ok(5));
        assert_eq!(insert(&store, "Yul", "yul@x.com"), 6);
    }

    #[test]
    fn mutations_wait_for_the_exclusive_lock() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path(), Uniqueness::Identity);
        let held = sheet::lock(store.path(), LockMode::Exclusive).expect("lock");

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let writer = store.clone();
        let handle = std::thread::spawn(move || {
            let result = writer.insert(UserCreate::new("Ana", "ana@x.com"));
            let _ = done_tx.send(());
            result
        });

        std::thread::sleep(std::time::Duration::from_millis(200));
        assert!(done_rx.try_recv().is_err(), "insert ran while the lock was held");
        assert_eq!(sheet::load(store.path()).expect("load").rows, vec![]);

        drop(held);
        assert_eq!(handle.join().expect("writer thread"), Ok(1));
        assert_eq!(store.list().expect("list").len(), 1);
    }

    #[test]
    fn update_merges_fields() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path(), Uniqueness::Identity);
        let id = insert(&store, "Ana", "ana@x.com");

        let updated = store.update(id, UserPatch::email("ana@y.com")).expect("update");
        assert_eq!(updated, User::new(id, "Ana", "ana@y.com"));
        assert_eq!(store.find_by_id(id).expect("find"), Some(updated));
    }

    #[test]
    fn update_missing_or_conflicting_leaves_store_unchanged() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path(), Uniqueness::Identity);
        insert(&store, "Ana", "ana@x.com");
        let bea = insert(&store, "Bea", "bea@x.com");
        let before = store.list().expect("list");

        assert_eq!(store.update(42, UserPatch::name("Zed")), Err(StoreError::NotFound(42)));
        assert!(matches!(
            store.update(bea, UserPatch::email("ana@x.com")),
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(store.list().expect("list"), before);

        // Re-submitting a row's own values is not a conflict with itself.
        store.update(bea, UserPatch::name("Bea")).expect("same name");
    }

    #[test]
    fn delete_removes_exactly_one_row() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path(), Uniqueness::Identity);
        insert(&store, "Ana", "ana@x.com");
        let bea = insert(&store, "Bea", "bea@x.com");
        insert(&store, "Cal", "cal@x.com");

        store.delete(bea).expect("delete");
        assert_eq!(store.find_by_id(bea).expect("find"), None);
        assert_eq!(store.list().expect("list").len(), 2);

        assert_eq!(store.delete(bea), Err(StoreError::NotFound(bea)));
        assert_eq!(store.list().expect("list").len(), 2);
    }

    #[test]
    fn blank_fields_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path(), Uniqueness::IdOnly);
        assert!(matches!(
            store.insert(UserCreate::new("  ", "a@x.com")),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            store.update(1, UserPatch::email("")),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn external_edits_are_seen_on_next_call() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path(), Uniqueness::Identity);
        insert(&store, "Ana", "ana@x.com");

        fs::write(store.path(), "id,nombre,email\n7,Eva,eva@x.com\n").expect("edit");
        assert_eq!(store.list().expect("list"), vec![User::new(7, "Eva", "eva@x.com")]);
        assert_eq!(insert(&store, "Fer", "fer@x.com"), 8);
    }

    #[test]
    fn missing_file_is_unavailable_for_every_operation() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = RecordStore::new(temp.path().join("missing.csv"), Uniqueness::Identity);

        assert!(matches!(store.list(), Err(StoreError::Unavailable { .. })));
        assert!(matches!(store.find_by_id(1), Err(StoreError::Unavailable { .. })));
        assert!(matches!(
            store.insert(UserCreate::new("Ana", "ana@x.com")),
            Err(StoreError::Unavailable { .. })
        ));
        assert!(matches!(store.delete(1), Err(StoreError::Unavailable { .. })));
    }
}
