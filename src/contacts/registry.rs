//! In-memory group membership with write-through persistence.
//!
//! All state lives behind one mutex. Every mutation persists the affected
//! group files while still holding it, so writes to a group file are
//! serialized and always reflect the latest in-memory state.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Local;
use tracing::{debug, info, warn};

use super::file_format;
use super::{ContactsError, Group, Normalizer, RecipientId};
use crate::store::FileStore;

/// Insertion-ordered set of recipients.
#[derive(Debug, Default, Clone)]
struct MemberSet {
    order: Vec<RecipientId>,
    seen: HashSet<RecipientId>,
}

impl MemberSet {
    fn insert(&mut self, id: &RecipientId) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.clone());
        self.order.push(id.clone());
        true
    }

    fn extend<'a, I: IntoIterator<Item = &'a RecipientId>>(&mut self, ids: I) -> usize {
        ids.into_iter().filter(|id| self.insert(id)).count()
    }

    fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

/// One member set per group.
#[derive(Debug, Default)]
struct GroupTable {
    sets: BTreeMap<Group, MemberSet>,
}

impl GroupTable {
    fn set(&self, group: Group) -> Option<&MemberSet> {
        self.sets.get(&group)
    }

    fn set_mut(&mut self, group: Group) -> &mut MemberSet {
        self.sets.entry(group).or_default()
    }

    /// Insert into `group`, and into `ALL` when `group` is a named group.
    fn insert_all(&mut self, group: Group, ids: &[RecipientId]) -> usize {
        let added = self.set_mut(group).extend(ids);
        if !group.is_all() {
            self.set_mut(Group::All).extend(ids);
        }
        added
    }

    /// Recompute `ALL` as the union of the named groups.
    fn rebuild_all(&mut self) {
        let mut union = MemberSet::default();
        for named in Group::NAMED {
            if let Some(set) = self.sets.get(&named) {
                union.extend(&set.order);
            }
        }
        self.sets.insert(Group::All, union);
    }
}

/// Result of [`ContactRegistry::add_many`].
#[derive(Debug)]
pub struct AddOutcome {
    /// Accepted identifiers after normalization, in input order. May contain
    /// repeats when the caller supplied equivalent inputs.
    pub accepted: Vec<RecipientId>,
    /// Inputs rejected by the normalizer.
    pub invalid: usize,
    /// Members that were not already in the target group.
    pub newly_added: usize,
    /// Set when a group file write failed; the in-memory update still stands.
    pub persist_error: Option<ContactsError>,
}

impl AddOutcome {
    /// Whether every affected group file was written.
    pub fn is_persisted(&self) -> bool {
        self.persist_error.is_none()
    }
}

/// Recipient groups, the derived `ALL` union, and their group files.
pub struct ContactRegistry {
    dir: PathBuf,
    normalizer: Normalizer,
    store: Arc<dyn FileStore>,
    table: Mutex<GroupTable>,
}

impl ContactRegistry {
    /// Create an empty registry persisting to `dir/<GROUP>.txt`.
    ///
    /// Nothing is read until [`ContactRegistry::load`] is called.
    pub fn new(dir: impl Into<PathBuf>, normalizer: Normalizer, store: Arc<dyn FileStore>) -> Self {
        Self {
            dir: dir.into(),
            normalizer,
            store,
            table: Mutex::new(GroupTable::default()),
        }
    }

    /// Path of a group's persisted file.
    pub fn group_path(&self, group: Group) -> PathBuf {
        self.dir.join(group.file_name())
    }

    fn lock(&self) -> MutexGuard<'_, GroupTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read every group file into memory.
    ///
    /// Missing files are created empty. Unreadable files are logged and
    /// skipped. Loading merges into the current state with set semantics,
    /// so repeated calls never duplicate members, and no file is rewritten.
    pub fn load(&self) -> BTreeMap<Group, usize> {
        info!(dir = %self.dir.display(), "loading contacts from files");
        let mut table = self.lock();

        for group in Group::EVERY {
            let path = self.group_path(group);
            let content = match self.store.read_text(&path) {
                Ok(Some(content)) => content,
                Ok(None) => {
                    match self.store.write_text(&path, "") {
                        Ok(()) => info!(path = %path.display(), "created empty contact file"),
                        Err(e) => warn!(error = %e, "failed to create contact file"),
                    }
                    continue;
                }
                Err(e) => {
                    warn!(%group, error = %e, "failed to read contact file");
                    continue;
                }
            };

            let lines = file_format::parse(&content);
            if lines.is_empty() {
                debug!(%group, path = %path.display(), "no contacts in file");
                continue;
            }
            let ids = self.normalizer.normalize_all(lines);
            table.insert_all(group, &ids);
            info!(%group, loaded = ids.len(), "contacts loaded");
        }

        let counts = counts_of(&table);
        info!(?counts, "contacts ready");
        counts
    }

    /// Drop in-memory state and load again from disk.
    pub fn reload(&self) -> BTreeMap<Group, usize> {
        self.lock().sets.clear();
        self.load()
    }

    /// Normalize `raw`, add the accepted identifiers to `group` (and to `ALL`
    /// for a named group), then persist the affected group files.
    pub fn add_many<S: AsRef<str>>(&self, raw: &[S], group: Group) -> AddOutcome {
        let accepted = self.normalizer.normalize_all(raw);
        let invalid = raw.len().saturating_sub(accepted.len());

        let mut table = self.lock();
        let newly_added = table.insert_all(group, &accepted);

        let affected: &[Group] = if group.is_all() {
            &[Group::All]
        } else {
            &[group, Group::All]
        };
        let persist_error = self.persist(&table, affected).err();
        drop(table);

        info!(
            %group,
            accepted = accepted.len(),
            newly_added,
            invalid,
            "contacts added"
        );
        AddOutcome {
            accepted,
            invalid,
            newly_added,
            persist_error,
        }
    }

    /// Empty one group, or every group when `group` is `None`.
    ///
    /// Clearing a named group rebuilds `ALL` from the remaining named groups,
    /// which also drops members that were only ever added to `ALL` directly.
    ///
    /// # Errors
    ///
    /// Returns [`ContactsError::Persist`] if a group file could not be
    /// written. The in-memory clear has already happened.
    pub fn clear(&self, group: Option<Group>) -> Result<(), ContactsError> {
        let mut table = self.lock();
        let affected: Vec<Group> = match group {
            Some(Group::All) => {
                table.set_mut(Group::All).clear();
                vec![Group::All]
            }
            Some(named) => {
                table.set_mut(named).clear();
                table.rebuild_all();
                vec![named, Group::All]
            }
            None => {
                for g in Group::EVERY {
                    table.set_mut(g).clear();
                }
                Group::EVERY.to_vec()
            }
        };
        let result = self.persist(&table, &affected);
        drop(table);

        match group {
            Some(g) => info!(group = %g, "group cleared"),
            None => info!("all groups cleared"),
        }
        result
    }

    /// Snapshot of a group's members in insertion order.
    pub fn members_of(&self, group: Group) -> Vec<RecipientId> {
        self.lock()
            .set(group)
            .map(|s| s.order.clone())
            .unwrap_or_default()
    }

    /// Masked display forms of a group's members.
    pub fn masked_members(&self, group: Group) -> Vec<String> {
        self.lock()
            .set(group)
            .map(|s| s.order.iter().map(RecipientId::masked).collect())
            .unwrap_or_default()
    }

    /// Whether `id` is a member of `group`.
    pub fn contains(&self, group: Group, id: &RecipientId) -> bool {
        self.lock().set(group).is_some_and(|s| s.seen.contains(id))
    }

    /// Member count per group, every group present.
    pub fn counts_by_group(&self) -> BTreeMap<Group, usize> {
        counts_of(&self.lock())
    }

    /// Write each group's file. Attempts every group even after a failure
    /// and reports the failed ones.
    fn persist(&self, table: &GroupTable, groups: &[Group]) -> Result<(), ContactsError> {
        let updated_at = file_format::format_timestamp(&Local::now());
        let mut failed = Vec::new();
        let mut first_error = None;

        for &group in groups {
            let members = table.set(group).map(|s| s.order.as_slice()).unwrap_or(&[]);
            let content = file_format::render(group, members, &updated_at);
            let path = self.group_path(group);
            match self.store.write_text(&path, &content) {
                Ok(()) => debug!(%group, count = members.len(), "contacts saved"),
                Err(e) => {
                    warn!(%group, error = %e, "failed to save contacts");
                    failed.push(group);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            None => Ok(()),
            Some(source) => Err(ContactsError::Persist {
                groups: failed,
                source,
            }),
        }
    }
}

fn counts_of(table: &GroupTable) -> BTreeMap<Group, usize> {
    Group::EVERY
        .into_iter()
        .map(|g| (g, table.set(g).map_or(0, MemberSet::len)))
        .collect()
}
