//! Working set: the per-query record arena
//!
//! Every record in flight between stages lives here and is referenced by a
//! `WorkingSetId`. Stages pass ids, never records. Ids are generational:
//! once a member is freed its id stops resolving even if the slot is
//! reused.
//!
//! A member moves one way through its states:
//!
//! ```text
//! LocOnly(loc) --materialize--> LocAndObj(loc, obj) --detach--> OwnedObj(obj)
//! ```

use std::fmt;

use serde_json::Value;

use crate::index::{lookup_path, IndexKey};
use crate::storage::RecordLocation;

use super::errors::{ExecutorError, ExecutorResult};
use super::sort_pattern::{SortKey, SortPattern};

/// Handle to a working set member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkingSetId {
    slot: u32,
    generation: u32,
}

impl fmt::Display for WorkingSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ws#{}.{}", self.slot, self.generation)
    }
}

/// Where a member's content comes from
#[derive(Debug, Clone, PartialEq)]
pub enum MemberState {
    /// Only a location; content must be fetched
    LocOnly(RecordLocation),
    /// Fetched content still tied to its location
    LocAndObj { loc: RecordLocation, obj: Value },
    /// Owned snapshot. `former_loc` is kept for equality checks only.
    OwnedObj {
        obj: Value,
        former_loc: Option<RecordLocation>,
    },
}

/// One record in flight
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingSetMember {
    state: MemberState,
    key_data: Vec<(String, IndexKey)>,
    /// Sort key together with the pattern it was extracted for
    sort_key: Option<(SortPattern, SortKey)>,
}

impl WorkingSetMember {
    /// Member referencing a stored record by location
    pub fn with_loc(loc: RecordLocation) -> Self {
        Self {
            state: MemberState::LocOnly(loc),
            key_data: Vec::new(),
            sort_key: None,
        }
    }

    /// Member holding an owned document with no location
    pub fn with_obj(obj: Value) -> Self {
        Self {
            state: MemberState::OwnedObj {
                obj,
                former_loc: None,
            },
            key_data: Vec::new(),
            sort_key: None,
        }
    }

    /// Attach index key data (field path -> key value)
    pub fn with_key_data(mut self, key_data: Vec<(String, IndexKey)>) -> Self {
        self.key_data = key_data;
        self
    }

    /// Returns the member state
    pub fn state(&self) -> &MemberState {
        &self.state
    }

    /// Location the member still references, if any
    pub fn loc(&self) -> Option<RecordLocation> {
        match &self.state {
            MemberState::LocOnly(loc) | MemberState::LocAndObj { loc, .. } => Some(*loc),
            MemberState::OwnedObj { .. } => None,
        }
    }

    /// Location identifying the underlying record, including a location
    /// the member has been detached from. Only for equality comparisons.
    pub fn identity(&self) -> Option<RecordLocation> {
        match &self.state {
            MemberState::LocOnly(loc) | MemberState::LocAndObj { loc, .. } => Some(*loc),
            MemberState::OwnedObj { former_loc, .. } => *former_loc,
        }
    }

    /// Returns true if the member references a location
    pub fn has_loc(&self) -> bool {
        self.loc().is_some()
    }

    /// Returns true if the member holds content
    pub fn has_obj(&self) -> bool {
        self.obj().is_some()
    }

    /// Returns the content, if materialized
    pub fn obj(&self) -> Option<&Value> {
        match &self.state {
            MemberState::LocOnly(_) => None,
            MemberState::LocAndObj { obj, .. } | MemberState::OwnedObj { obj, .. } => Some(obj),
        }
    }

    /// Consume the member, returning its content if materialized
    pub fn into_obj(self) -> Option<Value> {
        match self.state {
            MemberState::LocOnly(_) => None,
            MemberState::LocAndObj { obj, .. } | MemberState::OwnedObj { obj, .. } => Some(obj),
        }
    }

    /// Attach fetched content. Idempotent: content already present wins.
    pub fn materialize(&mut self, obj: Value) {
        if let MemberState::LocOnly(loc) = self.state {
            self.state = MemberState::LocAndObj { loc, obj };
        }
    }

    /// Drop the tie to the location, keeping the content.
    ///
    /// Returns false if the member has no content to keep.
    pub fn detach_from_loc(&mut self) -> bool {
        match &mut self.state {
            MemberState::LocOnly(_) => false,
            MemberState::OwnedObj { .. } => true,
            MemberState::LocAndObj { loc, obj } => {
                let former_loc = Some(*loc);
                let obj = std::mem::take(obj);
                self.state = MemberState::OwnedObj { obj, former_loc };
                true
            }
        }
    }

    /// Index key data supplied by the producing scan
    pub fn key_data(&self) -> &[(String, IndexKey)] {
        &self.key_data
    }

    /// Value of a dotted field, from content if present, else from key data.
    ///
    /// Content-backed lookups report missing fields as `Null`. Returns
    /// `None` only when neither content nor key data covers the path.
    pub fn get_field_dotted(&self, path: &str) -> Option<IndexKey> {
        if let Some(obj) = self.obj() {
            return Some(
                lookup_path(obj, path)
                    .map(IndexKey::from_json)
                    .unwrap_or(IndexKey::Null),
            );
        }
        self.key_data
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, key)| key.clone())
    }

    /// Cached sort key, if it was extracted for `pattern`
    pub fn cached_sort_key(&self, pattern: &SortPattern) -> Option<&SortKey> {
        match &self.sort_key {
            Some((cached_for, key)) if cached_for == pattern => Some(key),
            _ => None,
        }
    }

    /// Cache the sort key extracted for `pattern`, replacing any other
    pub fn set_sort_key(&mut self, pattern: &SortPattern, key: SortKey) {
        self.sort_key = Some((pattern.clone(), key));
    }
}

#[derive(Debug)]
enum Slot {
    Occupied {
        generation: u32,
        member: WorkingSetMember,
    },
    Vacant {
        generation: u32,
    },
}

/// Arena owning all members of one query
#[derive(Debug, Default)]
pub struct WorkingSet {
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    live: usize,
}

impl WorkingSet {
    /// Creates an empty working set
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live members
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns true if no members are live
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Store a member, returning its id
    pub fn allocate(&mut self, member: WorkingSetMember) -> WorkingSetId {
        self.live += 1;
        if let Some(slot) = self.free_slots.pop() {
            let generation = match &self.slots[slot as usize] {
                Slot::Vacant { generation } => *generation,
                Slot::Occupied { generation, .. } => generation.wrapping_add(1),
            };
            self.slots[slot as usize] = Slot::Occupied { generation, member };
            return WorkingSetId { slot, generation };
        }

        let slot = self.slots.len() as u32;
        self.slots.push(Slot::Occupied {
            generation: 0,
            member,
        });
        WorkingSetId {
            slot,
            generation: 0,
        }
    }

    /// Returns true if `id` refers to a live member
    pub fn contains(&self, id: WorkingSetId) -> bool {
        self.try_get(id).is_ok()
    }

    /// Look up a member.
    ///
    /// # Panics
    ///
    /// Panics if `id` was freed or never allocated here.
    pub fn get(&self, id: WorkingSetId) -> &WorkingSetMember {
        match self.try_get(id) {
            Ok(member) => member,
            Err(err) => panic!("{}", err),
        }
    }

    /// Look up a member mutably.
    ///
    /// # Panics
    ///
    /// Panics if `id` was freed or never allocated here.
    pub fn get_mut(&mut self, id: WorkingSetId) -> &mut WorkingSetMember {
        match self.try_get_mut(id) {
            Ok(member) => member,
            Err(err) => panic!("{}", err),
        }
    }

    /// Look up a member, reporting stale ids as `AERO_INVALID_HANDLE`
    pub fn try_get(&self, id: WorkingSetId) -> ExecutorResult<&WorkingSetMember> {
        match self.slots.get(id.slot as usize) {
            Some(Slot::Occupied { generation, member }) if *generation == id.generation => {
                Ok(member)
            }
            _ => Err(ExecutorError::invalid_handle(id)),
        }
    }

    /// Mutable variant of `try_get`
    pub fn try_get_mut(&mut self, id: WorkingSetId) -> ExecutorResult<&mut WorkingSetMember> {
        match self.slots.get_mut(id.slot as usize) {
            Some(Slot::Occupied { generation, member }) if *generation == id.generation => {
                Ok(member)
            }
            _ => Err(ExecutorError::invalid_handle(id)),
        }
    }

    /// Destroy a member, returning it. The id becomes invalid.
    pub fn free(&mut self, id: WorkingSetId) -> ExecutorResult<WorkingSetMember> {
        if !self.contains(id) {
            return Err(ExecutorError::invalid_handle(id));
        }
        let vacant = Slot::Vacant {
            generation: id.generation.wrapping_add(1),
        };
        match std::mem::replace(&mut self.slots[id.slot as usize], vacant) {
            Slot::Occupied { member, .. } => {
                self.free_slots.push(id.slot);
                self.live -= 1;
                Ok(member)
            }
            Slot::Vacant { .. } => Err(ExecutorError::invalid_handle(id)),
        }
    }
}
