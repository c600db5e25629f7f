//! Authoritative ordered list of items
//!
//! The store is the single source of truth for display order; the view is a
//! projection of it. Every structural change goes through the operations
//! below, each of which takes the store lock once, so logical order is always
//! consistent even while visual transitions are still running.
//!
//! Lock order: the store lock may be held while reading an item's attributes,
//! never the other way around.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::TodoError;
use crate::event::Direction;
use crate::item::{Item, ItemController, ItemId};
use crate::sync::lock;

/// Result of a move request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The item now sits at `to`
    Moved { from: usize, to: usize },
    /// Swap past either end of the list; nothing changed
    Boundary,
    /// The item (or the drop target) no longer exists
    Stale,
    /// The requested position is the current one
    Unchanged,
}

impl MoveOutcome {
    pub fn is_moved(self) -> bool {
        matches!(self, MoveOutcome::Moved { .. })
    }
}

/// Ordered sequence of live items.
#[derive(Default)]
pub struct ListStore {
    order: Mutex<Vec<Arc<ItemController>>>,
}

impl fmt::Debug for ListStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListStore")
            .field("keys", &self.keys())
            .finish()
    }
}

fn position_of(order: &[Arc<ItemController>], key: &str) -> Option<usize> {
    order.iter().position(|item| item.is_live() && item.key() == key)
}

fn holds_live_key(order: &[Arc<ItemController>], key: &str, except: Option<ItemId>) -> bool {
    order
        .iter()
        .any(|item| Some(item.id()) != except && item.is_live() && item.key() == key)
}

impl ListStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items in display order
    pub fn snapshot(&self) -> Vec<Item> {
        lock(&self.order).iter().map(|item| item.snapshot()).collect()
    }

    /// Keys in display order
    pub fn keys(&self) -> Vec<String> {
        lock(&self.order).iter().map(|item| item.key()).collect()
    }

    pub fn find(&self, key: &str) -> Option<Item> {
        self.controller(key).map(|item| item.snapshot())
    }

    /// Controller of the live item holding `key`
    pub fn controller(&self, key: &str) -> Option<Arc<ItemController>> {
        let order = lock(&self.order);
        position_of(&order, key).map(|idx| order[idx].clone())
    }

    /// All controllers in display order
    pub fn controllers(&self) -> Vec<Arc<ItemController>> {
        lock(&self.order).clone()
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        position_of(&lock(&self.order), key)
    }

    /// Returns true if a Live or Connecting item holds `key`
    pub fn contains(&self, key: &str) -> bool {
        holds_live_key(&lock(&self.order), key, None)
    }

    pub fn len(&self) -> usize {
        lock(&self.order).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.order).is_empty()
    }

    /// Append an item
    ///
    /// # Errors
    ///
    /// [`TodoError::DuplicateKey`] if a Live or Connecting item holds the key.
    pub fn insert_at_end(&self, item: Arc<ItemController>) -> Result<usize, TodoError> {
        let mut order = lock(&self.order);
        Self::check_insert(&order, &item)?;
        order.push(item);
        Ok(order.len() - 1)
    }

    /// Insert an item before the one holding `before_key`, or at the end when
    /// no such item exists.
    ///
    /// # Errors
    ///
    /// [`TodoError::DuplicateKey`] if a Live or Connecting item holds the key.
    pub fn insert_before(
        &self,
        item: Arc<ItemController>,
        before_key: &str,
    ) -> Result<usize, TodoError> {
        let mut order = lock(&self.order);
        Self::check_insert(&order, &item)?;
        let idx = position_of(&order, before_key).unwrap_or(order.len());
        order.insert(idx, item);
        Ok(idx)
    }

    fn check_insert(order: &[Arc<ItemController>], item: &ItemController) -> Result<(), TodoError> {
        let key = item.key();
        if order.iter().any(|other| other.id() == item.id()) || holds_live_key(order, &key, None) {
            return Err(TodoError::duplicate(key));
        }
        Ok(())
    }

    /// Key of the neighbour a swap in `direction` would exchange with
    ///
    /// `None` at the list boundary or when `key` is gone.
    pub fn swap_partner(&self, key: &str, direction: Direction) -> Option<String> {
        let order = lock(&self.order);
        let idx = position_of(&order, key)?;
        let partner = match direction {
            Direction::Up => idx.checked_sub(1)?,
            Direction::Down => idx + 1,
        };
        order.get(partner).map(|item| item.key())
    }

    /// Exchange the item with its neighbour in `direction`
    ///
    /// The position is looked up by key at call time, never cached.
    pub fn move_by_swap(&self, key: &str, direction: Direction) -> MoveOutcome {
        let mut order = lock(&self.order);
        let Some(idx) = position_of(&order, key) else {
            return MoveOutcome::Stale;
        };
        let target = match direction {
            Direction::Up if idx == 0 => return MoveOutcome::Boundary,
            Direction::Down if idx + 1 >= order.len() => return MoveOutcome::Boundary,
            Direction::Up => idx - 1,
            Direction::Down => idx + 1,
        };
        order.swap(idx, target);
        debug!(key, from = idx, to = target, "swap");
        MoveOutcome::Moved {
            from: idx,
            to: target,
        }
    }

    /// Reposition `key` immediately before `target_key`
    pub fn move_before(&self, key: &str, target_key: &str) -> MoveOutcome {
        if key == target_key {
            return MoveOutcome::Unchanged;
        }
        let mut order = lock(&self.order);
        let (Some(from), Some(_)) = (position_of(&order, key), position_of(&order, target_key))
        else {
            return MoveOutcome::Stale;
        };
        let item = order.remove(from);
        let to = position_of(&order, target_key).unwrap_or(order.len());
        order.insert(to, item);
        if from == to {
            return MoveOutcome::Unchanged;
        }
        debug!(key, before = target_key, from, to, "reposition");
        MoveOutcome::Moved { from, to }
    }

    /// Drop the live item holding `key` from the logical order
    pub fn remove(&self, key: &str) -> Option<Arc<ItemController>> {
        let mut order = lock(&self.order);
        let idx = position_of(&order, key)?;
        Some(order.remove(idx))
    }

    /// Drop a specific item, whatever its current key
    pub fn remove_id(&self, id: ItemId) -> Option<Arc<ItemController>> {
        let mut order = lock(&self.order);
        let idx = order.iter().position(|item| item.id() == id)?;
        Some(order.remove(idx))
    }

    /// Check that `item` may take the key `after`
    ///
    /// # Errors
    ///
    /// [`TodoError::DuplicateKey`] if any other Live or Connecting item holds `after`.
    pub fn check_rename(&self, item: ItemId, after: &str) -> Result<(), TodoError> {
        if holds_live_key(&lock(&self.order), after, Some(item)) {
            return Err(TodoError::duplicate(after));
        }
        Ok(())
    }

    /// Empty the store, returning the items that were in it
    pub fn clear(&self) -> Vec<Arc<ItemController>> {
        std::mem::take(&mut *lock(&self.order))
    }
}
