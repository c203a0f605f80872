// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use rustc_hash::FxHashMap;

use crate::body::ObjectId;
use crate::error::PhysicsError;

/// One body's slot in the union-find array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IslandElement {
    /// Body the slot stands for.
    pub body: ObjectId,
    /// Parent slot while merging; island id once sorted.
    pub island_id: usize,
    /// The body touches a static or sleeping body.
    pub linked_to_static: bool,
}

/// Flat-array union-find over the active bodies of one step.
///
/// Merging only redirects the root of one tree to the other; paths are not
/// compressed. [`IslandContainer::retrieve_sorted_island_elements`]
/// resolves every element to its root once and sorts by island, after which
/// the container refuses further merges until the next reset.
#[derive(Debug, Default)]
pub struct IslandContainer {
    elements: Vec<IslandElement>,
    slots: FxHashMap<ObjectId, usize>,
    sorted: bool,
}

impl IslandContainer {
    /// Empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts every body of `bodies` in its own singleton island.
    pub fn reset(&mut self, bodies: impl IntoIterator<Item = ObjectId>) {
        self.elements.clear();
        self.slots.clear();
        for (slot, body) in bodies.into_iter().enumerate() {
            self.elements.push(IslandElement {
                body,
                island_id: slot,
                linked_to_static: false,
            });
            self.slots.insert(body, slot);
        }
        self.sorted = false;
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// `true` when the container holds no element.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// `true` if `body` took part in the last reset.
    pub fn contains(&self, body: ObjectId) -> bool {
        self.slots.contains_key(&body)
    }

    fn find(&self, mut slot: usize) -> usize {
        while self.elements[slot].island_id != slot {
            slot = self.elements[slot].island_id;
        }
        slot
    }

    /// Root slot of the island holding `body`, before sorting.
    pub fn root(&self, body: ObjectId) -> Option<usize> {
        if self.sorted {
            return None;
        }
        self.slots.get(&body).map(|&slot| self.find(slot))
    }

    /// Joins the islands of `a` and `b`.
    ///
    /// Bodies outside the container are ignored.
    pub fn merge(&mut self, a: ObjectId, b: ObjectId) -> Result<(), PhysicsError> {
        if self.sorted {
            return Err(PhysicsError::IslandsSorted);
        }
        let (Some(&slot_a), Some(&slot_b)) = (self.slots.get(&a), self.slots.get(&b)) else {
            return Ok(());
        };
        let (root_a, root_b) = (self.find(slot_a), self.find(slot_b));
        if root_a != root_b {
            self.elements[root_a].island_id = root_b;
        }
        Ok(())
    }

    /// Marks the island of `body` as resting on something static.
    pub fn link_to_static(&mut self, body: ObjectId) -> Result<(), PhysicsError> {
        if self.sorted {
            return Err(PhysicsError::IslandsSorted);
        }
        if let Some(&slot) = self.slots.get(&body) {
            self.elements[slot].linked_to_static = true;
        }
        Ok(())
    }

    /// Elements grouped by island: every `island_id` is the final root and
    /// equal ids are adjacent.
    pub fn retrieve_sorted_island_elements(&mut self) -> &[IslandElement] {
        if !self.sorted {
            let roots: Vec<usize> = (0..self.elements.len()).map(|slot| self.find(slot)).collect();
            for (element, root) in self.elements.iter_mut().zip(roots) {
                element.island_id = root;
            }
            self.elements.sort_by_key(|e| e.island_id);
            self.sorted = true;
        }
        &self.elements
    }
}
