//! Module: tree
//! Responsibility: ordered element container with cursors and frozen views.
//! Does not own: duplicate policy, fan-out or iteration semantics.
//!
//! Elements live in ordered blocks of bounded capacity. Blocks are shared
//! through `Rc` and copied on first write, which is what lets a frozen
//! cursor keep reading a stable view while the tree keeps changing. Copies
//! are charged to the quota like any other allocation.

mod block;
mod cursor;
mod quota;

pub use block::Block;
pub use cursor::{Cursor, FrozenCursor};
pub use quota::MemoryQuota;

use crate::{
    error::InternalError,
    index::{Element, KeyData},
    key::KeyDef,
};
use std::{cell::Cell, cmp::Ordering, mem, rc::Rc};

const ALLOCATOR: &str = "tree";

///
/// Tree
///
/// Blocks sit in one flat vector searched by their last element, so a
/// lookup is two binary searches. A split or an emptied block shifts the
/// block handles after it: that move is one pointer per block, which keeps
/// it cheap next to the element shifts inside a block until an index
/// reaches millions of blocks.
///

pub struct Tree<E: Element> {
    blocks: Vec<Rc<Block<E>>>,
    len: usize,
    block_capacity: usize,
    arg: Rc<KeyDef>,
    quota: MemoryQuota,
    copies: Rc<Cell<usize>>,
}

impl<E: Element> Tree<E> {
    #[must_use]
    pub fn new(arg: Rc<KeyDef>, block_capacity: usize, quota: MemoryQuota) -> Self {
        Self {
            blocks: Vec::new(),
            len: 0,
            block_capacity: block_capacity.max(2),
            arg,
            quota,
            copies: Rc::new(Cell::new(0)),
        }
    }

    /// Comparator definition the tree is ordered by.
    #[must_use]
    pub fn arg(&self) -> &Rc<KeyDef> {
        &self.arg
    }

    pub(crate) fn set_arg(&mut self, arg: Rc<KeyDef>) {
        self.arg = arg;
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes charged to the quota for stored elements.
    #[must_use]
    pub const fn mem_used(&self) -> usize {
        self.len * mem::size_of::<E>()
    }

    /// Bytes charged for block copies that frozen views still hold.
    #[must_use]
    pub fn copied_bytes(&self) -> usize {
        self.copies.get()
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// First element not less than `key`; exact when it equals `key`.
    #[must_use]
    pub fn lower_bound(&self, key: &KeyData<'_>) -> (Cursor, bool) {
        let arg = &*self.arg;
        let cursor = self.partition(|e| e.compare_key(key, arg).is_lt());
        let exact = self
            .get(&cursor)
            .is_some_and(|e| e.compare_key(key, arg).is_eq());

        (cursor, exact)
    }

    /// First element greater than `key`; exact when the element before
    /// it equals `key`.
    #[must_use]
    pub fn upper_bound(&self, key: &KeyData<'_>) -> (Cursor, bool) {
        let arg = &*self.arg;
        let cursor = self.partition(|e| e.compare_key(key, arg).is_le());
        let exact = self
            .before(&cursor)
            .is_some_and(|e| e.compare_key(key, arg).is_eq());

        (cursor, exact)
    }

    #[must_use]
    pub fn lower_bound_elem(&self, elem: &E) -> Cursor {
        let arg = &*self.arg;
        self.partition(|e| e.compare(elem, arg).is_lt())
    }

    #[must_use]
    pub fn upper_bound_elem(&self, elem: &E) -> Cursor {
        let arg = &*self.arg;
        self.partition(|e| e.compare(elem, arg).is_le())
    }

    /// Element equal to `key`, if any.
    #[must_use]
    pub fn find(&self, key: &KeyData<'_>) -> Option<&E> {
        let (cursor, exact) = self.lower_bound(key);
        if exact { self.get(&cursor) } else { None }
    }

    // first position whose element does not satisfy `before`
    fn partition(&self, mut before: impl FnMut(&E) -> bool) -> Cursor {
        let block = self
            .blocks
            .partition_point(|blk| blk.last().is_some_and(&mut before));
        let Some(blk) = self.blocks.get(block) else {
            return Cursor::INVALID;
        };
        let slot = blk.partition_point(before);

        Cursor(Some((block, slot)))
    }

    fn before(&self, cursor: &Cursor) -> Option<&E> {
        match cursor.0 {
            None => self.blocks.last()?.last(),
            Some((block, 0)) => self.blocks.get(block.checked_sub(1)?)?.last(),
            Some((block, slot)) => self.blocks.get(block)?.get(slot - 1),
        }
    }

    // ------------------------------------------------------------------
    // Cursors
    // ------------------------------------------------------------------

    #[must_use]
    pub fn first(&self) -> Cursor {
        if self.is_empty() {
            Cursor::INVALID
        } else {
            Cursor(Some((0, 0)))
        }
    }

    #[must_use]
    pub fn last(&self) -> Cursor {
        self.blocks
            .len()
            .checked_sub(1)
            .and_then(|block| {
                let slot = self.blocks[block].len().checked_sub(1)?;
                Some(Cursor(Some((block, slot))))
            })
            .unwrap_or(Cursor::INVALID)
    }

    /// Step right. A past-the-end cursor moves to the first element.
    pub fn next(&self, cursor: &mut Cursor) {
        *cursor = match cursor.0 {
            None => self.first(),
            Some((block, slot)) => {
                let len = self.blocks.get(block).map_or(0, |blk| blk.len());
                if slot + 1 < len {
                    Cursor(Some((block, slot + 1)))
                } else if block + 1 < self.blocks.len() {
                    Cursor(Some((block + 1, 0)))
                } else {
                    Cursor::INVALID
                }
            }
        };
    }

    /// Step left. A past-the-end cursor moves to the last element.
    pub fn prev(&self, cursor: &mut Cursor) {
        *cursor = match cursor.0 {
            Some((block, slot)) if block < self.blocks.len() => {
                if slot > 0 {
                    Cursor(Some((block, (slot - 1).min(self.blocks[block].len() - 1))))
                } else if let Some(prev) = block.checked_sub(1) {
                    Cursor(Some((prev, self.blocks[prev].len() - 1)))
                } else {
                    Cursor::INVALID
                }
            }
            _ => self.last(),
        };
    }

    /// Element under `cursor`, `None` when past-the-end or stale.
    #[must_use]
    pub fn get(&self, cursor: &Cursor) -> Option<&E> {
        let (block, slot) = cursor.0?;
        self.blocks.get(block)?.get(slot)
    }

    /// Element at `rnd` modulo the tree size.
    #[must_use]
    pub fn random(&self, rnd: u64) -> Option<&E> {
        if self.is_empty() {
            return None;
        }

        let mut offset = usize::try_from(rnd % self.len as u64).ok()?;
        for blk in &self.blocks {
            if offset < blk.len() {
                return blk.get(offset);
            }
            offset -= blk.len();
        }

        None
    }

    /// Elements in order.
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.blocks.iter().flat_map(|blk| blk.iter())
    }

    /// Read-only view of the current contents, starting at the first
    /// element.
    #[must_use]
    pub fn freeze(&self) -> FrozenCursor<E> {
        FrozenCursor::new(self.blocks.clone())
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Insert `elem`. An order-equal element already present is replaced
    /// in place and returned; otherwise the element size is charged to
    /// the quota. A block still shared with a frozen view is copied first
    /// and the copy is charged too. A refused charge leaves the tree
    /// untouched.
    pub fn insert(&mut self, elem: E) -> Result<Option<E>, InternalError> {
        self.place(elem, Some("insert"))
    }

    /// Put back an element removed or displaced earlier in the same
    /// operation. Never fails.
    pub(crate) fn restore(&mut self, elem: E) -> Option<E> {
        self.place(elem, None).ok().flatten()
    }

    /// Remove the element order-equal to `elem`.
    pub fn delete(&mut self, elem: &E) -> Option<E> {
        self.delete_unless(elem, |_| false)
    }

    /// Remove the element order-equal to `elem` unless `keep` holds for it.
    pub(crate) fn delete_unless(&mut self, elem: &E, keep: impl Fn(&E) -> bool) -> Option<E> {
        let cursor = self.lower_bound_elem(elem);
        let arg = &*self.arg;
        self.get(&cursor)
            .filter(|e| e.compare(elem, arg) == Ordering::Equal && !keep(*e))?;

        self.remove_at(cursor)
    }

    /// Remove the element built from the same record (and position) as
    /// `elem`, skipping order-equal elements of other records.
    pub fn delete_identical(&mut self, elem: &E) -> Option<E> {
        let arg = Rc::clone(&self.arg);
        let mut cursor = self.lower_bound_elem(elem);
        loop {
            let candidate = self.get(&cursor)?;
            if candidate.compare(elem, &arg) != Ordering::Equal {
                return None;
            }
            if candidate.identical(elem) {
                return self.remove_at(cursor);
            }
            self.next(&mut cursor);
        }
    }

    /// Bulk-load an empty tree from elements already sorted by `arg`.
    pub fn build(&mut self, sorted: Vec<E>) -> Result<(), InternalError> {
        if !self.is_empty() {
            return Err(InternalError::index_invariant(
                "bulk build requires an empty tree",
            ));
        }

        let count = sorted.len();
        let size = count.saturating_mul(mem::size_of::<E>());
        self.quota.charge(size, ALLOCATOR, "build")?;

        let mut elems = sorted.into_iter();
        loop {
            let block: Vec<E> = elems.by_ref().take(self.block_capacity).collect();
            if block.is_empty() {
                break;
            }
            self.blocks.push(Rc::new(Block::new(block)));
        }
        self.len = count;

        Ok(())
    }

    /// Detach every block, leaving the tree empty. The caller takes over
    /// the returned quota charge.
    pub(crate) fn take_all(&mut self) -> (Vec<Rc<Block<E>>>, usize) {
        let charged = self.mem_used();
        self.len = 0;

        (mem::take(&mut self.blocks), charged)
    }

    pub(crate) fn quota(&self) -> &MemoryQuota {
        &self.quota
    }

    // Charge for `elem` and any block copy it forces, then store it.
    // `op` names the operation for a refused charge; `None` charges
    // past the limit.
    fn place(&mut self, elem: E, op: Option<&'static str>) -> Result<Option<E>, InternalError> {
        let cursor = self.lower_bound_elem(&elem);
        let displaces = self
            .get(&cursor)
            .is_some_and(|e| e.compare(&elem, &self.arg) == Ordering::Equal);
        let grow = if displaces { 0 } else { mem::size_of::<E>() };
        let size = self
            .target_block(&cursor)
            .map_or(0, |block| self.copy_cost(block))
            .saturating_add(grow);

        match op {
            Some(op) => self.quota.charge(size, ALLOCATOR, op)?,
            None => self.quota.force_charge(size),
        }

        if displaces {
            Ok(self.replace_at(cursor, elem))
        } else {
            self.insert_at(cursor, elem);
            Ok(None)
        }
    }

    // block an insert at `cursor` writes to
    fn target_block(&self, cursor: &Cursor) -> Option<usize> {
        cursor
            .0
            .map(|(block, _)| block)
            .or_else(|| self.blocks.len().checked_sub(1))
    }

    // bytes a write to `block` copies, zero when the tree owns it alone
    fn copy_cost(&self, block: usize) -> usize {
        self.blocks
            .get(block)
            .filter(|blk| Rc::strong_count(*blk) > 1)
            .map_or(0, |blk| blk.len() * mem::size_of::<E>())
    }

    // Swap a shared block for a private copy. The caller has charged
    // `copy_cost` for it; the block left to the readers carries that
    // charge from here on.
    fn unshare(&mut self, block: usize) -> &mut Vec<E> {
        if let Some(shared) = self.blocks.get(block).filter(|blk| Rc::strong_count(*blk) > 1) {
            let bytes = shared.len() * mem::size_of::<E>();
            shared.hold_copy(bytes, &self.quota, &self.copies);
            let copy = Rc::new((**shared).clone());
            self.blocks[block] = copy;
        }

        Rc::make_mut(&mut self.blocks[block]).elems_mut()
    }

    fn replace_at(&mut self, cursor: Cursor, elem: E) -> Option<E> {
        let (block, slot) = cursor.0?;
        let target = self.unshare(block).get_mut(slot)?;

        Some(mem::replace(target, elem))
    }

    fn insert_at(&mut self, cursor: Cursor, elem: E) {
        let Some(block) = self.target_block(&cursor) else {
            self.blocks.push(Rc::new(Block::new(vec![elem])));
            self.len += 1;
            return;
        };
        let slot = match cursor.0 {
            Some((_, slot)) => slot,
            None => self.blocks[block].len(),
        };

        let capacity = self.block_capacity;
        let blk = self.unshare(block);
        blk.insert(slot, elem);
        let tail = (blk.len() > capacity).then(|| blk.split_off(blk.len() / 2));
        if let Some(tail) = tail {
            self.blocks.insert(block + 1, Rc::new(Block::new(tail)));
        }
        self.len += 1;
    }

    fn remove_at(&mut self, cursor: Cursor) -> Option<E> {
        let (block, slot) = cursor.0?;
        if slot >= self.blocks.get(block)?.len() {
            return None;
        }

        self.quota.force_charge(self.copy_cost(block));
        let blk = self.unshare(block);
        let elem = blk.remove(slot);
        let emptied = blk.is_empty();
        self.len -= 1;
        self.quota.release(mem::size_of::<E>());

        if emptied {
            self.blocks.remove(block);
        } else {
            self.merge_with_next(block);
        }

        Some(elem)
    }

    // fold a sparse block into its right neighbour
    fn merge_with_next(&mut self, block: usize) {
        let Some(next) = self.blocks.get(block + 1) else {
            return;
        };
        if self.blocks[block].len() + next.len() > self.block_capacity / 2 {
            return;
        }

        let next = self.blocks.remove(block + 1);
        let elems = match Rc::try_unwrap(next) {
            Ok(next) => next.into_elems(),
            Err(shared) => {
                let bytes = shared.len() * mem::size_of::<E>();
                self.quota.force_charge(bytes);
                shared.hold_copy(bytes, &self.quota, &self.copies);
                shared.to_vec()
            }
        };

        self.quota.force_charge(self.copy_cost(block));
        self.unshare(block).extend(elems);
    }
}

impl<E: Element> Drop for Tree<E> {
    fn drop(&mut self) {
        self.quota.release(self.mem_used());
    }
}

///
/// TESTS
///
