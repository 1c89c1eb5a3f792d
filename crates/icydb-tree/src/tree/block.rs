use crate::tree::MemoryQuota;
use std::{
    cell::{Cell, RefCell},
    ops::Deref,
    rc::Rc,
};

///
/// Block
///
/// Ordered run of elements shared between a tree and its frozen views.
///
/// When the tree copies a block that readers still hold, the bytes of the
/// copy ride on the block left behind and go back to the quota once its
/// last reader drops it.
///

pub struct Block<E> {
    elems: Vec<E>,
    copy: RefCell<Option<CopyCharge>>,
}

impl<E> Block<E> {
    pub(crate) fn new(elems: Vec<E>) -> Self {
        Self {
            elems,
            copy: RefCell::new(None),
        }
    }

    pub(crate) fn elems_mut(&mut self) -> &mut Vec<E> {
        &mut self.elems
    }

    pub(crate) fn into_elems(self) -> Vec<E> {
        self.elems
    }

    /// Attach `bytes` already charged to `quota` for a copy of this block.
    pub(crate) fn hold_copy(&self, bytes: usize, quota: &MemoryQuota, pending: &Rc<Cell<usize>>) {
        pending.set(pending.get().saturating_add(bytes));

        let mut copy = self.copy.borrow_mut();
        match copy.as_mut() {
            Some(charge) => charge.bytes = charge.bytes.saturating_add(bytes),
            None => {
                *copy = Some(CopyCharge {
                    bytes,
                    quota: quota.clone(),
                    pending: Rc::clone(pending),
                });
            }
        }
    }

    /// Bytes this block holds on behalf of a copy taken from it.
    #[must_use]
    pub fn copy_bytes(&self) -> usize {
        self.copy.borrow().as_ref().map_or(0, |charge| charge.bytes)
    }
}

impl<E> Deref for Block<E> {
    type Target = [E];

    fn deref(&self) -> &[E] {
        &self.elems
    }
}

// a copy starts out owing nothing
impl<E: Clone> Clone for Block<E> {
    fn clone(&self) -> Self {
        Self::new(self.elems.clone())
    }
}

///
/// CopyCharge
///

struct CopyCharge {
    bytes: usize,
    quota: MemoryQuota,
    pending: Rc<Cell<usize>>,
}

impl Drop for CopyCharge {
    fn drop(&mut self) {
        self.quota.release(self.bytes);
        self.pending.set(self.pending.get().saturating_sub(self.bytes));
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_the_last_reader_returns_the_copy() {
        let quota = MemoryQuota::unlimited();
        let pending = Rc::new(Cell::new(0));
        let shared = Rc::new(Block::new(vec![1u64, 2, 3]));
        let reader = Rc::clone(&shared);

        quota.force_charge(24);
        shared.hold_copy(24, &quota, &pending);
        let copy = (*shared).clone();
        assert_eq!(copy.copy_bytes(), 0);
        assert_eq!(&*copy, &[1, 2, 3]);

        drop(shared);
        assert_eq!(quota.used(), 24);
        assert_eq!(reader.copy_bytes(), 24);

        drop(reader);
        assert_eq!(quota.used(), 0);
        assert_eq!(pending.get(), 0);
    }
}
