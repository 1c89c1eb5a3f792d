use crate::tree::Block;
use std::rc::Rc;

///
/// Cursor
///
/// Position inside a tree as (block, slot), or past-the-end.
///
/// A cursor is a plain position: it is not updated by later mutations,
/// so holders must re-check the element under it before trusting it.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Cursor(pub(crate) Option<(usize, usize)>);

impl Cursor {
    pub const INVALID: Self = Self(None);

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.0.is_some()
    }
}

///
/// FrozenCursor
///
/// Forward cursor over a read-only view of a tree.
///
/// It shares the tree's blocks at the moment of freezing; writers copy a
/// block before touching it, so the view never changes underneath.
///

pub struct FrozenCursor<E> {
    blocks: Vec<Rc<Block<E>>>,
    block: usize,
    slot: usize,
}

impl<E> FrozenCursor<E> {
    pub(crate) const fn new(blocks: Vec<Rc<Block<E>>>) -> Self {
        Self {
            blocks,
            block: 0,
            slot: 0,
        }
    }

    /// Element under the cursor, then advance.
    pub fn advance(&mut self) -> Option<&E> {
        loop {
            let block = self.blocks.get(self.block)?;
            if self.slot < block.len() {
                let elem = &block[self.slot];
                self.slot += 1;
                return Some(elem);
            }
            self.block += 1;
            self.slot = 0;
        }
    }
}
