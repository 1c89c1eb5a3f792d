use crate::{index::Element, tree::FrozenCursor};

///
/// SnapshotIterator
///
/// Consistent full scan yielding encoded record payloads in index order.
///

pub trait SnapshotIterator {
    /// Payload of the next record, `None` once exhausted.
    fn next(&mut self) -> Option<&[u8]>;
}

///
/// TreeSnapshotIterator
///
/// Reads the tree as it was when the snapshot was taken; later inserts
/// and deletes are invisible to it.
///

pub struct TreeSnapshotIterator<E: Element> {
    cursor: FrozenCursor<E>,
}

impl<E: Element> TreeSnapshotIterator<E> {
    pub(crate) const fn new(cursor: FrozenCursor<E>) -> Self {
        Self { cursor }
    }
}

impl<E: Element> SnapshotIterator for TreeSnapshotIterator<E> {
    fn next(&mut self) -> Option<&[u8]> {
        self.cursor.advance().map(|e| e.tuple().data())
    }
}
