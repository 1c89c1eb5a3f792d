//! Module: index::iterator
//! Responsibility: cursor-driven iteration that survives tree mutation.
//! Does not own: operator validation (see `TreeIndex::create_iterator`).
//!
//! The iterator remembers the last element it produced. Before each
//! step it checks that the cursor still sits on that element; when a
//! mutation moved things around it re-seeks from the element itself, so
//! records are neither skipped nor repeated.

use crate::{
    index::{Element, IteratorType, KeyData},
    key::KeyDef,
    obs::sink::{MetricsEvent, record},
    tree::{Cursor, Tree},
    tuple::Tuple,
    value::Value,
};
use std::{cell::RefCell, cmp::Ordering, iter::FusedIterator, rc::Rc};

///
/// State
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    Start,
    Forward,
    Backward,
    ForwardEqual,
    BackwardEqual,
    Done,
}

///
/// TreeIterator
///
/// Lazily positioned on the first call to `next`. While it points at a
/// record it holds exactly one reference to it; once exhausted it holds
/// none and keeps returning `None`.
///

pub struct TreeIterator<E: Element> {
    tree: Rc<RefCell<Tree<E>>>,
    key_def: Rc<KeyDef>,
    index: String,
    ty: IteratorType,
    key: Vec<Value>,
    hint: u64,
    cursor: Cursor,
    current: Option<E>,
    state: State,
}

impl<E: Element> TreeIterator<E> {
    pub(crate) fn new(
        tree: Rc<RefCell<Tree<E>>>,
        key_def: Rc<KeyDef>,
        index: String,
        ty: IteratorType,
        key: Vec<Value>,
    ) -> Self {
        // a zero-part key cannot be matched exactly
        let ty = match ty {
            IteratorType::All | IteratorType::Ge | IteratorType::Le => ty,
            _ if key.is_empty() && ty.is_reverse() => IteratorType::Le,
            _ if key.is_empty() => IteratorType::Ge,
            _ => ty,
        };
        let hint = E::key_data(&key, tree.borrow().arg()).hint;

        Self {
            tree,
            key_def,
            index,
            ty,
            key,
            hint,
            cursor: Cursor::INVALID,
            current: None,
            state: State::Start,
        }
    }

    /// Operator in effect after empty-key widening.
    #[must_use]
    pub const fn iterator_type(&self) -> IteratorType {
        self.ty
    }

    /// Whether the iterator currently holds a record.
    #[must_use]
    pub const fn has_current(&self) -> bool {
        self.current.is_some()
    }

    fn key_data(&self) -> KeyData<'_> {
        KeyData {
            parts: self.key.as_slice(),
            hint: self.hint,
        }
    }

    fn finish(&mut self) -> Option<Tuple> {
        self.state = State::Done;
        self.cursor = Cursor::INVALID;
        self.current = None;

        None
    }

    fn start(&mut self, tree: &Tree<E>) -> Option<Tuple> {
        record(MetricsEvent::IteratorStart { index: &self.index });

        let ty = self.ty;
        let cursor = if self.key.is_empty() {
            if ty.is_reverse() {
                tree.last()
            } else {
                tree.first()
            }
        } else {
            let key = self.key_data();
            let (mut cursor, exact) = match ty {
                IteratorType::All | IteratorType::Eq | IteratorType::Ge | IteratorType::Lt => {
                    tree.lower_bound(&key)
                }
                _ => tree.upper_bound(&key),
            };
            if matches!(ty, IteratorType::Eq | IteratorType::Req) && !exact {
                return self.finish();
            }
            // the bound sits just right of the target; past-the-end
            // steps back onto the last element
            if ty.is_reverse() {
                tree.prev(&mut cursor);
            }
            cursor
        };
        self.cursor = cursor;
        self.state = match ty {
            IteratorType::Eq => State::ForwardEqual,
            IteratorType::Req => State::BackwardEqual,
            IteratorType::All | IteratorType::Ge | IteratorType::Gt => State::Forward,
            IteratorType::Lt | IteratorType::Le => State::Backward,
            _ => return self.finish(),
        };

        self.produce(tree)
    }

    fn step_forward(&mut self, tree: &Tree<E>) -> Option<Tuple> {
        let Some(current) = self.current.as_ref() else {
            return self.finish();
        };

        if tree.get(&self.cursor).is_some_and(|e| e.identical(current)) {
            tree.next(&mut self.cursor);
        } else {
            self.cursor = tree.upper_bound_elem(current);
            record(MetricsEvent::IteratorReseek { index: &self.index });
        }

        self.produce(tree)
    }

    fn step_backward(&mut self, tree: &Tree<E>) -> Option<Tuple> {
        let Some(current) = self.current.as_ref() else {
            return self.finish();
        };

        if !tree.get(&self.cursor).is_some_and(|e| e.identical(current)) {
            self.cursor = tree.lower_bound_elem(current);
            record(MetricsEvent::IteratorReseek { index: &self.index });
        }
        tree.prev(&mut self.cursor);

        self.produce(tree)
    }

    // Take the element under the cursor as the new current one.
    fn produce(&mut self, tree: &Tree<E>) -> Option<Tuple> {
        let Some(elem) = tree.get(&self.cursor) else {
            return self.finish();
        };

        let scoped = matches!(self.state, State::ForwardEqual | State::BackwardEqual);
        if scoped && elem.compare_key(&self.key_data(), &self.key_def) != Ordering::Equal {
            return self.finish();
        }

        let tuple = elem.tuple().clone();
        self.current = Some(elem.clone());

        Some(tuple)
    }
}

impl<E: Element> Iterator for TreeIterator<E> {
    type Item = Tuple;

    fn next(&mut self) -> Option<Tuple> {
        let tree_rc = Rc::clone(&self.tree);
        let tree = tree_rc.borrow();

        match self.state {
            State::Start => self.start(&tree),
            State::Forward | State::ForwardEqual => self.step_forward(&tree),
            State::Backward | State::BackwardEqual => self.step_backward(&tree),
            State::Done => None,
        }
    }
}

impl<E: Element> FusedIterator for TreeIterator<E> {}
