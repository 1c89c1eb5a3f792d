//! Module: index::tree_index
//! Responsibility: the generic tree index engine over one element shape.
//! Does not own: element comparison (see `element`) or iteration state
//! (see `iterator`).

use crate::{
    config::TreeConfig,
    error::InternalError,
    gc::{GcTask, ReclaimTask},
    index::{
        DupReplaceMode, Element, Index, IndexDef, IteratorType, SnapshotIterator, TreeIterator,
        TreeSnapshotIterator, check_dup,
    },
    obs::sink::{MetricsEvent, record},
    tree::{MemoryQuota, Tree},
    tuple::Tuple,
    value::Value,
};
use std::{cell::RefCell, cmp::Ordering, mem, rc::Rc};

const ALLOCATOR: &str = "tree_index";

///
/// TreeIndex
///
/// One index stored in a shared tree. Iterators hold their own handle on
/// the tree, so they outlive mutations and even the index itself.
///

pub struct TreeIndex<E: Element> {
    def: IndexDef,
    tree: Rc<RefCell<Tree<E>>>,
    build_array: Vec<E>,
    build_extent: usize,
    debug: bool,
}

impl<E: Element> TreeIndex<E> {
    #[must_use]
    pub fn new(def: IndexDef, config: &TreeConfig, quota: MemoryQuota) -> Self {
        let elem_size = mem::size_of::<E>();
        let tree = Tree::new(
            Rc::clone(def.active_def()),
            config.block_capacity(elem_size),
            quota,
        );

        Self {
            def,
            tree: Rc::new(RefCell::new(tree)),
            build_array: Vec::new(),
            build_extent: config.build_extent_capacity(elem_size),
            debug: config.debug,
        }
    }

    fn debug_log(&self, s: impl Into<String>) {
        if self.debug {
            println!("[debug] {}", s.into());
        }
    }

    // Undo the entries placed so far, newest first.
    fn rollback(&self, tree: &mut Tree<E>, log: Vec<(E, Option<E>)>) {
        let entries = log.len() as u64;
        for (elem, displaced) in log.into_iter().rev() {
            match displaced {
                Some(displaced) => {
                    tree.restore(displaced);
                }
                None => {
                    tree.delete_identical(&elem);
                }
            }
        }

        record(MetricsEvent::Rollback {
            index: &self.def.name,
            entries,
        });
        self.debug_log(format!(
            "index '{}': rolled back {entries} entries",
            self.def.name
        ));
    }

    fn first_of(&self, ty: IteratorType, key: &[Value]) -> Result<Option<Tuple>, InternalError> {
        Ok(self.create_iterator(ty, key)?.next())
    }

    fn grow_build_array(&mut self) -> Result<(), InternalError> {
        let capacity = self.build_array.capacity();
        let target = if capacity == 0 {
            self.build_extent
        } else {
            (capacity + capacity / 2).max(capacity + 1)
        };

        self.build_array
            .try_reserve_exact(target - self.build_array.len())
            .map_err(|_| {
                InternalError::out_of_memory(
                    target.saturating_mul(mem::size_of::<E>()),
                    ALLOCATOR,
                    "build_next",
                )
            })
    }
}

impl<E: Element> Index for TreeIndex<E> {
    fn def(&self) -> &IndexDef {
        &self.def
    }

    fn update_def(&mut self, def: IndexDef) -> Result<(), InternalError> {
        if def.key_def.is_multikey() != self.def.key_def.is_multikey() {
            return Err(InternalError::index_unsupported(format!(
                "index '{}' cannot change between multikey and single-entry layouts",
                self.def.name
            )));
        }

        self.tree
            .borrow_mut()
            .set_arg(Rc::clone(def.active_def()));
        self.def = def;

        Ok(())
    }

    fn size(&self) -> usize {
        self.tree.borrow().len()
    }

    fn bsize(&self) -> usize {
        let tree = self.tree.borrow();

        tree.mem_used() + tree.copied_bytes()
    }

    fn random(&self, rnd: u64) -> Option<Tuple> {
        self.tree.borrow().random(rnd).map(|e| e.tuple().clone())
    }

    fn min(&self, key: &[Value]) -> Result<Option<Tuple>, InternalError> {
        self.first_of(IteratorType::Eq, key)
    }

    fn max(&self, key: &[Value]) -> Result<Option<Tuple>, InternalError> {
        self.first_of(IteratorType::Req, key)
    }

    fn count(&self, ty: IteratorType, key: &[Value]) -> Result<usize, InternalError> {
        if ty == IteratorType::All {
            return Ok(self.size());
        }

        Ok(self.create_iterator(ty, key)?.count())
    }

    fn get(&self, key: &[Value]) -> Result<Option<Tuple>, InternalError> {
        if !self.def.unique {
            return Err(InternalError::index_unsupported(format!(
                "get() requires a unique index, '{}' is not unique",
                self.def.name
            )));
        }

        let key_def = &self.def.key_def;
        key_def.validate_key(key, &self.def.name)?;
        if key.len() != key_def.part_count() {
            return Err(InternalError::key_part_count(
                &self.def.name,
                key_def.part_count(),
                key.len(),
            ));
        }

        let tree = self.tree.borrow();
        let key_data = E::key_data(key, tree.arg());

        Ok(tree.find(&key_data).map(|e| e.tuple().clone()))
    }

    fn replace(
        &mut self,
        old: Option<&Tuple>,
        new: Option<&Tuple>,
        mode: DupReplaceMode,
    ) -> Result<Option<Tuple>, InternalError> {
        let tree_rc = Rc::clone(&self.tree);
        let mut tree = tree_rc.borrow_mut();
        let cmp_def = Rc::clone(tree.arg());

        let mut dup: Option<Tuple> = None;
        let mut inserts = 0u64;
        let mut removes = 0u64;

        // Phase 1: place every entry of the new record, checking each
        // displaced entry against the policy.
        if let Some(new) = new {
            self.def.key_def.validate_tuple(new, &self.def.name)?;

            let count = E::fan_out(new, &cmp_def);
            let mut log: Vec<(E, Option<E>)> = Vec::with_capacity(count as usize);

            for pos in 0..count {
                let elem = E::new(new.clone(), &cmp_def, pos);
                let displaced = match tree.insert(elem.clone()) {
                    Ok(displaced) => displaced,
                    Err(err) => {
                        record(MetricsEvent::OutOfMemory {
                            index: &self.def.name,
                        });
                        self.rollback(&mut tree, log);
                        return Err(err);
                    }
                };
                let displaced_tuple = displaced.as_ref().map(|d| d.tuple().clone());
                log.push((elem, displaced));

                // an earlier position of the same record
                if displaced_tuple.as_ref().is_some_and(|t| t.same(new)) {
                    continue;
                }
                inserts += 1;

                let checked = match (&displaced_tuple, &dup) {
                    (Some(t), Some(prev)) if !prev.same(t) => Err(InternalError::index_violation(
                        &self.def.name,
                        &self.def.space_name,
                    )),
                    (Some(t), _) => check_dup(&self.def, old, Some(t), mode),
                    (None, _) if pos == 0 => check_dup(&self.def, old, None, mode),
                    (None, _) => Ok(()),
                };
                if let Err(err) = checked {
                    if err.is_unique_violation() {
                        record(MetricsEvent::UniqueViolation {
                            index: &self.def.name,
                        });
                    }
                    self.rollback(&mut tree, log);
                    return Err(err);
                }

                if displaced_tuple.is_some() {
                    removes += 1;
                    dup = displaced_tuple;
                }
            }
        }

        // Phase 2: the displaced record, or the old one, leaves the index
        // entirely. Entries of the displaced record are matched by
        // identity; the old record is matched by order, so an equal copy
        // of the stored record removes it. Entries of `new` always stay.
        let by_identity = dup.is_some();
        let removed = dup.or_else(|| old.cloned());
        if let Some(removed) = &removed
            && !new.is_some_and(|new| new.same(removed))
        {
            let placed = |e: &E| new.is_some_and(|new| e.tuple().same(new));
            for pos in 0..E::fan_out(removed, &cmp_def) {
                let elem = E::new(removed.clone(), &cmp_def, pos);
                let gone = if by_identity {
                    tree.delete_identical(&elem)
                } else {
                    tree.delete_unless(&elem, &placed)
                };
                if gone.is_some() {
                    removes += 1;
                }
            }
        }

        record(MetricsEvent::Replace {
            index: &self.def.name,
            inserts,
            removes,
        });

        Ok(removed)
    }

    fn create_iterator(
        &self,
        ty: IteratorType,
        key: &[Value],
    ) -> Result<Box<dyn Iterator<Item = Tuple>>, InternalError> {
        if !ty.is_tree_supported() {
            return Err(InternalError::unsupported_iterator(
                &self.def.name,
                ty.code(),
            ));
        }
        self.def.key_def.validate_key(key, &self.def.name)?;

        Ok(Box::new(TreeIterator::new(
            Rc::clone(&self.tree),
            Rc::clone(&self.def.key_def),
            self.def.name.clone(),
            ty,
            key.to_vec(),
        )))
    }

    fn create_snapshot_iterator(&self) -> Box<dyn SnapshotIterator> {
        Box::new(TreeSnapshotIterator::new(self.tree.borrow().freeze()))
    }

    fn begin_build(&mut self) -> Result<(), InternalError> {
        if !self.tree.borrow().is_empty() {
            return Err(InternalError::index_invariant(format!(
                "index '{}' must be empty before a bulk build",
                self.def.name
            )));
        }
        self.build_array = Vec::new();

        Ok(())
    }

    fn reserve(&mut self, size_hint: usize) -> Result<(), InternalError> {
        let additional = size_hint.saturating_sub(self.build_array.len());

        self.build_array
            .try_reserve_exact(additional)
            .map_err(|_| {
                InternalError::out_of_memory(
                    size_hint.saturating_mul(mem::size_of::<E>()),
                    ALLOCATOR,
                    "reserve",
                )
            })
    }

    fn build_next(&mut self, tuple: &Tuple) -> Result<(), InternalError> {
        self.def.key_def.validate_tuple(tuple, &self.def.name)?;

        let cmp_def = Rc::clone(self.tree.borrow().arg());
        for pos in 0..E::fan_out(tuple, &cmp_def) {
            if self.build_array.len() == self.build_array.capacity() {
                self.grow_build_array()?;
            }
            self.build_array
                .push(E::new(tuple.clone(), &cmp_def, pos));
        }

        Ok(())
    }

    fn end_build(&mut self) -> Result<(), InternalError> {
        let mut tree = self.tree.borrow_mut();
        let cmp_def = Rc::clone(tree.arg());
        let mut elems = mem::take(&mut self.build_array);

        // Phase 1: sort, keeping the last entry among equal entries of
        // one record.
        elems.sort_by(|a, b| a.compare(b, &cmp_def));
        let mut conflict = false;
        elems.dedup_by(|later, kept| {
            if later.compare(kept, &cmp_def) != Ordering::Equal {
                return false;
            }
            if later.tuple().same(kept.tuple()) {
                mem::swap(later, kept);
                return true;
            }
            conflict = true;
            false
        });
        if conflict {
            record(MetricsEvent::UniqueViolation {
                index: &self.def.name,
            });
            return Err(InternalError::index_violation(
                &self.def.name,
                &self.def.space_name,
            ));
        }

        // Phase 2: bulk load.
        let entries = elems.len() as u64;
        tree.build(elems)?;
        drop(tree);

        record(MetricsEvent::Build {
            index: &self.def.name,
            entries,
        });
        self.debug_log(format!(
            "index '{}' ({}): built {entries} entries",
            self.def.name,
            E::NAME
        ));

        Ok(())
    }

    fn destroy(self: Box<Self>) -> Option<Box<dyn GcTask>> {
        if !self.def.is_primary() {
            self.debug_log(format!("index '{}': freed", self.def.name));
            return None;
        }

        let (blocks, charged) = self.tree.borrow_mut().take_all();
        let quota = self.tree.borrow().quota().clone();
        self.debug_log(format!(
            "index '{}': {charged} bytes handed to reclaim",
            self.def.name
        ));

        Some(Box::new(ReclaimTask::new(
            self.def.name.clone(),
            blocks,
            charged,
            quota,
        )))
    }
}
