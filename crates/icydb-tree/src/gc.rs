//! Module: gc
//! Responsibility: bounded, resumable release of dropped primary indexes.
//! Does not own: deciding when indexes are dropped.

use crate::{
    config::TreeConfig,
    index::Element,
    obs::sink::{MetricsEvent, record},
    tree::{Block, MemoryQuota},
};
use std::{collections::VecDeque, mem, rc::Rc, vec};

///
/// GcTask
///
/// Unit of deferred work driven by a cooperative scheduler. Dropping a
/// task at any point releases whatever it still holds.
///

pub trait GcTask {
    /// Release up to `batch` entries; `true` once nothing is left.
    fn run(&mut self, batch: usize) -> bool;

    fn name(&self) -> &str;
}

///
/// ReclaimTask
///
/// Owns the blocks of a dropped primary index and releases their record
/// references a batch at a time.
///

pub struct ReclaimTask<E: Element> {
    index: String,
    blocks: vec::IntoIter<Rc<Block<E>>>,
    current: Option<vec::IntoIter<E>>,
    quota: MemoryQuota,
    charged: usize,
    done: bool,
}

impl<E: Element> ReclaimTask<E> {
    pub(crate) fn new(
        index: String,
        blocks: Vec<Rc<Block<E>>>,
        charged: usize,
        quota: MemoryQuota,
    ) -> Self {
        Self {
            index,
            blocks: blocks.into_iter(),
            current: None,
            quota,
            charged,
            done: false,
        }
    }

    fn release(&mut self, entries: usize) {
        let size = entries
            .saturating_mul(mem::size_of::<E>())
            .min(self.charged);
        self.quota.release(size);
        self.charged -= size;
    }
}

impl<E: Element> GcTask for ReclaimTask<E> {
    fn run(&mut self, batch: usize) -> bool {
        if self.done {
            return true;
        }

        let mut released = 0;
        while released < batch {
            if let Some(elems) = self.current.as_mut() {
                if elems.next().is_some() {
                    self.release(1);
                    released += 1;
                    continue;
                }
                self.current = None;
            }

            match self.blocks.next() {
                Some(block) => match Rc::try_unwrap(block) {
                    Ok(block) => self.current = Some(block.into_elems().into_iter()),
                    // a snapshot still reads this block; only our share goes
                    Err(shared) => {
                        self.release(shared.len());
                        released += shared.len();
                    }
                },
                None => {
                    self.done = true;
                    break;
                }
            }
        }

        if self.done {
            let rest = self.charged;
            self.quota.release(rest);
            self.charged = 0;
        }

        record(MetricsEvent::GcStep {
            released: released as u64,
            done: self.done,
        });

        self.done
    }

    fn name(&self) -> &str {
        &self.index
    }
}

impl<E: Element> Drop for ReclaimTask<E> {
    fn drop(&mut self) {
        self.quota.release(self.charged);
    }
}

///
/// GcQueue
///
/// FIFO of pending tasks; each step advances the head task by one batch.
///

pub struct GcQueue {
    tasks: VecDeque<Box<dyn GcTask>>,
    batch: usize,
}

impl GcQueue {
    #[must_use]
    pub fn new(config: &TreeConfig) -> Self {
        Self {
            tasks: VecDeque::new(),
            batch: config.gc_batch.max(1),
        }
    }

    pub fn push(&mut self, task: Box<dyn GcTask>) {
        self.tasks.push_back(task);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run one batch of the head task, freeing it once done. Returns
    /// `true` when no work is left.
    pub fn run_step(&mut self) -> bool {
        let Some(task) = self.tasks.front_mut() else {
            return true;
        };
        if task.run(self.batch) {
            self.tasks.pop_front();
        }

        self.tasks.is_empty()
    }

    /// Run every task to completion; returns the number of steps taken.
    pub fn drain(&mut self) -> usize {
        let mut steps = 0;
        while !self.tasks.is_empty() {
            self.run_step();
            steps += 1;
        }

        steps
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        index::{DupReplaceMode, Index, IndexDef, new_tree_index},
        key::{FieldType, KeyDef, KeyPart},
        tuple::Tuple,
        value::Value,
    };

    fn primary(quota: &MemoryQuota, rows: u64) -> (Box<dyn Index>, Vec<Tuple>) {
        let key_def = KeyDef::new(vec![KeyPart::new(0, FieldType::Unsigned)]).unwrap();
        let def = IndexDef::new("pk", "users", 0, true, key_def, None).unwrap();
        let mut index = new_tree_index(def, &TreeConfig::default(), quota.clone());

        let tuples: Vec<Tuple> = (0..rows)
            .map(|k| Tuple::new(vec![Value::Uint(k)]).unwrap())
            .collect();
        for t in &tuples {
            index.replace(None, Some(t), DupReplaceMode::Insert).unwrap();
        }

        (index, tuples)
    }

    #[test]
    fn reclaim_releases_in_bounded_batches() {
        let quota = MemoryQuota::unlimited();
        let (index, tuples) = primary(&quota, 25);
        assert!(tuples.iter().all(|t| t.ref_count() == 2));

        let mut task = index.destroy().expect("primary index yields a reclaim task");
        assert_eq!(task.name(), "pk");

        assert!(!task.run(10));
        let released = tuples.iter().filter(|t| t.ref_count() == 1).count();
        assert_eq!(released, 10);

        assert!(!task.run(10));
        assert!(task.run(10));
        assert!(tuples.iter().all(|t| t.ref_count() == 1));
        assert_eq!(quota.used(), 0);
        assert!(task.run(10));
    }

    #[test]
    fn dropping_a_task_midway_releases_everything() {
        let quota = MemoryQuota::unlimited();
        let (index, tuples) = primary(&quota, 8);

        let mut task = index.destroy().unwrap();
        assert!(!task.run(3));
        drop(task);

        assert!(tuples.iter().all(|t| t.ref_count() == 1));
        assert_eq!(quota.used(), 0);
    }

    #[test]
    fn secondary_indexes_free_synchronously() {
        let quota = MemoryQuota::unlimited();
        let pk = KeyDef::new(vec![KeyPart::new(0, FieldType::Unsigned)]).unwrap();
        let sk = KeyDef::new(vec![KeyPart::new(1, FieldType::String)]).unwrap();
        let def = IndexDef::new("by_name", "users", 1, false, sk, Some(&pk)).unwrap();
        let mut index = new_tree_index(def, &TreeConfig::default(), quota.clone());

        let t = Tuple::new(vec![Value::Uint(1), Value::from("ann")]).unwrap();
        index.replace(None, Some(&t), DupReplaceMode::Insert).unwrap();
        assert_eq!(t.ref_count(), 2);

        assert!(index.destroy().is_none());
        assert_eq!(t.ref_count(), 1);
        assert_eq!(quota.used(), 0);
    }

    #[test]
    fn queue_steps_tasks_in_order() {
        let quota = MemoryQuota::unlimited();
        let config = TreeConfig {
            gc_batch: 4,
            ..TreeConfig::default()
        };
        let mut queue = GcQueue::new(&config);
        assert!(queue.run_step());

        let (a, _) = primary(&quota, 6);
        let (b, _) = primary(&quota, 3);
        queue.push(a.destroy().unwrap());
        queue.push(b.destroy().unwrap());
        assert_eq!(queue.len(), 2);

        // head task first: 4 of 6 entries, then the remaining 2
        assert!(!queue.run_step());
        assert_eq!(queue.len(), 2);
        assert!(!queue.run_step());
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.drain(), 1);
        assert!(queue.is_empty());
        assert_eq!(quota.used(), 0);
    }
}
