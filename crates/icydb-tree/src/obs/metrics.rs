use serde::{Deserialize, Serialize};
use std::{cell::RefCell, collections::BTreeMap};

///
/// EventState
/// Ephemeral, in-memory counters for index operations.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub indexes: BTreeMap<String, IndexCounters>,
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventOps {
    // Mutations
    pub replace_calls: u64,
    pub entries_inserted: u64,
    pub entries_removed: u64,
    pub unique_violations: u64,
    pub rollbacks: u64,
    pub entries_rolled_back: u64,
    pub out_of_memory: u64,

    // Iteration
    pub iterators_started: u64,
    pub iterator_reseeks: u64,

    // Bulk build
    pub builds: u64,
    pub entries_built: u64,

    // Reclaim
    pub gc_steps: u64,
    pub gc_tuples_released: u64,
    pub gc_tasks_done: u64,
}

///
/// IndexCounters
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct IndexCounters {
    pub replace_calls: u64,
    pub entries_inserted: u64,
    pub entries_removed: u64,
    pub unique_violations: u64,
    pub rollbacks: u64,
    pub out_of_memory: u64,
    pub iterators_started: u64,
    pub iterator_reseeks: u64,
    pub entries_built: u64,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Borrow the per-index counters, creating them on first use.
pub(crate) fn index_entry<'a>(m: &'a mut EventState, index: &str) -> &'a mut IndexCounters {
    m.indexes.entry(index.to_string()).or_default()
}

/// Reset all counters (useful in tests).
pub fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}

///
/// EventReport
/// Event/counter report.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventReport {
    /// Global counters since the last reset.
    pub counters: EventOps,
    /// Per-index counters, sorted by index name.
    pub indexes: Vec<IndexSummary>,
}

///
/// IndexSummary
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct IndexSummary {
    pub name: String,
    pub replace_calls: u64,
    pub entries_inserted: u64,
    pub entries_removed: u64,
    pub unique_violations: u64,
    pub rollbacks: u64,
    pub out_of_memory: u64,
    pub iterators_started: u64,
    pub iterator_reseeks: u64,
    pub avg_entries_per_replace: f64,
}

/// Build a metrics report by inspecting in-memory counters only.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn report() -> EventReport {
    let snap = with_state(Clone::clone);

    let indexes = snap
        .indexes
        .iter()
        .map(|(name, c)| {
            let avg = if c.replace_calls > 0 {
                c.entries_inserted as f64 / c.replace_calls as f64
            } else {
                0.0
            };

            IndexSummary {
                name: name.clone(),
                replace_calls: c.replace_calls,
                entries_inserted: c.entries_inserted,
                entries_removed: c.entries_removed,
                unique_violations: c.unique_violations,
                rollbacks: c.rollbacks,
                out_of_memory: c.out_of_memory,
                iterators_started: c.iterators_started,
                iterator_reseeks: c.iterator_reseeks,
                avg_entries_per_replace: avg,
            }
        })
        .collect();

    EventReport {
        counters: snap.ops,
        indexes,
    }
}
