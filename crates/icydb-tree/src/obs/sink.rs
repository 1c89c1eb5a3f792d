//! Metrics sink boundary.
//!
//! Index and tree logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
//!
//! This module is the only allowed bridge between execution logic
//! and the global metrics state.
use crate::obs::metrics::{self, index_entry};
use std::cell::RefCell;

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<*const dyn MetricsSink>> = RefCell::new(None);
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent<'a> {
    Replace {
        index: &'a str,
        inserts: u64,
        removes: u64,
    },
    UniqueViolation {
        index: &'a str,
    },
    Rollback {
        index: &'a str,
        entries: u64,
    },
    OutOfMemory {
        index: &'a str,
    },
    IteratorStart {
        index: &'a str,
    },
    IteratorReseek {
        index: &'a str,
    },
    Build {
        index: &'a str,
        entries: u64,
    },
    GcStep {
        released: u64,
        done: bool,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent<'_>);
}

/// GlobalMetricsSink
/// Default process-local sink that writes into global metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent<'_>) {
        match event {
            MetricsEvent::Replace {
                index,
                inserts,
                removes,
            } => {
                metrics::with_state_mut(|m| {
                    m.ops.replace_calls = m.ops.replace_calls.saturating_add(1);
                    m.ops.entries_inserted = m.ops.entries_inserted.saturating_add(inserts);
                    m.ops.entries_removed = m.ops.entries_removed.saturating_add(removes);
                    let entry = index_entry(m, index);
                    entry.replace_calls = entry.replace_calls.saturating_add(1);
                    entry.entries_inserted = entry.entries_inserted.saturating_add(inserts);
                    entry.entries_removed = entry.entries_removed.saturating_add(removes);
                });
            }

            MetricsEvent::UniqueViolation { index } => {
                metrics::with_state_mut(|m| {
                    m.ops.unique_violations = m.ops.unique_violations.saturating_add(1);
                    let entry = index_entry(m, index);
                    entry.unique_violations = entry.unique_violations.saturating_add(1);
                });
            }

            MetricsEvent::Rollback { index, entries } => {
                metrics::with_state_mut(|m| {
                    m.ops.rollbacks = m.ops.rollbacks.saturating_add(1);
                    m.ops.entries_rolled_back = m.ops.entries_rolled_back.saturating_add(entries);
                    let entry = index_entry(m, index);
                    entry.rollbacks = entry.rollbacks.saturating_add(1);
                });
            }

            MetricsEvent::OutOfMemory { index } => {
                metrics::with_state_mut(|m| {
                    m.ops.out_of_memory = m.ops.out_of_memory.saturating_add(1);
                    let entry = index_entry(m, index);
                    entry.out_of_memory = entry.out_of_memory.saturating_add(1);
                });
            }

            MetricsEvent::IteratorStart { index } => {
                metrics::with_state_mut(|m| {
                    m.ops.iterators_started = m.ops.iterators_started.saturating_add(1);
                    let entry = index_entry(m, index);
                    entry.iterators_started = entry.iterators_started.saturating_add(1);
                });
            }

            MetricsEvent::IteratorReseek { index } => {
                metrics::with_state_mut(|m| {
                    m.ops.iterator_reseeks = m.ops.iterator_reseeks.saturating_add(1);
                    let entry = index_entry(m, index);
                    entry.iterator_reseeks = entry.iterator_reseeks.saturating_add(1);
                });
            }

            MetricsEvent::Build { index, entries } => {
                metrics::with_state_mut(|m| {
                    m.ops.builds = m.ops.builds.saturating_add(1);
                    m.ops.entries_built = m.ops.entries_built.saturating_add(entries);
                    let entry = index_entry(m, index);
                    entry.entries_built = entry.entries_built.saturating_add(entries);
                });
            }

            MetricsEvent::GcStep { released, done } => {
                metrics::with_state_mut(|m| {
                    m.ops.gc_steps = m.ops.gc_steps.saturating_add(1);
                    m.ops.gc_tuples_released = m.ops.gc_tuples_released.saturating_add(released);
                    if done {
                        m.ops.gc_tasks_done = m.ops.gc_tasks_done.saturating_add(1);
                    }
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent<'_>) {
    let override_ptr = SINK_OVERRIDE.with(|cell| *cell.borrow());
    if let Some(ptr) = override_ptr {
        // SAFETY:
        // Preconditions:
        // - `ptr` was produced from a valid `&dyn MetricsSink` in `with_metrics_sink`.
        // - `with_metrics_sink` always restores the previous pointer before returning,
        //   including unwind paths via `Guard::drop`.
        // - `record` is synchronous and never stores `ptr` beyond this call.
        //
        // Aliasing:
        // - Only a shared reference is materialized, matching the shared borrow
        //   used to install the override.
        unsafe { (&*ptr).record(event) };
    } else {
        GLOBAL_METRICS_SINK.record(event);
    }
}

/// Snapshot the current metrics state.
#[must_use]
pub fn metrics_report() -> metrics::EventReport {
    metrics::report()
}

/// Reset all metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override.
pub fn with_metrics_sink<T>(sink: &dyn MetricsSink, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<*const dyn MetricsSink>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = self.0;
            });
        }
    }

    // SAFETY:
    // - `sink_ptr` is installed only for this dynamic scope.
    // - `Guard` restores the previous slot on all exits, including panic.
    // - `record` only dereferences synchronously and never persists `sink_ptr`.
    let sink_ptr = unsafe { std::mem::transmute::<&dyn MetricsSink, *const dyn MetricsSink>(sink) };
    let prev = SINK_OVERRIDE.with(|cell| {
        let mut slot = cell.borrow_mut();
        slot.replace(sink_ptr)
    });
    let _guard = Guard(prev);

    f()
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct CountingSink {
        reseeks: Cell<u64>,
    }

    impl MetricsSink for CountingSink {
        fn record(&self, event: MetricsEvent<'_>) {
            if let MetricsEvent::IteratorReseek { .. } = event {
                self.reseeks.set(self.reseeks.get() + 1);
            }
        }
    }

    #[test]
    fn override_sink_captures_events_in_scope_only() {
        metrics_reset_all();
        let sink = CountingSink::default();

        with_metrics_sink(&sink, || {
            record(MetricsEvent::IteratorReseek { index: "pk" });
            record(MetricsEvent::IteratorReseek { index: "pk" });
        });
        record(MetricsEvent::IteratorReseek { index: "pk" });

        assert_eq!(sink.reseeks.get(), 2);
        assert_eq!(metrics_report().counters.iterator_reseeks, 1);
    }

    #[test]
    fn global_sink_aggregates_per_index() {
        metrics_reset_all();

        record(MetricsEvent::Replace {
            index: "sk",
            inserts: 3,
            removes: 1,
        });
        record(MetricsEvent::Replace {
            index: "sk",
            inserts: 1,
            removes: 0,
        });
        record(MetricsEvent::UniqueViolation { index: "sk" });
        record(MetricsEvent::OutOfMemory { index: "sk" });

        let report = metrics_report();
        assert_eq!(report.counters.replace_calls, 2);
        assert_eq!(report.counters.entries_inserted, 4);
        assert_eq!(report.indexes.len(), 1);
        assert_eq!(report.indexes[0].name, "sk");
        assert_eq!(report.indexes[0].unique_violations, 1);
        assert_eq!(report.indexes[0].out_of_memory, 1);
        assert_eq!(report.counters.out_of_memory, 1);
        assert!((report.indexes[0].avg_entries_per_replace - 2.0).abs() < f64::EPSILON);

        let json = serde_json::to_string(&report).expect("report should serialize");
        assert!(json.contains("\"name\":\"sk\""));
    }
}
