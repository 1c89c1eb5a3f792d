//! In-memory ordered tree indexes for IcyDB: key definitions, hinted and
//! multikey entries, resilient iterators, snapshots and deferred reclaim.
//!
//! Everything here is single-threaded. Records are shared through
//! reference-counted handles; an index never copies record payloads.

// public exports are one module level down
pub mod config;
pub mod error;
pub mod gc;
pub mod index;
pub mod key;
pub mod obs;
pub mod serialize;
pub mod tree;
pub mod tuple;
pub mod value;

///
/// Prelude
///
/// Vocabulary needed to define and drive an index.
///

pub mod prelude {
    pub use crate::{
        config::TreeConfig,
        error::InternalError,
        gc::{GcQueue, GcTask},
        index::{DupReplaceMode, Index, IndexDef, IteratorType, SnapshotIterator, new_tree_index},
        key::{Collation, FieldType, KeyDef, KeyPart},
        tree::MemoryQuota,
        tuple::Tuple,
        value::Value,
    };
}
