//! Module: index
//! Responsibility: tree-backed indexes over shared records.
//! Does not own: record storage, key typing rules or reclaim scheduling.

mod element;
mod iterator;
mod snapshot;
mod tree_index;


pub use element::{BasicElement, Element, HintedElement, KeyData, MultikeyElement};
pub use iterator::TreeIterator;
pub use snapshot::{SnapshotIterator, TreeSnapshotIterator};
pub use tree_index::TreeIndex;

use crate::{
    config::TreeConfig,
    error::InternalError,
    gc::GcTask,
    key::{FieldType, KeyDef},
    tree::MemoryQuota,
    tuple::Tuple,
    value::Value,
};
use std::rc::Rc;

///
/// IndexDef
///
/// Declared shape of one index plus the comparator it is ordered by.
///
/// `cmp_def` extends `key_def` with the primary key parts so that
/// entries of non-unique and nullable indexes stay distinguishable.
///

#[derive(Clone, Debug)]
pub struct IndexDef {
    pub name: String,
    pub space_name: String,
    pub iid: u32,
    pub unique: bool,
    pub key_def: Rc<KeyDef>,
    pub cmp_def: Rc<KeyDef>,
}

impl IndexDef {
    /// Build a definition. Secondary indexes (`iid > 0`) need the primary
    /// key definition; the primary index must be unique, non-nullable
    /// and single-entry.
    pub fn new(
        name: impl Into<String>,
        space_name: impl Into<String>,
        iid: u32,
        unique: bool,
        key_def: KeyDef,
        pk_def: Option<&KeyDef>,
    ) -> Result<Self, InternalError> {
        let name = name.into();

        let cmp_def = if iid == 0 {
            if !unique || key_def.is_nullable() || key_def.is_multikey() {
                return Err(InternalError::index_unsupported(format!(
                    "primary index '{name}' must be unique, non-nullable and not multikey"
                )));
            }
            key_def.clone()
        } else {
            let pk_def = pk_def.ok_or_else(|| {
                InternalError::index_unsupported(format!(
                    "secondary index '{name}' requires the primary key definition"
                ))
            })?;
            key_def.merge(pk_def, unique)
        };

        Ok(Self {
            name,
            space_name: space_name.into(),
            iid,
            unique,
            key_def: Rc::new(key_def),
            cmp_def: Rc::new(cmp_def),
        })
    }

    #[must_use]
    pub const fn is_primary(&self) -> bool {
        self.iid == 0
    }

    /// Whether the tree order includes the primary key parts.
    #[must_use]
    pub fn depends_on_pk(&self) -> bool {
        !self.unique || self.key_def.is_nullable()
    }

    /// Comparator the tree is ordered by.
    #[must_use]
    pub fn active_def(&self) -> &Rc<KeyDef> {
        if self.depends_on_pk() {
            &self.cmp_def
        } else {
            &self.key_def
        }
    }
}

///
/// IteratorType
///
/// Iteration operator. Codes are stable; the tree supports `Eq` through
/// `Gt` and rejects the rest.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IteratorType {
    Eq,
    Req,
    All,
    Lt,
    Le,
    Ge,
    Gt,
    BitsAllSet,
    BitsAnySet,
    BitsAllNotSet,
    Overlaps,
    Neighbor,
}

impl IteratorType {
    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        let ty = match code {
            0 => Self::Eq,
            1 => Self::Req,
            2 => Self::All,
            3 => Self::Lt,
            4 => Self::Le,
            5 => Self::Ge,
            6 => Self::Gt,
            7 => Self::BitsAllSet,
            8 => Self::BitsAnySet,
            9 => Self::BitsAllNotSet,
            10 => Self::Overlaps,
            11 => Self::Neighbor,
            _ => return None,
        };

        Some(ty)
    }

    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Whether results come in descending order.
    #[must_use]
    pub const fn is_reverse(self) -> bool {
        matches!(self, Self::Req | Self::Lt | Self::Le)
    }

    pub(crate) const fn is_tree_supported(self) -> bool {
        self.code() <= Self::Gt.code()
    }
}

///
/// DupReplaceMode
///
/// Policy applied to an order-equal record displaced by an insert.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DupReplaceMode {
    /// No equal record may exist.
    Insert,
    /// An equal record must already exist.
    Replace,
    /// Anything goes.
    ReplaceOrInsert,
}

// Policy check for one displaced record.
pub(crate) fn check_dup(
    def: &IndexDef,
    old: Option<&Tuple>,
    dup: Option<&Tuple>,
    mode: DupReplaceMode,
) -> Result<(), InternalError> {
    match dup {
        None if mode == DupReplaceMode::Replace => {
            Err(InternalError::tuple_not_found(&def.name, &def.space_name))
        }
        Some(dup)
            if !old.is_some_and(|old| old.same(dup))
                && (old.is_some() || mode == DupReplaceMode::Insert) =>
        {
            Err(InternalError::index_violation(&def.name, &def.space_name))
        }
        _ => Ok(()),
    }
}

///
/// Index
///
/// Object-safe surface the index-management layer drives.
///

pub trait Index {
    fn def(&self) -> &IndexDef;

    /// Swap in a new definition; the comparator is recomputed.
    fn update_def(&mut self, def: IndexDef) -> Result<(), InternalError>;

    fn depends_on_pk(&self) -> bool {
        self.def().depends_on_pk()
    }

    /// Number of entries.
    fn size(&self) -> usize;

    /// Bytes used by entries.
    fn bsize(&self) -> usize;

    fn random(&self, rnd: u64) -> Option<Tuple>;

    /// First record matching the key prefix in index order.
    fn min(&self, key: &[Value]) -> Result<Option<Tuple>, InternalError>;

    /// Last record matching the key prefix in index order.
    fn max(&self, key: &[Value]) -> Result<Option<Tuple>, InternalError>;

    fn count(&self, ty: IteratorType, key: &[Value]) -> Result<usize, InternalError>;

    /// Exact lookup; unique indexes only, full keys only.
    fn get(&self, key: &[Value]) -> Result<Option<Tuple>, InternalError>;

    /// Replace `old` with `new` under `mode`; returns the record that is
    /// no longer indexed.
    fn replace(
        &mut self,
        old: Option<&Tuple>,
        new: Option<&Tuple>,
        mode: DupReplaceMode,
    ) -> Result<Option<Tuple>, InternalError>;

    fn create_iterator(
        &self,
        ty: IteratorType,
        key: &[Value],
    ) -> Result<Box<dyn Iterator<Item = Tuple>>, InternalError>;

    fn create_snapshot_iterator(&self) -> Box<dyn SnapshotIterator>;

    fn begin_build(&mut self) -> Result<(), InternalError>;

    fn reserve(&mut self, size_hint: usize) -> Result<(), InternalError>;

    fn build_next(&mut self, tuple: &Tuple) -> Result<(), InternalError>;

    fn end_build(&mut self) -> Result<(), InternalError>;

    /// Drop the index. Primary indexes hand their records to a reclaim
    /// task; secondary indexes are freed on the spot.
    fn destroy(self: Box<Self>) -> Option<Box<dyn GcTask>>;
}

/// Create a tree index, choosing the entry shape from the definition.
#[must_use]
pub fn new_tree_index(def: IndexDef, config: &TreeConfig, quota: MemoryQuota) -> Box<dyn Index> {
    if def.key_def.is_multikey() {
        return Box::new(TreeIndex::<MultikeyElement>::new(def, config, quota));
    }

    let hinted = def.active_def().parts().first().is_some_and(|part| {
        matches!(
            part.field_type,
            FieldType::Unsigned | FieldType::Integer | FieldType::String
        )
    });

    if hinted {
        Box::new(TreeIndex::<HintedElement>::new(def, config, quota))
    } else {
        Box::new(TreeIndex::<BasicElement>::new(def, config, quota))
    }
}
