use crate::{config::TreeConfig, error::InternalError};
use std::{cell::Cell, fmt, rc::Rc};

///
/// MemoryQuota
///
/// Shared byte budget metered by every tree built from it.
///
/// Handles are cheap clones of one counter; a limit of `None` never
/// refuses a charge. Charges are all-or-nothing: a refused charge leaves
/// the counter unchanged.
///

#[derive(Clone, Default)]
pub struct MemoryQuota(Rc<QuotaState>);

#[derive(Default)]
struct QuotaState {
    limit: Cell<Option<usize>>,
    used: Cell<usize>,
}

impl MemoryQuota {
    #[must_use]
    pub fn unlimited() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        let quota = Self::default();
        quota.set_limit(Some(limit));

        quota
    }

    /// Quota limited by the configured `memory_limit`, if any.
    #[must_use]
    pub fn from_config(config: &TreeConfig) -> Self {
        let quota = Self::default();
        quota.set_limit(config.memory_limit);

        quota
    }

    pub fn set_limit(&self, limit: Option<usize>) {
        self.0.limit.set(limit);
    }

    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.0.limit.get()
    }

    /// Bytes currently charged.
    #[must_use]
    pub fn used(&self) -> usize {
        self.0.used.get()
    }

    /// Charge `size` bytes on behalf of `allocator`, failing when the
    /// limit would be exceeded.
    pub(crate) fn charge(
        &self,
        size: usize,
        allocator: &'static str,
        what: &'static str,
    ) -> Result<(), InternalError> {
        let used = self.0.used.get();
        let next = used
            .checked_add(size)
            .filter(|next| self.0.limit.get().is_none_or(|limit| *next <= limit))
            .ok_or_else(|| InternalError::out_of_memory(size, allocator, what))?;
        self.0.used.set(next);

        Ok(())
    }

    /// Charge past the limit. Only for putting back bytes that were
    /// released earlier in the same operation.
    pub(crate) fn force_charge(&self, size: usize) {
        self.0.used.set(self.0.used.get().saturating_add(size));
    }

    pub(crate) fn release(&self, size: usize) {
        self.0.used.set(self.0.used.get().saturating_sub(size));
    }
}

impl fmt::Debug for MemoryQuota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryQuota")
            .field("limit", &self.limit())
            .field("used", &self.used())
            .finish()
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_charge_leaves_usage_unchanged() {
        let quota = MemoryQuota::with_limit(100);
        quota.charge(60, "tree", "insert").unwrap();

        let err = quota.charge(50, "tree", "insert").unwrap_err();
        assert!(err.is_out_of_memory());
        assert_eq!(quota.used(), 60);

        quota.release(60);
        quota.charge(100, "tree", "insert").unwrap();
        assert_eq!(quota.used(), 100);
    }

    #[test]
    fn config_limit_carries_over() {
        let config = TreeConfig {
            memory_limit: Some(32),
            ..TreeConfig::default()
        };
        let quota = MemoryQuota::from_config(&config);

        assert_eq!(quota.limit(), Some(32));
        assert!(quota.charge(33, "tree", "insert").is_err());
        assert_eq!(MemoryQuota::from_config(&TreeConfig::default()).limit(), None);
    }

    #[test]
    fn clones_share_one_counter() {
        let quota = MemoryQuota::unlimited();
        let other = quota.clone();

        other.charge(usize::MAX / 2, "tree", "build").unwrap();
        assert_eq!(quota.used(), usize::MAX / 2);
        assert!(quota.charge(usize::MAX, "tree", "build").is_err());
    }
}
