//! Namespace identity and the resolver seam shared by loaders and registries

use crate::error::UdfResult;
use crate::invoker::BatchInvoker;
use crate::loaded_type::LoadedType;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_NAMESPACE: AtomicU64 = AtomicU64::new(1);

/// Identity of one isolated namespace.
///
/// Types defined in different namespaces never compare equal, even when
/// they were built from the same bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceId(u64);

impl NamespaceId {
    /// Allocate a fresh, never reused identity
    pub fn next() -> Self {
        NamespaceId(NEXT_NAMESPACE.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ns#{}", self.0)
    }
}

/// Something that resolves logical type names inside one namespace
pub trait TypeResolver {
    /// Namespace every resolved type belongs to
    fn namespace(&self) -> NamespaceId;

    /// Resolve a type by name
    fn resolve(&self, name: &str) -> UdfResult<Arc<LoadedType>>;

    /// Invoker bound to this namespace
    fn invoker(&self) -> BatchInvoker;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = NamespaceId::next();
        let b = NamespaceId::next();
        assert_ne!(a, b);
        assert!(b > a);
        assert_eq!(a.to_string(), format!("ns#{}", a.as_u64()));
    }
}
