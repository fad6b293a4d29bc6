//! Method handles
//!
//! A handle names exactly one declared method of one loaded type. It is
//! resolved once and then reused for every row of a batch.

use crate::descriptor::describe_signature;
use crate::error::{UdfError, UdfResult};
use crate::loaded_type::{DeclaredMethod, LoadedType, MethodSignature};
use crate::namespace::NamespaceId;
use std::fmt;
use std::sync::Arc;

/// Reference to one declared method of a loaded type
#[derive(Clone)]
pub struct MethodHandle {
    owner: Arc<LoadedType>,
    index: usize,
    access_granted: bool,
}

impl MethodHandle {
    /// The first declared method of `owner`
    pub fn first(owner: &Arc<LoadedType>) -> UdfResult<Self> {
        if owner.methods().is_empty() {
            return Err(UdfError::MethodNotFound(format!("{}.<first>", owner.name())));
        }
        Ok(Self::at(owner, 0))
    }

    /// The first declared method of `owner` named `name`
    pub fn by_name(owner: &Arc<LoadedType>, name: &str) -> UdfResult<Self> {
        owner
            .methods()
            .iter()
            .position(|m| m.signature.name == name)
            .map(|index| Self::at(owner, index))
            .ok_or_else(|| UdfError::MethodNotFound(format!("{}.{}", owner.name(), name)))
    }

    /// The method of `owner` with this name and descriptor
    pub fn lookup(owner: &Arc<LoadedType>, name: &str, descriptor: &str) -> UdfResult<Self> {
        owner
            .methods()
            .iter()
            .position(|m| m.signature.name == name && describe_signature(&m.signature) == descriptor)
            .map(|index| Self::at(owner, index))
            .ok_or_else(|| {
                UdfError::MethodNotFound(format!("{}.{}{}", owner.name(), name, descriptor))
            })
    }

    fn at(owner: &Arc<LoadedType>, index: usize) -> Self {
        Self {
            owner: Arc::clone(owner),
            index,
            access_granted: false,
        }
    }

    /// Allow invoking a non-public method through this handle
    pub fn grant_access(&mut self) {
        self.access_granted = true;
    }

    /// Builder form of [`MethodHandle::grant_access`]
    pub fn with_access(mut self) -> Self {
        self.grant_access();
        self
    }

    /// Whether this handle may be invoked
    pub fn is_accessible(&self) -> bool {
        self.access_granted || self.method().is_public()
    }

    /// Type that declares the method
    pub fn owner(&self) -> &Arc<LoadedType> {
        &self.owner
    }

    /// Namespace the handle is bound to
    pub fn namespace(&self) -> NamespaceId {
        self.owner.namespace()
    }

    /// Position of the method in its type's declaration order
    pub fn index(&self) -> usize {
        self.index
    }

    /// The declared method
    pub fn method(&self) -> &DeclaredMethod {
        &self.owner.methods()[self.index]
    }

    /// The method's signature
    pub fn signature(&self) -> &MethodSignature {
        &self.method().signature
    }

    /// Number of formal parameters
    pub fn arity(&self) -> usize {
        self.signature().arity()
    }

    /// `Type.method`, as used in error messages
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.owner.name(), self.signature().name)
    }
}

impl fmt::Debug for MethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodHandle")
            .field("owner", &self.owner.name())
            .field("namespace", &self.owner.namespace())
            .field("method", &self.signature().name)
            .field("descriptor", &describe_signature(self.signature()).as_str())
            .field("access_granted", &self.access_granted)
            .finish()
    }
}

impl fmt::Display for MethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            self.qualified_name(),
            describe_signature(self.signature())
        )
    }
}
