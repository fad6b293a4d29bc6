//! Static registry of native UDFs
//!
//! Rust closures registered under a type name with declared signatures. They
//! resolve to the same [`LoadedType`] and [`MethodHandle`](crate::MethodHandle)
//! values as file-loaded types, so callers batch them the same way.

use crate::config::InvokeOptions;
use crate::error::{DefineError, UdfError, UdfResult, VmError};
use crate::invoker::BatchInvoker;
use crate::loaded_type::{DeclaredMethod, LoadedType, MethodSignature, NativeFn};
use crate::namespace::{NamespaceId, TypeResolver};
use crate::value::Value;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use udf_bytecode::{access, TypeName};

/// Builder for one native type
pub struct StaticTypeBuilder {
    name: String,
    methods: Vec<DeclaredMethod>,
    bodies: Vec<NativeFn>,
}

impl StaticTypeBuilder {
    /// Start a type named `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
            bodies: Vec::new(),
        }
    }

    /// Add a public static method
    pub fn method<S, F>(
        self,
        name: impl Into<String>,
        params: impl IntoIterator<Item = S>,
        return_type: impl Into<String>,
        body: F,
    ) -> Self
    where
        S: Into<String>,
        F: Fn(&[Value]) -> Result<Value, VmError> + Send + Sync + 'static,
    {
        self.push(
            access::PUBLIC | access::STATIC,
            MethodSignature::new(name, params, return_type),
            Arc::new(body),
        )
    }

    /// Add a static method that needs an access grant to be invoked
    pub fn private_method<S, F>(
        self,
        name: impl Into<String>,
        params: impl IntoIterator<Item = S>,
        return_type: impl Into<String>,
        body: F,
    ) -> Self
    where
        S: Into<String>,
        F: Fn(&[Value]) -> Result<Value, VmError> + Send + Sync + 'static,
    {
        self.push(
            access::STATIC,
            MethodSignature::new(name, params, return_type),
            Arc::new(body),
        )
    }

    fn push(mut self, access_flags: u16, signature: MethodSignature, body: NativeFn) -> Self {
        self.methods.push(DeclaredMethod {
            signature,
            access_flags,
        });
        self.bodies.push(body);
        self
    }

    fn check_names(&self) -> Result<(), DefineError> {
        TypeName::parse(&self.name)
            .ok_or_else(|| DefineError::InvalidTypeName(self.name.clone()))?;
        for m in &self.methods {
            let sig = &m.signature;
            for ty in sig.param_types.iter().chain(std::iter::once(&sig.return_type)) {
                TypeName::parse(ty).ok_or_else(|| DefineError::InvalidTypeName(ty.clone()))?;
            }
        }
        Ok(())
    }
}

/// An in-process namespace of native UDF types
pub struct StaticRegistry {
    name: String,
    namespace: NamespaceId,
    options: InvokeOptions,
    types: Mutex<FxHashMap<String, Arc<LoadedType>>>,
}

impl StaticRegistry {
    /// Create an empty registry; `name` only appears in diagnostics
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_options(name, InvokeOptions::default())
    }

    /// Create an empty registry with explicit invoke options
    pub fn with_options(name: impl Into<String>, options: InvokeOptions) -> Self {
        Self {
            name: name.into(),
            namespace: NamespaceId::next(),
            options,
            types: Mutex::new(FxHashMap::default()),
        }
    }

    /// Register a type; names are unique within the registry
    pub fn register(&self, builder: StaticTypeBuilder) -> UdfResult<Arc<LoadedType>> {
        builder
            .check_names()
            .map_err(|reason| UdfError::TypeDefinitionInvalid {
                name: builder.name.clone(),
                reason,
            })?;

        let mut types = self.types.lock();
        if types.contains_key(&builder.name) {
            return Err(UdfError::DuplicateType(builder.name));
        }

        let method_count = builder.methods.len();
        let ty = Arc::new(LoadedType::native(
            builder.name.clone(),
            self.namespace,
            builder.methods,
            builder.bodies,
        ));
        types.insert(builder.name, Arc::clone(&ty));
        debug!(registry = %self.name, type_name = ty.name(), methods = method_count, "registered native type");
        Ok(ty)
    }

    /// Look up a registered type
    pub fn resolve(&self, name: &str) -> UdfResult<Arc<LoadedType>> {
        self.types
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| UdfError::TypeNotFound {
                name: name.to_string(),
                path: PathBuf::from(&self.name),
            })
    }

    /// Whether `name` is registered
    pub fn is_registered(&self, name: &str) -> bool {
        self.types.lock().contains_key(name)
    }

    /// Registered names, sorted
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.lock().len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Namespace of every registered type
    pub fn namespace(&self) -> NamespaceId {
        self.namespace
    }

    /// Invoker accepting handles from this registry
    pub fn invoker(&self) -> BatchInvoker {
        BatchInvoker::new(self.namespace, self.options)
    }
}

impl TypeResolver for StaticRegistry {
    fn namespace(&self) -> NamespaceId {
        self.namespace
    }

    fn resolve(&self, name: &str) -> UdfResult<Arc<LoadedType>> {
        StaticRegistry::resolve(self, name)
    }

    fn invoker(&self) -> BatchInvoker {
        StaticRegistry::invoker(self)
    }
}

impl std::fmt::Debug for StaticRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticRegistry")
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("types", &self.type_names())
            .finish()
    }
}
