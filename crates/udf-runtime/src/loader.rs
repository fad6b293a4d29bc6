//! Namespace loader
//!
//! Resolves logical type names to [`LoadedType`]s by reading
//! `<base_path>/<name>.<extension>` and defining the bytes into a private
//! namespace. Each loader is its own namespace: the same file loaded through
//! two loaders yields two distinct, non-interchangeable types.

use crate::config::{InvokeOptions, LoaderConfig, RuntimeConfig};
use crate::error::{DefineError, UdfError, UdfResult};
use crate::invoker::BatchInvoker;
use crate::loaded_type::LoadedType;
use crate::namespace::{NamespaceId, TypeResolver};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use udf_bytecode::{verify_class, ClassFile};

static LOADER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// The "define type" primitive: turns raw bytes into a loaded type
pub trait TypeDefiner: Send + Sync {
    /// Define `bytes` as the type `name` in `namespace`
    fn define(&self, name: &str, bytes: &[u8], namespace: NamespaceId)
        -> Result<LoadedType, DefineError>;
}

/// Defines types from `.udfc` class files
#[derive(Debug, Clone, Copy)]
pub struct BytecodeDefiner {
    verify: bool,
}

impl BytecodeDefiner {
    /// Create a definer; `verify` runs the bytecode verifier on every class
    pub fn new(verify: bool) -> Self {
        Self { verify }
    }
}

impl Default for BytecodeDefiner {
    fn default() -> Self {
        Self::new(true)
    }
}

impl TypeDefiner for BytecodeDefiner {
    fn define(
        &self,
        name: &str,
        bytes: &[u8],
        namespace: NamespaceId,
    ) -> Result<LoadedType, DefineError> {
        let class = ClassFile::decode(bytes)?;
        if class.name != name {
            return Err(DefineError::NameMismatch {
                expected: name.to_string(),
                found: class.name,
            });
        }
        if self.verify {
            verify_class(&class)?;
        }
        Ok(LoadedType::from_class(class, bytes, namespace))
    }
}

/// Loads UDF types from one directory into one private namespace
pub struct NamespaceLoader {
    base_path: PathBuf,
    extension: String,
    namespace: NamespaceId,
    oid: u64,
    definer: Box<dyn TypeDefiner>,
    invoke_options: InvokeOptions,
    /// Held across check-read-define-register
    types: Mutex<FxHashMap<String, Arc<LoadedType>>>,
}

impl NamespaceLoader {
    /// Loader for `base_path` with default settings
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self::from_loader_config(&LoaderConfig::new(base_path))
    }

    /// Loader configured from a runtime config
    pub fn from_config(config: &RuntimeConfig) -> Self {
        let mut loader = Self::from_loader_config(&config.loader);
        loader.invoke_options = config.invoke;
        loader
    }

    fn from_loader_config(config: &LoaderConfig) -> Self {
        Self::build(
            config.base_path.clone(),
            config.extension.clone(),
            Box::new(BytecodeDefiner::new(config.verify)),
        )
    }

    /// Loader for `base_path` that defines types with a custom definer
    pub fn with_definer(base_path: impl Into<PathBuf>, definer: impl TypeDefiner + 'static) -> Self {
        Self::build(
            base_path.into(),
            LoaderConfig::default().extension,
            Box::new(definer),
        )
    }

    fn build(base_path: PathBuf, extension: String, definer: Box<dyn TypeDefiner>) -> Self {
        Self {
            base_path,
            extension,
            namespace: NamespaceId::next(),
            oid: LOADER_COUNTER.fetch_add(1, Ordering::Relaxed),
            definer,
            invoke_options: InvokeOptions::default(),
            types: Mutex::new(FxHashMap::default()),
        }
    }

    /// Directory types are read from
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Instance ordinal, for diagnostics only
    pub fn oid(&self) -> u64 {
        self.oid
    }

    /// File a type name resolves to
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.base_path.join(format!("{}.{}", name, self.extension))
    }

    /// Resolve a type, reading and defining it on first use.
    ///
    /// Later calls for the same name return the same `Arc` without
    /// touching the filesystem. On failure nothing is registered, so a
    /// retry after fixing the file can succeed.
    pub fn resolve(&self, name: &str) -> UdfResult<Arc<LoadedType>> {
        let mut types = self.types.lock();
        if let Some(ty) = types.get(name) {
            return Ok(Arc::clone(ty));
        }

        let path = self.path_for(name);
        debug!(loader = %self, type_name = name, path = %path.display(), "resolving type");

        let bytes = std::fs::read(&path).map_err(|source| {
            warn!(type_name = name, path = %path.display(), error = %source, "failed to read type");
            match source.kind() {
                io::ErrorKind::NotFound => UdfError::TypeNotFound {
                    name: name.to_string(),
                    path: path.clone(),
                },
                _ => UdfError::TypeLoadIo {
                    name: name.to_string(),
                    source,
                },
            }
        })?;

        let ty = self
            .definer
            .define(name, &bytes, self.namespace)
            .map_err(|reason| {
                warn!(type_name = name, error = %reason, "type definition rejected");
                UdfError::TypeDefinitionInvalid {
                    name: name.to_string(),
                    reason,
                }
            })?;

        let ty = Arc::new(ty);
        types.insert(name.to_string(), Arc::clone(&ty));
        debug!(
            type_name = name,
            bytes = ty.bytecode_len(),
            digest = %ty.digest_hex(),
            methods = ty.methods().len(),
            "defined type"
        );
        Ok(ty)
    }

    /// Whether `name` has been resolved
    pub fn is_loaded(&self, name: &str) -> bool {
        self.types.lock().contains_key(name)
    }

    /// Names resolved so far, sorted
    pub fn loaded_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of resolved types
    pub fn len(&self) -> usize {
        self.types.lock().len()
    }

    /// Whether nothing has been resolved yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TypeResolver for NamespaceLoader {
    fn namespace(&self) -> NamespaceId {
        self.namespace
    }

    fn resolve(&self, name: &str) -> UdfResult<Arc<LoadedType>> {
        NamespaceLoader::resolve(self, name)
    }

    fn invoker(&self) -> BatchInvoker {
        BatchInvoker::new(self.namespace, self.invoke_options)
    }
}

impl NamespaceLoader {
    /// Namespace every type of this loader is defined into
    pub fn namespace(&self) -> NamespaceId {
        self.namespace
    }

    /// Invoker accepting handles from this loader
    pub fn invoker(&self) -> BatchInvoker {
        TypeResolver::invoker(self)
    }
}

impl fmt::Display for NamespaceLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NamespaceLoader{{path='{}', oid={}}}",
            self.base_path.display(),
            self.oid
        )
    }
}

impl fmt::Debug for NamespaceLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceLoader")
            .field("base_path", &self.base_path)
            .field("extension", &self.extension)
            .field("namespace", &self.namespace)
            .field("oid", &self.oid)
            .field("loaded", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use udf_bytecode::{MethodDef, Opcode};

    fn write_class(dir: &Path, name: &str) {
        let mut class = ClassFile::new(name);
        class.add_method(
            MethodDef::new("one", Vec::<String>::new(), "int")
                .with_code(vec![Opcode::ConstI32 as u8, 1, 0, 0, 0, Opcode::Return as u8]),
        );
        std::fs::write(dir.join(format!("{}.udfc", name)), class.encode()).unwrap();
    }

    #[test]
    fn test_display() {
        let loader = NamespaceLoader::new("/opt/udfs");
        assert_eq!(
            loader.to_string(),
            format!("NamespaceLoader{{path='/opt/udfs', oid={}}}", loader.oid())
        );
    }

    #[test]
    fn test_oids_increase() {
        let a = NamespaceLoader::new("/a");
        let b = NamespaceLoader::new("/b");
        assert!(b.oid() > a.oid());
        assert_ne!(a.namespace(), b.namespace());
    }

    #[test]
    fn test_path_for() {
        let loader = NamespaceLoader::new("/opt/udfs");
        assert_eq!(
            loader.path_for("com.acme.Add"),
            PathBuf::from("/opt/udfs/com.acme.Add.udfc")
        );
    }

    #[test]
    fn test_resolve_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        write_class(dir.path(), "One");

        let loader = NamespaceLoader::new(dir.path());
        assert!(loader.is_empty());

        let first = loader.resolve("One").unwrap();
        let second = loader.resolve("One").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.namespace(), loader.namespace());
        assert!(loader.is_loaded("One"));
        assert_eq!(loader.loaded_names(), vec!["One".to_string()]);
    }

    #[test]
    fn test_missing_type() {
        let dir = tempfile::tempdir().unwrap();
        let loader = NamespaceLoader::new(dir.path());

        let result = loader.resolve("Nope");
        assert!(matches!(result, Err(UdfError::TypeNotFound { ref name, .. }) if name == "Nope"));
        assert!(!loader.is_loaded("Nope"));
    }

    #[test]
    fn test_directory_in_place_of_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Dir.udfc")).unwrap();
        let loader = NamespaceLoader::new(dir.path());

        let result = loader.resolve("Dir");
        assert!(matches!(result, Err(UdfError::TypeLoadIo { .. })));
    }

    struct RejectAll;

    impl TypeDefiner for RejectAll {
        fn define(&self, _: &str, _: &[u8], _: NamespaceId) -> Result<LoadedType, DefineError> {
            Err(DefineError::Rejected("no".to_string()))
        }
    }

    #[test]
    fn test_custom_definer() {
        let dir = tempfile::tempdir().unwrap();
        write_class(dir.path(), "One");
        let loader = NamespaceLoader::with_definer(dir.path(), RejectAll);

        let result = loader.resolve("One");
        assert!(matches!(
            result,
            Err(UdfError::TypeDefinitionInvalid {
                reason: DefineError::Rejected(_),
                ..
            })
        ));
        assert!(loader.is_empty());
    }
}
