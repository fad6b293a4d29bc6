//! Integration tests for the namespace loader

mod common;

use common::{init_tracing, math_class, oversized_locals_class, unverifiable_class, write_class};
use std::sync::Arc;
use std::thread;
use udf_bytecode::VerifyError;
use udf_runtime::{
    BytecodeDefiner, DefineError, LoadedType, LoaderConfig, MethodHandle, NamespaceId,
    NamespaceLoader, RuntimeConfig, TypeDefiner, TypeResolver, UdfError, VmError,
};

#[test]
fn test_resolve_is_idempotent() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_class(dir.path(), "Math", &math_class("Math"));

    let loader = NamespaceLoader::new(dir.path());
    let first = loader.resolve("Math").unwrap();

    // Cached types never touch the filesystem again
    std::fs::remove_file(dir.path().join("Math.udfc")).unwrap();
    let second = loader.resolve("Math").unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.name(), "Math");
    assert_eq!(first.methods().len(), 4);
    assert!(first.bytecode_len() > 16);
    assert_eq!(first.digest_hex().len(), 64);
}

#[test]
fn test_loaders_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    write_class(dir.path(), "Math", &math_class("Math"));

    let a = NamespaceLoader::new(dir.path());
    let b = NamespaceLoader::new(dir.path());
    let from_a = a.resolve("Math").unwrap();
    let from_b = b.resolve("Math").unwrap();

    assert!(!Arc::ptr_eq(&from_a, &from_b));
    assert_ne!(from_a.namespace(), from_b.namespace());
    assert_eq!(from_a.namespace(), a.namespace());
    // Same bytes, same digest; identity still differs
    assert_eq!(from_a.digest(), from_b.digest());
    assert_ne!(from_a.to_string(), from_b.to_string());
}

#[test]
fn test_missing_then_retry() {
    let dir = tempfile::tempdir().unwrap();
    let loader = NamespaceLoader::new(dir.path());

    match loader.resolve("Later") {
        Err(UdfError::TypeNotFound { name, path }) => {
            assert_eq!(name, "Later");
            assert_eq!(path, dir.path().join("Later.udfc"));
        }
        other => panic!("Expected TypeNotFound, got {:?}", other),
    }
    assert!(loader.is_empty());

    write_class(dir.path(), "Later", &math_class("Later"));
    let ty = loader.resolve("Later").unwrap();
    assert_eq!(ty.name(), "Later");
    assert_eq!(loader.len(), 1);
}

#[test]
fn test_dotted_names_are_flat_files() {
    let dir = tempfile::tempdir().unwrap();
    write_class(dir.path(), "com.acme.Math", &math_class("com.acme.Math"));

    let loader = NamespaceLoader::new(dir.path());
    let ty = loader.resolve("com.acme.Math").unwrap();
    assert_eq!(ty.name(), "com.acme.Math");
    assert_eq!(loader.loaded_names(), vec!["com.acme.Math".to_string()]);
}

#[test]
fn test_class_name_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    write_class(dir.path(), "Alias", &math_class("Math"));

    let loader = NamespaceLoader::new(dir.path());
    match loader.resolve("Alias") {
        Err(UdfError::TypeDefinitionInvalid {
            name,
            reason: DefineError::NameMismatch { expected, found },
        }) => {
            assert_eq!(name, "Alias");
            assert_eq!(expected, "Alias");
            assert_eq!(found, "Math");
        }
        other => panic!("Expected NameMismatch, got {:?}", other),
    }
    assert!(!loader.is_loaded("Alias"));
}

#[test]
fn test_corrupt_bytes() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Junk.udfc"), b"definitely not a class file").unwrap();

    let mut bytes = math_class("Flipped").encode();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(dir.path().join("Flipped.udfc"), bytes).unwrap();

    let loader = NamespaceLoader::new(dir.path());
    assert!(matches!(
        loader.resolve("Junk"),
        Err(UdfError::TypeDefinitionInvalid {
            reason: DefineError::Class(_),
            ..
        })
    ));
    assert!(matches!(
        loader.resolve("Flipped"),
        Err(UdfError::TypeDefinitionInvalid {
            reason: DefineError::Class(_),
            ..
        })
    ));
}

#[test]
fn test_verification_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    write_class(dir.path(), "Broken", &unverifiable_class("Broken"));

    let strict = NamespaceLoader::new(dir.path());
    assert!(matches!(
        strict.resolve("Broken"),
        Err(UdfError::TypeDefinitionInvalid {
            reason: DefineError::Verify(_),
            ..
        })
    ));

    let mut loader_config = LoaderConfig::new(dir.path());
    loader_config.verify = false;
    let config = RuntimeConfig {
        loader: loader_config,
        ..RuntimeConfig::default()
    };
    let lenient = NamespaceLoader::from_config(&config);
    assert!(lenient.resolve("Broken").is_ok());
}

#[test]
fn test_oversized_locals_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_class(dir.path(), "Wide", &oversized_locals_class("Wide"));

    let loader = NamespaceLoader::new(dir.path());
    match loader.resolve("Wide") {
        Err(UdfError::TypeDefinitionInvalid {
            name,
            reason: DefineError::Verify(VerifyError::InMethod { error, .. }),
        }) => {
            assert_eq!(name, "Wide");
            assert!(matches!(*error, VerifyError::TooManyLocals { .. }));
        }
        other => panic!("Expected TooManyLocals, got {:?}", other),
    }
    assert!(!loader.is_loaded("Wide"));

    // Without verification the interpreter refuses the frame instead of allocating it
    let mut loader_config = LoaderConfig::new(dir.path());
    loader_config.verify = false;
    let lenient = NamespaceLoader::from_config(&RuntimeConfig {
        loader: loader_config,
        ..RuntimeConfig::default()
    });
    let ty = lenient.resolve("Wide").unwrap();
    let handle = MethodHandle::first(&ty).unwrap();
    assert!(matches!(
        lenient.invoker().invoke_row(&handle, &[]),
        Err(UdfError::TargetInvocationFailed {
            source: VmError::TooManyLocals(_),
            ..
        })
    ));
}

#[test]
fn test_custom_extension() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Math.bin"), math_class("Math").encode()).unwrap();

    let mut loader_config = LoaderConfig::new(dir.path());
    loader_config.extension = "bin".to_string();
    let config = RuntimeConfig {
        loader: loader_config,
        ..RuntimeConfig::default()
    };

    let loader = NamespaceLoader::from_config(&config);
    assert!(loader.resolve("Math").is_ok());
}

#[test]
fn test_concurrent_first_resolution() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_class(dir.path(), "Math", &math_class("Math"));
    let loader = Arc::new(NamespaceLoader::new(dir.path()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let loader = Arc::clone(&loader);
            thread::spawn(move || loader.resolve("Math").unwrap())
        })
        .collect();
    let types: Vec<Arc<LoadedType>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for ty in &types[1..] {
        assert!(Arc::ptr_eq(&types[0], ty));
    }
    assert_eq!(loader.len(), 1);
}

struct CountingDefiner {
    inner: BytecodeDefiner,
    calls: Arc<std::sync::atomic::AtomicUsize>,
}

impl TypeDefiner for CountingDefiner {
    fn define(
        &self,
        name: &str,
        bytes: &[u8],
        namespace: NamespaceId,
    ) -> Result<LoadedType, DefineError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.inner.define(name, bytes, namespace)
    }
}

#[test]
fn test_definer_called_once_per_name() {
    let dir = tempfile::tempdir().unwrap();
    write_class(dir.path(), "A", &math_class("A"));
    write_class(dir.path(), "B", &math_class("B"));

    let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let loader = NamespaceLoader::with_definer(
        dir.path(),
        CountingDefiner {
            inner: BytecodeDefiner::default(),
            calls: Arc::clone(&calls),
        },
    );

    for _ in 0..3 {
        loader.resolve("A").unwrap();
        loader.resolve("B").unwrap();
    }
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[test]
fn test_resolver_trait_object() {
    let dir = tempfile::tempdir().unwrap();
    write_class(dir.path(), "Math", &math_class("Math"));
    let loader = NamespaceLoader::new(dir.path());

    let resolver: &dyn TypeResolver = &loader;
    let ty = resolver.resolve("Math").unwrap();
    assert_eq!(ty.namespace(), resolver.namespace());
    assert_eq!(resolver.invoker().namespace(), loader.namespace());
}

#[test]
fn test_display_shows_path_and_oid() {
    let loader = NamespaceLoader::new("/srv/udf");
    let text = loader.to_string();
    assert!(text.starts_with("NamespaceLoader{path='/srv/udf', oid="));
    assert!(text.ends_with('}'));
}
