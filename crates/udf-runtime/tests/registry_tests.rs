//! Integration tests for natively registered UDFs

mod common;

use common::{init_tracing, math_class, write_class};
use std::sync::Arc;
use udf_runtime::{
    describe, unbox, Column, MethodHandle, NamespaceLoader, RowBatch, StaticRegistry,
    StaticTypeBuilder, TypeResolver, UdfError, Value, VmError,
};

fn int_arg(args: &[Value], i: usize) -> Result<i32, VmError> {
    args.get(i)
        .and_then(Value::as_int)
        .ok_or_else(|| VmError::Native(format!("argument {} is not an int", i)))
}

fn builtins() -> StaticRegistry {
    init_tracing();
    let registry = StaticRegistry::new("builtins");
    registry
        .register(
            StaticTypeBuilder::new("Math")
                .method("add", ["int", "int"], "int", |args| {
                    Ok(Value::Int(int_arg(args, 0)?.wrapping_add(int_arg(args, 1)?)))
                })
                .method("isEven", ["int"], "boolean", |args| {
                    Ok(Value::Bool(int_arg(args, 0)? % 2 == 0))
                }),
        )
        .unwrap();
    registry
        .register(
            StaticTypeBuilder::new("text.Strings").method(
                "length",
                ["java.lang.String"],
                "int",
                |args| match args.first().and_then(Value::as_str) {
                    Some(s) => Ok(Value::Int(s.chars().count() as i32)),
                    None => Err(VmError::Thrown("null string".to_string())),
                },
            ),
        )
        .unwrap();
    registry
}

#[test]
fn test_native_batch_matches_bytecode_batch() {
    let registry = builtins();
    let native_ty = registry.resolve("Math").unwrap();
    let native = MethodHandle::first(&native_ty).unwrap();

    let dir = tempfile::tempdir().unwrap();
    write_class(dir.path(), "Math", &math_class("Math"));
    let loader = NamespaceLoader::new(dir.path());
    let bytecode_ty = loader.resolve("Math").unwrap();
    let bytecode = MethodHandle::first(&bytecode_ty).unwrap();

    let batch = RowBatch::new(vec![
        Column::from(vec![1i32, i32::MAX, -5]),
        Column::from(vec![2i32, 1, 5]),
    ])
    .unwrap();

    let from_native = registry.invoker().invoke_all(&native, &batch).unwrap();
    let from_bytecode = loader.invoker().invoke_all(&bytecode, &batch).unwrap();
    assert_eq!(from_native, from_bytecode);
    assert_eq!(unbox::<i32>(&from_native).unwrap(), vec![3, i32::MIN, 0]);
}

#[test]
fn test_native_descriptors() {
    let registry = builtins();
    let math = registry.resolve("Math").unwrap();
    assert_eq!(describe("isEven", &*math).unwrap(), "(I)Z");

    let strings = registry.resolve("text.Strings").unwrap();
    assert_eq!(describe("length", &*strings).unwrap(), "(Ljava/lang/String;)I");
    assert!(MethodHandle::lookup(&strings, "length", "(Ljava/lang/String;)I").is_ok());
}

#[test]
fn test_native_failure_reports_row() {
    let registry = builtins();
    let ty = registry.resolve("text.Strings").unwrap();
    let handle = MethodHandle::first(&ty).unwrap();

    let batch = RowBatch::new(vec![Column::Boxed(vec![
        Value::str("héllo"),
        Value::Null,
    ])])
    .unwrap();
    let mut outputs = vec![Value::Null; 2];
    let err = registry
        .invoker()
        .invoke_all_into(&handle, &mut outputs, &batch)
        .unwrap_err();

    assert!(matches!(
        err,
        UdfError::TargetInvocationFailed {
            row: Some(1),
            source: VmError::Thrown(_),
            ..
        }
    ));
    assert_eq!(outputs[0], Value::Int(5));
}

#[test]
fn test_registry_and_loader_are_separate_namespaces() {
    let registry = builtins();
    let dir = tempfile::tempdir().unwrap();
    write_class(dir.path(), "Math", &math_class("Math"));
    let loader = NamespaceLoader::new(dir.path());

    let native_ty = registry.resolve("Math").unwrap();
    let loaded_ty = loader.resolve("Math").unwrap();
    assert!(!Arc::ptr_eq(&native_ty, &loaded_ty));
    assert_ne!(native_ty.namespace(), loaded_ty.namespace());

    let handle = MethodHandle::first(&native_ty).unwrap();
    assert!(matches!(
        loader.invoker().invoke_row(&handle, &[Value::Int(1), Value::Int(2)]),
        Err(UdfError::ForeignHandle { .. })
    ));
}

#[test]
fn test_resolvers_are_interchangeable() {
    let registry = builtins();
    let dir = tempfile::tempdir().unwrap();
    write_class(dir.path(), "Math", &math_class("Math"));
    let loader = NamespaceLoader::new(dir.path());

    let resolvers: Vec<&dyn TypeResolver> = vec![&registry, &loader];
    for resolver in resolvers {
        let ty = resolver.resolve("Math").unwrap();
        let handle = MethodHandle::lookup(&ty, "add", "(II)I").unwrap();
        let result = resolver
            .invoker()
            .invoke_row(&handle, &[Value::Int(20), Value::Int(22)])
            .unwrap();
        assert_eq!(result, Value::Int(42));
    }
}

#[test]
fn test_duplicate_registration() {
    let registry = builtins();
    let result = registry.register(StaticTypeBuilder::new("Math"));
    assert!(matches!(result, Err(UdfError::DuplicateType(ref n)) if n == "Math"));
    assert_eq!(registry.type_names(), vec!["Math".to_string(), "text.Strings".to_string()]);
}
