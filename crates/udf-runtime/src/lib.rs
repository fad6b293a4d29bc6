//! UDF Runtime
//!
//! Loads user-defined functions at runtime and calls them over columnar
//! batches:
//!
//! - [`NamespaceLoader`] resolves type names to `.udfc` files under a base
//!   directory and defines them into a private namespace.
//! - [`describe`] renders a method's signature as a JVM-style descriptor.
//! - [`BatchInvoker`] calls one [`MethodHandle`] once per row of a
//!   [`RowBatch`] and returns the boxed results.
//! - [`StaticRegistry`] exposes Rust closures through the same handles.
//!
//! ```no_run
//! use udf_runtime::{unbox, Column, MethodHandle, NamespaceLoader, RowBatch};
//!
//! # fn main() -> udf_runtime::UdfResult<()> {
//! let loader = NamespaceLoader::new("/opt/udfs");
//! let ty = loader.resolve("com.acme.Add")?;
//! let handle = MethodHandle::first(&ty)?;
//!
//! let batch = RowBatch::new(vec![
//!     Column::from(vec![1i32, 2, 3]),
//!     Column::from(vec![10i32, 20, 30]),
//! ])?;
//! let results = loader.invoker().invoke_all(&handle, &batch)?;
//! assert_eq!(unbox::<i32>(&results)?, vec![11, 22, 33]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod batch;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod handle;
pub mod interpreter;
pub mod invoker;
pub mod loaded_type;
pub mod loader;
pub mod namespace;
pub mod registry;
pub mod value;

pub use batch::{unbox, Column, RowBatch, Unbox};
pub use config::{ConfigError, InvokeOptions, LoaderConfig, RuntimeConfig};
pub use descriptor::{describe, describe_signature, type_code, Descriptor, TypeInfo};
pub use error::{DefineError, UdfError, UdfResult, VmError};
pub use handle::MethodHandle;
pub use interpreter::{Interpreter, VmResult};
pub use invoker::BatchInvoker;
pub use loaded_type::{DeclaredMethod, LoadedType, MethodSignature, NativeFn};
pub use loader::{BytecodeDefiner, NamespaceLoader, TypeDefiner};
pub use namespace::{NamespaceId, TypeResolver};
pub use registry::{StaticRegistry, StaticTypeBuilder};
pub use value::Value;
