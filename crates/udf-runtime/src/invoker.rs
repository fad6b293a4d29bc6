//! Batched invocation
//!
//! Calls one resolved method once per row of a [`RowBatch`] and collects the
//! boxed results into a parallel column.

use crate::batch::RowBatch;
use crate::config::InvokeOptions;
use crate::error::{UdfError, UdfResult, VmError};
use crate::handle::MethodHandle;
use crate::interpreter::{coerce_return, Interpreter};
use crate::loaded_type::TypeBody;
use crate::namespace::NamespaceId;
use crate::value::Value;
use tracing::debug;

/// Invokes methods of one namespace
#[derive(Debug, Clone)]
pub struct BatchInvoker {
    namespace: NamespaceId,
    interpreter: Interpreter,
}

impl BatchInvoker {
    /// Create an invoker for `namespace`
    pub fn new(namespace: NamespaceId, options: InvokeOptions) -> Self {
        Self {
            namespace,
            interpreter: Interpreter::new(options),
        }
    }

    /// Namespace this invoker accepts handles from
    pub fn namespace(&self) -> NamespaceId {
        self.namespace
    }

    /// Invoke once per row and return the results
    pub fn invoke_all(&self, handle: &MethodHandle, batch: &RowBatch) -> UdfResult<Vec<Value>> {
        let mut outputs = vec![Value::Null; batch.rows()];
        self.invoke_all_into(handle, &mut outputs, batch)?;
        Ok(outputs)
    }

    /// Invoke once per row, writing row `i`'s result to `outputs[i]`.
    ///
    /// All checks run before the first row. If a row fails, the rows before
    /// it keep their results and the error names the failing row.
    pub fn invoke_all_into(
        &self,
        handle: &MethodHandle,
        outputs: &mut [Value],
        batch: &RowBatch,
    ) -> UdfResult<()> {
        self.check_handle(handle)?;

        if batch.width() != handle.arity() {
            return Err(UdfError::ArityMismatch {
                method: handle.qualified_name(),
                expected: handle.arity(),
                found: batch.width(),
            });
        }

        let rows = batch.rows();
        if outputs.len() < rows {
            return Err(UdfError::BatchLengthMismatch {
                what: "output".to_string(),
                expected: rows,
                found: outputs.len(),
            });
        }

        debug!(method = %handle, rows, "batch invoke");

        let mut args = Vec::with_capacity(batch.width());
        for (row, slot) in outputs.iter_mut().enumerate().take(rows) {
            batch.fill_row(row, &mut args)?;
            *slot = self
                .call(handle, &args)
                .map_err(|source| UdfError::TargetInvocationFailed {
                    method: handle.qualified_name(),
                    row: Some(row),
                    source,
                })?;
        }

        Ok(())
    }

    /// Invoke once with explicit arguments
    pub fn invoke_row(&self, handle: &MethodHandle, args: &[Value]) -> UdfResult<Value> {
        self.check_handle(handle)?;

        if args.len() != handle.arity() {
            return Err(UdfError::ArityMismatch {
                method: handle.qualified_name(),
                expected: handle.arity(),
                found: args.len(),
            });
        }

        self.call(handle, args)
            .map_err(|source| UdfError::TargetInvocationFailed {
                method: handle.qualified_name(),
                row: None,
                source,
            })
    }

    fn check_handle(&self, handle: &MethodHandle) -> UdfResult<()> {
        if handle.namespace() != self.namespace {
            return Err(UdfError::ForeignHandle {
                expected: self.namespace,
                found: handle.namespace(),
            });
        }
        if !handle.is_accessible() {
            return Err(UdfError::AccessDenied(handle.qualified_name()));
        }
        Ok(())
    }

    fn call(&self, handle: &MethodHandle, args: &[Value]) -> Result<Value, VmError> {
        match &handle.owner().body {
            TypeBody::Bytecode(class) => self.interpreter.invoke(class, handle.index(), args),
            TypeBody::Native(bodies) => {
                let body = bodies
                    .get(handle.index())
                    .ok_or(VmError::InvalidCallTarget(handle.index() as u32))?;
                let value = body(args)?;
                coerce_return(value, &handle.signature().return_type)
            }
        }
    }
}
