//! Stack interpreter for UDF method bodies
//!
//! Executes one method of a [`ClassFile`] against a row of boxed arguments.
//! Static calls between methods of the same class push an explicit frame,
//! so call depth is bounded by [`InvokeOptions::max_call_depth`] rather
//! than by the host stack.
//!
//! The interpreter bounds-checks everything it reads. Verified classes never
//! trip these checks; unverified ones fail with a [`VmError`] instead of
//! panicking.

use crate::config::InvokeOptions;
use crate::error::VmError;
use crate::value::Value;
use std::sync::Arc;
use tracing::trace;
use udf_bytecode::{ClassFile, MethodDef, Opcode, Primitive, MAX_LOCALS};

/// Result of executing bytecode
pub type VmResult<T> = Result<T, VmError>;

/// Executes method bodies
#[derive(Debug, Clone, Copy, Default)]
pub struct Interpreter {
    options: InvokeOptions,
}

/// Activation record of one method
struct Frame<'c> {
    method: &'c MethodDef,
    ip: usize,
    locals: Vec<Value>,
    /// Caller's stack floor, restored on return
    saved_floor: usize,
}

impl<'c> Frame<'c> {
    fn new(method: &'c MethodDef, mut args: Vec<Value>, saved_floor: usize) -> VmResult<Self> {
        let slots = method.local_count.max(args.len());
        if slots > MAX_LOCALS {
            return Err(VmError::TooManyLocals(slots));
        }
        args.resize(slots, Value::Null);
        Ok(Self {
            method,
            ip: 0,
            locals: args,
            saved_floor,
        })
    }

    fn code(&self) -> &'c [u8] {
        &self.method.code
    }

    fn read<const N: usize>(&mut self) -> VmResult<[u8; N]> {
        let code = self.code();
        let bytes = code
            .get(self.ip..self.ip + N)
            .ok_or(VmError::UnexpectedEnd(self.ip))?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.ip += N;
        Ok(out)
    }

    fn read_u16(&mut self) -> VmResult<u16> {
        self.read().map(u16::from_le_bytes)
    }

    fn read_u32(&mut self) -> VmResult<u32> {
        self.read().map(u32::from_le_bytes)
    }

    fn read_i32(&mut self) -> VmResult<i32> {
        self.read().map(i32::from_le_bytes)
    }

    fn read_f64(&mut self) -> VmResult<f64> {
        self.read().map(f64::from_le_bytes)
    }

    /// Apply a relative jump (relative to the end of the operand)
    fn jump(&mut self, relative: i32) -> VmResult<()> {
        let target = self.ip as i64 + relative as i64;
        if target < 0 || target >= self.code().len() as i64 {
            return Err(VmError::InvalidJump(target));
        }
        self.ip = target as usize;
        Ok(())
    }

    fn load(&self, index: usize) -> VmResult<Value> {
        self.locals
            .get(index)
            .cloned()
            .ok_or(VmError::InvalidLocal(index))
    }

    fn store(&mut self, index: usize, value: Value) -> VmResult<()> {
        let slot = self
            .locals
            .get_mut(index)
            .ok_or(VmError::InvalidLocal(index))?;
        *slot = value;
        Ok(())
    }
}

/// Operand stack shared by all frames of one invocation
struct ValueStack {
    values: Vec<Value>,
    /// Values below the floor belong to callers
    floor: usize,
}

impl ValueStack {
    fn new() -> Self {
        Self {
            values: Vec::with_capacity(16),
            floor: 0,
        }
    }

    fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    fn pop(&mut self) -> VmResult<Value> {
        if self.values.len() <= self.floor {
            return Err(VmError::StackUnderflow);
        }
        self.values.pop().ok_or(VmError::StackUnderflow)
    }

    fn pop_n(&mut self, count: usize) -> VmResult<Vec<Value>> {
        if self.values.len() < self.floor + count {
            return Err(VmError::StackUnderflow);
        }
        Ok(self.values.split_off(self.values.len() - count))
    }

    fn pop_as<T>(
        &mut self,
        opcode: Opcode,
        expected: &'static str,
        read: impl FnOnce(&Value) -> Option<T>,
    ) -> VmResult<T> {
        let value = self.pop()?;
        read(&value).ok_or(VmError::TypeError {
            opcode: opcode.name(),
            expected,
            found: value.type_name(),
        })
    }

    fn pop_int(&mut self, opcode: Opcode) -> VmResult<i32> {
        self.pop_as(opcode, "int", Value::as_int)
    }

    fn pop_long(&mut self, opcode: Opcode) -> VmResult<i64> {
        self.pop_as(opcode, "long", Value::as_long)
    }

    fn pop_double(&mut self, opcode: Opcode) -> VmResult<f64> {
        self.pop_as(opcode, "double", Value::as_double)
    }

    fn pop_bool(&mut self, opcode: Opcode) -> VmResult<bool> {
        self.pop_as(opcode, "boolean", Value::as_bool)
    }

    fn pop_str(&mut self, opcode: Opcode) -> VmResult<Arc<str>> {
        self.pop_as(opcode, "string", |v| match v {
            Value::Str(s) => Some(Arc::clone(s)),
            _ => None,
        })
    }
}

/// Narrow or check a returned value against the declared return type.
///
/// Sub-int primitives travel as `int` on the operand stack and `float`
/// as `double`; they are narrowed back here. `int` widens to `long`, and
/// `int` or `long` widen to `double`. Reference types pass through.
pub(crate) fn coerce_return(value: Value, return_type: &str) -> VmResult<Value> {
    let Some(primitive) = Primitive::from_name(return_type) else {
        return Ok(value);
    };

    let coerced = match primitive {
        Primitive::Void => Some(Value::Null),
        Primitive::Boolean => value.as_bool().map(Value::Bool),
        Primitive::Byte => value.as_int().map(|v| Value::Byte(v as i8)),
        Primitive::Char => value.as_int().map(|v| Value::Char(v as u16)),
        Primitive::Short => value.as_int().map(|v| Value::Short(v as i16)),
        Primitive::Int => value.as_int().map(Value::Int),
        Primitive::Long => value
            .as_long()
            .or_else(|| value.as_int().map(i64::from))
            .map(Value::Long),
        Primitive::Float => value.as_double().map(|v| Value::Float(v as f32)),
        Primitive::Double => value
            .as_double()
            .or_else(|| value.as_int().map(f64::from))
            .or_else(|| value.as_long().map(|v| v as f64))
            .map(Value::Double),
    };

    coerced.ok_or(VmError::TypeError {
        opcode: Opcode::Return.name(),
        expected: primitive.name(),
        found: value.type_name(),
    })
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_int(), b.as_int()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

impl Interpreter {
    /// Create an interpreter with the given limits
    pub fn new(options: InvokeOptions) -> Self {
        Self { options }
    }

    /// Limits in effect
    pub fn options(&self) -> &InvokeOptions {
        &self.options
    }

    /// Run `class.methods[method_index]` with `args` as its leading locals
    pub fn invoke(&self, class: &ClassFile, method_index: usize, args: &[Value]) -> VmResult<Value> {
        let method = class
            .methods
            .get(method_index)
            .ok_or(VmError::InvalidCallTarget(method_index as u32))?;
        if self.options.max_call_depth == 0 {
            return Err(VmError::StackOverflow(1));
        }

        let mut stack = ValueStack::new();
        let mut frame = Frame::new(method, args.to_vec(), 0)?;
        let mut callers: Vec<Frame<'_>> = Vec::new();

        loop {
            let offset = frame.ip;
            let byte = *frame
                .code()
                .get(offset)
                .ok_or(VmError::UnexpectedEnd(offset))?;
            let opcode = Opcode::from_u8(byte).ok_or(VmError::InvalidOpcode(byte))?;
            frame.ip += 1;

            match opcode {
                // Stack manipulation
                Opcode::Nop => {}
                Opcode::Pop => {
                    stack.pop()?;
                }
                Opcode::Dup => {
                    let v = stack.pop()?;
                    stack.push(v.clone());
                    stack.push(v);
                }
                Opcode::Swap => {
                    let b = stack.pop()?;
                    let a = stack.pop()?;
                    stack.push(b);
                    stack.push(a);
                }

                // Constants
                Opcode::ConstNull => stack.push(Value::Null),
                Opcode::ConstTrue => stack.push(Value::Bool(true)),
                Opcode::ConstFalse => stack.push(Value::Bool(false)),
                Opcode::ConstI32 => {
                    let v = frame.read_i32()?;
                    stack.push(Value::Int(v));
                }
                Opcode::ConstF64 => {
                    let v = frame.read_f64()?;
                    stack.push(Value::Double(v));
                }
                Opcode::ConstStr => {
                    let index = frame.read_u32()?;
                    let s = class
                        .constants
                        .get_string(index)
                        .ok_or(VmError::InvalidConstant(index))?;
                    stack.push(Value::str(s));
                }
                Opcode::ConstI64 => {
                    let index = frame.read_u32()?;
                    let v = class
                        .constants
                        .get_integer(index)
                        .ok_or(VmError::InvalidConstant(index))?;
                    stack.push(Value::Long(v));
                }

                // Local variables
                Opcode::LoadLocal => {
                    let index = frame.read_u16()? as usize;
                    stack.push(frame.load(index)?);
                }
                Opcode::StoreLocal => {
                    let index = frame.read_u16()? as usize;
                    let v = stack.pop()?;
                    frame.store(index, v)?;
                }
                Opcode::LoadLocal0 => stack.push(frame.load(0)?),
                Opcode::LoadLocal1 => stack.push(frame.load(1)?),
                Opcode::StoreLocal0 => {
                    let v = stack.pop()?;
                    frame.store(0, v)?;
                }
                Opcode::StoreLocal1 => {
                    let v = stack.pop()?;
                    frame.store(1, v)?;
                }

                // Int arithmetic (wrapping)
                Opcode::Iadd | Opcode::Isub | Opcode::Imul | Opcode::Idiv | Opcode::Imod => {
                    let b = stack.pop_int(opcode)?;
                    let a = stack.pop_int(opcode)?;
                    let result = match opcode {
                        Opcode::Iadd => a.wrapping_add(b),
                        Opcode::Isub => a.wrapping_sub(b),
                        Opcode::Imul => a.wrapping_mul(b),
                        _ if b == 0 => return Err(VmError::DivisionByZero),
                        Opcode::Idiv => a.wrapping_div(b),
                        _ => a.wrapping_rem(b),
                    };
                    stack.push(Value::Int(result));
                }
                Opcode::Ineg => {
                    let a = stack.pop_int(opcode)?;
                    stack.push(Value::Int(a.wrapping_neg()));
                }

                // Long arithmetic (wrapping)
                Opcode::Ladd | Opcode::Lsub | Opcode::Lmul | Opcode::Ldiv | Opcode::Lmod => {
                    let b = stack.pop_long(opcode)?;
                    let a = stack.pop_long(opcode)?;
                    let result = match opcode {
                        Opcode::Ladd => a.wrapping_add(b),
                        Opcode::Lsub => a.wrapping_sub(b),
                        Opcode::Lmul => a.wrapping_mul(b),
                        _ if b == 0 => return Err(VmError::DivisionByZero),
                        Opcode::Ldiv => a.wrapping_div(b),
                        _ => a.wrapping_rem(b),
                    };
                    stack.push(Value::Long(result));
                }
                Opcode::Lneg => {
                    let a = stack.pop_long(opcode)?;
                    stack.push(Value::Long(a.wrapping_neg()));
                }

                // Double arithmetic
                Opcode::Fadd | Opcode::Fsub | Opcode::Fmul | Opcode::Fdiv => {
                    let b = stack.pop_double(opcode)?;
                    let a = stack.pop_double(opcode)?;
                    let result = match opcode {
                        Opcode::Fadd => a + b,
                        Opcode::Fsub => a - b,
                        Opcode::Fmul => a * b,
                        _ => a / b,
                    };
                    stack.push(Value::Double(result));
                }
                Opcode::Fneg => {
                    let a = stack.pop_double(opcode)?;
                    stack.push(Value::Double(-a));
                }

                // Conversions (float to integer saturates, NaN becomes 0)
                Opcode::I2L => {
                    let v = stack.pop_int(opcode)?;
                    stack.push(Value::Long(v as i64));
                }
                Opcode::I2D => {
                    let v = stack.pop_int(opcode)?;
                    stack.push(Value::Double(v as f64));
                }
                Opcode::L2I => {
                    let v = stack.pop_long(opcode)?;
                    stack.push(Value::Int(v as i32));
                }
                Opcode::L2D => {
                    let v = stack.pop_long(opcode)?;
                    stack.push(Value::Double(v as f64));
                }
                Opcode::D2I => {
                    let v = stack.pop_double(opcode)?;
                    stack.push(Value::Int(v as i32));
                }
                Opcode::D2L => {
                    let v = stack.pop_double(opcode)?;
                    stack.push(Value::Long(v as i64));
                }

                // Comparison
                Opcode::Ieq | Opcode::Ine | Opcode::Ilt | Opcode::Ile | Opcode::Igt | Opcode::Ige => {
                    let b = stack.pop_int(opcode)?;
                    let a = stack.pop_int(opcode)?;
                    let result = match opcode {
                        Opcode::Ieq => a == b,
                        Opcode::Ine => a != b,
                        Opcode::Ilt => a < b,
                        Opcode::Ile => a <= b,
                        Opcode::Igt => a > b,
                        _ => a >= b,
                    };
                    stack.push(Value::Bool(result));
                }
                Opcode::Lcmp => {
                    let b = stack.pop_long(opcode)?;
                    let a = stack.pop_long(opcode)?;
                    stack.push(Value::Int(a.cmp(&b) as i32));
                }
                Opcode::Feq | Opcode::Fne | Opcode::Flt | Opcode::Fle | Opcode::Fgt | Opcode::Fge => {
                    let b = stack.pop_double(opcode)?;
                    let a = stack.pop_double(opcode)?;
                    let result = match opcode {
                        Opcode::Feq => a == b,
                        Opcode::Fne => a != b,
                        Opcode::Flt => a < b,
                        Opcode::Fle => a <= b,
                        Opcode::Fgt => a > b,
                        _ => a >= b,
                    };
                    stack.push(Value::Bool(result));
                }
                Opcode::Eq | Opcode::Ne => {
                    let b = stack.pop()?;
                    let a = stack.pop()?;
                    let equal = values_equal(&a, &b);
                    stack.push(Value::Bool(if opcode == Opcode::Eq { equal } else { !equal }));
                }

                // Logical
                Opcode::Not => {
                    let v = stack.pop_bool(opcode)?;
                    stack.push(Value::Bool(!v));
                }
                Opcode::And | Opcode::Or => {
                    let b = stack.pop_bool(opcode)?;
                    let a = stack.pop_bool(opcode)?;
                    let result = if opcode == Opcode::And { a && b } else { a || b };
                    stack.push(Value::Bool(result));
                }

                // Strings
                Opcode::Sconcat => {
                    let b = stack.pop()?;
                    let a = stack.pop()?;
                    stack.push(Value::from(format!("{}{}", a, b)));
                }
                Opcode::Slen => {
                    let s = stack.pop_str(opcode)?;
                    stack.push(Value::Int(s.chars().count() as i32));
                }
                Opcode::Seq => {
                    let b = stack.pop_str(opcode)?;
                    let a = stack.pop_str(opcode)?;
                    stack.push(Value::Bool(a == b));
                }
                Opcode::ToString => {
                    let v = stack.pop()?;
                    stack.push(Value::from(v.to_string()));
                }

                // Control flow
                Opcode::Jmp => {
                    let relative = frame.read_i32()?;
                    frame.jump(relative)?;
                }
                Opcode::JmpIfFalse | Opcode::JmpIfTrue => {
                    let relative = frame.read_i32()?;
                    let condition = stack.pop_bool(opcode)?;
                    if condition == (opcode == Opcode::JmpIfTrue) {
                        frame.jump(relative)?;
                    }
                }
                Opcode::JmpIfNull | Opcode::JmpIfNotNull => {
                    let relative = frame.read_i32()?;
                    let is_null = stack.pop()?.is_null();
                    if is_null == (opcode == Opcode::JmpIfNull) {
                        frame.jump(relative)?;
                    }
                }

                // Calls and returns
                Opcode::CallStatic => {
                    let index = frame.read_u32()?;
                    let arg_count = frame.read_u16()? as usize;
                    let callee = class
                        .methods
                        .get(index as usize)
                        .ok_or(VmError::InvalidCallTarget(index))?;

                    let depth = callers.len() + 2;
                    if depth > self.options.max_call_depth {
                        return Err(VmError::StackOverflow(depth));
                    }
                    trace!(method = %callee.name, depth, "static call");

                    let args = stack.pop_n(arg_count)?;
                    let callee_frame = Frame::new(callee, args, stack.floor)?;
                    stack.floor = stack.values.len();
                    callers.push(std::mem::replace(&mut frame, callee_frame));
                }
                Opcode::Return | Opcode::ReturnVoid => {
                    let value = if opcode == Opcode::Return {
                        stack.pop()?
                    } else {
                        Value::Null
                    };
                    let value = coerce_return(value, &frame.method.return_type)?;

                    stack.values.truncate(stack.floor);
                    stack.floor = frame.saved_floor;
                    match callers.pop() {
                        Some(caller) => {
                            frame = caller;
                            stack.push(value);
                        }
                        None => return Ok(value),
                    }
                }

                // Arrays
                Opcode::LoadElem => {
                    let index = stack.pop_int(opcode)?;
                    let array = stack.pop()?;
                    let items = array.as_array().ok_or(VmError::TypeError {
                        opcode: opcode.name(),
                        expected: "array",
                        found: array.type_name(),
                    })?;
                    let element = usize::try_from(index)
                        .ok()
                        .and_then(|i| items.get(i))
                        .ok_or(VmError::IndexOutOfBounds {
                            index,
                            len: items.len(),
                        })?;
                    stack.push(element.clone());
                }
                Opcode::ArrayLen => {
                    let len = stack.pop_as(opcode, "array", |v| v.as_array().map(<[Value]>::len))?;
                    stack.push(Value::Int(len as i32));
                }

                // Errors
                Opcode::Throw => {
                    let v = stack.pop()?;
                    return Err(VmError::Thrown(v.to_string()));
                }
                Opcode::Trap => {
                    let code = frame.read_u16()?;
                    return Err(VmError::Trap(code));
                }
            }
        }
    }
}
