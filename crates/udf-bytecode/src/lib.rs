//! UDF Bytecode Definitions
//!
//! This crate provides the binary class format (`.udfc`) that user-defined
//! functions are shipped in: the instruction set, the constant pool, the
//! class and method tables, and a structural verifier.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod class;
pub mod constants;
pub mod encoder;
pub mod opcode;
pub mod types;
pub mod verify;

pub use class::{access, ClassError, ClassFile, MethodDef};
pub use constants::ConstantPool;
pub use encoder::{BytecodeReader, BytecodeWriter, DecodeError};
pub use opcode::Opcode;
pub use types::{Primitive, TypeName};
pub use verify::{verify_class, VerifyError, MAX_LOCALS, MAX_STACK_DEPTH};
