//! Bytecode verification
//!
//! Structural checks run before a class is handed to the interpreter. A class
//! that passes cannot make the interpreter read past its code, jump into the
//! middle of an instruction, underflow its value stack, or index a missing
//! local, constant or method.

use crate::class::{ClassFile, MethodDef};
use crate::encoder::{BytecodeReader, DecodeError};
use crate::opcode::Opcode;
use crate::types::TypeName;
use rustc_hash::FxHashMap;

/// Maximum value stack depth a method may reach
pub const MAX_STACK_DEPTH: usize = 1024;

/// Maximum local slots a method may declare (`LOAD_LOCAL` takes a u16)
pub const MAX_LOCALS: usize = 1 << 16;

/// Bytecode verification errors
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// Invalid opcode
    #[error("Invalid opcode {opcode:#x} at offset {offset}")]
    InvalidOpcode {
        /// The offending byte
        opcode: u8,
        /// Offset of the byte in the method body
        offset: usize,
    },

    /// Truncated operands or similar
    #[error("Decode error: {0}")]
    DecodeError(#[from] DecodeError),

    /// Stack underflow
    #[error("Stack underflow at offset {0}")]
    StackUnderflow(usize),

    /// Stack overflow
    #[error("Stack overflow at offset {0} (depth: {1})")]
    StackOverflow(usize, usize),

    /// Two paths reach an instruction with different stack depths
    #[error("Inconsistent stack depth at offset {offset}: {first} vs {second}")]
    StackMismatch {
        /// Offset of the join point
        offset: usize,
        /// Depth recorded first
        first: usize,
        /// Conflicting depth
        second: usize,
    },

    /// Invalid jump target
    #[error("Invalid jump target {target} at offset {offset}")]
    InvalidJumpTarget {
        /// Computed absolute target
        target: i64,
        /// Offset of the jump instruction
        offset: usize,
    },

    /// Invalid constant pool reference
    #[error("Invalid constant pool reference: index {index} at offset {offset}")]
    InvalidConstantRef {
        /// Pool index
        index: u32,
        /// Offset of the instruction
        offset: usize,
    },

    /// Invalid local variable reference
    #[error("Invalid local variable reference: index {index} (max {max}) at offset {offset}")]
    InvalidLocalRef {
        /// Local slot
        index: usize,
        /// Number of slots the method declares
        max: usize,
        /// Offset of the instruction
        offset: usize,
    },

    /// Call to a method index outside the class
    #[error("Invalid call target {index} at offset {offset}")]
    InvalidCallTarget {
        /// Method index operand
        index: u32,
        /// Offset of the instruction
        offset: usize,
    },

    /// Call passes the wrong number of arguments
    #[error("Call at offset {offset} passes {found} arguments, target takes {expected}")]
    CallArityMismatch {
        /// Target's parameter count
        expected: usize,
        /// Argument count operand
        found: usize,
        /// Offset of the instruction
        offset: usize,
    },

    /// Fewer local slots than parameters
    #[error("Method declares {locals} locals but takes {params} parameters")]
    TooFewLocals {
        /// Declared local slots
        locals: usize,
        /// Formal parameters
        params: usize,
    },

    /// More local slots than a `u16` operand can address
    #[error("Method declares {locals} locals, limit is {max}")]
    TooManyLocals {
        /// Declared local slots
        locals: usize,
        /// Maximum allowed
        max: usize,
    },

    /// Unparseable parameter or return type name
    #[error("Invalid type name '{0}'")]
    InvalidTypeName(String),

    /// Same name and parameter list declared twice
    #[error("Duplicate method '{0}'")]
    DuplicateMethod(String),

    /// Execution falls off end
    #[error("Execution falls off end of method at offset {0}")]
    FallOffEnd(usize),

    /// Error located in one method of a class
    #[error("In method '{method}': {error}")]
    InMethod {
        /// Method name
        method: String,
        /// Underlying error
        #[source]
        error: Box<VerifyError>,
    },
}

/// Verify every method of a class
pub fn verify_class(class: &ClassFile) -> Result<(), VerifyError> {
    for (i, method) in class.methods.iter().enumerate() {
        let duplicate = class.methods[..i]
            .iter()
            .any(|m| m.name == method.name && m.param_types == method.param_types);
        if duplicate {
            return Err(VerifyError::DuplicateMethod(method.name.clone()));
        }

        verify_method(method, class).map_err(|error| VerifyError::InMethod {
            method: method.name.clone(),
            error: Box::new(error),
        })?;
    }

    Ok(())
}

/// Verify a single method's signature and bytecode
fn verify_method(method: &MethodDef, class: &ClassFile) -> Result<(), VerifyError> {
    verify_signature(method)?;

    let instructions = parse_instructions(&method.code)?;

    verify_constant_refs(&instructions, class)?;
    verify_local_refs(&instructions, method)?;
    verify_calls(&instructions, class)?;
    verify_stack_depth(&instructions)?;

    Ok(())
}

fn verify_signature(method: &MethodDef) -> Result<(), VerifyError> {
    for param in &method.param_types {
        match TypeName::parse(param) {
            Some(t) if !t.is_void() => {}
            _ => return Err(VerifyError::InvalidTypeName(param.clone())),
        }
    }
    if TypeName::parse(&method.return_type).is_none() {
        return Err(VerifyError::InvalidTypeName(method.return_type.clone()));
    }

    if method.local_count > MAX_LOCALS {
        return Err(VerifyError::TooManyLocals {
            locals: method.local_count,
            max: MAX_LOCALS,
        });
    }

    if method.local_count < method.param_count() {
        return Err(VerifyError::TooFewLocals {
            locals: method.local_count,
            params: method.param_count(),
        });
    }

    Ok(())
}

/// Parsed instruction
#[derive(Debug, Clone)]
struct Instruction {
    offset: usize,
    opcode: Opcode,
    operands: Vec<u8>,
}

impl Instruction {
    fn operand_u16(&self) -> u16 {
        self.operand_u16_at(0)
    }

    fn operand_u16_at(&self, at: usize) -> u16 {
        u16::from_le_bytes([self.operands[at], self.operands[at + 1]])
    }

    fn operand_u32(&self) -> u32 {
        u32::from_le_bytes([
            self.operands[0],
            self.operands[1],
            self.operands[2],
            self.operands[3],
        ])
    }

    fn next_offset(&self) -> usize {
        self.offset + 1 + self.operands.len()
    }

    /// Absolute jump target: relative to the end of the operand
    fn jump_target(&self) -> i64 {
        self.next_offset() as i64 + self.operand_u32() as i32 as i64
    }
}

/// Parse all instructions from bytecode
fn parse_instructions(code: &[u8]) -> Result<Vec<Instruction>, VerifyError> {
    let mut instructions = Vec::new();
    let mut reader = BytecodeReader::new(code);

    while reader.has_more() {
        let offset = reader.position();
        let byte = reader.read_u8()?;

        let opcode = Opcode::from_u8(byte).ok_or(VerifyError::InvalidOpcode {
            opcode: byte,
            offset,
        })?;

        let operands = reader.read_bytes(opcode.operand_size())?;

        instructions.push(Instruction {
            offset,
            opcode,
            operands,
        });
    }

    Ok(instructions)
}

/// Get the stack effect of an opcode (pops, pushes)
fn stack_effect(instr: &Instruction) -> (usize, usize) {
    use Opcode::*;
    match instr.opcode {
        Nop | Jmp | ReturnVoid | Trap => (0, 0),
        Pop => (1, 0),
        Dup => (1, 2),
        Swap => (2, 2),
        ConstNull | ConstTrue | ConstFalse | ConstI32 | ConstF64 | ConstStr | ConstI64 => (0, 1),
        LoadLocal | LoadLocal0 | LoadLocal1 => (0, 1),
        StoreLocal | StoreLocal0 | StoreLocal1 => (1, 0),
        Iadd | Isub | Imul | Idiv | Imod => (2, 1),
        Ladd | Lsub | Lmul | Ldiv | Lmod => (2, 1),
        Fadd | Fsub | Fmul | Fdiv => (2, 1),
        Ineg | Lneg | Fneg => (1, 1),
        I2L | I2D | L2I | L2D | D2I | D2L => (1, 1),
        Ieq | Ine | Ilt | Ile | Igt | Ige | Lcmp => (2, 1),
        Feq | Fne | Flt | Fle | Fgt | Fge => (2, 1),
        Eq | Ne | And | Or => (2, 1),
        Not => (1, 1),
        Sconcat | Seq => (2, 1),
        Slen | ToString => (1, 1),
        JmpIfFalse | JmpIfTrue | JmpIfNull | JmpIfNotNull => (1, 0),
        Return | Throw => (1, 0),
        CallStatic => (instr.operand_u16_at(4) as usize, 1),
        LoadElem => (2, 1),
        ArrayLen => (1, 1),
    }
}

/// Verify stack depth consistency by walking every reachable path.
///
/// Each instruction must be reached with one depth. Jumps must land on an
/// instruction boundary and the last reachable instruction on any path
/// must be a terminator.
fn verify_stack_depth(instructions: &[Instruction]) -> Result<(), VerifyError> {
    if instructions.is_empty() {
        return Err(VerifyError::FallOffEnd(0));
    }

    let index_of: FxHashMap<usize, usize> = instructions
        .iter()
        .enumerate()
        .map(|(i, instr)| (instr.offset, i))
        .collect();

    let mut depth_at: Vec<Option<usize>> = vec![None; instructions.len()];
    let mut worklist = vec![(0usize, 0usize)];

    while let Some((index, depth)) = worklist.pop() {
        let instr = &instructions[index];
        match depth_at[index] {
            Some(first) if first == depth => continue,
            Some(first) => {
                return Err(VerifyError::StackMismatch {
                    offset: instr.offset,
                    first,
                    second: depth,
                })
            }
            None => depth_at[index] = Some(depth),
        }

        let (pops, pushes) = stack_effect(instr);
        if depth < pops {
            return Err(VerifyError::StackUnderflow(instr.offset));
        }
        let next_depth = depth - pops + pushes;
        if next_depth > MAX_STACK_DEPTH {
            return Err(VerifyError::StackOverflow(instr.offset, next_depth));
        }

        if instr.opcode.is_jump() {
            let target = instr.jump_target();
            let target_index = usize::try_from(target)
                .ok()
                .and_then(|t| index_of.get(&t).copied())
                .ok_or(VerifyError::InvalidJumpTarget {
                    target,
                    offset: instr.offset,
                })?;
            worklist.push((target_index, next_depth));
        }

        // Unconditional transfers have no fall-through successor
        let falls_through = !matches!(
            instr.opcode,
            Opcode::Jmp | Opcode::Return | Opcode::ReturnVoid | Opcode::Throw | Opcode::Trap
        );
        if falls_through {
            if index + 1 >= instructions.len() {
                return Err(VerifyError::FallOffEnd(instr.offset));
            }
            worklist.push((index + 1, next_depth));
        }
    }

    Ok(())
}

/// Verify constant pool references in instructions
fn verify_constant_refs(instructions: &[Instruction], class: &ClassFile) -> Result<(), VerifyError> {
    for instr in instructions {
        let valid = match instr.opcode {
            Opcode::ConstStr => class.constants.get_string(instr.operand_u32()).is_some(),
            Opcode::ConstI64 => class.constants.get_integer(instr.operand_u32()).is_some(),
            _ => continue,
        };
        if !valid {
            return Err(VerifyError::InvalidConstantRef {
                index: instr.operand_u32(),
                offset: instr.offset,
            });
        }
    }

    Ok(())
}

/// Verify local variable references in instructions
fn verify_local_refs(instructions: &[Instruction], method: &MethodDef) -> Result<(), VerifyError> {
    let max_locals = method.local_count;

    for instr in instructions {
        let index = match instr.opcode {
            Opcode::LoadLocal | Opcode::StoreLocal => instr.operand_u16() as usize,
            Opcode::LoadLocal0 | Opcode::StoreLocal0 => 0,
            Opcode::LoadLocal1 | Opcode::StoreLocal1 => 1,
            _ => continue,
        };
        if index >= max_locals {
            return Err(VerifyError::InvalidLocalRef {
                index,
                max: max_locals,
                offset: instr.offset,
            });
        }
    }

    Ok(())
}

/// Verify static call targets and argument counts
fn verify_calls(instructions: &[Instruction], class: &ClassFile) -> Result<(), VerifyError> {
    for instr in instructions.iter().filter(|i| i.opcode == Opcode::CallStatic) {
        let index = instr.operand_u32();
        let arg_count = instr.operand_u16_at(4) as usize;

        let target = class
            .methods
            .get(index as usize)
            .ok_or(VerifyError::InvalidCallTarget {
                index,
                offset: instr.offset,
            })?;
        if target.param_count() != arg_count {
            return Err(VerifyError::CallArityMismatch {
                expected: target.param_count(),
                found: arg_count,
                offset: instr.offset,
            });
        }
    }

    Ok(())
}
