//! Bytecode opcodes for UDF method bodies
//!
//! This module defines the instruction set executed by the UDF interpreter.
//! It is a small stack machine covering scalar functions over the primitive
//! column types, string helpers, and calls between methods of the same class.

/// Bytecode opcode enumeration
///
/// All opcodes are single-byte instructions. Some opcodes take additional operands
/// that follow the opcode byte in the bytecode stream.
///
/// Opcodes are organized into categories:
/// - 0x00-0x0F: Stack manipulation & constants
/// - 0x10-0x1F: Local variables
/// - 0x20-0x27: Int (32-bit) arithmetic
/// - 0x28-0x2F: Long (64-bit) arithmetic
/// - 0x30-0x3F: Double arithmetic
/// - 0x40-0x4F: Numeric conversions
/// - 0x50-0x5F: Int/long comparison
/// - 0x60-0x6F: Double comparison
/// - 0x70-0x7F: Generic comparison & logical
/// - 0x80-0x8F: String operations
/// - 0x90-0x9F: Control flow
/// - 0xA0-0xAF: Calls and returns
/// - 0xC0-0xCF: Array operations
/// - 0xE0-0xEF: Error handling
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ===== Stack Manipulation & Constants (0x00-0x0F) =====
    /// No operation
    Nop = 0x00,
    /// Pop top value from stack
    Pop = 0x01,
    /// Duplicate top stack value
    Dup = 0x02,
    /// Swap top two stack values
    Swap = 0x03,

    /// Push null constant
    ConstNull = 0x04,
    /// Push true constant
    ConstTrue = 0x05,
    /// Push false constant
    ConstFalse = 0x06,
    /// Push 32-bit integer constant (operand: i32)
    ConstI32 = 0x07,
    /// Push 64-bit float constant (operand: f64)
    ConstF64 = 0x08,
    /// Push string constant from pool (operand: u32 index)
    ConstStr = 0x09,
    /// Push 64-bit integer constant from pool (operand: u32 index)
    ConstI64 = 0x0A,

    // ===== Local Variables (0x10-0x1F) =====
    /// Load local variable onto stack (operand: u16 index)
    LoadLocal = 0x10,
    /// Store top of stack to local variable (operand: u16 index)
    StoreLocal = 0x11,
    /// Load local variable 0 (optimized, no operand)
    LoadLocal0 = 0x12,
    /// Load local variable 1 (optimized, no operand)
    LoadLocal1 = 0x13,
    /// Store to local variable 0 (optimized, no operand)
    StoreLocal0 = 0x14,
    /// Store to local variable 1 (optimized, no operand)
    StoreLocal1 = 0x15,

    // ===== Int Arithmetic (0x20-0x27) =====
    /// Int addition (wrapping): pop b, pop a, push a + b
    Iadd = 0x20,
    /// Int subtraction (wrapping): pop b, pop a, push a - b
    Isub = 0x21,
    /// Int multiplication (wrapping): pop b, pop a, push a * b
    Imul = 0x22,
    /// Int division: pop b, pop a, push a / b
    Idiv = 0x23,
    /// Int remainder: pop b, pop a, push a % b
    Imod = 0x24,
    /// Int negation: pop a, push -a
    Ineg = 0x25,

    // ===== Long Arithmetic (0x28-0x2F) =====
    /// Long addition (wrapping): pop b, pop a, push a + b
    Ladd = 0x28,
    /// Long subtraction (wrapping): pop b, pop a, push a - b
    Lsub = 0x29,
    /// Long multiplication (wrapping): pop b, pop a, push a * b
    Lmul = 0x2A,
    /// Long division: pop b, pop a, push a / b
    Ldiv = 0x2B,
    /// Long remainder: pop b, pop a, push a % b
    Lmod = 0x2C,
    /// Long negation: pop a, push -a
    Lneg = 0x2D,

    // ===== Double Arithmetic (0x30-0x3F) =====
    /// Double addition: pop b, pop a, push a + b
    Fadd = 0x30,
    /// Double subtraction: pop b, pop a, push a - b
    Fsub = 0x31,
    /// Double multiplication: pop b, pop a, push a * b
    Fmul = 0x32,
    /// Double division: pop b, pop a, push a / b
    Fdiv = 0x33,
    /// Double negation: pop a, push -a
    Fneg = 0x34,

    // ===== Conversions (0x40-0x4F) =====
    /// Int to long
    I2L = 0x40,
    /// Int to double
    I2D = 0x41,
    /// Long to int (truncating)
    L2I = 0x42,
    /// Long to double
    L2D = 0x43,
    /// Double to int (saturating, NaN becomes 0)
    D2I = 0x44,
    /// Double to long (saturating, NaN becomes 0)
    D2L = 0x45,

    // ===== Int/Long Comparison (0x50-0x5F) =====
    /// Int equality: pop b, pop a, push a == b
    Ieq = 0x50,
    /// Int inequality: pop b, pop a, push a != b
    Ine = 0x51,
    /// Int less than: pop b, pop a, push a < b
    Ilt = 0x52,
    /// Int less or equal: pop b, pop a, push a <= b
    Ile = 0x53,
    /// Int greater than: pop b, pop a, push a > b
    Igt = 0x54,
    /// Int greater or equal: pop b, pop a, push a >= b
    Ige = 0x55,
    /// Long three-way compare: pop b, pop a, push -1, 0 or 1 as int
    Lcmp = 0x56,

    // ===== Double Comparison (0x60-0x6F) =====
    /// Double equality: pop b, pop a, push a == b
    Feq = 0x60,
    /// Double inequality: pop b, pop a, push a != b
    Fne = 0x61,
    /// Double less than: pop b, pop a, push a < b
    Flt = 0x62,
    /// Double less or equal: pop b, pop a, push a <= b
    Fle = 0x63,
    /// Double greater than: pop b, pop a, push a > b
    Fgt = 0x64,
    /// Double greater or equal: pop b, pop a, push a >= b
    Fge = 0x65,

    // ===== Generic Comparison & Logical (0x70-0x7F) =====
    /// Structural equality: pop b, pop a, push a == b
    Eq = 0x70,
    /// Structural inequality: pop b, pop a, push a != b
    Ne = 0x71,
    /// Logical NOT: pop a, push !a
    Not = 0x74,
    /// Logical AND: pop b, pop a, push a && b
    And = 0x75,
    /// Logical OR: pop b, pop a, push a || b
    Or = 0x76,

    // ===== String Operations (0x80-0x8F) =====
    /// String concatenation: pop b, pop a, push a + b
    Sconcat = 0x80,
    /// String length in UTF-16 code units: pop a, push a.length
    Slen = 0x81,
    /// String equality: pop b, pop a, push a == b
    Seq = 0x82,
    /// Convert value to string: pop a, push toString(a)
    ToString = 0x88,

    // ===== Control Flow (0x90-0x9F) =====
    /// Unconditional jump (operand: i32 offset)
    Jmp = 0x90,
    /// Jump if false: pop a, if !a jump (operand: i32 offset)
    JmpIfFalse = 0x91,
    /// Jump if true: pop a, if a jump (operand: i32 offset)
    JmpIfTrue = 0x92,
    /// Jump if null: pop a, if a == null jump (operand: i32 offset)
    JmpIfNull = 0x93,
    /// Jump if not null: pop a, if a != null jump (operand: i32 offset)
    JmpIfNotNull = 0x94,

    // ===== Calls (0xA0-0xAF) =====
    /// Return from method (pop return value)
    Return = 0xA2,
    /// Return from void method
    ReturnVoid = 0xA3,
    /// Call a method of the same class (operands: u32 methodIndex, u16 argCount)
    CallStatic = 0xA6,

    // ===== Array Operations (0xC0-0xCF) =====
    /// Load array element: pop index, pop array, push element
    LoadElem = 0xC1,
    /// Get array length: pop array, push length
    ArrayLen = 0xC3,

    // ===== Error Handling (0xE0-0xEF) =====
    /// Throw: pop value, abort the call with it as the message
    Throw = 0xE3,
    /// Trap with error code (operand: u16 errorCode)
    Trap = 0xE4,
}

impl Opcode {
    /// Convert byte to opcode
    ///
    /// Returns None if the byte does not correspond to a valid opcode.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            // Stack manipulation & constants
            0x00 => Some(Self::Nop),
            0x01 => Some(Self::Pop),
            0x02 => Some(Self::Dup),
            0x03 => Some(Self::Swap),
            0x04 => Some(Self::ConstNull),
            0x05 => Some(Self::ConstTrue),
            0x06 => Some(Self::ConstFalse),
            0x07 => Some(Self::ConstI32),
            0x08 => Some(Self::ConstF64),
            0x09 => Some(Self::ConstStr),
            0x0A => Some(Self::ConstI64),

            // Locals
            0x10 => Some(Self::LoadLocal),
            0x11 => Some(Self::StoreLocal),
            0x12 => Some(Self::LoadLocal0),
            0x13 => Some(Self::LoadLocal1),
            0x14 => Some(Self::StoreLocal0),
            0x15 => Some(Self::StoreLocal1),

            // Int arithmetic
            0x20 => Some(Self::Iadd),
            0x21 => Some(Self::Isub),
            0x22 => Some(Self::Imul),
            0x23 => Some(Self::Idiv),
            0x24 => Some(Self::Imod),
            0x25 => Some(Self::Ineg),

            // Long arithmetic
            0x28 => Some(Self::Ladd),
            0x29 => Some(Self::Lsub),
            0x2A => Some(Self::Lmul),
            0x2B => Some(Self::Ldiv),
            0x2C => Some(Self::Lmod),
            0x2D => Some(Self::Lneg),

            // Double arithmetic
            0x30 => Some(Self::Fadd),
            0x31 => Some(Self::Fsub),
            0x32 => Some(Self::Fmul),
            0x33 => Some(Self::Fdiv),
            0x34 => Some(Self::Fneg),

            // Conversions
            0x40 => Some(Self::I2L),
            0x41 => Some(Self::I2D),
            0x42 => Some(Self::L2I),
            0x43 => Some(Self::L2D),
            0x44 => Some(Self::D2I),
            0x45 => Some(Self::D2L),

            // Int/long comparison
            0x50 => Some(Self::Ieq),
            0x51 => Some(Self::Ine),
            0x52 => Some(Self::Ilt),
            0x53 => Some(Self::Ile),
            0x54 => Some(Self::Igt),
            0x55 => Some(Self::Ige),
            0x56 => Some(Self::Lcmp),

            // Double comparison
            0x60 => Some(Self::Feq),
            0x61 => Some(Self::Fne),
            0x62 => Some(Self::Flt),
            0x63 => Some(Self::Fle),
            0x64 => Some(Self::Fgt),
            0x65 => Some(Self::Fge),

            // Generic & logical
            0x70 => Some(Self::Eq),
            0x71 => Some(Self::Ne),
            0x74 => Some(Self::Not),
            0x75 => Some(Self::And),
            0x76 => Some(Self::Or),

            // Strings
            0x80 => Some(Self::Sconcat),
            0x81 => Some(Self::Slen),
            0x82 => Some(Self::Seq),
            0x88 => Some(Self::ToString),

            // Control flow
            0x90 => Some(Self::Jmp),
            0x91 => Some(Self::JmpIfFalse),
            0x92 => Some(Self::JmpIfTrue),
            0x93 => Some(Self::JmpIfNull),
            0x94 => Some(Self::JmpIfNotNull),

            // Calls
            0xA2 => Some(Self::Return),
            0xA3 => Some(Self::ReturnVoid),
            0xA6 => Some(Self::CallStatic),

            // Arrays
            0xC1 => Some(Self::LoadElem),
            0xC3 => Some(Self::ArrayLen),

            // Errors
            0xE3 => Some(Self::Throw),
            0xE4 => Some(Self::Trap),

            _ => None,
        }
    }

    /// Convert opcode to byte
    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Get the human-readable name of the opcode
    pub fn name(self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::Pop => "POP",
            Self::Dup => "DUP",
            Self::Swap => "SWAP",
            Self::ConstNull => "CONST_NULL",
            Self::ConstTrue => "CONST_TRUE",
            Self::ConstFalse => "CONST_FALSE",
            Self::ConstI32 => "CONST_I32",
            Self::ConstF64 => "CONST_F64",
            Self::ConstStr => "CONST_STR",
            Self::ConstI64 => "CONST_I64",
            Self::LoadLocal => "LOAD_LOCAL",
            Self::StoreLocal => "STORE_LOCAL",
            Self::LoadLocal0 => "LOAD_LOCAL_0",
            Self::LoadLocal1 => "LOAD_LOCAL_1",
            Self::StoreLocal0 => "STORE_LOCAL_0",
            Self::StoreLocal1 => "STORE_LOCAL_1",
            Self::Iadd => "IADD",
            Self::Isub => "ISUB",
            Self::Imul => "IMUL",
            Self::Idiv => "IDIV",
            Self::Imod => "IMOD",
            Self::Ineg => "INEG",
            Self::Ladd => "LADD",
            Self::Lsub => "LSUB",
            Self::Lmul => "LMUL",
            Self::Ldiv => "LDIV",
            Self::Lmod => "LMOD",
            Self::Lneg => "LNEG",
            Self::Fadd => "FADD",
            Self::Fsub => "FSUB",
            Self::Fmul => "FMUL",
            Self::Fdiv => "FDIV",
            Self::Fneg => "FNEG",
            Self::I2L => "I2L",
            Self::I2D => "I2D",
            Self::L2I => "L2I",
            Self::L2D => "L2D",
            Self::D2I => "D2I",
            Self::D2L => "D2L",
            Self::Ieq => "IEQ",
            Self::Ine => "INE",
            Self::Ilt => "ILT",
            Self::Ile => "ILE",
            Self::Igt => "IGT",
            Self::Ige => "IGE",
            Self::Lcmp => "LCMP",
            Self::Feq => "FEQ",
            Self::Fne => "FNE",
            Self::Flt => "FLT",
            Self::Fle => "FLE",
            Self::Fgt => "FGT",
            Self::Fge => "FGE",
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Not => "NOT",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Sconcat => "SCONCAT",
            Self::Slen => "SLEN",
            Self::Seq => "SEQ",
            Self::ToString => "TO_STRING",
            Self::Jmp => "JMP",
            Self::JmpIfFalse => "JMP_IF_FALSE",
            Self::JmpIfTrue => "JMP_IF_TRUE",
            Self::JmpIfNull => "JMP_IF_NULL",
            Self::JmpIfNotNull => "JMP_IF_NOT_NULL",
            Self::Return => "RETURN",
            Self::ReturnVoid => "RETURN_VOID",
            Self::CallStatic => "CALL_STATIC",
            Self::LoadElem => "LOAD_ELEM",
            Self::ArrayLen => "ARRAY_LEN",
            Self::Throw => "THROW",
            Self::Trap => "TRAP",
        }
    }

    /// Size in bytes of the operands following this opcode
    pub fn operand_size(self) -> usize {
        match self {
            Self::LoadLocal | Self::StoreLocal | Self::Trap => 2,
            Self::ConstI32 | Self::ConstStr | Self::ConstI64 => 4,
            Self::Jmp | Self::JmpIfFalse | Self::JmpIfTrue | Self::JmpIfNull | Self::JmpIfNotNull => 4,
            Self::CallStatic => 6,
            Self::ConstF64 => 8,
            _ => 0,
        }
    }

    /// Check if this opcode is a jump instruction
    pub fn is_jump(self) -> bool {
        matches!(
            self,
            Self::Jmp
                | Self::JmpIfFalse
                | Self::JmpIfTrue
                | Self::JmpIfNull
                | Self::JmpIfNotNull
        )
    }

    /// Check if this opcode is a call instruction
    pub fn is_call(self) -> bool {
        matches!(self, Self::CallStatic)
    }

    /// Check if this opcode is a return instruction
    pub fn is_return(self) -> bool {
        matches!(self, Self::Return | Self::ReturnVoid)
    }

    /// Check if this opcode terminates a basic block
    pub fn is_terminator(self) -> bool {
        self.is_jump() || self.is_return() || matches!(self, Self::Throw | Self::Trap)
    }
}
