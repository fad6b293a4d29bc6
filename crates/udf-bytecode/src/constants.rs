//! Constant pool for UDF class files

use crate::encoder::{BytecodeReader, BytecodeWriter, DecodeError};
use rustc_hash::FxHashMap;

/// Constant pool shared by every method of a class
///
/// Strings and 64-bit integers are referenced from code by index
/// (`CONST_STR`, `CONST_I64`). Floats are kept for tooling; `CONST_F64`
/// carries its value inline.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    /// String constants
    strings: Vec<String>,
    /// Long constants
    integers: Vec<i64>,
    /// Double constants
    floats: Vec<f64>,

    /// Map from string to its first slot
    string_index: FxHashMap<String, u32>,
    /// Map from long to its first slot
    integer_index: FxHashMap<i64, u32>,
}

impl ConstantPool {
    /// Create a new empty constant pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a string constant and return its index.
    ///
    /// Identical strings share one slot.
    pub fn add_string(&mut self, s: impl Into<String>) -> u32 {
        let s = s.into();
        if let Some(&index) = self.string_index.get(&s) {
            return index;
        }
        self.push_string(s)
    }

    /// Add a long constant and return its index
    pub fn add_integer(&mut self, value: i64) -> u32 {
        if let Some(&index) = self.integer_index.get(&value) {
            return index;
        }
        self.push_integer(value)
    }

    // Decoded pools may repeat a value; the first slot stays the interned one
    fn push_string(&mut self, s: String) -> u32 {
        let index = self.strings.len() as u32;
        self.string_index.entry(s.clone()).or_insert(index);
        self.strings.push(s);
        index
    }

    fn push_integer(&mut self, value: i64) -> u32 {
        let index = self.integers.len() as u32;
        self.integer_index.entry(value).or_insert(index);
        self.integers.push(value);
        index
    }

    /// Add a double constant and return its index
    pub fn add_float(&mut self, value: f64) -> u32 {
        self.floats.push(value);
        (self.floats.len() - 1) as u32
    }

    /// Get a string constant by index
    pub fn get_string(&self, index: u32) -> Option<&str> {
        self.strings.get(index as usize).map(|s| s.as_str())
    }

    /// Get a long constant by index
    pub fn get_integer(&self, index: u32) -> Option<i64> {
        self.integers.get(index as usize).copied()
    }

    /// Get a double constant by index
    pub fn get_float(&self, index: u32) -> Option<f64> {
        self.floats.get(index as usize).copied()
    }

    /// All string constants, in slot order
    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// All long constants, in slot order
    pub fn integers(&self) -> &[i64] {
        &self.integers
    }

    /// All double constants, in slot order
    pub fn floats(&self) -> &[f64] {
        &self.floats
    }

    /// Encode the constant pool
    ///
    /// Format:
    /// - String count (u32), then each string as length (u32) + UTF-8 bytes
    /// - Integer count (u32), then each value as i64
    /// - Float count (u32), then each value as f64
    pub fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_u32(self.strings.len() as u32);
        for s in &self.strings {
            writer.emit_string(s);
        }

        writer.emit_u32(self.integers.len() as u32);
        for &i in &self.integers {
            writer.emit_i64(i);
        }

        writer.emit_u32(self.floats.len() as u32);
        for &f in &self.floats {
            writer.emit_f64(f);
        }
    }

    /// Decode the constant pool
    pub fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        let mut pool = ConstantPool::new();

        // Counts come from untrusted input, so capacity is bounded by what is left
        let string_count = reader.read_u32()? as usize;
        pool.strings.reserve(string_count.min(reader.remaining() / 4));
        for _ in 0..string_count {
            let s = reader.read_string()?;
            pool.push_string(s);
        }

        let int_count = reader.read_u32()? as usize;
        pool.integers.reserve(int_count.min(reader.remaining() / 8));
        for _ in 0..int_count {
            let value = reader.read_i64()?;
            pool.push_integer(value);
        }

        let float_count = reader.read_u32()? as usize;
        pool.floats.reserve(float_count.min(reader.remaining() / 8));
        for _ in 0..float_count {
            pool.floats.push(reader.read_f64()?);
        }

        Ok(pool)
    }

    /// Size in bytes when encoded
    pub fn encoded_size(&self) -> usize {
        let strings: usize = self.strings.iter().map(|s| 4 + s.len()).sum();
        4 + strings + 4 + self.integers.len() * 8 + 4 + self.floats.len() * 8
    }
}

// The lookup maps are derived from the slot vectors
impl PartialEq for ConstantPool {
    fn eq(&self, other: &Self) -> bool {
        self.strings == other.strings
            && self.integers == other.integers
            && self.floats == other.floats
    }
}
