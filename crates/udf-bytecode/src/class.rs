//! UDF class file format (`.udfc`)

use crate::constants::ConstantPool;
use crate::encoder::{BytecodeReader, BytecodeWriter, DecodeError};
use thiserror::Error;

/// Magic number for UDF class files: "UDFC"
pub const MAGIC: [u8; 4] = *b"UDFC";

/// Current class file version
pub const VERSION: u32 = 1;

/// Size of the fixed header: magic + version + flags + checksum
pub const HEADER_LEN: usize = 16;

/// Class file encoding/decoding errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassError {
    /// Decode error
    #[error("Decode error: {0}")]
    DecodeError(#[from] DecodeError),

    /// Invalid magic number
    #[error("Invalid magic number: expected UDFC, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported version
    #[error("Unsupported version: {0} (current: {VERSION})")]
    UnsupportedVersion(u32),

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// Checksum stored in the header
        expected: u32,
        /// Checksum computed over the payload
        actual: u32,
    },

    /// Bytes left over after the method table
    #[error("{0} trailing bytes after class body")]
    TrailingBytes(usize),
}

/// Class file flags
pub mod flags {
    /// Produced by a tool that already verified the code
    pub const PREVERIFIED: u32 = 1 << 0;
}

/// Method access flags
pub mod access {
    /// Callable without an access grant
    pub const PUBLIC: u16 = 0x0001;
    /// Invoked without a receiver
    pub const STATIC: u16 = 0x0008;
}

/// A method declared by a class
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDef {
    /// Method name
    pub name: String,
    /// Access flags (see [`access`])
    pub access_flags: u16,
    /// Formal parameter type names, in order
    pub param_types: Vec<String>,
    /// Return type name
    pub return_type: String,
    /// Number of local slots, parameters included
    pub local_count: usize,
    /// Bytecode instructions
    pub code: Vec<u8>,
}

impl MethodDef {
    /// Create a public static method with no code.
    ///
    /// `local_count` starts at the parameter count.
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        param_types: impl IntoIterator<Item = S>,
        return_type: impl Into<String>,
    ) -> Self {
        let param_types: Vec<String> = param_types.into_iter().map(Into::into).collect();
        Self {
            name: name.into(),
            access_flags: access::PUBLIC | access::STATIC,
            local_count: param_types.len(),
            param_types,
            return_type: return_type.into(),
            code: Vec::new(),
        }
    }

    /// Set the method body
    pub fn with_code(mut self, code: Vec<u8>) -> Self {
        self.code = code;
        self
    }

    /// Reserve extra local slots beyond the parameters
    pub fn with_extra_locals(mut self, extra: usize) -> Self {
        self.local_count = self.param_types.len() + extra;
        self
    }

    /// Replace the access flags
    pub fn with_access(mut self, access_flags: u16) -> Self {
        self.access_flags = access_flags;
        self
    }

    /// Number of formal parameters
    pub fn param_count(&self) -> usize {
        self.param_types.len()
    }

    /// Whether the method is public
    pub fn is_public(&self) -> bool {
        self.access_flags & access::PUBLIC != 0
    }

    /// Whether the method is static
    pub fn is_static(&self) -> bool {
        self.access_flags & access::STATIC != 0
    }

    fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_string(&self.name);
        writer.emit_u16(self.access_flags);

        writer.emit_u32(self.param_types.len() as u32);
        for param in &self.param_types {
            writer.emit_string(param);
        }
        writer.emit_string(&self.return_type);

        writer.emit_u32(self.local_count as u32);
        writer.emit_u32(self.code.len() as u32);
        writer.emit_bytes(&self.code);
    }

    fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.read_string()?;
        let access_flags = reader.read_u16()?;

        let param_count = reader.read_u32()? as usize;
        let mut param_types = Vec::with_capacity(param_count.min(reader.remaining() / 4));
        for _ in 0..param_count {
            param_types.push(reader.read_string()?);
        }
        let return_type = reader.read_string()?;

        let local_count = reader.read_u32()? as usize;
        let code_len = reader.read_u32()? as usize;
        let code = reader.read_bytes(code_len)?;

        Ok(Self {
            name,
            access_flags,
            param_types,
            return_type,
            local_count,
            code,
        })
    }
}

/// A compiled UDF class
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    /// Class file version
    pub version: u32,
    /// Class flags (see [`flags`])
    pub flags: u32,
    /// Constant pool
    pub constants: ConstantPool,
    /// Logical class name
    pub name: String,
    /// Declared methods, in declaration order
    pub methods: Vec<MethodDef>,
}

impl ClassFile {
    /// Create an empty class
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: VERSION,
            flags: 0,
            constants: ConstantPool::new(),
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// Append a method and return its index (the `CALL_STATIC` operand)
    pub fn add_method(&mut self, method: MethodDef) -> u32 {
        self.methods.push(method);
        (self.methods.len() - 1) as u32
    }

    /// First declared method with the given name
    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Encode the class to binary format (.udfc)
    ///
    /// Format:
    /// - Header: magic (4 bytes) + version (u32) + flags (u32) + checksum (u32)
    /// - Constant pool
    /// - Class name
    /// - Method table
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BytecodeWriter::with_capacity(HEADER_LEN + 64);

        writer.emit_bytes(&MAGIC);
        writer.emit_u32(self.version);
        writer.emit_u32(self.flags);
        let checksum_offset = writer.offset();
        writer.emit_u32(0);

        self.constants.encode(&mut writer);
        writer.emit_string(&self.name);
        writer.emit_u32(self.methods.len() as u32);
        for method in &self.methods {
            method.encode(&mut writer);
        }

        // CRC32 of everything after the header
        let checksum = crc32fast::hash(&writer.buffer[HEADER_LEN..]);
        writer.patch_u32(checksum_offset, checksum);

        writer.into_bytes()
    }

    /// Decode a class from binary format
    pub fn decode(data: &[u8]) -> Result<Self, ClassError> {
        let mut reader = BytecodeReader::new(data);

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&reader.read_bytes(4)?);
        if magic != MAGIC {
            return Err(ClassError::InvalidMagic(magic));
        }

        let version = reader.read_u32()?;
        if version != VERSION {
            return Err(ClassError::UnsupportedVersion(version));
        }

        let flags = reader.read_u32()?;
        let stored_checksum = reader.read_u32()?;

        let calculated_checksum = crc32fast::hash(&data[HEADER_LEN..]);
        if stored_checksum != calculated_checksum {
            return Err(ClassError::ChecksumMismatch {
                expected: stored_checksum,
                actual: calculated_checksum,
            });
        }

        let constants = ConstantPool::decode(&mut reader)?;
        let name = reader.read_string()?;

        let method_count = reader.read_u32()? as usize;
        let mut methods = Vec::with_capacity(method_count.min(reader.remaining() / 16));
        for _ in 0..method_count {
            methods.push(MethodDef::decode(&mut reader)?);
        }

        if reader.has_more() {
            return Err(ClassError::TrailingBytes(reader.remaining()));
        }

        Ok(Self {
            version,
            flags,
            constants,
            name,
            methods,
        })
    }
}

#[cfg(test)]
#[allow(clippy::approx_constant)]
mod tests {
    use super::*;

    fn add_ints() -> MethodDef {
        let mut writer = BytecodeWriter::new();
        writer.emit_load_local_0();
        writer.emit_load_local_1();
        writer.emit_iadd();
        writer.emit_return();
        MethodDef::new("add", ["int", "int"], "int").with_code(writer.into_bytes())
    }

    #[test]
    fn test_class_creation() {
        let class = ClassFile::new("Adder");
        assert_eq!(class.version, VERSION);
        assert_eq!(class.flags, 0);
        assert!(class.methods.is_empty());
    }

    #[test]
    fn test_method_defaults() {
        let method = add_ints();
        assert!(method.is_public());
        assert!(method.is_static());
        assert_eq!(method.param_count(), 2);
        assert_eq!(method.local_count, 2);

        let method = method.with_extra_locals(3).with_access(access::STATIC);
        assert_eq!(method.local_count, 5);
        assert!(!method.is_public());
    }

    #[test]
    fn test_empty_class_encoding() {
        let class = ClassFile::new("Empty");
        let bytes = class.encode();
        assert_eq!(&bytes[0..4], b"UDFC");

        let decoded = ClassFile::decode(&bytes).unwrap();
        assert_eq!(decoded.name, "Empty");
        assert!(decoded.methods.is_empty());
    }

    #[test]
    fn test_class_with_methods() {
        let mut class = ClassFile::new("Adder");
        class.flags = flags::PREVERIFIED;
        class.constants.add_string("hello");
        class.constants.add_float(3.14);
        assert_eq!(class.add_method(add_ints()), 0);
        assert_eq!(
            class.add_method(MethodDef::new("noop", Vec::<String>::new(), "void")),
            1
        );

        let decoded = ClassFile::decode(&class.encode()).unwrap();
        assert_eq!(decoded, class);
        assert_eq!(decoded.method("add").unwrap().param_types, vec!["int", "int"]);
        assert_eq!(decoded.method("noop").unwrap().return_type, "void");
        assert!(decoded.method("missing").is_none());
    }

    #[test]
    fn test_checksum_validation() {
        let mut class = ClassFile::new("Adder");
        class.add_method(add_ints());
        let mut bytes = class.encode();

        bytes[HEADER_LEN + 4] ^= 0xFF;
        let result = ClassFile::decode(&bytes);
        assert!(matches!(result, Err(ClassError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_invalid_magic_number() {
        let mut bytes = b"RAYA".to_vec();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());

        let result = ClassFile::decode(&bytes);
        assert_eq!(result, Err(ClassError::InvalidMagic(*b"RAYA")));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&999u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());

        let result = ClassFile::decode(&bytes);
        assert_eq!(result, Err(ClassError::UnsupportedVersion(999)));
    }

    #[test]
    fn test_truncated_header() {
        let result = ClassFile::decode(b"UDF");
        assert!(matches!(result, Err(ClassError::DecodeError(_))));
    }

    #[test]
    fn test_trailing_bytes() {
        let mut bytes = ClassFile::new("Tail").encode();
        bytes.extend_from_slice(&[0, 0]);
        let checksum = crc32fast::hash(&bytes[HEADER_LEN..]);
        bytes[12..16].copy_from_slice(&checksum.to_le_bytes());

        assert_eq!(ClassFile::decode(&bytes), Err(ClassError::TrailingBytes(2)));
    }
}
