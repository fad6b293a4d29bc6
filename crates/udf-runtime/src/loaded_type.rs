//! Types defined into a namespace

use crate::error::VmError;
use crate::namespace::NamespaceId;
use crate::value::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use udf_bytecode::{access, ClassFile, MethodDef};

/// Native UDF body: receives one row of boxed arguments
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Value, VmError> + Send + Sync>;

/// Declared signature of a method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    /// Method name
    pub name: String,
    /// Formal parameter type names, in order
    pub param_types: Vec<String>,
    /// Return type name
    pub return_type: String,
}

impl MethodSignature {
    /// Create a signature
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        param_types: impl IntoIterator<Item = S>,
        return_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_types: param_types.into_iter().map(Into::into).collect(),
            return_type: return_type.into(),
        }
    }

    /// Number of formal parameters
    pub fn arity(&self) -> usize {
        self.param_types.len()
    }
}

impl From<&MethodDef> for MethodSignature {
    fn from(def: &MethodDef) -> Self {
        Self {
            name: def.name.clone(),
            param_types: def.param_types.clone(),
            return_type: def.return_type.clone(),
        }
    }
}

/// A method declared by a loaded type
#[derive(Debug, Clone)]
pub struct DeclaredMethod {
    /// Signature
    pub signature: MethodSignature,
    /// Access flags (see [`udf_bytecode::access`])
    pub access_flags: u16,
}

impl DeclaredMethod {
    /// Whether the method is callable without an access grant
    pub fn is_public(&self) -> bool {
        self.access_flags & access::PUBLIC != 0
    }
}

/// Executable bodies of a type's methods, indexed like `methods`
pub(crate) enum TypeBody {
    /// Interpreted from a verified class file
    Bytecode(ClassFile),
    /// Rust closures from a static registry
    Native(Vec<NativeFn>),
}

impl fmt::Debug for TypeBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeBody::Bytecode(class) => f
                .debug_struct("Bytecode")
                .field("methods", &class.methods.len())
                .finish(),
            TypeBody::Native(fns) => f.debug_struct("Native").field("count", &fns.len()).finish(),
        }
    }
}

/// A type resolved into a namespace.
///
/// Immutable once created. The owning loader or registry keeps one `Arc`
/// for its own lifetime; handles keep their owner alive.
#[derive(Debug)]
pub struct LoadedType {
    name: String,
    namespace: NamespaceId,
    bytecode_len: usize,
    digest: [u8; 32],
    methods: Vec<DeclaredMethod>,
    pub(crate) body: TypeBody,
}

impl LoadedType {
    /// Build a type from a decoded class file.
    ///
    /// `bytes` are the raw bytes the class was decoded from; they are only
    /// measured and hashed.
    pub fn from_class(class: ClassFile, bytes: &[u8], namespace: NamespaceId) -> Self {
        let methods = class
            .methods
            .iter()
            .map(|m| DeclaredMethod {
                signature: MethodSignature::from(m),
                access_flags: m.access_flags,
            })
            .collect();

        Self {
            name: class.name.clone(),
            namespace,
            bytecode_len: bytes.len(),
            digest: Sha256::digest(bytes).into(),
            methods,
            body: TypeBody::Bytecode(class),
        }
    }

    /// Build a type whose methods are native closures
    pub(crate) fn native(
        name: String,
        namespace: NamespaceId,
        methods: Vec<DeclaredMethod>,
        bodies: Vec<NativeFn>,
    ) -> Self {
        // Natives have no bytes; hash the signatures so the digest still
        // identifies the shape of the type.
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        for m in &methods {
            hasher.update(m.signature.name.as_bytes());
            for p in &m.signature.param_types {
                hasher.update(b"\0");
                hasher.update(p.as_bytes());
            }
            hasher.update(b"\x01");
            hasher.update(m.signature.return_type.as_bytes());
        }

        Self {
            name,
            namespace,
            bytecode_len: 0,
            digest: hasher.finalize().into(),
            methods,
            body: TypeBody::Native(bodies),
        }
    }

    /// Logical name, unique within the namespace
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace this type was defined into
    pub fn namespace(&self) -> NamespaceId {
        self.namespace
    }

    /// Length of the bytes the type was defined from (0 for native types)
    pub fn bytecode_len(&self) -> usize {
        self.bytecode_len
    }

    /// SHA-256 digest of the defining bytes
    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    /// Digest as lowercase hex
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// Declared methods, in declaration order
    pub fn methods(&self) -> &[DeclaredMethod] {
        &self.methods
    }

    /// Whether the methods run in the interpreter
    pub fn is_bytecode(&self) -> bool {
        matches!(self.body, TypeBody::Bytecode(_))
    }
}

impl fmt::Display for LoadedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use udf_bytecode::Opcode;

    fn sample_class() -> ClassFile {
        let mut class = ClassFile::new("Sample");
        class.add_method(
            MethodDef::new("one", Vec::<String>::new(), "int")
                .with_code(vec![Opcode::ConstI32 as u8, 1, 0, 0, 0, Opcode::Return as u8]),
        );
        class.add_method(
            MethodDef::new("hidden", ["int"], "void")
                .with_access(access::STATIC)
                .with_code(vec![Opcode::ReturnVoid as u8]),
        );
        class
    }

    #[test]
    fn test_from_class() {
        let class = sample_class();
        let bytes = class.encode();
        let ns = NamespaceId::next();

        let ty = LoadedType::from_class(class, &bytes, ns);
        assert_eq!(ty.name(), "Sample");
        assert_eq!(ty.namespace(), ns);
        assert_eq!(ty.bytecode_len(), bytes.len());
        assert_eq!(ty.methods().len(), 2);
        assert!(ty.methods()[0].is_public());
        assert!(!ty.methods()[1].is_public());
        assert_eq!(ty.methods()[1].signature.param_types, vec!["int"]);
        assert!(ty.is_bytecode());
        assert_eq!(ty.to_string(), format!("Sample@{}", ns));
    }

    #[test]
    fn test_digest_tracks_bytes() {
        let class = sample_class();
        let bytes = class.encode();

        let a = LoadedType::from_class(class.clone(), &bytes, NamespaceId::next());
        let b = LoadedType::from_class(class, &bytes, NamespaceId::next());
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest_hex().len(), 64);

        let mut other = sample_class();
        other.flags = 1;
        let other_bytes = other.encode();
        let c = LoadedType::from_class(other, &other_bytes, NamespaceId::next());
        assert_ne!(a.digest(), c.digest());
    }
}
