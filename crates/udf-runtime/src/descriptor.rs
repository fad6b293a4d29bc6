//! Method descriptors
//!
//! A descriptor is the compact symbolic form of a method's shape, used to
//! pick one overload: `(` parameter codes `)` return code. For example
//! `int add(int, int)` is `(II)I` and `void log(double[], java.lang.String)`
//! is `([DLjava/lang/String;)V`.

use crate::error::{UdfError, UdfResult};
use crate::loaded_type::{LoadedType, MethodSignature};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::borrow::Cow;
use std::fmt;
use udf_bytecode::{ClassFile, Primitive};

static PRIMITIVE_CODES: Lazy<FxHashMap<&'static str, char>> = Lazy::new(|| {
    Primitive::ALL
        .iter()
        .map(|p| {
            let code = match p {
                Primitive::Boolean => 'Z',
                Primitive::Byte => 'B',
                Primitive::Char => 'C',
                Primitive::Short => 'S',
                Primitive::Int => 'I',
                Primitive::Long => 'J',
                Primitive::Float => 'F',
                Primitive::Double => 'D',
                Primitive::Void => 'V',
            };
            (p.name(), code)
        })
        .collect()
});

/// Anything that can list its declared method signatures
pub trait TypeInfo {
    /// Logical type name
    fn type_name(&self) -> &str;

    /// Declared method signatures, in declaration order
    fn declared_methods(&self) -> Cow<'_, [MethodSignature]>;
}

impl TypeInfo for LoadedType {
    fn type_name(&self) -> &str {
        self.name()
    }

    fn declared_methods(&self) -> Cow<'_, [MethodSignature]> {
        Cow::Owned(self.methods().iter().map(|m| m.signature.clone()).collect())
    }
}

impl TypeInfo for ClassFile {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn declared_methods(&self) -> Cow<'_, [MethodSignature]> {
        Cow::Owned(self.methods.iter().map(MethodSignature::from).collect())
    }
}

/// An immutable method descriptor string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Descriptor(String);

impl Descriptor {
    /// The descriptor text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the descriptor text
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for Descriptor {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Descriptor {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl AsRef<str> for Descriptor {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Encode one type name.
///
/// Primitives map to their single-letter code. Anything else becomes
/// `L` + name with `.` replaced by `/` + `;`. Each trailing `[]` adds a
/// leading `[`.
pub fn type_code(type_name: &str) -> String {
    let mut element = type_name.trim();
    let mut dimensions = 0;
    while let Some(rest) = element.strip_suffix("[]") {
        element = rest.trim_end();
        dimensions += 1;
    }

    let mut code = String::with_capacity(dimensions + element.len() + 2);
    for _ in 0..dimensions {
        code.push('[');
    }
    match PRIMITIVE_CODES.get(element) {
        Some(&c) => code.push(c),
        None => {
            code.push('L');
            code.extend(element.chars().map(|c| if c == '.' { '/' } else { c }));
            code.push(';');
        }
    }
    code
}

/// Describe one signature directly
pub fn describe_signature(signature: &MethodSignature) -> Descriptor {
    let mut out = String::from("(");
    for param in &signature.param_types {
        out.push_str(&type_code(param));
    }
    out.push(')');
    out.push_str(&type_code(&signature.return_type));
    Descriptor(out)
}

/// Describe the first method of `owner` named `method_name`
pub fn describe(method_name: &str, owner: &impl TypeInfo) -> UdfResult<Descriptor> {
    owner
        .declared_methods()
        .iter()
        .find(|m| m.name == method_name)
        .map(describe_signature)
        .ok_or_else(|| UdfError::MethodNotFound(format!("{}.{}", owner.type_name(), method_name)))
}
