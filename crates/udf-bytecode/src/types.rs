//! Source-level type names carried in method signatures
//!
//! Parameter and return types are stored by name, e.g. `int`, `double[]`,
//! `java.lang.String`, `my.pkg.Row[][]`.

use std::fmt;

/// Primitive kinds recognized in signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// `boolean`
    Boolean,
    /// `byte`
    Byte,
    /// `char`
    Char,
    /// `short`
    Short,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `void` (return position only)
    Void,
}

impl Primitive {
    /// All primitive kinds, in declaration order
    pub const ALL: [Primitive; 9] = [
        Primitive::Boolean,
        Primitive::Byte,
        Primitive::Char,
        Primitive::Short,
        Primitive::Int,
        Primitive::Long,
        Primitive::Float,
        Primitive::Double,
        Primitive::Void,
    ];

    /// Look up a primitive by its source name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }

    /// Source name of the primitive
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Boolean => "boolean",
            Primitive::Byte => "byte",
            Primitive::Char => "char",
            Primitive::Short => "short",
            Primitive::Int => "int",
            Primitive::Long => "long",
            Primitive::Float => "float",
            Primitive::Double => "double",
            Primitive::Void => "void",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed type name: element name plus array dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeName<'a> {
    /// Element type name without any `[]` suffix
    pub element: &'a str,
    /// Number of `[]` suffixes
    pub dimensions: usize,
}

impl<'a> TypeName<'a> {
    /// Parse a type name.
    ///
    /// Returns `None` for empty names, dangling brackets, or characters
    /// outside `[A-Za-z0-9_$.]` in the element name.
    pub fn parse(name: &'a str) -> Option<Self> {
        let mut element = name.trim();
        let mut dimensions = 0;
        while let Some(rest) = element.strip_suffix("[]") {
            element = rest.trim_end();
            dimensions += 1;
        }

        let valid = !element.is_empty()
            && !element.starts_with('.')
            && !element.ends_with('.')
            && !element.contains("..")
            && element
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'));
        if !valid {
            return None;
        }

        // `void[]` is not a type
        if dimensions > 0 && element == "void" {
            return None;
        }

        Some(Self {
            element,
            dimensions,
        })
    }

    /// The element's primitive kind, if it is one
    pub fn primitive(&self) -> Option<Primitive> {
        Primitive::from_name(self.element)
    }

    /// Whether this is exactly `void`
    pub fn is_void(&self) -> bool {
        self.dimensions == 0 && self.element == "void"
    }

    /// Whether this is an array type
    pub fn is_array(&self) -> bool {
        self.dimensions > 0
    }
}
