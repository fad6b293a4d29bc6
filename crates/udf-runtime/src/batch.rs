//! Columnar argument batches and result unboxing

use crate::error::{UdfError, UdfResult};
use crate::value::Value;
use std::sync::Arc;

/// One typed argument column
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// `boolean[]`
    Bool(Vec<bool>),
    /// `byte[]`
    Byte(Vec<i8>),
    /// `char[]` (UTF-16 code units)
    Char(Vec<u16>),
    /// `short[]`
    Short(Vec<i16>),
    /// `int[]`
    Int(Vec<i32>),
    /// `long[]`
    Long(Vec<i64>),
    /// `float[]`
    Float(Vec<f32>),
    /// `double[]`
    Double(Vec<f64>),
    /// String column
    Str(Vec<Arc<str>>),
    /// Already boxed values
    Boxed(Vec<Value>),
}

impl Column {
    /// Number of rows
    pub fn len(&self) -> usize {
        match self {
            Column::Bool(v) => v.len(),
            Column::Byte(v) => v.len(),
            Column::Char(v) => v.len(),
            Column::Short(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Long(v) => v.len(),
            Column::Float(v) => v.len(),
            Column::Double(v) => v.len(),
            Column::Str(v) => v.len(),
            Column::Boxed(v) => v.len(),
        }
    }

    /// Whether the column has no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type name
    pub fn element_type(&self) -> &'static str {
        match self {
            Column::Bool(_) => "boolean",
            Column::Byte(_) => "byte",
            Column::Char(_) => "char",
            Column::Short(_) => "short",
            Column::Int(_) => "int",
            Column::Long(_) => "long",
            Column::Float(_) => "float",
            Column::Double(_) => "double",
            Column::Str(_) => "string",
            Column::Boxed(_) => "boxed",
        }
    }

    /// Box the value at `row`
    pub fn value_at(&self, row: usize) -> Option<Value> {
        Some(match self {
            Column::Bool(v) => Value::Bool(*v.get(row)?),
            Column::Byte(v) => Value::Byte(*v.get(row)?),
            Column::Char(v) => Value::Char(*v.get(row)?),
            Column::Short(v) => Value::Short(*v.get(row)?),
            Column::Int(v) => Value::Int(*v.get(row)?),
            Column::Long(v) => Value::Long(*v.get(row)?),
            Column::Float(v) => Value::Float(*v.get(row)?),
            Column::Double(v) => Value::Double(*v.get(row)?),
            Column::Str(v) => Value::Str(Arc::clone(v.get(row)?)),
            Column::Boxed(v) => v.get(row)?.clone(),
        })
    }
}

macro_rules! impl_column_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$ty>> for Column {
                fn from(v: Vec<$ty>) -> Self {
                    Column::$variant(v)
                }
            }
        )*
    };
}

impl_column_from! {
    bool => Bool,
    i8 => Byte,
    u16 => Char,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    Arc<str> => Str,
    Value => Boxed,
}

impl From<Vec<&str>> for Column {
    fn from(v: Vec<&str>) -> Self {
        Column::Str(v.into_iter().map(Arc::from).collect())
    }
}

/// Parallel argument columns, one per formal parameter.
///
/// All columns have the same length; construction fails otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct RowBatch {
    columns: Vec<Column>,
    rows: usize,
}

impl RowBatch {
    /// Build a batch; the row count is the first column's length
    pub fn new(columns: Vec<Column>) -> UdfResult<Self> {
        let rows = columns.first().map(Column::len).unwrap_or(0);
        for (i, column) in columns.iter().enumerate().skip(1) {
            if column.len() != rows {
                return Err(UdfError::BatchLengthMismatch {
                    what: format!("column {}", i),
                    expected: rows,
                    found: column.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// A batch of `rows` calls to a method without parameters
    pub fn nullary(rows: usize) -> Self {
        Self {
            columns: Vec::new(),
            rows,
        }
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// The columns
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Box row `row` into `out`, replacing its contents
    ///
    /// Every column must have a value at `row`; `out` always ends up with
    /// one argument per column or the call fails.
    pub(crate) fn fill_row(&self, row: usize, out: &mut Vec<Value>) -> UdfResult<()> {
        out.clear();
        for (i, column) in self.columns.iter().enumerate() {
            let value = column
                .value_at(row)
                .ok_or_else(|| UdfError::BatchLengthMismatch {
                    what: format!("column {}", i),
                    expected: row + 1,
                    found: column.len(),
                })?;
            out.push(value);
        }
        Ok(())
    }
}

/// Primitives a result column can be narrowed to
pub trait Unbox: Sized {
    /// Name used in mismatch errors
    const TYPE_NAME: &'static str;

    /// Read the primitive out of a boxed value
    fn unbox(value: &Value) -> Option<Self>;
}

impl Unbox for i32 {
    const TYPE_NAME: &'static str = "int";

    fn unbox(value: &Value) -> Option<Self> {
        match *value {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }
}

impl Unbox for i64 {
    const TYPE_NAME: &'static str = "long";

    fn unbox(value: &Value) -> Option<Self> {
        value.as_long()
    }
}

impl Unbox for f64 {
    const TYPE_NAME: &'static str = "double";

    fn unbox(value: &Value) -> Option<Self> {
        match *value {
            Value::Double(v) => Some(v),
            _ => None,
        }
    }
}

impl Unbox for bool {
    const TYPE_NAME: &'static str = "boolean";

    fn unbox(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

/// Narrow a boxed result column to a primitive column.
///
/// Every element must hold exactly `T`; the first that does not fails the
/// whole conversion.
pub fn unbox<T: Unbox>(values: &[Value]) -> UdfResult<Vec<T>> {
    values
        .iter()
        .enumerate()
        .map(|(index, value)| {
            T::unbox(value).ok_or(UdfError::UnboxTypeMismatch {
                index,
                expected: T::TYPE_NAME,
                found: value.type_name(),
            })
        })
        .collect()
}
