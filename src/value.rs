use std::collections::HashMap;

/// A scalar value in an engine result cell.
///
/// The engine boundary hands rows back as plain scalars; nested structure
/// never crosses it (a columnar result is flat by construction). Integers and
/// floats are kept distinct so counts stay counts.
///
/// # Examples
///
/// ```
/// use cellpipe::Value;
///
/// let null = Value::Null;
/// let flag = Value::Boolean(true);
/// let count = Value::Integer(42);
/// let ratio = Value::Float(0.5);
/// let name = Value::Text("widget".to_string());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,

    /// BOOLEAN
    Boolean(bool),

    /// Any integral column type, widened to i64
    Integer(i64),

    /// Any floating-point column type, widened to f64
    Float(f64),

    /// VARCHAR and anything else the adapter renders as text
    Text(String),
}

/// One result row: column name to value.
pub type Row = HashMap<String, Value>;

impl Value {
    /// Render the value the way it would appear in a preview grid.
    pub fn as_display(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Float(n) => n.to_string(),
            Value::Text(s) => s.clone(),
        }
    }

    /// Get as integer, if the value is numeric.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Float(n) => Some(n.round() as i64),
            _ => None,
        }
    }

    /// Get as float, if the value is numeric.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }
}
