//! Cell values and column data types.

use core::cmp::Ordering;
use core::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// The declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// `true` / `false`.
    Boolean,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit float.
    Float,
    /// UTF-8 text.
    Text,
    /// Raw bytes.
    Blob,
    /// Date and time without time zone.
    DateTime,
}

impl DataType {
    /// Returns the canonical name of the type.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::Integer => "Integer",
            Self::Float => "Float",
            Self::Text => "Text",
            Self::Blob => "Blob",
            Self::DateTime => "DateTime",
        }
    }

    /// Resolves a type name as used by `Convert(x, 'Type')`. Common aliases
    /// and a leading `System.` are accepted, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        let name = name
            .get(..7)
            .filter(|prefix| prefix.eq_ignore_ascii_case("system."))
            .map_or(name, |_| &name[7..]);
        match name.to_ascii_lowercase().as_str() {
            "boolean" | "bool" => Some(Self::Boolean),
            "integer" | "int" | "int16" | "int32" | "int64" | "long" => Some(Self::Integer),
            "float" | "double" | "single" | "decimal" => Some(Self::Float),
            "text" | "string" | "char" => Some(Self::Text),
            "blob" | "bytes" | "byte[]" => Some(Self::Blob),
            "datetime" | "date" => Some(Self::DateTime),
            _ => None,
        }
    }

    /// Returns true for Integer and Float.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single cell value.
///
/// Values are totally ordered: NULL sorts first, integers and floats compare
/// numerically with each other, and values of unrelated types order by type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum Value {
    /// Missing value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// Text.
    Text(String),
    /// Bytes.
    Blob(Vec<u8>),
    /// Date and time.
    DateTime(NaiveDateTime),
}

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Parses the date formats accepted in text conversions and `#date#`
/// literals.
#[must_use]
pub fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DATE_FORMATS.iter().find_map(|format| {
                NaiveDate::parse_from_str(text, format)
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })
        })
}

impl Value {
    /// Returns true if the value is NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the type of the value, or `None` for NULL.
    #[must_use]
    pub const fn data_type(&self) -> Option<DataType> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(DataType::Boolean),
            Self::Int(_) => Some(DataType::Integer),
            Self::Float(_) => Some(DataType::Float),
            Self::Text(_) => Some(DataType::Text),
            Self::Blob(_) => Some(DataType::Blob),
            Self::DateTime(_) => Some(DataType::DateTime),
        }
    }

    /// Returns the boolean, if this is one.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a float if it is numeric.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the text, if this is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns a short description used in error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Text(s) => format!("Text '{s}'"),
            Self::Blob(b) => format!("Blob of {} bytes", b.len()),
            other => format!(
                "{} {other}",
                other.data_type().map_or("value", |t| t.name())
            ),
        }
    }

    /// Converts the value to `target`. NULL converts to NULL.
    ///
    /// Numbers widen, floats narrow to integers only when exact, text parses
    /// into any scalar type, integers and booleans interchange, and every
    /// scalar formats as text. Returns `None` when no conversion applies.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn coerce(&self, target: DataType) -> Option<Self> {
        if self.data_type() == Some(target) || self.is_null() {
            return Some(self.clone());
        }
        match (self, target) {
            (Self::Int(i), DataType::Float) => Some(Self::Float(*i as f64)),
            (Self::Float(f), DataType::Integer) => {
                let in_range = *f >= i64::MIN as f64 && *f < i64::MAX as f64;
                (f.fract() == 0.0 && in_range).then(|| Self::Int(*f as i64))
            }
            (Self::Int(i), DataType::Boolean) => Some(Self::Bool(*i != 0)),
            (Self::Bool(b), DataType::Integer) => Some(Self::Int(i64::from(*b))),
            (Self::Text(s), DataType::Boolean) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Self::Bool(true)),
                "false" => Some(Self::Bool(false)),
                _ => None,
            },
            (Self::Text(s), DataType::Integer) => s.trim().parse().ok().map(Self::Int),
            (Self::Text(s), DataType::Float) => s.trim().parse().ok().map(Self::Float),
            (Self::Text(s), DataType::DateTime) => parse_date_time(s).map(Self::DateTime),
            (Self::Blob(_), DataType::Text) => None,
            (scalar, DataType::Text) => Some(Self::Text(scalar.to_string())),
            _ => None,
        }
    }

    /// Lower-cases text so that it compares case-insensitively. Other
    /// values are returned unchanged.
    #[must_use]
    pub fn fold_case(&self) -> Self {
        match self {
            Self::Text(s) => Self::Text(s.to_lowercase()),
            other => other.clone(),
        }
    }

    /// Compares two values, ignoring case in text when `case_sensitive` is
    /// false.
    #[must_use]
    pub fn cmp_with(&self, other: &Self, case_sensitive: bool) -> Ordering {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) if !case_sensitive => {
                a.to_lowercase().cmp(&b.to_lowercase())
            }
            _ => self.cmp(other),
        }
    }

    const fn type_rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) | Self::Float(_) => 2,
            Self::Text(_) => 3,
            Self::Blob(_) => 4,
            Self::DateTime(_) => 5,
        }
    }
}

impl Ord for Value {
    #[allow(clippy::cast_precision_loss)]
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Int(a), Self::Float(b)) => (*a as f64).total_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.total_cmp(&(*b as f64)),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Blob(a), Self::Blob(b)) => a.cmp(b),
            (Self::DateTime(a), Self::DateTime(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Blob(bytes) => {
                for byte in bytes {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Self::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
