use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::types::errors::ValidationError;

/// Free-form attribute values attached to an entity, keyed by attribute name.
pub type AttributeMap = BTreeMap<String, AttributeValue>;

/// Raw integer → label mapping (signal value descriptions, named value tables).
pub type ValueTable = BTreeMap<i64, String>;

/// Concrete attribute value stored on Matrix/ECU/Frame/Signal entities.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum AttributeValue {
    Str(String),
    Int(i64),
    Hex(u64), // memorize as a number, proper display later.
    Float(f64),
    Enum(String),
}

impl Default for AttributeValue {
    fn default() -> Self {
        AttributeValue::Str(String::new())
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Str(s) => write!(f, "{}", s),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Hex(h) => write!(f, "0x{:X}", h),
            AttributeValue::Float(x) => write!(f, "{}", compact_float(*x)),
            AttributeValue::Enum(s) => write!(f, "{}", s),
        }
    }
}

/// Compact float rendering without superfluous trailing zeros.
pub(crate) fn compact_float(x: f64) -> String {
    let mut s: String = format!("{}", x);
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}

/// Declares which entity kind an attribute (and its Define) targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DefineScope {
    #[default]
    Global,
    Ecu,
    Frame,
    Signal,
}

impl DefineScope {
    /// All scopes, in the order the diff engine reports them.
    pub const ALL: [DefineScope; 4] = [
        DefineScope::Global,
        DefineScope::Ecu,
        DefineScope::Frame,
        DefineScope::Signal,
    ];
}

impl fmt::Display for DefineScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DefineScope::Global => "Global",
            DefineScope::Ecu => "ECU",
            DefineScope::Frame => "Frame",
            DefineScope::Signal => "Signal",
        })
    }
}

/// Declared value type of an attribute, with its optional bounds or labels.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum DefineKind {
    String,
    Int { min: i64, max: i64 },
    Hex { min: u64, max: u64 },
    Float { min: f64, max: f64 },
    Enum(Vec<String>),
}

impl DefineKind {
    fn type_name(&self) -> &'static str {
        match self {
            DefineKind::String => "STRING",
            DefineKind::Int { .. } => "INT",
            DefineKind::Hex { .. } => "HEX",
            DefineKind::Float { .. } => "FLOAT",
            DefineKind::Enum(_) => "ENUM",
        }
    }
}

impl fmt::Display for DefineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefineKind::String => write!(f, "STRING"),
            DefineKind::Int { min, max } => write!(f, "INT {} {}", min, max),
            DefineKind::Hex { min, max } => write!(f, "HEX {} {}", min, max),
            DefineKind::Float { min, max } => {
                write!(f, "FLOAT {} {}", compact_float(*min), compact_float(*max))
            }
            DefineKind::Enum(labels) => {
                let quoted: Vec<String> = labels.iter().map(|l| format!("\"{}\"", l)).collect();
                write!(f, "ENUM {}", quoted.join(","))
            }
        }
    }
}

/// A declared attribute: type/range descriptor plus an optional default value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Define {
    pub kind: DefineKind,
    pub default: Option<AttributeValue>,
}

impl Define {
    pub fn new(kind: DefineKind) -> Self {
        Define {
            kind,
            default: None,
        }
    }

    pub fn with_default(mut self, default: AttributeValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Textual definition, e.g. `INT 0 100` or `ENUM "No","Yes"`.
    pub fn definition(&self) -> String {
        self.kind.to_string()
    }

    /// Checks that `value` matches the declared type and lies within the declared range.
    ///
    /// Integer values are accepted for FLOAT defines and, when non-negative, for HEX defines.
    pub fn validate(&self, key: &str, value: &AttributeValue) -> Result<(), ValidationError> {
        let type_error = || ValidationError::AttributeType {
            key: key.to_string(),
            expected: self.kind.type_name().to_string(),
        };
        let range_error = || ValidationError::AttributeOutOfRange {
            key: key.to_string(),
            value: value.to_string(),
        };

        match (&self.kind, value) {
            (DefineKind::String, AttributeValue::Str(_)) => Ok(()),
            (DefineKind::Int { min, max }, AttributeValue::Int(v)) => {
                in_range(*v, *min, *max).then_some(()).ok_or_else(range_error)
            }
            (DefineKind::Hex { min, max }, AttributeValue::Hex(v)) => {
                in_range(*v, *min, *max).then_some(()).ok_or_else(range_error)
            }
            (DefineKind::Hex { min, max }, AttributeValue::Int(v)) => {
                let v: u64 = u64::try_from(*v).map_err(|_| range_error())?;
                in_range(v, *min, *max).then_some(()).ok_or_else(range_error)
            }
            (DefineKind::Float { min, max }, AttributeValue::Float(v)) => {
                in_range(*v, *min, *max).then_some(()).ok_or_else(range_error)
            }
            (DefineKind::Float { min, max }, AttributeValue::Int(v)) => {
                in_range(*v as f64, *min, *max)
                    .then_some(())
                    .ok_or_else(range_error)
            }
            (DefineKind::Enum(labels), AttributeValue::Enum(label)) => {
                if labels.iter().any(|l| l == label) {
                    Ok(())
                } else {
                    Err(range_error())
                }
            }
            _ => Err(type_error()),
        }
    }
}

// DBC leaves min == max == 0 when a numeric define has no bounds.
fn in_range<T: PartialOrd + Default>(v: T, min: T, max: T) -> bool {
    if min == T::default() && max == T::default() {
        return true;
    }
    v >= min && v <= max
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_value_display() {
        assert_eq!(AttributeValue::Float(2.500).to_string(), "2.5");
        assert_eq!(AttributeValue::Float(3.0).to_string(), "3");
        assert_eq!(AttributeValue::Hex(255).to_string(), "0xFF");
        assert_eq!(AttributeValue::Enum("Cyclic".into()).to_string(), "Cyclic");
    }

    #[test]
    fn test_definition_text() {
        let def = Define::new(DefineKind::Int { min: 0, max: 100 });
        assert_eq!(def.definition(), "INT 0 100");

        let def = Define::new(DefineKind::Enum(vec!["No".into(), "Yes".into()]));
        assert_eq!(def.definition(), "ENUM \"No\",\"Yes\"");
    }

    #[test]
    fn test_validate_int_range() {
        let def = Define::new(DefineKind::Int { min: 0, max: 100 });
        assert!(def.validate("GenMsgCycleTime", &AttributeValue::Int(50)).is_ok());
        assert_eq!(
            def.validate("GenMsgCycleTime", &AttributeValue::Int(150)),
            Err(ValidationError::AttributeOutOfRange {
                key: "GenMsgCycleTime".into(),
                value: "150".into()
            })
        );
        assert!(matches!(
            def.validate("GenMsgCycleTime", &AttributeValue::Str("x".into())),
            Err(ValidationError::AttributeType { .. })
        ));
    }

    #[test]
    fn test_validate_unbounded_and_enum() {
        let def = Define::new(DefineKind::Float { min: 0.0, max: 0.0 });
        assert!(def.validate("Gain", &AttributeValue::Float(-12.5)).is_ok());
        assert!(def.validate("Gain", &AttributeValue::Int(3)).is_ok());

        let def = Define::new(DefineKind::Enum(vec!["Cyclic".into(), "Event".into()]));
        assert!(def.validate("SendType", &AttributeValue::Enum("Event".into())).is_ok());
        assert!(def.validate("SendType", &AttributeValue::Enum("Spontaneous".into())).is_err());
    }
}
