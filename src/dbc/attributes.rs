use crate::dbc::{
    LineError, LineResult, body, parse_id,
    strings::{collect_all_quoted, tokenize, unescape, unquote},
};
use crate::types::{
    attributes::{AttributeValue, Define, DefineKind, DefineScope},
    errors::{LookupError, MatrixError},
    frame::ArbitrationId,
    matrix::{AttributeTarget, Matrix},
};

/// Decode an attribute declaration.
pub(crate) fn decode_define(db: &mut Matrix, line: &str) -> LineResult {
    // Expected formats:
    // BA_DEF_  "DBName" STRING;
    // BA_DEF_ BU_ "NmStationAddress" HEX 0 255;
    // BA_DEF_ BO_ "GenMsgCycleTime" INT 0 10000;
    // BA_DEF_ SG_ "GenSigStartValue" FLOAT 0 0;
    // BA_DEF_ BO_ "GenMsgSendType" ENUM "Cyclic","Event";
    let content: &str = body(line, "BA_DEF_");
    let tokens: Vec<&str> = tokenize(content);
    let mut parts = tokens.iter().copied();

    let mut token: &str = parts.next().ok_or(LineError::Syntax("attribute name"))?;
    let scope: DefineScope = match token {
        "BU_" => DefineScope::Ecu,
        "BO_" => DefineScope::Frame,
        "SG_" => DefineScope::Signal,
        t if t.starts_with('"') => DefineScope::Global,
        other => return Err(LineError::Unsupported(format!("{} attributes", other))),
    };
    if scope != DefineScope::Global {
        token = parts.next().ok_or(LineError::Syntax("attribute name"))?;
    }
    let name: &str = unquote(token).ok_or(LineError::Syntax("attribute name"))?;

    let attr_type: &str = parts.next().ok_or(LineError::Syntax("attribute type"))?;
    let kind: DefineKind = match attr_type {
        "STRING" => DefineKind::String,
        "INT" => DefineKind::Int {
            min: parse_bound(parts.next())?,
            max: parse_bound(parts.next())?,
        },
        "HEX" => DefineKind::Hex {
            min: parse_bound(parts.next())?,
            max: parse_bound(parts.next())?,
        },
        "FLOAT" => DefineKind::Float {
            min: parse_bound(parts.next())?,
            max: parse_bound(parts.next())?,
        },
        "ENUM" => {
            let mut quoted: Vec<String> = collect_all_quoted(content);
            if !quoted.is_empty() {
                quoted.remove(0); // remove attribute name
            }
            DefineKind::Enum(quoted)
        }
        other => return Err(LineError::Unsupported(format!("attribute type {}", other))),
    };

    db.add_define(scope, name, Define::new(kind))?;
    Ok(())
}

/// Decode a default value: `BA_DEF_DEF_ "<NAME>" <VALUE>;`
///
/// DBC defaults do not name a scope, so the value is applied to every scope declaring the key.
pub(crate) fn decode_define_default(db: &mut Matrix, line: &str) -> LineResult {
    let tokens: Vec<&str> = tokenize(body(line, "BA_DEF_DEF_"));
    let [name, value, ..] = tokens.as_slice() else {
        return Err(LineError::Syntax("attribute default"));
    };
    let name: &str = unquote(name).ok_or(LineError::Syntax("attribute name"))?;

    let scopes: Vec<DefineScope> = DefineScope::ALL
        .into_iter()
        .filter(|&scope| db.define(scope, name).is_some())
        .collect();
    if scopes.is_empty() {
        return Err(MatrixError::from(LookupError::Define {
            scope: DefineScope::Global,
            key: name.to_string(),
        })
        .into());
    }

    for scope in scopes {
        let Some(define) = db.define(scope, name) else {
            continue;
        };
        let value: AttributeValue = parse_value(&define.kind, value)?;
        db.add_define_default(scope, name, value)?;
    }
    Ok(())
}

/// Decode an attribute value for the network, an ECU, a frame or a signal.
pub(crate) fn decode_attribute(db: &mut Matrix, line: &str) -> LineResult {
    // BA_ "DBName" "Powertrain";
    // BA_ "NmStationAddress" BU_ Motor 18;
    // BA_ "GenMsgCycleTime" BO_ 100 20;
    // BA_ "GenSigStartValue" SG_ 100 Speed 2.5;
    let tokens: Vec<&str> = tokenize(body(line, "BA_"));
    let (name, rest) = tokens
        .split_first()
        .ok_or(LineError::Syntax("attribute name"))?;
    let name: &str = unquote(name).ok_or(LineError::Syntax("attribute name"))?;

    let (target, value): (AttributeTarget<'_>, &str) = match rest {
        [value] => (AttributeTarget::Global, *value),
        ["BU_", ecu, value] => (AttributeTarget::Ecu(ecu), *value),
        ["BO_", id, value] => (AttributeTarget::Frame(parse_id(id)?), *value),
        ["SG_", id, signal, value] => {
            let id: ArbitrationId = parse_id(id)?;
            (AttributeTarget::Signal(id, signal), *value)
        }
        [other, ..] if !other.starts_with('"') => {
            return Err(LineError::Unsupported(format!("{} attributes", other)));
        }
        _ => return Err(LineError::Syntax("attribute target")),
    };

    let scope: DefineScope = target.scope();
    let define: &Define = db.define(scope, name).ok_or_else(|| {
        MatrixError::from(LookupError::Define {
            scope,
            key: name.to_string(),
        })
    })?;
    let value: AttributeValue = parse_value(&define.kind, value)?;
    db.add_attribute(target, name, value)?;
    Ok(())
}

// Converts a token to the value type a Define declares.
fn parse_value(kind: &DefineKind, token: &str) -> Result<AttributeValue, LineError> {
    let quoted: Option<&str> = unquote(token);
    let text: &str = quoted.unwrap_or(token).trim();

    let value: AttributeValue = match kind {
        DefineKind::String => AttributeValue::Str(unescape(text)),
        DefineKind::Int { .. } => AttributeValue::Int(
            text.parse::<i64>()
                .or_else(|_| text.parse::<f64>().map(|f| f as i64))
                .map_err(|_| LineError::Syntax("integer value"))?,
        ),
        DefineKind::Hex { .. } => AttributeValue::Hex(
            text.parse::<u64>()
                .map_err(|_| LineError::Syntax("hex value"))?,
        ),
        DefineKind::Float { .. } => AttributeValue::Float(
            text.parse::<f64>()
                .map_err(|_| LineError::Syntax("float value"))?,
        ),
        // Enum values are written either as label or as label index
        DefineKind::Enum(labels) => match (quoted, text.parse::<usize>()) {
            (None, Ok(index)) => AttributeValue::Enum(
                labels
                    .get(index)
                    .cloned()
                    .ok_or(LineError::Syntax("enum index"))?,
            ),
            _ => AttributeValue::Enum(unescape(text)),
        },
    };
    Ok(value)
}

fn parse_bound<T: std::str::FromStr + Default>(token: Option<&str>) -> Result<T, LineError> {
    match token {
        // bounds are optional in hand-written files
        None => Ok(T::default()),
        Some(t) => t.parse::<T>().map_err(|_| LineError::Syntax("attribute range")),
    }
}
