use crate::dbc::{
    LineError, LineResult, body, parse_id,
    strings::{tokenize, unescape, unquote},
};
use crate::types::{attributes::ValueTable, frame::ArbitrationId, matrix::Matrix};

/// Decode a named table: `VAL_TABLE_ <NAME> <val1> "<descr1>" ... ;`
pub(crate) fn decode_value_table(db: &mut Matrix, line: &str) -> LineResult {
    let tokens: Vec<&str> = tokenize(body(line, "VAL_TABLE_"));
    let (name, pairs) = tokens
        .split_first()
        .ok_or(LineError::Syntax("table name"))?;

    db.add_value_table(name, parse_pairs(pairs)?)?;
    Ok(())
}

/// Decode signal value descriptions: `VAL_ <ID> <SIGNAL> <val1> "<descr1>" ... ;`
pub(crate) fn decode_signal_values(db: &mut Matrix, line: &str) -> LineResult {
    let tokens: Vec<&str> = tokenize(body(line, "VAL_"));
    let [id, name, pairs @ ..] = tokens.as_slice() else {
        return Err(LineError::Syntax("frame id and signal name"));
    };
    // environment variable tables have no frame id
    let Ok(_) = id.parse::<u32>() else {
        return Err(LineError::Unsupported(format!("value table of '{}'", id)));
    };
    let id: ArbitrationId = parse_id(id)?;

    db.set_signal_value_table(id, name, parse_pairs(pairs)?)?;
    Ok(())
}

// Parsing couples: <value> "<description>"
fn parse_pairs(tokens: &[&str]) -> Result<ValueTable, LineError> {
    let tokens: Vec<&str> = tokens.iter().copied().filter(|t| *t != ";").collect();
    let mut table: ValueTable = ValueTable::new();

    for pair in tokens.chunks(2) {
        let [value, label] = pair else {
            return Err(LineError::Syntax("value without description"));
        };
        let value: i64 = value
            .parse::<i64>()
            .map_err(|_| LineError::Syntax("value"))?;
        let label: &str = unquote(label).ok_or(LineError::Syntax("description"))?;
        table.insert(value, unescape(label));
    }
    Ok(table)
}
