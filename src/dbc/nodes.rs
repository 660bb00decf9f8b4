use crate::dbc::{LineResult, PLACEHOLDER_ECU, body};
use crate::types::{ecu::Ecu, matrix::Matrix};

/// Decode the BU_ line listing node names and register them as ECUs.
/// Example: `BU_: ECU1 ECU2 ECU3`
pub(crate) fn decode(db: &mut Matrix, line: &str) -> LineResult {
    // "BU_:" and "BU_" are both in use
    let names: &str = body(line, "BU_");
    let names: &str = names.strip_prefix(':').unwrap_or(names);

    for name in names.split_ascii_whitespace() {
        if name == PLACEHOLDER_ECU || db.ecu(name).is_some() {
            continue;
        }
        db.add_ecu(Ecu::new(name))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode() {
        let mut db: Matrix = Matrix::new();
        decode(&mut db, "BU_: Motor Infotainment Gateway Motor").unwrap();
        let names: Vec<&str> = db.ecus().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Motor", "Infotainment", "Gateway"]);

        decode(&mut db, "BU_ Dash").unwrap();
        assert!(db.ecu("Dash").is_some());
    }
}
