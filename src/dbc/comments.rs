use log::debug;

use crate::dbc::{LineError, LineResult, body, parse_id, strings::unescape};
use crate::types::{frame::ArbitrationId, matrix::Matrix};

/// Decode a `CM_` statement for an ECU, a frame or a signal.
pub(crate) fn decode(db: &mut Matrix, line: &str) -> LineResult {
    // CM_ BU_ <NODE> "<text>";
    // CM_ BO_ <ID> "<text>";
    // CM_ SG_ <ID> <SIGNAL> "<text>";
    let content: &str = body(line, "CM_");

    // Take the comment within the first and the last quote
    let first_quote: usize = content
        .find('"')
        .ok_or(LineError::Syntax("missing comment text"))?;
    let last_quote: usize = match content.rfind('"') {
        Some(pos) if pos > first_quote => pos,
        _ => return Err(LineError::Syntax("unterminated comment")),
    };
    let comment: String = normalize(&content[first_quote + 1..last_quote]);

    let mut target = content[..first_quote].split_ascii_whitespace();
    match target.next() {
        None => {
            debug!("Skipping network comment");
            Ok(())
        }
        Some("BU_") => {
            let name: &str = target.next().ok_or(LineError::Syntax("node name"))?;
            db.set_ecu_comment(name, &comment)?;
            Ok(())
        }
        Some("BO_") => {
            let id: ArbitrationId = parse_id(target.next().ok_or(LineError::Syntax("frame id"))?)?;
            db.set_frame_comment(id, &comment)?;
            Ok(())
        }
        Some("SG_") => {
            let id: ArbitrationId = parse_id(target.next().ok_or(LineError::Syntax("frame id"))?)?;
            let name: &str = target.next().ok_or(LineError::Syntax("signal name"))?;
            db.set_signal_comment(id, name, &comment)?;
            Ok(())
        }
        Some(other) => Err(LineError::Unsupported(format!("comment on {}", other))),
    }
}

// Unescape and remove the indentation of continuation lines.
fn normalize(raw: &str) -> String {
    unescape(raw)
        .lines()
        .map(|l| l.trim_start())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ecu::Ecu, frame::Frame, signal::Signal};

    fn build_db() -> (Matrix, ArbitrationId) {
        let id = ArbitrationId::standard(1000).unwrap();
        let mut db: Matrix = Matrix::new();
        db.add_ecu(Ecu::new("Gateway")).unwrap();
        db.add_frame(
            Frame::new(id, "TestMessage", 8).with_signal(Signal::new("TestSignal", 0, 8)),
        )
        .unwrap();
        (db, id)
    }

    #[test]
    fn test_ecu_comment_multiline() {
        let (mut db, _) = build_db();
        let input = "CM_ BU_ Gateway \"Node comment line 1\n        line 2\";";
        decode(&mut db, input).unwrap();
        assert_eq!(
            db.ecu("Gateway").unwrap().comment,
            "Node comment line 1\nline 2"
        );
    }

    #[test]
    fn test_frame_and_signal_comment() {
        let (mut db, id) = build_db();
        decode(&mut db, r#"CM_ BO_ 1000 "Frame with \"quotes\"";"#).unwrap();
        decode(&mut db, r#"CM_ SG_ 1000 TestSignal "Signal comment";"#).unwrap();

        assert_eq!(db.frame(id).unwrap().comment, "Frame with \"quotes\"");
        assert_eq!(db.signal(id, "TestSignal").unwrap().comment, "Signal comment");
    }

    #[test]
    fn test_comment_errors() {
        let (mut db, _) = build_db();
        // network comment is accepted and dropped
        assert!(decode(&mut db, r#"CM_ "Whole network";"#).is_ok());
        assert!(decode(&mut db, r#"CM_ SG_ 1000 Missing "x";"#).is_err());
        assert!(decode(&mut db, r#"CM_ BU_ Unknown "x";"#).is_err());
        assert!(matches!(
            decode(&mut db, r#"CM_ EV_ Env "x";"#),
            Err(LineError::Unsupported(_))
        ));
    }
}
