use crate::dbc::{LineError, LineResult, PLACEHOLDER_ECU, ParseState, body, parse_id};
use crate::types::{
    frame::{ArbitrationId, Frame},
    matrix::Matrix,
};

/// Decode a frame header and make it the target of the following `SG_` lines.
pub(crate) fn decode_frame(db: &mut Matrix, state: &mut ParseState, line: &str) -> LineResult {
    // BO_ <ID> <MESSAGE_NAME>: <BYTES_LENGTH> <SENDER_NODE>
    state.current_frame = None;

    let (head, tail) = body(line, "BO_")
        .split_once(':')
        .ok_or(LineError::Syntax("missing ':'"))?;
    let mut head = head.split_ascii_whitespace();
    let id: ArbitrationId = parse_id(head.next().ok_or(LineError::Syntax("frame id"))?)?;
    let name: &str = head.next().ok_or(LineError::Syntax("frame name"))?;

    let mut tail = tail.split_ascii_whitespace();
    let size: u8 = tail
        .next()
        .and_then(|s| s.parse::<u8>().ok())
        .ok_or(LineError::Syntax("frame size"))?;

    let mut frame: Frame = Frame::new(id, name, size);
    if let Some(sender) = tail.next()
        && sender != PLACEHOLDER_ECU
    {
        frame = frame.with_transmitter(sender);
    }

    db.add_frame(frame)?;
    state.current_frame = Some(id);
    Ok(())
}

/// Decode additional transmitters: `BO_TX_BU_ <ID> : <NODE>,<NODE>;`
pub(crate) fn decode_transmitters(db: &mut Matrix, line: &str) -> LineResult {
    // Split by ":" → first part is ID, second part is Node list
    let (id_str, nodes_str) = body(line, "BO_TX_BU_")
        .split_once(':')
        .ok_or(LineError::Syntax("missing ':'"))?;
    let id: ArbitrationId = parse_id(id_str.trim())?;

    for node_name in nodes_str
        .split(',')
        .map(|n| n.trim())
        .filter(|n| !n.is_empty() && *n != PLACEHOLDER_ECU)
    {
        db.add_transmitter(id, node_name)?;
    }
    Ok(())
}
