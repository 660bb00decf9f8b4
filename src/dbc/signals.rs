use crate::codec::dbc_msb_to_start_bit;
use crate::dbc::{LineError, LineResult, PLACEHOLDER_ECU, ParseState, body, parse_id};
use crate::types::{
    frame::{ArbitrationId, SignalGroup},
    matrix::Matrix,
    signal::{ByteOrder, MuxRole, Signal},
};

/// Decode one `SG_` line into the frame opened by the last `BO_`.
pub(crate) fn decode_signal(db: &mut Matrix, state: &ParseState, line: &str) -> LineResult {
    // SG_ <name> [M|mX] : <start>|<length>@<endianness><signedness> (<factor>,<offset>) [<min>|<max>] "<unit>" <receivers...>
    let id: ArbitrationId = state
        .current_frame
        .ok_or(LineError::Syntax("signal outside of a frame"))?;

    // Split line in two parts: before ":" and after
    let (left, right) = body(line, "SG_")
        .split_once(':')
        .ok_or(LineError::Syntax("missing ':'"))?;

    let mut left = left.split_ascii_whitespace();
    let name: &str = left.next().ok_or(LineError::Syntax("signal name"))?;
    let mux: MuxRole = match left.next() {
        None => MuxRole::None,
        Some(tag) => parse_mux_tag(tag)?,
    };

    // Bit start / length / endian / sign: "63|1@1+"
    let (layout, rest) = right
        .split_once('(')
        .ok_or(LineError::Syntax("missing '('"))?;
    let (pos_len, endian_sign) = layout
        .trim()
        .split_once('@')
        .ok_or(LineError::Syntax("missing '@'"))?;
    let (start, length) = pos_len
        .split_once('|')
        .ok_or(LineError::Syntax("bit position"))?;
    let start: u16 = parse_num(start, "start bit")?;
    let length: u16 = parse_num(length, "bit length")?;
    let byte_order: ByteOrder = match endian_sign.chars().next() {
        Some('0') => ByteOrder::BigEndian,
        Some('1') => ByteOrder::LittleEndian,
        _ => return Err(LineError::Syntax("byte order")),
    };
    let signed: bool = endian_sign.contains('-');
    let start_bit: u16 = match byte_order {
        ByteOrder::BigEndian => dbc_msb_to_start_bit(start, length),
        ByteOrder::LittleEndian => start,
    };

    // Scale and offset: "(0.1,-40)"
    let (scaling, rest) = rest
        .split_once(')')
        .ok_or(LineError::Syntax("missing ')'"))?;
    let (factor, offset) = scaling
        .split_once(',')
        .ok_or(LineError::Syntax("scaling"))?;
    let factor: f64 = parse_num(factor, "factor")?;
    let offset: f64 = parse_num(offset, "offset")?;

    // Min and max: "[0|100]"
    let (_, rest) = rest
        .split_once('[')
        .ok_or(LineError::Syntax("missing '['"))?;
    let (range, rest) = rest
        .split_once(']')
        .ok_or(LineError::Syntax("missing ']'"))?;
    let (min, max) = range.split_once('|').ok_or(LineError::Syntax("range"))?;
    let min: f64 = parse_num(min, "minimum")?;
    let max: f64 = parse_num(max, "maximum")?;

    // Measurement unit within quotes, receivers after it
    let (_, rest) = rest
        .split_once('"')
        .ok_or(LineError::Syntax("missing unit"))?;
    let (unit, receivers) = rest
        .split_once('"')
        .ok_or(LineError::Syntax("unterminated unit"))?;

    let mut signal: Signal = Signal::new(name, start_bit, length)
        .with_byte_order(byte_order)
        .with_signed(signed)
        .with_scaling(factor, offset)
        .with_range(min, max)
        .with_unit(unit)
        .with_mux(mux);

    // Receiver nodes, separated by commas (some tools use spaces)
    for receiver in receivers
        .split(|c: char| c == ',' || c.is_ascii_whitespace())
        .filter(|r| !r.is_empty() && *r != PLACEHOLDER_ECU)
    {
        signal = signal.with_receiver(receiver);
    }

    db.add_signal(id, signal)?;
    Ok(())
}

/// Decode a signal group: `SIG_GROUP_ <ID> <NAME> <REPETITIONS> : <SIGNAL> <SIGNAL>;`
pub(crate) fn decode_signal_group(db: &mut Matrix, line: &str) -> LineResult {
    let (head, members) = body(line, "SIG_GROUP_")
        .split_once(':')
        .ok_or(LineError::Syntax("missing ':'"))?;

    let mut head = head.split_ascii_whitespace();
    let id: ArbitrationId = parse_id(head.next().ok_or(LineError::Syntax("frame id"))?)?;
    let name: &str = head.next().ok_or(LineError::Syntax("group name"))?;
    let group_id: u32 = parse_num(head.next().unwrap_or("1"), "group id")?;

    let mut group: SignalGroup = SignalGroup::new(name, group_id);
    for member in members.split(|c: char| c == ',' || c.is_ascii_whitespace()) {
        if !member.is_empty() {
            group = group.with_signal(member);
        }
    }

    db.add_signal_group(id, group)?;
    Ok(())
}

// "M" marks the multiplexor, "m<N>" a signal present when the multiplexor equals N.
fn parse_mux_tag(tag: &str) -> Result<MuxRole, LineError> {
    if tag == "M" {
        return Ok(MuxRole::Multiplexor);
    }
    let selector: &str = tag
        .strip_prefix('m')
        .ok_or(LineError::Syntax("multiplex tag"))?;
    if selector.ends_with('M') {
        return Err(LineError::Unsupported(format!(
            "extended multiplexing '{}'",
            tag
        )));
    }
    Ok(MuxRole::Multiplexed(parse_num(selector, "multiplex selector")?))
}

fn parse_num<T: std::str::FromStr>(s: &str, what: &'static str) -> Result<T, LineError> {
    s.trim().parse::<T>().map_err(|_| LineError::Syntax(what))
}
