//! Line-delimited JSON wire protocol.
//!
//! Every message is one UTF-8 line terminated by `\n`. After connecting, a
//! client sends its display name as a raw line, then [`ControlCommand`] lines.
//! The server answers with the assigned id, the world size and one line per
//! wall, and from then on streams powerup and snake lines every tick.
//!
//! [`ControlCommand`]: crate::command::ControlCommand

use crate::error::ProtocolError;
use crate::powerup::Powerup;
use crate::snake::Snake;
use crate::wall::Wall;
use serde::{Deserialize, Serialize};

/// First and only line sent to a connection the server has no room for.
pub const SERVER_FULL: &str = "server full";

/// Removes every complete line from the front of `buffer`.
///
/// A trailing fragment without its terminator stays in `buffer` so the next
/// receive can complete it. A `\r` before the terminator is stripped. Empty
/// lines are kept: a blank first line is still the first message.
pub fn drain_lines(buffer: &mut String) -> Vec<String> {
    let Some(last_newline) = buffer.rfind('\n') else {
        return Vec::new();
    };

    let complete: String = buffer.drain(..=last_newline).collect();
    complete
        .split_terminator('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .map(str::to_owned)
        .collect()
}

/// Serializes `value` as one protocol line, terminator included.
pub fn encode_line<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    Ok(line)
}

/// The server's reply to a client's name: `"<id>\n<worldSize>\n"` followed by
/// one line per wall.
pub fn encode_handshake<'a>(
    id: u32,
    world_size: u32,
    walls: impl IntoIterator<Item = &'a Wall>,
) -> Result<String, serde_json::Error> {
    let mut out = format!("{}\n{}\n", id, world_size);
    for wall in walls {
        out.push_str(&encode_line(wall)?);
    }
    Ok(out)
}

/// Parses one of the two integer handshake lines.
pub fn parse_handshake_int(line: &str) -> Result<u32, ProtocolError> {
    let trimmed = line.trim();
    if trimmed == SERVER_FULL {
        return Err(ProtocolError::Rejected(trimmed.to_owned()));
    }
    trimmed
        .parse()
        .map_err(|_| ProtocolError::Handshake(trimmed.to_owned()))
}

/// Any JSON object the server streams after the handshake.
///
/// The variants are told apart by their id key (`snake`, `wall` or `power`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WorldObject {
    Snake(Snake),
    Wall(Wall),
    Powerup(Powerup),
}

impl WorldObject {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(line)?)
    }
}
