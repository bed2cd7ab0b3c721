//! Terminal input mapped to direction commands

use shared::{ControlCommand, Moving};

/// Turns lines typed on stdin into commands for the server
#[derive(Debug, Default)]
pub struct InputManager {
    commands_sent: u64,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps one input line to a command, or None if the line is not a
    /// direction key
    pub fn handle_line(&mut self, line: &str) -> Option<ControlCommand> {
        let moving = parse_direction(line)?;
        self.commands_sent += 1;
        Some(ControlCommand::new(moving))
    }

    pub fn commands_sent(&self) -> u64 {
        self.commands_sent
    }
}

/// Accepts `w`/`a`/`s`/`d`, the direction words and `none`, case-insensitive
pub fn parse_direction(line: &str) -> Option<Moving> {
    match line.trim().to_ascii_lowercase().as_str() {
        "w" | "up" => Some(Moving::Up),
        "a" | "left" => Some(Moving::Left),
        "s" | "down" => Some(Moving::Down),
        "d" | "right" => Some(Moving::Right),
        "none" => Some(Moving::None),
        _ => None,
    }
}
