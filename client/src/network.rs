use crate::game::ClientGameState;
use crate::input::InputManager;
use log::{debug, info, warn};
use shared::transport::{self, Connection};
use shared::ProtocolError;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::interval;

/// How often the status line is logged.
const STATUS_INTERVAL: Duration = Duration::from_secs(1);

pub struct Client {
    conn: Connection,
    game_state: ClientGameState,
    input_manager: InputManager,
}

impl Client {
    /// Connects to the server and sends the player's name.
    pub async fn connect(
        host: &str,
        port: u16,
        name: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Connecting to {}:{}...", host, port);
        let conn = transport::connect(host, port).await;
        if let Some(message) = conn.error_message() {
            return Err(message.into());
        }
        Self::from_connection(conn, name)
    }

    /// Wraps an established connection and sends the player's name as the
    /// first line.
    pub fn from_connection(
        conn: Connection,
        name: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        if !conn.send(&format!("{}\n", name)) {
            return Err("could not send player name".into());
        }

        Ok(Client {
            conn,
            game_state: ClientGameState::new(),
            input_manager: InputManager::new(),
        })
    }

    pub fn game_state(&self) -> &ClientGameState {
        &self.game_state
    }

    /// Reads from the server once and applies every complete line.
    ///
    /// Returns Ok(false) once the connection has ended. A rejection by the
    /// server is an error; any other unreadable line is skipped.
    pub async fn pump(&mut self) -> Result<bool, Box<dyn std::error::Error>> {
        let alive = self.conn.receive().await;
        self.process_lines()?;
        Ok(alive)
    }

    fn process_lines(&mut self) -> Result<(), ProtocolError> {
        for line in self.conn.take_lines() {
            if line.is_empty() {
                continue;
            }
            match self.game_state.handle_line(&line) {
                Ok(()) => {}
                Err(ProtocolError::Rejected(reason)) => {
                    return Err(ProtocolError::Rejected(reason));
                }
                Err(e) => debug!("Skipping line from server: {}", e),
            }
        }
        Ok(())
    }

    /// Sends the command for one line of terminal input, if it is one.
    pub fn handle_input(&mut self, line: &str) {
        match self.input_manager.handle_line(line) {
            Some(command) => match command.to_line() {
                Ok(text) => {
                    if !self.conn.send(&text) {
                        warn!("Failed to send command");
                    }
                }
                Err(e) => warn!("Failed to encode command: {}", e),
            },
            None => info!("Use w/a/s/d (or up/left/down/right) to steer"),
        }
    }

    /// Runs until the server goes away or stdin is closed.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        let mut status = interval(STATUS_INTERVAL);

        loop {
            tokio::select! {
                alive = self.conn.receive() => {
                    self.process_lines()?;
                    if !alive {
                        let reason = self
                            .conn
                            .error_message()
                            .unwrap_or_else(|| "connection closed".to_string());
                        warn!("Disconnected: {}", reason);
                        return Err(reason.into());
                    }
                }
                line = stdin.next_line() => match line? {
                    Some(line) => self.handle_input(&line),
                    None => {
                        info!("Input closed, leaving after {} commands", self.input_manager.commands_sent());
                        return Ok(());
                    }
                },
                _ = status.tick() => {
                    if self.game_state.is_joined() {
                        info!("{}", self.game_state.status());
                    }
                }
            }
        }
    }
}
