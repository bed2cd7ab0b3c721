//! Server network layer: per-connection sessions and the tick loop

use crate::client_manager::{ClientManager, SessionPhase};
use crate::config::GameSettings;
use crate::game::GameState;
use log::{debug, error, info, warn};
use shared::protocol::{encode_handshake, SERVER_FULL};
use shared::transport::{self, Connection, ConnectionSet, Listener};
use shared::{ConnectionError, ControlCommand, World};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Ticks between periodic statistics log lines.
const STATS_INTERVAL_TICKS: u64 = 300;
/// Granularity of the tick thread's sleep.
const TICK_SLEEP: Duration = Duration::from_millis(1);

pub type SharedClients = Arc<Mutex<ClientManager>>;
pub type SharedGame = Arc<Mutex<GameState>>;

/// Takes a lock, recovering the data if another thread panicked while
/// holding it.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Running server: the accept loop, one task per connection and the tick
/// thread.
pub struct Server {
    listener: Listener,
    clients: SharedClients,
    game: SharedGame,
    shutdown: Arc<AtomicBool>,
    tick_thread: Option<thread::JoinHandle<()>>,
}

impl Server {
    /// Builds the world from `settings`, spawns its powerups and starts
    /// serving on `addr`.
    pub async fn start(
        addr: &str,
        settings: &GameSettings,
        max_clients: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut game = GameState::new(settings.to_world());
        game.spawn_powerups(settings.powerup_count);
        Ok(Self::start_with_game(addr, game, max_clients).await?)
    }

    /// Starts serving an already built game. The tick loop starts right away,
    /// whether or not anyone has joined.
    pub async fn start_with_game(
        addr: &str,
        game: GameState,
        max_clients: usize,
    ) -> Result<Self, ConnectionError> {
        let clients: SharedClients = Arc::new(Mutex::new(ClientManager::new(max_clients)));
        let game: SharedGame = Arc::new(Mutex::new(game));

        let connections = ConnectionSet::new();

        let listener = {
            let clients = Arc::clone(&clients);
            let game = Arc::clone(&game);
            let tracked = connections.clone();
            transport::listen_tracked(addr, connections, move |conn| {
                tokio::spawn(run_session(
                    conn,
                    Arc::clone(&clients),
                    Arc::clone(&game),
                    tracked.clone(),
                ));
            })
            .await?
        };

        let shutdown = Arc::new(AtomicBool::new(false));
        let tick_thread = spawn_tick_loop(
            Arc::clone(&clients),
            Arc::clone(&game),
            Arc::clone(&shutdown),
        )?;

        info!(
            "Server listening on {} (max {} clients)",
            listener.local_addr(),
            max_clients
        );

        Ok(Server {
            listener,
            clients,
            game,
            shutdown,
            tick_thread: Some(tick_thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    pub fn game(&self) -> SharedGame {
        Arc::clone(&self.game)
    }

    pub fn clients(&self) -> SharedClients {
        Arc::clone(&self.clients)
    }

    /// Stops the tick thread and the accept loop and closes every connection.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.tick_thread.take() {
            if handle.join().is_err() {
                error!("Tick thread panicked");
            }
        }

        self.listener.shutdown();
        lock(&self.clients).close_all();
        info!("Server stopped");
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if self.tick_thread.is_some() {
            self.stop();
        }
    }
}

/// Drives one connection from accept to removal.
///
/// Reads are issued one at a time; every complete line is dispatched on the
/// current phase before the next read, so the name line and any commands that
/// arrive with it in the same read are handled in order.
pub async fn run_session(
    mut conn: Connection,
    clients: SharedClients,
    game: SharedGame,
    connections: ConnectionSet,
) {
    if let Some(e) = conn.error() {
        error!("No longer accepting connections: {}", e);
        return;
    }
    let id = conn.id();

    let registered = lock(&clients).add_client(conn.handle());
    if !registered {
        warn!("Server full, turning away connection {}", id);
        conn.send_and_close(&format!("{}\n", SERVER_FULL));
        connections.remove(id);
        return;
    }

    let mut phase = SessionPhase::AwaitingName;
    while phase != SessionPhase::Removed && conn.receive().await {
        for line in conn.take_lines() {
            phase = match phase {
                SessionPhase::AwaitingName => process_first_message(&conn, &line, &clients, &game),
                SessionPhase::Active => {
                    if !line.is_empty() {
                        process_command(id, &line, &game);
                    }
                    SessionPhase::Active
                }
                SessionPhase::Removed => break,
            };
        }
    }

    if let Some(message) = conn.error_message() {
        debug!("Connection {} ended: {}", id, message);
    }
    remove_client(id, &clients, &game);
    connections.remove(id);
}

/// Treats `line` as the player's name: spawns the snake, sends the handshake
/// and activates the client.
///
/// Both locks are held while the handshake is queued and the client is
/// activated, so no tick broadcast can reach the client before it.
pub fn process_first_message(
    conn: &Connection,
    line: &str,
    clients: &SharedClients,
    game: &SharedGame,
) -> SessionPhase {
    let id = conn.id();
    let name = line.trim();

    let mut clients = lock(clients);
    let mut game = lock(game);

    game.add_snake(id, name);
    let walls = World::sorted_ids(&game.world.walls)
        .into_iter()
        .filter_map(|wall_id| game.world.walls.get(&wall_id));
    let handshake = match encode_handshake(id, game.world.size, walls) {
        Ok(handshake) => handshake,
        Err(e) => {
            error!("Failed to encode handshake for {}: {}", id, e);
            return SessionPhase::Removed;
        }
    };

    if !conn.send(&handshake) {
        debug!("Handshake to {} could not be sent", id);
        return SessionPhase::Removed;
    }
    clients.activate(id, name);
    SessionPhase::Active
}

/// Applies one direction command line from client `id`. Malformed lines are
/// skipped.
pub fn process_command(id: u32, line: &str, game: &SharedGame) {
    match ControlCommand::parse(line) {
        Ok(command) => {
            lock(game).apply_command(id, command.moving);
        }
        Err(e) => debug!("Dropping malformed command from {}: {} ({})", id, line, e),
    }
}

/// Forgets a client and flags its snake as disconnected.
pub fn remove_client(id: u32, clients: &SharedClients, game: &SharedGame) {
    let mut clients = lock(clients);
    if clients.remove_client(id).is_some() {
        lock(game).mark_disconnected(id);
    }
}

/// Runs one tick and broadcasts its snapshot to every active client.
///
/// The snapshot is taken under both locks; the sends happen after they are
/// released. Clients whose send cannot be initiated are removed. Returns the
/// new tick number.
pub fn update(clients: &SharedClients, game: &SharedGame) -> u64 {
    let (handles, blob, tick) = {
        let clients = lock(clients);
        let mut game = lock(game);
        let blob = game.update();
        (clients.active_handles(), blob, game.tick)
    };

    for handle in &handles {
        let sent = !handle.is_closed() && (blob.is_empty() || handle.send(&blob));
        if !sent {
            debug!("Broadcast to {} failed", handle.id());
            remove_client(handle.id(), clients, game);
        }
    }

    if tick % STATS_INTERVAL_TICKS == 0 {
        debug!("Tick {}: {} active clients", tick, handles.len());
    }
    tick
}

fn spawn_tick_loop(
    clients: SharedClients,
    game: SharedGame,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<thread::JoinHandle<()>> {
    let frame = Duration::from_millis(lock(&game).world.ms_per_frame);

    thread::Builder::new()
        .name("tick-loop".to_string())
        .spawn(move || {
            info!("Tick loop started at {:?} per frame", frame);
            let mut last = Instant::now();
            while !shutdown.load(Ordering::Acquire) {
                if last.elapsed() < frame {
                    thread::sleep(TICK_SLEEP);
                    continue;
                }
                last = Instant::now();
                update(&clients, &game);
            }
            info!("Tick loop stopped");
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Moving, Vector2D, Wall};
    use tokio_test::io::Builder;

    fn shared_state(max_clients: usize) -> (SharedClients, SharedGame) {
        let walls = vec![Wall::new(
            0,
            Vector2D::new(-975.0, -975.0),
            Vector2D::new(975.0, -975.0),
        )];
        let game = GameState::with_seed(World::new(2000, 34, 300, walls), 5);
        (
            Arc::new(Mutex::new(ClientManager::new(max_clients))),
            Arc::new(Mutex::new(game)),
        )
    }

    /// Heading of snake `id` spawned into a fresh copy of the shared game,
    /// after `commands`. The seed makes the spawn match the session's.
    fn replay_commands(id: u32, commands: &[Moving]) -> Vector2D {
        let (_, game) = shared_state(1);
        let mut game = lock(&game);
        game.add_snake(id, "replay");
        for &moving in commands {
            game.apply_command(id, moving);
        }
        game.world.snakes[&id].dir
    }

    #[tokio::test]
    async fn test_session_name_then_commands_in_one_read() {
        let (clients, game) = shared_state(4);
        let reader = Builder::new()
            .read(b"Bob\n{\"moving\":\"up\"}\n{\"moving\":\"left\"}\n")
            .build();
        let conn = Connection::new(3, reader, tokio::io::sink());

        run_session(conn, Arc::clone(&clients), Arc::clone(&game), ConnectionSet::new()).await;

        let game = lock(&game);
        let snake = &game.world.snakes[&3];
        assert_eq!(snake.name, "Bob");
        assert_eq!(snake.dir, replay_commands(3, &[Moving::Up, Moving::Left]));
        // The stream ended, so the snake is flagged for removal.
        assert!(snake.dc);
        assert!(lock(&clients).is_empty());
    }

    #[tokio::test]
    async fn test_blank_first_line_is_the_name() {
        let (clients, game) = shared_state(4);
        let reader = Builder::new()
            .read(b"\n{\"moving\":\"up\"}\n\n{\"moving\":\"left\"}\n")
            .build();
        let conn = Connection::new(5, reader, tokio::io::sink());

        run_session(conn, Arc::clone(&clients), Arc::clone(&game), ConnectionSet::new()).await;

        let game = lock(&game);
        let snake = &game.world.snakes[&5];
        assert_eq!(snake.name, "");
        assert_eq!(snake.dir, replay_commands(5, &[Moving::Up, Moving::Left]));
    }

    #[tokio::test]
    async fn test_session_rejected_when_full() {
        let (clients, game) = shared_state(0);
        let conn = Connection::new(0, tokio::io::empty(), tokio::io::sink());
        let handle = conn.handle();

        run_session(conn, Arc::clone(&clients), Arc::clone(&game), ConnectionSet::new()).await;

        assert!(lock(&game).world.snakes.is_empty());
        assert!(lock(&clients).is_empty());
        for _ in 0..100 {
            if handle.is_closed() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_first_message_activates() {
        let (clients, game) = shared_state(4);
        let conn = Connection::new(7, tokio::io::empty(), tokio::io::sink());
        lock(&clients).add_client(conn.handle());

        let phase = process_first_message(&conn, "Bob", &clients, &game);

        assert_eq!(phase, SessionPhase::Active);
        assert_eq!(lock(&clients).phase(7), SessionPhase::Active);
        assert_eq!(lock(&game).world.snakes[&7].name, "Bob");
    }

    #[test]
    fn test_process_command() {
        let (_, game) = shared_state(4);
        lock(&game).world.snakes.insert(
            1,
            shared::Snake::new(1, "a", Vector2D::ZERO, Vector2D::RIGHT),
        );

        process_command(1, "{\"moving\":\"up\"}", &game);
        assert_eq!(lock(&game).world.snakes[&1].dir, Vector2D::UP);

        process_command(1, "{\"moving\":", &game);
        process_command(1, "{\"moving\":\"down\"}", &game);
        process_command(42, "{\"moving\":\"left\"}", &game);
        assert_eq!(lock(&game).world.snakes[&1].dir, Vector2D::UP);

        assert!(lock(&game).apply_command(1, Moving::Left));
    }

    #[test]
    fn test_update_removes_failed_clients() {
        let (clients, game) = shared_state(4);
        let handle = Connection::failed(2, ConnectionError::Closed).handle();
        {
            let mut clients = lock(&clients);
            clients.add_client(handle);
            clients.activate(2, "gone");
        }
        lock(&game).add_snake(2, "gone");

        assert_eq!(update(&clients, &game), 1);
        assert!(lock(&clients).is_empty());
        assert!(lock(&game).world.snakes[&2].dc);

        // The next snapshot acknowledges and purges it.
        update(&clients, &game);
        assert!(!lock(&game).world.snakes.contains_key(&2));
    }
}
