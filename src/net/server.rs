use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::AppConfig;
use crate::net::protocol::{ClientCommand, ProtocolError, ServerMessage};
use crate::net::transport::{FrameReader, FrameWriter, TcpFrameWriter, TcpTransport};
use crate::persistence::autosave::{autosave_world, AutosaveConfig, AutosaveState};
use crate::world::error::{MapError, StorageError};
use crate::world::state::World;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);
const LOOP_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerSignal {
    Running = 0,
    Shutdown = 1,
}

/// Shared stop flag for the accept loop and the background loops.
#[derive(Debug)]
pub struct ServerControl {
    signal: AtomicU8,
}

impl Default for ServerControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerControl {
    pub fn new() -> Self {
        Self {
            signal: AtomicU8::new(ServerSignal::Running as u8),
        }
    }

    pub fn request_shutdown(&self) {
        self.signal.store(ServerSignal::Shutdown as u8, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.signal.load(Ordering::SeqCst) == ServerSignal::Running as u8
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Map(#[from] MapError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Log(#[from] crate::telemetry::logging::LogError),
    #[error("world lock poisoned")]
    LockPoisoned,
}

#[derive(Debug, Clone)]
pub struct GameServerConfig {
    pub bind_addr: String,
    pub tick: Duration,
    pub growth_every: u64,
    pub autosave_interval_seconds: u64,
}

impl Default for GameServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:1234".to_string(),
            tick: Duration::from_millis(1000),
            growth_every: 60,
            autosave_interval_seconds: 0,
        }
    }
}

impl From<&AppConfig> for GameServerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            bind_addr: config.bind.clone(),
            tick: Duration::from_millis(config.tick_ms.max(1)),
            growth_every: config.growth_every,
            autosave_interval_seconds: config.autosave_secs,
        }
    }
}

pub(crate) fn lock_world(world: &Mutex<World>) -> Result<MutexGuard<'_, World>, ServerError> {
    world.lock().map_err(|_| ServerError::LockPoisoned)
}

pub fn run_game_server(
    config: GameServerConfig,
    world: Arc<Mutex<World>>,
    control: Arc<ServerControl>,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind(&config.bind_addr).map_err(|source| ServerError::Bind {
        addr: config.bind_addr.clone(),
        source,
    })?;
    serve(listener, config, world, control)
}

/// Runs the accept loop on an already bound listener until shutdown is
/// requested, with the tick and autosave loops alongside.
pub fn serve(
    listener: TcpListener,
    config: GameServerConfig,
    world: Arc<Mutex<World>>,
    control: Arc<ServerControl>,
) -> Result<(), ServerError> {
    listener.set_nonblocking(true)?;
    let local = listener.local_addr()?;
    tracing::info!(addr = %local, "game server listening");

    let tick_loop = spawn_tick_loop(&config, Arc::clone(&world), Arc::clone(&control));
    let autosave_loop = spawn_autosave_loop(&config, Arc::clone(&world), Arc::clone(&control));

    while control.is_running() {
        match listener.accept() {
            Ok((stream, addr)) => {
                tracing::info!(peer = %addr, "connection accepted");
                let world = Arc::clone(&world);
                let control = Arc::clone(&control);
                thread::spawn(move || {
                    if let Err(err) = handle_connection(stream, addr, &world, &control) {
                        tracing::error!(peer = %addr, error = %err, "connection failed");
                    }
                });
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_BACKOFF);
            }
            Err(err) => {
                tracing::warn!(error = %err, "accept failed");
            }
        }
    }

    for handle in [Some(tick_loop), autosave_loop].into_iter().flatten() {
        if handle.join().is_err() {
            tracing::error!("background loop panicked");
        }
    }
    tracing::info!(addr = %local, "game server stopped");
    Ok(())
}

/// One client: a writer thread drains the session outbox onto the socket
/// while this thread decodes commands and applies them under the world lock.
fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    world: &Mutex<World>,
    control: &ServerControl,
) -> Result<(), ServerError> {
    let (mut reader, writer) = TcpTransport::new(stream).split()?;
    let (outbox, inbox) = mpsc::channel();
    let session = lock_world(world)?.connect(outbox);
    let writer_thread = thread::spawn(move || drain_outbox(inbox, writer));

    let result = loop {
        if !control.is_running() {
            break Ok(());
        }
        let frame = match reader.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break Ok(()),
            Err(ProtocolError::Io(err)) => {
                tracing::debug!(session = %session, error = %err, "connection read ended");
                break Ok(());
            }
            Err(err) => break Err(ServerError::from(err)),
        };
        match ClientCommand::decode(&frame) {
            Ok(command) => match lock_world(world) {
                Ok(mut world) => world.handle_command(session, command),
                Err(err) => break Err(err),
            },
            Err(err) => {
                tracing::debug!(session = %session, error = %err, "undecodable command");
                match lock_world(world) {
                    Ok(world) => world.tell(session, format!("Bad command: {err}")),
                    Err(err) => break Err(err),
                }
            }
        }
    };

    lock_world(world)?.disconnect(session);
    if writer_thread.join().is_err() {
        tracing::error!(session = %session, "writer thread panicked");
    }
    tracing::info!(peer = %peer, session = %session, "connection closed");
    result
}

/// Ends when the broadcaster drops the session's sender or the socket fails.
fn drain_outbox(inbox: Receiver<ServerMessage>, mut writer: TcpFrameWriter) {
    for message in inbox {
        if let Err(err) = writer.write_frame(&message.encode()) {
            tracing::debug!(error = %err, "write failed");
            break;
        }
    }
    writer.shutdown();
}

fn spawn_tick_loop(
    config: &GameServerConfig,
    world: Arc<Mutex<World>>,
    control: Arc<ServerControl>,
) -> thread::JoinHandle<()> {
    let tick = config.tick;
    let growth_every = config.growth_every;
    thread::spawn(move || {
        let mut next = Instant::now() + tick;
        while control.is_running() {
            let now = Instant::now();
            if now < next {
                thread::sleep((next - now).min(ACCEPT_BACKOFF));
                continue;
            }
            next += tick;
            match world.lock() {
                Ok(mut world) => {
                    if let Err(err) = world.run_tick(growth_every) {
                        tracing::error!(error = %err, "tick failed");
                    }
                }
                Err(_) => {
                    tracing::error!("tick skipped (world lock poisoned)");
                    return;
                }
            }
        }
    })
}

fn spawn_autosave_loop(
    config: &GameServerConfig,
    world: Arc<Mutex<World>>,
    control: Arc<ServerControl>,
) -> Option<thread::JoinHandle<()>> {
    let autosave = AutosaveConfig {
        interval_seconds: config.autosave_interval_seconds,
    };
    let interval = autosave.interval()?;
    tracing::info!(interval_secs = interval.as_secs(), "autosave enabled");
    Some(thread::spawn(move || {
        let mut state = AutosaveState::new(autosave, Instant::now());
        while control.is_running() {
            let now = Instant::now();
            if state.due(now) {
                let report = match world.lock() {
                    Ok(mut world) => autosave_world(&mut world),
                    Err(_) => {
                        tracing::error!("autosave failed (world lock poisoned)");
                        return;
                    }
                };
                match report.error {
                    Some(err) => tracing::error!(error = %err, "autosave failed"),
                    None => tracing::info!(
                        sectors = report.saved.sectors,
                        players = report.saved.players,
                        containers = report.saved.containers,
                        "autosave completed"
                    ),
                }
                state.mark_saved(now);
            }
            thread::sleep(LOOP_POLL);
        }
    }))
}
