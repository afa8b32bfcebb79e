//! Connection lifecycle engine.
//!
//! [`Client::start`] dials the server and spawns the engine task. Each
//! connection epoch runs three tasks — frame reader, frame writer and
//! keepalive monitor — under a per-epoch cancellation token, all talking
//! through bounded channels. The engine task is the single event loop: it
//! classifies inbound events, forwards them to the application, and owns
//! the reconnect decision. `disconnect` cancels the epoch token and joins
//! every task before the next epoch may dial, so no task ever touches a
//! dead transport and no two transports are ever live at once.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::IrcCodec;
use crate::config::Config;
use crate::error::EngineError;
use crate::event::Event;
use crate::handler::Handler;
use crate::state::{now_nanos, Shared};
use crate::transport::{self, Stream};

/// Outbound queue depth (fully formatted lines awaiting the writer).
const OUTBOUND_QUEUE: usize = 16;
/// Parsed-event queue depth between the reader and the event loop.
const EVENT_QUEUE: usize = 8;
/// Application-facing event channel depth.
const DELIVERY_QUEUE: usize = 32;

/// Liveness check cadence.
const LIVENESS_TICK: Duration = Duration::from_secs(60);
/// Server silence tolerated before a liveness probe is sent.
const LIVENESS_WINDOW: Duration = Duration::from_secs(240);
/// Unconditional ping (and nickname recapture) cadence.
const REFRESH_TICK: Duration = Duration::from_secs(900);

/// Policy deciding how long to wait before each reconnect attempt.
///
/// The default ([`ImmediateReconnect`]) retries without delay, forever —
/// callers wanting backoff or circuit breaking implement this trait and
/// pass it to [`Client::start_with`]; the engine state machine is
/// unaffected.
pub trait ReconnectPolicy: Send + Sync + 'static {
    /// Delay to wait before reconnect attempt `attempt` (1-based).
    fn next_delay(&self, attempt: u32) -> Duration;
}

/// Reconnect immediately, without backoff, forever.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateReconnect;

impl ReconnectPolicy for ImmediateReconnect {
    fn next_delay(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }
}

/// Handle to a running engine.
///
/// Cheap to clone; all clones share the same outbound queue and stop
/// signal. Command builders live in the `command` module and format lines
/// onto the same queue.
#[derive(Clone)]
pub struct Client {
    outbound: mpsc::Sender<String>,
    shared: Arc<Shared>,
    stop: CancellationToken,
}

impl Client {
    /// Connect and start the engine with the default reconnect policy.
    ///
    /// Returns the handle and the application event stream. The stream is
    /// ordered per connection epoch and terminated by a single
    /// [`event::STOPPED`](crate::event::STOPPED) event after
    /// [`Client::stop`]. A failure to establish the first connection is
    /// returned directly and nothing is spawned.
    pub async fn start(config: Config) -> Result<(Self, mpsc::Receiver<Event>), EngineError> {
        Self::start_with(config, ImmediateReconnect).await
    }

    /// Connect and start the engine with a custom reconnect policy.
    pub async fn start_with<P: ReconnectPolicy>(
        config: Config,
        policy: P,
    ) -> Result<(Self, mpsc::Receiver<Event>), EngineError> {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
        let (delivery_tx, delivery_rx) = mpsc::channel(DELIVERY_QUEUE);
        let shared = Arc::new(Shared::new(&config.nick));
        let stop = CancellationToken::new();

        let handler = Handler {
            shared: Arc::clone(&shared),
            outbound: outbound_tx.clone(),
            username: config.username.clone(),
            debug: config.debug,
        };
        let mut supervisor = Supervisor {
            config,
            shared: Arc::clone(&shared),
            handler,
            outbound_tx: outbound_tx.clone(),
            outbound_rx: Some(outbound_rx),
            stop: stop.clone(),
            policy: Box::new(policy),
        };

        let epoch = supervisor.connect().await?;
        tokio::spawn(supervisor.run(epoch, delivery_tx));

        Ok((
            Self {
                outbound: outbound_tx,
                shared,
                stop,
            },
            delivery_rx,
        ))
    }

    /// Stop the engine: disconnect, deliver the terminal stopped event, do
    /// not reconnect.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Snapshot of the nickname currently held on the server (may diverge
    /// from the configured one after collision handling).
    pub fn current_nick(&self) -> String {
        self.shared.current_nick()
    }

    /// Enqueue one protocol line; the CRLF terminator is appended here.
    ///
    /// Lines reach the server in enqueue order. Fails only once the engine
    /// has stopped.
    pub async fn send_raw(&self, line: impl Into<String>) -> Result<(), EngineError> {
        let mut line = line.into();
        line.push_str("\r\n");
        self.outbound
            .send(line)
            .await
            .map_err(|_| EngineError::Stopped)
    }
}

/// One connection epoch: the running tasks plus their channels.
struct Epoch {
    token: CancellationToken,
    events: mpsc::Receiver<Event>,
    errors: mpsc::Receiver<EngineError>,
    reader: JoinHandle<()>,
    writer: JoinHandle<mpsc::Receiver<String>>,
    keepalive: JoinHandle<()>,
}

/// What the event loop decided to do after one `select`.
enum Step {
    Stop,
    Error(EngineError),
    Event(Event),
}

struct Supervisor {
    config: Config,
    shared: Arc<Shared>,
    handler: Handler,
    outbound_tx: mpsc::Sender<String>,
    /// Outbound queue receiver, parked here between connection epochs; the
    /// writer task holds it while an epoch is live and hands it back on
    /// exit.
    outbound_rx: Option<mpsc::Receiver<String>>,
    stop: CancellationToken,
    policy: Box<dyn ReconnectPolicy>,
}

impl Supervisor {
    /// Dial and stand up a new connection epoch: transport, the three
    /// tasks, and the registration sequence.
    async fn connect(&mut self) -> Result<Epoch, EngineError> {
        let stream = transport::dial(&self.config).await?;

        let mut outbound_rx = self.outbound_rx.take().ok_or(EngineError::Stopped)?;
        // Lines queued for the previous connection must not precede
        // registration on the new one.
        while outbound_rx.try_recv().is_ok() {}

        let token = CancellationToken::new();
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE);
        let (error_tx, error_rx) = mpsc::channel(2);

        let (reader, writer) = match stream {
            Stream::Tcp(stream) => {
                let (read, write) = stream.into_split();
                (
                    spawn_reader(read, event_tx, error_tx.clone(), token.clone()),
                    spawn_writer(write, outbound_rx, error_tx, token.clone()),
                )
            }
            Stream::Tls(stream) => {
                let (read, write) = tokio::io::split(*stream);
                (
                    spawn_reader(read, event_tx, error_tx.clone(), token.clone()),
                    spawn_writer(write, outbound_rx, error_tx, token.clone()),
                )
            }
        };
        let keepalive = spawn_keepalive(
            Arc::clone(&self.shared),
            self.outbound_tx.clone(),
            token.clone(),
        );

        self.register().await;

        Ok(Epoch {
            token,
            events: event_rx,
            errors: error_rx,
            reader,
            writer,
            keepalive,
        })
    }

    /// Enqueue the registration sequence: NICK, USER, then PASS if set.
    async fn register(&self) {
        let (wanted, _) = self.shared.nick_snapshot();
        let user = &self.config.username;
        self.enqueue(format!("NICK {wanted}\r\n")).await;
        self.enqueue(format!("USER {user} 0.0.0.0 0.0.0.0 :{user}\r\n"))
            .await;
        if let Some(password) = &self.config.password {
            self.enqueue(format!("PASS {password}\r\n")).await;
        }
    }

    async fn enqueue(&self, line: String) {
        if self.outbound_tx.send(line).await.is_err() {
            warn!("outbound queue closed during registration");
        }
    }

    /// The event loop. Runs until stopped; the only consumer of parsed
    /// events and the only trigger of reconnection.
    async fn run(mut self, mut epoch: Epoch, delivery: mpsc::Sender<Event>) {
        loop {
            let step = tokio::select! {
                biased;
                _ = self.stop.cancelled() => Step::Stop,
                maybe = epoch.errors.recv() => {
                    Step::Error(maybe.unwrap_or(EngineError::ConnectionClosed))
                }
                maybe = epoch.events.recv() => match maybe {
                    Some(event) => Step::Event(event),
                    None => Step::Error(EngineError::ConnectionClosed),
                },
            };

            match step {
                Step::Stop => {
                    self.disconnect(epoch).await;
                    let _ = delivery.send(Event::stopped()).await;
                    info!("engine stopped");
                    return;
                }
                Step::Error(error) => {
                    warn!(error = %error, "transport failed, reconnecting");
                    self.disconnect(epoch).await;
                    match self.reconnect().await {
                        Some(next) => epoch = next,
                        None => {
                            // Stop was requested while reconnecting.
                            let _ = delivery.send(Event::stopped()).await;
                            info!("engine stopped");
                            return;
                        }
                    }
                }
                Step::Event(mut event) => {
                    self.shared.touch();
                    self.handler.handle(&mut event);
                    if delivery.send(event).await.is_err() {
                        warn!("event stream dropped by application, stopping");
                        self.stop.cancel();
                    }
                }
            }
        }
    }

    /// Tear down an epoch: signal every task, then wait for each to
    /// acknowledge exit. The transport halves are owned by the reader and
    /// writer, so once both are joined the socket is fully closed.
    async fn disconnect(&mut self, epoch: Epoch) {
        let Epoch {
            token,
            events,
            errors,
            reader,
            writer,
            keepalive,
        } = epoch;

        // Unblock tasks parked on a full channel before joining them.
        drop(events);
        drop(errors);

        // Let the writer flush whatever is queued, then cut everything
        // loose.
        let _ = self.outbound_tx.try_send(String::new());
        token.cancel();

        match writer.await {
            Ok(outbound_rx) => self.outbound_rx = Some(outbound_rx),
            Err(e) => warn!(error = %e, "writer task failed"),
        }
        let _ = reader.await;
        let _ = keepalive.await;
        debug!("disconnected");
    }

    /// Redial until a connection is established or stop is requested.
    async fn reconnect(&mut self) -> Option<Epoch> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let delay = self.policy.next_delay(attempt);
            if !delay.is_zero() {
                tokio::select! {
                    _ = self.stop.cancelled() => return None,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if self.stop.is_cancelled() {
                return None;
            }
            match self.connect().await {
                Ok(epoch) => return Some(epoch),
                Err(error) => warn!(error = %error, attempt, "reconnect attempt failed"),
            }
        }
    }
}

/// Reader task: frames the transport into events until the transport
/// fails, the peer hangs up, or the epoch is cancelled. Errors are
/// reported once; reconnection is the supervisor's job.
fn spawn_reader<R>(
    read_half: R,
    events: mpsc::Sender<Event>,
    errors: mpsc::Sender<EngineError>,
    token: CancellationToken,
) -> JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut frames = FramedRead::new(read_half, IrcCodec::new());
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                next = frames.next() => match next {
                    Some(Ok(event)) => {
                        if events.send(event).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        let _ = errors.try_send(e.into());
                        break;
                    }
                    None => {
                        let _ = errors.try_send(EngineError::ConnectionClosed);
                        break;
                    }
                },
            }
        }
    })
}

/// Writer task: sole consumer of the outbound queue, so wire writes are
/// serialized by construction. Exits on the empty-line sentinel, queue
/// closure, cancellation, or a write error (reported once); the queue
/// receiver is handed back for the next epoch.
fn spawn_writer<W>(
    write_half: W,
    mut outbound_rx: mpsc::Receiver<String>,
    errors: mpsc::Sender<EngineError>,
    token: CancellationToken,
) -> JoinHandle<mpsc::Receiver<String>>
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut sink = FramedWrite::new(write_half, IrcCodec::new());
        loop {
            let line = tokio::select! {
                biased;
                maybe = outbound_rx.recv() => match maybe {
                    Some(line) => line,
                    None => break,
                },
                _ = token.cancelled() => break,
            };
            // Shutdown sentinel: drain up to here, then stop.
            if line.is_empty() {
                break;
            }
            debug!(line = %line.trim_end(), "send");
            if let Err(e) = sink.send(line).await {
                let _ = errors.try_send(e.into());
                break;
            }
        }
        outbound_rx
    })
}

/// Keepalive task: probes the server during silence and periodically tries
/// to recapture the configured nickname. Only ever enqueues; never touches
/// the transport or the connection state.
fn spawn_keepalive(
    shared: Arc<Shared>,
    outbound: mpsc::Sender<String>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now();
        let mut liveness = tokio::time::interval_at(start + LIVENESS_TICK, LIVENESS_TICK);
        let mut refresh = tokio::time::interval_at(start + REFRESH_TICK, REFRESH_TICK);
        let window = LIVENESS_WINDOW.as_nanos() as i64;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = liveness.tick() => {
                    if shared.nanos_since_last_seen() >= window
                        && !probe(&outbound, format!("PING {}\r\n", now_nanos()))
                    {
                        break;
                    }
                }
                _ = refresh.tick() => {
                    if !probe(&outbound, format!("PING {}\r\n", now_nanos())) {
                        break;
                    }
                    let (wanted, current) = shared.nick_snapshot();
                    if wanted != current {
                        info!(nick = %wanted, "attempting nickname recapture");
                        if !probe(&outbound, format!("NICK {wanted}\r\n")) {
                            break;
                        }
                    }
                }
            }
        }
    })
}

/// Enqueue a keepalive line without blocking. A full queue skips the probe
/// (the next tick retries); a closed queue means the engine is gone.
fn probe(outbound: &mpsc::Sender<String>, line: String) -> bool {
    match outbound.try_send(line) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!("outbound queue full, skipping keepalive probe");
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}
