//! Push channel: one websocket, reconnected forever, fanned out to listeners.
//!
//! Frames are decoded into [`Notification`]s as soon as they arrive; listeners never see the
//! wire text.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tungstenite::Message;
use tungstenite::stream::MaybeTlsStream;

use crate::model::Notification;

/// Decodes `kind` or `kind:subjectId`, splitting once at the first colon.
pub fn decode_frame(raw: &str) -> Option<Notification> {
    let raw = raw.trim();
    let (kind, subject) = match raw.split_once(':') {
        Some((kind, subject)) => (kind.trim(), Some(subject.trim()).filter(|s| !s.is_empty())),
        None => (raw, None),
    };
    if kind.is_empty() {
        return None;
    }
    Some(Notification::new(kind, subject))
}

pub type Listener = Arc<dyn Fn(&Notification) -> anyhow::Result<()> + Send + Sync>;

type Slots = Mutex<Vec<(u64, Listener)>>;

#[derive(Clone, Default)]
pub struct ListenerRegistry {
    slots: Arc<Slots>,
    next_id: Arc<AtomicU64>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registering the same listener again returns a handle to the existing registration.
    pub fn subscribe(&self, listener: Listener) -> Subscription {
        let mut slots = lock(&self.slots);
        let existing = slots
            .iter()
            .find(|(_, l)| same_listener(l, &listener))
            .map(|(id, _)| *id);
        let id = match existing {
            Some(id) => id,
            None => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                slots.push((id, listener));
                id
            }
        };
        Subscription {
            slots: Arc::downgrade(&self.slots),
            id,
            active: true,
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs every listener; a failing or panicking listener is logged and skipped.
    pub fn dispatch(&self, notification: &Notification) -> usize {
        let listeners: Vec<Listener> = lock(&self.slots)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        let mut delivered = 0;
        for listener in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(notification))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(err)) => {
                    tracing::warn!(kind = %notification.kind, "listener failed: {:#}", err)
                }
                Err(_) => tracing::warn!(kind = %notification.kind, "listener panicked"),
            }
        }
        delivered
    }
}

fn same_listener(a: &Listener, b: &Listener) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

fn lock(slots: &Slots) -> std::sync::MutexGuard<'_, Vec<(u64, Listener)>> {
    // A listener never runs under the lock, so poisoning only means a push panicked.
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Removes its listener on `dispose()` or drop. Removal is idempotent.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    slots: Weak<Slots>,
    id: u64,
    active: bool,
}

impl Subscription {
    pub fn dispose(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(slots) = self.slots.upgrade() {
            lock(&slots).retain(|(id, _)| *id != self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[derive(Clone, Debug)]
pub struct ChannelSettings {
    pub reconnect_delay: Duration,
    pub ping_interval: Option<Duration>,
    /// How often the reader wakes up to check for shutdown and pings.
    pub poll_interval: Duration,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(3),
            ping_interval: None,
            poll_interval: Duration::from_millis(200),
        }
    }
}

pub struct PushChannel {
    url: String,
    registry: ListenerRegistry,
    connected: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PushChannel {
    /// Starts the connection thread; the first attempt happens immediately.
    pub fn connect(url: impl Into<String>, settings: ChannelSettings) -> Self {
        let url = url.into();
        let registry = ListenerRegistry::new();
        let connected = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));

        let worker = Worker {
            url: url.clone(),
            settings,
            registry: registry.clone(),
            connected: Arc::clone(&connected),
            stop: Arc::clone(&stop),
        };
        let handle = std::thread::Builder::new()
            .name("muster-push".to_string())
            .spawn(move || worker.run());
        let handle = match handle {
            Ok(h) => Some(h),
            Err(err) => {
                tracing::warn!("could not start push channel thread: {}", err);
                None
            }
        };

        Self {
            url,
            registry,
            connected,
            stop,
            handle,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.registry
    }

    pub fn subscribe(&self, listener: Listener) -> Subscription {
        self.registry.subscribe(listener)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("push channel thread panicked");
            }
        }
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

type Socket = tungstenite::WebSocket<MaybeTlsStream<std::net::TcpStream>>;

struct Worker {
    url: String,
    settings: ChannelSettings,
    registry: ListenerRegistry,
    connected: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl Worker {
    fn run(self) {
        while !self.stopped() {
            match tungstenite::connect(self.url.as_str()) {
                Ok((mut socket, _)) => {
                    tracing::info!(url = %self.url, "push channel connected");
                    self.connected.store(true, Ordering::SeqCst);
                    let result = self.pump(&mut socket);
                    self.connected.store(false, Ordering::SeqCst);
                    let _ = socket.close(None);
                    match result {
                        Ok(()) => break,
                        Err(err) => {
                            tracing::info!(url = %self.url, "push channel dropped: {}", err)
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(url = %self.url, "push channel connect failed: {}", err)
                }
            }
            self.sleep(self.settings.reconnect_delay);
        }
    }

    /// Reads until the connection fails (`Err`) or shutdown is requested (`Ok`).
    fn pump(&self, socket: &mut Socket) -> Result<(), tungstenite::Error> {
        if let MaybeTlsStream::Plain(stream) = socket.get_ref() {
            stream.set_read_timeout(Some(self.settings.poll_interval))?;
        }
        let mut last_ping = Instant::now();
        loop {
            if self.stopped() {
                return Ok(());
            }
            if let Some(interval) = self.settings.ping_interval {
                if last_ping.elapsed() >= interval {
                    socket.send(Message::Ping(Vec::new()))?;
                    last_ping = Instant::now();
                }
            }
            match socket.read() {
                Ok(Message::Text(text)) => match decode_frame(&text) {
                    Some(notification) => {
                        tracing::debug!(
                            kind = %notification.kind,
                            subject = ?notification.subject_id,
                            "push notification"
                        );
                        self.registry.dispatch(&notification);
                    }
                    None => tracing::debug!(frame = %text, "ignoring empty frame"),
                },
                Ok(Message::Close(_)) => return Err(tungstenite::Error::ConnectionClosed),
                Ok(_) => {}
                Err(tungstenite::Error::Io(err))
                    if matches!(
                        err.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) => {}
                Err(err) => return Err(err),
            }
        }
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn sleep(&self, total: Duration) {
        let deadline = Instant::now() + total;
        while !self.stopped() {
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(50)));
        }
    }
}

#[cfg(test)]
#[path = "tests/channel_tests.rs"]
mod tests;
