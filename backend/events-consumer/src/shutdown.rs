use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Process-wide shutdown flag. Any number of triggers converge on a single
/// transition to `true`.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Returns `true` only for the call that actually started the shutdown
    pub fn trigger(&self) -> bool {
        !self.tx.send_replace(true)
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Trigger `shutdown` on SIGINT or SIGTERM. Keeps listening afterwards so
/// repeated signals while draining are absorbed.
#[cfg(unix)]
pub async fn listen_for_signals(shutdown: Shutdown) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    loop {
        let name = tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
        };
        note_signal(&shutdown, name);
    }
}

#[cfg(not(unix))]
pub async fn listen_for_signals(shutdown: Shutdown) -> std::io::Result<()> {
    loop {
        tokio::signal::ctrl_c().await?;
        note_signal(&shutdown, "Ctrl+C");
    }
}

fn note_signal(shutdown: &Shutdown, name: &str) {
    if shutdown.trigger() {
        info!(signal = name, "Shutdown signal received, draining");
    } else {
        warn!(signal = name, "Shutdown already in progress");
    }
}
