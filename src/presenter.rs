//! Now-playing presenter.
//!
//! Owns at most one live card per session and runs on its own task, so a
//! slow or broken display never holds up the scheduler. Bursts of updates
//! collapse to the latest one.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::display::{DisplayHandle, DisplaySink, NowPlayingCard};
use crate::session::SessionId;

enum Command {
    Show(NowPlayingCard),
    Clear,
    Barrier(oneshot::Sender<()>),
}

#[derive(Debug, Clone)]
pub struct Presenter {
    tx: mpsc::UnboundedSender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Show(card) => write!(f, "Show({})", card.title),
            Command::Clear => f.write_str("Clear"),
            Command::Barrier(_) => f.write_str("Barrier"),
        }
    }
}

impl Presenter {
    pub fn spawn(session: SessionId, sink: Arc<dyn DisplaySink>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(session, sink, rx));
        Self { tx }
    }

    /// Create the card, or replace the live one.
    pub fn show(&self, card: NowPlayingCard) {
        let _ = self.tx.send(Command::Show(card));
    }

    pub fn clear(&self) {
        let _ = self.tx.send(Command::Clear);
    }

    /// Resolves once every update sent before it has been applied.
    pub async fn settled(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Command::Barrier(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

async fn run(
    session: SessionId,
    sink: Arc<dyn DisplaySink>,
    mut rx: mpsc::UnboundedReceiver<Command>,
) {
    let mut live: Option<DisplayHandle> = None;

    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while let Ok(more) = rx.try_recv() {
            batch.push(more);
        }

        let mut pending: Option<Command> = None;
        for cmd in batch {
            match cmd {
                Command::Barrier(done) => {
                    if let Some(cmd) = pending.take() {
                        live = apply(session, sink.as_ref(), live, cmd).await;
                    }
                    let _ = done.send(());
                }
                other => {
                    if let Some(skipped) = pending.replace(other) {
                        debug!(session = %session, ?skipped, "superseded display update");
                    }
                }
            }
        }
        if let Some(cmd) = pending {
            live = apply(session, sink.as_ref(), live, cmd).await;
        }
    }

    debug!(session = %session, "presenter stopped");
}

async fn apply(
    session: SessionId,
    sink: &dyn DisplaySink,
    live: Option<DisplayHandle>,
    cmd: Command,
) -> Option<DisplayHandle> {
    match cmd {
        Command::Show(card) => {
            if let Some(handle) = live {
                match sink.replace(handle, &card).await {
                    Ok(()) => return Some(handle),
                    Err(e) => {
                        warn!(session = %session, error = %e, "failed to replace now-playing card, posting a new one");
                    }
                }
            }
            match sink.show(&card).await {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!(session = %session, error = %e, "failed to show now-playing card");
                    None
                }
            }
        }
        Command::Clear => {
            if let Some(handle) = live {
                if let Err(e) = sink.clear(handle).await {
                    warn!(session = %session, error = %e, "failed to clear now-playing card");
                }
            }
            None
        }
        Command::Barrier(done) => {
            let _ = done.send(());
            live
        }
    }
}
