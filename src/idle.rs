//! Idle monitor: a single-shot timer that asks the session to leave after
//! sitting with nothing to play.

use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::player::SessionSignal;

#[derive(Debug)]
pub struct IdleMonitor {
    timeout: Duration,
    next_arm: u64,
    armed: Option<(u64, JoinHandle<()>)>,
}

impl IdleMonitor {
    /// A zero timeout disables the monitor.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            next_arm: 0,
            armed: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start (or restart) the countdown. The expiry is delivered through the
    /// session's signal channel tagged with this arm's id.
    pub fn arm(&mut self, signals: &UnboundedSender<SessionSignal>) -> bool {
        self.disarm();
        if self.timeout.is_zero() {
            return false;
        }

        self.next_arm += 1;
        let arm = self.next_arm;
        let timeout = self.timeout;
        let signals = signals.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = signals.send(SessionSignal::IdleExpired { arm });
        });
        self.armed = Some((arm, task));
        true
    }

    pub fn disarm(&mut self) {
        if let Some((_, task)) = self.armed.take() {
            task.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Accept an expiry only if it belongs to the current arm. An expiry that
    /// raced a disarm or re-arm is rejected.
    pub fn fire(&mut self, arm: u64) -> bool {
        match self.armed {
            Some((current, _)) if current == arm => {
                self.armed = None;
                true
            }
            _ => false,
        }
    }
}

impl Drop for IdleMonitor {
    fn drop(&mut self) {
        self.disarm();
    }
}
