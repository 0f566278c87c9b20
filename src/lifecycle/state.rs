//! Server lifecycle state.
//!
//! # States
//! ```text
//! Starting → Running → Draining → Stopped
//! ```
//! Transitions only move forward. A state is never revisited, so a stopped
//! server cannot be restarted; build a new one instead.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    Starting,
    Running,
    Draining,
    Stopped,
}

impl ServerState {
    /// Whether new connections may be accepted.
    pub fn is_accepting(&self) -> bool {
        *self == ServerState::Running
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerState::Starting => "starting",
            ServerState::Running => "running",
            ServerState::Draining => "draining",
            ServerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Shared, observable lifecycle state. Clones share the same state.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    tx: Arc<watch::Sender<ServerState>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ServerState::Starting);
        Self { tx: Arc::new(tx) }
    }

    pub fn state(&self) -> ServerState {
        *self.tx.borrow()
    }

    /// Move from exactly `from` to `to`.
    ///
    /// Returns `true` if this call performed the transition. Exactly one of
    /// several racing callers wins.
    pub fn transition(&self, from: ServerState, to: ServerState) -> bool {
        if to <= from {
            return false;
        }
        let moved = self.tx.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });
        if moved {
            tracing::info!(from = %from, to = %to, "Server state changed");
        }
        moved
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.tx.subscribe()
    }

    /// Wait until the state reaches at least `target`.
    pub async fn wait_for(&self, target: ServerState) -> ServerState {
        let mut rx = self.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let reached = match rx.wait_for(|state| *state >= target).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        reached
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn transitions_only_move_forward() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), ServerState::Starting);

        assert!(lifecycle.transition(ServerState::Starting, ServerState::Running));
        assert!(!lifecycle.transition(ServerState::Running, ServerState::Starting));
        assert!(!lifecycle.transition(ServerState::Starting, ServerState::Running));

        assert!(lifecycle.transition(ServerState::Running, ServerState::Draining));
        assert!(lifecycle.transition(ServerState::Draining, ServerState::Stopped));
        assert!(!lifecycle.transition(ServerState::Stopped, ServerState::Running));
        assert_eq!(lifecycle.state(), ServerState::Stopped);
    }

    #[test]
    fn only_running_accepts() {
        assert!(!ServerState::Starting.is_accepting());
        assert!(ServerState::Running.is_accepting());
        assert!(!ServerState::Draining.is_accepting());
        assert!(!ServerState::Stopped.is_accepting());
    }

    #[tokio::test]
    async fn wait_for_observes_later_state() {
        let lifecycle = Lifecycle::new();
        let waiter = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.wait_for(ServerState::Draining).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        lifecycle.transition(ServerState::Starting, ServerState::Running);
        lifecycle.transition(ServerState::Running, ServerState::Draining);
        lifecycle.transition(ServerState::Draining, ServerState::Stopped);

        assert!(waiter.await.unwrap() >= ServerState::Draining);
    }

    #[tokio::test]
    async fn wait_for_returns_at_once_when_already_past_target() {
        let lifecycle = Lifecycle::new();
        lifecycle.transition(ServerState::Starting, ServerState::Running);
        lifecycle.transition(ServerState::Running, ServerState::Stopped);

        let reached = tokio::time::timeout(
            Duration::from_millis(100),
            lifecycle.wait_for(ServerState::Draining),
        )
        .await
        .unwrap();
        assert_eq!(reached, ServerState::Stopped);
    }

    #[test]
    fn racing_transitions_have_one_winner() {
        let lifecycle = Lifecycle::new();
        lifecycle.transition(ServerState::Starting, ServerState::Running);

        let winners = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| lifecycle.transition(ServerState::Running, ServerState::Draining))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|won| *won)
                .count()
        });
        assert_eq!(winners, 1);
    }
}
