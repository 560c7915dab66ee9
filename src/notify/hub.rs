//! Live connection hub.
//!
//! A single actor task owns registration changes; everything else talks to
//! it through a [`HubHandle`]. Delivery is best-effort: a user with no open
//! connection simply misses the push and reads the feed later.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Frame queued for one socket
#[derive(Debug, Clone)]
pub struct PushMessage {
    pub json: String,
}

/// Outbound queue of one socket
pub type PushSender = mpsc::UnboundedSender<PushMessage>;

pub type ConnectionId = u64;

#[derive(Debug)]
enum HubCommand {
    Register {
        user_id: Uuid,
        conn_id: ConnectionId,
        sender: PushSender,
    },
    Unregister {
        user_id: Uuid,
        conn_id: ConnectionId,
    },
    Send {
        user_id: Uuid,
        payload: String,
    },
    Shutdown,
}

/// user id -> open sockets
type Registry = DashMap<Uuid, Vec<(ConnectionId, PushSender)>>;

pub struct NotificationHub;

impl NotificationHub {
    /// Spawn the hub actor on the current runtime.
    pub fn start() -> HubHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry: Arc<Registry> = Arc::new(DashMap::new());

        tokio::spawn(run(rx, registry.clone()));
        tracing::debug!("notification hub started");

        HubHandle {
            tx,
            registry,
            next_conn: Arc::new(AtomicU64::new(1)),
        }
    }
}

/// Cloneable handle to the hub actor
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<HubCommand>,
    registry: Arc<Registry>,
    next_conn: Arc<AtomicU64>,
}

impl HubHandle {
    /// Attach a socket for a user. The returned id is needed to detach it.
    pub fn register(&self, user_id: Uuid, sender: PushSender) -> ConnectionId {
        let conn_id = self.next_conn.fetch_add(1, Ordering::Relaxed);
        self.command(HubCommand::Register {
            user_id,
            conn_id,
            sender,
        });
        conn_id
    }

    pub fn unregister(&self, user_id: Uuid, conn_id: ConnectionId) {
        self.command(HubCommand::Unregister { user_id, conn_id });
    }

    /// Queue a frame for every socket of `user_id`.
    pub fn send(&self, user_id: Uuid, payload: String) {
        self.command(HubCommand::Send { user_id, payload });
    }

    pub fn stop(&self) {
        self.command(HubCommand::Shutdown);
    }

    /// Resolves once the actor has exited.
    pub async fn stopped(&self) {
        self.tx.closed().await
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    pub fn connection_count(&self) -> usize {
        self.registry.iter().map(|entry| entry.value().len()).sum()
    }

    fn command(&self, cmd: HubCommand) {
        if self.tx.send(cmd).is_err() {
            tracing::debug!("notification hub is stopped, dropping command");
        }
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<HubCommand>, registry: Arc<Registry>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            HubCommand::Register {
                user_id,
                conn_id,
                sender,
            } => {
                registry.entry(user_id).or_default().push((conn_id, sender));
                tracing::debug!(user_id = %user_id, conn_id, "live connection registered");
            }
            HubCommand::Unregister { user_id, conn_id } => {
                registry.alter(&user_id, |_, mut conns| {
                    conns.retain(|(id, _)| *id != conn_id);
                    conns
                });
                registry.remove_if(&user_id, |_, conns| conns.is_empty());
                tracing::debug!(user_id = %user_id, conn_id, "live connection removed");
            }
            HubCommand::Send { user_id, payload } => {
                let mut pruned = false;
                if let Some(mut conns) = registry.get_mut(&user_id) {
                    conns.retain(|(conn_id, sender)| {
                        let open = sender
                            .send(PushMessage {
                                json: payload.clone(),
                            })
                            .is_ok();
                        if !open {
                            tracing::debug!(user_id = %user_id, conn_id, "pruning closed connection");
                        }
                        open
                    });
                    pruned = conns.is_empty();
                }
                if pruned {
                    registry.remove_if(&user_id, |_, conns| conns.is_empty());
                }
            }
            HubCommand::Shutdown => break,
        }
    }

    registry.clear();
    tracing::debug!("notification hub stopped");
}
