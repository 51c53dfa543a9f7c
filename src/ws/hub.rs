//! Outbound message routing to connected clients

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::protocol::ServerMsg;

/// Where the game core sends messages
pub trait Outbox: Send + Sync {
    /// Send to every bound connection except `exclude`
    fn broadcast(&self, msg: &ServerMsg, exclude: Option<&str>);

    /// Send to a single player; unknown names are ignored
    fn send_to(&self, name: &str, msg: &ServerMsg);

    /// Drop the player's route and close their connection. Messages already
    /// queued for them are still flushed.
    fn evict(&self, name: &str);
}

/// One bound socket
struct Route {
    tx: mpsc::UnboundedSender<ServerMsg>,
    /// Cancelled when the route is evicted or taken over by a newer socket
    closed: CancellationToken,
}

/// Outbound channel per connected player, keyed by player name
pub struct ConnectionHub {
    connections: DashMap<String, Route>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Route messages for `name` into `tx`, replacing any earlier connection.
    /// `closed` is cancelled once the hub stops routing to this socket.
    pub fn bind(&self, name: &str, tx: mpsc::UnboundedSender<ServerMsg>, closed: CancellationToken) {
        if let Some(old) = self.connections.insert(name.to_string(), Route { tx, closed }) {
            debug!(name = %name, "Rebound connection to newer socket");
            old.closed.cancel();
        }
    }

    /// Drop the route for `name`, but only if it still points at `tx`.
    /// A reconnect may already have bound a newer socket. Returns whether
    /// the route was dropped.
    pub fn unbind(&self, name: &str, tx: &mpsc::UnboundedSender<ServerMsg>) -> bool {
        self.connections
            .remove_if(name, |_, current| current.tx.same_channel(tx))
            .is_some()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Outbox for ConnectionHub {
    fn broadcast(&self, msg: &ServerMsg, exclude: Option<&str>) {
        for entry in self.connections.iter() {
            if exclude == Some(entry.key().as_str()) {
                continue;
            }
            // A closed receiver means the socket is going away; its cleanup
            // unbinds it.
            let _ = entry.value().tx.send(msg.clone());
        }
    }

    fn send_to(&self, name: &str, msg: &ServerMsg) {
        if let Some(route) = self.connections.get(name) {
            let _ = route.tx.send(msg.clone());
        }
    }

    fn evict(&self, name: &str) {
        if let Some((_, route)) = self.connections.remove(name) {
            debug!(name = %name, "Evicted connection");
            route.closed.cancel();
        }
    }
}

/// Outbox that records every message, for tests
#[cfg(test)]
#[derive(Default)]
pub struct RecordingOutbox {
    sent: parking_lot::Mutex<Vec<Delivery>>,
}

#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Broadcast {
        msg: ServerMsg,
        exclude: Option<String>,
    },
    Direct {
        to: String,
        msg: ServerMsg,
    },
    Evicted(String),
}

#[cfg(test)]
impl RecordingOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.sent.lock().clone()
    }

    /// Every message regardless of destination
    pub fn messages(&self) -> Vec<ServerMsg> {
        self.sent
            .lock()
            .iter()
            .filter_map(|d| match d {
                Delivery::Broadcast { msg, .. } | Delivery::Direct { msg, .. } => Some(msg.clone()),
                Delivery::Evicted(_) => None,
            })
            .collect()
    }

    /// Messages sent directly to `name`
    pub fn sent_to(&self, name: &str) -> Vec<ServerMsg> {
        self.sent
            .lock()
            .iter()
            .filter_map(|d| match d {
                Delivery::Direct { to, msg } if to == name => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn evicted(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|d| match d {
                Delivery::Evicted(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[cfg(test)]
impl Outbox for RecordingOutbox {
    fn broadcast(&self, msg: &ServerMsg, exclude: Option<&str>) {
        self.sent.lock().push(Delivery::Broadcast {
            msg: msg.clone(),
            exclude: exclude.map(str::to_string),
        });
    }

    fn send_to(&self, name: &str, msg: &ServerMsg) {
        self.sent.lock().push(Delivery::Direct {
            to: name.to_string(),
            msg: msg.clone(),
        });
    }

    fn evict(&self, name: &str) {
        self.sent.lock().push(Delivery::Evicted(name.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_skips_excluded_player() {
        let hub = ConnectionHub::new();
        let (a_tx, mut a_rx) = mpsc::unbounded_channel();
        let (b_tx, mut b_rx) = mpsc::unbounded_channel();
        hub.bind("a", a_tx, CancellationToken::new());
        hub.bind("b", b_tx, CancellationToken::new());

        let msg = ServerMsg::RemovePlayer {
            name: "c".to_string(),
        };
        hub.broadcast(&msg, Some("a"));

        assert!(a_rx.try_recv().is_err());
        assert_eq!(b_rx.try_recv().unwrap(), msg);
    }

    #[test]
    fn stale_socket_cannot_unbind_newer_one() {
        let hub = ConnectionHub::new();
        let (old_tx, _old_rx) = mpsc::unbounded_channel();
        let (new_tx, mut new_rx) = mpsc::unbounded_channel();
        let old_closed = CancellationToken::new();
        hub.bind("a", old_tx.clone(), old_closed.clone());
        hub.bind("a", new_tx, CancellationToken::new());

        assert!(old_closed.is_cancelled());
        assert!(!hub.unbind("a", &old_tx));
        assert_eq!(hub.connection_count(), 1);

        let msg = ServerMsg::AmmoUpdate {
            ammo: 3,
            max_ammo: 30,
        };
        hub.send_to("a", &msg);
        assert_eq!(new_rx.try_recv().unwrap(), msg);
    }

    #[test]
    fn evicted_player_gets_queued_messages_then_no_route() {
        let hub = ConnectionHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();
        hub.bind("a", tx.clone(), closed.clone());

        let kicked = ServerMsg::error("KICKED", "Kicked by mod");
        hub.send_to("a", &kicked);
        hub.evict("a");

        assert!(closed.is_cancelled());
        assert_eq!(hub.connection_count(), 0);
        assert!(!hub.unbind("a", &tx));

        hub.broadcast(
            &ServerMsg::RemovePlayer {
                name: "a".to_string(),
            },
            None,
        );
        assert_eq!(rx.try_recv().unwrap(), kicked);
        assert!(rx.try_recv().is_err());
    }
}
