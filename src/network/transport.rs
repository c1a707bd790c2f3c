//! Loopback Transport
//!
//! In-process links between the host and its clients. Each direction is a
//! tokio unbounded channel of encoded frames, so delivery is FIFO per link
//! and senders never block. Receivers drain their link once per tick.
//!
//! [`LocalNetwork`] wires one host and any number of clients together and
//! steps them in lockstep.

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::config::ArenaConfig;
use crate::core::hash::StateHash;
use crate::game::state::{ClientId, HOST_CLIENT_ID};
use crate::network::protocol::{ClientMessage, HostMessage, ProtocolError};
use crate::network::session::{Participant, SessionContext, SessionError};
use crate::presentation::SharedPresenter;

/// Encoded message.
pub type Frame = Vec<u8>;

/// Link failure.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("link closed")]
    Closed,

    #[error("encode failed: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Everything drained from a link in one poll.
#[derive(Debug)]
pub struct Inbox<M> {
    pub messages: Vec<M>,
    /// The other side has gone away
    pub closed: bool,
}

fn drain_frames<M>(
    rx: &mut UnboundedReceiver<Frame>,
    decode: impl Fn(&[u8]) -> Result<M, ProtocolError>,
) -> Inbox<M> {
    let mut inbox = Inbox {
        messages: Vec::new(),
        closed: false,
    };
    loop {
        match rx.try_recv() {
            Ok(frame) => match decode(&frame) {
                Ok(message) => inbox.messages.push(message),
                Err(e) => warn!(len = frame.len(), "dropping undecodable frame: {}", e),
            },
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => {
                inbox.closed = true;
                break;
            }
        }
    }
    inbox
}

// =============================================================================
// LINKS
// =============================================================================

/// Host end of a client link.
#[derive(Debug)]
pub struct HostLink {
    client_id: ClientId,
    to_client: UnboundedSender<Frame>,
    from_client: UnboundedReceiver<Frame>,
}

impl HostLink {
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn send(&self, message: &HostMessage) -> Result<(), TransportError> {
        let frame = message.to_bytes()?;
        self.to_client.send(frame).map_err(|_| TransportError::Closed)
    }

    /// Drain everything the client has sent.
    pub fn poll(&mut self) -> Inbox<ClientMessage> {
        drain_frames(&mut self.from_client, ClientMessage::from_bytes)
    }
}

/// Client end of the link to the host.
#[derive(Debug)]
pub struct ClientLink {
    client_id: ClientId,
    to_host: UnboundedSender<Frame>,
    from_host: UnboundedReceiver<Frame>,
}

impl ClientLink {
    /// Client id the host assigned to this link.
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn send(&self, message: &ClientMessage) -> Result<(), TransportError> {
        let frame = message.to_bytes()?;
        self.to_host.send(frame).map_err(|_| TransportError::Closed)
    }

    /// Drain everything the host has sent.
    pub fn poll(&mut self) -> Inbox<HostMessage> {
        drain_frames(&mut self.from_host, HostMessage::from_bytes)
    }
}

/// Create both ends of a link for `client_id`.
pub fn link_pair(client_id: ClientId) -> (HostLink, ClientLink) {
    let (to_client, from_host) = mpsc::unbounded_channel();
    let (to_host, from_client) = mpsc::unbounded_channel();
    (
        HostLink {
            client_id,
            to_client,
            from_client,
        },
        ClientLink {
            client_id,
            to_host,
            from_host,
        },
    )
}

// =============================================================================
// LOCAL NETWORK
// =============================================================================

/// One host plus in-process clients.
pub struct LocalNetwork {
    host: Participant,
    clients: BTreeMap<ClientId, Participant>,
    next_client_id: ClientId,
}

impl LocalNetwork {
    pub fn new(host: Participant) -> Self {
        Self {
            host,
            clients: BTreeMap::new(),
            next_client_id: HOST_CLIENT_ID + 1,
        }
    }

    /// Open a link to the host. The host accepts it immediately.
    pub fn open_link(&mut self) -> Result<ClientLink, SessionError> {
        let client_id = self.next_client_id;
        self.next_client_id += 1;

        let (host_end, client_end) = link_pair(client_id);
        self.host.accept(host_end)?;
        Ok(client_end)
    }

    /// Add a client participant to the stepping set.
    pub fn join(&mut self, client: Participant) -> ClientId {
        let id = client.context().local_client;
        self.clients.insert(id, client);
        id
    }

    /// Open a link and start a client on it.
    pub fn connect_client(
        &mut self,
        config: ArenaConfig,
        presenter: SharedPresenter,
    ) -> Result<ClientId, SessionError> {
        let link = self.open_link()?;
        let context = SessionContext::client(config, link.client_id());
        let client = Participant::client(context, link, presenter)?;
        Ok(self.join(client))
    }

    /// Step the host, then every client.
    ///
    /// Client failures are logged; the failing client stays in the set so
    /// its torn-down state can be inspected.
    pub fn step(&mut self) -> Result<(), SessionError> {
        self.host.step()?;
        for (id, client) in self.clients.iter_mut() {
            if client.is_closed() {
                continue;
            }
            if let Err(e) = client.step() {
                debug!(client = id, "client step failed: {}", e);
            }
        }
        Ok(())
    }

    /// Step `n` times.
    pub fn step_n(&mut self, n: usize) -> Result<(), SessionError> {
        for _ in 0..n {
            self.step()?;
        }
        Ok(())
    }

    /// Drive the network on a fixed-rate interval.
    ///
    /// `drive` runs before each step to feed input. Stops after `ticks`
    /// steps (when non-zero) or once the host's round is over.
    pub async fn run<F>(&mut self, ticks: u64, tick_rate: u32, mut drive: F) -> Result<u64, SessionError>
    where
        F: FnMut(&mut Self, u64),
    {
        let period = Duration::from_secs_f64(1.0 / f64::from(tick_rate.max(1)));
        let mut interval = tokio::time::interval(period);
        let mut count = 0u64;

        loop {
            interval.tick().await;
            drive(self, count);
            self.step()?;
            count += 1;

            if ticks > 0 && count >= ticks {
                break;
            }
            if !self.host.round().is_active() {
                info!(tick = count, phase = ?self.host.round().phase(), "host round ended");
                break;
            }
        }

        Ok(count)
    }

    /// Drop a client. The host notices on its next step.
    pub fn disconnect(&mut self, client_id: ClientId) -> Option<Participant> {
        let mut client = self.clients.remove(&client_id)?;
        client.shutdown();
        Some(client)
    }

    /// Shut the host down; clients notice on their next step.
    pub fn shutdown_host(&mut self) {
        self.host.shutdown();
    }

    pub fn host(&self) -> &Participant {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut Participant {
        &mut self.host
    }

    pub fn client(&self, id: ClientId) -> Option<&Participant> {
        self.clients.get(&id)
    }

    pub fn client_mut(&mut self, id: ClientId) -> Option<&mut Participant> {
        self.clients.get_mut(&id)
    }

    pub fn client_ids(&self) -> Vec<ClientId> {
        self.clients.keys().copied().collect()
    }

    /// Digests of the host and every connected client.
    pub fn digests(&self) -> Vec<(ClientId, StateHash)> {
        std::iter::once((HOST_CLIENT_ID, self.host.digest()))
            .chain(
                self.clients
                    .iter()
                    .filter(|(_, c)| c.is_connected())
                    .map(|(id, c)| (*id, c.digest())),
            )
            .collect()
    }

    /// Whether every connected participant holds the host's replicated state.
    pub fn is_converged(&self) -> bool {
        let host = self.host.digest();
        self.digests().iter().all(|(_, d)| *d == host)
    }
}
