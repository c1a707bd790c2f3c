//! Session Management
//!
//! A [`Participant`] is one process in a session: either the host, which
//! owns the authoritative arena and services remote calls, or a client,
//! which mirrors it and forwards intent. Both run the same tick.
//!
//! The session context is explicit and owned by the participant; there is
//! no process-wide session singleton.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::DEFAULT_SCORE;
use crate::config::ArenaConfig;
use crate::core::hash::StateHash;
use crate::core::rng::derive_session_seed;
use crate::core::vec3::Vec3;
use crate::game::authority::{Authority, ProcessRole};
use crate::game::combat::spawn_pickups;
use crate::game::events::{RemoteCall, Replication, TickEvent, TickQueue};
use crate::game::movement::InputSample;
use crate::game::state::{ArenaState, ClientId, EntityId, EntityState, HOST_CLIENT_ID};
use crate::game::tick::{apply_remote_call, tick};
use crate::game::timer::{RoundState, RoundTransition};
use crate::network::bootstrap::STATUS_CONNECTION_FAILED;
use crate::network::protocol::{ClientMessage, HostMessage, PROTOCOL_VERSION};
use crate::network::transport::{ClientLink, HostLink, TransportError};
use crate::presentation::SharedPresenter;
use crate::replication::ObserverToken;

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connection to host lost")]
    ConnectionLost,

    #[error("session is not connected")]
    NotConnected,

    #[error("operation requires the host role")]
    NotHost,

    #[error("no locally controlled entity")]
    NoLocalEntity,

    #[error("client {0} is already connected")]
    AlreadyConnected(ClientId),

    #[error("unknown client {0}")]
    UnknownClient(ClientId),

    #[error("transport: {0}")]
    Transport(#[from] TransportError),
}

// =============================================================================
// SESSION CONTEXT
// =============================================================================

/// Identity and configuration of one participant's session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Session id (nil on a client until the host welcomes it)
    pub id: Uuid,
    pub role: ProcessRole,
    pub local_client: ClientId,
    /// Scene the host is running
    pub scene: String,
    pub config: ArenaConfig,
}

impl SessionContext {
    /// New host session with a fresh id.
    pub fn host(config: ArenaConfig, scene: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: ProcessRole::Host,
            local_client: HOST_CLIENT_ID,
            scene: scene.into(),
            config,
        }
    }

    /// Client session for the link assigned `local_client`.
    pub fn client(config: ArenaConfig, local_client: ClientId) -> Self {
        Self {
            id: Uuid::nil(),
            role: ProcessRole::Client,
            local_client,
            scene: String::new(),
            config,
        }
    }

    /// Arena RNG seed for this session.
    pub fn seed(&self) -> u64 {
        derive_session_seed(self.id.as_bytes(), self.config.seed)
    }
}

// =============================================================================
// PARTICIPANT
// =============================================================================

enum Links {
    Host { clients: BTreeMap<ClientId, HostLink> },
    Client { link: Option<ClientLink> },
}

/// Observer registrations held for one entity.
#[derive(Debug, Clone, Copy)]
struct EntityWatch {
    color: ObserverToken,
    score: ObserverToken,
}

/// Summary of one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    pub tick: u64,
    pub transition: Option<RoundTransition>,
    /// Replication records sent (host) or applied (client)
    pub replications: usize,
    /// Remote calls issued this step
    pub calls: usize,
}

/// One process in a session.
pub struct Participant {
    context: SessionContext,
    authority: Authority,
    state: ArenaState,
    round: RoundState,
    queue: TickQueue,
    links: Links,
    presenter: SharedPresenter,
    watches: BTreeMap<EntityId, EntityWatch>,
    /// Calls queued for the next step
    deferred: Vec<RemoteCall>,
    tick: u64,
    connected: bool,
    closed: bool,
}

impl Participant {
    /// Start a host session. The host is also a player and gets an entity
    /// straight away; boost pickups are placed before anyone joins.
    pub fn host(context: SessionContext, presenter: SharedPresenter) -> Self {
        let authority = Authority::new(ProcessRole::Host, context.local_client);
        let state = ArenaState::new(context.seed(), context.config.round.round_seconds);

        let mut host = Self {
            context,
            authority,
            state,
            round: RoundState::new(),
            queue: TickQueue::new(),
            links: Links::Host {
                clients: BTreeMap::new(),
            },
            presenter,
            watches: BTreeMap::new(),
            deferred: Vec::new(),
            tick: 0,
            connected: true,
            closed: false,
        };

        spawn_pickups(&host.authority, &mut host.state, &host.context.config.combat);
        if let Some(id) = host.spawn_for(HOST_CLIENT_ID) {
            host.on_entity_ready(id);
        }

        info!(
            session = %host.context.id,
            scene = %host.context.scene,
            pickups = host.state.pickups.len(),
            "host session started"
        );
        host
    }

    /// Start a client session on `link`. Sends the protocol hello.
    pub fn client(
        context: SessionContext,
        link: ClientLink,
        presenter: SharedPresenter,
    ) -> Result<Self, SessionError> {
        link.send(&ClientMessage::Hello {
            protocol_version: PROTOCOL_VERSION,
        })?;

        let authority = Authority::new(ProcessRole::Client, context.local_client);
        let state = ArenaState::new(0, context.config.round.round_seconds);

        Ok(Self {
            context,
            authority,
            state,
            round: RoundState::new(),
            queue: TickQueue::new(),
            links: Links::Client { link: Some(link) },
            presenter,
            watches: BTreeMap::new(),
            deferred: Vec::new(),
            tick: 0,
            connected: false,
            closed: false,
        })
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn state(&self) -> &ArenaState {
        &self.state
    }

    pub fn round(&self) -> &RoundState {
        &self.round
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Host: always. Client: once welcomed and until the link drops.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Torn down; further steps do nothing useful.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Entity this participant controls.
    pub fn local_entity(&self) -> Option<EntityId> {
        self.state.entity_of(self.context.local_client)
    }

    /// Digest of the replicated state as this participant sees it.
    pub fn digest(&self) -> StateHash {
        self.state.replicated_digest()
    }

    /// Number of observer registrations currently held.
    pub fn watched_entities(&self) -> usize {
        self.watches.len()
    }

    /// Connected client ids (host only).
    pub fn connected_clients(&self) -> Vec<ClientId> {
        match &self.links {
            Links::Host { clients } => clients.keys().copied().collect(),
            Links::Client { .. } => Vec::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Producers
    // -------------------------------------------------------------------------

    /// Queue controller input for the local entity.
    pub fn push_input(&mut self, sample: InputSample) -> Result<(), SessionError> {
        let entity = self.local_entity().ok_or(SessionError::NoLocalEntity)?;
        self.queue.push(TickEvent::Input { entity, sample });
        Ok(())
    }

    /// Queue an external physics event. Only the host will resolve it.
    pub fn push_physics_event(&mut self, event: TickEvent) {
        self.queue.push(event);
    }

    // -------------------------------------------------------------------------
    // Host
    // -------------------------------------------------------------------------

    /// Accept a new client link (host only).
    ///
    /// Welcomes the client, replays the current arena to it, then spawns its
    /// entity and announces that to everyone.
    pub fn accept(&mut self, link: HostLink) -> Result<EntityId, SessionError> {
        if !self.authority.is_host() {
            return Err(SessionError::NotHost);
        }
        let client_id = link.client_id();
        if self.state.entity_of(client_id).is_some() || client_id == HOST_CLIENT_ID {
            return Err(SessionError::AlreadyConnected(client_id));
        }

        link.send(&HostMessage::Welcome {
            client_id,
            session_id: *self.context.id.as_bytes(),
            scene: self.context.scene.clone(),
            protocol_version: PROTOCOL_VERSION,
        })?;
        for entity in self.state.entities.values() {
            link.send(&HostMessage::Replicate(Replication::EntitySpawned(entity.snapshot())))?;
        }
        for projectile in self.state.projectiles.values() {
            link.send(&HostMessage::Replicate(Replication::ProjectileSpawned(projectile.clone())))?;
        }
        for pickup in self.state.pickups.values() {
            link.send(&HostMessage::Replicate(Replication::PickupSpawned(pickup.clone())))?;
        }

        if let Links::Host { clients } = &mut self.links {
            clients.insert(client_id, link);
        }

        let id = self
            .spawn_for(client_id)
            .ok_or(SessionError::AlreadyConnected(client_id))?;
        if let Some(entity) = self.state.entity(id) {
            self.broadcast(&[Replication::EntitySpawned(entity.snapshot())]);
        }
        self.on_entity_ready(id);

        info!(client = client_id, entity = id.0, "client connected");
        Ok(id)
    }

    /// A client went away (host only): despawn its entity.
    pub fn on_client_disconnected(&mut self, client_id: ClientId) -> Result<(), SessionError> {
        if !self.authority.is_host() {
            return Err(SessionError::NotHost);
        }
        let out = self.drop_client(client_id);
        if out.is_empty() {
            return Err(SessionError::UnknownClient(client_id));
        }
        self.broadcast(&out);
        Ok(())
    }

    fn spawn_for(&mut self, owner: ClientId) -> Option<EntityId> {
        let combat = &self.context.config.combat;
        let position = if owner == HOST_CLIENT_ID {
            Vec3::ZERO
        } else {
            self.state
                .rng
                .random_ground_point(Vec3::ZERO, combat.spawn_min_radius, combat.spawn_max_radius)
        };
        self.authority
            .spawn_entity(&mut self.state, owner, position, combat.initial_damage_tier)
            .map(|snapshot| snapshot.id)
    }

    fn drop_client(&mut self, client_id: ClientId) -> Vec<Replication> {
        let had_link = match &mut self.links {
            Links::Host { clients } => clients.remove(&client_id).is_some(),
            Links::Client { .. } => false,
        };

        let mut out = Vec::new();
        if let Some(entity) = self.state.entity_of(client_id) {
            self.on_entity_removed(entity);
            if self.authority.despawn_entity(&mut self.state, entity).is_some() {
                out.push(Replication::EntityDespawned(entity));
            }
        }

        if had_link || !out.is_empty() {
            info!(client = client_id, "client disconnected");
        }
        out
    }

    /// Send replication records to every client.
    fn broadcast(&self, replications: &[Replication]) {
        let Links::Host { clients } = &self.links else {
            return;
        };
        for replication in replications {
            let message = HostMessage::Replicate(replication.clone());
            for (id, link) in clients {
                if let Err(e) = link.send(&message) {
                    // Dead links are reaped on the next poll
                    trace!(client = id, "send failed: {}", e);
                }
            }
        }
    }

    fn service_clients(&mut self, fanout: &mut Vec<Replication>) {
        let mut inbound = Vec::new();
        let mut departed = Vec::new();

        if let Links::Host { clients } = &mut self.links {
            for (id, link) in clients.iter_mut() {
                let inbox = link.poll();
                inbound.extend(inbox.messages.into_iter().map(|m| (*id, m)));
                if inbox.closed {
                    departed.push(*id);
                }
            }
        }

        for (caller, message) in inbound {
            match message {
                ClientMessage::Hello { protocol_version } => {
                    if protocol_version != PROTOCOL_VERSION {
                        warn!(client = caller, protocol_version, "protocol mismatch, dropping client");
                        departed.push(caller);
                    }
                }
                ClientMessage::Call(call) => {
                    if departed.contains(&caller) {
                        continue;
                    }
                    fanout.extend(apply_remote_call(
                        &self.authority,
                        &mut self.state,
                        caller,
                        &call,
                        &self.context.config,
                    ));
                }
                ClientMessage::Goodbye => departed.push(caller),
            }
        }

        departed.sort_unstable();
        departed.dedup();
        for client_id in departed {
            fanout.extend(self.drop_client(client_id));
        }
    }

    // -------------------------------------------------------------------------
    // Client
    // -------------------------------------------------------------------------

    fn receive_from_host(&mut self) -> Result<usize, SessionError> {
        let inbox = match &mut self.links {
            Links::Client { link: Some(link) } => link.poll(),
            Links::Client { link: None } => return Err(SessionError::NotConnected),
            Links::Host { .. } => return Ok(0),
        };

        let mut applied = 0;
        let mut closed = inbox.closed;
        for message in inbox.messages {
            match message {
                HostMessage::Welcome {
                    client_id,
                    session_id,
                    scene,
                    protocol_version,
                } => {
                    if client_id != self.context.local_client || protocol_version != PROTOCOL_VERSION {
                        warn!(client_id, protocol_version, "unexpected welcome");
                    }
                    self.context.id = Uuid::from_bytes(session_id);
                    self.context.scene = scene;
                    self.connected = true;
                    self.presenter.load_scene(&self.context.scene);
                    info!(session = %self.context.id, client = client_id, "joined session");
                }
                HostMessage::Replicate(replication) => {
                    self.apply_replication(replication);
                    applied += 1;
                }
                HostMessage::Shutdown => closed = true,
            }
        }

        if closed {
            self.on_connection_lost();
            return Err(SessionError::ConnectionLost);
        }
        Ok(applied)
    }

    fn apply_replication(&mut self, replication: Replication) {
        match replication {
            Replication::Field(update) => {
                self.authority.apply_update(&mut self.state, &update);
            }
            Replication::EntitySpawned(snapshot) => {
                if self.state.entity(snapshot.id).is_some() {
                    trace!(entity = snapshot.id.0, "duplicate spawn");
                    return;
                }
                let entity = EntityState::from_snapshot(&snapshot, self.state.round_seconds());
                self.state.insert_entity(entity);
                self.on_entity_ready(snapshot.id);
            }
            Replication::EntityDespawned(id) => {
                self.on_entity_removed(id);
                self.state.remove_entity(id);
            }
            Replication::ProjectileSpawned(projectile) => {
                self.state.projectiles.insert(projectile.id, projectile);
            }
            Replication::ProjectileDestroyed(id) => {
                self.state.projectiles.remove(&id);
            }
            Replication::PickupSpawned(pickup) => {
                self.state.pickups.insert(pickup.id, pickup);
            }
            Replication::PickupRemoved(id) => {
                if let Some(pickup) = self.state.pickups.get_mut(&id) {
                    pickup.consume();
                }
            }
        }
    }

    /// The link to the host dropped: tear down and restore the bootstrap
    /// status. Committed state is discarded, never rolled back.
    pub fn on_connection_lost(&mut self) {
        warn!(client = self.context.local_client, "connection to host lost");
        if let Links::Client { link } = &mut self.links {
            *link = None;
        }
        self.teardown();
        self.presenter.set_status_text(STATUS_CONNECTION_FAILED);
    }

    // -------------------------------------------------------------------------
    // Entity readiness
    // -------------------------------------------------------------------------

    /// Local view of an entity is ready: hook presentation to its replicated
    /// values and queue the deferred score confirmation.
    fn on_entity_ready(&mut self, id: EntityId) {
        let Some(entity) = self.state.entity_mut(id) else {
            return;
        };

        let presenter = Arc::clone(&self.presenter);
        let color = entity
            .color
            .observe(move |_, current| presenter.apply_color(id, *current));
        let presenter = Arc::clone(&self.presenter);
        let score = entity
            .score
            .observe(move |_, current| presenter.display_score(id, *current));

        self.presenter.apply_color(id, *entity.color.get());
        self.presenter.display_score(id, *entity.score.get());

        // Only re-assert while the score is still at its spawn value, so a
        // late joiner never resets a score that has already moved.
        if entity.score.seq() == 0 {
            self.deferred.push(RemoteCall::RequestSetScore {
                entity: id,
                value: DEFAULT_SCORE,
            });
        }

        self.watches.insert(id, EntityWatch { color, score });
    }

    fn on_entity_removed(&mut self, id: EntityId) {
        let Some(watch) = self.watches.remove(&id) else {
            return;
        };
        if let Some(entity) = self.state.entity_mut(id) {
            entity.color.unobserve(watch.color);
            entity.score.unobserve(watch.score);
        }
        self.deferred.retain(|call| call.entity() != id);
    }

    fn teardown(&mut self) {
        let ids: Vec<EntityId> = self.watches.keys().copied().collect();
        for id in ids {
            self.on_entity_removed(id);
        }
        self.state.clear();
        self.queue.drain();
        self.deferred.clear();
        self.connected = false;
        self.closed = true;
    }

    /// Leave the session. The host tells every client it is going away.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        match &mut self.links {
            Links::Host { clients } => {
                for link in clients.values() {
                    let _ = link.send(&HostMessage::Shutdown);
                }
                clients.clear();
            }
            Links::Client { link } => {
                if let Some(link) = link.take() {
                    let _ = link.send(&ClientMessage::Goodbye);
                }
            }
        }
        self.teardown();
        info!(session = %self.context.id, "session shut down");
    }

    // -------------------------------------------------------------------------
    // Step
    // -------------------------------------------------------------------------

    fn dispatch_calls(
        &mut self,
        calls: Vec<RemoteCall>,
        fanout: &mut Vec<Replication>,
    ) -> Result<(), SessionError> {
        if self.authority.is_host() {
            for call in &calls {
                fanout.extend(apply_remote_call(
                    &self.authority,
                    &mut self.state,
                    self.context.local_client,
                    call,
                    &self.context.config,
                ));
            }
            return Ok(());
        }

        let sent = match &self.links {
            Links::Client { link: Some(link) } => calls
                .into_iter()
                .try_for_each(|call| link.send(&ClientMessage::Call(call))),
            _ => return Err(SessionError::NotConnected),
        };
        if let Err(e) = sent {
            debug!("call not sent: {}", e);
            self.on_connection_lost();
            return Err(SessionError::ConnectionLost);
        }
        Ok(())
    }

    /// Run one tick: drain the network, send deferred calls, simulate,
    /// dispatch this tick's calls, fan out, present.
    pub fn step(&mut self) -> Result<StepReport, SessionError> {
        if self.closed {
            return Err(SessionError::NotConnected);
        }

        let deferred = std::mem::take(&mut self.deferred);
        let mut fanout = Vec::new();
        let mut report = StepReport::default();

        if self.authority.is_host() {
            self.service_clients(&mut fanout);
        } else {
            report.replications = self.receive_from_host()?;
        }

        report.calls = deferred.len();
        self.dispatch_calls(deferred, &mut fanout)?;

        let events = self.queue.drain();
        let result = tick(
            &self.authority,
            &mut self.state,
            &mut self.round,
            events,
            &self.context.config,
        );
        fanout.extend(result.replications);

        report.calls += result.calls.len();
        self.dispatch_calls(result.calls, &mut fanout)?;

        if self.authority.is_host() {
            report.replications = fanout.len();
            self.broadcast(&fanout);
        }

        if let Some(text) = &result.timer_text {
            self.presenter.display_timer(text);
        }
        match result.transition {
            Some(RoundTransition::Paused) => {
                info!(tick = self.tick, "local timer expired, pausing");
                self.presenter.pause_game();
            }
            Some(RoundTransition::RoundOver) => {
                info!(tick = self.tick, "score depleted, round over");
                self.presenter.load_scene(&self.context.config.round.game_over_scene);
                self.presenter.pause_game();
            }
            None => {}
        }

        #[cfg(feature = "debug-tracing")]
        debug!(
            tick = self.tick,
            digest = %crate::core::hash::short_hex(&self.digest()),
            "step complete"
        );

        report.tick = self.tick;
        report.transition = result.transition;
        self.tick += 1;
        Ok(report)
    }
}

impl std::fmt::Debug for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("session", &self.context.id)
            .field("role", &self.context.role)
            .field("local_client", &self.context.local_client)
            .field("tick", &self.tick)
            .field("entities", &self.state.entities.len())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
