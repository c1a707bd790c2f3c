//! Session Bootstrap
//!
//! Connection form handling and session start. Settings are validated
//! before anything starts; on failure the form stays editable and shows
//! why.

use std::net::{IpAddr, SocketAddr};

use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ArenaConfig, StartMode};
use crate::game::state::ClientId;
use crate::network::session::{Participant, SessionContext, SessionError};
use crate::network::transport::LocalNetwork;
use crate::presentation::{SharedPresenter, TracingPresenter};

pub const STATUS_INVALID_IP: &str = "Invalid IP";
pub const STATUS_INVALID_PORT: &str = "Invalid Port";
pub const STATUS_STARTING_HOST: &str = "Starting Host";
pub const STATUS_STARTING_CLIENT: &str = "StartingClient";
pub const STATUS_WAITING_ON_HOST: &str = "Waiting on Host";
pub const STATUS_CONNECTION_FAILED: &str = "Failed to connect to server";

/// Bootstrap errors.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("invalid port '{0}'")]
    InvalidPort(String),

    #[error("session start failed: {0}")]
    Session(#[from] SessionError),
}

impl BootstrapError {
    /// Status line shown for this error.
    pub fn status_text(&self) -> &'static str {
        match self {
            BootstrapError::InvalidAddress(_) => STATUS_INVALID_IP,
            BootstrapError::InvalidPort(_) => STATUS_INVALID_PORT,
            BootstrapError::Session(_) => STATUS_CONNECTION_FAILED,
        }
    }
}

/// Parse an IP address (v4 or v6) and a 16-bit port.
pub fn validate_settings(address: &str, port: &str) -> Result<SocketAddr, BootstrapError> {
    let ip: IpAddr = address
        .parse()
        .map_err(|_| BootstrapError::InvalidAddress(address.to_string()))?;
    let port: u16 = port
        .trim()
        .parse()
        .map_err(|_| BootstrapError::InvalidPort(port.to_string()))?;
    Ok(SocketAddr::new(ip, port))
}

/// State of the connection form.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionForm {
    pub address: String,
    pub port: String,
    /// Host/Client buttons and inputs are usable
    pub controls_enabled: bool,
    pub status: String,
}

/// Pre-session UI state and the entry points that start a session.
pub struct Bootstrap {
    config: ArenaConfig,
    presenter: SharedPresenter,
    form: ConnectionForm,
    start_mode: StartMode,
    local_client: Option<ClientId>,
}

impl Bootstrap {
    /// Show the configured connection data. Controls are hidden unless the
    /// start mode leaves the choice to the user.
    pub fn new(config: ArenaConfig, presenter: SharedPresenter) -> Self {
        let start_mode = config.net.start_mode;
        let form = ConnectionForm {
            address: config.net.address.clone(),
            port: config.net.port.to_string(),
            controls_enabled: start_mode == StartMode::Choose,
            status: String::new(),
        };
        Self {
            config,
            presenter,
            form,
            start_mode,
            local_client: None,
        }
    }

    pub fn form(&self) -> &ConnectionForm {
        &self.form
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn set_address(&mut self, address: impl Into<String>) {
        if self.form.controls_enabled {
            self.form.address = address.into();
        }
    }

    pub fn set_port(&mut self, port: impl Into<String>) {
        if self.form.controls_enabled {
            self.form.port = port.into();
        }
    }

    /// Fill the address from a picked local interface.
    pub fn choose_address(&mut self, ip: IpAddr) {
        self.set_address(ip.to_string());
    }

    fn set_status(&mut self, text: &str) {
        self.form.status = text.to_string();
        self.presenter.set_status_text(text);
    }

    /// Validate the form. On success the controls lock and the settings
    /// become the session's connection data.
    pub fn validate_settings(&mut self) -> Result<SocketAddr, BootstrapError> {
        match validate_settings(&self.form.address, &self.form.port) {
            Ok(addr) => {
                self.config.net.address = addr.ip().to_string();
                self.config.net.port = addr.port();
                self.form.controls_enabled = false;
                Ok(addr)
            }
            Err(e) => {
                warn!("connection settings rejected: {}", e);
                self.set_status(e.status_text());
                Err(e)
            }
        }
    }

    /// Start as host and load `scene`.
    pub fn start_as_host(&mut self, scene: &str) -> Result<LocalNetwork, BootstrapError> {
        self.start_host_with_status(scene, STATUS_STARTING_HOST)
    }

    fn start_host_with_status(&mut self, scene: &str, status: &str) -> Result<LocalNetwork, BootstrapError> {
        let addr = self.validate_settings()?;
        self.set_status(status);

        let context = SessionContext::host(self.config.clone(), scene);
        let host = Participant::host(context, self.presenter.clone());
        self.presenter.load_scene(scene);

        info!(%addr, scene, "started as host");
        Ok(LocalNetwork::new(host))
    }

    /// Start as a client of the host on `network`.
    pub fn start_as_client(&mut self, network: &mut LocalNetwork) -> Result<ClientId, BootstrapError> {
        let addr = self.validate_settings()?;
        self.set_status(STATUS_STARTING_CLIENT);

        let link = match network.open_link() {
            Ok(link) => link,
            Err(e) => {
                self.on_client_disconnected(0);
                return Err(e.into());
            }
        };
        let context = SessionContext::client(self.config.clone(), link.client_id());
        let client = Participant::client(context, link, self.presenter.clone())?;
        let id = network.join(client);

        self.set_status(STATUS_WAITING_ON_HOST);
        self.local_client = Some(id);
        info!(%addr, client = id, "started as client");
        Ok(id)
    }

    /// Connection dropped: show the failure and unlock the form.
    pub fn on_client_disconnected(&mut self, client_id: ClientId) {
        info!(client = client_id, "disconnected, restoring connection form");
        self.set_status(STATUS_CONNECTION_FAILED);
        self.form.controls_enabled = true;
    }

    /// Apply the configured start mode once.
    ///
    /// `host` starts a host session with the configured scene. `client`
    /// joins a headless in-process host running the configured scene.
    /// `choose` starts nothing and waits for the user.
    pub fn debug_start(&mut self) -> Result<Option<LocalNetwork>, BootstrapError> {
        let mode = std::mem::replace(&mut self.start_mode, StartMode::Choose);
        match mode {
            StartMode::Host => {
                let scene = self.config.net.start_scene.clone();
                let status = format!("Starting as {} with scene {}", mode, scene);
                self.start_host_with_status(&scene, &status).map(Some)
            }
            StartMode::Client => {
                self.validate_settings()?;
                let context = SessionContext::host(self.config.clone(), self.config.net.start_scene.clone());
                let host = Participant::host(context, TracingPresenter::shared("host"));
                let mut network = LocalNetwork::new(host);
                self.start_as_client(&mut network)?;
                Ok(Some(network))
            }
            StartMode::Choose => Ok(None),
        }
    }

    /// Client id of the session started by `start_as_client`, if any.
    pub fn local_client(&self) -> Option<ClientId> {
        self.local_client
    }

    /// Start mode not yet consumed by `debug_start`.
    pub fn start_mode(&self) -> StartMode {
        self.start_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::RecordingPresenter;
    use proptest::prelude::*;
    use std::net::Ipv4Addr;

    fn bootstrap(mode: StartMode) -> (Bootstrap, std::sync::Arc<RecordingPresenter>) {
        let mut config = ArenaConfig::default();
        config.net.start_mode = mode;
        config.seed = Some(3);
        let presenter = RecordingPresenter::new();
        (Bootstrap::new(config, presenter.clone()), presenter)
    }

    #[test]
    fn test_validate_accepts_v4_and_v6() {
        assert!(validate_settings("127.0.0.1", "7777").is_ok());
        assert!(validate_settings("::1", "0").is_ok());
        assert!(validate_settings("192.168.1.20", " 65535 ").is_ok());
    }

    #[test]
    fn test_invalid_ip_keeps_controls() {
        let (mut boot, presenter) = bootstrap(StartMode::Choose);
        boot.set_address("300.1.1.1");

        let err = boot.start_as_host("Lobby").err().unwrap();
        assert!(matches!(err, BootstrapError::InvalidAddress(_)));
        assert_eq!(boot.form().status, STATUS_INVALID_IP);
        assert!(boot.form().controls_enabled);
        assert!(presenter.scenes().is_empty());
    }

    #[test]
    fn test_invalid_port_keeps_controls() {
        let (mut boot, _) = bootstrap(StartMode::Choose);
        boot.set_port("65536");

        let err = boot.validate_settings().err().unwrap();
        assert!(matches!(err, BootstrapError::InvalidPort(_)));
        assert_eq!(boot.form().status, STATUS_INVALID_PORT);
        assert!(boot.form().controls_enabled);
    }

    #[test]
    fn test_start_as_host_locks_form_and_loads_scene() {
        let (mut boot, presenter) = bootstrap(StartMode::Choose);
        boot.choose_address(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)));

        let network = boot.start_as_host("Lobby").unwrap();
        assert!(!boot.form().controls_enabled);
        assert_eq!(boot.form().status, STATUS_STARTING_HOST);
        assert_eq!(presenter.scenes(), vec!["Lobby".to_string()]);
        assert_eq!(boot.config().net.address, "10.0.0.2");
        assert!(network.host().local_entity().is_some());
    }

    #[test]
    fn test_start_as_client_waits_on_host() {
        let (mut host_boot, _) = bootstrap(StartMode::Choose);
        let mut network = host_boot.start_as_host("Lobby").unwrap();

        let (mut boot, presenter) = bootstrap(StartMode::Choose);
        let id = boot.start_as_client(&mut network).unwrap();
        assert_eq!(boot.form().status, STATUS_WAITING_ON_HOST);
        assert_eq!(
            presenter.calls()[0],
            crate::presentation::PresenterCall::Status(STATUS_STARTING_CLIENT.to_string())
        );

        network.step().unwrap();
        assert!(network.client(id).unwrap().is_connected());
    }

    #[test]
    fn test_disconnect_restores_form() {
        let (mut boot, _) = bootstrap(StartMode::Choose);
        boot.validate_settings().unwrap();
        assert!(!boot.form().controls_enabled);

        boot.on_client_disconnected(4);
        assert!(boot.form().controls_enabled);
        assert_eq!(boot.form().status, STATUS_CONNECTION_FAILED);
    }

    #[test]
    fn test_debug_start_host_runs_once() {
        let (mut boot, presenter) = bootstrap(StartMode::Host);
        assert!(!boot.form().controls_enabled);

        let network = boot.debug_start().unwrap();
        assert!(network.is_some());
        assert_eq!(boot.form().status, "Starting as HOST with scene Lobby");
        assert_eq!(presenter.scenes(), vec!["Lobby".to_string()]);

        assert_eq!(boot.start_mode(), StartMode::Choose);
        assert!(boot.debug_start().unwrap().is_none());
    }

    #[test]
    fn test_debug_start_client_joins_host() {
        let (mut boot, presenter) = bootstrap(StartMode::Client);

        let mut network = boot.debug_start().unwrap().unwrap();
        let id = boot.local_client().unwrap();
        assert_eq!(boot.form().status, STATUS_WAITING_ON_HOST);
        assert!(presenter.scenes().is_empty());

        network.step().unwrap();
        let client = network.client(id).unwrap();
        assert!(client.is_connected());
        assert!(client.local_entity().is_some());
        assert_eq!(presenter.scenes(), vec!["Lobby".to_string()]);
        assert_eq!(boot.start_mode(), StartMode::Choose);
    }

    #[test]
    fn test_debug_start_choose_starts_nothing() {
        let (mut boot, _) = bootstrap(StartMode::Choose);
        assert!(boot.debug_start().unwrap().is_none());
        assert_eq!(boot.local_client(), None);
        assert!(boot.form().controls_enabled);
    }

    proptest! {
        #[test]
        fn prop_valid_settings_lock_controls(a: u8, b: u8, c: u8, d: u8, port: u16) {
            let (mut boot, _) = bootstrap(StartMode::Choose);
            boot.set_address(format!("{}.{}.{}.{}", a, b, c, d));
            boot.set_port(port.to_string());

            let addr = boot.validate_settings().unwrap();
            prop_assert_eq!(addr.port(), port);
            prop_assert!(!boot.form().controls_enabled);
        }

        #[test]
        fn prop_out_of_range_port_rejected(port in 65536u32..1_000_000) {
            let (mut boot, _) = bootstrap(StartMode::Choose);
            boot.set_port(port.to_string());

            prop_assert!(boot.validate_settings().is_err());
            prop_assert!(boot.form().controls_enabled);
            prop_assert_eq!(boot.form().status.as_str(), STATUS_INVALID_PORT);
        }
    }
}
