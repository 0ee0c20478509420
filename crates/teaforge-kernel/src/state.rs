//! [`PlatformState`] – everything the platform core owns between cycles.
//!
//! The state is moved into every interpreter call and moved back out, so
//! there is exactly one owner at any time and no interior sharing to guard.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use teaforge_hal::Hardware;
use teaforge_net::{NetworkRuntime, PortForward};
use teaforge_types::{CanId, PhoenixStatus};
use tracing::{info, warn};

use crate::registry::{ResourceToken, TokenRegistry};
use crate::token::{OrchestraToken, WebSocketToken};

/// Bounds and locations the interpreter works with.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformSettings {
    /// How long a CAN liveness probe may wait for a status frame.
    pub can_probe_timeout: Duration,
    pub websocket_connect_timeout: Duration,
    pub websocket_close_timeout: Duration,
    /// Scratch directory for song files.
    pub song_dir: PathBuf,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            can_probe_timeout: Duration::from_millis(100),
            websocket_connect_timeout: Duration::from_millis(2000),
            websocket_close_timeout: Duration::from_millis(500),
            song_dir: std::env::temp_dir().join("teaforge-songs"),
        }
    }
}

/// Aggregate platform state: hardware backend, network runtime, live tokens,
/// playing songs and forwarded ports.
pub struct PlatformState {
    pub(crate) hardware: Arc<dyn Hardware>,
    pub(crate) network: NetworkRuntime,
    pub(crate) settings: PlatformSettings,
    pub(crate) registry: TokenRegistry,
    pub(crate) playing: HashSet<CanId>,
    pub(crate) forwards: HashMap<u16, PortForward>,
}

impl PlatformState {
    pub fn new(
        hardware: Arc<dyn Hardware>,
        network: NetworkRuntime,
        settings: PlatformSettings,
    ) -> Self {
        Self {
            hardware,
            network,
            settings,
            registry: TokenRegistry::new(),
            playing: HashSet::new(),
            forwards: HashMap::new(),
        }
    }

    pub fn hardware(&self) -> &Arc<dyn Hardware> {
        &self.hardware
    }

    pub fn network(&self) -> &NetworkRuntime {
        &self.network
    }

    pub fn settings(&self) -> &PlatformSettings {
        &self.settings
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    /// `true` while a song plays on `motor`.
    pub fn is_playing(&self, motor: CanId) -> bool {
        self.playing.contains(&motor)
    }

    /// Local ports currently forwarded, ascending.
    pub fn forwarded_ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.forwards.keys().copied().collect();
        ports.sort_unstable();
        ports
    }

    /// Tear down every externally visible resource: stop and close song
    /// sessions, delete their files, close websocket sessions and stop port
    /// forwards. Hardware handles are simply dropped.
    pub fn shutdown(mut self) {
        let tokens: Vec<ResourceToken> = self.registry.drain().collect();
        for token in tokens {
            match token {
                ResourceToken::Orchestra(session) => {
                    end_song_session(&session, self.playing.remove(&session.motor()));
                }
                ResourceToken::WebSocket(socket) => {
                    close_websocket(&socket, self.settings.websocket_close_timeout);
                }
                _ => {}
            }
        }
        let forwarded = self.forwards.len();
        self.forwards.clear();
        info!(forwarded, "platform state shut down");
    }
}

/// Stop (when playing) and close `session`, then delete its song file.
/// Returns the stop status when playback had to be stopped.
pub(crate) fn end_song_session(session: &OrchestraToken, playing: bool) -> Option<PhoenixStatus> {
    let orchestra = session.orchestra();
    let status = playing.then(|| orchestra.stop());
    orchestra.close();
    if let Err(e) = std::fs::remove_file(session.song_path()) {
        warn!(path = %session.song_path().display(), error = %e, "could not delete song file");
    }
    status
}

/// Close the session behind `socket` if nobody closed it yet.
pub(crate) fn close_websocket(socket: &WebSocketToken, timeout: Duration) {
    if let Some(session) = socket.take() {
        if let Err(e) = session.close(timeout) {
            warn!(url = socket.url(), error = %e, "websocket did not close cleanly");
        }
    }
}

impl fmt::Debug for PlatformState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformState")
            .field("settings", &self.settings)
            .field("registry", &self.registry)
            .field("playing", &self.playing)
            .field("forwards", &self.forwarded_ports())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teaforge_hal::SimHardware;

    #[test]
    fn default_settings() {
        let settings = PlatformSettings::default();
        assert_eq!(settings.can_probe_timeout, Duration::from_millis(100));
        assert!(settings.song_dir.ends_with("teaforge-songs"));
    }

    #[test]
    fn fresh_state_is_empty() {
        let state = PlatformState::new(
            Arc::new(SimHardware::new()),
            NetworkRuntime::new(1).unwrap(),
            PlatformSettings::default(),
        );
        assert!(state.registry().is_empty());
        assert!(!state.is_playing(1));
        assert!(state.forwarded_ports().is_empty());
        state.shutdown();
    }
}
