//! Connectivity observation and coarse link-speed classification.
//!
//! The platform layer feeds OS connectivity change events into `report`;
//! each event recomputes the process-wide `NetworkQuality`. Consumers hold
//! a watch receiver and react to transitions (the drain scheduler fires on
//! offline -> online). On targets with no OS monitor the default
//! construction is permanently online and fast.

use parley_schema::{LinkSpeed, LinkType, NetworkQuality};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CellularGeneration {
    G5,
    G4,
    G3,
    G2,
    Unknown,
}

/// One OS-level connectivity change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectivityEvent {
    pub link: LinkType,
    pub online: bool,
    /// Only meaningful for cellular links.
    pub generation: Option<CellularGeneration>,
}

impl ConnectivityEvent {
    pub fn wifi() -> Self {
        Self {
            link: LinkType::Wifi,
            online: true,
            generation: None,
        }
    }

    pub fn cellular(generation: CellularGeneration) -> Self {
        Self {
            link: LinkType::Cellular,
            online: true,
            generation: Some(generation),
        }
    }

    pub fn offline() -> Self {
        Self {
            link: LinkType::Unknown,
            online: false,
            generation: None,
        }
    }
}

/// wifi -> fast; cellular 5g/4g -> fast, 3g -> medium, else -> slow;
/// unknown link -> medium.
fn classify(event: &ConnectivityEvent) -> LinkSpeed {
    match event.link {
        LinkType::Wifi => LinkSpeed::Fast,
        LinkType::Cellular => match event.generation {
            Some(CellularGeneration::G5) | Some(CellularGeneration::G4) => LinkSpeed::Fast,
            Some(CellularGeneration::G3) => LinkSpeed::Medium,
            _ => LinkSpeed::Slow,
        },
        LinkType::Unknown => LinkSpeed::Medium,
    }
}

pub struct NetworkMonitor {
    tx: watch::Sender<NetworkQuality>,
    fixed_online: bool,
}

impl NetworkMonitor {
    /// Monitor backed by OS connectivity events, starting online/fast
    /// until the first event arrives.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(NetworkQuality::always_online());
        Self {
            tx,
            fixed_online: false,
        }
    }

    /// No monitor exists on the web target; it is online permanently and
    /// `report` calls are ignored.
    pub fn always_online() -> Self {
        let mut monitor = Self::new();
        monitor.fixed_online = true;
        monitor
    }

    pub fn current(&self) -> NetworkQuality {
        *self.tx.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.current().online
    }

    pub fn subscribe(&self) -> watch::Receiver<NetworkQuality> {
        self.tx.subscribe()
    }

    /// Ingest a connectivity change event and recompute quality.
    /// Returns the new state.
    pub fn report(&self, event: ConnectivityEvent) -> NetworkQuality {
        if self.fixed_online {
            return self.current();
        }
        let quality = NetworkQuality {
            link: event.link,
            speed: classify(&event),
            online: event.online,
        };
        let previous = self.tx.send_replace(quality);
        if previous.online != quality.online {
            tracing::info!(
                online = quality.online,
                speed = quality.speed.as_str(),
                "connectivity changed"
            );
        }
        quality
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}
