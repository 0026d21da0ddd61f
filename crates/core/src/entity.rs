//! Anvil, host and server state models.
//!
//! Each entity kind has a closed set of known states plus an
//! `Unrecognized` arm that keeps the raw string. Parsing is infallible so a
//! new backend state never breaks deserialization of an inventory snapshot.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::classify::{Classify, Severity};

// ---------------------------------------------------------------------------
// Anvil
// ---------------------------------------------------------------------------

/// State of an anvil (a two-node cluster pair).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AnvilState {
    Optimal,
    NotReady,
    Degraded,
    Unrecognized(String),
}

impl AnvilState {
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "optimal" => Self::Optimal,
            "not_ready" => Self::NotReady,
            "degraded" => Self::Degraded,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Optimal => "optimal",
            Self::NotReady => "not_ready",
            Self::Degraded => "degraded",
            Self::Unrecognized(raw) => raw,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Optimal => "Optimal",
            Self::NotReady => "Not Ready",
            Self::Degraded => "Degraded",
            Self::Unrecognized(raw) => raw,
        }
    }
}

impl Classify for AnvilState {
    fn severity(&self) -> Severity {
        match self {
            Self::Optimal => Severity::Ok,
            Self::NotReady => Severity::Warning,
            Self::Degraded => Severity::Error,
            Self::Unrecognized(_) => Severity::UNRECOGNIZED,
        }
    }
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// State of a host (one cluster member).
///
/// `Booting` and `ShuttingDown` are transitional and usually arrive with a
/// `statePercent`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HostState {
    Online,
    Offline,
    Booting,
    ShuttingDown,
    Unrecognized(String),
}

impl HostState {
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "online" => Self::Online,
            "offline" => Self::Offline,
            "booting" => Self::Booting,
            "shutting_down" => Self::ShuttingDown,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Booting => "booting",
            Self::ShuttingDown => "shutting_down",
            Self::Unrecognized(raw) => raw,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Online => "Online",
            Self::Offline => "Offline",
            Self::Booting => "Booting",
            Self::ShuttingDown => "Shutting Down",
            Self::Unrecognized(raw) => raw,
        }
    }

    pub fn is_transitional(&self) -> bool {
        matches!(self, Self::Booting | Self::ShuttingDown)
    }
}

impl Classify for HostState {
    fn severity(&self) -> Severity {
        match self {
            Self::Online => Severity::Ok,
            Self::Offline => Severity::Off,
            Self::Booting | Self::ShuttingDown => Severity::Warning,
            Self::Unrecognized(_) => Severity::UNRECOGNIZED,
        }
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// State of a server (virtual machine), as reported by the hypervisor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ServerState {
    Running,
    Idle,
    Paused,
    InShutdown,
    ShutOff,
    Crashed,
    PmSuspended,
    Migrating,
    Provisioning,
    Unrecognized(String),
}

impl ServerState {
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "running" => Self::Running,
            "idle" => Self::Idle,
            "paused" => Self::Paused,
            "in shutdown" => Self::InShutdown,
            "shut off" => Self::ShutOff,
            "crashed" => Self::Crashed,
            "pmsuspended" => Self::PmSuspended,
            "migrating" => Self::Migrating,
            "provisioning" => Self::Provisioning,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Running => "running",
            Self::Idle => "idle",
            Self::Paused => "paused",
            Self::InShutdown => "in shutdown",
            Self::ShutOff => "shut off",
            Self::Crashed => "crashed",
            Self::PmSuspended => "pmsuspended",
            Self::Migrating => "migrating",
            Self::Provisioning => "provisioning",
            Self::Unrecognized(raw) => raw,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Running => "Running",
            Self::Idle => "Idle",
            Self::Paused => "Paused",
            Self::InShutdown => "Shutting Down",
            Self::ShutOff => "Off",
            Self::Crashed => "Crashed",
            Self::PmSuspended => "PM Suspended",
            Self::Migrating => "Migrating",
            Self::Provisioning => "Provisioning",
            Self::Unrecognized(raw) => raw,
        }
    }

    pub fn is_transitional(&self) -> bool {
        matches!(
            self,
            Self::InShutdown | Self::Migrating | Self::Provisioning
        )
    }
}

impl Classify for ServerState {
    fn severity(&self) -> Severity {
        match self {
            Self::Running | Self::Idle => Severity::Ok,
            Self::ShutOff => Severity::Off,
            Self::Crashed => Severity::Error,
            Self::Paused
            | Self::InShutdown
            | Self::PmSuspended
            | Self::Migrating
            | Self::Provisioning => Severity::Warning,
            Self::Unrecognized(_) => Severity::UNRECOGNIZED,
        }
    }
}

// -- string conversions (serde) ----------------------------------------------

impl From<String> for AnvilState {
    fn from(raw: String) -> Self {
        Self::from_raw(&raw)
    }
}

impl From<AnvilState> for String {
    fn from(state: AnvilState) -> Self {
        state.as_str().to_string()
    }
}

impl From<String> for HostState {
    fn from(raw: String) -> Self {
        Self::from_raw(&raw)
    }
}

impl From<HostState> for String {
    fn from(state: HostState) -> Self {
        state.as_str().to_string()
    }
}

impl From<String> for ServerState {
    fn from(raw: String) -> Self {
        Self::from_raw(&raw)
    }
}

impl From<ServerState> for String {
    fn from(state: ServerState) -> Self {
        state.as_str().to_string()
    }
}

// ---------------------------------------------------------------------------
// Entity overviews
// ---------------------------------------------------------------------------

/// A state plus the optional progress fields sent while it is transitional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityStatus<S> {
    pub state: S,
    /// Clamped to 0-100 and rounded. Values that are not numbers read as `None`.
    #[serde(default, deserialize_with = "lenient_percent")]
    pub state_percent: Option<u8>,
    #[serde(default)]
    pub state_message: Option<String>,
}

impl<S: Classify> EntityStatus<S> {
    pub fn severity(&self) -> Severity {
        self.state.severity()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPercent {
    Number(f64),
    Text(String),
    Other(serde::de::IgnoredAny),
}

fn lenient_percent<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<RawPercent>::deserialize(deserializer)?;
    let value = match raw {
        Some(RawPercent::Number(n)) => n,
        Some(RawPercent::Text(text)) => match text.trim().parse::<f64>() {
            Ok(n) => n,
            Err(_) => return Ok(None),
        },
        Some(RawPercent::Other(_)) | None => return Ok(None),
    };
    if !value.is_finite() {
        return Ok(None);
    }
    Ok(Some(value.clamp(0.0, 100.0).round() as u8))
}

/// Row of `GET /anvil`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnvilOverview {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub status: EntityStatus<AnvilState>,
}

/// Row of `GET /host`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostOverview {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub anvil_uuid: Option<String>,
    #[serde(flatten)]
    pub status: EntityStatus<HostState>,
}

/// Row of `GET /server`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerOverview {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub anvil_uuid: Option<String>,
    #[serde(default)]
    pub anvil_name: Option<String>,
    #[serde(default)]
    pub host_uuid: Option<String>,
    #[serde(flatten)]
    pub status: EntityStatus<ServerState>,
}

// ---------------------------------------------------------------------------
// Inventory reconciliation
// ---------------------------------------------------------------------------

/// The latest anvil, host and server snapshots joined by uuid.
///
/// Each list comes from its own poll, so the views can disagree about which
/// entities exist. Rows are keyed by uuid (later rows replace earlier ones)
/// and membership is resolved through each row's own `anvil_uuid`.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    anvils: HashMap<String, AnvilOverview>,
    hosts: HashMap<String, HostOverview>,
    servers: HashMap<String, ServerOverview>,
}

/// One anvil with the hosts and servers that currently claim membership.
#[derive(Debug, Clone)]
pub struct AnvilView<'a> {
    pub anvil: &'a AnvilOverview,
    pub hosts: Vec<&'a HostOverview>,
    pub servers: Vec<&'a ServerOverview>,
}

impl Inventory {
    pub fn from_snapshots(
        anvils: &[AnvilOverview],
        hosts: &[HostOverview],
        servers: &[ServerOverview],
    ) -> Self {
        Self {
            anvils: by_uuid(anvils, |a| &a.uuid),
            hosts: by_uuid(hosts, |h| &h.uuid),
            servers: by_uuid(servers, |s| &s.uuid),
        }
    }

    pub fn anvil_count(&self) -> usize {
        self.anvils.len()
    }

    /// Every anvil in the snapshot, ordered by name.
    pub fn anvils(&self) -> Vec<AnvilView<'_>> {
        let mut views: Vec<_> = self
            .anvils
            .keys()
            .filter_map(|uuid| self.anvil(uuid))
            .collect();
        views.sort_by(|a, b| a.anvil.name.cmp(&b.anvil.name));
        views
    }

    pub fn anvil(&self, uuid: &str) -> Option<AnvilView<'_>> {
        let anvil = self.anvils.get(uuid)?;
        let mut hosts: Vec<_> = self
            .hosts
            .values()
            .filter(|h| h.anvil_uuid.as_deref() == Some(uuid))
            .collect();
        hosts.sort_by(|a, b| a.name.cmp(&b.name));
        let mut servers: Vec<_> = self
            .servers
            .values()
            .filter(|s| s.anvil_uuid.as_deref() == Some(uuid))
            .collect();
        servers.sort_by(|a, b| a.name.cmp(&b.name));
        Some(AnvilView {
            anvil,
            hosts,
            servers,
        })
    }

    /// Servers whose anvil is not (or no longer) in the anvil snapshot.
    pub fn orphaned_servers(&self) -> Vec<&ServerOverview> {
        self.servers
            .values()
            .filter(|s| match &s.anvil_uuid {
                Some(uuid) => !self.anvils.contains_key(uuid),
                None => true,
            })
            .collect()
    }
}

impl AnvilView<'_> {
    /// Worst severity across the anvil and its members.
    ///
    /// `Error` outranks `Warning`, which outranks `Off`, which outranks `Ok`.
    pub fn rollup(&self) -> Severity {
        std::iter::once(self.anvil.status.severity())
            .chain(self.hosts.iter().map(|h| h.status.severity()))
            .chain(self.servers.iter().map(|s| s.status.severity()))
            .max_by_key(|s| severity_rank(*s))
            .unwrap_or(Severity::Ok)
    }
}

fn severity_rank(severity: Severity) -> u8 {
    match severity {
        Severity::Ok => 0,
        Severity::Off => 1,
        Severity::Warning => 2,
        Severity::Error => 3,
    }
}

fn by_uuid<T: Clone>(rows: &[T], key: impl Fn(&T) -> &String) -> HashMap<String, T> {
    rows.iter().map(|row| (key(row).clone(), row.clone())).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
