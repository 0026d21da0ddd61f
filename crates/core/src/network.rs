//! Network interface model served by the legacy `/status/network.json`
//! snapshot.

use serde::{Deserialize, Serialize};

use crate::classify::{Classify, Severity};

/// Link state of a network interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InterfaceState {
    Up,
    Down,
    Unrecognized(String),
}

impl InterfaceState {
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "up" => Self::Up,
            "down" => Self::Down,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Unrecognized(raw) => raw,
        }
    }
}

impl Classify for InterfaceState {
    fn severity(&self) -> Severity {
        match self {
            Self::Up => Severity::Ok,
            Self::Down => Severity::Error,
            Self::Unrecognized(_) => Severity::UNRECOGNIZED,
        }
    }
}

impl From<String> for InterfaceState {
    fn from(raw: String) -> Self {
        Self::from_raw(&raw)
    }
}

impl From<InterfaceState> for String {
    fn from(state: InterfaceState) -> Self {
        state.as_str().to_string()
    }
}

/// One interface row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub mac: String,
    pub state: InterfaceState,
    /// Negotiated link speed in Mbps; absent while the link is down.
    #[serde(default)]
    pub speed: Option<u32>,
}

/// Body of `GET /status/network.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    #[serde(default)]
    pub interfaces: Vec<NetworkInterface>,
}

impl NetworkSnapshot {
    /// Interfaces that are not up, in snapshot order.
    pub fn degraded(&self) -> impl Iterator<Item = &NetworkInterface> {
        self.interfaces
            .iter()
            .filter(|iface| iface.state.severity() != Severity::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reports_interfaces_that_are_not_up() {
        let snapshot: NetworkSnapshot = serde_json::from_value(serde_json::json!({
            "interfaces": [
                { "uuid": "n1", "name": "bcn1_link1", "mac": "52:54:00:aa:bb:01", "state": "up", "speed": 10000 },
                { "uuid": "n2", "name": "ifn1_link1", "state": "down" },
                { "uuid": "n3", "name": "sn1_link1", "state": "lowerlayerdown" },
            ]
        }))
        .unwrap();

        let names: Vec<_> = snapshot.degraded().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["ifn1_link1", "sn1_link1"]);
        assert_eq!(snapshot.interfaces[1].state.severity(), Severity::Error);
        assert_eq!(snapshot.interfaces[2].state.severity(), Severity::Warning);
    }

    #[test]
    fn empty_body_is_an_empty_snapshot() {
        let snapshot: NetworkSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.interfaces.is_empty());
    }
}
