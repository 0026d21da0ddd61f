//! State classifier: backend state strings to UI severities.
//!
//! The executor reports entity states as free text. Every entity kind has a
//! fixed lookup table (see [`crate::entity`] and [`crate::network`]) whose
//! default arm maps anything unknown to [`Severity::Warning`]. Classification
//! is total: it never panics and never yields "no answer".

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::{AnvilState, HostState, ServerState};
use crate::network::InterfaceState;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// UI-facing classification of a raw entity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Warning,
    Error,
    Off,
}

impl Severity {
    /// Severity assigned to any state string missing from a lookup table.
    pub const UNRECOGNIZED: Severity = Severity::Warning;

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implemented by every typed entity state.
pub trait Classify {
    fn severity(&self) -> Severity;
}

/// Which lookup table to classify a raw state against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Anvil,
    Host,
    Server,
    NetworkInterface,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anvil => "anvil",
            Self::Host => "host",
            Self::Server => "server",
            Self::NetworkInterface => "network_interface",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a raw backend state string for the given entity kind.
pub fn classify(kind: EntityKind, raw: &str) -> Severity {
    match kind {
        EntityKind::Anvil => AnvilState::from_raw(raw).severity(),
        EntityKind::Host => HostState::from_raw(raw).severity(),
        EntityKind::Server => ServerState::from_raw(raw).severity(),
        EntityKind::NetworkInterface => InterfaceState::from_raw(raw).severity(),
    }
}

// ---------------------------------------------------------------------------
// Colour
// ---------------------------------------------------------------------------

/// A display colour as a `#rrggbb` hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Colour(&'static str);

impl Colour {
    pub const GREEN: Colour = Colour("#00ff00");
    pub const AMBER: Colour = Colour("#ffcc00");
    pub const RED: Colour = Colour("#ff3333");
    pub const GREY: Colour = Colour("#888888");

    pub fn hex(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

pub fn colour_for(severity: Severity) -> Colour {
    match severity {
        Severity::Ok => Colour::GREEN,
        Severity::Warning => Colour::AMBER,
        Severity::Error => Colour::RED,
        Severity::Off => Colour::GREY,
    }
}

// ---------------------------------------------------------------------------
// Time-to-completion estimates
// ---------------------------------------------------------------------------

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 3600;

/// Coarse remaining-time estimate for display.
///
/// [`Remaining::Unknown`] is deliberately distinct from `Seconds(0)`, which
/// [`estimate_remaining`] never produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    Unknown,
    Hours(u64),
    Minutes(u64),
    Seconds(u64),
}

/// Convert an ETA in seconds into the largest non-zero unit.
///
/// `None` and `Some(0)` both mean the executor has no estimate.
pub fn estimate_remaining(eta_secs: Option<u64>) -> Remaining {
    match eta_secs {
        None | Some(0) => Remaining::Unknown,
        Some(secs) if secs >= SECS_PER_HOUR => Remaining::Hours(secs / SECS_PER_HOUR),
        Some(secs) if secs >= SECS_PER_MINUTE => Remaining::Minutes(secs / SECS_PER_MINUTE),
        Some(secs) => Remaining::Seconds(secs),
    }
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (n, unit) = match *self {
            Self::Unknown => return f.write_str("No estimate available"),
            Self::Hours(n) => (n, "hour"),
            Self::Minutes(n) => (n, "minute"),
            Self::Seconds(n) => (n, "second"),
        };
        let plural = if n == 1 { "" } else { "s" };
        write!(f, "About {n} {unit}{plural} remaining")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
