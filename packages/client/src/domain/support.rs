//! Support desk resources consumed over REST.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Ticket status ladder: Open → In Progress → Resolved → Closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TicketStatus {
    #[serde(rename = "Open", alias = "open")]
    Open,
    #[serde(rename = "In Progress", alias = "in_progress")]
    InProgress,
    #[serde(rename = "Resolved", alias = "resolved")]
    Resolved,
    #[serde(rename = "Closed", alias = "closed")]
    Closed,
}

impl TicketStatus {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::InProgress => "In Progress",
            Self::Resolved => "Resolved",
            Self::Closed => "Closed",
        }
    }

    /// The following step on the ladder, `None` once closed.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Open => Some(Self::InProgress),
            Self::InProgress => Some(Self::Resolved),
            Self::Resolved => Some(Self::Closed),
            Self::Closed => None,
        }
    }

    /// Tickets only move forward.
    pub fn can_transition_to(&self, target: TicketStatus) -> bool {
        target > *self
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], " ").as_str() {
            "open" => Ok(Self::Open),
            "in progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            other => Err(format!("unknown ticket status '{}'", other)),
        }
    }
}
