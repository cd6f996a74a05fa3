//! Core types shared across the crate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque, platform-assigned identity of an installed application.
///
/// On the original host platform this is a reverse-DNS-style package name
/// (e.g. `com.example.app`), but no internal structure is ever interpreted:
/// the value is treated purely as a unique key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(String);

impl AppId {
    /// Create a new application identity.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Whether the identity is empty or whitespace-only.
    ///
    /// Blank identities are never accepted into a block set and are
    /// silently discarded by the routing filter.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// The raw identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for AppId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AppId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle state of the interception gateway.
///
/// Owned exclusively by the gateway's worker task; other tasks observe it
/// through a shared read handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayState {
    /// No virtual interface exists; no resources held.
    Stopped,
    /// Authorization requested, interface establishment in progress.
    Starting,
    /// Interface established, routing applied, change subscription live.
    Active,
    /// Teardown initiated; resources being released.
    Stopping,
}

impl GatewayState {
    /// Whether the gateway is logically running.
    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

impl fmt::Display for GatewayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Active => "active",
            Self::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_id_blank() {
        assert!(AppId::from("").is_blank());
        assert!(AppId::from("   ").is_blank());
        assert!(!AppId::from("com.example.app").is_blank());
    }

    #[test]
    fn test_app_id_ordering() {
        let mut ids = vec![AppId::from("b"), AppId::from("a"), AppId::from("c")];
        ids.sort();
        assert_eq!(
            ids,
            vec![AppId::from("a"), AppId::from("b"), AppId::from("c")]
        );
    }

    #[test]
    fn test_state_display() {
        assert_eq!(GatewayState::Active.to_string(), "active");
        assert_eq!(GatewayState::Stopped.to_string(), "stopped");
        assert!(GatewayState::Active.is_active());
        assert!(!GatewayState::Stopping.is_active());
    }

    #[test]
    fn test_app_id_serde() {
        let id = AppId::from("com.example.app");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"com.example.app\"");
        let back: AppId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
