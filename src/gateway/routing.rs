//! Routing configuration for the virtual interface.
//!
//! A [`RoutingConfiguration`] is the immutable parameter set handed to the
//! platform to (re)establish the interface. It is recomputed in full from
//! every block-set snapshot, never patched incrementally.

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

use crate::store::BlockSet;
use crate::types::AppId;

/// Interface parameters fixed regardless of the block set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceParams {
    /// Session label shown by the platform for the interface.
    #[serde(default = "default_session")]
    pub session: String,

    /// MTU (Maximum Transmission Unit).
    #[serde(default = "default_mtu")]
    pub mtu: u16,

    /// Point-to-point IPv4 address assigned to the interface.
    #[serde(default = "default_address")]
    pub address: Ipv4Addr,

    /// Prefix length for the address. /32: the interface owns exactly
    /// its own address.
    #[serde(default = "default_prefix")]
    pub prefix: u8,

    /// DNS server hint for captured traffic. Cosmetic: captured traffic
    /// is dropped regardless of where its DNS queries would have gone.
    #[serde(default)]
    pub dns: Option<IpAddr>,

    /// Identity of the application hosting the gateway. Excluded from
    /// every computed allow-list so the gateway can never capture (and
    /// thus block) itself.
    #[serde(default = "default_own_app")]
    pub own_app: AppId,
}

fn default_session() -> String {
    "appwall".to_string()
}

fn default_mtu() -> u16 {
    crate::INTERFACE_MTU
}

fn default_address() -> Ipv4Addr {
    crate::INTERFACE_ADDRESS.parse().expect("valid address literal")
}

fn default_prefix() -> u8 {
    32
}

fn default_own_app() -> AppId {
    AppId::from("io.appwall.gateway")
}

impl Default for InterfaceParams {
    fn default() -> Self {
        Self {
            session: default_session(),
            mtu: default_mtu(),
            address: default_address(),
            prefix: default_prefix(),
            dns: None,
            own_app: default_own_app(),
        }
    }
}

/// Immutable routing configuration for one interface establishment.
///
/// The `allowed` list holds the applications whose traffic the interface
/// captures. Everything else bypasses the interface entirely. The interface
/// advertises a catch-all default route but performs no forwarding, so
/// captured traffic dead-ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingConfiguration {
    /// Session label.
    pub session: String,
    /// Interface MTU.
    pub mtu: u16,
    /// Point-to-point address.
    pub address: Ipv4Addr,
    /// Prefix length.
    pub prefix: u8,
    /// DNS hint for captured traffic.
    pub dns: Option<IpAddr>,
    /// Capture allow-list, sorted and deduplicated.
    allowed: Vec<AppId>,
}

/// The catch-all route advertised by the interface.
pub const DEFAULT_ROUTE: (Ipv4Addr, u8) = (Ipv4Addr::UNSPECIFIED, 0);

impl RoutingConfiguration {
    /// Compute the configuration for a block-set snapshot.
    ///
    /// Pure and deterministic: blank identities and the gateway-owning
    /// application are discarded, the remainder is deduplicated and
    /// sorted. The same snapshot always yields the same allow-list.
    pub fn compute(params: &InterfaceParams, snapshot: &BlockSet) -> Self {
        let mut allowed: Vec<AppId> = snapshot
            .iter()
            .filter(|id| !id.is_blank() && **id != params.own_app)
            .cloned()
            .collect();

        // The snapshot is already a set, but dedup defensively in case a
        // caller built it from a raw sequence.
        allowed.sort_unstable();
        allowed.dedup();

        Self {
            session: params.session.clone(),
            mtu: params.mtu,
            address: params.address,
            prefix: params.prefix,
            dns: params.dns,
            allowed,
        }
    }

    /// Applications whose traffic the interface captures.
    pub fn allow_list(&self) -> &[AppId] {
        &self.allowed
    }

    /// Whether traffic from the given application would be captured.
    pub fn captures(&self, id: &AppId) -> bool {
        self.allowed.binary_search(id).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> InterfaceParams {
        InterfaceParams::default()
    }

    fn snapshot(ids: &[&str]) -> BlockSet {
        ids.iter().map(|s| AppId::from(*s)).collect()
    }

    #[test]
    fn test_empty_snapshot_empty_allow_list() {
        let config = RoutingConfiguration::compute(&params(), &BlockSet::new());
        assert!(config.allow_list().is_empty());
        assert_eq!(config.mtu, 1500);
        assert_eq!(config.address, "10.0.0.2".parse::<Ipv4Addr>().unwrap());
        assert_eq!(config.prefix, 32);
    }

    #[test]
    fn test_own_app_excluded() {
        let params = params();
        let snap = snapshot(&["com.example.a", "io.appwall.gateway"]);
        let config = RoutingConfiguration::compute(&params, &snap);

        assert_eq!(config.allow_list(), &[AppId::from("com.example.a")]);
        assert!(!config.captures(&params.own_app));
    }

    #[test]
    fn test_deterministic_recomputation() {
        let params = params();
        let snap = snapshot(&["com.b", "com.a", "com.c"]);

        let first = RoutingConfiguration::compute(&params, &snap);
        let second = RoutingConfiguration::compute(&params, &snap);
        assert_eq!(first, second);
        assert_eq!(
            first.allow_list(),
            &[AppId::from("com.a"), AppId::from("com.b"), AppId::from("com.c")]
        );
    }

    #[test]
    fn test_captures_lookup() {
        let config = RoutingConfiguration::compute(&params(), &snapshot(&["com.a", "com.b"]));
        assert!(config.captures(&AppId::from("com.a")));
        assert!(!config.captures(&AppId::from("com.z")));
    }

    #[test]
    fn test_default_route_is_catch_all() {
        assert_eq!(DEFAULT_ROUTE, (Ipv4Addr::UNSPECIFIED, 0));
    }
}
