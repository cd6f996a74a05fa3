//! Gateway controller - bridges user intent to the interception gateway.
//!
//! The controller requests interception authorization from the hosting
//! environment, starts and stops the gateway, and exposes its running
//! state for presentation. The block-list subscription is wired into the
//! gateway at construction and lives for the gateway's lifetime.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::gateway::{check_privileges, InterceptionGateway, InterfaceParams, Platform};
use crate::store::BlockListStore;
use crate::types::GatewayState;

/// Outcome of an authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Granted,
    Denied,
}

/// Asynchronous interception-authorization seam.
///
/// On the original host platform this is a consent dialog; here it is
/// whatever check the hosting environment requires before traffic may be
/// intercepted.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Request authorization. May involve out-of-band user interaction.
    async fn request_authorization(&self) -> Result<Authorization>;
}

/// Grants authorization to privileged processes (root / CAP_NET_ADMIN).
pub struct PrivilegeAuthorizer;

#[async_trait]
impl Authorizer for PrivilegeAuthorizer {
    async fn request_authorization(&self) -> Result<Authorization> {
        if check_privileges()? {
            Ok(Authorization::Granted)
        } else {
            Ok(Authorization::Denied)
        }
    }
}

/// Always grants. For tests and simulation.
pub struct StaticAuthorizer(pub Authorization);

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn request_authorization(&self) -> Result<Authorization> {
        Ok(self.0)
    }
}

/// Orchestration glue between the presentation layer, the block-list
/// store, and the interception gateway.
pub struct GatewayController {
    gateway: InterceptionGateway,
    store: Arc<BlockListStore>,
    authorizer: Arc<dyn Authorizer>,
}

impl GatewayController {
    /// Build the controller and spawn the gateway worker, subscribed to
    /// the store's change notifications.
    pub fn new(
        params: InterfaceParams,
        store: Arc<BlockListStore>,
        platform: Arc<dyn Platform>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        let gateway = InterceptionGateway::spawn(params, store.subscribe(), platform);
        Self {
            gateway,
            store,
            authorizer,
        }
    }

    /// Request authorization and start the gateway.
    ///
    /// On denial the gateway stays `Stopped` and
    /// [`Error::AuthorizationDenied`] is returned.
    pub async fn request_start(&self) -> Result<()> {
        match self.authorizer.request_authorization().await? {
            Authorization::Granted => {
                info!("Interception authorization granted");
                self.gateway.start().await
            }
            Authorization::Denied => {
                warn!("Interception authorization denied");
                Err(Error::AuthorizationDenied)
            }
        }
    }

    /// Stop the gateway. Idempotent.
    pub async fn request_stop(&self) {
        self.gateway.stop().await;
    }

    /// Forward an out-of-band authorization revocation.
    pub async fn on_revoked(&self) {
        self.gateway.on_revoked().await;
    }

    /// Whether the gateway is currently `Active`.
    pub fn is_running(&self) -> bool {
        self.gateway.is_active()
    }

    /// Current gateway state, for presentation.
    pub fn state(&self) -> GatewayState {
        self.gateway.state()
    }

    /// Number of applications currently selected for blocking.
    pub fn blocked_count(&self) -> usize {
        self.store.blocked_count()
    }

    /// The underlying gateway handle.
    pub fn gateway(&self) -> &InterceptionGateway {
        &self.gateway
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockPlatform;
    use crate::store::MemoryBackend;
    use crate::types::AppId;

    fn controller(auth: Authorization) -> (GatewayController, Arc<MockPlatform>) {
        let store = Arc::new(
            BlockListStore::open(
                Box::new(MemoryBackend::default()),
                AppId::from("io.appwall.gateway"),
            )
            .unwrap(),
        );
        let platform = Arc::new(MockPlatform::new());
        let controller = GatewayController::new(
            InterfaceParams::default(),
            store,
            Arc::clone(&platform) as Arc<dyn Platform>,
            Arc::new(StaticAuthorizer(auth)),
        );
        (controller, platform)
    }

    #[tokio::test]
    async fn test_start_with_grant() {
        let (controller, platform) = controller(Authorization::Granted);
        controller.request_start().await.unwrap();
        assert!(controller.is_running());
        assert_eq!(platform.establish_count(), 1);

        controller.request_stop().await;
        assert!(!controller.is_running());
    }

    #[tokio::test]
    async fn test_denial_leaves_gateway_stopped() {
        let (controller, platform) = controller(Authorization::Denied);
        let err = controller.request_start().await.unwrap_err();
        assert!(matches!(err, Error::AuthorizationDenied));
        assert_eq!(controller.state(), GatewayState::Stopped);
        assert_eq!(platform.establish_count(), 0);
    }

    #[tokio::test]
    async fn test_revocation_via_controller() {
        let (controller, _platform) = controller(Authorization::Granted);
        controller.request_start().await.unwrap();
        controller.on_revoked().await;
        assert_eq!(controller.state(), GatewayState::Stopped);
    }
}
