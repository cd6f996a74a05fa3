//! Interception gateway - state machine and worker loop.
//!
//! A single dedicated worker task owns the gateway state and the interface
//! handle. Every operation (start, stop, block-set rebuild, revocation) is
//! delivered to that task over a command channel, so no two of them ever
//! execute concurrently. Block-set changes arrive through a `watch`
//! receiver whose single slot holds only the newest snapshot: if several
//! notifications land while a rebuild is in flight, the intermediates are
//! legitimately skipped and only the latest is applied.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::platform::{InterfaceHandle, Platform};
use super::routing::{InterfaceParams, RoutingConfiguration};
use crate::error::{Error, Result};
use crate::store::BlockSet;
use crate::types::GatewayState;

/// Commands delivered to the worker task.
enum Command {
    Start(oneshot::Sender<Result<()>>),
    Apply(BlockSet, oneshot::Sender<()>),
    Stop(oneshot::Sender<()>),
    Revoked(oneshot::Sender<()>),
}

/// Handle to the interception gateway.
///
/// Cheap to clone; all clones talk to the same worker task. Dropping the
/// last clone shuts the worker down, releasing the interface.
#[derive(Clone)]
pub struct InterceptionGateway {
    cmd_tx: mpsc::Sender<Command>,
    state: Arc<RwLock<GatewayState>>,
}

impl InterceptionGateway {
    /// Spawn the gateway worker.
    ///
    /// `updates` is the block-list subscription; its current value is used
    /// as the snapshot for the next `start()`.
    pub fn spawn(
        params: InterfaceParams,
        updates: watch::Receiver<BlockSet>,
        platform: Arc<dyn Platform>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let state = Arc::new(RwLock::new(GatewayState::Stopped));

        let worker = Worker {
            params,
            platform,
            updates,
            state: Arc::clone(&state),
            handle: None,
        };
        tokio::spawn(worker.run(cmd_rx));

        Self { cmd_tx, state }
    }

    /// Start the gateway.
    ///
    /// Establishes the virtual interface from the current block-set
    /// snapshot and goes live with the change subscription. No-op when
    /// not `Stopped`. Fails with [`Error::EstablishmentFailed`] when the
    /// platform refuses or fails to create the interface, leaving the
    /// gateway `Stopped`.
    pub async fn start(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Start(reply_tx))
            .await
            .map_err(|_| Error::WorkerGone)?;
        reply_rx.await.map_err(|_| Error::WorkerGone)?
    }

    /// Apply a block-set snapshot out of band.
    ///
    /// Normally the subscription drives rebuilds; this entry point exists
    /// for callers that hold their own snapshot. Safe at any state: a
    /// no-op unless the gateway is `Active`. Rebuild failures are absorbed
    /// (the gateway stays `Active` with the interface absent).
    pub async fn apply_block_set(&self, snapshot: BlockSet) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::Apply(snapshot, ack_tx))
            .await
            .is_ok()
        {
            let _ = ack_rx.await;
        }
    }

    /// Stop the gateway and release the interface. Idempotent.
    pub async fn stop(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Stop(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Handle an out-of-band authorization revocation.
    ///
    /// Identical to [`stop`], except the interface handle is treated as
    /// already invalidated by the platform and is not explicitly closed.
    ///
    /// [`stop`]: InterceptionGateway::stop
    pub async fn on_revoked(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Revoked(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Whether the gateway is `Active`.
    pub fn is_active(&self) -> bool {
        self.state.read().is_active()
    }

    /// Current gateway state.
    pub fn state(&self) -> GatewayState {
        *self.state.read()
    }
}

/// Worker-side state. Only the worker task touches `handle` or transitions
/// `state`.
struct Worker {
    params: InterfaceParams,
    platform: Arc<dyn Platform>,
    updates: watch::Receiver<BlockSet>,
    state: Arc<RwLock<GatewayState>>,
    handle: Option<InterfaceHandle>,
}

impl Worker {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<Command>) {
        let mut updates_closed = false;

        loop {
            let subscribed = self.state().is_active() && !updates_closed;

            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Start(reply)) => {
                        let _ = reply.send(self.start());
                    }
                    Some(Command::Apply(snapshot, ack)) => {
                        self.apply_block_set(&snapshot);
                        let _ = ack.send(());
                    }
                    Some(Command::Stop(ack)) => {
                        self.stop(true);
                        let _ = ack.send(());
                    }
                    Some(Command::Revoked(ack)) => {
                        info!("Interception authorization revoked");
                        self.stop(false);
                        let _ = ack.send(());
                    }
                    None => {
                        // All gateway handles dropped.
                        self.stop(true);
                        break;
                    }
                },

                changed = self.updates.changed(), if subscribed => {
                    match changed {
                        Ok(()) => {
                            let snapshot = self.updates.borrow_and_update().clone();
                            self.apply_block_set(&snapshot);
                        }
                        Err(_) => {
                            warn!("Block-list store dropped; keeping current configuration");
                            updates_closed = true;
                        }
                    }
                }
            }
        }
    }

    fn state(&self) -> GatewayState {
        *self.state.read()
    }

    fn set_state(&self, next: GatewayState) {
        debug!(from = %self.state(), to = %next, "Gateway state transition");
        *self.state.write() = next;
    }

    /// Establish the interface from the current block-set snapshot.
    fn start(&mut self) -> Result<()> {
        if self.state() != GatewayState::Stopped {
            debug!(state = %self.state(), "start() ignored, gateway not stopped");
            return Ok(());
        }

        self.set_state(GatewayState::Starting);

        // Mark the snapshot as seen so the subscription does not replay
        // the configuration we are about to establish.
        let snapshot = self.updates.borrow_and_update().clone();
        let config = RoutingConfiguration::compute(&self.params, &snapshot);

        match self.platform.establish(&config) {
            Ok(Some(handle)) => {
                info!(
                    interface = handle.name(),
                    allowed = config.allow_list().len(),
                    "Gateway active, interception live"
                );
                self.handle = Some(handle);
                self.set_state(GatewayState::Active);
                Ok(())
            }
            Ok(None) => {
                self.release_partial();
                self.set_state(GatewayState::Stopped);
                Err(Error::EstablishmentFailed(
                    "platform returned no interface handle".into(),
                ))
            }
            Err(e) => {
                self.release_partial();
                self.set_state(GatewayState::Stopped);
                Err(Error::EstablishmentFailed(e.to_string()))
            }
        }
    }

    /// Rebuild the interface for a new snapshot.
    ///
    /// The previous interface is torn down before the replacement is
    /// established, so there is a brief window, bounded by platform call
    /// latency, with no interception at all. If re-establishment fails the
    /// interface stays absent but the gateway remains logically `Active`;
    /// interception resumes on the next successful rebuild.
    fn apply_block_set(&mut self, snapshot: &BlockSet) {
        if self.state() != GatewayState::Active {
            debug!(state = %self.state(), "apply_block_set ignored, gateway not active");
            return;
        }

        if let Some(handle) = self.handle.take() {
            self.close_quietly(handle);
        }

        let config = RoutingConfiguration::compute(&self.params, snapshot);
        match self.platform.establish(&config) {
            Ok(Some(handle)) => {
                info!(
                    interface = handle.name(),
                    allowed = config.allow_list().len(),
                    "Routing configuration rebuilt"
                );
                self.handle = Some(handle);
            }
            Ok(None) => {
                warn!("Re-establishment returned no handle; interface absent until next rebuild");
            }
            Err(e) => {
                warn!(error = %e, "Re-establishment failed; interface absent until next rebuild");
            }
        }
    }

    /// Tear down and transition to `Stopped`. Idempotent.
    ///
    /// `close_handle` is false on revocation: the platform has already
    /// invalidated the handle, so it is only dropped.
    fn stop(&mut self, close_handle: bool) {
        if self.state() == GatewayState::Stopped {
            debug!("stop() ignored, gateway already stopped");
            return;
        }

        self.set_state(GatewayState::Stopping);

        if let Some(handle) = self.handle.take() {
            if close_handle {
                self.close_quietly(handle);
            } else {
                drop(handle);
            }
        }

        self.set_state(GatewayState::Stopped);
        info!("Gateway stopped, all applications regain network access");
    }

    /// Release anything acquired by a failed start.
    fn release_partial(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.close_quietly(handle);
        }
    }

    /// Close a handle, swallowing failures. Retrying a close is not
    /// meaningful, so teardown is always treated as successful.
    fn close_quietly(&self, handle: InterfaceHandle) {
        let name = handle.name().to_string();
        if let Err(e) = self.platform.close(handle) {
            warn!(interface = %name, error = %e, "Interface close failed (ignored)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockPlatform;
    use crate::types::AppId;

    fn gateway() -> (InterceptionGateway, Arc<MockPlatform>, watch::Sender<BlockSet>) {
        let platform = Arc::new(MockPlatform::new());
        let (tx, rx) = watch::channel(BlockSet::new());
        let gw = InterceptionGateway::spawn(
            InterfaceParams::default(),
            rx,
            Arc::clone(&platform) as Arc<dyn Platform>,
        );
        (gw, platform, tx)
    }

    #[tokio::test]
    async fn test_start_stop_cycle() {
        let (gw, platform, _tx) = gateway();
        assert_eq!(gw.state(), GatewayState::Stopped);

        gw.start().await.unwrap();
        assert_eq!(gw.state(), GatewayState::Active);
        assert_eq!(platform.open_count(), 1);

        gw.stop().await;
        assert_eq!(gw.state(), GatewayState::Stopped);
        assert_eq!(platform.open_count(), 0);
    }

    #[tokio::test]
    async fn test_start_while_active_is_noop() {
        let (gw, platform, _tx) = gateway();
        gw.start().await.unwrap();
        gw.start().await.unwrap();
        assert_eq!(platform.establish_count(), 1);
    }

    #[tokio::test]
    async fn test_stop_idempotent() {
        let (gw, _platform, _tx) = gateway();
        gw.stop().await;
        gw.stop().await;
        assert_eq!(gw.state(), GatewayState::Stopped);

        gw.start().await.unwrap();
        gw.stop().await;
        gw.stop().await;
        assert_eq!(gw.state(), GatewayState::Stopped);
    }

    #[tokio::test]
    async fn test_establishment_refused() {
        let (gw, platform, _tx) = gateway();
        platform.refuse_next(1);

        let err = gw.start().await.unwrap_err();
        assert!(matches!(err, Error::EstablishmentFailed(_)));
        assert_eq!(gw.state(), GatewayState::Stopped);
    }

    #[tokio::test]
    async fn test_establishment_error() {
        let (gw, platform, _tx) = gateway();
        platform.fail_next(1);

        let err = gw.start().await.unwrap_err();
        assert!(matches!(err, Error::EstablishmentFailed(_)));
        assert_eq!(gw.state(), GatewayState::Stopped);

        // Recoverable: a later start succeeds.
        gw.start().await.unwrap();
        assert!(gw.is_active());
    }

    #[tokio::test]
    async fn test_apply_when_stopped_is_noop() {
        let (gw, platform, _tx) = gateway();
        gw.apply_block_set([AppId::from("com.a")].into_iter().collect())
            .await;
        assert_eq!(platform.establish_count(), 0);
        assert_eq!(gw.state(), GatewayState::Stopped);
    }

    #[tokio::test]
    async fn test_rebuild_swaps_interface() {
        let (gw, platform, _tx) = gateway();
        gw.start().await.unwrap();

        gw.apply_block_set([AppId::from("com.a")].into_iter().collect())
            .await;

        assert_eq!(platform.establish_count(), 2);
        assert_eq!(platform.open_count(), 1);
        assert_eq!(platform.closed_count(), 1);
        let last = platform.last_config().unwrap();
        assert_eq!(last.allow_list(), &[AppId::from("com.a")]);
    }

    #[tokio::test]
    async fn test_degraded_rebuild_stays_active() {
        let (gw, platform, _tx) = gateway();
        gw.start().await.unwrap();

        platform.refuse_next(1);
        gw.apply_block_set([AppId::from("com.a")].into_iter().collect())
            .await;

        // Interface absent, but the gateway still reports active.
        assert_eq!(platform.open_count(), 0);
        assert!(gw.is_active());

        // Next rebuild restores interception.
        gw.apply_block_set([AppId::from("com.b")].into_iter().collect())
            .await;
        assert_eq!(platform.open_count(), 1);
    }

    #[tokio::test]
    async fn test_close_failure_swallowed() {
        let (gw, platform, _tx) = gateway();
        gw.start().await.unwrap();

        platform.fail_close(true);
        gw.stop().await;
        assert_eq!(gw.state(), GatewayState::Stopped);
    }

    #[tokio::test]
    async fn test_revocation_skips_close() {
        let (gw, platform, _tx) = gateway();
        gw.start().await.unwrap();

        gw.on_revoked().await;
        assert_eq!(gw.state(), GatewayState::Stopped);
        // The handle was dropped, never explicitly closed.
        assert_eq!(platform.closed_count(), 0);

        // A subsequent stop is a harmless no-op.
        gw.stop().await;
        assert_eq!(gw.state(), GatewayState::Stopped);
    }

    #[tokio::test]
    async fn test_subscription_drives_rebuild() {
        let (gw, platform, tx) = gateway();
        gw.start().await.unwrap();

        tx.send_replace([AppId::from("com.a")].into_iter().collect());

        // The watch wakeup is processed by the worker; synchronize by
        // sending a follow-up command through the same serialized queue.
        let latest = tx.borrow().clone();
        gw.apply_block_set(latest).await;

        let last = platform.last_config().unwrap();
        assert_eq!(last.allow_list(), &[AppId::from("com.a")]);
    }
}
