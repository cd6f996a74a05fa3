//! Platform seam for virtual-interface establishment.
//!
//! The hosting environment is the only party that can actually create a
//! virtual interface; the gateway talks to it through [`Platform`]. Both
//! calls are bounded, synchronous operations from the worker's perspective.

use std::any::Any;
use std::collections::BTreeSet;

use parking_lot::Mutex;

use super::routing::RoutingConfiguration;
use crate::error::{Error, Result};

/// Opaque handle to an established virtual interface.
///
/// Created by a [`Platform`] implementation and handed back to the same
/// implementation for teardown. The resource inside is implementation
/// private.
pub struct InterfaceHandle {
    name: String,
    resource: Box<dyn Any + Send>,
}

impl InterfaceHandle {
    /// Wrap a platform resource.
    pub fn new(name: impl Into<String>, resource: Box<dyn Any + Send>) -> Self {
        Self {
            name: name.into(),
            resource,
        }
    }

    /// Platform-assigned interface name or label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unwrap the platform resource.
    pub fn into_resource(self) -> Box<dyn Any + Send> {
        self.resource
    }
}

impl std::fmt::Debug for InterfaceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterfaceHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Network privilege layer consumed by the gateway.
pub trait Platform: Send + Sync + 'static {
    /// Establish a virtual interface with the given configuration.
    ///
    /// `Ok(None)` signals a platform-level establishment failure (the
    /// platform declined without raising an error).
    fn establish(&self, config: &RoutingConfiguration) -> Result<Option<InterfaceHandle>>;

    /// Close an interface handle.
    ///
    /// Best-effort: callers swallow and log failures, since retrying a
    /// close is not meaningful.
    fn close(&self, handle: InterfaceHandle) -> Result<()>;
}

/// Scriptable in-process platform for tests and simulation.
///
/// Records every established configuration and tracks which handles are
/// still open; can be told to refuse or fail upcoming establishments.
#[derive(Default)]
pub struct MockPlatform {
    inner: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    next_id: u64,
    /// Establishments that will return `Ok(None)`.
    refuse: u32,
    /// Establishments that will return `Err`.
    fail: u32,
    /// Whether `close` returns an error (the handle is still released).
    fail_close: bool,
    /// Synchronous delay applied to each establishment, to widen the
    /// rebuild window in coalescing tests.
    establish_delay: Option<std::time::Duration>,
    established: Vec<RoutingConfiguration>,
    open: BTreeSet<u64>,
    closed: Vec<u64>,
}

struct MockResource {
    id: u64,
}

impl MockPlatform {
    /// Create a well-behaved mock platform.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` establishments return `Ok(None)`.
    pub fn refuse_next(&self, n: u32) {
        self.inner.lock().refuse = n;
    }

    /// Make the next `n` establishments return an error.
    pub fn fail_next(&self, n: u32) {
        self.inner.lock().fail = n;
    }

    /// Make `close` report failure (teardown still happens).
    pub fn fail_close(&self, fail: bool) {
        self.inner.lock().fail_close = fail;
    }

    /// Delay each establishment by `delay`, blocking the calling worker
    /// the way a slow platform call would.
    pub fn set_establish_delay(&self, delay: std::time::Duration) {
        self.inner.lock().establish_delay = Some(delay);
    }

    /// Every configuration ever established, in order.
    pub fn established(&self) -> Vec<RoutingConfiguration> {
        self.inner.lock().established.clone()
    }

    /// The most recently established configuration.
    pub fn last_config(&self) -> Option<RoutingConfiguration> {
        self.inner.lock().established.last().cloned()
    }

    /// Total successful establishments.
    pub fn establish_count(&self) -> usize {
        self.inner.lock().established.len()
    }

    /// Handles currently open (established but not closed or dropped).
    pub fn open_count(&self) -> usize {
        self.inner.lock().open.len()
    }

    /// Handles explicitly closed through the platform.
    pub fn closed_count(&self) -> usize {
        self.inner.lock().closed.len()
    }
}

impl Platform for MockPlatform {
    fn establish(&self, config: &RoutingConfiguration) -> Result<Option<InterfaceHandle>> {
        let delay = self.inner.lock().establish_delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let mut state = self.inner.lock();

        if state.fail > 0 {
            state.fail -= 1;
            return Err(Error::Internal("mock establishment failure".into()));
        }
        if state.refuse > 0 {
            state.refuse -= 1;
            return Ok(None);
        }

        let id = state.next_id;
        state.next_id += 1;
        state.open.insert(id);
        state.established.push(config.clone());

        Ok(Some(InterfaceHandle::new(
            format!("mock{id}"),
            Box::new(MockResource { id }),
        )))
    }

    fn close(&self, handle: InterfaceHandle) -> Result<()> {
        let resource = handle.into_resource();
        let Ok(resource) = resource.downcast::<MockResource>() else {
            return Err(Error::Internal("foreign handle passed to mock platform".into()));
        };

        let mut state = self.inner.lock();
        state.open.remove(&resource.id);
        state.closed.push(resource.id);

        if state.fail_close {
            return Err(Error::Internal("mock close failure".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::routing::InterfaceParams;
    use crate::store::BlockSet;

    fn config() -> RoutingConfiguration {
        RoutingConfiguration::compute(&InterfaceParams::default(), &BlockSet::new())
    }

    #[test]
    fn test_mock_establish_and_close() {
        let platform = MockPlatform::new();
        let handle = platform.establish(&config()).unwrap().unwrap();
        assert_eq!(platform.open_count(), 1);

        platform.close(handle).unwrap();
        assert_eq!(platform.open_count(), 0);
        assert_eq!(platform.closed_count(), 1);
    }

    #[test]
    fn test_mock_refusal_then_recovery() {
        let platform = MockPlatform::new();
        platform.refuse_next(1);

        assert!(platform.establish(&config()).unwrap().is_none());
        assert!(platform.establish(&config()).unwrap().is_some());
    }

    #[test]
    fn test_mock_close_failure_still_releases() {
        let platform = MockPlatform::new();
        platform.fail_close(true);

        let handle = platform.establish(&config()).unwrap().unwrap();
        assert!(platform.close(handle).is_err());
        assert_eq!(platform.open_count(), 0);
    }
}
