//! Traffic-interception gateway.
//!
//! The gateway owns the lifecycle of a virtual network interface and keeps
//! its routing configuration consistent with the latest block set. The
//! interface captures traffic only from applications on its allow-list and
//! forwards nothing, so capture is an effective drop:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Applications                              │
//! │   blocked app ──────────┐            other app ───────────┐     │
//! ├─────────────────────────┼─────────────────────────────────┼─────┤
//! │                         ▼                                 ▼     │
//! │              Virtual interface (allow-list)        real network │
//! │              [captured, never forwarded]            [untouched] │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All state transitions and handle mutations happen on a single dedicated
//! worker task; see [`InterceptionGateway`].

mod platform;
mod routing;
mod runner;

#[cfg(target_os = "linux")]
mod tun;

pub use platform::{InterfaceHandle, MockPlatform, Platform};
pub use routing::{InterfaceParams, RoutingConfiguration};
pub use runner::InterceptionGateway;

#[cfg(target_os = "linux")]
pub use tun::TunPlatform;

use crate::error::Result;

/// Check whether the current process can create virtual interfaces.
///
/// On Unix this means root or (on Linux) `CAP_NET_ADMIN`; the simplified
/// check here only recognizes root.
pub fn check_privileges() -> Result<bool> {
    #[cfg(unix)]
    {
        let uid = unsafe { libc::getuid() };
        Ok(uid == 0)
    }

    #[cfg(not(unix))]
    {
        Ok(false)
    }
}
