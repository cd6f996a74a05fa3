//! # Appwall
//!
//! Policy-driven traffic-interception gateway for per-application
//! firewalling.
//!
//! Appwall owns a virtual network interface configured with a restricted
//! allow-list of applications. Traffic from allow-listed (i.e. to-be-blocked)
//! applications is captured by the interface and silently dropped; everything
//! else bypasses the interface entirely and reaches the network normally.
//! The inversion is deliberate: "allow-listing for capture" implements
//! "block-listing for internet access", because the interface advertises a
//! default route but never forwards a single packet upstream.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    CLI / Presentation Layer                     │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                      GatewayController                          │
//! │          (authorization, start/stop, running state)             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                     InterceptionGateway                         │
//! │  ┌──────────────┐  ┌───────────────────┐  ┌─────────────────┐   │
//! │  │    State     │  │     Routing       │  │   Worker task   │   │
//! │  │   machine    │  │  recomputation    │  │  (serialized)   │   │
//! │  └──────────────┘  └───────────────────┘  └─────────────────┘   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │        BlockListStore          │        Platform seam           │
//! │  (persisted set + watch)       │  (establish / close handle)    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use appwall::config::Config;
//! use appwall::controller::{GatewayController, PrivilegeAuthorizer};
//! use appwall::gateway::MockPlatform;
//! use appwall::store::{BlockListStore, MemoryBackend};
//!
//! # async fn example() -> appwall::Result<()> {
//! let config = Config::default();
//! let store = Arc::new(BlockListStore::open(
//!     Box::new(MemoryBackend::default()),
//!     config.interface.own_app.clone(),
//! )?);
//!
//! let controller = GatewayController::new(
//!     config.interface.clone(),
//!     Arc::clone(&store),
//!     Arc::new(MockPlatform::new()),
//!     Arc::new(PrivilegeAuthorizer),
//! );
//!
//! controller.request_start().await?;
//! store.set_blocked(&"com.example.app".into(), true)?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)] // ASCII diagrams in docs

pub mod config;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod store;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;

pub use config::Config;
pub use error::{Error, Result};
pub use types::{AppId, GatewayState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// MTU configured on the virtual interface.
pub const INTERFACE_MTU: u16 = 1500;

/// Point-to-point address assigned to the virtual interface.
pub const INTERFACE_ADDRESS: &str = "10.0.0.2";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::controller::{Authorizer, GatewayController};
    pub use crate::error::{Error, Result};
    pub use crate::gateway::{
        InterceptionGateway, InterfaceParams, Platform, RoutingConfiguration,
    };
    pub use crate::store::{BlockListStore, BlockSet};
    pub use crate::types::{AppId, GatewayState};
}
