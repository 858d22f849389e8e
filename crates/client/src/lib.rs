//! `lendora-client` — the authorization store and its remote protocol.
//!
//! - `store`: shared catalog, busy counters, last error
//! - `loader` + `lifecycle`: cancellable bulk loads
//! - `mutation`: optimistic writes with rollback
//! - `remote`: the boundary trait (`http` feature adds a reqwest adapter)

pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod loader;
pub mod mutation;
pub mod remote;
pub mod store;

#[cfg(feature = "http")]
pub mod http;

pub use client::AuthorizationClient;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult, RemoteError};
pub use lifecycle::{Collection, LoadOutcome, RequestLifecycle};
pub use loader::{LoadReport, StoreLoader};
pub use mutation::MutationCoordinator;
pub use remote::RemoteAuthority;
pub use store::{AuthorizationStore, BusyState, MutationKind, Scope};

#[cfg(feature = "http")]
pub use http::{HttpAuthority, StaticToken, TokenSource};
