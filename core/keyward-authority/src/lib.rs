//! Remote license authority access for Keyward.
//!
//! This crate provides:
//! - [`RemoteAuthority`]: the async contract both the device validator and
//!   the operator registry use
//! - [`HttpAuthorityClient`]: a bounded-timeout JSON/HTTP client
//! - [`InMemoryAuthority`]: a reference implementation with exact bind
//!   semantics, used by the reference server and in tests
//!
//! Configuration is injected at construction; there is no process-wide
//! authority address.

mod authority;
mod error;
mod http;
mod memory;
pub mod wire;

pub use authority::RemoteAuthority;
pub use error::{AuthorityError, AuthorityResult};
pub use http::{AuthorityConfig, DEFAULT_TIMEOUT_SECS, HttpAuthorityClient};
pub use memory::InMemoryAuthority;
