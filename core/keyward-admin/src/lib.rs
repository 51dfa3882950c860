//! Operator-side license registry for Keyward.
//!
//! Issues, lists, searches, blacklists, re-dates and soft-deletes licenses
//! through a [`RemoteAuthority`](keyward_authority::RemoteAuthority), and
//! exports the listing as JSON.
//!
//! Row status is derived with the same precedence the device validator
//! uses. The registry never writes to a device's cache and never answers
//! allow/deny.

mod error;
mod mirror;
mod registry;
mod view;

pub use error::{AdminError, AdminResult};
pub use registry::{AdminRegistry, RegistryConfig};
pub use view::{RegistryEntry, RegistryStatus, RegistrySummary};
