//! Device-side license validation for Keyward.
//!
//! This module handles:
//! - Device fingerprinting scoped per application
//! - Validation against the remote authority, binding unbound tokens
//! - Offline tolerance through the local cache
//! - Logout that forces the next decision back to the authority
//! - Re-validation scheduling (the decision only; hosts own the timer)
//!
//! # Design Principles
//!
//! - **Authority decides**: only an authority answer can establish that a
//!   token is bound to this device; the cache can only repeat or deny
//! - **Never fatal**: every failure resolves to a deny result with a reason
//! - **Single flight**: overlapping validations of one token share one run
//! - **Dates move**: cached "available" is re-checked against today's date

mod config;
mod device;
mod engine;
mod error;
mod flight;

pub use config::EngineConfig;
pub use device::{
    DeviceFingerprint, DeviceInfo, FingerprintSource, HostFingerprinter, InterfaceCandidate,
    StaticFingerprinter, UNKNOWN, select_mac_address,
};
pub use engine::ValidationEngine;
pub use error::{LicenseError, LicenseResult};
