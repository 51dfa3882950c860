//! Device fingerprinting for license binding.
//!
//! A fingerprint identifies one (machine, application) pair. The same host
//! always yields the same hash for the same application name, and a
//! different application name always yields a different hash, so two apps
//! sharing a token are never treated as one binding.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Debug;
use sysinfo::{Networks, System};

/// Placeholder for any field that could not be read.
pub const UNKNOWN: &str = "unknown";

/// Domain label mixed into every hash so it cannot collide with hashes
/// computed for other purposes over the same fields.
const FINGERPRINT_DOMAIN: &str = "keyward-device-fingerprint-v1";

/// Raw identifiers of the current machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Hostname.
    pub hostname: String,
    /// MAC address of the first non-loopback interface.
    pub mac_address: String,
    /// Hardware model string.
    pub hardware_model: String,
    /// Operating system name.
    pub os_name: String,
    /// Operating system version.
    pub os_version: String,
    /// Processor brand string.
    pub cpu_brand: String,
    /// Total physical memory in bytes.
    pub total_memory: String,
}

impl DeviceInfo {
    /// Collects information about the current device. Never fails; any
    /// field that cannot be read is [`UNKNOWN`].
    #[must_use]
    pub fn collect() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu();

        let cpu_brand = sys
            .cpus()
            .first()
            .map(|cpu| cpu.brand().to_string())
            .unwrap_or_default();
        let total_memory = match sys.total_memory() {
            0 => String::new(),
            bytes => bytes.to_string(),
        };

        Self {
            hostname: get_hostname(),
            mac_address: get_mac_address(),
            hardware_model: get_hardware_model(),
            os_name: System::name().unwrap_or_default(),
            os_version: System::os_version().unwrap_or_default(),
            cpu_brand,
            total_memory,
        }
        .normalized()
    }

    /// Replaces blank fields with [`UNKNOWN`] and trims the rest.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            hostname: or_unknown(self.hostname),
            mac_address: or_unknown(self.mac_address),
            hardware_model: or_unknown(self.hardware_model),
            os_name: or_unknown(self.os_name),
            os_version: or_unknown(self.os_version),
            cpu_brand: or_unknown(self.cpu_brand),
            total_memory: or_unknown(self.total_memory),
        }
    }

    /// Fields in the fixed order they are hashed.
    fn components(&self) -> [&str; 7] {
        [
            &self.hostname,
            &self.mac_address,
            &self.hardware_model,
            &self.os_name,
            &self.os_version,
            &self.cpu_brand,
            &self.total_memory,
        ]
    }
}

/// Identity of this machine for one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFingerprint {
    info: DeviceInfo,
    app_name: String,
    hash: String,
}

impl DeviceFingerprint {
    /// Derives the fingerprint for `app_name` from already-collected info.
    /// Pure: identical inputs give an identical hash.
    #[must_use]
    pub fn derive(info: DeviceInfo, app_name: &str) -> Self {
        let info = info.normalized();
        let mut components: Vec<&str> = info.components().to_vec();
        components.push(app_name);
        let combined = components.join("|");

        let mut hasher = Sha256::new();
        hasher.update(FINGERPRINT_DOMAIN.as_bytes());
        hasher.update(b"\0");
        hasher.update(combined.as_bytes());
        let hash = hex::encode(hasher.finalize());

        Self {
            info,
            app_name: app_name.to_string(),
            hash,
        }
    }

    /// Hex-encoded SHA-256 hash.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    #[must_use]
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }
}

/// Produces fingerprints for the validation engine.
pub trait FingerprintSource: Send + Sync + Debug {
    /// Fingerprint of this device for `app_name`.
    fn fingerprint(&self, app_name: &str) -> DeviceFingerprint;
}

/// Reads the real host at call time.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostFingerprinter;

impl FingerprintSource for HostFingerprinter {
    fn fingerprint(&self, app_name: &str) -> DeviceFingerprint {
        DeviceFingerprint::derive(DeviceInfo::collect(), app_name)
    }
}

/// Always fingerprints the same, fixed device.
#[derive(Debug, Clone)]
pub struct StaticFingerprinter {
    info: DeviceInfo,
}

impl StaticFingerprinter {
    #[must_use]
    pub fn new(info: DeviceInfo) -> Self {
        Self { info }
    }
}

impl FingerprintSource for StaticFingerprinter {
    fn fingerprint(&self, app_name: &str) -> DeviceFingerprint {
        DeviceFingerprint::derive(self.info.clone(), app_name)
    }
}

fn or_unknown(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        UNKNOWN.to_string()
    } else {
        trimmed.to_string()
    }
}

fn get_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_default()
}

/// Name prefixes of interfaces that are created at runtime with a fresh
/// random MAC.
const VIRTUAL_PREFIXES: &[&str] = &[
    "docker", "br-", "veth", "virbr", "vmnet", "vboxnet", "tap", "tun", "utun", "awdl", "llw",
    "bridge", "lo",
];

/// One network interface considered for the fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceCandidate {
    /// Interface name, e.g. `enp3s0`.
    pub name: String,
    /// MAC address as printed by the OS.
    pub mac: String,
    /// Backed by a hardware device (`/sys/class/net/<if>/device` on Linux).
    pub physical: bool,
}

/// Picks the MAC that identifies this machine.
///
/// Only non-virtual interfaces with a real MAC count. Physical interfaces
/// win over the rest; ties go to the lowest name, since enumeration order
/// is not stable but names are.
#[must_use]
pub fn select_mac_address(candidates: &[InterfaceCandidate]) -> Option<String> {
    candidates
        .iter()
        .filter(|c| !is_virtual_interface(&c.name) && !is_unspecified_mac(&c.mac))
        .min_by(|a, b| b.physical.cmp(&a.physical).then_with(|| a.name.cmp(&b.name)))
        .map(|c| c.mac.clone())
}

fn is_virtual_interface(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.starts_with("loopback") || VIRTUAL_PREFIXES.iter().any(|p| lower.starts_with(p))
}

fn is_unspecified_mac(mac: &str) -> bool {
    mac.trim().is_empty() || mac.chars().all(|c| c == '0' || c == ':' || c == '-')
}

fn get_mac_address() -> String {
    let networks = Networks::new_with_refreshed_list();
    let mut candidates = Vec::new();
    for (name, data) in &networks {
        candidates.push(InterfaceCandidate {
            name: name.clone(),
            mac: data.mac_address().to_string(),
            physical: is_physical_interface(name),
        });
    }
    select_mac_address(&candidates).unwrap_or_default()
}

#[cfg(target_os = "linux")]
fn is_physical_interface(name: &str) -> bool {
    std::path::Path::new("/sys/class/net")
        .join(name)
        .join("device")
        .exists()
}

#[cfg(not(target_os = "linux"))]
fn is_physical_interface(_name: &str) -> bool {
    false
}

fn get_hardware_model() -> String {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/sys/class/dmi/id/product_name")
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("sysctl")
            .args(["-n", "hw.model"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        String::new()
    }
}
