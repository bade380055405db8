//! Host machine facts (ambient/supplemental, SPEC_FULL §11): backs
//! `GET /machine-info`. Best-effort by construction — a provider must never
//! fail; partial information is preferable to a 500.

use serde::{Deserialize, Serialize};

/// Static host facts served at `/machine-info` (§6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MachineInfo {
    pub hostname: String,
    pub os: String,
    pub kernel_version: String,
    pub cpu_count: usize,
    pub total_memory_bytes: u64,
    pub boot_id: Option<String>,
}

/// Seam over "however this host's facts are actually gathered." Kept narrow
/// and never-erroring, so a provider failure degrades a single field rather
/// than the whole endpoint.
pub trait MachineInfoProvider: Send + Sync {
    fn collect(&self) -> MachineInfo;
}

/// Reads what's cheaply available from the standard library and
/// `/proc`/`/sys` on Linux; any unavailable fact is left at its default
/// rather than failing the whole response.
#[derive(Default)]
pub struct StdMachineInfoProvider;

impl MachineInfoProvider for StdMachineInfoProvider {
    fn collect(&self) -> MachineInfo {
        MachineInfo {
            hostname: hostname_best_effort(),
            os: std::env::consts::OS.to_string(),
            kernel_version: kernel_version_best_effort(),
            cpu_count: std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1),
            total_memory_bytes: total_memory_best_effort(),
            boot_id: boot_id_best_effort(),
        }
    }
}

fn hostname_best_effort() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn kernel_version_best_effort() -> String {
    std::fs::read_to_string("/proc/sys/kernel/osrelease")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn total_memory_best_effort() -> u64 {
    let Ok(meminfo) = std::fs::read_to_string("/proc/meminfo") else {
        return 0;
    };
    meminfo
        .lines()
        .find(|line| line.starts_with("MemTotal:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
        .unwrap_or(0)
}

fn boot_id_best_effort() -> Option<String> {
    std::fs::read_to_string("/proc/sys/kernel/random/boot_id")
        .ok()
        .map(|s| s.trim().to_string())
}
