//! Available-memory probing and the throttle / abort decisions of the block-wise clip.
//!
//! The engine checks memory immediately before each block. Below the soft floor it asks
//! for retained scratch buffers to be released and checks again. Below the hard floor it
//! stops, and the remaining blocks are recorded as unprocessed.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

const GIB: u64 = 1024 * 1024 * 1024;
const MIB: u64 = 1024 * 1024;

/// Source of available memory readings
pub trait MemoryProbe {
    /// bytes currently available to this process
    fn available_bytes(&mut self) -> u64;

    /// Called when the monitor asks for memory to be released. Probes that wrap an
    /// allocator or a cache can trim it here.
    fn release_hint(&mut self) {}
}

/// Soft and hard floors of available memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryBudget {
    /// below this, scratch buffers are released before the next block
    pub soft_floor_bytes: u64,
    /// below this (after releasing), no further block is started
    pub hard_floor_bytes: u64,
}

impl Default for MemoryBudget {
    fn default() -> Self {
        Self {
            soft_floor_bytes: GIB,
            hard_floor_bytes: 512 * MIB,
        }
    }
}

/// Reads `MemAvailable` from `/proc/meminfo`.
///
/// Hosts without that file report `u64::MAX`, which never throttles; a warning is logged
/// once per process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMemory;

static MEMINFO_WARNED: AtomicBool = AtomicBool::new(false);

impl SystemMemory {
    fn read_meminfo() -> Option<u64> {
        let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
        parse_mem_available(&meminfo)
    }
}

impl MemoryProbe for SystemMemory {
    fn available_bytes(&mut self) -> u64 {
        match Self::read_meminfo() {
            Some(bytes) => bytes,
            None => {
                if !MEMINFO_WARNED.swap(true, Ordering::Relaxed) {
                    warn!("Available memory unknown on this host, memory floors disabled");
                }
                u64::MAX
            }
        }
    }
}

/// extract `MemAvailable` (reported in kB) from the contents of `/proc/meminfo`
fn parse_mem_available(meminfo: &str) -> Option<u64> {
    let line = meminfo
        .lines()
        .find(|line| line.starts_with("MemAvailable:"))?;

    let mut parts = line.split_ascii_whitespace().skip(1);
    let value: u64 = parts.next()?.parse().ok()?;

    match parts.next() {
        Some("kB") | None => Some(value.saturating_mul(1024)),
        Some(_) => None,
    }
}

/// Always reports the same amount of available memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedMemory(pub u64);

impl MemoryProbe for FixedMemory {
    fn available_bytes(&mut self) -> u64 {
        self.0
    }
}

/// Reports a scripted sequence of readings, repeating the last one once exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedMemory {
    readings: Vec<u64>,
    next: usize,
    releases: usize,
}

impl ScriptedMemory {
    pub fn new(readings: Vec<u64>) -> Self {
        Self {
            readings,
            next: 0,
            releases: 0,
        }
    }

    /// number of release hints received
    pub fn releases(&self) -> usize {
        self.releases
    }
}

impl MemoryProbe for ScriptedMemory {
    fn available_bytes(&mut self) -> u64 {
        let reading = match self.readings.get(self.next) {
            Some(reading) => *reading,
            None => self.readings.last().copied().unwrap_or(u64::MAX),
        };
        self.next += 1;
        reading
    }

    fn release_hint(&mut self) {
        self.releases += 1;
    }
}

/// Available memory stayed below the hard floor after buffers were released
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{available} bytes available, below the hard floor of {hard_floor} bytes")]
pub struct MemoryExhausted {
    pub available: u64,
    pub hard_floor: u64,
}

/// Buffers that can be dropped when memory runs low
pub trait Release {
    fn release(&mut self);
}

/// Makes throttle and abort decisions from the readings of a [`MemoryProbe`]
#[derive(Debug, Clone)]
pub struct MemoryBudgetMonitor<P = SystemMemory> {
    probe: P,
    release_requests: usize,
}

impl Default for MemoryBudgetMonitor<SystemMemory> {
    fn default() -> Self {
        Self::new(SystemMemory)
    }
}

impl<P: MemoryProbe> MemoryBudgetMonitor<P> {
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            release_requests: 0,
        }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn into_probe(self) -> P {
        self.probe
    }

    pub fn available_bytes(&mut self) -> u64 {
        self.probe.available_bytes()
    }

    pub fn should_throttle(&mut self, soft_floor_bytes: u64) -> bool {
        self.available_bytes() < soft_floor_bytes
    }

    pub fn should_abort(&mut self, hard_floor_bytes: u64) -> bool {
        self.available_bytes() < hard_floor_bytes
    }

    /// Deterministic trigger point for releasing retained buffers: `buffers` is released
    /// immediately and the probe is told about it.
    pub fn request_release(&mut self, buffers: &mut dyn Release) {
        buffers.release();
        self.probe.release_hint();
        self.release_requests += 1;
    }

    /// how often a release was requested so far
    pub fn release_requests(&self) -> usize {
        self.release_requests
    }

    /// The pre-block check: throttle below the soft floor, abort if still below the hard
    /// floor afterwards. Returns the last reading; whether a release happened can be seen
    /// from [`release_requests`](Self::release_requests).
    pub fn check(
        &mut self,
        budget: &MemoryBudget,
        buffers: &mut dyn Release,
    ) -> Result<u64, MemoryExhausted> {
        let available = self.available_bytes();
        if available >= budget.soft_floor_bytes {
            return Ok(available);
        }

        self.request_release(buffers);

        let available = self.available_bytes();
        if available < budget.hard_floor_bytes {
            return Err(MemoryExhausted {
                available,
                hard_floor: budget.hard_floor_bytes,
            });
        }

        Ok(available)
    }
}
