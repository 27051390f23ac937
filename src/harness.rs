//! Per-cycle resource counters for the UI probe: CPU time of this process
//! and its children, and host network counters, taken as before/after
//! snapshots around a reload cycle.

use crate::sampler::{MemoryAverages, MemorySampler};
use std::time::Duration;
use sysinfo::Networks;

/// Accumulated CPU seconds, as reported by `getrusage`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CpuTimes {
    pub user: f64,
    pub system: f64,
    pub children_user: f64,
    pub children_system: f64,
}

impl CpuTimes {
    #[cfg(unix)]
    pub fn now() -> Self {
        let (user, system) = rusage_seconds(libc::RUSAGE_SELF);
        let (children_user, children_system) = rusage_seconds(libc::RUSAGE_CHILDREN);
        Self {
            user,
            system,
            children_user,
            children_system,
        }
    }

    #[cfg(not(unix))]
    pub fn now() -> Self {
        Self::default()
    }

    pub fn delta_since(&self, earlier: &CpuTimes) -> CpuTimes {
        CpuTimes {
            user: self.user - earlier.user,
            system: self.system - earlier.system,
            children_user: self.children_user - earlier.children_user,
            children_system: self.children_system - earlier.children_system,
        }
    }
}

#[cfg(unix)]
fn rusage_seconds(who: libc::c_int) -> (f64, f64) {
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    // SAFETY: usage is a valid, writable rusage.
    if unsafe { libc::getrusage(who, &mut usage) } != 0 {
        return (0.0, 0.0);
    }
    let secs = |tv: libc::timeval| tv.tv_sec as f64 + tv.tv_usec as f64 / 1_000_000.0;
    (secs(usage.ru_utime), secs(usage.ru_stime))
}

/// Host-wide network counters summed over all interfaces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NetCounters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
}

impl NetCounters {
    pub fn now() -> Self {
        let networks = Networks::new_with_refreshed_list();
        networks
            .list()
            .values()
            .fold(Self::default(), |acc, data| Self {
                bytes_sent: acc.bytes_sent + data.total_transmitted(),
                bytes_recv: acc.bytes_recv + data.total_received(),
                packets_sent: acc.packets_sent + data.total_packets_transmitted(),
                packets_recv: acc.packets_recv + data.total_packets_received(),
            })
    }

    /// Counters can reset (interface restart); deltas saturate at zero.
    pub fn delta_since(&self, earlier: &NetCounters) -> NetCounters {
        NetCounters {
            bytes_sent: self.bytes_sent.saturating_sub(earlier.bytes_sent),
            bytes_recv: self.bytes_recv.saturating_sub(earlier.bytes_recv),
            packets_sent: self.packets_sent.saturating_sub(earlier.packets_sent),
            packets_recv: self.packets_recv.saturating_sub(earlier.packets_recv),
        }
    }
}

/// Resource usage attributed to one cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CycleUsage {
    pub cpu: CpuTimes,
    pub net: NetCounters,
    pub memory: MemoryAverages,
}

/// Open measurement around one cycle; finish it with [`CycleMeter::finish`].
pub struct CycleMeter {
    cpu: CpuTimes,
    net: NetCounters,
    sampler: MemorySampler,
}

impl CycleMeter {
    pub fn start(sample_interval: Duration) -> Self {
        Self {
            cpu: CpuTimes::now(),
            net: NetCounters::now(),
            sampler: MemorySampler::start(sample_interval),
        }
    }

    pub fn finish(self) -> CycleUsage {
        let samples = self.sampler.stop();
        CycleUsage {
            cpu: CpuTimes::now().delta_since(&self.cpu),
            net: NetCounters::now().delta_since(&self.net),
            memory: samples.averages(),
        }
    }
}

/// Run `f` inside a meter and return its result with the cycle's usage.
pub fn measure_cycle<T, E>(
    sample_interval: Duration,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<(T, CycleUsage), E> {
    let meter = CycleMeter::start(sample_interval);
    let result = f();
    let usage = meter.finish();
    result.map(|value| (value, usage))
}
