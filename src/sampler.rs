//! Background sampling of this process's memory footprint.

use crate::dataset::MIB;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// One reading, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemoryReading {
    pub rss: u64,
    pub virt: u64,
    pub shared: u64,
}

/// Parallel sequences of readings collected by a sampler run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySamples {
    pub rss: Vec<u64>,
    pub virt: Vec<u64>,
    pub shared: Vec<u64>,
}

/// Per-run means in MiB.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemoryAverages {
    pub rss_mib: f64,
    pub vms_mib: f64,
    pub shared_mib: f64,
}

fn mean_mib(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let total: f64 = values.iter().map(|&v| v as f64).sum();
    total / values.len() as f64 / MIB
}

impl MemorySamples {
    pub fn push(&mut self, reading: MemoryReading) {
        self.rss.push(reading.rss);
        self.virt.push(reading.virt);
        self.shared.push(reading.shared);
    }

    pub fn len(&self) -> usize {
        self.rss.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rss.is_empty()
    }

    pub fn averages(&self) -> MemoryAverages {
        MemoryAverages {
            rss_mib: mean_mib(&self.rss),
            vms_mib: mean_mib(&self.virt),
            shared_mib: mean_mib(&self.shared),
        }
    }
}

struct ProcessMemory {
    pid: Pid,
    system: System,
}

impl ProcessMemory {
    fn current() -> Self {
        let pid = Pid::from_u32(std::process::id());
        let system = System::new_with_specifics(
            RefreshKind::new().with_processes(ProcessRefreshKind::new().with_memory()),
        );
        Self { pid, system }
    }

    fn read(&mut self) -> MemoryReading {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::new().with_memory(),
        );

        match self.system.process(self.pid) {
            Some(process) => MemoryReading {
                rss: process.memory(),
                virt: process.virtual_memory(),
                shared: shared_memory_bytes(),
            },
            None => MemoryReading::default(),
        }
    }
}

/// Shared (file-backed resident) pages from `/proc/self/statm`.
#[cfg(target_os = "linux")]
fn shared_memory_bytes() -> u64 {
    let pages = std::fs::read_to_string("/proc/self/statm")
        .ok()
        .and_then(|s| s.split_whitespace().nth(2).and_then(|v| v.parse::<u64>().ok()))
        .unwrap_or(0);
    // SAFETY: sysconf has no preconditions.
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    pages * u64::try_from(page_size).unwrap_or(4096)
}

#[cfg(not(target_os = "linux"))]
fn shared_memory_bytes() -> u64 {
    0
}

/// Handle to a sampling thread. Samples once on start, then every interval
/// until [`MemorySampler::stop`] is called.
pub struct MemorySampler {
    stop_tx: Sender<()>,
    handle: JoinHandle<MemorySamples>,
}

impl MemorySampler {
    pub fn start(interval: Duration) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            let mut memory = ProcessMemory::current();
            let mut samples = MemorySamples::default();
            loop {
                samples.push(memory.read());
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    // Stop signal or the handle was dropped.
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            samples
        });

        Self { stop_tx, handle }
    }

    /// Signal the thread, wait for it and return everything it collected.
    pub fn stop(self) -> MemorySamples {
        let _ = self.stop_tx.send(());
        match self.handle.join() {
            Ok(samples) => samples,
            Err(_) => {
                tracing::warn!("memory sampler thread panicked; no samples recorded");
                MemorySamples::default()
            }
        }
    }
}
