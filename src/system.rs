//! Host resource probes: memory, CPU time, core count

/// Assumed available memory when the host cannot be queried, in MB
const FALLBACK_MEMORY_MB: u64 = 2048;

/// Available system memory in bytes
pub fn available_memory_bytes() -> u64 {
    available_memory_mb() * 1024 * 1024
}

/// Available system memory in MB, from `MemAvailable` where the host exposes it
pub fn available_memory_mb() -> u64 {
    #[cfg(target_os = "linux")]
    {
        let meminfo = std::fs::read_to_string("/proc/meminfo").ok();
        if let Some(mb) = meminfo.as_deref().and_then(mem_available_mb) {
            return mb;
        }
    }
    FALLBACK_MEMORY_MB
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn mem_available_mb(meminfo: &str) -> Option<u64> {
    meminfo
        .lines()
        .find_map(|line| line.strip_prefix("MemAvailable:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb / 1024)
}

/// Logical cores
pub fn cpu_count() -> usize {
    num_cpus::get()
}

/// CPU time consumed by this process, in seconds
#[cfg(unix)]
pub fn process_cpu_time() -> f64 {
    // SAFETY: timespec is plain old data; zeroed is a valid initial value.
    let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
    // SAFETY: `ts` is a valid, writable timespec for the duration of the call.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_PROCESS_CPUTIME_ID, &mut ts) };
    if rc != 0 {
        return 0.0;
    }
    ts.tv_sec as f64 + ts.tv_nsec as f64 / 1e9
}

#[cfg(not(unix))]
pub fn process_cpu_time() -> f64 {
    0.0
}

/// Peak resident set size of this process, in MB
#[cfg(unix)]
pub fn peak_rss_mb() -> f64 {
    // SAFETY: rusage is plain old data; zeroed is a valid initial value.
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    // SAFETY: `usage` is a valid, writable rusage for the duration of the call.
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return 0.0;
    }
    // Linux reports kilobytes, macOS bytes
    #[cfg(target_os = "macos")]
    {
        usage.ru_maxrss as f64 / (1024.0 * 1024.0)
    }
    #[cfg(not(target_os = "macos"))]
    {
        usage.ru_maxrss as f64 / 1024.0
    }
}

#[cfg(not(unix))]
pub fn peak_rss_mb() -> f64 {
    0.0
}
