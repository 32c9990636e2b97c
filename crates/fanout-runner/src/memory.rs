//! Process memory probe backed by `sysinfo`.

use sysinfo::{Pid, ProcessesToUpdate, System};

/// Memory held by the current process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    /// Resident set size in bytes.
    pub rss_bytes: u64,
    /// Virtual memory size in bytes.
    pub virtual_bytes: u64,
}

/// Current memory usage, or `None` where the platform is unsupported.
pub fn current() -> Option<MemoryUsage> {
    if !sysinfo::IS_SUPPORTED_SYSTEM {
        return None;
    }
    let pid = sysinfo::get_current_pid().ok()?;
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    usage_of(&sys, pid)
}

fn usage_of(sys: &System, pid: Pid) -> Option<MemoryUsage> {
    let process = sys.process(pid)?;
    Some(MemoryUsage {
        rss_bytes: process.memory(),
        virtual_bytes: process.virtual_memory(),
    })
}

/// Human-readable byte count (binary units).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_reports_resident_memory() {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            assert!(current().is_none());
            return;
        }
        let usage = current().unwrap();
        assert!(usage.rss_bytes > 0);
    }

    #[test]
    fn test_unknown_process_has_no_usage() {
        let sys = System::new();
        assert!(usage_of(&sys, Pid::from_u32(u32::MAX)).is_none());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(4096 * 1024), "4.0 MiB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }
}
