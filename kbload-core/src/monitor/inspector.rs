use sysinfo::{MemoryRefreshKind, Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};

use super::ProcessSample;

/// Source of per-process readings.
///
/// Returning `None` means the process could not be read (gone, permission denied).
pub trait ProcessInspector: Send + 'static {
    fn sample(&mut self, pid: u32) -> Option<ProcessSample>;

    /// A new inspector of the same kind with its own refresh state.
    fn fork(&self) -> Box<dyn ProcessInspector>;
}

/// [`ProcessInspector`] backed by `sysinfo`, plus `/proc/<pid>/fd` on Linux.
pub struct SysinfoInspector {
    sys: System,
}

impl SysinfoInspector {
    pub fn new() -> Self {
        let refresh = RefreshKind::nothing()
            .with_processes(ProcessRefreshKind::everything())
            .with_memory(MemoryRefreshKind::nothing().with_ram());
        Self {
            sys: System::new_with_specifics(refresh),
        }
    }
}

impl Default for SysinfoInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessInspector for SysinfoInspector {
    fn fork(&self) -> Box<dyn ProcessInspector> {
        Box::new(Self::new())
    }

    fn sample(&mut self, pid: u32) -> Option<ProcessSample> {
        let spid = Pid::from_u32(pid);
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[spid]),
            true,
            ProcessRefreshKind::everything(),
        );
        self.sys
            .refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());

        let process = self.sys.process(spid)?;
        // sysinfo reports memory in bytes; CPU is relative to the previous refresh, so the
        // first reading for a pid is 0.
        let rss = process.memory();
        let total = self.sys.total_memory();
        let disk = process.disk_usage();
        let fds = fd_table(pid);

        Some(ProcessSample {
            cpu_percent: Some(f64::from(process.cpu_usage())),
            memory_percent: (total > 0).then(|| rss as f64 / total as f64 * 100.0),
            rss_bytes: Some(rss),
            vms_bytes: Some(process.virtual_memory()),
            threads: process.tasks().map(|t| t.len() as u64),
            open_files: fds.map(|t| t.files),
            connections: fds.map(|t| t.sockets),
            io_read_bytes: Some(disk.total_read_bytes),
            io_write_bytes: Some(disk.total_written_bytes),
            fds: fds.map(|t| t.total),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct FdTable {
    total: u64,
    files: u64,
    sockets: u64,
}

#[cfg(target_os = "linux")]
fn fd_table(pid: u32) -> Option<FdTable> {
    let dir = std::fs::read_dir(format!("/proc/{pid}/fd")).ok()?;
    let mut table = FdTable::default();
    for entry in dir.flatten() {
        table.total += 1;
        let Ok(target) = std::fs::read_link(entry.path()) else {
            continue;
        };
        if target.to_string_lossy().starts_with("socket:") {
            table.sockets += 1;
        } else if target.is_absolute()
            && std::fs::metadata(&target).is_ok_and(|m| m.is_file())
        {
            table.files += 1;
        }
    }
    Some(table)
}

#[cfg(not(target_os = "linux"))]
fn fd_table(_pid: u32) -> Option<FdTable> {
    None
}
