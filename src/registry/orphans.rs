//! Startup scan for hosted-executable processes nobody is tracking
//!
//! Such processes survive a crash of a previous run. They cannot be attached
//! to a new terminal, so they are only reported; killing them is left to the
//! operator.

use std::collections::{HashMap, HashSet};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

/// An untracked process that looks like the hosted executable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanProcess {
    /// OS process id
    pub pid: u32,
    /// Process name
    pub name: String,
    /// Full command line
    pub command_line: String,
    /// Working directory, when readable
    pub working_directory: Option<PathBuf>,
    /// Start time, when known
    pub started_at: Option<DateTime<Utc>>,
}

/// Find processes matching `executable` that are neither in `tracked` nor
/// descended from a tracked process
#[must_use]
pub fn scan_for_orphans(executable: &str, tracked: &HashSet<u32>) -> Vec<OrphanProcess> {
    let target = executable_stem(Path::new(executable));
    if target.is_empty() {
        return Vec::new();
    }

    let refresh = ProcessRefreshKind::nothing()
        .with_cmd(UpdateKind::Always)
        .with_exe(UpdateKind::Always)
        .with_cwd(UpdateKind::Always);
    let mut system = System::new();
    system.refresh_processes_specifics(ProcessesToUpdate::All, true, refresh);

    let parents: HashMap<u32, u32> = system
        .processes()
        .iter()
        .filter_map(|(pid, process)| process.parent().map(|p| (pid.as_u32(), p.as_u32())))
        .collect();
    let own_pid = std::process::id();

    let mut orphans: Vec<OrphanProcess> = system
        .processes()
        .iter()
        .filter(|(pid, _)| pid.as_u32() != own_pid)
        .filter(|(_, process)| {
            let by_name = executable_stem(Path::new(process.name())) == target;
            let by_exe = process.exe().is_some_and(|exe| executable_stem(exe) == target);
            let by_argv0 = process
                .cmd()
                .first()
                .is_some_and(|arg| executable_stem(Path::new(arg)) == target);
            by_name || by_exe || by_argv0
        })
        .filter(|(pid, _)| !is_tracked(pid.as_u32(), tracked, &parents))
        .map(|(pid, process)| describe(*pid, process))
        .collect();

    orphans.sort_by_key(|orphan| orphan.pid);
    if !orphans.is_empty() {
        log::warn!(
            "Found {} untracked {executable} process(es): {:?}",
            orphans.len(),
            orphans.iter().map(|o| o.pid).collect::<Vec<_>>()
        );
    }
    orphans
}

/// True if `pid` or one of its ancestors is tracked
fn is_tracked(pid: u32, tracked: &HashSet<u32>, parents: &HashMap<u32, u32>) -> bool {
    let mut current = pid;
    // Bounded walk; parent tables can contain cycles after pid reuse
    for _ in 0..64 {
        if tracked.contains(&current) {
            return true;
        }
        match parents.get(&current) {
            Some(&parent) if parent != current => current = parent,
            _ => return false,
        }
    }
    false
}

fn describe(pid: Pid, process: &sysinfo::Process) -> OrphanProcess {
    let command_line = process
        .cmd()
        .iter()
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ");
    let started_at = match process.start_time() {
        0 => None,
        secs => i64::try_from(secs)
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
    };
    OrphanProcess {
        pid: pid.as_u32(),
        name: process.name().to_string_lossy().into_owned(),
        command_line,
        working_directory: process.cwd().map(Path::to_path_buf),
        started_at,
    }
}

/// File name without extension, lowercased (`/usr/bin/Claude.exe` -> `claude`)
fn executable_stem(path: &Path) -> String {
    path.file_stem()
        .or_else(|| Some(path.as_os_str()).filter(|s| !s.is_empty()))
        .map(OsStr::to_string_lossy)
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_ignores_directory_and_extension() {
        assert_eq!(executable_stem(Path::new("/usr/local/bin/claude")), "claude");
        assert_eq!(executable_stem(Path::new("C:/tools/Claude.exe")), "claude");
        assert_eq!(executable_stem(Path::new("")), "");
    }

    #[test]
    fn descendants_of_tracked_processes_are_tracked() {
        let tracked = HashSet::from([10]);
        let parents = HashMap::from([(30, 20), (20, 10), (10, 1), (40, 1)]);
        assert!(is_tracked(30, &tracked, &parents));
        assert!(!is_tracked(40, &tracked, &parents));
    }

    #[test]
    fn scan_never_reports_itself() {
        let own = std::env::current_exe().unwrap();
        let orphans = scan_for_orphans(&own.to_string_lossy(), &HashSet::new());
        assert!(orphans.iter().all(|o| o.pid != std::process::id()));
    }
}
