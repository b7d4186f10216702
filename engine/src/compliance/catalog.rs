//! Built-in hardening control catalog
//!
//! Each control binds one shell verification command to an expected
//! outcome. Commands are written so that exit 0 means the control holds;
//! the runner classifies everything else.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkLevel {
    Level1,
    Level2,
}

/// One named hardening control
#[derive(Debug, Clone)]
pub struct ControlSpec {
    pub id: &'static str,
    pub title: &'static str,
    pub command: &'static str,
    pub expected: &'static str,
    pub level: BenchmarkLevel,
}

/// The fixed control catalog. Order is the reporting order.
pub fn catalog() -> &'static [ControlSpec] {
    &CONTROLS
}

/// Select the catalog subset for a benchmark type. Unknown types fall back
/// to the full catalog rather than erroring.
pub fn select(benchmark_type: &str) -> Vec<&'static ControlSpec> {
    let level = match benchmark_type.to_lowercase().as_str() {
        "level1" => Some(BenchmarkLevel::Level1),
        "level2" => Some(BenchmarkLevel::Level2),
        "all" => None,
        other => {
            tracing::warn!("Unknown benchmark type '{other}', running the full catalog");
            None
        }
    };

    CONTROLS
        .iter()
        .filter(|c| level.map_or(true, |l| c.level == l))
        .collect()
}

static CONTROLS: [ControlSpec; 12] = [
    ControlSpec {
        id: "SM-1.1",
        title: "Core dumps are restricted",
        command: "grep -Eqs '^[[:space:]]*\\*[[:space:]]+hard[[:space:]]+core[[:space:]]+0' /etc/security/limits.conf /etc/security/limits.d/*.conf",
        expected: "hard core 0 limit configured",
        level: BenchmarkLevel::Level1,
    },
    ControlSpec {
        id: "SM-1.2",
        title: "Address space layout randomization is enabled",
        command: "[ \"$(sysctl -n kernel.randomize_va_space 2>/dev/null)\" = \"2\" ]",
        expected: "kernel.randomize_va_space = 2",
        level: BenchmarkLevel::Level1,
    },
    ControlSpec {
        id: "SM-1.3",
        title: "Prelink is not installed",
        command: "! command -v prelink >/dev/null 2>&1",
        expected: "prelink binary absent",
        level: BenchmarkLevel::Level1,
    },
    ControlSpec {
        id: "SM-1.4",
        title: "Auditing is enabled at boot",
        command: "grep -qw 'audit=1' /proc/cmdline",
        expected: "audit=1 on the kernel command line",
        level: BenchmarkLevel::Level1,
    },
    ControlSpec {
        id: "SM-1.5",
        title: "/etc/passwd has safe permissions",
        command: "[ \"$(stat -c %a /etc/passwd 2>/dev/null)\" = \"644\" ]",
        expected: "mode 644",
        level: BenchmarkLevel::Level1,
    },
    ControlSpec {
        id: "SM-1.6",
        title: "/etc/shadow is not world readable",
        command: "[ \"$(stat -c %a /etc/shadow 2>/dev/null || echo 777)\" -le 640 ]",
        expected: "mode 640 or tighter",
        level: BenchmarkLevel::Level1,
    },
    ControlSpec {
        id: "SM-1.7",
        title: "SSH root login is disabled",
        command: "grep -Eiqs '^[[:space:]]*PermitRootLogin[[:space:]]+no' /etc/ssh/sshd_config",
        expected: "PermitRootLogin no",
        level: BenchmarkLevel::Level1,
    },
    ControlSpec {
        id: "SM-1.8",
        title: "IP forwarding is disabled",
        command: "[ \"$(sysctl -n net.ipv4.ip_forward 2>/dev/null)\" = \"0\" ]",
        expected: "net.ipv4.ip_forward = 0",
        level: BenchmarkLevel::Level1,
    },
    ControlSpec {
        id: "SM-2.1",
        title: "Crontab is locked down",
        command: "[ \"$(stat -c %a /etc/crontab 2>/dev/null)\" = \"600\" ]",
        expected: "mode 600",
        level: BenchmarkLevel::Level2,
    },
    ControlSpec {
        id: "SM-2.2",
        title: "Kernel pointer leaks are restricted",
        command: "[ \"$(sysctl -n kernel.kptr_restrict 2>/dev/null || echo 0)\" -ge 1 ]",
        expected: "kernel.kptr_restrict >= 1",
        level: BenchmarkLevel::Level2,
    },
    ControlSpec {
        id: "SM-2.3",
        title: "Unprivileged BPF is disabled",
        command: "[ \"$(sysctl -n kernel.unprivileged_bpf_disabled 2>/dev/null || echo 0)\" -ge 1 ]",
        expected: "kernel.unprivileged_bpf_disabled >= 1",
        level: BenchmarkLevel::Level2,
    },
    ControlSpec {
        id: "SM-2.4",
        title: "Kernel log access is restricted",
        command: "[ \"$(sysctl -n kernel.dmesg_restrict 2>/dev/null)\" = \"1\" ]",
        expected: "kernel.dmesg_restrict = 1",
        level: BenchmarkLevel::Level2,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_ids_are_unique() {
        let ids: HashSet<&str> = catalog().iter().map(|c| c.id).collect();
        assert_eq!(ids.len(), catalog().len());
    }

    #[test]
    fn test_catalog_covers_both_levels() {
        assert!(catalog().iter().any(|c| c.level == BenchmarkLevel::Level1));
        assert!(catalog().iter().any(|c| c.level == BenchmarkLevel::Level2));
    }

    #[test]
    fn test_select_level1_subset() {
        let subset = select("level1");
        assert!(!subset.is_empty());
        assert!(subset.iter().all(|c| c.level == BenchmarkLevel::Level1));
        assert!(subset.len() < catalog().len());
    }

    #[test]
    fn test_select_is_case_insensitive() {
        assert_eq!(select("LEVEL2").len(), select("level2").len());
    }

    #[test]
    fn test_select_unknown_type_runs_everything() {
        assert_eq!(select("bogus").len(), catalog().len());
        assert_eq!(select("all").len(), catalog().len());
    }
}
