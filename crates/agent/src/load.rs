// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host load sampling for heartbeats.
//!
//! Reads `/proc/loadavg` and `/proc/meminfo` on Linux. Other platforms report
//! no samples, which the hub treats as unknown.

/// One load sample, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadSample {
    pub cpu_usage_pct: Option<f64>,
    pub mem_usage_pct: Option<f64>,
}

/// One-minute load average as a share of available CPUs, capped at 100.
pub fn parse_loadavg(text: &str, cpus: u32) -> Option<f64> {
    let load: f64 = text.split_whitespace().next()?.parse().ok()?;
    if cpus == 0 || !load.is_finite() || load < 0.0 {
        return None;
    }
    Some((load / f64::from(cpus) * 100.0).min(100.0))
}

/// `(total_kb, available_kb)` from `/proc/meminfo` content.
fn meminfo_kb(text: &str) -> Option<(u64, u64)> {
    let field = |name: &str| {
        text.lines()
            .find_map(|line| line.strip_prefix(name))
            .and_then(|rest| rest.trim_start_matches(':').split_whitespace().next())
            .and_then(|v| v.parse::<u64>().ok())
    };
    let total = field("MemTotal")?;
    let available = field("MemAvailable").or_else(|| field("MemFree"))?;
    (total > 0).then_some((total, available.min(total)))
}

/// Memory in use as a percentage of total.
pub fn parse_meminfo(text: &str) -> Option<f64> {
    let (total, available) = meminfo_kb(text)?;
    Some((total - available) as f64 / total as f64 * 100.0)
}

pub fn parse_total_gb(text: &str) -> Option<f64> {
    let (total, _) = meminfo_kb(text)?;
    Some(total as f64 / (1024.0 * 1024.0))
}

fn read_proc(name: &str) -> Option<String> {
    if cfg!(target_os = "linux") {
        std::fs::read_to_string(format!("/proc/{name}")).ok()
    } else {
        None
    }
}

pub fn total_memory_gb() -> Option<f64> {
    parse_total_gb(&read_proc("meminfo")?)
}

pub fn sample(cpus: u32) -> LoadSample {
    LoadSample {
        cpu_usage_pct: read_proc("loadavg").and_then(|t| parse_loadavg(&t, cpus)),
        mem_usage_pct: read_proc("meminfo").and_then(|t| parse_meminfo(&t)),
    }
}

#[cfg(test)]
#[path = "load_tests.rs"]
mod tests;
