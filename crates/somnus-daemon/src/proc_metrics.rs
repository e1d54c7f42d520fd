//! Host metrics read from procfs

use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use somnus_monitor::{MetricsError, MetricsSample, MetricsSource};
use tracing::debug;

/// Aggregate CPU counters from the first line of `/proc/stat`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub busy: u64,
    pub total: u64,
}

impl CpuTimes {
    /// Busy percentage between `earlier` and `self`.
    pub fn usage_since(&self, earlier: &CpuTimes) -> f64 {
        let total = self.total.saturating_sub(earlier.total);
        if total == 0 {
            return 0.0;
        }
        let busy = self.busy.saturating_sub(earlier.busy);
        (busy as f64 / total as f64) * 100.0
    }
}

/// Parse the `cpu` summary line of `/proc/stat`.
///
/// Idle time is `idle + iowait`; every other column counts as busy.
pub fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let values: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map(|v| v.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    if values.len() < 4 {
        return None;
    }
    let total: u64 = values.iter().sum();
    let idle = values[3] + values.get(4).copied().unwrap_or(0);
    Some(CpuTimes {
        busy: total.saturating_sub(idle),
        total,
    })
}

/// Used memory percentage from `/proc/meminfo` (`MemTotal - MemAvailable`).
pub fn parse_memory_percent(meminfo: &str) -> Option<f64> {
    let field = |name: &str| {
        meminfo.lines().find_map(|line| {
            line.strip_prefix(name)
                .and_then(|rest| rest.split_whitespace().next())
                .and_then(|kb| kb.parse::<u64>().ok())
        })
    };
    let total = field("MemTotal:")?;
    let available = field("MemAvailable:")?;
    if total == 0 {
        return None;
    }
    Some((total.saturating_sub(available) as f64 / total as f64) * 100.0)
}

/// Metrics source backed by procfs. CPU usage is measured between samples;
/// the first sample reports the average since boot.
pub struct ProcMetricsSource {
    root: PathBuf,
    previous: Mutex<CpuTimes>,
}

impl ProcMetricsSource {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Read from an alternative procfs mount.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            previous: Mutex::new(CpuTimes::default()),
        }
    }

    async fn read(&self, name: &str) -> Result<String, MetricsError> {
        let path = self.root.join(name);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| MetricsError::Unavailable(format!("{}: {}", path.display(), e)))
    }
}

impl Default for ProcMetricsSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsSource for ProcMetricsSource {
    async fn sample(&self) -> Result<MetricsSample, MetricsError> {
        let stat = self.read("stat").await?;
        let meminfo = self.read("meminfo").await?;

        let now = parse_cpu_times(&stat)
            .ok_or_else(|| MetricsError::Unavailable("unparseable cpu line".to_string()))?;
        let memory_percent = parse_memory_percent(&meminfo)
            .ok_or_else(|| MetricsError::Unavailable("unparseable meminfo".to_string()))?;

        let cpu_percent = {
            let mut previous = self.previous.lock();
            let usage = now.usage_since(&previous);
            *previous = now;
            usage
        };

        debug!(cpu_percent, memory_percent, "Sampled procfs");
        Ok(MetricsSample::new(cpu_percent, memory_percent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT: &str = "cpu  100 0 100 700 100 0 0 0 0 0\ncpu0 50 0 50 350 50 0 0 0 0 0\nintr 1\n";
    const MEMINFO: &str = "MemTotal:       1000 kB\nMemFree:         100 kB\nMemAvailable:    250 kB\n";

    #[test]
    fn test_parse_cpu_times() {
        let times = parse_cpu_times(STAT).unwrap();
        assert_eq!(times.total, 1000);
        assert_eq!(times.busy, 200);
        assert!(parse_cpu_times("intr 1\n").is_none());
        assert!(parse_cpu_times("cpu  1 x 3 4\n").is_none());
    }

    #[test]
    fn test_usage_since() {
        let earlier = CpuTimes { busy: 200, total: 1000 };
        let later = CpuTimes { busy: 500, total: 1400 };
        assert_eq!(later.usage_since(&earlier), 75.0);
        assert_eq!(later.usage_since(&later), 0.0);
    }

    #[test]
    fn test_parse_memory_percent() {
        assert_eq!(parse_memory_percent(MEMINFO), Some(75.0));
        assert!(parse_memory_percent("MemTotal: 1000 kB\n").is_none());
    }

    #[tokio::test]
    async fn test_sample_from_fake_procfs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stat"), STAT).unwrap();
        std::fs::write(dir.path().join("meminfo"), MEMINFO).unwrap();

        let source = ProcMetricsSource::with_root(dir.path());
        let first = source.sample().await.unwrap();
        assert_eq!(first.cpu_percent, 20.0);
        assert_eq!(first.memory_percent, 75.0);

        std::fs::write(
            dir.path().join("stat"),
            "cpu  400 0 100 800 100 0 0 0 0 0\n",
        )
        .unwrap();
        let second = source.sample().await.unwrap();
        assert_eq!(second.cpu_percent, 75.0);
    }

    #[tokio::test]
    async fn test_missing_procfs_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let source = ProcMetricsSource::with_root(dir.path());
        assert!(matches!(
            source.sample().await,
            Err(MetricsError::Unavailable(_))
        ));
    }
}
