use once_cell::sync::Lazy;

/// Default bound on the local scheduler's app record cache, used when a
/// caller constructs `LocalScheduler::new()` without specifying one.
/// Override with `RUNDRIVE_CACHE_SIZE`.
pub static DEFAULT_CACHE_SIZE: Lazy<usize> = Lazy::new(|| {
    std::env::var("RUNDRIVE_CACHE_SIZE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(100)
});

/// Directory under which per-replica stdout/stderr log files are written.
/// Override with `RUNDRIVE_LOG_DIR`.
pub static LOG_DIR: Lazy<String> =
    Lazy::new(|| std::env::var("RUNDRIVE_LOG_DIR").unwrap_or_else(|_| "/tmp/rundrive/logs".into()));

/// Interval `Scheduler::wait` polls `describe` at while a submitted app is
/// not yet terminal. Override with `RUNDRIVE_POLL_INTERVAL_MS`.
pub static POLL_INTERVAL_MS: Lazy<u64> = Lazy::new(|| {
    std::env::var("RUNDRIVE_POLL_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(100)
});

/// Grace period between sending SIGTERM and escalating to SIGKILL when
/// cancelling a replica process. Override with `RUNDRIVE_CANCEL_GRACE_MS`.
pub static CANCEL_GRACE_MS: Lazy<u64> = Lazy::new(|| {
    std::env::var("RUNDRIVE_CANCEL_GRACE_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(2_000)
});

/// Name of the launcher module substituted into `ElasticRole` args.
pub const ELASTIC_LAUNCHER_MODULE: &str = "rundrive.launcher";
