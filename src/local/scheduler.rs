use super::cache::{AppCache, AppRecord};
use super::macros_sub::substitute;
use super::process::{spawn_replica, ReplicaProc};
use crate::application::Application;
use crate::config;
use crate::dryrun::AppDryRunInfo;
use crate::error::{DriverError, DriverResult};
use crate::image_fetcher::{ImageFetcher, LocalDirectoryImageFetcher};
use crate::runopts::{RunConfig, RunOpts};
use crate::scheduler::Scheduler;
use crate::status::{AppState, DescribeAppResponse, ReplicaStatus, RoleStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::future::join_all;
use regex::Regex;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Schedules applications as plain OS processes on the local machine,
/// mirroring the source driver's `LocalScheduler` (spec §4.6). Every
/// replica of every role is a real child process; app state is derived by
/// reconciling their exit statuses rather than tracked independently.
pub struct LocalScheduler {
    cache: AppCache,
    image_fetcher: Arc<dyn ImageFetcher>,
    log_dir: PathBuf,
    cancel_grace: Duration,
    id_counters: DashMap<String, AtomicU64>,
}

impl LocalScheduler {
    pub fn new() -> DriverResult<Self> {
        Self::with_cache_size(*config::DEFAULT_CACHE_SIZE as i64)
    }

    pub fn with_cache_size(cache_size: i64) -> DriverResult<Self> {
        Ok(Self {
            cache: AppCache::new(cache_size)?,
            image_fetcher: Arc::new(LocalDirectoryImageFetcher),
            log_dir: PathBuf::from(config::LOG_DIR.as_str()),
            cancel_grace: Duration::from_millis(*config::CANCEL_GRACE_MS),
            id_counters: DashMap::new(),
        })
    }

    /// Swaps in a caller-supplied image fetcher, for tests that don't want
    /// to exercise the filesystem-backed default.
    pub fn with_image_fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.image_fetcher = fetcher;
        self
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    /// Deterministic, monotonically increasing id per application name:
    /// `"{name}_0"`, `"{name}_1"`, ...
    fn make_unique_id(&self, name: &str) -> String {
        let counter = self
            .id_counters
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0));
        let n = counter.fetch_add(1, Ordering::SeqCst);
        format!("{name}_{n}")
    }

    /// Rolls up each replica's OS exit status into the app's overall state
    /// (spec §4.6): `Cancelled` if the app was cancelled, else `Succeeded`
    /// only if every replica exited `0`, `Failed` if any replica exited
    /// non-zero, else `Running`.
    ///
    /// `cancelled` is checked before any replica is polled: a SIGTERM'd
    /// replica reports a non-zero/signal exit code like a genuine failure,
    /// and during `_cancel_existing`'s take-replicas-out window the record
    /// briefly holds no replicas at all (which would otherwise reconcile
    /// vacuously to `Succeeded`).
    fn reconcile(record: &mut AppRecord) -> AppState {
        if record.cancelled {
            return AppState::Cancelled;
        }
        let mut any_failed = false;
        let mut all_exited = true;
        for replica in record.replicas.iter_mut() {
            match replica.poll_exit() {
                Ok(Some(code)) => {
                    if code != 0 {
                        any_failed = true;
                    }
                }
                Ok(None) => all_exited = false,
                Err(_) => all_exited = false,
            }
        }
        if any_failed {
            AppState::Failed
        } else if all_exited {
            AppState::Succeeded
        } else {
            AppState::Running
        }
    }

    fn role_status(role_name: &str, replicas: &[ReplicaProc]) -> RoleStatus {
        let statuses = replicas
            .iter()
            .filter(|r| r.role == role_name)
            .map(|r| ReplicaStatus {
                id: r.replica_id,
                state: match r.exit_code {
                    Some(0) => AppState::Succeeded,
                    Some(_) => AppState::Failed,
                    None => AppState::Running,
                },
                exit_code: r.exit_code,
            })
            .collect();
        RoleStatus {
            role: role_name.to_string(),
            replicas: statuses,
        }
    }
}

impl Default for LocalScheduler {
    fn default() -> Self {
        Self::new().expect("default cache size must be valid")
    }
}

#[async_trait]
impl Scheduler for LocalScheduler {
    async fn _submit(&self, app: &Application, cfg: &RunConfig) -> DriverResult<String> {
        self.cache.ensure_capacity(Self::reconcile)?;

        let app_id = self.make_unique_id(&app.name);
        let mut image_roots: HashMap<String, String> = HashMap::new();
        let mut fetched: HashMap<String, String> = HashMap::new();
        let mut replicas = Vec::new();

        for role in &app.roles {
            let container = role.container.as_ref().ok_or_else(|| {
                DriverError::ValueError(format!("role `{}` has no container", role.name))
            })?;
            let entrypoint = role.entrypoint.as_deref().ok_or_else(|| {
                DriverError::ValueError(format!("role `{}` has no entrypoint", role.name))
            })?;

            let image_root = match fetched.get(&container.image) {
                Some(root) => root.clone(),
                None => {
                    let root = self.image_fetcher.fetch(&container.image)?;
                    fetched.insert(container.image.clone(), root.clone());
                    root
                }
            };
            image_roots.insert(role.name.clone(), image_root.clone());

            for replica_id in 0..role.num_replicas as usize {
                let replica_id_str = replica_id.to_string();
                let sub = |v: &str| substitute(v, &image_root, &app_id, &replica_id_str);
                let resolved_entrypoint = sub(entrypoint);
                let resolved_args: Vec<String> = role.args.iter().map(|a| sub(a)).collect();
                let resolved_env: HashMap<String, String> = role
                    .env
                    .iter()
                    .map(|(k, v)| (k.clone(), sub(v)))
                    .collect();
                let log_path = self
                    .log_dir
                    .join(&app_id)
                    .join(format!("{}_{}.log", role.name, replica_id));

                let proc = spawn_replica(
                    &role.name,
                    replica_id,
                    &resolved_entrypoint,
                    &resolved_args,
                    &resolved_env,
                    &image_root,
                    log_path,
                )?;
                replicas.push(proc);
            }
        }

        let record = AppRecord {
            app: app.clone(),
            cfg: cfg.clone(),
            image_roots,
            replicas,
            cancelled: false,
            started_at: Utc::now(),
        };
        self.cache.insert(app_id.clone(), record);
        Ok(app_id)
    }

    async fn _submit_dryrun(
        &self,
        app: &Application,
        _cfg: &RunConfig,
    ) -> DriverResult<AppDryRunInfo<serde_json::Value>> {
        let mut fetched: HashMap<String, String> = HashMap::new();
        let mut roles_out = Vec::new();

        for role in &app.roles {
            let container = role.container.as_ref().ok_or_else(|| {
                DriverError::ValueError(format!("role `{}` has no container", role.name))
            })?;
            let entrypoint = role.entrypoint.as_deref().ok_or_else(|| {
                DriverError::ValueError(format!("role `{}` has no entrypoint", role.name))
            })?;
            let image_root = match fetched.get(&container.image) {
                Some(root) => root.clone(),
                None => {
                    let root = self.image_fetcher.fetch(&container.image)?;
                    fetched.insert(container.image.clone(), root.clone());
                    root
                }
            };

            let mut replicas_out = Vec::new();
            for replica_id in 0..role.num_replicas as usize {
                let replica_id_str = replica_id.to_string();
                let sub = |v: &str| substitute(v, &image_root, "", &replica_id_str);
                let mut args_out = vec![sub(entrypoint)];
                args_out.extend(role.args.iter().map(|a| sub(a)));
                let env_out: serde_json::Map<String, serde_json::Value> = role
                    .env
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(sub(v))))
                    .collect();
                replicas_out.push(serde_json::json!({ "args": args_out, "env": env_out }));
            }

            let mut role_map = serde_json::Map::new();
            role_map.insert(role.name.clone(), serde_json::Value::Array(replicas_out));
            roles_out.push(serde_json::Value::Object(role_map));
        }

        let request = serde_json::Value::Array(roles_out);
        Ok(AppDryRunInfo::new(request, |v: &serde_json::Value| {
            serde_json::to_string_pretty(v).unwrap_or_default()
        }))
    }

    async fn describe(&self, app_id: &str) -> DriverResult<Option<DescribeAppResponse>> {
        Ok(self.cache.with_record_mut(app_id, |record| {
            let state = Self::reconcile(record);
            let roles = record
                .app
                .roles
                .iter()
                .map(|r| Self::role_status(&r.name, &record.replicas))
                .collect::<Vec<_>>();
            DescribeAppResponse {
                app_id: app_id.to_string(),
                state,
                name: record.app.name.clone(),
                roles: record.app.roles.clone(),
                num_restarts: 0,
                msg: roles
                    .iter()
                    .map(|r| r.role.clone())
                    .collect::<Vec<_>>()
                    .join(","),
                ui_url: None,
            }
        }))
    }

    async fn _cancel_existing(&self, app_id: &str) -> DriverResult<()> {
        let Some(mut replicas) = self.cache.take_for_cancel(app_id) else {
            return Ok(());
        };
        for replica in replicas.iter_mut() {
            let _ = replica.poll_exit();
        }
        let grace = self.cancel_grace;
        join_all(
            replicas
                .iter_mut()
                .filter(|r| r.exit_code.is_none())
                .map(|r| r.cancel(grace)),
        )
        .await;
        self.cache.restore_replicas(app_id, replicas);
        Ok(())
    }

    fn log_iter(
        &self,
        app_id: &str,
        role_name: &str,
        k: usize,
        regex: Option<&str>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> DriverResult<Box<dyn Iterator<Item = String> + Send>> {
        let log_path = self
            .cache
            .with_record_mut(app_id, |record| {
                record
                    .replicas
                    .iter()
                    .find(|r| r.role == role_name && r.replica_id == k)
                    .map(|r| r.log_path.clone())
            })
            .flatten();

        let Some(log_path) = log_path else {
            return Ok(Box::new(std::iter::empty()));
        };
        if !log_path.exists() {
            return Ok(Box::new(std::iter::empty()));
        }

        let pattern = match regex {
            Some(p) => Some(Regex::new(p).map_err(|e| DriverError::ValueError(e.to_string()))?),
            None => None,
        };

        let file = std::fs::File::open(&log_path)?;
        let reader = std::io::BufReader::new(file);
        let lines: Vec<String> = reader
            .lines()
            .map_while(Result::ok)
            .filter_map(|raw| {
                let (ts, text) = raw.split_once('\t')?;
                let ts: DateTime<Utc> = ts.parse().ok()?;
                if let Some(since) = since {
                    if ts < since {
                        return None;
                    }
                }
                if let Some(until) = until {
                    if ts > until {
                        return None;
                    }
                }
                if let Some(pattern) = &pattern {
                    if !pattern.is_match(text) {
                        return None;
                    }
                }
                Some(text.to_string())
            })
            .collect();
        Ok(Box::new(lines.into_iter()))
    }

    fn run_opts(&self) -> RunOpts {
        RunOpts::new()
    }

    async fn list(&self) -> DriverResult<Vec<String>> {
        Ok(self.cache.keys())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Container;
    use crate::handle::make;
    use crate::resources::Resources;
    use crate::role::Role;
    use std::os::unix::fs::PermissionsExt;

    fn write_script(dir: &std::path::Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path.to_str().unwrap().to_string()
    }

    fn touch_app(dir: &std::path::Path, replicas: i64) -> Application {
        let script = write_script(dir, "touch.sh", "#!/bin/sh\necho hello\n");
        let mut container = Container::new(dir.to_str().unwrap());
        container.require(Resources::new(1, 0, 500));
        let role = Role::new("touch")
            .runs(script, Vec::<String>::new(), Vec::<(String, String)>::new())
            .on(container)
            .replicas(replicas);
        Application::new("touch_app").of([role])
    }

    #[tokio::test]
    async fn submit_spawns_a_process_per_replica_and_describe_reports_success() {
        let dir = tempfile::tempdir().unwrap();
        let app = touch_app(dir.path(), 2);
        let scheduler = LocalScheduler::with_cache_size(10)
            .unwrap()
            .with_log_dir(dir.path().join("logs"));

        let app_id = scheduler._submit(&app, &RunConfig::new()).await.unwrap();
        assert!(app_id.starts_with("touch_app_"));

        for _ in 0..50 {
            let status = scheduler.describe(&app_id).await.unwrap().unwrap();
            if status.state.is_terminal() {
                assert_eq!(status.state, AppState::Succeeded);
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("app did not reach a terminal state in time");
    }

    #[tokio::test]
    async fn submit_dryrun_renders_expanded_args_without_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let mut container = Container::new(dir.path().to_str().unwrap());
        container.require(Resources::new(1, 0, 500));
        let role = Role::new("trainer")
            .runs(
                "master.par",
                ["arg1".to_string()],
                [("ENV_VAR_1", "VAL1")],
            )
            .on(container)
            .replicas(1);
        let app = Application::new("dryrun_app").of([role]);
        let scheduler = LocalScheduler::with_cache_size(10).unwrap();

        let info = scheduler
            ._submit_dryrun(&app, &RunConfig::new())
            .await
            .unwrap();
        let trainer_replicas = info.request[0]["trainer"].as_array().unwrap();
        assert_eq!(trainer_replicas[0]["args"], serde_json::json!(["master.par", "arg1"]));
        assert_eq!(
            trainer_replicas[0]["env"],
            serde_json::json!({"ENV_VAR_1": "VAL1"})
        );
        assert!(!scheduler.cache.contains("dryrun_app_0"));
    }

    #[tokio::test]
    async fn cancel_sends_sigterm_and_marks_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "sleepy.sh", "#!/bin/sh\nsleep 30\n");
        let mut container = Container::new(dir.path().to_str().unwrap());
        container.require(Resources::new(1, 0, 500));
        let role = Role::new("sleeper")
            .runs(script, Vec::<String>::new(), Vec::<(String, String)>::new())
            .on(container)
            .replicas(1);
        let app = Application::new("sleepy_app").of([role]);
        let scheduler = LocalScheduler::with_cache_size(10)
            .unwrap()
            .with_log_dir(dir.path().join("logs"));

        let app_id = scheduler._submit(&app, &RunConfig::new()).await.unwrap();
        scheduler._cancel_existing(&app_id).await.unwrap();

        let status = scheduler.describe(&app_id).await.unwrap().unwrap();
        assert_eq!(status.state, AppState::Cancelled);
    }

    #[tokio::test]
    async fn cache_full_without_terminal_apps_errors() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = LocalScheduler::with_cache_size(1)
            .unwrap()
            .with_log_dir(dir.path().join("logs"));

        let script = write_script(dir.path(), "sleepy.sh", "#!/bin/sh\nsleep 30\n");
        let mut container = Container::new(dir.path().to_str().unwrap());
        container.require(Resources::new(1, 0, 500));
        let role = Role::new("sleeper")
            .runs(script, Vec::<String>::new(), Vec::<(String, String)>::new())
            .on(container)
            .replicas(1);
        let app = Application::new("first").of([role.clone()]);
        scheduler._submit(&app, &RunConfig::new()).await.unwrap();

        let app2 = Application::new("second").of([role]);
        let err = scheduler._submit(&app2, &RunConfig::new()).await;
        assert!(err.is_err());
    }

    #[test]
    fn app_handle_round_trips_with_local_scheduler_backend() {
        let handle = make("local", "default", "touch_app_0");
        assert_eq!(handle, "local://default/touch_app_0");
    }
}
