use crate::application::Application;
use crate::config;
use crate::dryrun::AppDryRunInfo;
use crate::error::DriverResult;
use crate::runopts::{RunConfig, RunOpts};
use crate::status::{AppState, DescribeAppResponse};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A backend implementation of the scheduler contract (spec §4.4),
/// mirrored on the teacher's `ContainerRuntime`/`RuntimeExecutor`
/// async-trait pattern: concrete backends implement the `_`-prefixed
/// hooks, and `submit`/`submit_dryrun`/`exists` are provided here so
/// every backend gets the same validation wrapper for free.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Backend-private submission; called with an already-resolved cfg.
    async fn _submit(&self, app: &Application, cfg: &RunConfig) -> DriverResult<String>;

    /// Backend-private dry run; called with an already-resolved cfg.
    async fn _submit_dryrun(
        &self,
        app: &Application,
        cfg: &RunConfig,
    ) -> DriverResult<AppDryRunInfo<serde_json::Value>>;

    async fn describe(&self, app_id: &str) -> DriverResult<Option<DescribeAppResponse>>;

    /// Requests backend cancellation of an app known to exist and not be
    /// terminal. `cancel` (the public, provided method) handles the
    /// unknown/already-terminal no-op cases.
    async fn _cancel_existing(&self, app_id: &str) -> DriverResult<()>;

    #[allow(clippy::too_many_arguments)]
    fn log_iter(
        &self,
        app_id: &str,
        role_name: &str,
        k: usize,
        regex: Option<&str>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> DriverResult<Box<dyn Iterator<Item = String> + Send>>;

    fn run_opts(&self) -> RunOpts;

    /// Known app ids, in submission order. Empty by default; the local
    /// scheduler overrides this with its cache's live keys.
    async fn list(&self) -> DriverResult<Vec<String>> {
        Ok(Vec::new())
    }

    /// Validates `cfg` via `run_opts().resolve(cfg)`, then delegates to
    /// `_submit`.
    async fn submit(&self, app: &Application, cfg: &RunConfig) -> DriverResult<String> {
        let resolved = self.run_opts().resolve(cfg)?;
        self._submit(app, &resolved).await
    }

    /// Same validation as `submit`, then delegates to `_submit_dryrun`.
    async fn submit_dryrun(
        &self,
        app: &Application,
        cfg: &RunConfig,
    ) -> DriverResult<AppDryRunInfo<serde_json::Value>> {
        let resolved = self.run_opts().resolve(cfg)?;
        self._submit_dryrun(app, &resolved).await
    }

    async fn exists(&self, app_id: &str) -> DriverResult<bool> {
        Ok(self.describe(app_id).await?.is_some())
    }

    /// No-op if `app_id` is unknown or already terminal; otherwise
    /// requests backend cancellation.
    async fn cancel(&self, app_id: &str) -> DriverResult<()> {
        match self.describe(app_id).await? {
            Some(status) if !status.state.is_terminal() => self._cancel_existing(app_id).await,
            _ => Ok(()),
        }
    }

    /// Polls `describe` at `config::POLL_INTERVAL_MS` until the app
    /// reaches a terminal state (spec §5: "wait blocks on child-process
    /// state change... implementation may poll at a bounded interval").
    /// `Ok(None)` if `app_id` is unknown.
    async fn wait(&self, app_id: &str) -> DriverResult<Option<AppState>> {
        loop {
            match self.describe(app_id).await? {
                Some(status) if status.state.is_terminal() => return Ok(Some(status.state)),
                Some(_) => {
                    tokio::time::sleep(std::time::Duration::from_millis(*config::POLL_INTERVAL_MS))
                        .await;
                }
                None => return Ok(None),
            }
        }
    }
}
