use crate::application::{self, Application};
use crate::dryrun::AppDryRunInfo;
use crate::error::{DriverError, DriverResult};
use crate::handle::{self, AppHandle};
use crate::runopts::RunConfig;
use crate::scheduler::Scheduler;
use crate::status::{AppState, DescribeAppResponse};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the backend used when a caller doesn't name one explicitly.
pub const DEFAULT_SCHEDULER_BACKEND: &str = "default";

/// Ties the data model, run-options resolution, and scheduler backends
/// together behind one caller-facing surface (spec §4.7), mirroring
/// `SessionTest.MockSession`'s backend-by-name resolution via the handle
/// codec.
pub struct Session {
    name: String,
    backends: HashMap<String, Arc<dyn Scheduler>>,
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backends: HashMap::new(),
        }
    }

    pub fn with_backend(mut self, name: impl Into<String>, scheduler: Arc<dyn Scheduler>) -> Self {
        self.backends.insert(name.into(), scheduler);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scheduler_backends(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }

    fn backend(&self, name: &str) -> DriverResult<&Arc<dyn Scheduler>> {
        self.backends
            .get(name)
            .ok_or_else(|| DriverError::ValueError(format!("unknown scheduler backend `{name}`")))
    }

    fn backend_for_handle(&self, app_handle: &AppHandle) -> DriverResult<(Arc<dyn Scheduler>, String)> {
        let (backend_name, _session, app_id) = handle::parse(app_handle)?;
        let scheduler = self.backend(&backend_name)?.clone();
        Ok((scheduler, app_id))
    }

    /// Validates `app`, submits it to `scheduler_backend`, and wraps the
    /// resulting `app_id` as an [`AppHandle`] scoped to this session.
    pub async fn run(
        &self,
        app: &Application,
        scheduler_backend: &str,
        cfg: &RunConfig,
    ) -> DriverResult<AppHandle> {
        application::validate(app)?;
        let scheduler = self.backend(scheduler_backend)?;
        let app_id = scheduler.submit(app, cfg).await?;
        Ok(handle::make(scheduler_backend, &self.name, &app_id))
    }

    /// Validates `app` and returns `scheduler_backend`'s dry-run rendering
    /// without submitting anything.
    pub async fn dryrun(
        &self,
        app: &Application,
        scheduler_backend: &str,
        cfg: &RunConfig,
    ) -> DriverResult<AppDryRunInfo<serde_json::Value>> {
        application::validate(app)?;
        let scheduler = self.backend(scheduler_backend)?;
        scheduler.submit_dryrun(app, cfg).await
    }

    pub async fn status(&self, app_handle: &AppHandle) -> DriverResult<Option<AppState>> {
        let (scheduler, app_id) = self.backend_for_handle(app_handle)?;
        Ok(scheduler.describe(&app_id).await?.map(|d| d.state))
    }

    pub async fn describe(&self, app_handle: &AppHandle) -> DriverResult<Option<DescribeAppResponse>> {
        let (scheduler, app_id) = self.backend_for_handle(app_handle)?;
        scheduler.describe(&app_id).await
    }

    pub async fn wait(&self, app_handle: &AppHandle) -> DriverResult<Option<AppState>> {
        let (scheduler, app_id) = self.backend_for_handle(app_handle)?;
        scheduler.wait(&app_id).await
    }

    pub async fn stop(&self, app_handle: &AppHandle) -> DriverResult<()> {
        let (scheduler, app_id) = self.backend_for_handle(app_handle)?;
        scheduler.cancel(&app_id).await
    }

    #[allow(clippy::too_many_arguments)]
    pub fn log_lines(
        &self,
        app_handle: &AppHandle,
        role_name: &str,
        k: usize,
        regex: Option<&str>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> DriverResult<Box<dyn Iterator<Item = String> + Send>> {
        let (scheduler, app_id) = self.backend_for_handle(app_handle)?;
        scheduler.log_iter(&app_id, role_name, k, regex, since, until)
    }

    /// All known app handles submitted to `scheduler_backend` under this
    /// session.
    pub async fn list(&self, scheduler_backend: &str) -> DriverResult<Vec<AppHandle>> {
        let scheduler = self.backend(scheduler_backend)?;
        let app_ids = scheduler.list().await?;
        Ok(app_ids
            .into_iter()
            .map(|app_id| handle::make(scheduler_backend, &self.name, &app_id))
            .collect())
    }
}
