use crate::role::Role;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a submitted application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppState {
    Unsubmitted,
    Submitted,
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    Unknown,
}

const TERMINAL_STATES: [AppState; 3] = [AppState::Succeeded, AppState::Failed, AppState::Cancelled];

impl AppState {
    pub fn is_terminal(&self) -> bool {
        TERMINAL_STATES.contains(self)
    }

    /// All declared states, used by tests asserting the terminal-set
    /// invariant over the whole enum.
    pub fn all() -> [AppState; 8] {
        [
            AppState::Unsubmitted,
            AppState::Submitted,
            AppState::Pending,
            AppState::Running,
            AppState::Succeeded,
            AppState::Failed,
            AppState::Cancelled,
            AppState::Unknown,
        ]
    }
}

/// Status of one spawned replica process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaStatus {
    pub id: usize,
    pub state: AppState,
    pub exit_code: Option<i32>,
}

/// Per-role rollup of its replicas' statuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleStatus {
    pub role: String,
    pub replicas: Vec<ReplicaStatus>,
}

/// Snapshot of an application's state, as returned by
/// `Scheduler::describe`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppStatus {
    pub state: AppState,
    pub num_restarts: i64,
    pub msg: String,
    pub structured_error_msg: String,
    pub ui_url: Option<String>,
    pub roles: Vec<RoleStatus>,
}

impl AppStatus {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            num_restarts: 0,
            msg: String::new(),
            structured_error_msg: String::new(),
            ui_url: None,
            roles: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// A backend-produced snapshot echoing enough of the submitted
/// application to be useful, plus `app_id` and `state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescribeAppResponse {
    pub app_id: String,
    pub state: AppState,
    pub name: String,
    pub roles: Vec<Role>,
    pub num_restarts: i64,
    pub msg: String,
    pub ui_url: Option<String>,
}
