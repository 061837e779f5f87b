use crate::error::{DriverError, DriverResult};
use crate::role::Role;
use serde::{Deserialize, Serialize};

/// A named bundle of roles submitted as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
    pub roles: Vec<Role>,
}

impl Application {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            roles: Vec::new(),
        }
    }

    /// Appends `roles`, preserving order, and returns `self` for chaining.
    pub fn of(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles.extend(roles);
        self
    }
}

/// Fails with a [`DriverError::ValueError`] if the application has no
/// roles, or any role is missing a container, resources, or has fewer
/// than one replica (spec §4.8).
pub fn validate(app: &Application) -> DriverResult<()> {
    if app.roles.is_empty() {
        return Err(DriverError::ValueError(format!(
            "application `{}` has no roles",
            app.name
        )));
    }
    for role in &app.roles {
        let container = role.container.as_ref().ok_or_else(|| {
            DriverError::ValueError(format!("role `{}` has no container", role.name))
        })?;
        if container.resources.is_none() {
            return Err(DriverError::ValueError(format!(
                "role `{}` container has no resources",
                role.name
            )));
        }
        if role.num_replicas < 1 {
            return Err(DriverError::ValueError(format!(
                "role `{}` has invalid num_replicas {}",
                role.name, role.num_replicas
            )));
        }
    }
    Ok(())
}
