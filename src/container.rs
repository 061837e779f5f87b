use crate::resources::Resources;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An image plus the resources and port mapping a role runs it with.
///
/// `ports`/`require` are mutating builders that return `&mut self` so
/// callers can chain them, matching the source driver's
/// `container.ports(...).require(...)` usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub image: String,
    pub resources: Option<Resources>,
    pub port_map: HashMap<String, i64>,
}

impl Container {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            resources: None,
            port_map: HashMap::new(),
        }
    }

    pub fn ports<I, K>(&mut self, ports: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, i64)>,
        K: Into<String>,
    {
        for (name, port) in ports {
            self.port_map.insert(name.into(), port);
        }
        self
    }

    pub fn require(&mut self, resources: Resources) -> &mut Self {
        self.resources = Some(resources);
        self
    }
}
