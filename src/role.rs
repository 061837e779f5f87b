use crate::container::Container;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One kind of worker within an [`crate::application::Application`].
///
/// Builder methods consume and return `Self` (the Rust analogue of the
/// source driver's self-returning chain `.runs().on().replicas()`);
/// equivalence is by final field values, not by identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub entrypoint: Option<String>,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub container: Option<Container>,
    pub num_replicas: i64,
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entrypoint: None,
            args: Vec::new(),
            env: HashMap::new(),
            container: None,
            num_replicas: 1,
        }
    }

    /// Sets entrypoint, positional args, and environment in one call.
    pub fn runs<I, E, K, V>(mut self, entrypoint: impl Into<String>, args: I, env: E) -> Self
    where
        I: IntoIterator<Item = String>,
        E: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.entrypoint = Some(entrypoint.into());
        self.args = args.into_iter().collect();
        self.env = env
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    pub fn on(mut self, container: Container) -> Self {
        self.container = Some(container);
        self
    }

    pub fn replicas(mut self, n: i64) -> Self {
        self.num_replicas = n;
        self
    }
}
