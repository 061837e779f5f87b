use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Compute resources requested by a [`crate::container::Container`].
///
/// Logically immutable: mutating helpers live on `Container`, not here.
/// [`Resources::copy`] is the only way to derive a new instance, and it
/// never mutates `self`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Resources {
    pub cpu: i64,
    pub gpu: i64,
    pub mem_mb: i64,
    pub capabilities: HashMap<String, serde_json::Value>,
}

impl Resources {
    pub fn new(cpu: i64, gpu: i64, mem_mb: i64) -> Self {
        Self {
            cpu,
            gpu,
            mem_mb,
            capabilities: HashMap::new(),
        }
    }

    /// Returns a new `Resources` with `cpu`/`gpu`/`mem_mb` unchanged and
    /// `capabilities` overlaid with `overrides` (overrides win on
    /// collision). `self.capabilities` is left untouched.
    pub fn copy<I>(&self, overrides: I) -> Resources
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        let mut capabilities = self.capabilities.clone();
        for (k, v) in overrides {
            capabilities.insert(k, v);
        }
        Resources {
            cpu: self.cpu,
            gpu: self.gpu,
            mem_mb: self.mem_mb,
            capabilities,
        }
    }
}
