use crate::error::{DriverError, DriverResult};
use crate::value::{Value, ValueType};
use indexmap::IndexMap;
use std::fmt;

/// An ordered mapping from option name to value, resolved against a
/// [`RunOpts`] schema before a scheduler acts on it. Two configs are
/// equal iff their maps are equal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunConfig {
    values: IndexMap<String, Value>,
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Trivial round-trip to a plain ordered dictionary.
    pub fn to_map(&self) -> IndexMap<String, Value> {
        self.values.clone()
    }

    pub fn from_map(values: IndexMap<String, Value>) -> Self {
        Self { values }
    }
}

/// One entry in a [`RunOpts`] schema. `required` and `default` are
/// mutually exclusive.
#[derive(Debug, Clone)]
pub struct RunOption {
    pub name: String,
    pub value_type: ValueType,
    pub help: String,
    pub default: Option<Value>,
    pub required: bool,
}

/// A scheduler's registry of supported run-config options, shared by
/// every backend's `run_opts()` (spec §4.3).
#[derive(Debug, Clone, Default)]
pub struct RunOpts {
    options: IndexMap<String, RunOption>,
}

impl RunOpts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an option. Fails with `ValueError` if both `required`
    /// and `default` are set, or with `TypeError` if `default`'s runtime
    /// tag disagrees with `value_type`.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        value_type: ValueType,
        help: impl Into<String>,
        default: Option<Value>,
        required: bool,
    ) -> DriverResult<()> {
        let name = name.into();
        if required && default.is_some() {
            return Err(DriverError::ValueError(format!(
                "option `{name}`: `required` and `default` are mutually exclusive"
            )));
        }
        if let Some(default) = &default {
            if !value_type.matches(default) {
                return Err(DriverError::TypeError(format!(
                    "option `{name}`: default value does not match declared type {value_type}"
                )));
            }
        }
        self.options.insert(
            name.clone(),
            RunOption {
                name,
                value_type,
                help: help.into(),
                default,
                required,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RunOption> {
        self.options.get(name)
    }

    /// Resolves `cfg` against this schema: checks declared types, applies
    /// defaults, fails on missing required options. Keys in `cfg` not
    /// declared by this schema are preserved verbatim (a `RunConfig` is a
    /// union across backends). `cfg` itself is never mutated.
    pub fn resolve(&self, cfg: &RunConfig) -> DriverResult<RunConfig> {
        let mut resolved = cfg.clone();
        for option in self.options.values() {
            match cfg.get(&option.name) {
                Some(value) => {
                    if !option.value_type.matches(value) {
                        return Err(DriverError::InvalidRunConfig(format!(
                            "option `{}` expected type {} but got a value of a different type",
                            option.name, option.value_type
                        )));
                    }
                }
                None => {
                    if let Some(default) = &option.default {
                        resolved.set(option.name.clone(), default.clone());
                    } else if option.required {
                        return Err(DriverError::InvalidRunConfig(format!(
                            "missing required option `{}`",
                            option.name
                        )));
                    }
                }
            }
        }
        Ok(resolved)
    }
}

impl fmt::Display for RunOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for opt in self.options.values() {
            writeln!(
                f,
                "{}: type={}, default={:?}, required={}, help={}",
                opt.name, opt.value_type, opt.default, opt.required, opt.help
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_config_valid_values() {
        let mut cfg = RunConfig::new();
        cfg.set("run_as", "root");
        cfg.set("cluster_id", 123i64);
        cfg.set("priority", 0.5);
        cfg.set("preemptible", true);

        assert_eq!(cfg.get("run_as"), Some(&Value::Str("root".into())));
        assert_eq!(cfg.get("cluster_id"), Some(&Value::Int(123)));
        assert_eq!(cfg.get("priority"), Some(&Value::Float(0.5)));
        assert_eq!(cfg.get("preemptible"), Some(&Value::Bool(true)));
        assert_eq!(cfg.get("unknown"), None);
    }

    #[test]
    fn run_config_round_trips_through_a_plain_map() {
        let mut cfg = RunConfig::new();
        cfg.set("run_as", "root");
        let map = cfg.to_map();
        let deser = RunConfig::from_map(map);
        assert_eq!(deser, cfg);
    }

    #[test]
    fn run_opts_add_validations() {
        let mut opts = RunOpts::new();
        opts.add("run_as", ValueType::Str, "run as user", None, false)
            .unwrap();
        opts.add(
            "run_as_default",
            ValueType::Str,
            "run as user",
            Some(Value::Str("root".into())),
            false,
        )
        .unwrap();
        opts.add("run_as_required", ValueType::Str, "run as user", None, true)
            .unwrap();

        assert!(opts
            .add(
                "run_as",
                ValueType::Str,
                "run as user",
                Some(Value::Str("root".into())),
                true,
            )
            .is_err());

        opts.add("priority", ValueType::Int, "job priority", Some(Value::Int(10)), false)
            .unwrap();

        assert!(opts
            .add(
                "priority",
                ValueType::Int,
                "job priority",
                Some(Value::Float(0.5)),
                false,
            )
            .is_err());
    }

    fn run_opts() -> RunOpts {
        let mut opts = RunOpts::new();
        opts.add("run_as", ValueType::Str, "run as user", None, true)
            .unwrap();
        opts.add("priority", ValueType::Int, "job priority", Some(Value::Int(10)), false)
            .unwrap();
        opts.add("cluster_id", ValueType::Str, "cluster to submit job", None, false)
            .unwrap();
        opts
    }

    #[test]
    fn resolve_applies_defaults_and_leaves_absent_unset() {
        let opts = run_opts();
        let mut cfg = RunConfig::new();
        cfg.set("run_as", "foobar");

        let resolved = opts.resolve(&cfg).unwrap();
        assert_eq!(resolved.get("run_as"), Some(&Value::Str("foobar".into())));
        assert_eq!(resolved.get("priority"), Some(&Value::Int(10)));
        assert_eq!(resolved.get("cluster_id"), None);

        // original untouched
        assert_eq!(cfg.get("run_as"), Some(&Value::Str("foobar".into())));
        assert_eq!(cfg.get("priority"), None);
        assert_eq!(cfg.get("cluster_id"), None);
    }

    #[test]
    fn resolve_keeps_explicit_overrides() {
        let opts = run_opts();
        let mut cfg = RunConfig::new();
        cfg.set("run_as", "foobar");
        cfg.set("priority", 20i64);
        cfg.set("cluster_id", "test_cluster");

        let resolved = opts.resolve(&cfg).unwrap();
        assert_eq!(resolved.get("run_as"), Some(&Value::Str("foobar".into())));
        assert_eq!(resolved.get("priority"), Some(&Value::Int(20)));
        assert_eq!(resolved.get("cluster_id"), Some(&Value::Str("test_cluster".into())));
    }

    #[test]
    fn resolve_fails_on_missing_required() {
        let opts = run_opts();
        let mut cfg = RunConfig::new();
        cfg.set("priority", 20i64);
        cfg.set("cluster_id", "test_cluster");

        assert!(opts.resolve(&cfg).is_err());
    }

    #[test]
    fn resolve_fails_on_bad_type() {
        let opts = run_opts();
        let mut cfg = RunConfig::new();
        cfg.set("run_as", "foobar");
        cfg.set("cluster_id", 123i64);

        assert!(opts.resolve(&cfg).is_err());
    }

    #[test]
    fn resolve_preserves_unioned_unknown_keys() {
        let opts = run_opts();
        let mut cfg = RunConfig::new();
        cfg.set("run_as", "foobar");
        cfg.set("some_other_opt", "baz");

        let resolved = opts.resolve(&cfg).unwrap();
        assert_eq!(resolved.get("run_as"), Some(&Value::Str("foobar".into())));
        assert_eq!(resolved.get("priority"), Some(&Value::Int(10)));
        assert_eq!(resolved.get("cluster_id"), None);
        assert_eq!(resolved.get("some_other_opt"), Some(&Value::Str("baz".into())));
    }
}
