use crate::container::Container;
use crate::macros;
use crate::role::Role;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

/// Binary the launcher substitutes in for the elastic entrypoint.
pub const LAUNCHER_BINARY: &str = "python";

/// A flag value passed to [`ElasticRole::new`]'s launch kwargs.
#[derive(Debug, Clone, PartialEq)]
pub enum LaunchArg {
    Bool(bool),
    Str(String),
}

impl From<&str> for LaunchArg {
    fn from(v: &str) -> Self {
        LaunchArg::Str(v.to_string())
    }
}

impl From<String> for LaunchArg {
    fn from(v: String) -> Self {
        LaunchArg::Str(v)
    }
}

impl From<i64> for LaunchArg {
    fn from(v: i64) -> Self {
        LaunchArg::Str(v.to_string())
    }
}

impl From<bool> for LaunchArg {
    fn from(v: bool) -> Self {
        LaunchArg::Bool(v)
    }
}

/// A [`Role`] whose `runs` rewrites the effective entrypoint/args to
/// invoke the elastic launcher instead of the user's script directly
/// (spec §4.1). Composition stands in for the source driver's subtyping:
/// `ElasticRole` derefs to `Role` so callers read the same fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ElasticRole {
    role: Role,
    flags: Vec<String>,
}

impl Deref for ElasticRole {
    type Target = Role;
    fn deref(&self) -> &Role {
        &self.role
    }
}

impl DerefMut for ElasticRole {
    fn deref_mut(&mut self) -> &mut Role {
        &mut self.role
    }
}

impl ElasticRole {
    /// `launch_kwargs` preserves insertion order (an `IndexMap`-free `Vec`
    /// is enough here; order matters for deterministic flag rendering but
    /// the source driver does not specify a canonical order beyond
    /// "whatever was passed", so this crate renders in call order).
    pub fn new<I, K>(name: impl Into<String>, launch_kwargs: I) -> Self
    where
        I: IntoIterator<Item = (K, LaunchArg)>,
        K: Into<String>,
    {
        let mut kwargs: Vec<(String, LaunchArg)> = launch_kwargs
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect();

        if !kwargs.iter().any(|(k, _)| k == "rdzv_backend") {
            kwargs.push(("rdzv_backend".to_string(), LaunchArg::Str("etcd".to_string())));
        }
        if !kwargs.iter().any(|(k, _)| k == "rdzv_id") {
            kwargs.push(("rdzv_id".to_string(), LaunchArg::Str(macros::APP_ID.to_string())));
        }

        let mut flags = Vec::new();
        for (k, v) in &kwargs {
            match v {
                LaunchArg::Bool(true) => flags.push(format!("--{k}")),
                LaunchArg::Bool(false) => {}
                LaunchArg::Str(s) => {
                    flags.push(format!("--{k}"));
                    flags.push(s.clone());
                }
            }
        }

        Self {
            role: Role::new(name),
            flags,
        }
    }

    /// Rewrites the role so the effective entrypoint is the launcher
    /// binary and the effective args invoke the launcher module with the
    /// precomputed flags, `--role <name>`, the resolved script, and the
    /// user's trailing args (spec §4.1).
    pub fn runs<I, E, K, V>(mut self, script: impl Into<String>, user_args: I, env: E) -> Self
    where
        I: IntoIterator<Item = String>,
        E: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let script = script.into();
        let resolved_script = if script.starts_with(macros::IMG_ROOT) {
            script
        } else {
            format!("{}/{}", macros::IMG_ROOT, script)
        };

        let mut args = vec![
            "-m".to_string(),
            crate::config::ELASTIC_LAUNCHER_MODULE.to_string(),
        ];
        args.extend(self.flags.clone());
        args.push("--role".to_string());
        args.push(self.role.name.clone());
        args.push(resolved_script);
        args.extend(user_args);

        self.role.entrypoint = Some(LAUNCHER_BINARY.to_string());
        self.role.args = args;
        self.role.env = env
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    pub fn on(mut self, container: Container) -> Self {
        self.role = self.role.on(container);
        self
    }

    pub fn replicas(mut self, n: i64) -> Self {
        self.role = self.role.replicas(n);
        self
    }

    pub fn into_role(self) -> Role {
        self.role
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Container;

    fn kwargs(pairs: Vec<(&str, LaunchArg)>) -> HashMap<String, LaunchArg> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn build_elastic_role_applies_defaults_and_flags() {
        let mut container = Container::new("test_image");
        container.ports([("foo", 8080)]);
        let elastic_trainer = ElasticRole::new(
            "elastic_trainer",
            vec![
                ("nnodes".to_string(), LaunchArg::from("2:4")),
                ("max_restarts".to_string(), LaunchArg::from(3i64)),
                ("no_python".to_string(), LaunchArg::from(true)),
            ],
        )
        .runs(
            "/bin/echo",
            ["hello".to_string(), "world".to_string()],
            [("ENV_VAR_1", "FOOBAR")],
        )
        .on(container.clone())
        .replicas(2);

        assert_eq!(elastic_trainer.name, "elastic_trainer");
        assert_eq!(elastic_trainer.entrypoint.as_deref(), Some("python"));
        assert_eq!(
            elastic_trainer.args,
            vec![
                "-m",
                "rundrive.launcher",
                "--nnodes",
                "2:4",
                "--max_restarts",
                "3",
                "--no_python",
                "--rdzv_backend",
                "etcd",
                "--rdzv_id",
                "${app_id}",
                "--role",
                "elastic_trainer",
                "/bin/echo",
                "hello",
                "world",
            ]
        );
        assert_eq!(
            elastic_trainer.env.get("ENV_VAR_1"),
            Some(&"FOOBAR".to_string())
        );
        assert_eq!(elastic_trainer.container, Some(container));
        assert_eq!(elastic_trainer.num_replicas, 2);
        let _ = kwargs(vec![]);
    }

    #[test]
    fn override_rdzv_params() {
        let role = ElasticRole::new(
            "test_role",
            vec![
                ("nnodes".to_string(), LaunchArg::from("2:4")),
                ("rdzv_backend".to_string(), LaunchArg::from("zeus")),
                ("rdzv_id".to_string(), LaunchArg::from("foobar")),
            ],
        )
        .runs(
            "user_script.py",
            ["--script_arg".to_string(), "foo".to_string()],
            Vec::<(String, String)>::new(),
        );

        assert_eq!(
            role.args,
            vec![
                "-m",
                "rundrive.launcher",
                "--nnodes",
                "2:4",
                "--rdzv_backend",
                "zeus",
                "--rdzv_id",
                "foobar",
                "--role",
                "test_role",
                "${img_root}/user_script.py",
                "--script_arg",
                "foo",
            ]
        );
    }

    #[test]
    fn flag_args_false_is_omitted() {
        let role = ElasticRole::new("test_role", vec![("no_python".to_string(), LaunchArg::from(false))])
            .runs("user_script.py", Vec::<String>::new(), Vec::<(String, String)>::new());

        assert_eq!(
            role.args,
            vec![
                "-m",
                "rundrive.launcher",
                "--rdzv_backend",
                "etcd",
                "--rdzv_id",
                "${app_id}",
                "--role",
                "test_role",
                "${img_root}/user_script.py",
            ]
        );
    }

    #[test]
    fn img_root_already_in_entrypoint_is_not_duplicated() {
        let role = ElasticRole::new("test_role", vec![("no_python".to_string(), LaunchArg::from(false))])
            .runs(
                format!("{}/user_script.py", macros::IMG_ROOT),
                Vec::<String>::new(),
                Vec::<(String, String)>::new(),
            );

        assert_eq!(
            role.args,
            vec![
                "-m",
                "rundrive.launcher",
                "--rdzv_backend",
                "etcd",
                "--rdzv_id",
                "${app_id}",
                "--role",
                "test_role",
                "${img_root}/user_script.py",
            ]
        );
    }
}
