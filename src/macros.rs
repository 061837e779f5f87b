//! The closed set of macro tokens substituted into a role's entrypoint,
//! args, and env values at submission time (spec §6). Treated as opaque
//! string tokens with a plain find-and-replace pass — never general
//! templating.

pub const IMG_ROOT: &str = "${img_root}";
pub const APP_ID: &str = "${app_id}";
pub const REPLICA_ID: &str = "${replica_id}";
