use crate::macros;

/// Substitutes the closed set of macro tokens in a single string value.
/// A plain `replace` pass, deliberately not general templating (spec §6,
/// design note).
pub fn substitute(value: &str, img_root: &str, app_id: &str, replica_id: &str) -> String {
    value
        .replace(macros::IMG_ROOT, img_root)
        .replace(macros::APP_ID, app_id)
        .replace(macros::REPLICA_ID, replica_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_all_three_tokens() {
        let out = substitute(
            "${img_root}/${app_id}_${replica_id}",
            "/root",
            "my_app",
            "3",
        );
        assert_eq!(out, "/root/my_app_3");
    }

    #[test]
    fn leaves_unrelated_text_untouched() {
        assert_eq!(substitute("touch.sh", "/root", "my_app", "0"), "touch.sh");
    }
}
