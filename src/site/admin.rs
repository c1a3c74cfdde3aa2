use super::config::EffectiveConfig;

/// Secret that unlocks the admin surface: the password if set, else the
/// key, else empty (unlock disabled).
pub fn resolve_secret(config: &EffectiveConfig) -> String {
    [&config.admin_password, &config.admin_key]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .cloned()
        .unwrap_or_default()
}
