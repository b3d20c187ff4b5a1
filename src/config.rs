use std::path::PathBuf;

/// Process configuration, read once from the environment at startup.
/// Per-workspace settings live in the workspace database instead.
#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace opened before the first request, if set.
    pub workspace: Option<PathBuf>,
    pub log_level: String,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let workspace = get("SCHOOLD_WORKSPACE")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        let log_level = get("LOG_LEVEL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "info".to_string());
        let log_json = get("LOG_FORMAT")
            .map(|s| s.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        Self {
            workspace,
            log_level,
            log_json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_and_overrides() {
        let cfg = Config::from_lookup(|_| None);
        assert!(cfg.workspace.is_none());
        assert_eq!(cfg.log_level, "info");
        assert!(!cfg.log_json);

        let env: HashMap<&str, &str> = [
            ("SCHOOLD_WORKSPACE", "/tmp/school"),
            ("LOG_LEVEL", "debug"),
            ("LOG_FORMAT", "JSON"),
        ]
        .into_iter()
        .collect();
        let cfg = Config::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.workspace, Some(PathBuf::from("/tmp/school")));
        assert_eq!(cfg.log_level, "debug");
        assert!(cfg.log_json);
    }
}
