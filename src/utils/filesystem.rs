pub const CONFIG_PATH_ENV: &str = "CURRENT_MONITOR_CONFIG";
pub const CONFIG_PATH_DEFAULT: &str = "/etc/current-monitor/config.yaml";

/// Config file location, overridable through `CURRENT_MONITOR_CONFIG` (also read from `.env`).
pub fn get_config_path() -> String {
    std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| CONFIG_PATH_DEFAULT.to_string())
}
