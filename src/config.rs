//! Runtime configuration.
//!
//! Every tunable the monitoring logic depends on lives here with an explicit
//! default, overridable through `AIRWATCH_*` environment variables. The
//! proximity epsilons and the alert bucket/cooldown are configuration rather
//! than hard-wired constants.

use std::env;
use std::time::Duration;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default database path.
pub const DEFAULT_DB_PATH: &str = "sqlite:airwatch.db?mode=rwc";

/// Default base URL for the AQI provider.
pub const DEFAULT_AQI_BASE_URL: &str = "https://api.waqi.info";

/// Default base URL for the IP-geolocation collaborator.
pub const DEFAULT_IP_BASE_URL: &str = "http://ip-api.com";

/// Default base URL for the reverse-geocoding collaborator.
pub const DEFAULT_GEOCODE_BASE_URL: &str = "https://nominatim.openstreetmap.org";

/// Reference cities aggregated for the ranking view.
pub const DEFAULT_REFERENCE_CITIES: &[&str] = &[
    "london", "paris", "beijing", "delhi", "tokyo", "new-york", "los-angeles", "sydney",
];

/// All tunables for the monitoring components.
#[derive(Debug, Clone)]
pub struct Config {
    pub aqi_base_url: String,
    pub aqi_token: String,
    pub ip_base_url: String,
    pub geocode_base_url: String,
    /// Position fixes closer than this are not treated as movement.
    pub motion_epsilon_deg: f64,
    /// Coordinates closer than this reuse the cached geocode label.
    pub geocode_epsilon_deg: f64,
    /// Values within one bucket collapse to the same alert signature.
    pub alert_bucket_width: i64,
    /// Minimum seconds between two deliveries of the same signature.
    pub alert_cooldown_secs: i64,
    pub history_retention: usize,
    pub alert_log_retention: usize,
    /// How long to wait for a first position fix before trying IP fallback.
    pub idle_timeout: Duration,
    pub default_threshold: i64,
    pub reference_cities: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aqi_base_url: DEFAULT_AQI_BASE_URL.to_string(),
            aqi_token: "demo".to_string(),
            ip_base_url: DEFAULT_IP_BASE_URL.to_string(),
            geocode_base_url: DEFAULT_GEOCODE_BASE_URL.to_string(),
            motion_epsilon_deg: 0.0005,
            geocode_epsilon_deg: 0.001,
            alert_bucket_width: 5,
            alert_cooldown_secs: 300,
            history_retention: 6,
            alert_log_retention: 5,
            idle_timeout: Duration::from_secs(6),
            default_threshold: 150,
            reference_cities: DEFAULT_REFERENCE_CITIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

impl Config {
    /// Build a config from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("AIRWATCH_AQI_BASE_URL") {
            config.aqi_base_url = url;
        }
        if let Ok(token) = env::var("AIRWATCH_AQI_TOKEN") {
            config.aqi_token = token;
        }
        if let Ok(url) = env::var("AIRWATCH_IP_BASE_URL") {
            config.ip_base_url = url;
        }
        if let Ok(url) = env::var("AIRWATCH_GEOCODE_BASE_URL") {
            config.geocode_base_url = url;
        }
        if let Some(v) = env_parse::<i64>("AIRWATCH_ALERT_THRESHOLD") {
            config.default_threshold = v;
        }
        if let Some(v) = env_parse::<i64>("AIRWATCH_ALERT_COOLDOWN_SECS") {
            config.alert_cooldown_secs = v.max(0);
        }
        if let Some(v) = env_parse::<i64>("AIRWATCH_ALERT_BUCKET_WIDTH") {
            config.alert_bucket_width = v.max(1);
        }
        if let Ok(cities) = env::var("AIRWATCH_REFERENCE_CITIES") {
            let parsed: Vec<String> = cities
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
            if !parsed.is_empty() {
                config.reference_cities = parsed;
            }
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
