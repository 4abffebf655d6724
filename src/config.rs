use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;
const DEFAULT_WORKDAY_HOURS: u32 = 8;
const DEFAULT_WEEKLY_CAPACITY_HOURS: u32 = 40;
const DEFAULT_REPEAT_WINDOW_DAYS: u32 = 30;
const DEFAULT_REFRESH_HOUR: u32 = 2;

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[validate(length(min = 1))]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Capacity of the in-process event channel
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Company that material requests are raised for
    #[serde(default = "default_company")]
    pub company: String,

    /// Warehouse that parts are issued from
    #[serde(default = "default_warehouse")]
    pub default_warehouse: String,

    /// Bookable hours per technician per day (utilization report)
    #[serde(default = "default_workday_hours")]
    #[validate(range(min = 1, max = 24))]
    pub workday_hours: u32,

    /// Capacity assumed when the utilization report has no date range
    #[serde(default = "default_weekly_capacity_hours")]
    #[validate(range(min = 1))]
    pub weekly_capacity_hours: u32,

    /// Look-back window of the repeat repairs report
    #[serde(default = "default_repeat_window_days")]
    #[validate(range(min = 1, max = 3650))]
    pub repeat_repair_window_days: u32,

    /// Run the nightly job costing refresh inside the server process
    #[serde(default = "default_true_bool")]
    pub scheduler_enabled: bool,

    /// UTC hour at which the nightly refresh runs
    #[serde(default = "default_refresh_hour")]
    #[validate(range(max = 23))]
    pub job_costing_refresh_hour: u32,
}

impl AppConfig {
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            company: default_company(),
            default_warehouse: default_warehouse(),
            workday_hours: default_workday_hours(),
            weekly_capacity_hours: default_weekly_capacity_hours(),
            repeat_repair_window_days: default_repeat_window_days(),
            scheduler_enabled: true,
            job_costing_refresh_hour: default_refresh_hour(),
        }
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_pool_bounds");
            err.message = Some("db_min_connections must not exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }

        if self.is_production() && self.database_url.starts_with("sqlite:") {
            let mut err = ValidationError::new("production_sqlite");
            err.message = Some("production deployments require a Postgres database_url".into());
            errors.add("database_url", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

fn default_company() -> String {
    "Workshop".to_string()
}

fn default_warehouse() -> String {
    "Stores - WS".to_string()
}

fn default_workday_hours() -> u32 {
    DEFAULT_WORKDAY_HOURS
}

fn default_weekly_capacity_hours() -> u32 {
    DEFAULT_WEEKLY_CAPACITY_HOURS
}

fn default_repeat_window_days() -> u32 {
    DEFAULT_REPEAT_WINDOW_DAYS
}

fn default_refresh_hour() -> u32 {
    DEFAULT_REFRESH_HOUR
}

fn default_true_bool() -> bool {
    true
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new("invalid_log_level")),
    }
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 || capacity > 100_000 {
        return Err(ValidationError::new("invalid_event_channel_capacity"));
    }
    Ok(())
}

/// Installs the global tracing subscriber. `RUST_LOG` wins over `level` when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("repairshop_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::new(filter_directive);
    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads configuration from built-in defaults, `config/default`, `config/{RUN_ENV}` and
/// `APP__*` environment variables, in that order of precedence.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    load_config_from(CONFIG_DIR, &run_env)
}

fn load_config_from(config_dir: &str, run_env: &str) -> Result<AppConfig, AppConfigError> {
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(config_dir).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://repairshop.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", run_env)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
        .add_source(File::with_name(&format!("{}/{}", config_dir, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration constraint validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
