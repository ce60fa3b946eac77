use serde::Deserialize;
use std::env;

use crate::models::Variant;
use crate::services::session_store::DEFAULT_SESSION_TTL_SECONDS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    File,
    Redis,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "file" => Ok(StoreBackend::File),
            "redis" => Ok(StoreBackend::Redis),
            other => Err(format!("unknown session store backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssessmentSettings {
    pub quick_duration_seconds: i64,
    pub standard_duration_seconds: i64,
}

impl AssessmentSettings {
    pub fn duration_for(&self, variant: Variant) -> chrono::Duration {
        let seconds = match variant {
            Variant::Quick => self.quick_duration_seconds,
            Variant::Standard => self.standard_duration_seconds,
        };
        chrono::Duration::seconds(seconds)
    }
}

impl Default for AssessmentSettings {
    fn default() -> Self {
        Self {
            quick_duration_seconds: 300,
            standard_duration_seconds: 1800,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailSettings {
    pub server: String,
    pub port: u16,
    pub login: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    #[serde(default)]
    pub use_tls: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bind_addr: String,
    pub store_backend: StoreBackend,
    pub store_dir: String,
    pub redis_uri: Option<String>,
    pub session_ttl_seconds: u64,
    pub assessment: AssessmentSettings,
    pub tick_interval_ms: u64,
    pub admin_secret: String,
    pub admin_email: String,
    pub site_name: String,
    pub email: Option<EmailSettings>,
    pub form_rate_limit_per_minute: u32,
    pub assessment_rate_limit_per_minute: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8081".to_string(),
            store_backend: StoreBackend::Memory,
            store_dir: "data/sessions".to_string(),
            redis_uri: None,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            assessment: AssessmentSettings::default(),
            tick_interval_ms: 1000,
            admin_secret: "dev-admin-secret".to_string(),
            admin_email: "admissions@brightpath.example".to_string(),
            site_name: "Brightpath Academy".to_string(),
            email: None,
            form_rate_limit_per_minute: 5,
            assessment_rate_limit_per_minute: 30,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first, then the crate-local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let env_name = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml + APP__* overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env_name)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let defaults = Config::default();

        let string_setting = |key: &str, env_key: &str| -> Option<String> {
            settings
                .get_string(key)
                .ok()
                .or_else(|| env::var(env_key).ok())
                .filter(|value| !value.trim().is_empty())
        };
        let number_setting = |key: &str, env_key: &str| -> Option<i64> {
            settings
                .get_int(key)
                .ok()
                .or_else(|| env::var(env_key).ok().and_then(|v| v.parse().ok()))
        };

        let store_backend = match string_setting("store.backend", "SESSION_STORE") {
            Some(value) => value
                .parse::<StoreBackend>()
                .map_err(config::ConfigError::Message)?,
            None => defaults.store_backend,
        };

        let redis_uri = string_setting("redis.uri", "REDIS_URI");
        if store_backend == StoreBackend::Redis && redis_uri.is_none() {
            return Err(config::ConfigError::Message(
                "REDIS_URI must be set when SESSION_STORE=redis".to_string(),
            ));
        }

        let admin_secret = match string_setting("admin.secret", "ADMIN_SECRET") {
            Some(secret) => secret,
            None if env_name == "prod" => {
                return Err(config::ConfigError::Message(
                    "ADMIN_SECRET must be set in production".to_string(),
                ));
            }
            None => {
                eprintln!("WARNING: Using default ADMIN_SECRET (dev mode only!)");
                defaults.admin_secret.clone()
            }
        };

        let email = string_setting("email.server", "SMTP_SERVER").map(|server| EmailSettings {
            server,
            port: number_setting("email.port", "SMTP_PORT")
                .and_then(|v| u16::try_from(v).ok())
                .unwrap_or(587),
            login: string_setting("email.login", "SMTP_LOGIN").unwrap_or_default(),
            password: string_setting("email.password", "SMTP_PASSWORD").unwrap_or_default(),
            from_email: string_setting("email.from_email", "SMTP_FROM_EMAIL")
                .unwrap_or_else(|| defaults.admin_email.clone()),
            from_name: string_setting("email.from_name", "SMTP_FROM_NAME")
                .unwrap_or_else(|| defaults.site_name.clone()),
            use_tls: string_setting("email.use_tls", "SMTP_USE_TLS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(true),
        });
        if email.is_none() {
            eprintln!("WARNING: SMTP is not configured, outgoing mail will only be logged");
        }

        let positive = |value: Option<i64>, fallback: i64| value.filter(|v| *v > 0).unwrap_or(fallback);

        Ok(Config {
            bind_addr: string_setting("server.bind_addr", "BIND_ADDR")
                .unwrap_or(defaults.bind_addr),
            store_backend,
            store_dir: string_setting("store.dir", "SESSION_STORE_DIR")
                .unwrap_or(defaults.store_dir),
            redis_uri,
            session_ttl_seconds: positive(
                number_setting("store.ttl_seconds", "SESSION_TTL_SECONDS"),
                defaults.session_ttl_seconds as i64,
            ) as u64,
            assessment: AssessmentSettings {
                quick_duration_seconds: positive(
                    number_setting(
                        "assessment.quick_duration_seconds",
                        "QUICK_DURATION_SECONDS",
                    ),
                    defaults.assessment.quick_duration_seconds,
                ),
                standard_duration_seconds: positive(
                    number_setting(
                        "assessment.standard_duration_seconds",
                        "STANDARD_DURATION_SECONDS",
                    ),
                    defaults.assessment.standard_duration_seconds,
                ),
            },
            tick_interval_ms: positive(
                number_setting("assessment.tick_interval_ms", "SSE_TICK_INTERVAL_MS"),
                defaults.tick_interval_ms as i64,
            ) as u64,
            admin_secret,
            admin_email: string_setting("admin.email", "ADMIN_EMAIL")
                .unwrap_or(defaults.admin_email),
            site_name: string_setting("site.name", "SITE_NAME").unwrap_or(defaults.site_name),
            email,
            form_rate_limit_per_minute: positive(
                number_setting("forms.rate_limit_per_minute", "RATE_LIMIT_FORMS_PER_MINUTE"),
                defaults.form_rate_limit_per_minute as i64,
            ) as u32,
            assessment_rate_limit_per_minute: positive(
                number_setting(
                    "assessment.rate_limit_per_minute",
                    "RATE_LIMIT_ASSESSMENTS_PER_MINUTE",
                ),
                defaults.assessment_rate_limit_per_minute as i64,
            ) as u32,
        })
    }
}
