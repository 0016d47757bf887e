use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_environment, parse_f64,
    parse_u16, parse_u32, parse_u64, parse_usize,
};
use super::types::{
    AiSettings, ApiSettings, ConfigError, CorsSettings, DatabaseSettings, GradingMode,
    GradingSettings, RuntimeSettings, ServerHost, ServerPort, ServerSettings, Settings,
    TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("GRADER_HOST", "0.0.0.0");
        let port = env_or_default("GRADER_PORT", "8000");

        let environment =
            parse_environment(env_optional("GRADER_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("GRADER_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Essay Grader API");
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "grader");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "essay_grader");
        let database_url = env_optional("DATABASE_URL");

        let openai_api_key = env_or_default("OPENAI_API_KEY", "");
        let openai_base_url = env_or_default("OPENAI_BASE_URL", "https://api.openai.com/v1");
        let ai_model = env_or_default("AI_MODEL", "gpt-4o-mini");
        let ai_max_tokens = parse_u32("AI_MAX_TOKENS", env_or_default("AI_MAX_TOKENS", "2000"))?;
        let ai_temperature =
            parse_f64("AI_TEMPERATURE", env_or_default("AI_TEMPERATURE", "0.2"))?;
        let ai_request_timeout =
            parse_u64("AI_REQUEST_TIMEOUT", env_or_default("AI_REQUEST_TIMEOUT", "120"))?;
        let requests_per_minute = parse_u32(
            "AI_REQUESTS_PER_MINUTE",
            env_or_default("AI_REQUESTS_PER_MINUTE", "60"),
        )?;

        let default_mode =
            GradingMode::parse_or(env_optional("GRADING_MODE").as_deref(), GradingMode::Queued);
        let queue_capacity = parse_usize(
            "GRADING_QUEUE_CAPACITY",
            env_or_default("GRADING_QUEUE_CAPACITY", "100"),
        )?;
        let worker_count =
            parse_usize("GRADING_WORKERS", env_or_default("GRADING_WORKERS", "3"))?;
        let auto_retry_limit = parse_u32(
            "GRADING_AUTO_RETRY_LIMIT",
            env_or_default("GRADING_AUTO_RETRY_LIMIT", "0"),
        )?;
        let auto_retry_interval_seconds = parse_u64(
            "GRADING_AUTO_RETRY_INTERVAL_SECONDS",
            env_or_default("GRADING_AUTO_RETRY_INTERVAL_SECONDS", "900"),
        )?;
        let stale_processing_seconds = match env_optional("GRADING_STALE_PROCESSING_SECONDS") {
            Some(value) => parse_u64("GRADING_STALE_PROCESSING_SECONDS", value)?,
            None => ai_request_timeout.saturating_mul(3).saturating_add(120),
        };

        let log_level = env_or_default("GRADER_LOG_LEVEL", "info");
        let json = env_optional("GRADER_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, api_v1_str },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            ai: AiSettings {
                openai_api_key,
                openai_base_url,
                ai_model,
                ai_max_tokens,
                ai_temperature,
                ai_request_timeout,
                requests_per_minute,
            },
            grading: GradingSettings {
                default_mode,
                queue_capacity,
                worker_count,
                auto_retry_limit,
                auto_retry_interval_seconds,
                stale_processing_seconds,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn ai(&self) -> &AiSettings {
        &self.ai
    }

    pub(crate) fn grading(&self) -> &GradingSettings {
        &self.grading
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.grading.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "GRADING_QUEUE_CAPACITY",
                value: "0".to_string(),
            });
        }

        if self.grading.worker_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "GRADING_WORKERS",
                value: "0".to_string(),
            });
        }

        if self.ai.ai_request_timeout == 0 {
            return Err(ConfigError::InvalidValue {
                field: "AI_REQUEST_TIMEOUT",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.ai.openai_api_key.is_empty() {
            return Err(ConfigError::MissingSecret("OPENAI_API_KEY"));
        }

        Ok(())
    }
}
