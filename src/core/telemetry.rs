use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::Settings;

/// Noisy dependencies are capped unless `RUST_LOG` says otherwise.
const DEPENDENCY_DIRECTIVES: &str = "sqlx=warn,hyper=warn,reqwest=warn,tower_http=info";

pub(crate) fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},{DEPENDENCY_DIRECTIVES}", settings.telemetry().log_level))
    });

    let builder = fmt().with_env_filter(filter);

    if settings.telemetry().json {
        builder
            .json()
            .with_current_span(true)
            .with_target(true)
            .try_init()
            .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    } else {
        builder.with_target(false).try_init().map_err(|err| anyhow::anyhow!(err.to_string()))?;
    }

    tracing::debug!(
        environment = settings.runtime().environment.as_str(),
        json = settings.telemetry().json,
        "Tracing initialised"
    );

    Ok(())
}
