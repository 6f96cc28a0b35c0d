use std::str::FromStr;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global subscriber. A bare level such as `debug` is widened
/// with quieter defaults for the HTTP stack; full directive strings are
/// used as given.
pub fn setup_logging(log_level: &str, json_format: bool) {
    let filter_spec = filter_spec(log_level);
    let filter = EnvFilter::from_str(&filter_spec).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry().with(filter);

    if json_format {
        let json_layer = fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(true);
        subscriber.with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer().with_target(true).compact();
        subscriber.with(fmt_layer).init();
    }

    tracing::info!(
        filter = %filter_spec,
        format = if json_format { "json" } else { "compact" },
        "logging initialized"
    );
}

fn filter_spec(log_level: &str) -> String {
    let normalized = log_level.trim();
    if normalized.contains(',') || normalized.contains('=') {
        normalized.to_string()
    } else if normalized.is_empty() {
        "info,h2=info,hyper=info,hyper_util=info,reqwest=info".to_string()
    } else {
        format!("{normalized},h2=info,hyper=info,hyper_util=info,reqwest=info")
    }
}
