use crate::config::RuntimeConfig;
use std::io;
use tracing::Level;
use tracing_subscriber::{
    filter::Directive, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry,
};

/// HTTP client internals, capped at warn whatever `LOG_LEVEL` says.
const QUIET_TARGETS: [&str; 3] = ["hyper=warn", "hyper_util=warn", "reqwest=warn"];

fn level_from(name: &str) -> Level {
    match name.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn filter_for(cfg: &RuntimeConfig) -> EnvFilter {
    let level = level_from(&cfg.log_level);
    QUIET_TARGETS
        .iter()
        .filter_map(|d| d.parse::<Directive>().ok())
        .fold(
            EnvFilter::from_default_env().add_directive(level.into()),
            |filter, directive| filter.add_directive(directive),
        )
}

/// Logs go to stderr; stdout carries the rendered dashboard and command
/// output.
pub fn init_tracing(cfg: &RuntimeConfig) {
    let filter = filter_for(cfg);

    if cfg.log_format.eq_ignore_ascii_case("json") {
        let layer = fmt::layer()
            .with_writer(io::stderr)
            .with_ansi(false)
            .with_target(true)
            .json()
            .flatten_event(true);

        Registry::default().with(filter).with(layer).init();
    } else {
        let layer = fmt::layer()
            .with_writer(io::stderr)
            .with_ansi(cfg.log_color)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false);

        Registry::default().with(filter).with(layer).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_levels_fall_back_to_info() {
        assert_eq!(level_from("DEBUG"), Level::DEBUG);
        assert_eq!(level_from(" warn "), Level::WARN);
        assert_eq!(level_from("verbose"), Level::INFO);
    }

    #[test]
    fn quiet_targets_are_valid_directives() {
        for directive in QUIET_TARGETS {
            assert!(
                directive.parse::<Directive>().is_ok(),
                "{directive}"
            );
        }
    }
}
