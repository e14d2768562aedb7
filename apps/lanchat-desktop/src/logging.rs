//! Tracing/logging bootstrap for the desktop app.

use std::env;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,lanchat_desktop=debug,lanchat_gateway=debug";

/// Initialize global tracing subscriber with severity gating from environment.
///
/// Precedence:
/// 1) `RUST_LOG`
/// 2) `LANCHAT_DESKTOP_LOG`
/// 3) `LANCHAT_LOG`
/// 4) internal default filter
pub fn init() {
    let env_filter = filter_from_env();
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .try_init();
}

fn filter_from_env() -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    filter_from_lookup(|key| env::var(key).ok())
}

fn filter_from_lookup<F>(lookup: F) -> EnvFilter
where
    F: Fn(&str) -> Option<String>,
{
    for key in ["LANCHAT_DESKTOP_LOG", "LANCHAT_LOG"] {
        if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty())
            && let Ok(filter) = EnvFilter::try_new(value)
        {
            return filter;
        }
    }
    EnvFilter::new(DEFAULT_FILTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_specific_variable_wins_over_shared_one() {
        let filter = filter_from_lookup(|key| match key {
            "LANCHAT_DESKTOP_LOG" => Some("warn".to_owned()),
            "LANCHAT_LOG" => Some("trace".to_owned()),
            _ => None,
        });
        assert_eq!(filter.to_string(), EnvFilter::new("warn").to_string());
    }

    #[test]
    fn falls_back_to_default_filter() {
        let filter = filter_from_lookup(|key| (key == "LANCHAT_DESKTOP_LOG").then(|| " ".to_owned()));
        assert_eq!(filter.to_string(), EnvFilter::new(DEFAULT_FILTER).to_string());
    }
}
