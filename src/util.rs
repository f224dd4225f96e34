use anyhow::{anyhow, Result};
use mac_address::get_mac_address;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::GeneralConfig;

pub const DEVICE_ID_ENV: &str = "GEOTICK_DEVICE_ID";
pub const FALLBACK_DEVICE_ID: &str = "0000";

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn get_device_mac() -> Option<String> {
    get_mac_address().ok().flatten().map(|addr| {
        addr.to_string()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_uppercase()
    })
}

pub fn get_device_id(config: &GeneralConfig) -> String {
    pick_device_id(
        std::env::var(DEVICE_ID_ENV).ok(),
        config.device_id.as_deref(),
        get_device_mac,
    )
}

fn pick_device_id(
    from_env: Option<String>,
    configured: Option<&str>,
    mac: impl FnOnce() -> Option<String>,
) -> String {
    from_env
        .filter(|id| !id.is_empty())
        .or_else(|| configured.filter(|id| !id.is_empty()).map(str::to_string))
        .or_else(mac)
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| FALLBACK_DEVICE_ID.to_string())
}

pub fn setup_logging(log_level: &str) -> Result<()> {
    let level: Directive = log_level
        .parse()
        .map_err(|e| anyhow!("Invalid log level {:?}: {}", log_level, e))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .pretty(),
        )
        .with(
            EnvFilter::from_default_env()
                .add_directive(level)
                .add_directive("hyper=info".parse()?)
                .add_directive("reqwest=info".parse()?),
        )
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_wins_over_config_and_mac() {
        let id = pick_device_id(Some("env-id".into()), Some("cfg-id"), || {
            Some("AABBCC".into())
        });
        assert_eq!(id, "env-id");
    }

    #[test]
    fn config_wins_over_mac() {
        let id = pick_device_id(None, Some("cfg-id"), || Some("AABBCC".into()));
        assert_eq!(id, "cfg-id");
    }

    #[test]
    fn mac_used_when_nothing_configured() {
        let id = pick_device_id(Some(String::new()), None, || Some("AABBCC".into()));
        assert_eq!(id, "AABBCC");
    }

    #[test]
    fn falls_back_to_zeros() {
        assert_eq!(pick_device_id(None, None, || None), FALLBACK_DEVICE_ID);
        assert_eq!(pick_device_id(None, Some(""), || None), "0000");
    }
}
