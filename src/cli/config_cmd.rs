//! Config command handler

use crate::application::ports::ConfigStore;
use crate::domain::config::{is_valid_sample_buffer_len, AppConfig, TICK_INTERVAL_RANGE_MS};
use crate::domain::error::ConfigError;
use crate::domain::recording::Duration;

use super::args::{is_valid_config_key, ConfigAction, VALID_CONFIG_KEYS};
use super::presenter::Presenter;

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

fn check_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        return Ok(());
    }
    Err(ConfigError::ValidationError {
        key: key.to_string(),
        message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
    })
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;
    let mut config = store.load().await?;
    apply_value(&mut config, key, value)?;
    store.save(&config).await?;
    presenter.success(&format!("{} = {}", key, value));
    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;
    let config = store.load().await?;
    match read_value(&config, key) {
        Some(v) => presenter.output(&v),
        None => presenter.output("(not set)"),
    }
    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;
    for key in VALID_CONFIG_KEYS {
        let value = read_value(&config, key).unwrap_or_else(|| "(not set)".to_string());
        presenter.key_value(key, &value);
    }
    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

fn read_value(config: &AppConfig, key: &str) -> Option<String> {
    match key {
        "time_limit" => config.time_limit.clone(),
        "preparation" => config.preparation.clone(),
        "speaking_default" => config.speaking_default.clone(),
        "allow_re_record" => config.allow_re_record.map(|b| b.to_string()),
        "tick_interval_ms" => config.tick_interval_ms.map(|v| v.to_string()),
        "sample_buffer_len" => config.sample_buffer_len.map(|v| v.to_string()),
        "output_dir" => config.output_dir.clone(),
        _ => None,
    }
}

/// Validate `value` for `key` and store it
fn apply_value(config: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = |message: String| ConfigError::ValidationError {
        key: key.to_string(),
        message,
    };

    match key {
        "time_limit" | "preparation" | "speaking_default" => {
            let duration: Duration = value.parse().map_err(|e| invalid(format!("{}", e)))?;
            let normalized = Some(duration.to_string());
            match key {
                "time_limit" => config.time_limit = normalized,
                "preparation" => config.preparation = normalized,
                _ => config.speaking_default = normalized,
            }
        }
        "allow_re_record" => {
            let flag = parse_bool(value)
                .map_err(|_| invalid("Value must be 'true' or 'false'".to_string()))?;
            config.allow_re_record = Some(flag);
        }
        "tick_interval_ms" => {
            let (min, max) = TICK_INTERVAL_RANGE_MS;
            let ms: u64 = value
                .parse()
                .map_err(|_| invalid("Value must be a whole number of milliseconds".to_string()))?;
            if !(min..=max).contains(&ms) {
                return Err(invalid(format!("Value must be between {} and {}", min, max)));
            }
            config.tick_interval_ms = Some(ms);
        }
        "sample_buffer_len" => {
            let len: usize = value
                .parse()
                .map_err(|_| invalid("Value must be a whole number".to_string()))?;
            if !is_valid_sample_buffer_len(len) {
                return Err(invalid(
                    "Value must be a power of two between 32 and 32768".to_string(),
                ));
            }
            config.sample_buffer_len = Some(len);
        }
        "output_dir" => {
            if value.trim().is_empty() {
                return Err(invalid("Value must not be empty".to_string()));
            }
            config.output_dir = Some(value.to_string());
        }
        _ => return Err(invalid("Unknown key".to_string())),
    }
    Ok(())
}

/// Parse a boolean value
fn parse_bool(value: &str) -> Result<bool, ()> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(()),
    }
}
