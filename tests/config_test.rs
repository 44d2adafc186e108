use std::sync::Mutex;
use std::time::Duration;

use peace_live::config::Config;

// Tests in this file mutate process-wide environment variables.
static ENV_LOCK: Mutex<()> = Mutex::new(());

const VARS: [&str; 6] = [
    "PEACE_API_URL",
    "OTEL_ENDPOINT",
    "LOG_LEVEL",
    "EVENT_LOG_CAPACITY",
    "RECONNECT_DELAYS_MS",
    "PIPELINE_FILE",
];

fn clear_env() {
    for name in VARS {
        unsafe {
            std::env::remove_var(name);
        }
    }
}

#[test]
fn config_from_env_loads_required_fields() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env();
    unsafe {
        std::env::set_var("PEACE_API_URL", "http://localhost:8000/");
    }

    let config = Config::from_env().unwrap();
    assert_eq!(config.api_url, "http://localhost:8000");
    assert_eq!(config.log_level, "info");
    assert_eq!(config.event_log_capacity, 200);
    assert_eq!(config.reconnect_delays.len(), 5);
    assert_eq!(config.reconnect_delays[4], Duration::from_secs(30));
    assert!(config.otel_endpoint.is_none());
    assert_eq!(config.topology().unwrap().len(), 9);

    clear_env();
}

#[test]
fn config_from_env_fails_without_required() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env();

    let result = Config::from_env();
    assert!(result.is_err());
}

#[test]
fn config_overrides_flow_into_session_config() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env();
    unsafe {
        std::env::set_var("PEACE_API_URL", "http://dashboard:8000");
        std::env::set_var("EVENT_LOG_CAPACITY", "50");
        std::env::set_var("RECONNECT_DELAYS_MS", "100,500");
        std::env::set_var("LOG_LEVEL", "debug");
    }

    let config = Config::from_env().unwrap();
    let session = config.session_config();
    assert_eq!(session.event_log_capacity, 50);
    assert_eq!(
        session.reconnect_delays,
        vec![Duration::from_millis(100), Duration::from_millis(500)]
    );
    assert_eq!(config.log_level, "debug");

    clear_env();
}

#[test]
fn config_rejects_zero_capacity() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env();
    unsafe {
        std::env::set_var("PEACE_API_URL", "http://dashboard:8000");
        std::env::set_var("EVENT_LOG_CAPACITY", "0");
    }

    assert!(Config::from_env().is_err());

    clear_env();
}

#[test]
fn missing_pipeline_file_is_an_error() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_env();
    unsafe {
        std::env::set_var("PEACE_API_URL", "http://dashboard:8000");
        std::env::set_var("PIPELINE_FILE", "/nonexistent/pipeline.toml");
    }

    let config = Config::from_env().unwrap();
    assert!(config.topology().is_err());

    clear_env();
}
