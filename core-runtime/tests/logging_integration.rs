//! Integration tests for logging system

use bridge_traits::log::LogLevel;
use core_runtime::logging::{redact_if_sensitive, strip_path, LogFormat, LoggingConfig};

#[test]
fn test_logging_configuration() {
    // Logging can only be initialized once per process, so only the builder is exercised
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Debug)
        .with_pii_redaction(true)
        .with_spans(true);

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, LogLevel::Debug);
    assert!(config.redact_pii);
    assert!(config.enable_spans);
}

#[test]
fn test_redaction_of_catalog_credentials() {
    assert_eq!(redact_if_sensitive("consumer_key", "abcdef"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("consumer_secret", "ghijkl"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("api_key", "mnopqr"), "[REDACTED]");
}

#[test]
fn test_redaction_of_emails() {
    let redacted = redact_if_sensitive("contact", "user@example.com");

    assert!(redacted.starts_with('u'));
    assert!(redacted.contains("[REDACTED]"));
    assert!(!redacted.contains("example.com"));
}

#[test]
fn test_track_metadata_passes_through() {
    assert_eq!(redact_if_sensitive("artist", "Boards of Canada"), "Boards of Canada");
    assert_eq!(redact_if_sensitive("album", "Geogaddi"), "Geogaddi");
    assert_eq!(redact_if_sensitive("source", "catalog"), "catalog");
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/home/user/Pictures/Air-MoonSafari.png"), "Air-MoonSafari.png");
    assert_eq!(strip_path("C:\\Users\\Jo\\Pictures\\wall.jpg"), "wall.jpg");
    assert_eq!(strip_path("wall.png"), "wall.png");
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_pii_redaction(false)
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.redact_pii);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}
