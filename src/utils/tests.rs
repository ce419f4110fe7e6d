use super::RelayError;
use super::logging;
use crate::broker::{BrokerError, SubscriptionBinding};
use std::time::Duration;

#[test]
fn logging_init_accepts_levels() {
    // Should not panic
    logging::init("info");
    logging::init("debug");
    logging::init("warn");
}

#[test]
fn filter_uses_configured_level_without_directives() {
    let filter = logging::filter("debug", None).to_string();
    assert!(filter.eq_ignore_ascii_case("debug"), "got {filter}");
}

#[test]
fn filter_prefers_valid_directives() {
    let filter = logging::filter("info", Some("eventrelay::broker=trace")).to_string();
    assert!(filter.contains("eventrelay::broker=trace"), "got {filter}");
}

#[test]
fn filter_ignores_unparsable_directives() {
    let filter = logging::filter("warn", Some("eventrelay=loud")).to_string();
    assert!(filter.eq_ignore_ascii_case("warn"), "got {filter}");
}

#[test]
fn parse_level_falls_back_to_info() {
    assert_eq!(logging::parse_level("WARNING"), tracing::Level::WARN);
    assert_eq!(logging::parse_level("trace"), tracing::Level::TRACE);
    assert_eq!(logging::parse_level("verbose"), tracing::Level::INFO);
}

#[test]
fn relay_error_labels_and_messages() {
    let err = RelayError::Timeout {
        operation: "delete_topic",
        timeout: Duration::from_millis(250),
    };
    assert_eq!(err.as_label(), "timeout");
    assert_eq!(err.to_string(), "delete_topic timed out after 250ms");

    let err: RelayError = BrokerError::UnknownTopic("orders".into()).into();
    assert_eq!(err.as_label(), "broker");
    assert_eq!(err.to_string(), "unknown topic 'orders'");

    let binding = SubscriptionBinding::new("orders", "billing", "node-1");
    let err = RelayError::AlreadyRunning(binding);
    assert_eq!(
        err.to_string(),
        "subscription orders/billing/node-1 is already running"
    );
}
