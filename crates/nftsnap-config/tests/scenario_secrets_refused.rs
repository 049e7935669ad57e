//! Scenario: literal credentials never enter the settings tree.
//!
//! # Invariants under test
//!
//! 1. A secret-looking leaf anywhere in any layer fails the load with
//!    `CONFIG_SECRET_DETECTED` naming the pointer.
//! 2. The error message never contains the value.

use nftsnap_config::{load_settings_from_strings, ConfigError, UnusedKeyPolicy};

const SECRET_VALUE: &str = "sk_live_0123456789abcdef";

#[test]
fn secret_literal_is_refused_without_echoing_it() {
    let yaml = format!("notify:\n  webhook_token: \"{SECRET_VALUE}\"\n");
    let err = load_settings_from_strings(&["retry:\n  max_attempts: 2\n", &yaml], UnusedKeyPolicy::Warn)
        .unwrap_err();

    assert_eq!(
        err,
        ConfigError::SecretDetected {
            pointer: "/notify/webhook_token".to_string()
        }
    );
    let msg = err.to_string();
    assert!(msg.contains("CONFIG_SECRET_DETECTED"));
    assert!(msg.contains("value=REDACTED"));
    assert!(!msg.contains(SECRET_VALUE));
}

#[test]
fn env_var_names_are_fine() {
    // refused only as an unused key, not as a secret
    let err = load_settings_from_strings(&["notify:\n  token_env: \"WEBHOOK_TOKEN\"\n"], UnusedKeyPolicy::Fail)
        .unwrap_err();
    assert!(matches!(err, ConfigError::UnusedKeys { count: 1, .. }));
}
