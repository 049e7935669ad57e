//! Scenario: settings keys the engine never reads are surfaced.
//!
//! # Invariants under test
//!
//! 1. `Warn` loads successfully and lists unused leaf pointers, sorted.
//! 2. `Fail` refuses the same input with `CONFIG_UNUSED_KEYS`.
//! 3. A typo inside a known section is caught (consumption is per leaf).
//! 4. Every built-in default leaf is consumed.

use nftsnap_config::{
    load_settings_from_strings, report_unused_keys, ConfigError, EngineSettings,
    UnusedKeyPolicy,
};

const YAML: &str = r#"
retry:
  max_attempts: 4
  delay: 10
verify:
  sample_fraction: 0.25
zz_section:
  b: 2
  a: 1
"#;

#[test]
fn warn_lists_unused_pointers() -> anyhow::Result<()> {
    let loaded = load_settings_from_strings(&[YAML], UnusedKeyPolicy::Warn)?;
    assert_eq!(
        loaded.unused,
        vec!["/retry/delay", "/zz_section/a", "/zz_section/b"]
    );
    assert_eq!(loaded.settings.retry.max_attempts, 4);
    assert_eq!(loaded.settings.verify.sample_fraction, Some(0.25));
    Ok(())
}

#[test]
fn fail_refuses_unused_pointers() {
    let err = load_settings_from_strings(&[YAML], UnusedKeyPolicy::Fail).unwrap_err();
    match &err {
        ConfigError::UnusedKeys { count, preview } => {
            assert_eq!(*count, 3);
            assert_eq!(preview[0], "/retry/delay");
        }
        other => panic!("expected UnusedKeys, got {other:?}"),
    }
    assert!(err.to_string().starts_with("CONFIG_UNUSED_KEYS"));
}

#[test]
fn defaults_are_fully_consumed() -> anyhow::Result<()> {
    let defaults = serde_json::to_value(EngineSettings::default())?;
    let unused = report_unused_keys(&defaults, UnusedKeyPolicy::Fail)?;
    assert!(unused.is_empty());
    Ok(())
}
