//! Scenario: the settings hash identifies the effective settings.
//!
//! # Invariants under test
//!
//! 1. Loading the same layers twice yields the same hash.
//! 2. Reordering keys inside a document does not change the hash.
//! 3. Restating a built-in default does not change the hash.
//! 4. Changing any value changes the hash.
//! 5. Later layers override earlier ones; the hash follows the merged result,
//!    not how the overrides were split across files.

use nftsnap_config::{load_settings, load_settings_from_strings, UnusedKeyPolicy};

const OVERRIDE: &str = r#"
retry:
  max_attempts: 5
  delay_ms: 250
pacing:
  page_ms: 0
"#;

const OVERRIDE_REORDERED: &str = r#"
pacing:
  page_ms: 0
retry:
  delay_ms: 250
  max_attempts: 5
"#;

#[test]
fn same_input_same_hash() -> anyhow::Result<()> {
    let a = load_settings_from_strings(&[OVERRIDE], UnusedKeyPolicy::Fail)?;
    let b = load_settings_from_strings(&[OVERRIDE], UnusedKeyPolicy::Fail)?;
    assert_eq!(a.settings_hash, b.settings_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
    Ok(())
}

#[test]
fn key_order_does_not_matter() -> anyhow::Result<()> {
    let a = load_settings_from_strings(&[OVERRIDE], UnusedKeyPolicy::Fail)?;
    let b = load_settings_from_strings(&[OVERRIDE_REORDERED], UnusedKeyPolicy::Fail)?;
    assert_eq!(a.settings_hash, b.settings_hash);
    assert_eq!(a.settings.retry.max_attempts, 5);
    assert_eq!(a.settings.pacing.page_ms, 0);
    // untouched defaults survive the merge
    assert_eq!(a.settings.pacing.point_read_ms, 50);
    Ok(())
}

#[test]
fn restating_a_default_is_a_no_op() -> anyhow::Result<()> {
    let none = load_settings_from_strings(&[], UnusedKeyPolicy::Fail)?;
    let same = load_settings_from_strings(&["status:\n  concurrency: 4\n"], UnusedKeyPolicy::Fail)?;
    let empty = load_settings_from_strings(&[""], UnusedKeyPolicy::Fail)?;
    assert_eq!(none.settings_hash, same.settings_hash);
    assert_eq!(none.settings_hash, empty.settings_hash);
    Ok(())
}

#[test]
fn any_change_changes_the_hash() -> anyhow::Result<()> {
    let base = load_settings_from_strings(&[], UnusedKeyPolicy::Fail)?;
    let changed = load_settings_from_strings(&["verify:\n  sample_seed: 7\n"], UnusedKeyPolicy::Fail)?;
    assert_ne!(base.settings_hash, changed.settings_hash);
    Ok(())
}

#[test]
fn layers_merge_in_order() -> anyhow::Result<()> {
    let split = load_settings_from_strings(
        &[
            "retry:\n  max_attempts: 9\n  delay_ms: 250\n",
            "retry:\n  max_attempts: 5\npacing:\n  page_ms: 0\n",
        ],
        UnusedKeyPolicy::Fail,
    )?;
    let single = load_settings_from_strings(&[OVERRIDE], UnusedKeyPolicy::Fail)?;
    assert_eq!(split.settings.retry.max_attempts, 5);
    assert_eq!(split.settings_hash, single.settings_hash);
    Ok(())
}

#[test]
fn files_load_like_strings() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("settings.yaml");
    std::fs::write(&path, OVERRIDE)?;
    let p = path.to_string_lossy().to_string();

    let from_file = load_settings(&[p.as_str()], UnusedKeyPolicy::Fail)?;
    let from_str = load_settings_from_strings(&[OVERRIDE], UnusedKeyPolicy::Fail)?;
    assert_eq!(from_file.settings_hash, from_str.settings_hash);

    let missing = dir.path().join("nope.yaml").to_string_lossy().to_string();
    assert!(load_settings(&[missing.as_str()], UnusedKeyPolicy::Fail).is_err());
    Ok(())
}
