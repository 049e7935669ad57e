//! Scenario: resolving the target project from a registry file.
//!
//! # Invariants under test
//!
//! 1. Addresses parse case-insensitively; auxiliary fields are preserved
//!    untouched.
//! 2. An unknown project names the registry's projects in its error.
//! 3. A malformed address is a `BadAddress` for that project.
//! 4. `RunTarget` + registry file on disk resolve the current project.

use std::collections::HashMap;

use nftsnap_config::{ConfigError, ProjectRegistry, RunTarget};
use nftsnap_store::parse_address;

const REGISTRY: &str = r#"{
  "yoki": {
    "address": "0xABCDEF0000000000000000000000000000000001",
    "startsWithToken0": true,
    "baseURI": "ipfs://bafy/",
    "price": "0.01",
    "metadataEntries": 3
  },
  "his": {
    "address": "0x00000000000000000000000000000000000000b2",
    "isMintPayable": false
  }
}"#;

#[test]
fn registry_preserves_extras() -> anyhow::Result<()> {
    let reg = ProjectRegistry::from_json_str(REGISTRY, "mem")?;
    assert_eq!(reg.names(), vec!["his", "yoki"]);

    let yoki = reg.get("yoki")?;
    assert_eq!(
        Some(yoki.address),
        parse_address("0xabcdef0000000000000000000000000000000001")
    );
    assert!(yoki.starts_with_token0);
    assert_eq!(yoki.extras["baseURI"], serde_json::json!("ipfs://bafy/"));
    assert_eq!(yoki.extras["metadataEntries"], serde_json::json!(3));
    assert!(!yoki.extras.contains_key("address"));

    let his = reg.get("his")?;
    assert_eq!(his.first_token_id(), 1);
    assert_eq!(his.extras["isMintPayable"], serde_json::json!(false));
    Ok(())
}

#[test]
fn unknown_project_lists_available() -> anyhow::Result<()> {
    let reg = ProjectRegistry::from_json_str(REGISTRY, "mem")?;
    let err = reg.get("nope").unwrap_err();
    assert_eq!(
        err,
        ConfigError::UnknownProject {
            project: "nope".to_string(),
            available: vec!["his".to_string(), "yoki".to_string()],
        }
    );
    assert!(err.to_string().contains("his, yoki"));
    Ok(())
}

#[test]
fn malformed_address() {
    let err = ProjectRegistry::from_json_str(r#"{"x": {"address": "0x1234"}}"#, "mem").unwrap_err();
    assert_eq!(
        err,
        ConfigError::BadAddress {
            project: "x".to_string(),
            raw: "0x1234".to_string()
        }
    );
}

#[test]
fn target_resolves_project_from_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("reg.json");
    std::fs::write(&file, REGISTRY)?;

    let vars: HashMap<&str, String> = [
        ("CURRENT_PROJECT", "yoki".to_string()),
        ("CHAIN_NAME", "Soneium".to_string()),
        ("PROJECTS_FILE", file.to_string_lossy().to_string()),
    ]
    .into_iter()
    .collect();
    let target = RunTarget::from_lookup(true, |k| vars.get(k).cloned())?;
    let reg = target.load_registry()?;
    let project = target.current_project(&reg)?;
    assert_eq!(project.name, "yoki");
    assert_eq!(project.first_token_id(), 0);
    assert_eq!(reg.source(), file.to_string_lossy());
    Ok(())
}

#[test]
fn missing_registry_file_is_io_error() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let err = ProjectRegistry::load(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    Ok(())
}
