//! Scenario: `verify-owners` against a mock JSON-RPC node.
//!
//! # Invariants under test
//!
//! 1. One verified token and one moved token give
//!    `total_checked=2 verified_count=1 mismatch_count=1 error_count=0` and a
//!    single mismatch line; the exit status is still success.
//! 2. Mixed-case addresses in the snapshot compare equal to the node's answer.
//! 3. A node serving a different chain id is refused before any ownerOf read.
//! 4. A missing snapshot file is fatal.

use std::path::Path;

use assert_cmd::Command;
use httpmock::prelude::*;
use predicates::prelude::*;
use serde_json::json;

const TOKEN: &str = "0x00000000000000000000000000000000000000c0";
const AA: &str = "0x00000000000000000000000000000000000000aa";
const BB: &str = "0x00000000000000000000000000000000000000bb";
const CC: &str = "0x00000000000000000000000000000000000000cc";

const SETTINGS: &str = "retry:\n  max_attempts: 2\n  delay_ms: 0\n  call_timeout_ms: 5000\n\
pacing:\n  page_ms: 0\n  point_read_ms: 0\n";

fn word_for(addr: &str) -> String {
    format!("0x{:0>64}", addr.trim_start_matches("0x"))
}

fn owner_of_data(id: u8) -> String {
    format!("6352211e{:064x}", id)
}

#[allow(deprecated)]
fn nftsnap(dir: &Path, server: &MockServer) -> Command {
    std::fs::write(
        dir.join("registry.json"),
        json!({ "yoki": { "address": TOKEN } }).to_string(),
    )
    .unwrap();
    std::fs::write(dir.join("settings.yaml"), SETTINGS).unwrap();
    std::fs::create_dir_all(dir.join("out")).unwrap();
    std::fs::write(
        dir.join("out/yoki_instances.csv"),
        "address,tokenId\n\
         0x00000000000000000000000000000000000000AA,1\n\
         0x00000000000000000000000000000000000000BB,2\n",
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("nftsnap").unwrap();
    cmd.current_dir(dir)
        .env("CURRENT_PROJECT", "yoki")
        .env("CHAIN_NAME", "Soneium")
        .env("PROJECTS_FILE", "registry.json")
        .env("NFTSNAP_SNAPSHOT_DIR", "out")
        .env("RPC_URL", server.url("/"))
        .env_remove("EXPLORER_API_URL")
        .env("RUST_LOG", "warn")
        .args(["--settings", "settings.yaml"]);
    cmd
}

fn mock_chain_id(server: &MockServer, hex_id: &str) {
    server.mock(|when, then| {
        when.method(POST).path("/").body_contains("eth_chainId");
        then.status(200)
            .json_body(json!({ "jsonrpc": "2.0", "id": 1, "result": hex_id }));
    });
}

fn mock_owner<'a>(server: &'a MockServer, id: u8, owner: &str) -> httpmock::Mock<'a> {
    server.mock(|when, then| {
        when.method(POST).path("/").body_contains(owner_of_data(id));
        then.status(200)
            .json_body(json!({ "jsonrpc": "2.0", "id": 2, "result": word_for(owner) }));
    })
}

#[test]
fn moved_token_is_one_mismatch() -> anyhow::Result<()> {
    let server = MockServer::start();
    mock_chain_id(&server, "0x74c");
    mock_owner(&server, 1, AA);
    mock_owner(&server, 2, CC);
    let dir = tempfile::tempdir()?;

    nftsnap(dir.path(), &server)
        .arg("verify-owners")
        .assert()
        .success()
        .stdout(predicate::str::contains("total_checked=2"))
        .stdout(predicate::str::contains("verified_count=1"))
        .stdout(predicate::str::contains("mismatch_count=1"))
        .stdout(predicate::str::contains("error_count=0"))
        .stdout(predicate::str::contains("completed=true"))
        .stdout(predicate::str::contains(format!(
            "mismatch key=2 expected={BB} actual={CC}"
        )))
        .stdout(predicate::str::contains("mismatch key=1").not());
    Ok(())
}

#[test]
fn wrong_chain_is_refused_before_reads() -> anyhow::Result<()> {
    let server = MockServer::start();
    mock_chain_id(&server, "0x1");
    let owner_reads = mock_owner(&server, 1, AA);
    let dir = tempfile::tempdir()?;

    nftsnap(dir.path(), &server)
        .arg("verify-owners")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "rpc endpoint serves chain id 1, configured chain id is 1868",
        ));

    owner_reads.assert_hits(0);
    Ok(())
}

#[test]
fn missing_snapshot_is_fatal() -> anyhow::Result<()> {
    let server = MockServer::start();
    mock_chain_id(&server, "0x74c");
    let dir = tempfile::tempdir()?;

    nftsnap(dir.path(), &server)
        .args(["verify-owners", "--snapshot", "out/absent.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("load ownership snapshot failed"));
    Ok(())
}
