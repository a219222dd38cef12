use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PLAN_PATH: &str =
    "/subscriptions/sub-1/resourceGroups/rg/providers/Microsoft.Web/serverfarms/web";
const POOL_PATH: &str = "/subscriptions/sub-1/resourceGroups/rg/providers/Microsoft.Sql/servers/sql1/elasticPools/pool1";

/// Helper to create a test command isolated from the caller's environment
fn azscale() -> Command {
    let mut cmd = Command::cargo_bin("azscale").unwrap();
    cmd.env_remove("AZURE_SUBSCRIPTION_ID")
        .env_remove("AZSCALE_CONFIG_FILE")
        .env_remove("RUST_LOG");
    cmd
}

/// Config file pointing at `endpoint`, or an empty one when `None`
fn config_file(dir: &TempDir, endpoint: Option<&str>) -> PathBuf {
    let path = dir.path().join("config.toml");
    let content = match endpoint {
        Some(endpoint) => format!("management_endpoint = \"{}\"\n", endpoint),
        None => String::new(),
    };
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_help_flag() {
    azscale()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Scale Azure App Service Plans"))
        .stdout(predicate::str::contains("EXAMPLES:"));
}

#[test]
fn test_version_flag() {
    azscale()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("azscale"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_version_command_json() {
    azscale()
        .args(["version", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"version\""))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_no_args_shows_help() {
    azscale()
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_invalid_subcommand() {
    azscale()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_plan_help_lists_flags() {
    azscale()
        .args(["app-service-plan", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--target-sku"))
        .stdout(predicate::str::contains("--auto-adjust-capacity"))
        .stdout(predicate::str::contains("--list-skus"));
}

#[test]
fn test_pool_alias_help_lists_flags() {
    azscale()
        .args(["pool", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--pool-max-size"))
        .stdout(predicate::str::contains("--list-options"));
}

#[test]
fn test_completions_bash() {
    azscale()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("azscale"));
}

#[test]
fn test_missing_subscription_exits_two() {
    let dir = TempDir::new().unwrap();
    let config = config_file(&dir, None);

    azscale()
        .arg("--config-file")
        .arg(&config)
        .args(["plan", "-g", "rg", "--plan-name", "web", "--target-sku", "S1"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("No subscription given"));
}

#[test]
fn test_missing_target_exits_two() {
    azscale()
        .args(["plan", "--subscription-id", "sub-1", "-g", "rg", "--plan-name", "web"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("--target-sku"));
}

#[test]
fn test_invalid_tier_exits_two() {
    azscale()
        .args([
            "elastic-pool",
            "--subscription-id",
            "sub-1",
            "-g",
            "rg",
            "--server-name",
            "sql1",
            "--pool-name",
            "pool1",
            "--target-tier",
            "hyperscale",
        ])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_invalid_size_exits_two() {
    let dir = TempDir::new().unwrap();
    let config = config_file(&dir, None);

    azscale()
        .arg("--config-file")
        .arg(&config)
        .args([
            "elastic-pool",
            "--subscription-id",
            "sub-1",
            "-g",
            "rg",
            "--server-name",
            "sql1",
            "--pool-name",
            "pool1",
            "--target-tier",
            "standard",
            "--pool-max-size",
            "5XB",
        ])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Invalid size format"));
}

#[test]
fn test_corrupt_config_exits_one() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[[[broken").unwrap();

    azscale()
        .arg("--config-file")
        .arg(&config)
        .args(["plan", "--subscription-id", "sub-1", "-g", "rg", "--plan-name", "web", "--target-sku", "S1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Failed to parse config"));
}

// ---------------------------------------------------------------------------
// Against a mock Resource Manager
// ---------------------------------------------------------------------------

async fn mount_plan(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(PLAN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "location": "westeurope",
            "kind": "app",
            "sku": {"name": "S1", "tier": "Standard", "capacity": 1}
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/skus", PLAN_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [
            {"sku": {"name": "S1", "tier": "Standard"}, "capacity": {"minimum": 1, "maximum": 10, "default": 1}},
            {"sku": {"name": "P1v3", "tier": "PremiumV3"}, "capacity": {"minimum": 1, "maximum": 30, "default": 1}}
        ]})))
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_plan_dry_run_writes_nothing() {
    let server = MockServer::start().await;
    mount_plan(&server).await;
    let dir = TempDir::new().unwrap();
    let config = config_file(&dir, Some(&server.uri()));

    azscale()
        .env("AZURE_ACCESS_TOKEN", "test-token")
        .arg("--config-file")
        .arg(&config)
        .args([
            "app-service-plan",
            "--subscription-id",
            "sub-1",
            "-g",
            "rg",
            "--plan-name",
            "web",
            "--target-sku",
            "p1v3",
            "--capacity",
            "40",
            "--auto-adjust-capacity",
            "--dry-run",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Current: S1 (Standard), capacity 1"))
        .stdout(predicate::str::contains("Adjusted capacity: 40 -> 30"))
        .stdout(predicate::str::contains("Dry run: not applying changes."));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_plan_unsupported_sku_exits_one() {
    let server = MockServer::start().await;
    mount_plan(&server).await;
    let dir = TempDir::new().unwrap();
    let config = config_file(&dir, Some(&server.uri()));

    azscale()
        .env("AZURE_ACCESS_TOKEN", "test-token")
        .arg("--config-file")
        .arg(&config)
        .args([
            "plan",
            "--subscription-id",
            "sub-1",
            "-g",
            "rg",
            "--plan-name",
            "web",
            "--target-sku",
            "P9v9",
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("SKU P9v9 is not supported"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_plan_listing_prints_table() {
    let server = MockServer::start().await;
    mount_plan(&server).await;
    let dir = TempDir::new().unwrap();
    let config = config_file(&dir, Some(&server.uri()));

    azscale()
        .env("AZURE_ACCESS_TOKEN", "test-token")
        .arg("--config-file")
        .arg(&config)
        .args(["plan", "--subscription-id", "sub-1", "-g", "rg", "--plan-name", "web", "--list-skus"])
        .assert()
        .success()
        .stdout(predicate::str::contains("MAX_WORKERS"))
        .stdout(predicate::str::contains("PremiumV3"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pool_listing_without_capabilities_exits_one() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(POOL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "location": "westeurope",
            "sku": {"name": "StandardPool", "tier": "Standard", "capacity": 50}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(
            "/subscriptions/sub-1/providers/Microsoft.Sql/locations/westeurope/capabilities",
        ))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let config = config_file(&dir, Some(&server.uri()));

    azscale()
        .env("AZURE_ACCESS_TOKEN", "test-token")
        .arg("--config-file")
        .arg(&config)
        .args([
            "pool",
            "--subscription-id",
            "sub-1",
            "-g",
            "rg",
            "--server-name",
            "sql1",
            "--pool-name",
            "pool1",
            "--list-options",
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Could not list DTU elastic pool options"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_vcore_pool_listing_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(POOL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "location": "westeurope",
            "sku": {"name": "GP_Gen5", "tier": "GeneralPurpose", "capacity": 2}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(
            "/subscriptions/sub-1/providers/Microsoft.Sql/locations/westeurope/capabilities",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let config = config_file(&dir, Some(&server.uri()));

    azscale()
        .env("AZURE_ACCESS_TOKEN", "test-token")
        .arg("--config-file")
        .arg(&config)
        .args([
            "pool",
            "--subscription-id",
            "sub-1",
            "-g",
            "rg",
            "--server-name",
            "sql1",
            "--pool-name",
            "pool1",
            "--list-options",
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("vCore"));
}
