//! CLI integration tests using assert_cmd.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn gellyfish() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("gellyfish").unwrap()
}

/// A workspace with a config file whose storage lives inside it.
fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("gellyfish.toml"),
        r#"
app_id = "gelly-test"
storage_path = "state/storage.json"

[environments.development]
base_url = "http://127.0.0.1:9"
"#,
    )
    .unwrap();
    dir
}

fn write_challenge(dir: &Path, file: &str, title: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(
        dir.join(file),
        format!(
            "// title: {title}\n\
             // backstory: The reef council wants a headcount.\n\
             // prompt: How many jellyfish live on the reef?\n\
             // hint link: https://docs.gadget.dev/guides/data-access/gelly\n\
             // hint: Gelly has a count() aggregate.\n\
             // expected output: count: 4\n\
             // solution:\n\
             view {{\n  count(jellyfishes)\n}}\n"
        ),
    )
    .unwrap();
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    gellyfish()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created gellyfish.toml"))
        .stdout(predicate::str::contains(
            "Created challenges/01-count-the-jellyfish.gelly",
        ));

    assert!(dir.path().join("gellyfish.toml").exists());
    assert!(dir
        .path()
        .join("challenges/01-count-the-jellyfish.gelly")
        .exists());
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();

    gellyfish()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    gellyfish()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn init_output_validates_cleanly() {
    let dir = TempDir::new().unwrap();

    gellyfish()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    gellyfish()
        .current_dir(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 challenges"))
        .stdout(predicate::str::contains("All challenges valid"));
}

#[test]
fn validate_reports_warnings() {
    let dir = TempDir::new().unwrap();
    let challenges = dir.path().join("challenges");
    write_challenge(&challenges, "01-census.gelly", "Census");
    write_challenge(&challenges, "02-census-again.gelly", "Census");

    gellyfish()
        .arg("validate")
        .arg("--path")
        .arg(&challenges)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 challenges"))
        .stdout(predicate::str::contains("duplicate title: Census"))
        .stdout(predicate::str::contains("1 warning(s) found"));
}

#[test]
fn validate_nonexistent_file() {
    gellyfish()
        .arg("validate")
        .arg("--path")
        .arg("nonexistent.gelly")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn grade_passes_on_equivalent_result() {
    let dir = TempDir::new().unwrap();
    write_challenge(dir.path(), "census.gelly", "Census");
    let result = dir.path().join("result.json");
    std::fs::write(&result, r#"{"jellyfishes": {"count": 4}}"#).unwrap();

    gellyfish()
        .arg("grade")
        .arg("--challenge")
        .arg(dir.path().join("census.gelly"))
        .arg("--result")
        .arg(&result)
        .assert()
        .success()
        .stdout(predicate::str::contains("Correct!"));
}

#[test]
fn grade_with_expected_text_and_json_output() {
    let dir = TempDir::new().unwrap();
    let result = dir.path().join("result.json");
    std::fs::write(&result, r#"[{"name": "Moon"}, {"name": "Box"}]"#).unwrap();

    let output = gellyfish()
        .arg("grade")
        .arg("--expected")
        .arg(r#"[{"name": "Box"}, {"name": "Moon"}]"#)
        .arg("--result")
        .arg(&result)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let graded: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(graded["passed"], true);
}

#[test]
fn grade_fail_on_mismatch() {
    let dir = TempDir::new().unwrap();
    let result = dir.path().join("result.json");
    std::fs::write(&result, r#"{"count": 5}"#).unwrap();

    gellyfish()
        .arg("grade")
        .arg("--expected")
        .arg("count: 4")
        .arg("--result")
        .arg(&result)
        .arg("--fail-on-mismatch")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Not quite yet"))
        .stderr(predicate::str::contains("does not match"));
}

#[test]
fn grade_rejects_non_json_result() {
    let dir = TempDir::new().unwrap();
    let result = dir.path().join("result.json");
    std::fs::write(&result, "count: 4").unwrap();

    gellyfish()
        .arg("grade")
        .arg("--expected")
        .arg("count: 4")
        .arg("--result")
        .arg(&result)
        .assert()
        .failure()
        .stderr(predicate::str::contains("query result is not JSON"));
}

#[test]
fn local_progress_round_trip() {
    let dir = workspace();
    let solution = dir.path().join("solution.gelly");
    std::fs::write(&solution, "view { count(jellyfishes) }").unwrap();

    gellyfish()
        .current_dir(dir.path())
        .args(["progress", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No completed challenges"));

    gellyfish()
        .current_dir(dir.path())
        .args(["progress", "complete", "17", "--solution"])
        .arg(&solution)
        .assert()
        .success();

    gellyfish()
        .current_dir(dir.path())
        .args(["progress", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 completed challenge(s)"))
        .stdout(predicate::str::contains("17"));

    gellyfish()
        .current_dir(dir.path())
        .args(["progress", "solution", "17"])
        .assert()
        .success()
        .stdout(predicate::str::contains("view { count(jellyfishes) }"));

    let storage = std::fs::read_to_string(dir.path().join("state/storage.json")).unwrap();
    assert!(storage.contains("gelly-test-completed-challenges"));

    gellyfish()
        .current_dir(dir.path())
        .args(["progress", "clear"])
        .assert()
        .success();

    gellyfish()
        .current_dir(dir.path())
        .args(["progress", "solution", "17"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No solution recorded"));
}

#[test]
fn schema_offline_prints_fields() {
    let dir = workspace();

    gellyfish()
        .current_dir(dir.path())
        .args(["schema", "jellyfish", "kraken", "--offline"])
        .assert()
        .success()
        .stdout(predicate::str::contains("jellyfish"))
        .stdout(predicate::str::contains("weight"))
        .stdout(predicate::str::contains("No schema found for: kraken"));
}

#[test]
fn schema_rejects_injected_model_name() {
    let dir = workspace();

    gellyfish()
        .current_dir(dir.path())
        .args(["schema", "food\") { id }"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid model name"));
}

#[test]
fn seed_offline_reports_created_challenges() {
    let dir = workspace();
    let challenges = dir.path().join("challenges");
    write_challenge(&challenges, "01-census.gelly", "Census");
    write_challenge(&challenges, "02-homes.gelly", "Homes");
    let report = dir.path().join("reports/seed.json");

    gellyfish()
        .current_dir(dir.path())
        .args(["seed", "--offline", "--output"])
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"created\": 2"));

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(saved["challenges"][1]["title"], "Homes");
    assert_eq!(saved["challenges"][1]["number"], 2);
}

#[test]
fn copy_data_rejects_same_environment() {
    let dir = workspace();

    gellyfish()
        .current_dir(dir.path())
        .args(["copy-data", "--from", "development", "--to", "development"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("both 'development'"));
}

#[test]
fn unknown_environment_is_reported() {
    let dir = workspace();

    gellyfish()
        .current_dir(dir.path())
        .args(["assign-foods", "--env", "staging"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("environment 'staging' not found"));
}

#[test]
fn run_offline_unknown_challenge() {
    let dir = workspace();
    let query = dir.path().join("query.gelly");
    std::fs::write(&query, "view { count(jellyfishes) }").unwrap();

    gellyfish()
        .current_dir(dir.path())
        .args(["run", "--offline", "--challenge", "3", "--query"])
        .arg(&query)
        .assert()
        .failure()
        .stderr(predicate::str::contains("challenge 3 not found"));
}
