use assert_cmd::Command;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[allow(deprecated)]
fn actionplan(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("actionplan").expect("binary");
    cmd.current_dir(workdir)
        .env("ACTIONPLAN_EMBEDDING_MODE", "stub")
        .env_remove("ACTIONPLAN_GENERATION_URL")
        .env_remove("ACTIONPLAN_GENERATION_MODEL")
        .env("OPENAI_API_KEY", "sk-test")
        .arg("--quiet");
    cmd
}

fn run_json(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("command run");
    assert!(
        output.status.success(),
        "stdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json")
}

fn write_dataset(root: &Path) {
    let rows = [
        ("s1", "I was charged twice", "Duplicate charge on card", "billing"),
        ("s2", "My card got declined", "Card declined at checkout", "billing"),
        ("s3", "Parcel never arrived", "Package not delivered", "shipping"),
        ("s4", "Tracking has not moved", "Shipment stuck in transit", "shipping"),
        ("s5", "I forgot my password", "Password reset needed", "account"),
        ("s6", "Cannot sign in", "Locked out of account", "account"),
    ];
    let lines: Vec<String> = rows
        .iter()
        .map(|(id, customer, reason, category)| {
            json!({
                "sim_id": id,
                "customer_text": customer,
                "reason": reason,
                "steps": ["Greet the customer", format!("Resolve the {category} issue")],
                "category": category,
            })
            .to_string()
        })
        .collect();
    fs::write(root.join("history.jsonl"), lines.join("\n")).unwrap();
}

fn train_model(root: &Path) {
    run_json(
        actionplan(root)
            .args(["train", "--dataset", "history.jsonl", "--output", "model.json"]),
    );
}

#[test]
fn schema_describes_the_plan() {
    let temp = tempdir().unwrap();
    let schema = run_json(actionplan(temp.path()).arg("schema"));
    assert_eq!(schema["required"], json!(["category"]));
    assert!(schema["properties"]["steps"].is_object());
}

#[test]
fn cluster_labels_every_record() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    write_dataset(root);

    let summary = run_json(actionplan(root).args([
        "cluster",
        "--dataset",
        "history.jsonl",
        "--output",
        "out/clustered.jsonl",
        "--clusters",
        "3",
    ]));
    assert_eq!(summary["records"], 6);
    assert_eq!(summary["clusters"], 3);
    let total: u64 = summary["counts"]
        .as_object()
        .unwrap()
        .values()
        .map(|v| v.as_u64().unwrap())
        .sum();
    assert_eq!(total, 6);

    let written = fs::read_to_string(root.join("out/clustered.jsonl")).unwrap();
    let categories: Vec<String> = written
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).unwrap()["category"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(categories.len(), 6);
    assert!(categories.iter().all(|c| c.starts_with("Category_")));
}

#[test]
fn cluster_labels_can_be_named() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    write_dataset(root);

    let summary = run_json(actionplan(root).args([
        "cluster",
        "--dataset",
        "history.jsonl",
        "--output",
        "clustered.jsonl",
        "--clusters",
        "2",
        "--label",
        "0=billing",
        "--label",
        "1=shipping",
    ]));
    let counts = summary["counts"].as_object().unwrap();
    let mut names: Vec<&str> = counts.keys().map(String::as_str).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["billing", "shipping"]);

    let written = fs::read_to_string(root.join("clustered.jsonl")).unwrap();
    for line in written.lines() {
        let category = serde_json::from_str::<Value>(line).unwrap()["category"].clone();
        assert!(category == "billing" || category == "shipping", "{category}");
    }

    actionplan(root)
        .args([
            "cluster",
            "--dataset",
            "history.jsonl",
            "--output",
            "clustered.jsonl",
            "--clusters",
            "2",
            "--label",
            "5=returns",
        ])
        .assert()
        .failure();
}

#[test]
fn cluster_rejects_more_groups_than_texts() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    write_dataset(root);

    actionplan(root)
        .args([
            "cluster",
            "--dataset",
            "history.jsonl",
            "--output",
            "clustered.jsonl",
            "--clusters",
            "9",
        ])
        .assert()
        .failure();
}

#[test]
fn config_file_sets_cluster_count() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    write_dataset(root);
    fs::write(
        root.join("custom.toml"),
        "[embedding]\nmode = \"stub\"\ndimension = 16\n\n[cluster]\nclusters = 2\n",
    )
    .unwrap();

    let summary = run_json(actionplan(root).args([
        "--config",
        "custom.toml",
        "cluster",
        "--dataset",
        "history.jsonl",
        "--output",
        "clustered.jsonl",
    ]));
    assert_eq!(summary["clusters"], 2);
}

#[test]
fn train_saves_a_loadable_model() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    write_dataset(root);

    let summary = run_json(
        actionplan(root).args(["train", "--dataset", "history.jsonl", "--output", "model.json"]),
    );
    assert_eq!(summary["trained_on"], 6);
    assert_eq!(summary["labels"], json!(["account", "billing", "shipping"]));
    assert_eq!(summary["embedder"], "stub");
    assert!(root.join("model.json").exists());
}

#[test]
fn dry_run_prints_prompt_without_generation() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    write_dataset(root);
    train_model(root);

    let trace = run_json(actionplan(root).args([
        "run",
        "--dataset",
        "history.jsonl",
        "--model",
        "model.json",
        "--dry-run",
        // Nothing listens here; a dry run must not connect.
        "--generation-url",
        "http://127.0.0.1:9",
        "My card was charged twice",
    ]));
    let predicted = trace["predicted_category"].as_str().unwrap();
    assert!(["account", "billing", "shipping"].contains(&predicted));
    assert_eq!(trace["examples"].as_array().unwrap().len(), 2);
    assert!(trace["prompt"]
        .as_str()
        .unwrap()
        .contains("User: My card was charged twice"));
    assert!(trace.get("result").is_none());
}

#[test]
fn request_can_come_from_stdin() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    write_dataset(root);
    train_model(root);

    let trace = run_json(
        actionplan(root)
            .args([
                "run",
                "--dataset",
                "history.jsonl",
                "--model",
                "model.json",
                "--dry-run",
                "-",
            ])
            .write_stdin("Where is my parcel?\n"),
    );
    assert!(trace["prompt"]
        .as_str()
        .unwrap()
        .contains("User: Where is my parcel?\n"));
}

fn completion(content: &str) -> Value {
    json!({ "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }] })
}

#[tokio::test(flavor = "multi_thread")]
async fn run_prints_validated_plan() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"{"category":"billing","reason":"Customer was double charged.","steps":"Refund the duplicate charge"}"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let temp = tempdir().unwrap();
    let root = temp.path();
    write_dataset(root);
    train_model(root);

    let result = run_json(
        actionplan(root)
            .env("ACTIONPLAN_GENERATION_URL", format!("{}/v1", server.uri()))
            .args([
                "run",
                "--dataset",
                "history.jsonl",
                "--model",
                "model.json",
                "My card was charged twice",
            ]),
    );
    assert_eq!(
        result,
        json!({
            "category": "billing",
            "reason": "Customer was double charged.",
            "steps": ["Refund the duplicate charge"],
        })
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn explain_shows_backfilled_category() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion(r#"{"reason":"r","steps":["a"]}"#)),
        )
        .mount(&server)
        .await;

    let temp = tempdir().unwrap();
    let root = temp.path();
    write_dataset(root);
    train_model(root);

    let trace = run_json(actionplan(root).args([
        "run",
        "--dataset",
        "history.jsonl",
        "--model",
        "model.json",
        "--explain",
        "--generation-url",
        server.uri().as_str(),
        "Cannot sign in to my account",
    ]));
    assert_eq!(trace["result"]["category"], trace["predicted_category"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn generation_failure_exits_non_zero() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let temp = tempdir().unwrap();
    let root = temp.path();
    write_dataset(root);
    train_model(root);

    let output = actionplan(root)
        .args([
            "run",
            "--dataset",
            "history.jsonl",
            "--model",
            "model.json",
            "--generation-url",
            server.uri().as_str(),
            "hello",
        ])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("generate_and_validate"));
}
