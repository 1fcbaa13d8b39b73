use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn docsum_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docsum");
    path
}

fn completion(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": text } }]
    }))
}

/// Temp workspace with `files/`, and a config pointing the LLM and Drive
/// endpoints at `server`. `api_key: None` leaves the key out entirely.
fn setup_test_env(server_uri: &str, api_key: Option<&str>) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    fs::create_dir_all(root.join("config")).unwrap();
    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();

    let key_line = api_key
        .map(|k| format!("api_key = \"{}\"\n", k))
        .unwrap_or_default();
    let config_content = format!(
        r#"[llm]
base_url = "{server}/api/v1"
{key_line}api_key_env = "DOCSUM_TEST_NO_SUCH_KEY"

[local]
folder = "{root}/files"

[drive]
download_base = "{server}"
api_base = "{server}/drive/v3"
download_dir = "{root}/downloads"

[output]
path = "{root}/out/report.json"
"#,
        server = server_uri,
        key_line = key_line,
        root = root.display(),
    );

    let config_path = root.join("config").join("docsum.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn docsum_command(config_path: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new(docsum_binary());
    cmd.current_dir(config_path.parent().unwrap())
        .env_remove("OPENROUTER_API_KEY")
        .env_remove("GOOGLE_DRIVE_ACCESS_TOKEN")
        .env("RUST_LOG", "docsum=warn")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--progress")
        .arg("off")
        .args(args);
    cmd
}

fn run_docsum(config_path: &Path, args: &[&str]) -> Output {
    docsum_command(config_path, args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docsum binary at {:?}: {}", docsum_binary(), e))
}

async fn run_docsum_async(config_path: &Path, args: &[&str]) -> Output {
    let config_path = config_path.to_path_buf();
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    tokio::task::spawn_blocking(move || {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_docsum(&config_path, &args)
    })
    .await
    .unwrap()
}

fn read_report(tmp: &TempDir) -> serde_json::Value {
    let raw = fs::read_to_string(tmp.path().join("out/report.json")).unwrap();
    serde_json::from_str(&raw).unwrap()
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).to_string()
}

#[test]
fn test_parse_prints_text_without_api_key() {
    let (tmp, config_path) = setup_test_env("http://127.0.0.1:9", None);
    let file = tmp.path().join("files/notes.html");
    fs::write(
        &file,
        "<html><head><style>p { color: red }</style></head><body><p>Quarterly &amp; annual notes</p></body></html>",
    )
    .unwrap();

    let output = run_docsum(&config_path, &["parse", file.to_str().unwrap()]);
    let (stdout, stderr) = (text(&output.stdout), text(&output.stderr));
    assert!(output.status.success(), "parse failed: {}", stderr);
    assert!(stdout.contains("Quarterly & annual notes"));
    assert!(!stdout.contains("color"));
    assert!(stderr.contains("parser=html"));
    assert!(stderr.contains("status=ok"));
}

#[test]
fn test_parse_broken_docx_is_a_warning() {
    let (tmp, config_path) = setup_test_env("http://127.0.0.1:9", None);
    let file = tmp.path().join("files/broken.docx");
    fs::write(&file, "this is not a zip archive").unwrap();

    let output = run_docsum(&config_path, &["parse", file.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(text(&output.stdout).starts_with("Error:"));
    assert!(text(&output.stderr).contains("status=warning"));
}

#[test]
fn test_parse_missing_file_fails() {
    let (tmp, config_path) = setup_test_env("http://127.0.0.1:9", None);
    let missing = tmp.path().join("files/nope.txt");
    let output = run_docsum(&config_path, &["parse", missing.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_local_run_writes_report() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(body_string_contains("Master Summary:"))
        .respond_with(completion("Both documents concern the launch."))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(completion("A short summary."))
        .expect(2)
        .mount(&server)
        .await;

    let (tmp, config_path) = setup_test_env(&server.uri(), Some("sk-test"));
    let files = tmp.path().join("files");
    fs::write(files.join("alpha.md"), "# Launch plan\n\nShip on Monday.").unwrap();
    fs::write(files.join("beta.txt"), "Launch retrospective notes.").unwrap();
    fs::write(files.join(".hidden"), "never listed").unwrap();

    let output = run_docsum_async(&config_path, &["local"]).await;
    let stdout = text(&output.stdout);
    assert!(output.status.success(), "local failed: {}", text(&output.stderr));
    assert!(stdout.contains("Both documents concern the launch."));
    assert!(stdout.contains("Documents:   2"));

    let report = read_report(&tmp);
    assert_eq!(report["master_summary"], "Both documents concern the launch.");
    assert_eq!(report["metadata"]["method"], "local_folder");
    assert_eq!(report["metadata"]["model_used"], "google/gemma-2-9b-it:free");
    assert_eq!(report["statistics"]["total_documents"], 2);
    assert_eq!(report["statistics"]["successful_summaries"], 2);
    assert_eq!(report["statistics"]["file_types"][".md"], 1);
    assert_eq!(report["statistics"]["file_types"][".txt"], 1);

    let docs = report["individual_summaries"].as_array().unwrap();
    assert_eq!(docs[0]["filename"], "alpha.md");
    assert_eq!(docs[1]["filename"], "beta.txt");
    assert_eq!(docs[0]["summary"], "A short summary.");
    assert_eq!(docs[0]["summary_status"], "success");
    assert_eq!(docs[0]["parse_status"], "ok");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_document_does_not_stop_run() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(body_string_contains("poison pill"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(body_string_contains("Master Summary:"))
        .respond_with(completion("Only the good one."))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(completion("Good summary."))
        .mount(&server)
        .await;

    let (tmp, config_path) = setup_test_env(&server.uri(), Some("sk-test"));
    let files = tmp.path().join("files");
    fs::write(files.join("a_bad.txt"), "this is a poison pill").unwrap();
    fs::write(files.join("b_good.txt"), "perfectly ordinary text").unwrap();

    let output = run_docsum_async(&config_path, &["local"]).await;
    assert!(output.status.success(), "run failed: {}", text(&output.stderr));

    let report = read_report(&tmp);
    let docs = report["individual_summaries"].as_array().unwrap();
    assert_eq!(docs[0]["summary_status"], "error");
    let failure = docs[0]["summary"].as_str().unwrap();
    assert!(failure.starts_with("Error generating summary: "));
    assert!(failure.contains("500"));
    assert_eq!(docs[1]["summary_status"], "success");
    assert_eq!(report["statistics"]["failed_summaries"], 1);
    assert_eq!(report["master_summary"], "Only the good one.");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_api_key_exits_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion("unused"))
        .expect(0)
        .mount(&server)
        .await;

    let (tmp, config_path) = setup_test_env(&server.uri(), None);
    fs::write(tmp.path().join("files/a.txt"), "content").unwrap();

    let output = run_docsum_async(&config_path, &["local"]).await;
    assert_eq!(output.status.code(), Some(1));
    assert!(text(&output.stderr).contains("API key"));
    assert!(!tmp.path().join("out/report.json").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_empty_folder_exits_1() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion("unused"))
        .expect(0)
        .mount(&server)
        .await;

    let (tmp, config_path) = setup_test_env(&server.uri(), Some("sk-test"));
    let output = run_docsum_async(&config_path, &["local"]).await;
    assert_eq!(output.status.code(), Some(1));
    assert!(text(&output.stderr).contains("No files found"));
    assert!(!tmp.path().join("out/report.json").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_drive_url_is_config_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (_tmp, config_path) = setup_test_env(&server.uri(), Some("sk-test"));
    let output = run_docsum_async(
        &config_path,
        &[
            "drive",
            "--folder",
            "https://example.com/not-a-folder",
            "--access-token",
            "tok",
        ],
    )
    .await;
    assert_eq!(output.status.code(), Some(1));
    assert!(text(&output.stderr).contains("could not extract folder ID"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_drive_without_token_is_config_error() {
    let server = MockServer::start().await;
    let (_tmp, config_path) = setup_test_env(&server.uri(), Some("sk-test"));
    let output = run_docsum_async(
        &config_path,
        &["drive", "--folder", "https://drive.google.com/drive/folders/F1"],
    )
    .await;
    assert_eq!(output.status.code(), Some(1));
    assert!(text(&output.stderr).contains("access token"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_no_save_and_flag_overrides() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(body_string_contains("custom/model"))
        .respond_with(completion("Overridden."))
        .mount(&server)
        .await;

    let (tmp, config_path) = setup_test_env(&server.uri(), None);
    fs::write(tmp.path().join("files/a.txt"), "content").unwrap();

    let output = run_docsum_async(
        &config_path,
        &["--no-save", "--api-key", "sk-flag", "--model", "custom/model", "local"],
    )
    .await;
    assert!(output.status.success(), "run failed: {}", text(&output.stderr));
    assert!(text(&output.stdout).contains("Model:       custom/model"));
    assert!(!tmp.path().join("out/report.json").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_download_by_file_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/uc"))
        .and(query_param("id", "abc123"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain; charset=utf-8")
                .set_body_string("Minutes of the planning meeting."),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(completion("Meeting minutes."))
        .mount(&server)
        .await;

    let (tmp, config_path) = setup_test_env(&server.uri(), Some("sk-test"));
    let output = run_docsum_async(
        &config_path,
        &["download", "--file-ids", "abc123", "--keep-downloads"],
    )
    .await;
    assert!(output.status.success(), "download failed: {}", text(&output.stderr));

    let report = read_report(&tmp);
    assert_eq!(report["metadata"]["method"], "download_and_parse");
    let doc = &report["individual_summaries"][0];
    assert_eq!(doc["filename"], "file_abc123.txt");
    assert_eq!(doc["file_id"], "abc123");
    assert_eq!(doc["content"], "Minutes of the planning meeting.");
    assert_eq!(doc["summary"], "Meeting minutes.");

    let saved = tmp.path().join("downloads/file_abc123.txt");
    assert_eq!(
        fs::read_to_string(saved).unwrap(),
        "Minutes of the planning meeting."
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_urls_mode_sends_file_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(body_string_contains("image_url"))
        .and(body_string_contains("uc?id=xyz789"))
        .respond_with(completion("Read by URL."))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(body_string_contains("Master Summary:"))
        .respond_with(completion("Master."))
        .expect(1)
        .mount(&server)
        .await;

    let (tmp, config_path) = setup_test_env(&server.uri(), Some("sk-test"));
    let list = tmp.path().join("ids.txt");
    fs::write(&list, "# one id\nxyz789\n").unwrap();

    let output = run_docsum_async(&config_path, &["urls", "--file-list", list.to_str().unwrap()]).await;
    assert!(output.status.success(), "urls failed: {}", text(&output.stderr));

    let report = read_report(&tmp);
    assert_eq!(report["metadata"]["method"], "direct_file_ids");
    assert_eq!(report["metadata"]["model_used"], "google/gemini-flash-1.5:free");
    let doc = &report["individual_summaries"][0];
    assert_eq!(doc["filename"], "file_xyz789");
    assert_eq!(doc["summary"], "Read by URL.");
    assert!(doc["source_url"].as_str().unwrap().ends_with("/uc?id=xyz789&export=download"));
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn test_interrupt_exits_130_without_report() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(completion("too late").set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let (tmp, config_path) = setup_test_env(&server.uri(), Some("sk-test"));
    fs::write(tmp.path().join("files/slow.txt"), "takes a while to summarize").unwrap();

    let child = docsum_command(&config_path, &["local"])
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    // Interrupt only once the summary request is in flight.
    let deadline = Instant::now() + Duration::from_secs(20);
    while server.received_requests().await.map_or(true, |r| r.is_empty()) {
        assert!(Instant::now() < deadline, "no request reached the mock server");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let kill = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(kill.success());

    let output = tokio::task::spawn_blocking(move || child.wait_with_output())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(output.status.code(), Some(130));
    assert!(text(&output.stderr).contains("Interrupted"));
    assert!(!tmp.path().join("out/report.json").exists());
}
