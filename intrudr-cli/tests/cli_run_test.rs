use axum::{extract::Query, routing::get, Router};
use clap::Parser;
use intrudr_cli::{config::CliConfig, run, Args};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

async fn spawn_server() -> SocketAddr {
    let app = Router::new().route(
        "/login",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            let user = params.get("user").cloned().unwrap_or_default();
            let pass = params.get("pass").cloned().unwrap_or_default();
            if user == "admin" && pass == "hunter2" {
                "welcome".to_string()
            } else {
                format!("denied {}", user)
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn args(argv: &[&str]) -> Args {
    let mut full = vec!["intrudr"];
    full.extend_from_slice(argv);
    Args::try_parse_from(full).unwrap()
}

#[tokio::test]
async fn test_run_writes_output_directory() {
    let addr = spawn_server().await;
    let temp = tempfile::tempdir().unwrap();

    let request_path = temp.path().join("request.txt");
    std::fs::write(
        &request_path,
        format!("GET /login?user=guest&pass=x HTTP/1.1\nHost: {}\n\n", addr),
    )
    .unwrap();

    let wordlist = temp.path().join("passwords.txt");
    std::fs::write(&wordlist, "letmein\nhunter2\n").unwrap();

    let output = temp.path().join("out");
    let args = args(&[
        "--request",
        request_path.to_str().unwrap(),
        "--value",
        "user=admin",
        "--value",
        "user=root",
        "--value",
        &format!("pass=@{}", wordlist.display()),
        "--mode",
        "clusterbomb",
        "--output",
        output.to_str().unwrap(),
    ]);
    let mut config = CliConfig::load(&args).unwrap();
    config.dispatch.jitter_min_ms = 0;
    config.dispatch.jitter_max_ms = 5;

    let report = run(args, config, CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    let params: Vec<&str> = report.records.iter().map(|r| r.params.as_str()).collect();
    assert_eq!(
        params,
        vec![
            "user-admin_pass-letmein",
            "user-admin_pass-hunter2",
            "user-root_pass-letmein",
            "user-root_pass-hunter2",
        ]
    );
    assert_eq!(report.records[1].response_body, "welcome");
    assert_eq!(report.records[2].response_body, "denied root");

    let summary = std::fs::read_to_string(output.join("summary.csv")).unwrap();
    assert!(summary.starts_with("index,params,status,length,filename,error"));
    assert!(output.join("response_0002_user-admin_pass-hunter2.txt").exists());
    assert!(output.join("sent_raw_0004.bin").exists());
}

#[tokio::test]
async fn test_list_tokens_skips_the_attack() {
    let temp = tempfile::tempdir().unwrap();
    let request_path = temp.path().join("request.txt");
    std::fs::write(&request_path, "GET /item/^^7^^?id=1 HTTP/1.1\nHost: localhost\n").unwrap();

    let output = temp.path().join("never");
    let args = args(&[
        "--request",
        request_path.to_str().unwrap(),
        "--list-tokens",
        "--output",
        output.to_str().unwrap(),
    ]);
    let config = CliConfig::load(&args).unwrap();

    let report = run(args, config, CancellationToken::new()).await.unwrap();
    assert!(report.is_none());
    assert!(!output.exists());
}

#[tokio::test]
async fn test_unknown_token_is_rejected_before_sending() {
    let temp = tempfile::tempdir().unwrap();
    let request_path = temp.path().join("request.txt");
    std::fs::write(&request_path, "GET /?id=1 HTTP/1.1\nHost: localhost\n").unwrap();

    let output = temp.path().join("out");
    let args = args(&[
        "--request",
        request_path.to_str().unwrap(),
        "--value",
        "nope=1",
        "--output",
        output.to_str().unwrap(),
    ]);
    let config = CliConfig::load(&args).unwrap();

    let err = run(args, config, CancellationToken::new()).await.unwrap_err();
    assert!(err.to_string().contains("nope"));
    assert!(!output.exists());
}

#[tokio::test]
async fn test_missing_request_file() {
    let args = args(&["--request", "/nonexistent/request.txt"]);
    let config = CliConfig::load(&args).unwrap();
    assert!(run(args, config, CancellationToken::new()).await.is_err());
}
