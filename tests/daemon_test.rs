//! Line protocol behavior of the request loop.

mod common;

use common::{TestPipeline, small_settings, test_pipeline};
use docrag::daemon::{Daemon, DaemonState, StopReason, write_status};
use docrag::protocol::{NO_MATCH_ANSWER, StartupStatus};
use serde_json::Value;
use tempfile::TempDir;

fn daemon() -> (Daemon, TempDir) {
    let TestPipeline {
        context, temp_dir, ..
    } = test_pipeline(small_settings());
    (Daemon::new(context), temp_dir)
}

async fn run_lines(daemon: &mut Daemon, input: &str) -> (StopReason, Vec<Value>) {
    let mut output = Vec::new();
    let reason = daemon.run(input.as_bytes(), &mut output).await.unwrap();

    let text = String::from_utf8(output).unwrap();
    let responses = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    (reason, responses)
}

#[tokio::test]
async fn test_unknown_command_exact_line() {
    let (mut daemon, _dir) = daemon();
    let mut output = Vec::new();
    daemon
        .run(
            &b"{\"command\":\"bogus\",\"requestId\":\"r1\"}\n"[..],
            &mut output,
        )
        .await
        .unwrap();

    assert_eq!(
        String::from_utf8(output).unwrap(),
        "{\"success\":false,\"error\":\"Unknown command: bogus\",\"requestId\":\"r1\"}\n"
    );
}

#[tokio::test]
async fn test_one_response_per_line_in_order() {
    let (mut daemon, _dir) = daemon();
    let input = concat!(
        r#"{"command":"store","requestId":1,"file_path":"a.txt","text":"The quick brown fox jumps over the lazy dog","document_id":"doc1"}"#,
        "\n",
        r#"{"command":"query","requestId":2,"question":"What does the fox do?","document_id":"doc1"}"#,
        "\n",
        r#"{"command":"delete","requestId":3,"document_id":"doc1"}"#,
        "\n",
        r#"{"command":"query","requestId":4,"question":"fox","document_id":"doc1"}"#,
        "\n",
    );

    let (reason, responses) = run_lines(&mut daemon, input).await;

    assert_eq!(reason, StopReason::EndOfInput);
    assert_eq!(daemon.state(), DaemonState::Stopped);
    assert_eq!(daemon.handled(), 4);
    assert_eq!(responses.len(), 4);

    assert_eq!(responses[0]["requestId"], 1);
    assert_eq!(responses[0]["success"], true);
    assert_eq!(responses[0]["chunks_stored"], 1);

    assert_eq!(responses[1]["requestId"], 2);
    assert_eq!(responses[1]["answer"], common::MOCK_ANSWER);
    assert_eq!(responses[1]["metadata"][0]["document_id"], "doc1");

    assert_eq!(responses[2]["requestId"], 3);
    assert_eq!(
        responses[2]["message"],
        "Document doc1 deleted from vector index"
    );

    assert_eq!(responses[3]["answer"], NO_MATCH_ANSWER);
    assert_eq!(responses[3]["sources"], Value::Array(vec![]));
}

#[tokio::test]
async fn test_malformed_line_does_not_stop_loop() {
    let (mut daemon, _dir) = daemon();
    let input = concat!(
        "{not json\n",
        r#"{"command":"clear_all","requestId":"c"}"#,
        "\n",
    );

    let (_, responses) = run_lines(&mut daemon, input).await;

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["success"], false);
    assert!(responses[0].get("requestId").is_none());
    assert_eq!(responses[1]["success"], true);
    assert_eq!(responses[1]["requestId"], "c");
}

#[tokio::test]
async fn test_blank_line_gets_error_response() {
    let (mut daemon, _dir) = daemon();
    let (_, responses) = run_lines(&mut daemon, "\n   \n").await;

    assert_eq!(responses.len(), 2);
    assert!(responses.iter().all(|r| r["success"] == false));
}

#[tokio::test]
async fn test_invalid_utf8_line_gets_parse_error() {
    let (mut daemon, _dir) = daemon();
    let mut input = Vec::new();
    input.extend_from_slice(b"{\"command\":\"clear_all\",\"requestId\":\"a\"}\n");
    input.extend_from_slice(b"{\"q\":\"\xff\xfe\"}\n");
    input.extend_from_slice(b"{\"command\":\"clear_all\",\"requestId\":\"b\"}\n");

    let mut output = Vec::new();
    let reason = daemon.run(&input[..], &mut output).await.unwrap();

    assert_eq!(reason, StopReason::EndOfInput);
    assert_eq!(daemon.handled(), 3);

    let responses: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0]["requestId"], "a");
    assert_eq!(responses[1]["success"], false);
    assert_eq!(
        responses[1]["error"],
        "Invalid request: line is not valid UTF-8"
    );
    assert_eq!(responses[2]["success"], true);
    assert_eq!(responses[2]["requestId"], "b");
}

#[tokio::test]
async fn test_last_line_without_newline_is_handled() {
    let (mut daemon, _dir) = daemon();
    let (reason, responses) = run_lines(
        &mut daemon,
        "{\"command\":\"clear_all\"}\r\n{\"command\":\"bogus\"}",
    )
    .await;

    assert_eq!(reason, StopReason::EndOfInput);
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["success"], true);
    assert_eq!(responses[1]["error"], "Unknown command: bogus");
}

#[tokio::test]
async fn test_validation_error_carries_document_id() {
    let (mut daemon, _dir) = daemon();
    let input = concat!(
        r#"{"command":"store","requestId":"s","document_id":"doc9"}"#,
        "\n",
        r#"{"requestId":"m"}"#,
        "\n",
    );

    let (_, responses) = run_lines(&mut daemon, input).await;

    assert_eq!(responses[0]["success"], false);
    assert_eq!(responses[0]["document_id"], "doc9");
    assert!(
        responses[0]["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid store request")
    );
    assert_eq!(responses[1]["error"], "Missing required field: command");
    assert_eq!(responses[1]["requestId"], "m");
}

#[tokio::test]
async fn test_shutdown_while_idle() {
    let (mut daemon, _dir) = daemon();
    // Writer half stays open, so the reader never reaches end of input
    let (_client, server) = tokio::io::duplex(64);
    let reader = tokio::io::BufReader::new(server);
    let mut output = Vec::new();

    let reason = daemon
        .run_until(reader, &mut output, std::future::ready(()))
        .await
        .unwrap();

    assert_eq!(reason, StopReason::Interrupted);
    assert_eq!(daemon.state(), DaemonState::Stopped);
    assert_eq!(daemon.handled(), 0);
    assert!(output.is_empty());
}

#[tokio::test]
async fn test_write_status_lines() {
    let mut output = Vec::new();
    write_status(&mut output, &StartupStatus::Ready).await.unwrap();
    write_status(
        &mut output,
        &StartupStatus::Error {
            message: "model failed".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(
        String::from_utf8(output).unwrap(),
        "{\"status\":\"ready\"}\n{\"status\":\"error\",\"message\":\"model failed\"}\n"
    );
}
