// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use datadict_api::{Client, MAX_SAMPLE_CHARS};
use datadict_app::{ChatMessage, ColumnDefinition, DataDictionary};
use std::io::Read;
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Response, Server};

const DICTIONARY_BODY: &str = r#"{
    "table_name": "sample",
    "summary": "Two numeric columns.",
    "columns": [{
        "name": "a",
        "inferred_type": "INTEGER",
        "description": "First column",
        "constraints": ["NOT NULL"],
        "example_values": ["1", "3"]
    }]
}"#;

fn json_response(body: &str, status: u16) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body)
        .with_status_code(status)
        .with_header(
            Header::from_bytes("Content-Type", "application/json")
                .expect("valid content type header"),
        )
}

fn sample_dictionary() -> DataDictionary {
    DataDictionary {
        table_name: "sample".to_owned(),
        summary: "Two numeric columns.".to_owned(),
        columns: vec![ColumnDefinition {
            name: "a".to_owned(),
            inferred_type: "INTEGER".to_owned(),
            description: "First column".to_owned(),
            constraints: vec!["NOT NULL".to_owned()],
            example_values: vec!["1".to_owned(), "3".to_owned()],
            business_logic: None,
        }],
    }
}

#[test]
fn generate_posts_exact_body_and_decodes_dictionary() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());

    let handle = thread::spawn(move || {
        let mut request = server.recv().expect("request expected");
        assert_eq!(request.url(), "/generate");

        let mut body = String::new();
        request
            .as_reader()
            .read_to_string(&mut body)
            .expect("read request body");
        let parsed: serde_json::Value = serde_json::from_str(&body).expect("JSON request body");
        assert_eq!(parsed["data"], "a,b\n1,2\n3,4");

        request
            .respond(json_response(DICTIONARY_BODY, 200))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let dictionary = client.generate_dictionary("a,b\n1,2\n3,4")?;
    assert_eq!(dictionary, sample_dictionary());

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn transmitted_sample_is_capped_at_the_limit() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());

    let handle = thread::spawn(move || {
        let mut request = server.recv().expect("request expected");
        let mut body = String::new();
        request
            .as_reader()
            .read_to_string(&mut body)
            .expect("read request body");
        let parsed: serde_json::Value = serde_json::from_str(&body).expect("JSON request body");
        let data = parsed["data"].as_str().expect("data field");
        assert_eq!(data.chars().count(), MAX_SAMPLE_CHARS);
        assert!(data.chars().all(|ch| ch == 'x'));

        request
            .respond(json_response(DICTIONARY_BODY, 200))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let oversized = "x".repeat(MAX_SAMPLE_CHARS * 2);
    client.generate_dictionary(&oversized)?;

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn generate_surfaces_structured_error_detail() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        request
            .respond(json_response(r#"{"detail":"model unavailable"}"#, 500))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let error = client
        .generate_dictionary("a,b")
        .expect_err("500 should fail");
    assert_eq!(error.to_string(), "model unavailable");

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn generate_falls_back_to_status_text_for_unparseable_body() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        request
            .respond(Response::from_string("<html>boom</html>").with_status_code(500))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let error = client
        .generate_dictionary("a,b")
        .expect_err("500 should fail");
    assert_eq!(error.to_string(), "Internal Server Error");

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn chat_turn_sends_context_and_returns_reply() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());

    let handle = thread::spawn(move || {
        let mut request = server.recv().expect("request expected");
        assert_eq!(request.url(), "/chat");

        let mut body = String::new();
        request
            .as_reader()
            .read_to_string(&mut body)
            .expect("read request body");
        let parsed: serde_json::Value = serde_json::from_str(&body).expect("JSON request body");
        assert_eq!(parsed["dictionary"]["table_name"], "sample");
        assert_eq!(parsed["message"], "What columns contain PII?");
        assert_eq!(parsed["history"][0]["role"], "user");
        assert_eq!(parsed["history"][1]["role"], "model");

        request
            .respond(json_response(r#"{"response":"None detected."}"#, 200))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let history = [
        ChatMessage::user("earlier question"),
        ChatMessage::model("earlier answer"),
    ];
    let reply = client.chat_turn(&sample_dictionary(), "What columns contain PII?", &history)?;
    assert_eq!(reply, "None detected.");

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn chat_error_detail_is_surfaced_to_the_caller() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        request
            .respond(json_response(r#"{"detail":"context too large"}"#, 422))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let error = client
        .chat_turn(&sample_dictionary(), "hi", &[])
        .expect_err("422 should fail");
    assert_eq!(error.to_string(), "context too large");

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn connection_failure_names_the_backend() {
    let client = Client::new("http://127.0.0.1:1", Duration::from_millis(50))
        .expect("client should initialize");

    let error = client
        .generate_dictionary("a,b")
        .expect_err("unreachable backend should fail");
    let message = error.to_string();
    assert!(message.contains("cannot reach backend"));
    assert!(message.contains("http://127.0.0.1:1"));
}
