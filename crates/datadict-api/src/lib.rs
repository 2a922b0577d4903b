// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use datadict_app::{ChatMessage, DataDictionary};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// The backend only ever sees a bounded prefix of the raw input, regardless of
/// its true size.
pub const MAX_SAMPLE_CHARS: usize = 5000;

/// First `MAX_SAMPLE_CHARS` characters of the raw input, char-boundary safe.
/// Inputs at or under the cap pass through unchanged.
pub fn sample_prefix(raw: &str) -> &str {
    match raw.char_indices().nth(MAX_SAMPLE_CHARS) {
        Some((index, _)) => &raw[..index],
        None => raw,
    }
}

/// Blocking client for the dictionary backend. Exactly two operations; no
/// retries and no idempotency keys, so a failed attempt is terminal until the
/// user resubmits.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("backend.base_url must not be empty");
        }
        Url::parse(&base_url)
            .with_context(|| format!("backend.base_url {base_url:?} is not a valid URL"))?;

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST /generate with the capped sample. The response body is the
    /// dictionary itself.
    pub fn generate_dictionary(&self, raw: &str) -> Result<DataDictionary> {
        let sample = sample_prefix(raw);
        tracing::debug!(chars = sample.chars().count(), "generate dictionary");

        let response = self
            .http
            .post(format!("{}/generate", self.base_url))
            .json(&GenerateRequest { data: sample })
            .send()
            .map_err(|error| connection_error(&self.base_url, &error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "generate call failed");
            return Err(service_error(status, &body));
        }

        response.json().context("decode dictionary response")
    }

    /// POST /chat. The backend is stateless per call: the full dictionary and
    /// prior history ride along with every message.
    pub fn chat_turn(
        &self,
        dictionary: &DataDictionary,
        message: &str,
        history: &[ChatMessage],
    ) -> Result<String> {
        tracing::debug!(history_len = history.len(), "chat turn");

        let response = self
            .http
            .post(format!("{}/chat", self.base_url))
            .json(&ChatRequest {
                dictionary,
                message,
                history,
            })
            .send()
            .map_err(|error| connection_error(&self.base_url, &error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "chat call failed");
            return Err(service_error(status, &body));
        }

        let parsed: ChatResponse = response.json().context("decode chat response")?;
        Ok(parsed.response)
    }
}

fn connection_error(base_url: &str, error: &reqwest::Error) -> anyhow::Error {
    anyhow!("cannot reach backend at {base_url} -- is it running? ({error})")
}

/// Non-2xx responses become an error whose display string is the structured
/// `detail` field when the body parses, else the HTTP status text.
fn service_error(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(detail) = parsed.detail
        && !detail.is_empty()
    {
        return anyhow!(detail);
    }

    match status.canonical_reason() {
        Some(reason) => anyhow!("{reason}"),
        None => anyhow!("status {}", status.as_u16()),
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    data: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    dictionary: &'a DataDictionary,
    message: &'a str,
    history: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    detail: Option<String>,
}
