// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use datadict_app::{ChatMessage, ColumnDefinition, DataDictionary};
use std::collections::VecDeque;

/// Small dictionary used across the workspace tests: one table, two columns,
/// one inferred business rule.
pub fn sample_dictionary() -> DataDictionary {
    DataDictionary {
        table_name: "Customer Orders".to_owned(),
        summary: "One row per order placed by a registered customer.".to_owned(),
        columns: vec![
            ColumnDefinition {
                name: "order_id".to_owned(),
                inferred_type: "UUID".to_owned(),
                description: "Unique order identifier".to_owned(),
                constraints: vec!["PRIMARY KEY".to_owned(), "NOT NULL".to_owned()],
                example_values: vec![
                    "0b7e...".to_owned(),
                    "9c1a...".to_owned(),
                    "5f44...".to_owned(),
                ],
                business_logic: None,
            },
            ColumnDefinition {
                name: "total_cents".to_owned(),
                inferred_type: "INTEGER".to_owned(),
                description: "Order total in cents".to_owned(),
                constraints: vec!["NOT NULL".to_owned()],
                example_values: vec!["1299".to_owned(), "450".to_owned()],
                business_logic: Some("Always non-negative; refunds are separate rows.".to_owned()),
            },
        ],
    }
}

/// A resolved exchange: one user turn and one model reply.
pub fn sample_exchange() -> Vec<ChatMessage> {
    vec![
        ChatMessage::user("What columns contain PII?"),
        ChatMessage::model("None detected."),
    ]
}

/// Scripted stand-in for the dictionary backend. Responses are queued ahead of
/// time and consumed in order; every call is recorded so tests can assert on
/// what was transmitted.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    generate_queue: VecDeque<Result<DataDictionary, String>>,
    chat_queue: VecDeque<Result<String, String>>,
    pub generate_calls: Vec<String>,
    pub chat_calls: Vec<(String, usize)>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_generate_ok(&mut self, dictionary: DataDictionary) {
        self.generate_queue.push_back(Ok(dictionary));
    }

    pub fn queue_generate_err(&mut self, message: impl Into<String>) {
        self.generate_queue.push_back(Err(message.into()));
    }

    pub fn queue_chat_ok(&mut self, reply: impl Into<String>) {
        self.chat_queue.push_back(Ok(reply.into()));
    }

    pub fn queue_chat_err(&mut self, message: impl Into<String>) {
        self.chat_queue.push_back(Err(message.into()));
    }

    pub fn generate_dictionary(&mut self, sample: &str) -> Result<DataDictionary> {
        self.generate_calls.push(sample.to_owned());
        match self.generate_queue.pop_front() {
            Some(Ok(dictionary)) => Ok(dictionary),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted generate response left")),
        }
    }

    pub fn chat_turn(
        &mut self,
        _dictionary: &DataDictionary,
        message: &str,
        history: &[ChatMessage],
    ) -> Result<String> {
        self.chat_calls.push((message.to_owned(), history.len()));
        match self.chat_queue.pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted chat response left")),
        }
    }
}
