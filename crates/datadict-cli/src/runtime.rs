// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use datadict_api::Client;
use datadict_app::{ChatMessage, DataDictionary};
use datadict_tui::{AppRuntime, InternalEvent, ServiceEvent};
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::thread;

/// Production runtime: backend calls go over HTTP, exports land on disk, and
/// clipboard writes hit the system clipboard. The `spawn_*` overrides move the
/// blocking HTTP calls onto worker threads so the UI loop keeps drawing.
pub struct ServiceRuntime {
    client: Client,
    export_dir: PathBuf,
}

impl ServiceRuntime {
    pub fn new(client: Client, export_dir: PathBuf) -> Self {
        Self { client, export_dir }
    }
}

impl AppRuntime for ServiceRuntime {
    fn generate_dictionary(&mut self, raw: &str) -> Result<DataDictionary> {
        self.client.generate_dictionary(raw)
    }

    fn chat_turn(
        &mut self,
        dictionary: &DataDictionary,
        message: &str,
        history: &[ChatMessage],
    ) -> Result<String> {
        self.client.chat_turn(dictionary, message, history)
    }

    fn copy_to_clipboard(&mut self, text: &str) -> Result<()> {
        let mut clipboard = arboard::Clipboard::new().context("open system clipboard")?;
        clipboard
            .set_text(text.to_owned())
            .context("write clipboard")?;
        Ok(())
    }

    fn export_markdown(&mut self, file_name: &str, contents: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.export_dir).with_context(|| {
            format!("create export directory {}", self.export_dir.display())
        })?;
        let path = self.export_dir.join(file_name);
        fs::write(&path, contents)
            .with_context(|| format!("write export file {}", path.display()))?;
        Ok(path)
    }

    fn spawn_generate(&mut self, token: u64, raw: &str, tx: Sender<InternalEvent>) -> Result<()> {
        let client = self.client.clone();
        let raw = raw.to_owned();
        thread::spawn(move || {
            let event = match client.generate_dictionary(&raw) {
                Ok(dictionary) => ServiceEvent::GenerateCompleted { token, dictionary },
                Err(error) => ServiceEvent::GenerateFailed {
                    token,
                    error: error.to_string(),
                },
            };
            let _ = tx.send(InternalEvent::Service(event));
        });
        Ok(())
    }

    fn spawn_chat(
        &mut self,
        token: u64,
        dictionary: &DataDictionary,
        message: &str,
        history: &[ChatMessage],
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let client = self.client.clone();
        let dictionary = dictionary.clone();
        let message = message.to_owned();
        let history = history.to_vec();
        thread::spawn(move || {
            let event = match client.chat_turn(&dictionary, &message, &history) {
                Ok(reply) => ServiceEvent::ChatCompleted { token, reply },
                Err(error) => ServiceEvent::ChatFailed {
                    token,
                    error: error.to_string(),
                },
            };
            let _ = tx.send(InternalEvent::Service(event));
        });
        Ok(())
    }
}
