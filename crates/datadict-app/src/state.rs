// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{ChatMessage, DataDictionary};

/// Scripted reply appended when a chat call fails. Chat failures degrade into
/// a conversational turn instead of surfacing through `error`.
pub const CHAT_APOLOGY: &str = "Sorry, I encountered an error while processing your request.";

/// Coarse phase of the session, derived from the state fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Input,
    Generating,
    Ready,
    AwaitingReply,
    GenerationFailed,
}

/// Single source of truth for the UI session.
///
/// `request_token` advances on every submit, chat send, and reset. Responses
/// carry the token they were issued under and are discarded when it no longer
/// matches, so a reset or resubmit can never be overwritten by a late reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub request_token: u64,
    pub loading: bool,
    pub chat_loading: bool,
    pub error: Option<String>,
    pub dictionary: Option<DataDictionary>,
    pub raw_input: String,
    pub chat_history: Vec<ChatMessage>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            request_token: 0,
            loading: false,
            chat_loading: false,
            error: None,
            dictionary: None,
            raw_input: String::new(),
            chat_history: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Submit { raw: String },
    GenerateSucceeded { token: u64, dictionary: DataDictionary },
    GenerateFailed { token: u64, message: String },
    SendMessage { content: String },
    ChatSucceeded { token: u64, reply: String },
    ChatFailed { token: u64 },
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The caller must issue a generate call for `raw` under `token`.
    GenerateRequested { token: u64, raw: String },
    DictionaryReady,
    GenerateErrored(String),
    /// The caller must issue a chat call under `token`. `history` is the
    /// transcript as it stood before the optimistic user append.
    ChatRequested {
        token: u64,
        message: String,
        history: Vec<ChatMessage>,
    },
    ReplyAppended,
    ApologyAppended,
    StaleResponseDiscarded { token: u64 },
    CommandIgnored,
    WasReset,
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        if self.loading {
            SessionPhase::Generating
        } else if self.chat_loading {
            SessionPhase::AwaitingReply
        } else if self.dictionary.is_some() {
            SessionPhase::Ready
        } else if self.error.is_some() {
            SessionPhase::GenerationFailed
        } else {
            SessionPhase::Input
        }
    }

    pub fn dispatch(&mut self, command: SessionCommand) -> Vec<SessionEvent> {
        match command {
            SessionCommand::Submit { raw } => self.submit(raw),
            SessionCommand::GenerateSucceeded { token, dictionary } => {
                self.generate_succeeded(token, dictionary)
            }
            SessionCommand::GenerateFailed { token, message } => {
                self.generate_failed(token, message)
            }
            SessionCommand::SendMessage { content } => self.send_message(content),
            SessionCommand::ChatSucceeded { token, reply } => self.chat_succeeded(token, reply),
            SessionCommand::ChatFailed { token } => self.chat_failed(token),
            SessionCommand::Reset => self.reset(),
        }
    }

    fn submit(&mut self, raw: String) -> Vec<SessionEvent> {
        if raw.trim().is_empty() {
            return vec![SessionEvent::CommandIgnored];
        }

        self.request_token = self.request_token.wrapping_add(1);
        self.loading = true;
        self.chat_loading = false;
        self.error = None;
        self.dictionary = None;
        self.chat_history.clear();
        self.raw_input = raw.clone();

        vec![SessionEvent::GenerateRequested {
            token: self.request_token,
            raw,
        }]
    }

    fn generate_succeeded(&mut self, token: u64, dictionary: DataDictionary) -> Vec<SessionEvent> {
        if token != self.request_token || !self.loading {
            return vec![SessionEvent::StaleResponseDiscarded { token }];
        }

        self.loading = false;
        self.error = None;
        self.dictionary = Some(dictionary);
        vec![SessionEvent::DictionaryReady]
    }

    fn generate_failed(&mut self, token: u64, message: String) -> Vec<SessionEvent> {
        if token != self.request_token || !self.loading {
            return vec![SessionEvent::StaleResponseDiscarded { token }];
        }

        self.loading = false;
        self.error = Some(message.clone());
        vec![SessionEvent::GenerateErrored(message)]
    }

    fn send_message(&mut self, content: String) -> Vec<SessionEvent> {
        if content.trim().is_empty() || self.dictionary.is_none() || self.chat_loading {
            return vec![SessionEvent::CommandIgnored];
        }

        let history = self.chat_history.clone();
        self.request_token = self.request_token.wrapping_add(1);
        self.chat_loading = true;
        self.chat_history.push(ChatMessage::user(content.clone()));

        vec![SessionEvent::ChatRequested {
            token: self.request_token,
            message: content,
            history,
        }]
    }

    fn chat_succeeded(&mut self, token: u64, reply: String) -> Vec<SessionEvent> {
        if token != self.request_token || !self.chat_loading {
            return vec![SessionEvent::StaleResponseDiscarded { token }];
        }

        self.chat_loading = false;
        self.chat_history.push(ChatMessage::model(reply));
        vec![SessionEvent::ReplyAppended]
    }

    fn chat_failed(&mut self, token: u64) -> Vec<SessionEvent> {
        if token != self.request_token || !self.chat_loading {
            return vec![SessionEvent::StaleResponseDiscarded { token }];
        }

        self.chat_loading = false;
        self.chat_history.push(ChatMessage::model(CHAT_APOLOGY));
        vec![SessionEvent::ApologyAppended]
    }

    fn reset(&mut self) -> Vec<SessionEvent> {
        let token = self.request_token.wrapping_add(1);
        *self = Self::default();
        // Keep advancing so in-flight responses resolve stale.
        self.request_token = token;
        vec![SessionEvent::WasReset]
    }
}
