// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Extensions offered by the upload hint. A hint only: any file is accepted
/// and its bytes are always interpreted as UTF-8 text.
pub const UPLOAD_EXTENSIONS: [&str; 3] = ["csv", "json", "txt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Paste,
    Upload,
}

impl InputMode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Paste => "paste",
            Self::Upload => "upload",
        }
    }

    pub const fn toggled(self) -> Self {
        match self {
            Self::Paste => Self::Upload,
            Self::Upload => Self::Paste,
        }
    }
}

/// Raw text captured from the user before submission. Paste and upload are
/// mutually exclusive sources; a file load overwrites whatever was there.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputCapture {
    pub mode: InputMode,
    pub text: String,
    pub loaded_file: Option<String>,
}

impl InputCapture {
    pub fn toggle_mode(&mut self) {
        self.mode = self.mode.toggled();
    }

    /// Reads the whole file and replaces the captured text. No size or type
    /// validation; non-UTF-8 bytes are replaced rather than rejected.
    pub fn load_file(&mut self, path: &Path) -> Result<usize> {
        let bytes =
            fs::read(path).with_context(|| format!("read input file {}", path.display()))?;
        self.text = String::from_utf8_lossy(&bytes).into_owned();
        self.loaded_file = Some(
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        );
        Ok(self.text.chars().count())
    }

    pub fn can_submit(&self) -> bool {
        !self.text.trim().is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.loaded_file = None;
    }
}
