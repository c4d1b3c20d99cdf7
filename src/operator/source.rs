//! Key source abstraction for operator input.
//!
//! The keyboard task calls [`KeySource::next_key`] in a `select!` with
//! cancellation and forwards each key with [`super::deliver`].

use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};

/// Events produced by a key source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Key(char),
    /// No more input will arrive.
    Eof,
}

/// Trait abstracting where operator keys come from.
#[async_trait]
pub trait KeySource: Send + 'static {
    /// Wait for the next key.
    async fn next_key(&mut self) -> Result<KeyEvent>;

    /// Human-readable name for logging.
    fn source_name(&self) -> &str;
}

// ============================================================================
// Stdin Source
// ============================================================================

/// Reads keys from stdin.
///
/// The terminal stays in line mode, so keys arrive when the operator
/// presses Enter; every non-whitespace character on the line is a key.
pub struct StdinKeys {
    reader: BufReader<Stdin>,
    line_buffer: String,
    queued: VecDeque<char>,
}

impl StdinKeys {
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
            line_buffer: String::with_capacity(64),
            queued: VecDeque::new(),
        }
    }
}

impl Default for StdinKeys {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeySource for StdinKeys {
    async fn next_key(&mut self) -> Result<KeyEvent> {
        loop {
            if let Some(key) = self.queued.pop_front() {
                return Ok(KeyEvent::Key(key));
            }
            self.line_buffer.clear();
            let bytes = self.reader.read_line(&mut self.line_buffer).await?;
            if bytes == 0 {
                return Ok(KeyEvent::Eof);
            }
            self.queued
                .extend(self.line_buffer.chars().filter(|c| !c.is_whitespace()));
        }
    }

    fn source_name(&self) -> &str {
        "stdin"
    }
}

// ============================================================================
// Scripted Source
// ============================================================================

/// Replays a fixed key sequence with a delay before each key.
pub struct ScriptedKeys {
    keys: std::vec::IntoIter<char>,
    delay: Duration,
}

impl ScriptedKeys {
    pub fn new(script: &str, delay: Duration) -> Self {
        let keys: Vec<char> = script.chars().filter(|c| !c.is_whitespace()).collect();
        Self {
            keys: keys.into_iter(),
            delay,
        }
    }
}

#[async_trait]
impl KeySource for ScriptedKeys {
    async fn next_key(&mut self) -> Result<KeyEvent> {
        match self.keys.next() {
            Some(key) => {
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                Ok(KeyEvent::Key(key))
            }
            None => Ok(KeyEvent::Eof),
        }
    }

    fn source_name(&self) -> &str {
        "script"
    }
}
