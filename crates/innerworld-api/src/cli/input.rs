//! Line input for the interactive chat loop.
//!
//! A terminal gets `rustyline_async` (line editing, history, Ctrl+C/Ctrl+D
//! handling); piped stdin is read line by line so scripted sessions work.

use std::io::{IsTerminal, Write};

use rustyline_async::{Readline, ReadlineError, ReadlineEvent, SharedWriter};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};

/// What the user did at the prompt.
#[derive(Debug, PartialEq)]
pub enum InputEvent {
    /// A submitted line, trimmed.
    Message(String),
    /// End of input (Ctrl+D or a closed pipe).
    Eof,
    /// Ctrl+C at the terminal prompt.
    Interrupted,
}

type PipedLines = Lines<BufReader<Box<dyn AsyncRead + Unpin + Send>>>;

pub enum ChatInput {
    Terminal { rl: Readline, writer: SharedWriter },
    Piped(PipedLines),
}

impl ChatInput {
    /// Readline on a TTY, plain lines otherwise.
    pub fn stdin(prompt: &str) -> Result<Self, ReadlineError> {
        if std::io::stdin().is_terminal() {
            let (rl, writer) = Readline::new(prompt.to_string())?;
            Ok(ChatInput::Terminal { rl, writer })
        } else {
            Ok(Self::from_reader(tokio::io::stdin()))
        }
    }

    pub fn from_reader(reader: impl AsyncRead + Unpin + Send + 'static) -> Self {
        let reader: Box<dyn AsyncRead + Unpin + Send> = Box::new(reader);
        ChatInput::Piped(BufReader::new(reader).lines())
    }

    /// The terminal has its own prompt; piped input needs one printed.
    pub fn has_own_prompt(&self) -> bool {
        matches!(self, ChatInput::Terminal { .. })
    }

    /// Writer that does not clobber the readline prompt.
    pub fn writer(&self) -> Box<dyn Write + Send> {
        match self {
            ChatInput::Terminal { writer, .. } => Box::new(writer.clone()),
            ChatInput::Piped(_) => Box::new(std::io::stdout()),
        }
    }

    pub async fn read_line(&mut self) -> std::io::Result<InputEvent> {
        match self {
            ChatInput::Terminal { rl, .. } => match rl.readline().await {
                Ok(ReadlineEvent::Line(line)) => {
                    let trimmed = line.trim().to_string();
                    if !trimmed.is_empty() {
                        rl.add_history_entry(trimmed.clone());
                    }
                    Ok(InputEvent::Message(trimmed))
                }
                Ok(ReadlineEvent::Eof) => Ok(InputEvent::Eof),
                Ok(ReadlineEvent::Interrupted) => Ok(InputEvent::Interrupted),
                Err(ReadlineError::IO(e)) => Err(e),
                Err(_) => Ok(InputEvent::Eof),
            },
            ChatInput::Piped(lines) => Ok(match lines.next_line().await? {
                Some(line) => InputEvent::Message(line.trim().to_string()),
                None => InputEvent::Eof,
            }),
        }
    }

    /// Flush pending terminal output before the readline is dropped.
    pub fn finish(mut self) {
        if let ChatInput::Terminal { rl, .. } = &mut self {
            let _ = rl.flush();
        }
    }
}
