//! Terminal input for the CLI.
//!
//! Commands are read as ordinary echoed lines. When a password prompt is
//! open, the next answer is read in raw mode and shown masked. Piped stdin
//! is read line by line with no masking, since nothing is echoed anyway.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use log::debug;
use netpanel::PromptReply;
use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::session::reply_from;

const POLL: Duration = Duration::from_millis(100);
const MASK: &str = "•";
const ERASE: &str = "\u{8} \u{8}";

/// One unit of user input.
#[derive(Debug, PartialEq, Eq)]
pub enum Entry {
    Command(String),
    Secret(PromptReply),
}

/// What a key does to a masked answer.
#[derive(Debug, PartialEq, Eq)]
pub enum Edit {
    /// Write this to the terminal and keep reading.
    Echo(&'static str),
    Done(PromptReply),
}

/// Line editor for a password answer. Never echoes the typed characters.
#[derive(Debug, Default)]
pub struct SecretEditor {
    buf: String,
}

impl SecretEditor {
    pub fn key(&mut self, key: KeyEvent) -> Edit {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Edit::Done(PromptReply::Cancelled)
            }
            KeyCode::Esc => Edit::Done(PromptReply::Cancelled),
            KeyCode::Enter => Edit::Done(reply_from(&std::mem::take(&mut self.buf))),
            KeyCode::Backspace => match self.buf.pop() {
                Some(_) => Edit::Echo(ERASE),
                None => Edit::Echo(""),
            },
            KeyCode::Char(c) => {
                self.buf.push(c);
                Edit::Echo(MASK)
            }
            _ => Edit::Echo(""),
        }
    }
}

/// Restores cooked mode when dropped.
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            debug!("Failed to leave raw mode: {e}");
        }
    }
}

/// Input read on a dedicated thread.
pub struct TerminalInput {
    secret: Arc<AtomicBool>,
    rx: UnboundedReceiver<Entry>,
    tty: bool,
}

impl TerminalInput {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let secret = Arc::new(AtomicBool::new(false));
        let tty = io::stdin().is_terminal();

        let flag = Arc::clone(&secret);
        std::thread::spawn(move || {
            if tty {
                if let Err(e) = read_tty(&tx, &flag) {
                    debug!("Terminal input stopped: {e}");
                }
            } else {
                read_piped(&tx);
            }
        });

        Self { secret, rx, tty }
    }

    /// Whether answers can be masked. Piped input only yields commands.
    pub fn is_terminal(&self) -> bool {
        self.tty
    }

    /// Reads the next answer masked, delivered as [`Entry::Secret`].
    pub fn request_secret(&self) {
        self.secret.store(true, Ordering::SeqCst);
    }

    /// Withdraws a masked read that has not been answered.
    pub fn cancel_secret(&self) {
        self.secret.store(false, Ordering::SeqCst);
    }

    pub async fn recv(&mut self) -> Option<Entry> {
        self.rx.recv().await
    }
}

impl Drop for TerminalInput {
    fn drop(&mut self) {
        // The reader thread may still be mid-answer when the process exits.
        self.cancel_secret();
        if self.tty
            && let Err(e) = disable_raw_mode()
        {
            debug!("Failed to leave raw mode: {e}");
        }
    }
}

fn read_tty(tx: &UnboundedSender<Entry>, secret: &AtomicBool) -> io::Result<()> {
    let mut line = String::new();
    while !tx.is_closed() {
        if line.is_empty() && secret.load(Ordering::SeqCst) {
            if let Some(reply) = read_secret(secret)? {
                secret.store(false, Ordering::SeqCst);
                if tx.send(Entry::Secret(reply)).is_err() {
                    break;
                }
            }
            continue;
        }

        if !event::poll(POLL)? {
            continue;
        }
        if let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            match key.code {
                KeyCode::Enter => {
                    if tx.send(Entry::Command(std::mem::take(&mut line))).is_err() {
                        break;
                    }
                }
                KeyCode::Char(c) => line.push(c),
                _ => {}
            }
        }
    }
    Ok(())
}

/// `None` when the request was withdrawn before an answer.
fn read_secret(secret: &AtomicBool) -> io::Result<Option<PromptReply>> {
    let _raw = RawMode::enable()?;
    let mut editor = SecretEditor::default();
    let mut out = io::stdout();

    loop {
        if !secret.load(Ordering::SeqCst) {
            write!(out, "\r\n")?;
            out.flush()?;
            return Ok(None);
        }
        if !event::poll(POLL)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match editor.key(key) {
            Edit::Echo(text) => {
                out.write_all(text.as_bytes())?;
                out.flush()?;
            }
            Edit::Done(reply) => {
                write!(out, "\r\n")?;
                out.flush()?;
                return Ok(Some(reply));
            }
        }
    }
}

fn read_piped(tx: &UnboundedSender<Entry>) {
    for line in io::stdin().lock().lines() {
        match line {
            Ok(line) => {
                if tx.send(Entry::Command(line)).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("stdin closed: {e}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(editor: &mut SecretEditor, text: &str) -> Vec<Edit> {
        text.chars().map(|c| editor.key(press(KeyCode::Char(c)))).collect()
    }

    #[test]
    fn answer_is_masked() {
        let mut editor = SecretEditor::default();
        let echoed = type_str(&mut editor, "hunter2");
        assert!(echoed.iter().all(|e| *e == Edit::Echo(MASK)));
        assert_eq!(
            editor.key(press(KeyCode::Enter)),
            Edit::Done(PromptReply::Password("hunter2".into()))
        );
    }

    #[test]
    fn backspace_erases_one_mask() {
        let mut editor = SecretEditor::default();
        type_str(&mut editor, "hunter22");
        assert_eq!(editor.key(press(KeyCode::Backspace)), Edit::Echo(ERASE));
        assert_eq!(
            editor.key(press(KeyCode::Enter)),
            Edit::Done(PromptReply::Password("hunter2".into()))
        );
        assert_eq!(editor.key(press(KeyCode::Backspace)), Edit::Echo(""));
    }

    #[test]
    fn escape_and_ctrl_c_cancel() {
        let mut editor = SecretEditor::default();
        type_str(&mut editor, "abc");
        assert_eq!(
            editor.key(press(KeyCode::Esc)),
            Edit::Done(PromptReply::Cancelled)
        );
        assert_eq!(
            editor.key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Edit::Done(PromptReply::Cancelled)
        );
    }

    #[test]
    fn empty_answer_cancels() {
        let mut editor = SecretEditor::default();
        assert_eq!(
            editor.key(press(KeyCode::Enter)),
            Edit::Done(PromptReply::Cancelled)
        );
    }
}
