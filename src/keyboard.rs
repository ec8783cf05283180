//! Operator keyboard input. The booth is driven with a barcode scanner
//! that types serial characters and a few action keys: SPACE captures or
//! accepts, BACKSPACE/DELETE rejects (or edits the serial), and `q` or
//! ESC quits.

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::coordinator::Command;
use crate::error::Result;

pub struct KeyboardInputHandler {
    commands: mpsc::Sender<Command>,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    pub fn new(commands: mpsc::Sender<Command>, cancellation_token: CancellationToken) -> Self {
        Self {
            commands,
            cancellation_token,
        }
    }

    /// Map a key press to an operator command, if it is one we act on.
    fn map_key(code: KeyCode) -> Option<Command> {
        match code {
            KeyCode::Char(' ') => Some(Command::PrimaryAction),
            KeyCode::Backspace | KeyCode::Delete => Some(Command::Backspace),
            KeyCode::Char('q') | KeyCode::Esc => Some(Command::Shutdown),
            KeyCode::Char(c) if !c.is_control() => Some(Command::AppendSerial(c)),
            _ => None,
        }
    }

    /// Start listening for keyboard input on a blocking task.
    pub async fn start(&self) -> Result<()> {
        info!("Keyboard input active - scan a serial, SPACE to capture/accept, BACKSPACE to reject");

        let commands = self.commands.clone();
        let cancellation_token = self.cancellation_token.clone();

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            loop {
                if cancellation_token.is_cancelled() {
                    debug!("Keyboard input handler stopping");
                    break;
                }

                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        if let Ok(Event::Key(key_event)) = event::read() {
                            if key_event.kind != KeyEventKind::Press {
                                continue;
                            }
                            let quit = matches!(
                                key_event.code,
                                KeyCode::Char('q') | KeyCode::Esc
                            );
                            if let Some(command) = Self::map_key(key_event.code) {
                                if commands.blocking_send(command).is_err() {
                                    debug!("Coordinator gone, keyboard handler exiting");
                                    break;
                                }
                            }
                            if quit {
                                break;
                            }
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            }
        });

        Ok(())
    }

    /// Stop the keyboard input handler.
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // Give the task a moment to clean up and disable raw mode
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = disable_raw_mode();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        assert_eq!(
            KeyboardInputHandler::map_key(KeyCode::Char(' ')),
            Some(Command::PrimaryAction)
        );
        assert_eq!(
            KeyboardInputHandler::map_key(KeyCode::Backspace),
            Some(Command::Backspace)
        );
        assert_eq!(
            KeyboardInputHandler::map_key(KeyCode::Delete),
            Some(Command::Backspace)
        );
        assert_eq!(
            KeyboardInputHandler::map_key(KeyCode::Char('q')),
            Some(Command::Shutdown)
        );
        assert_eq!(
            KeyboardInputHandler::map_key(KeyCode::Esc),
            Some(Command::Shutdown)
        );
        assert_eq!(
            KeyboardInputHandler::map_key(KeyCode::Char('A')),
            Some(Command::AppendSerial('A'))
        );
        assert_eq!(KeyboardInputHandler::map_key(KeyCode::F(1)), None);
    }

    #[tokio::test]
    async fn test_handler_stop_cancels_token() {
        let (tx, _rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let handler = KeyboardInputHandler::new(tx, token.clone());

        handler.stop().await.unwrap();
        assert!(token.is_cancelled());
    }
}
