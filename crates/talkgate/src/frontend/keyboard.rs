//! Function-key front-end on the controlling terminal.

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use futures_util::StreamExt;
use tracing::{info, warn};

use talkgate_core::{Command, Controller, FrontEnd};

use crate::error::CliError;

/// Key → command map.
pub fn binding(key: &KeyEvent) -> Option<Command> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('l') => Some(Command::ClearScreen),
            KeyCode::Char('o') => Some(Command::PingServers),
            KeyCode::Char('s') => Some(Command::ScanChannels),
            KeyCode::Char('u') => Some(Command::ShowUptime),
            KeyCode::Char('n') => Some(Command::NextServer),
            KeyCode::Char('f') => Some(Command::PreviousServer),
            KeyCode::Char('c') => Some(Command::Quit),
            _ => None,
        };
    }
    match key.code {
        KeyCode::Delete => Some(Command::DisplayMenu),
        KeyCode::F(1) => Some(Command::ChannelUp),
        KeyCode::F(2) => Some(Command::ChannelDown),
        KeyCode::F(3) => Some(Command::MuteToggle),
        KeyCode::F(7) => Some(Command::ListChannels),
        KeyCode::F(8) => Some(Command::StartTransmitting),
        KeyCode::F(9) => Some(Command::StopTransmitting),
        KeyCode::F(10) => Some(Command::ListOnlineUsers),
        KeyCode::F(11) => Some(Command::StreamToggle),
        _ => None,
    }
}

/// Raw mode for the lifetime of the value.
pub struct RawMode(());

impl RawMode {
    pub fn enable() -> Result<Self, CliError> {
        terminal::enable_raw_mode().map_err(|source| CliError::Terminal { source })?;
        Ok(Self(()))
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            warn!(error = %e, "failed to restore terminal");
        }
    }
}

/// Read keys until the gateway stops or the terminal closes.
pub async fn run(controller: Controller, raw: RawMode) {
    let cancel = controller.cancel_token();
    let mut events = EventStream::new();
    let dispatcher = super::Dispatcher::spawn(FrontEnd::Keyboard, controller);
    info!("keyboard ready: Del for the menu, Ctrl-C to quit");

    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.next() => event,
        };

        match event {
            Some(Ok(Event::Key(key))) => {
                let Some(command) = binding(&key) else {
                    continue;
                };
                let name: &'static str = command.into();
                dispatcher.submit(name);
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(error = %e, "keyboard read failed");
                break;
            }
            None => break,
        }
    }
    drop(raw);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn function_keys_map_to_commands() {
        assert_eq!(binding(&key(KeyCode::F(1))), Some(Command::ChannelUp));
        assert_eq!(binding(&key(KeyCode::F(2))), Some(Command::ChannelDown));
        assert_eq!(binding(&key(KeyCode::F(11))), Some(Command::StreamToggle));
        assert_eq!(binding(&key(KeyCode::Delete)), Some(Command::DisplayMenu));
        assert_eq!(binding(&key(KeyCode::F(5))), None);
    }

    #[test]
    fn control_chords_need_the_modifier() {
        assert_eq!(binding(&ctrl('c')), Some(Command::Quit));
        assert_eq!(binding(&ctrl('n')), Some(Command::NextServer));
        assert_eq!(binding(&ctrl('f')), Some(Command::PreviousServer));
        assert_eq!(binding(&key(KeyCode::Char('c'))), None);
    }

    #[test]
    fn releases_are_ignored() {
        let mut release = key(KeyCode::F(8));
        release.kind = KeyEventKind::Release;
        assert_eq!(binding(&release), None);
    }
}
