//! GPIO buttons, polled. One task per button.
//!
//! A button runs its `press` command on the pressed edge and its
//! `release` command (if any) on the released edge, so push-to-talk and
//! the comment switch are both plain bindings.

use std::time::Duration;

use embedded_hal::digital::InputPin;
use tracing::warn;

use talkgate_config::ButtonBinding;
use talkgate_core::{Command, Controller, FrontEnd};

pub struct Button<P> {
    pin: P,
    binding: ButtonBinding,
    active_low: bool,
    pressed: bool,
}

impl<P: InputPin> Button<P> {
    pub fn new(pin: P, binding: ButtonBinding, active_low: bool) -> Self {
        Self {
            pin,
            binding,
            active_low,
            pressed: false,
        }
    }

    /// Read the line; returns the command bound to a new edge.
    pub fn sample(&mut self) -> Result<Option<Command>, P::Error> {
        let pressed = self.pin.is_high()? != self.active_low;
        if pressed == self.pressed {
            return Ok(None);
        }
        self.pressed = pressed;
        Ok(if pressed {
            Some(self.binding.press)
        } else {
            self.binding.release
        })
    }
}

/// Poll every `poll` while connected and every `idle` otherwise.
pub async fn run<P>(mut button: Button<P>, poll: Duration, idle: Duration, controller: Controller)
where
    P: InputPin + Send,
{
    let cancel = controller.cancel_token();
    let dispatcher = super::Dispatcher::spawn(FrontEnd::Gpio, controller.clone());
    loop {
        let interval = if controller.snapshot().connected {
            poll
        } else {
            idle
        };
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }

        let command = match button.sample() {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                warn!(pin = button.binding.pin, error = ?e, "button read failed");
                continue;
            }
        };
        let name: &'static str = command.into();
        dispatcher.submit(name);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::collections::VecDeque;
    use std::convert::Infallible;

    use embedded_hal::digital::ErrorType;
    use pretty_assertions::assert_eq;

    use super::*;

    /// Replays line levels, holding the last one.
    struct Levels(VecDeque<bool>);

    impl ErrorType for Levels {
        type Error = Infallible;
    }

    impl InputPin for Levels {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            let level = self.0.front().copied().unwrap_or(true);
            if self.0.len() > 1 {
                self.0.pop_front();
            }
            Ok(level)
        }
        fn is_low(&mut self) -> Result<bool, Infallible> {
            self.is_high().map(|high| !high)
        }
    }

    fn samples(button: &mut Button<Levels>, n: usize) -> Vec<Option<Command>> {
        (0..n).map(|_| button.sample().unwrap()).collect()
    }

    #[test]
    fn push_to_talk_keys_on_press_and_unkeys_on_release() {
        let binding = ButtonBinding {
            pin: 17,
            press: Command::StartTransmitting,
            release: Some(Command::StopTransmitting),
        };
        // Active low: idle high, pressed low.
        let levels = Levels([true, false, false, true, true].into());
        let mut button = Button::new(levels, binding, true);

        assert_eq!(
            samples(&mut button, 5),
            [
                None,
                Some(Command::StartTransmitting),
                None,
                Some(Command::StopTransmitting),
                None,
            ]
        );
    }

    #[test]
    fn momentary_button_fires_once_per_press() {
        let binding = ButtonBinding {
            pin: 27,
            press: Command::ChannelUp,
            release: None,
        };
        let levels = Levels([false, false, true, false, true].into());
        let mut button = Button::new(levels, binding, true);

        assert_eq!(
            samples(&mut button, 5),
            [Some(Command::ChannelUp), None, None, Some(Command::ChannelUp), None]
        );
    }

    #[test]
    fn active_high_lines_invert() {
        let binding = ButtonBinding {
            pin: 4,
            press: Command::CommentOn,
            release: Some(Command::CommentOff),
        };
        let levels = Levels([true, false].into());
        let mut button = Button::new(levels, binding, false);

        assert_eq!(
            samples(&mut button, 2),
            [Some(Command::CommentOn), Some(Command::CommentOff)]
        );
    }
}
