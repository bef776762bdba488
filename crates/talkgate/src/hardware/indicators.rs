//! LEDs on output lines plus the four-line status display on the console.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Mutex;

use crossterm::{cursor, execute, terminal};
use embedded_hal::digital::OutputPin;
use tracing::{debug, trace};

use talkgate_core::{DISPLAY_LINES, IndicatorPort, Led, PortError};

pub struct PanelIndicators<P> {
    leds: Mutex<BTreeMap<Led, P>>,
    /// Last rendered frame; identical frames are not redrawn.
    frame: Mutex<[String; DISPLAY_LINES]>,
    console: bool,
}

impl<P> PanelIndicators<P> {
    /// `console` enables drawing the display on stdout.
    pub fn new(leds: BTreeMap<Led, P>, console: bool) -> Self {
        Self {
            leds: Mutex::new(leds),
            frame: Mutex::new(Default::default()),
            console,
        }
    }
}

fn poisoned(what: &str) -> PortError {
    PortError::Device(format!("{what} lock poisoned"))
}

impl<P: OutputPin + Send + 'static> IndicatorPort for PanelIndicators<P> {
    fn set_led(&self, led: Led, on: bool) -> Result<(), PortError> {
        let mut leds = self.leds.lock().map_err(|_| poisoned("LED"))?;
        let Some(pin) = leds.get_mut(&led) else {
            trace!(%led, on, "no line for LED");
            return Ok(());
        };
        let result = if on { pin.set_high() } else { pin.set_low() };
        result.map_err(|e| PortError::Device(format!("LED {led}: {e:?}")))
    }

    fn render(&self, lines: &[String; DISPLAY_LINES]) -> Result<(), PortError> {
        let mut frame = self.frame.lock().map_err(|_| poisoned("display"))?;
        if *frame == *lines {
            return Ok(());
        }
        frame.clone_from(lines);
        debug!(lines = ?lines, "display");

        if self.console {
            let mut out = io::stdout().lock();
            writeln!(out, "\r+{}", "-".repeat(22))?;
            for line in lines {
                writeln!(out, "\r| {line}")?;
            }
            writeln!(out, "\r+{}", "-".repeat(22))?;
            out.flush()?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), PortError> {
        if let Ok(mut frame) = self.frame.lock() {
            *frame = Default::default();
        }
        if self.console {
            execute!(
                io::stdout(),
                terminal::Clear(terminal::ClearType::All),
                cursor::MoveTo(0, 0)
            )?;
        }
        Ok(())
    }
}
