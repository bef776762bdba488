//! Opens the configured GPIO lines on a Linux character device.

use std::collections::BTreeMap;

use gpio_cdev::{Chip, LineRequestFlags};
use linux_embedded_hal::CdevPin;
use tracing::info;

use talkgate_config::{ButtonBinding, GpioPlan};
use talkgate_core::Led;

use crate::error::CliError;

const CONSUMER: &str = "talkgate";

/// Requested lines, ready to hand to the panel and the button pollers.
pub struct GpioLines {
    pub leds: BTreeMap<Led, CdevPin>,
    pub buttons: Vec<(ButtonBinding, CdevPin)>,
}

pub fn open(plan: &GpioPlan) -> Result<GpioLines, CliError> {
    let chip_name = plan.chip.display().to_string();
    let fail = |reason: String| CliError::Gpio {
        chip: chip_name.clone(),
        reason,
    };

    let mut chip = Chip::new(&plan.chip).map_err(|e| fail(e.to_string()))?;
    let mut request = |offset: u32, flags: LineRequestFlags| -> Result<CdevPin, CliError> {
        let handle = chip
            .get_line(offset)
            .and_then(|line| line.request(flags, 0, CONSUMER))
            .map_err(|e| fail(format!("line {offset}: {e}")))?;
        CdevPin::new(handle).map_err(|e| fail(format!("line {offset}: {e}")))
    };

    let mut leds = BTreeMap::new();
    for &(led, offset) in &plan.leds {
        leds.insert(led, request(offset, LineRequestFlags::OUTPUT)?);
    }

    let mut buttons = Vec::with_capacity(plan.buttons.len());
    for binding in &plan.buttons {
        buttons.push((binding.clone(), request(binding.pin, LineRequestFlags::INPUT)?));
    }

    info!(
        chip = %chip_name,
        leds = leds.len(),
        buttons = buttons.len(),
        "GPIO lines requested"
    );
    Ok(GpioLines { leds, buttons })
}
