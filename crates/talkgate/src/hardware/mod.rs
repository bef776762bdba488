//! Device adapters behind the core's audio and indicator ports.

pub mod audio;
pub mod gpio;
pub mod indicators;

pub use audio::SystemAudio;
pub use indicators::PanelIndicators;

/// Production panel: LEDs on GPIO character-device lines.
pub type Panel = PanelIndicators<linux_embedded_hal::CdevPin>;
