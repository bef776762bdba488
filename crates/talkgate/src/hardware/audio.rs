//! Audio through external tools: a player for local cues, a mixer for
//! mute, and optional commands for capture and streaming.

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use talkgate_config::AudioConfig;
use talkgate_core::{AudioPort, MuteMode, PortError, SoundCue};

pub struct SystemAudio {
    player: Vec<String>,
    mixer: String,
    mixer_control: String,
    transmit: Option<Vec<String>>,
    stream: Option<Vec<String>>,
    capture: Mutex<Option<Child>>,
    muted: Arc<AtomicBool>,
}

impl SystemAudio {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            player: config.player.clone(),
            mixer: config.mixer.clone(),
            mixer_control: config.mixer_control.clone(),
            transmit: config.transmit_command.clone(),
            stream: config.stream_command.clone(),
            capture: Mutex::new(None),
            muted: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Substitute `{file}` and `{volume}` into a command template.
fn expand(template: &[String], cue: Option<&SoundCue>) -> Option<Command> {
    let (program, args) = template.split_first()?;
    let file = cue.map(|c| c.path.display().to_string()).unwrap_or_default();
    let volume = cue.map(|c| c.volume.to_string()).unwrap_or_default();

    let mut command = Command::new(program);
    command
        .args(
            args.iter()
                .map(|a| a.replace("{file}", &file).replace("{volume}", &volume)),
        )
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    Some(command)
}

impl AudioPort for SystemAudio {
    fn play_local(&self, cue: &SoundCue) -> Result<(), PortError> {
        let mut command =
            expand(&self.player, Some(cue)).ok_or(PortError::Unsupported("local playback"))?;
        // Not awaited; the runtime reaps the child.
        command.spawn()?;
        debug!(file = %cue.path.display(), volume = cue.volume, "playing cue");
        Ok(())
    }

    fn start_capture(&self) -> Result<(), PortError> {
        let template = self
            .transmit
            .as_deref()
            .ok_or(PortError::Unsupported("transmit capture"))?;
        let mut command =
            expand(template, None).ok_or(PortError::Unsupported("transmit capture"))?;
        let child = command.kill_on_drop(true).spawn()?;

        let mut capture = self
            .capture
            .lock()
            .map_err(|_| PortError::Device("capture lock poisoned".into()))?;
        if let Some(mut previous) = capture.replace(child) {
            previous.start_kill()?;
        }
        Ok(())
    }

    fn stop_capture(&self) -> Result<(), PortError> {
        let child = self
            .capture
            .lock()
            .map_err(|_| PortError::Device("capture lock poisoned".into()))?
            .take();
        match child {
            Some(mut child) => Ok(child.start_kill()?),
            None => Ok(()),
        }
    }

    fn stream_into_channel(
        &self,
        cue: &SoundCue,
        cancel: CancellationToken,
    ) -> Result<(), PortError> {
        let template = self
            .stream
            .as_deref()
            .ok_or(PortError::Unsupported("channel streaming"))?;
        let mut command =
            expand(template, Some(cue)).ok_or(PortError::Unsupported("channel streaming"))?;
        let mut child = command.kill_on_drop(true).spawn()?;
        let file = cue.path.display().to_string();

        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "failed to stop stream");
                    }
                    debug!(file, "stream cancelled");
                }
                status = child.wait() => match status {
                    Ok(status) => debug!(file, %status, "stream finished"),
                    Err(e) => warn!(file, error = %e, "stream failed"),
                },
            }
        });
        Ok(())
    }

    fn set_mute(&self, mode: MuteMode) -> Result<bool, PortError> {
        let action = match mode {
            MuteMode::Mute => "mute",
            MuteMode::Unmute => "unmute",
            MuteMode::Toggle => "toggle",
        };
        let mut child = Command::new(&self.mixer)
            .args(["-q", "set", &self.mixer_control, action])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let previous = self.muted.load(Ordering::SeqCst);
        let muted = match mode {
            MuteMode::Mute => true,
            MuteMode::Unmute => false,
            MuteMode::Toggle => !previous,
        };
        self.muted.store(muted, Ordering::SeqCst);

        // The mixer is reaped off the worker; a failed run puts the tracked
        // state back unless something changed it since.
        let mixer = self.mixer.clone();
        let tracked = Arc::clone(&self.muted);
        tokio::spawn(async move {
            let failure = match child.wait().await {
                Ok(status) if status.success() => return,
                Ok(status) => format!("exited with {status}"),
                Err(e) => e.to_string(),
            };
            warn!(mixer, action, failure, "mute change failed");
            let _ = tracked.compare_exchange(muted, previous, Ordering::SeqCst, Ordering::SeqCst);
        });
        Ok(muted)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;

    fn audio(mixer: &str) -> SystemAudio {
        SystemAudio::new(&AudioConfig {
            mixer: mixer.into(),
            ..AudioConfig::default()
        })
    }

    #[test]
    fn templates_substitute_file_and_volume() {
        let cue = SoundCue {
            path: PathBuf::from("/sounds/join.wav"),
            volume: 40,
        };
        let template = ["play", "-v", "{volume}", "{file}"].map(String::from);
        let command = expand(&template, Some(&cue)).unwrap();
        let args: Vec<_> = command.as_std().get_args().collect();
        assert_eq!(args, ["-v", "40", "/sounds/join.wav"]);
        assert!(expand(&[], Some(&cue)).is_none());
    }

    #[test]
    fn capture_without_command_is_unsupported() {
        let audio = audio("true");
        assert!(matches!(
            audio.start_capture(),
            Err(PortError::Unsupported("transmit capture"))
        ));
        audio.stop_capture().unwrap();
    }

    #[tokio::test]
    async fn toggle_flips_tracked_mute_state() {
        let audio = audio("true");
        assert!(audio.set_mute(MuteMode::Toggle).unwrap());
        assert!(!audio.set_mute(MuteMode::Toggle).unwrap());
        assert!(audio.set_mute(MuteMode::Mute).unwrap());
        assert!(!audio.set_mute(MuteMode::Unmute).unwrap());
    }

    #[tokio::test]
    async fn missing_mixer_is_an_error_and_keeps_state() {
        let audio = audio("/nonexistent/talkgate-mixer");
        assert!(audio.set_mute(MuteMode::Mute).is_err());
        assert!(!audio.muted.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failing_mixer_restores_mute_state() {
        let audio = audio("false");
        assert!(audio.set_mute(MuteMode::Mute).unwrap());

        tokio::time::timeout(Duration::from_secs(5), async {
            while audio.muted.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }
}
