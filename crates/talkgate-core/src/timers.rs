// ── Background timers ──
//
// Heartbeat blink, backlight timeout and beacon ticks. Each runs as its
// own task and stops when the gateway's token is cancelled. Timers never
// touch `SessionState`; they read snapshots or post requests.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Timings;
use crate::gateway::Request;
use crate::ports::{IndicatorPort, Led};
use crate::state::SessionSnapshot;

pub(crate) fn spawn<I: IndicatorPort>(
    timings: &Timings,
    indicators: Arc<I>,
    snapshots: watch::Receiver<SessionSnapshot>,
    activity: Arc<Notify>,
    requests: mpsc::Sender<Request>,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    if let Some(period) = timings.heartbeat {
        handles.push(tokio::spawn(heartbeat_task(
            period,
            Arc::clone(&indicators),
            snapshots,
            cancel.clone(),
        )));
    }
    if let Some(timeout) = timings.backlight {
        handles.push(tokio::spawn(backlight_task(
            timeout,
            Arc::clone(&indicators),
            activity,
            cancel.clone(),
        )));
    }
    if let Some(period) = timings.beacon {
        handles.push(tokio::spawn(beacon_task(period, requests, cancel)));
    }
    handles
}

/// Blink the heartbeat LED while connected; keep it dark otherwise.
async fn heartbeat_task<I: IndicatorPort>(
    period: Duration,
    indicators: Arc<I>,
    snapshots: watch::Receiver<SessionSnapshot>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut lit = false;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let connected = snapshots.borrow().connected;
        lit = connected && !lit;
        let _ = indicators.set_led(Led::Heartbeat, lit);
    }
    let _ = indicators.set_led(Led::Heartbeat, false);
    debug!("heartbeat stopped");
}

/// Keep the backlight on until `timeout` passes without activity.
async fn backlight_task<I: IndicatorPort>(
    timeout: Duration,
    indicators: Arc<I>,
    activity: Arc<Notify>,
    cancel: CancellationToken,
) {
    'outer: loop {
        let _ = indicators.set_led(Led::Backlight, true);
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break 'outer,
                () = activity.notified() => {}
                () = tokio::time::sleep(timeout) => break,
            }
        }
        let _ = indicators.set_led(Led::Backlight, false);
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = activity.notified() => {}
        }
    }
    debug!("backlight timer stopped");
}

async fn beacon_task(period: Duration, requests: mpsc::Sender<Request>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if requests.try_send(Request::Beacon).is_err() {
                    debug!("beacon tick dropped");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::testing::RecordingIndicators;
    use pretty_assertions::assert_eq;

    #[tokio::test(start_paused = true)]
    async fn backlight_turns_off_after_idle_and_back_on_with_activity() {
        let indicators = Arc::new(RecordingIndicators::default());
        let activity = Arc::new(Notify::new());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(backlight_task(
            Duration::from_secs(5),
            Arc::clone(&indicators),
            Arc::clone(&activity),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(indicators.led(Led::Backlight), Some(true));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(indicators.led(Led::Backlight), Some(false));

        activity.notify_one();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(indicators.led(Led::Backlight), Some(true));

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_stays_dark_while_offline() {
        let indicators = Arc::new(RecordingIndicators::default());
        let (tx, rx) = watch::channel(SessionSnapshot::default());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(heartbeat_task(
            Duration::from_secs(1),
            Arc::clone(&indicators),
            rx,
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(indicators.led_history(Led::Heartbeat), vec![false, false, false]);

        tx.send_modify(|s| s.connected = true);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(
            indicators.led_history(Led::Heartbeat),
            vec![false, false, false, true, false]
        );

        cancel.cancel();
        task.await.unwrap();
    }
}
