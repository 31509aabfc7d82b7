use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{self, Duration, MissedTickBehavior};

use crate::engine::classify::format_hms;
use crate::engine::session::{DayPhase, DaySessionView};

pub const IDLE_DISPLAY: &str = "00:00:00";

/// `now − anchor` as `HH:MM:SS`. Clock skew can make the difference
/// negative right after a check-in; clamp to zero instead of wrapping.
pub fn elapsed_display(anchor: DateTime<Utc>, now: DateTime<Utc>) -> String {
    format_hms(now - anchor)
}

/// Presentational elapsed-time loop. Carries no authority: after a restart
/// the display is rebuilt from a fresh `refresh_status`, never from cached
/// elapsed time.
pub struct DurationTicker {
    view: watch::Receiver<DaySessionView>,
    display: watch::Sender<String>,
}

impl DurationTicker {
    /// Returns the ticker and the display handle screens render from.
    pub fn new(view: watch::Receiver<DaySessionView>) -> (Self, watch::Receiver<String>) {
        let (display, display_rx) = watch::channel(IDLE_DISPLAY.to_string());
        (Self { view, display }, display_rx)
    }

    /// Recomputes the display once per second while the session is
    /// `clocked_in`; resets to the idle display the instant the phase
    /// changes, without waiting for the next tick. Ends when the state
    /// machine is dropped.
    pub async fn run(mut self) {
        let mut interval = time::interval(Duration::from_secs(1));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let anchor = {
                        let view = self.view.borrow();
                        if view.phase == DayPhase::ClockedIn {
                            view.anchor
                        } else {
                            None
                        }
                    };
                    if let Some(anchor) = anchor {
                        self.display
                            .send_replace(elapsed_display(anchor, Utc::now()));
                    }
                }
                changed = self.view.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if self.view.borrow().phase != DayPhase::ClockedIn {
                        self.display.send_replace(IDLE_DISPLAY.to_string());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn elapsed_display_formats_hms() {
        let now = Utc::now();
        assert_eq!(
            elapsed_display(now - ChronoDuration::seconds(3661), now),
            "01:01:01"
        );
        assert_eq!(
            elapsed_display(now - ChronoDuration::seconds(3662), now),
            "01:01:02"
        );
    }

    #[test]
    fn elapsed_display_clamps_future_anchor() {
        let now = Utc::now();
        assert_eq!(
            elapsed_display(now + ChronoDuration::seconds(5), now),
            IDLE_DISPLAY
        );
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_publishes_while_clocked_in_and_resets_on_exit() {
        let (view_tx, view_rx) = watch::channel(DaySessionView::idle());
        let (ticker, mut display) = DurationTicker::new(view_rx);
        tokio::spawn(ticker.run());

        view_tx.send_replace(DaySessionView {
            phase: DayPhase::ClockedIn,
            anchor: Some(Utc::now() - ChronoDuration::seconds(3661)),
            pending: None,
        });

        // Next tick picks up the running session
        display.changed().await.unwrap();
        assert_ne!(display.borrow().clone(), IDLE_DISPLAY);

        // Leaving clocked_in resets immediately
        view_tx.send_replace(DaySessionView {
            phase: DayPhase::ClockedOut,
            anchor: None,
            pending: None,
        });
        display.changed().await.unwrap();
        assert_eq!(display.borrow().clone(), IDLE_DISPLAY);
    }
}
