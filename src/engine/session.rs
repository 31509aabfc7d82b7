use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;
use tokio::sync::watch;
use tracing::warn;

use crate::gateway::{DaySnapshot, GatewayError, SessionGateway};

/// Lifecycle of one employee's attendance for the current day. Terminal at
/// `ClockedOut`: no further check-in is offered until the next day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DayPhase {
    NotClockedIn,
    ClockedIn,
    ClockedOut,
}

/// Read model held by screens and the ticker. Rebuilt from the gateway on
/// load and updated optimistically on transitions, never the other way
/// around. `pending` is set while a transition is awaiting the gateway and
/// cleared on commit or rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySessionView {
    pub phase: DayPhase,
    /// Authoritative check-in instant the ticker measures against.
    pub anchor: Option<DateTime<Utc>>,
    pub pending: Option<DayPhase>,
}

impl DaySessionView {
    pub fn idle() -> Self {
        Self {
            phase: DayPhase::NotClockedIn,
            anchor: None,
            pending: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("a transition is already in flight")]
    Busy,
    #[error("not allowed while {0}")]
    InvalidPhase(DayPhase),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Client-side state machine for today's attendance session. One writer,
/// any number of `subscribe()` readers; the gateway stays the source of
/// truth and `refresh_status` replaces local state unconditionally.
pub struct DaySession {
    gateway: Arc<dyn SessionGateway>,
    employee_id: u64,
    view: watch::Sender<DaySessionView>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when a transition finishes, on every path.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl DaySession {
    pub fn new(gateway: Arc<dyn SessionGateway>, employee_id: u64) -> Self {
        let (view, _) = watch::channel(DaySessionView::idle());
        Self {
            gateway,
            employee_id,
            view,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DaySessionView> {
        self.view.subscribe()
    }

    pub fn current(&self) -> DaySessionView {
        self.view.borrow().clone()
    }

    fn begin(&self) -> Result<InFlight<'_>, TransitionError> {
        // Double-submission guard: a second click while a request is in
        // flight must not produce a second network call.
        match self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(InFlight(&self.in_flight)),
            Err(_) => Err(TransitionError::Busy),
        }
    }

    /// Opens today's session. Valid only from `not_clocked_in`; on gateway
    /// rejection or transport failure the prior view is restored.
    pub async fn check_in(&self) -> Result<DateTime<Utc>, TransitionError> {
        let _guard = self.begin()?;

        let prior = self.current();
        if prior.phase != DayPhase::NotClockedIn {
            return Err(TransitionError::InvalidPhase(prior.phase));
        }

        self.view.send_replace(DaySessionView {
            pending: Some(DayPhase::ClockedIn),
            ..prior.clone()
        });

        match self.gateway.check_in(self.employee_id).await {
            Ok(wall) => {
                let anchor = anchor_from_wall_clock(wall);
                self.view.send_replace(DaySessionView {
                    phase: DayPhase::ClockedIn,
                    anchor: Some(anchor),
                    pending: None,
                });
                Ok(anchor)
            }
            Err(e) => {
                self.view.send_replace(prior);
                Err(e.into())
            }
        }
    }

    /// Closes today's session. Valid only from `clocked_in`; afterwards the
    /// day is terminal and the ticker anchor is cleared.
    pub async fn check_out(&self) -> Result<DateTime<Utc>, TransitionError> {
        let _guard = self.begin()?;

        let prior = self.current();
        if prior.phase != DayPhase::ClockedIn {
            return Err(TransitionError::InvalidPhase(prior.phase));
        }

        self.view.send_replace(DaySessionView {
            pending: Some(DayPhase::ClockedOut),
            ..prior.clone()
        });

        match self.gateway.check_out(self.employee_id).await {
            Ok(wall) => {
                let instant = anchor_from_wall_clock(wall);
                self.view.send_replace(DaySessionView {
                    phase: DayPhase::ClockedOut,
                    anchor: None,
                    pending: None,
                });
                Ok(instant)
            }
            Err(e) => {
                self.view.send_replace(prior);
                Err(e.into())
            }
        }
    }

    /// Pulls the authoritative snapshot and replaces local state. This is
    /// how a second device's transition or a server-side correction becomes
    /// visible.
    pub async fn refresh_status(&self) -> Result<DaySessionView, TransitionError> {
        let snapshot = self.gateway.day_status(self.employee_id).await?;
        let view = reconcile(snapshot);
        self.view.send_replace(view.clone());
        Ok(view)
    }
}

/// The store keeps a bare TIME in UTC. Pin it to today's local work day and
/// read the combination back as UTC; resolving it in the host zone instead
/// would drift the elapsed anchor by the local UTC offset.
pub fn anchor_from_wall_clock(wall: NaiveTime) -> DateTime<Utc> {
    let today = Local::now().date_naive();
    Utc.from_utc_datetime(&today.and_time(wall))
}

/// Snapshot → view. A clocked-in snapshot with a missing or malformed time
/// degrades to `not_clocked_in` so the ticker never starts from garbage.
fn reconcile(snapshot: DaySnapshot) -> DaySessionView {
    match snapshot.status {
        DayPhase::ClockedIn => {
            let wall = snapshot
                .check_in_time
                .as_deref()
                .and_then(|s| NaiveTime::parse_from_str(s, "%H:%M:%S").ok());
            match wall {
                Some(wall) => DaySessionView {
                    phase: DayPhase::ClockedIn,
                    anchor: Some(anchor_from_wall_clock(wall)),
                    pending: None,
                },
                None => {
                    warn!(
                        check_in_time = ?snapshot.check_in_time,
                        "clocked-in snapshot without a usable check-in time"
                    );
                    DaySessionView::idle()
                }
            }
        }
        DayPhase::ClockedOut => DaySessionView {
            phase: DayPhase::ClockedOut,
            anchor: None,
            pending: None,
        },
        DayPhase::NotClockedIn => DaySessionView::idle(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Semaphore;

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[derive(Default)]
    struct MockGateway {
        check_in_calls: AtomicUsize,
        check_out_calls: AtomicUsize,
        fail_next: Mutex<Option<GatewayError>>,
        /// When set, check_in parks until a permit is added.
        hold: Option<Arc<Semaphore>>,
        snapshot: Mutex<Option<DaySnapshot>>,
    }

    impl MockGateway {
        fn with_snapshot(status: DayPhase, check_in_time: Option<&str>) -> Self {
            Self {
                snapshot: Mutex::new(Some(DaySnapshot {
                    status,
                    check_in_time: check_in_time.map(str::to_string),
                })),
                ..Default::default()
            }
        }
    }

    #[async_trait::async_trait]
    impl SessionGateway for MockGateway {
        async fn day_status(&self, _employee_id: u64) -> Result<DaySnapshot, GatewayError> {
            self.snapshot
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| GatewayError::Transport("no snapshot configured".into()))
        }

        async fn check_in(&self, _employee_id: u64) -> Result<NaiveTime, GatewayError> {
            self.check_in_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(hold) = &self.hold {
                let _permit = hold.acquire().await.unwrap();
            }
            if let Some(e) = self.fail_next.lock().unwrap().take() {
                return Err(e);
            }
            Ok(t(9, 0, 0))
        }

        async fn check_out(&self, _employee_id: u64) -> Result<NaiveTime, GatewayError> {
            self.check_out_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(e) = self.fail_next.lock().unwrap().take() {
                return Err(e);
            }
            Ok(t(17, 0, 0))
        }
    }

    #[tokio::test]
    async fn check_in_commits_authoritative_anchor() {
        let session = DaySession::new(Arc::new(MockGateway::default()), 7);

        let anchor = session.check_in().await.unwrap();

        let view = session.current();
        assert_eq!(view.phase, DayPhase::ClockedIn);
        assert_eq!(view.anchor, Some(anchor));
        assert_eq!(view.pending, None);
        // UTC wall-clock time-of-day round-trips exactly
        assert_eq!(anchor.time(), t(9, 0, 0));
    }

    #[tokio::test]
    async fn check_in_rejected_after_check_out() {
        let gateway = Arc::new(MockGateway::default());
        let session = DaySession::new(gateway.clone(), 7);

        session.check_in().await.unwrap();
        session.check_out().await.unwrap();

        let err = session.check_in().await.unwrap_err();
        assert!(matches!(
            err,
            TransitionError::InvalidPhase(DayPhase::ClockedOut)
        ));
        // Rejected locally: the gateway saw exactly one check-in
        assert_eq!(gateway.check_in_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.current().phase, DayPhase::ClockedOut);
    }

    #[tokio::test]
    async fn check_out_requires_open_session() {
        let session = DaySession::new(Arc::new(MockGateway::default()), 7);

        let err = session.check_out().await.unwrap_err();
        assert!(matches!(
            err,
            TransitionError::InvalidPhase(DayPhase::NotClockedIn)
        ));
    }

    #[tokio::test]
    async fn gateway_rejection_rolls_back_to_prior_view() {
        let gateway = Arc::new(MockGateway::default());
        *gateway.fail_next.lock().unwrap() = Some(GatewayError::AlreadyRecorded);
        let session = DaySession::new(gateway, 7);
        let prior = session.current();

        let err = session.check_in().await.unwrap_err();

        assert!(matches!(
            err,
            TransitionError::Gateway(GatewayError::AlreadyRecorded)
        ));
        assert_eq!(session.current(), prior);
    }

    #[tokio::test]
    async fn transport_failure_rolls_back_check_out() {
        let gateway = Arc::new(MockGateway::default());
        let session = DaySession::new(gateway.clone(), 7);
        session.check_in().await.unwrap();
        let prior = session.current();

        *gateway.fail_next.lock().unwrap() =
            Some(GatewayError::Transport("connection reset".into()));
        let err = session.check_out().await.unwrap_err();

        match err {
            TransitionError::Gateway(g) => assert!(g.is_retryable()),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(session.current(), prior);
        assert_eq!(session.current().phase, DayPhase::ClockedIn);
    }

    #[tokio::test]
    async fn concurrent_check_in_collapses_to_one_call() {
        let hold = Arc::new(Semaphore::new(0));
        let gateway = Arc::new(MockGateway {
            hold: Some(hold.clone()),
            ..Default::default()
        });
        let session = Arc::new(DaySession::new(gateway.clone(), 7));

        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.check_in().await })
        };
        // Let the first call reach the parked gateway
        while gateway.check_in_calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let second = session.check_in().await;
        assert!(matches!(second, Err(TransitionError::Busy)));

        hold.add_permits(1);
        first.await.unwrap().unwrap();

        assert_eq!(gateway.check_in_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.current().phase, DayPhase::ClockedIn);
    }

    #[tokio::test]
    async fn refresh_reconciles_wall_clock_as_utc() {
        let gateway = Arc::new(MockGateway::with_snapshot(
            DayPhase::ClockedIn,
            Some("14:30:00"),
        ));
        let session = DaySession::new(gateway, 7);

        let view = session.refresh_status().await.unwrap();

        assert_eq!(view.phase, DayPhase::ClockedIn);
        // Whatever the host zone, the anchor's UTC time-of-day is 14:30:00
        assert_eq!(view.anchor.unwrap().time(), t(14, 30, 0));
    }

    #[tokio::test]
    async fn refresh_with_malformed_time_degrades_to_idle() {
        let gateway = Arc::new(MockGateway::with_snapshot(
            DayPhase::ClockedIn,
            Some("not-a-time"),
        ));
        let session = DaySession::new(gateway, 7);

        let view = session.refresh_status().await.unwrap();
        assert_eq!(view, DaySessionView::idle());
    }

    #[tokio::test]
    async fn refresh_replaces_optimistic_state_with_authority() {
        // Another device already closed the day; refresh must overwrite the
        // local clocked-in view.
        let gateway = Arc::new(MockGateway::with_snapshot(DayPhase::ClockedOut, None));
        let session = DaySession::new(gateway, 7);

        let view = session.refresh_status().await.unwrap();
        assert_eq!(view.phase, DayPhase::ClockedOut);
        assert_eq!(view.anchor, None);
    }

    #[tokio::test]
    async fn subscribers_observe_committed_transition() {
        let session = DaySession::new(Arc::new(MockGateway::default()), 7);
        let mut rx = session.subscribe();

        session.check_in().await.unwrap();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().phase, DayPhase::ClockedIn);
    }
}
