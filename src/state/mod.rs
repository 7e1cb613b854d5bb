pub mod machine;
mod sse;

use std::{sync::Arc, time::Duration};

use tokio::sync::{Mutex, RwLock, watch};
use tokio::time::timeout;
use tracing::warn;

use crate::{
    config::AppConfig,
    dao::{blob::BlobStore, models::TournamentStatus, store::TournamentStore},
    error::ServiceError,
};

pub use self::machine::{AbortError, ApplyError, Plan, PlanError, PlanId};
pub use self::sse::SseHub;
use self::{
    machine::{TournamentEvent, TournamentMachine},
    sse::SseState,
};

pub type SharedState = Arc<AppState>;
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);

/// Central application state storing the storage handle, the lifecycle state
/// machine and the SSE broadcast hubs.
pub struct AppState {
    store: RwLock<Option<Arc<dyn TournamentStore>>>,
    blob: Arc<dyn BlobStore>,
    config: AppConfig,
    sse: SseState,
    machine: RwLock<TournamentMachine>,
    degraded: watch::Sender<bool>,
    transition_gate: Mutex<()>,
    advance_gate: Mutex<()>,
    transition_timeout: Option<Duration>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, blob: Arc<dyn BlobStore>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: RwLock::new(None),
            blob,
            config,
            sse: SseState::new(16, 16),
            machine: RwLock::new(TournamentMachine::new()),
            degraded: degraded_tx,
            transition_gate: Mutex::new(()),
            advance_gate: Mutex::new(()),
            transition_timeout: Some(DEFAULT_TRANSITION_TIMEOUT),
        })
    }

    /// Obtain a handle to the current tournament store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn TournamentStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the store or fail with the degraded-mode error.
    pub async fn require_store(&self) -> Result<Arc<dyn TournamentStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn TournamentStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.store.read().await;
        guard.is_none()
    }

    /// Handle used to persist submitted images.
    pub fn blob(&self) -> Arc<dyn BlobStore> {
        self.blob.clone()
    }

    /// Static application configuration (prompt pools, upload paths, limits).
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Broadcast hub used for the public SSE streams.
    pub fn public_sse(&self) -> &SseHub {
        self.sse.public()
    }

    /// Broadcast hub used for the admin SSE stream.
    pub fn admin_sse(&self) -> &SseHub {
        self.sse.admin().hub()
    }

    /// Token guard that ensures a single admin SSE subscriber at a time.
    pub fn admin_token(&self) -> &Mutex<Option<String>> {
        self.sse.admin().token()
    }

    /// Snapshot the current status of the lifecycle state machine.
    pub async fn lifecycle_status(&self) -> TournamentStatus {
        self.machine.read().await.status()
    }

    /// Force the lifecycle machine to a stored status at boot.
    pub async fn resume_lifecycle(&self, status: TournamentStatus) {
        let mut sm = self.machine.write().await;
        sm.resume(status);
    }

    /// Gate serialising bracket advancement so concurrent winner commits
    /// cannot both generate the next round.
    pub fn advance_gate(&self) -> &Mutex<()> {
        &self.advance_gate
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        if self.is_degraded().await == value {
            return;
        }

        let _ = self.degraded.send(value);
    }

    async fn plan_transition(&self, event: TournamentEvent) -> Result<Plan, PlanError> {
        let mut sm = self.machine.write().await;
        sm.plan(event)
    }

    async fn apply_planned_transition(
        &self,
        plan_id: PlanId,
    ) -> Result<TournamentStatus, ApplyError> {
        let mut sm = self.machine.write().await;
        sm.apply(plan_id)
    }

    async fn abort_transition(&self, plan_id: PlanId) -> Result<(), AbortError> {
        let mut sm = self.machine.write().await;
        sm.abort(plan_id)
    }

    /// Run `work` under a planned lifecycle transition.
    ///
    /// The transition gate makes concurrent attempts sequential, so the first
    /// start (or reset) wins and the loser fails its plan with an invalid
    /// transition instead of running the side effects twice.
    pub async fn run_transition<F, Fut, T>(
        &self,
        event: TournamentEvent,
        work: F,
    ) -> Result<(T, TournamentStatus), ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.transition_gate.lock().await;
        let Plan { id: plan_id, .. } = self.plan_transition(event).await?;

        let work_future = work();
        let outcome = if let Some(limit) = self.transition_timeout {
            match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    if let Err(abort_err) = self.abort_transition(plan_id).await {
                        warn!(
                            event = ?event,
                            plan_id = %plan_id,
                            error = ?abort_err,
                            "failed to abort transition after timeout"
                        );
                    }
                    drop(gate);
                    return Err(ServiceError::Timeout);
                }
            }
        } else {
            work_future.await
        };

        match outcome {
            Ok(value) => {
                let next = self.apply_planned_transition(plan_id).await?;
                drop(gate);
                Ok((value, next))
            }
            Err(err) => {
                if let Err(abort_err) = self.abort_transition(plan_id).await {
                    warn!(
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                drop(gate);
                Err(err)
            }
        }
    }
}
