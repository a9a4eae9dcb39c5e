//! Rewarded ad slot driver
//!
//! One spawned task per slot owns the whole reward state: the readiness
//! probe, the click-out detector, the held token, the pending claim, and the
//! cooldown. The embedding layer feeds it page facts as `SlotEvent`s and
//! reads derived state from a watch channel; reward outcomes go out over an
//! mpsc channel. All the guard flags of the source design live in this one
//! task, so two slots can never share them and no handler can race another.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use adreward_core::{
    AdSlotId, EarnResponse, PointsApi, Result, RewardOutcome, SlotConfig, TokenGrant,
};

use crate::cooldown::Cooldown;
use crate::detector::{ClickOut, ClickOutDetector};
use crate::readiness::{AdReadiness, ReadinessProbe};

// ─── Events ──────────────────────────────────────────────────────────

/// Facts observed on the embedding page, forwarded to the slot task
///
/// The embedding layer owns the container element and its listeners; the
/// slot never touches the DOM. Events already carry the container-scoped
/// judgements (whether a pointer/focus landed on the slot's iframe).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotEvent {
    /// The ad-network script finished loading
    ScriptLoaded,
    /// The ad-network script failed to load
    ScriptFailed,
    /// An iframe is present in the container (found at start or observed)
    IframeDetected,
    /// A pointer-down landed on the slot's iframe
    PointerDown,
    /// Document focus moved into the slot's iframe
    IframeFocus,
    /// The window lost focus; `iframe_focused` is whether the active
    /// element is still the slot's iframe
    WindowBlur { iframe_focused: bool },
    /// The window regained focus
    WindowFocus,
    /// Document visibility changed
    VisibilityChanged { visible: bool },
    /// Reward eligibility toggled (login, verification, user setting)
    SetRewardEnabled(bool),
    /// Manual retry after a surfaced error
    Refresh,
}

/// Derived slot state for the embedding UI
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotSnapshot {
    pub readiness: AdReadiness,
    pub has_token: bool,
    pub daily_remaining: Option<u32>,
    pub is_loading: bool,
    pub last_error: Option<String>,
    pub cooldown_remaining_seconds: Option<u64>,
    pub can_earn: bool,
    pub should_dim_ad: bool,
}

// ─── Handle ──────────────────────────────────────────────────────────

/// Handle to one spawned ad slot
#[derive(Clone)]
pub struct SlotHandle {
    events: mpsc::UnboundedSender<SlotEvent>,
    snapshot_rx: watch::Receiver<SlotSnapshot>,
    cancel: CancellationToken,
}

impl SlotHandle {
    /// Forward a page fact to the slot task
    pub fn send(&self, event: SlotEvent) {
        let _ = self.events.send(event);
    }

    /// Current derived state
    pub fn snapshot(&self) -> SlotSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Watch channel for derived state changes
    pub fn subscribe(&self) -> watch::Receiver<SlotSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Tear the slot down; outstanding requests are abandoned
    pub fn stop(&self) {
        self.cancel.cancel();
        debug!("Ad slot stopped");
    }
}

// ─── Spawn ───────────────────────────────────────────────────────────

/// Spawn the slot task and return a handle for controlling it
///
/// `results` receives one `RewardOutcome` per observed click-out. The task
/// exits when `stop()` is called or every handle is dropped.
pub fn spawn_slot<A>(
    api: Arc<A>,
    ad_slot_id: AdSlotId,
    config: SlotConfig,
    reward_enabled: bool,
    results: mpsc::UnboundedSender<RewardOutcome>,
) -> SlotHandle
where
    A: PointsApi + 'static,
{
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let initial = SlotSnapshot {
        readiness: AdReadiness::Pending,
        has_token: false,
        daily_remaining: None,
        is_loading: false,
        last_error: None,
        cooldown_remaining_seconds: None,
        can_earn: false,
        should_dim_ad: reward_enabled,
    };
    let (snapshot_tx, snapshot_rx) = watch::channel(initial);

    let detector = ClickOutDetector::new(config.pointer_focus_window, config.confirm_window);
    let task = SlotTask {
        api,
        ad_slot_id,
        config,
        reward_enabled,
        script_loaded: false,
        readiness: ReadinessProbe::new(),
        detector,
        cooldown: Cooldown::new(),
        token: None,
        daily_remaining: None,
        pending_claim: false,
        claim_in_flight: false,
        visible: true,
        focused: true,
        last_error: None,
        issue_failed: false,
        refresh_at: None,
        inflight: None,
        results,
        snapshot_tx,
    };

    tokio::spawn(slot_loop(task, events_rx, cancel.clone()));

    SlotHandle {
        events: events_tx,
        snapshot_rx,
        cancel,
    }
}

// ─── Loop ────────────────────────────────────────────────────────────

/// Completed API call, routed back into the task
enum ApiOutcome {
    Issued(Result<TokenGrant>),
    Redeemed(Result<EarnResponse>),
}

type ApiFuture = Pin<Box<dyn Future<Output = ApiOutcome> + Send>>;

async fn slot_loop<A: PointsApi + 'static>(
    mut task: SlotTask<A>,
    mut events: mpsc::UnboundedReceiver<SlotEvent>,
    cancel: CancellationToken,
) {
    debug!(slot = %task.ad_slot_id, "Ad slot task started");

    loop {
        task.fire_due_deadlines();
        task.reconcile();

        let wake = task.next_wake();
        let wake_at = wake.unwrap_or_else(Instant::now);

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(slot = %task.ad_slot_id, "Ad slot cancelled, exiting");
                return;
            }
            maybe_event = events.recv() => {
                match maybe_event {
                    Some(event) => task.on_event(event),
                    None => {
                        debug!(slot = %task.ad_slot_id, "All slot handles dropped, exiting");
                        return;
                    }
                }
            }
            outcome = poll_api(&mut task.inflight) => {
                task.inflight = None;
                task.on_api(outcome);
            }
            _ = time::sleep_until(wake_at), if wake.is_some() => {}
        }
    }
}

/// Poll the single in-flight API call; pends forever while there is none
async fn poll_api(inflight: &mut Option<ApiFuture>) -> ApiOutcome {
    match inflight.as_mut() {
        Some(call) => call.as_mut().await,
        None => std::future::pending().await,
    }
}

// ─── Task ────────────────────────────────────────────────────────────

enum ResetReason {
    Blocked,
    Disabled,
}

struct SlotTask<A> {
    api: Arc<A>,
    ad_slot_id: AdSlotId,
    config: SlotConfig,

    reward_enabled: bool,
    script_loaded: bool,
    readiness: ReadinessProbe,
    detector: ClickOutDetector,
    cooldown: Cooldown,

    token: Option<String>,
    daily_remaining: Option<u32>,
    pending_claim: bool,
    claim_in_flight: bool,
    visible: bool,
    focused: bool,
    last_error: Option<String>,
    /// A failed issuance halts automatic reissue until a manual refresh (or
    /// a state reset); prevents hammering a failing endpoint
    issue_failed: bool,
    /// Proactive reissue instant, shortly before the held token expires
    refresh_at: Option<Instant>,

    inflight: Option<ApiFuture>,
    results: mpsc::UnboundedSender<RewardOutcome>,
    snapshot_tx: watch::Sender<SlotSnapshot>,
}

impl<A: PointsApi + 'static> SlotTask<A> {
    // ── Events ──

    fn on_event(&mut self, event: SlotEvent) {
        match event {
            SlotEvent::ScriptLoaded => {
                self.script_loaded = true;
                self.readiness.script_loaded(self.config.load_timeout);
            }
            SlotEvent::ScriptFailed => {
                if !self.readiness.is_blocked() {
                    warn!(slot = %self.ad_slot_id, "Ad script failed, marking ad blocked");
                    self.readiness.script_failed();
                    self.reset_reward_state(ResetReason::Blocked);
                }
            }
            SlotEvent::IframeDetected => {
                let was_ready = self.readiness.is_ready();
                self.readiness.iframe_detected();
                if self.readiness.is_ready() && !was_ready {
                    debug!(slot = %self.ad_slot_id, "Ad iframe ready");
                }
            }
            SlotEvent::PointerDown => {
                if self.detection_active() {
                    self.detector.on_pointer_down();
                }
            }
            SlotEvent::IframeFocus => {
                if self.detection_active() && self.detector.on_iframe_focus() {
                    debug!(slot = %self.ad_slot_id, "Click-out confirmation window armed");
                }
            }
            SlotEvent::WindowBlur { iframe_focused } => {
                self.focused = false;
                if self.detection_active() {
                    let signal = self.detector.on_window_blur(iframe_focused, self.visible);
                    self.on_click_out(signal);
                }
            }
            SlotEvent::WindowFocus => {
                self.focused = true;
            }
            SlotEvent::VisibilityChanged { visible } => {
                self.visible = visible;
                if !visible && self.detection_active() {
                    let signal = self.detector.on_visibility_hidden();
                    self.on_click_out(signal);
                }
            }
            SlotEvent::SetRewardEnabled(enabled) => {
                if self.reward_enabled && !enabled {
                    info!(slot = %self.ad_slot_id, "Reward eligibility off, clearing reward state");
                    self.reset_reward_state(ResetReason::Disabled);
                }
                self.reward_enabled = enabled;
            }
            SlotEvent::Refresh => {
                if self.eligible_for_token() && self.inflight.is_none() {
                    self.last_error = None;
                    self.issue_failed = false;
                    self.begin_issue();
                }
            }
        }
    }

    /// Click-out signals are only trusted while the ad is live
    fn detection_active(&self) -> bool {
        self.script_loaded && self.readiness.is_ready()
    }

    fn on_click_out(&mut self, signal: Option<ClickOut>) {
        let Some(kind) = signal else {
            return;
        };

        if !self.reward_enabled {
            debug!(slot = %self.ad_slot_id, "Click-out observed while reward disabled");
            let _ = self.results.send(RewardOutcome::Failed { error: None });
            return;
        }

        if self.claim_in_flight || self.pending_claim || self.token.is_none() {
            return;
        }

        debug!(slot = %self.ad_slot_id, ?kind, "Click-out flagged, claim pending on return");
        self.pending_claim = true;
    }

    // ── Deadlines ──

    fn fire_due_deadlines(&mut self) {
        if self.cooldown.expire_if_due() {
            debug!(slot = %self.ad_slot_id, "Cooldown elapsed");
        }
        if self.readiness.expire_if_due() {
            warn!(slot = %self.ad_slot_id, "No iframe before the load timeout, marking ad blocked");
            self.reset_reward_state(ResetReason::Blocked);
        }
        if self.detector.expire_if_due() {
            debug!(slot = %self.ad_slot_id, "Arm window elapsed without a click-out signal");
        }
        if let Some(at) = self.refresh_at {
            if Instant::now() >= at {
                self.refresh_at = None;
                if self.eligible_for_token() && self.inflight.is_none() {
                    debug!(slot = %self.ad_slot_id, "Held token nearing expiry, reissuing");
                    self.begin_issue();
                }
            }
        }
    }

    fn next_wake(&self) -> Option<Instant> {
        let now = Instant::now();
        [
            self.detector.armed_deadline(),
            self.readiness.deadline(),
            self.cooldown.next_wake(now),
            self.refresh_at,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    // ── Claim coordination & token sourcing ──

    fn reconcile(&mut self) {
        self.try_claim();
        self.try_issue();
        self.publish_snapshot();
    }

    fn try_claim(&mut self) {
        if !self.pending_claim {
            return;
        }
        if !self.reward_enabled || !self.readiness.is_ready() {
            debug!(slot = %self.ad_slot_id, "Dropping pending claim, slot no longer eligible");
            self.pending_claim = false;
            return;
        }
        if !self.visible || !self.focused {
            return;
        }
        if self.claim_in_flight || self.inflight.is_some() {
            return;
        }
        // Take the token out before the request exists: a reset or a second
        // trigger can never see (or resubmit) a value already being redeemed
        let Some(token) = self.token.take() else {
            self.pending_claim = false;
            return;
        };
        self.pending_claim = false;
        self.claim_in_flight = true;

        info!(slot = %self.ad_slot_id, "Click-out returned, redeeming reward token");
        let api = Arc::clone(&self.api);
        self.inflight = Some(Box::pin(async move {
            ApiOutcome::Redeemed(api.redeem_token(&token).await)
        }));
    }

    fn try_issue(&mut self) {
        if self.inflight.is_some() || !self.eligible_for_token() {
            return;
        }
        if self.token.is_some() || self.cooldown.is_active() || self.issue_failed {
            return;
        }
        self.begin_issue();
    }

    fn eligible_for_token(&self) -> bool {
        self.reward_enabled && self.readiness.is_ready()
    }

    fn begin_issue(&mut self) {
        debug!(slot = %self.ad_slot_id, "Requesting reward token");
        let api = Arc::clone(&self.api);
        let slot = self.ad_slot_id.clone();
        self.inflight = Some(Box::pin(async move {
            ApiOutcome::Issued(api.request_token(slot.as_str()).await)
        }));
    }

    // ── API completions ──

    fn on_api(&mut self, outcome: ApiOutcome) {
        match outcome {
            ApiOutcome::Issued(result) => self.on_token_issued(result),
            ApiOutcome::Redeemed(result) => self.on_redeemed(result),
        }
    }

    fn on_token_issued(&mut self, result: Result<TokenGrant>) {
        // Eligibility may have changed while the request was in flight
        if !self.eligible_for_token() {
            return;
        }

        match result {
            Ok(grant) => {
                self.refresh_at =
                    refresh_deadline(grant.expires_at, self.config.token_refresh_margin);
                self.daily_remaining = Some(grant.daily_remaining);
                self.token = Some(grant.token);
                self.cooldown.clear();
                self.last_error = None;
                self.issue_failed = false;
                debug!(
                    slot = %self.ad_slot_id,
                    daily_remaining = grant.daily_remaining,
                    "Reward token ready"
                );
            }
            Err(err) => {
                self.token = None;
                self.refresh_at = None;
                match err.retry_after_seconds() {
                    Some(seconds) => {
                        warn!(
                            slot = %self.ad_slot_id,
                            "Token issuance rate limited, cooling down {}s", seconds
                        );
                        self.cooldown.start_from_remaining(seconds);
                    }
                    None => {
                        warn!(slot = %self.ad_slot_id, "Token issuance failed: {}", err);
                        self.last_error = Some(err.to_string());
                        self.issue_failed = true;
                    }
                }
            }
        }
    }

    fn on_redeemed(&mut self, result: Result<EarnResponse>) {
        self.claim_in_flight = false;

        match result {
            Ok(earned) => {
                info!(
                    slot = %self.ad_slot_id,
                    earned = earned.earned,
                    daily_remaining = earned.daily_remaining,
                    "Reward redeemed"
                );
                self.daily_remaining = Some(earned.daily_remaining);
                self.cooldown.clear();
                self.last_error = None;
                let _ = self.results.send(RewardOutcome::Earned {
                    earned: earned.earned,
                });
            }
            Err(err) => {
                warn!(slot = %self.ad_slot_id, "Redemption failed: {}", err);
                if let Some(seconds) = err.retry_after_seconds() {
                    self.cooldown.start_from_remaining(seconds);
                }
                self.last_error = Some(err.to_string());
                let _ = self.results.send(RewardOutcome::Failed {
                    error: Some(err.to_string()),
                });
            }
        }
        // Token was taken when the claim started; the ordinary issue path
        // sources the next one
    }

    // ── Reset & snapshot ──

    fn reset_reward_state(&mut self, reason: ResetReason) {
        self.token = None;
        self.pending_claim = false;
        self.claim_in_flight = false;
        self.cooldown.clear();
        self.inflight = None;
        self.refresh_at = None;
        self.last_error = None;
        self.issue_failed = false;
        self.detector.disarm();
        if matches!(reason, ResetReason::Disabled) {
            self.daily_remaining = None;
        }
    }

    fn snapshot(&self) -> SlotSnapshot {
        let is_loading = self.inflight.is_some();
        let can_earn = self.reward_enabled
            && self.readiness.is_ready()
            && self.token.is_some()
            && !is_loading;
        SlotSnapshot {
            readiness: self.readiness.state(),
            has_token: self.token.is_some(),
            daily_remaining: self.daily_remaining,
            is_loading,
            last_error: self.last_error.clone(),
            cooldown_remaining_seconds: self.cooldown.remaining_seconds(),
            can_earn,
            should_dim_ad: self.reward_enabled && !can_earn,
        }
    }

    fn publish_snapshot(&self) {
        let snapshot = self.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

/// Instant for the proactive reissue, when the expiry is comfortably out
///
/// An expiry closer than the margin schedules nothing; the redeem failure
/// path recovers from a token that expires in hand.
fn refresh_deadline(
    expires_at: Option<DateTime<Utc>>,
    margin: std::time::Duration,
) -> Option<Instant> {
    let expires_at = expires_at?;
    let margin = chrono::Duration::from_std(margin).ok()?;
    let lead = expires_at.signed_duration_since(Utc::now()) - margin;
    if lead <= chrono::Duration::zero() {
        return None;
    }
    Some(Instant::now() + lead.to_std().ok()?)
}

// ─── Tests ───────────────────────────────────────────────────────────
