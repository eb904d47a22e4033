//! Interval scheduler around [`SyncEngine`].
//!
//! A tick runs at most one pass at a time: overlapping ticks are refused by
//! an atomic in-flight guard, not queued. Before running, a tick checks the
//! gates in order — enabled, credential, visibility, connectivity — and a
//! pass only sees captures newer than the host's last-sync offset, which
//! advances to the tick's start time once a pass completes cleanly.

use std::{
  future::Future,
  sync::{
    Arc,
    atomic::{AtomicBool, AtomicU8, Ordering},
  },
  time::Duration,
};

use roost_core::{store::CaptureStore, timefmt};
use tokio::sync::watch;

use crate::{Result, SyncEngine, SyncSummary};

/// Interval bounds, in minutes. Settings outside this range are clamped,
/// not rejected.
pub const MIN_INTERVAL_MINUTES: u64 = 5;
pub const MAX_INTERVAL_MINUTES: u64 = 180;

pub fn clamp_interval(minutes: u64) -> u64 {
  minutes.clamp(MIN_INTERVAL_MINUTES, MAX_INTERVAL_MINUTES)
}

/// Live scheduler settings, delivered as whole snapshots over a watch
/// channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
  pub enabled:          bool,
  pub interval_minutes: u64,
  /// Vault API token. Absent or blank means syncing cannot run.
  pub token:            Option<String>,
  /// Vault folder the bucket notes live under.
  pub folder:           String,
}

impl SyncSettings {
  fn has_credential(&self) -> bool {
    self.token.as_deref().is_some_and(|t| !t.trim().is_empty())
  }
}

/// Host-environment probes the scheduler consults before and after a pass.
pub trait SyncHost: Send + Sync {
  /// Epoch ms offset of the last clean pass, if any.
  fn last_sync(&self) -> impl Future<Output = Option<i64>> + Send + '_;

  fn set_last_sync(
    &self,
    epoch_ms: i64,
  ) -> impl Future<Output = ()> + Send + '_;

  /// Whether the host wants background work right now.
  fn is_visible(&self) -> bool;

  fn is_online(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
  Idle,
  Scheduled,
  Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
  Disabled,
  MissingCredential,
  NotVisible,
  Offline,
  /// A previous tick is still in flight.
  AlreadyRunning,
  /// Nothing is newer than the recorded offset.
  NoNewCaptures,
}

#[derive(Debug)]
pub enum TickOutcome {
  Completed(SyncSummary),
  Skipped(SkipReason),
}

const STATE_IDLE: u8 = 0;
const STATE_SCHEDULED: u8 = 1;
const STATE_RUNNING: u8 = 2;

/// Drives [`SyncEngine`] passes against host gates and the single-flight
/// guard.
pub struct Scheduler<S, H> {
  engine:       SyncEngine<S>,
  host:         H,
  state:        AtomicU8,
  in_flight:    AtomicBool,
  /// Dedupes the missing-credential warning across ticks.
  warned_token: AtomicBool,
}

impl<S: CaptureStore, H: SyncHost> Scheduler<S, H> {
  pub fn new(engine: SyncEngine<S>, host: H) -> Self {
    Self {
      engine,
      host,
      state: AtomicU8::new(STATE_IDLE),
      in_flight: AtomicBool::new(false),
      warned_token: AtomicBool::new(false),
    }
  }

  pub fn state(&self) -> SchedulerState {
    match self.state.load(Ordering::Acquire) {
      STATE_RUNNING => SchedulerState::Running,
      STATE_SCHEDULED => SchedulerState::Scheduled,
      _ => SchedulerState::Idle,
    }
  }

  /// Attempt one pass under the current settings.
  pub async fn tick(&self, settings: &SyncSettings) -> Result<TickOutcome> {
    if !settings.enabled {
      return Ok(TickOutcome::Skipped(SkipReason::Disabled));
    }
    if !settings.has_credential() {
      if !self.warned_token.swap(true, Ordering::AcqRel) {
        tracing::warn!("sync enabled but no vault token is configured");
      }
      return Ok(TickOutcome::Skipped(SkipReason::MissingCredential));
    }
    self.warned_token.store(false, Ordering::Release);
    if !self.host.is_visible() {
      return Ok(TickOutcome::Skipped(SkipReason::NotVisible));
    }
    if !self.host.is_online() {
      return Ok(TickOutcome::Skipped(SkipReason::Offline));
    }

    // A recorded offset with nothing newer skips before the guard is
    // claimed, leaving state and the offset untouched.
    if let Some(since) = self.host.last_sync().await
      && !self.engine.has_new_captures(since).await?
    {
      return Ok(TickOutcome::Skipped(SkipReason::NoNewCaptures));
    }

    // Single flight: the guard is claimed before the first await so a
    // concurrent tick observes it.
    if self
      .in_flight
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      return Ok(TickOutcome::Skipped(SkipReason::AlreadyRunning));
    }
    self.state.store(STATE_RUNNING, Ordering::Release);

    let result = self.run_pass(settings).await;

    self.state.store(STATE_SCHEDULED, Ordering::Release);
    self.in_flight.store(false, Ordering::Release);
    result
  }

  async fn run_pass(&self, settings: &SyncSettings) -> Result<TickOutcome> {
    // Captures landing while the pass runs are newer than this stamp, so
    // advancing the offset to it cannot lose them.
    let started = timefmt::now_ms();
    let since = self.host.last_sync().await;

    let summary = self.engine.sync(&settings.folder, since).await?;

    if summary.total == 0 {
      self.host.set_last_sync(started).await;
      return Ok(TickOutcome::Skipped(SkipReason::NoNewCaptures));
    }
    if summary.errors.is_empty() {
      self.host.set_last_sync(started).await;
    } else {
      tracing::warn!(
        failed_buckets = summary.errors.len(),
        "offset not advanced; failed buckets will retry next pass"
      );
    }
    Ok(TickOutcome::Completed(summary))
  }
}

/// Run the scheduler until the settings channel closes.
///
/// Each enabled settings snapshot gets an immediate pass, then a fixed
/// interval at the clamped period. A settings change resets the cadence;
/// disabling, or dropping the credential, parks the scheduler in `Idle`
/// until a later snapshot allows syncing again.
pub async fn run<S, H>(
  scheduler: Arc<Scheduler<S, H>>,
  mut settings_rx: watch::Receiver<SyncSettings>,
) where
  S: CaptureStore,
  H: SyncHost,
{
  let mut settings = settings_rx.borrow().clone();
  loop {
    if !settings.enabled || !settings.has_credential() {
      if settings.enabled
        && !scheduler.warned_token.swap(true, Ordering::AcqRel)
      {
        tracing::warn!("sync enabled but no vault token is configured");
      }
      scheduler.state.store(STATE_IDLE, Ordering::Release);
      match settings_rx.changed().await {
        Ok(()) => {
          settings = settings_rx.borrow_and_update().clone();
          continue;
        }
        Err(_) => return,
      }
    }

    scheduler.state.store(STATE_SCHEDULED, Ordering::Release);
    log_tick(scheduler.tick(&settings).await);

    let period =
      Duration::from_secs(clamp_interval(settings.interval_minutes) * 60);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    interval.tick().await; // the first tick resolves immediately

    loop {
      tokio::select! {
        _ = interval.tick() => {
          log_tick(scheduler.tick(&settings).await);
        }
        changed = settings_rx.changed() => match changed {
          Ok(()) => {
            settings = settings_rx.borrow_and_update().clone();
            break;
          }
          Err(_) => return,
        },
      }
    }
  }
}

fn log_tick(result: Result<TickOutcome>) {
  match result {
    Ok(TickOutcome::Completed(_)) => {}
    Ok(TickOutcome::Skipped(reason)) => {
      tracing::debug!(?reason, "sync tick skipped");
    }
    Err(err) => {
      tracing::error!(error = %err, "sync tick failed");
    }
  }
}
