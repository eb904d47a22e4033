use std::{
  collections::{HashMap, HashSet},
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
  },
  time::Duration,
};

use roost_core::{
  ingest::{self, CapturedItem},
  record::{Author, Engagement, Post, Profile, Record},
};
use roost_store_sqlite::SqliteStore;
use roost_vault::{VaultClient, VaultConfig};
use tokio::sync::watch;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate, matchers::any};

use crate::{
  SyncEngine, SyncSummary,
  scheduler::{
    self, MAX_INTERVAL_MINUTES, MIN_INTERVAL_MINUTES, Scheduler,
    SchedulerState, SkipReason, SyncHost, SyncSettings, TickOutcome,
    clamp_interval,
  },
};

// Wed Oct 10 2018 and the following day, both UTC.
const DAY1: &str = "Wed Oct 10 20:19:24 +0000 2018";
const DAY2: &str = "Thu Oct 11 09:00:00 +0000 2018";

fn post(id: &str, created_at: &str) -> Record {
  Record::Post(Post {
    rest_id:    id.to_owned(),
    created_at: created_at.to_owned(),
    text:       format!("post {id}"),
    author:     Author {
      rest_id:      "u1".to_owned(),
      handle:       "tester".to_owned(),
      display_name: "Tester".to_owned(),
    },
    metrics:    Engagement::default(),
    media:      vec![],
    reply_to:   None,
    repost_of:  None,
    quote_of:   None,
    note:       Default::default(),
  })
}

fn profile(id: &str) -> Record {
  Record::Profile(Profile {
    rest_id:      id.to_owned(),
    handle:       "tester".to_owned(),
    display_name: "Tester".to_owned(),
    bio:          String::new(),
    created_at:   DAY1.to_owned(),
    followers:    1,
    following:    2,
    post_count:   3,
    avatar_url:   None,
    note:         Default::default(),
  })
}

async fn seeded_store(records: Vec<Record>) -> SqliteStore {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let items = records
    .into_iter()
    .map(|record| CapturedItem { record, sort_key: None })
    .collect();
  ingest::add_captured(&store, "timeline", items).await.unwrap();
  store
}

// ─── Fake vault ──────────────────────────────────────────────────────────────

/// Stateful in-memory vault behind a wiremock server: GET serves stored
/// notes (404 when absent), PUT stores them, poisoned paths answer 500.
#[derive(Clone, Default)]
struct FakeVault {
  notes:    Arc<Mutex<HashMap<String, String>>>,
  poisoned: Arc<Mutex<HashSet<String>>>,
  delay:    Option<Duration>,
}

impl FakeVault {
  fn seed(&self, path: &str, body: &str) {
    self
      .notes
      .lock()
      .unwrap()
      .insert(path.to_owned(), body.to_owned());
  }

  fn note(&self, path: &str) -> Option<String> {
    self.notes.lock().unwrap().get(path).cloned()
  }

  fn poison(&self, path: &str) {
    self.poisoned.lock().unwrap().insert(path.to_owned());
  }
}

impl Respond for FakeVault {
  fn respond(&self, request: &Request) -> ResponseTemplate {
    let path = request.url.path().to_owned();
    if self.poisoned.lock().unwrap().contains(&path) {
      return ResponseTemplate::new(500);
    }
    let template = match request.method.as_str() {
      "GET" => match self.notes.lock().unwrap().get(&path) {
        Some(body) => ResponseTemplate::new(200).set_body_string(body.clone()),
        None => ResponseTemplate::new(404),
      },
      "PUT" => {
        self.notes.lock().unwrap().insert(
          path,
          String::from_utf8_lossy(&request.body).into_owned(),
        );
        ResponseTemplate::new(204)
      }
      _ => ResponseTemplate::new(405),
    };
    match self.delay {
      Some(delay) => template.set_delay(delay),
      None => template,
    }
  }
}

async fn mount(fake: &FakeVault) -> MockServer {
  let server = MockServer::start().await;
  Mock::given(any()).respond_with(fake.clone()).mount(&server).await;
  server
}

fn vault_client(server: &MockServer) -> VaultClient {
  VaultClient::new(VaultConfig {
    base_url: server.uri(),
    token:    "tok".to_owned(),
  })
  .unwrap()
}

async fn engine_with(
  records: Vec<Record>,
  fake: &FakeVault,
) -> (SyncEngine<SqliteStore>, MockServer) {
  let server = mount(fake).await;
  let store = seeded_store(records).await;
  let engine = SyncEngine::new(store, vault_client(&server), "timeline");
  (engine, server)
}

fn line_ids(content: &str) -> HashSet<String> {
  content
    .lines()
    .map(|line| {
      let value: serde_json::Value = serde_json::from_str(line).unwrap();
      value["id"].as_str().unwrap().to_owned()
    })
    .collect()
}

// ─── Engine ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sync_writes_new_posts_into_a_missing_note() {
  let fake = FakeVault::default();
  let (engine, _server) =
    engine_with(vec![post("1", DAY1), post("2", DAY1)], &fake).await;

  let summary = engine.sync("daily", None).await.unwrap();
  assert_eq!(summary.total, 2);
  assert_eq!(summary.synced, 2);
  assert_eq!(summary.skipped, 0);
  assert_eq!(summary.files, 1);
  assert!(summary.errors.is_empty());

  let content = fake.note("/vault/daily/2018-10-10.jsonl").unwrap();
  assert!(content.ends_with('\n'));
  assert_eq!(content.lines().count(), 2);
  assert_eq!(line_ids(&content), HashSet::from(["1".into(), "2".into()]));

  let first: serde_json::Value =
    serde_json::from_str(content.lines().next().unwrap()).unwrap();
  assert_eq!(first["source"], "roost");
  assert_eq!(first["author_handle"], "tester");
}

#[tokio::test]
async fn sync_skips_ids_already_in_the_note() {
  let fake = FakeVault::default();
  fake.seed("/vault/daily/2018-10-10.jsonl", "{\"id\":\"1\"}\n");
  let (engine, _server) =
    engine_with(vec![post("1", DAY1), post("2", DAY1)], &fake).await;

  let summary = engine.sync("daily", None).await.unwrap();
  assert_eq!(summary.synced, 1);
  assert_eq!(summary.skipped, 1);
  assert_eq!(summary.files, 1);

  // The pre-existing line survives untouched, the new one is appended.
  let content = fake.note("/vault/daily/2018-10-10.jsonl").unwrap();
  assert!(content.starts_with("{\"id\":\"1\"}\n"));
  assert_eq!(content.lines().count(), 2);
  assert!(content.contains("\"id\":\"2\""));
}

#[tokio::test]
async fn resync_is_idempotent() {
  let fake = FakeVault::default();
  let (engine, _server) =
    engine_with(vec![post("1", DAY1), post("2", DAY1)], &fake).await;

  engine.sync("daily", None).await.unwrap();
  let after_first = fake.note("/vault/daily/2018-10-10.jsonl").unwrap();

  let second = engine.sync("daily", None).await.unwrap();
  assert_eq!(second.synced, 0);
  assert_eq!(second.skipped, 2);
  assert_eq!(second.files, 0);
  assert_eq!(fake.note("/vault/daily/2018-10-10.jsonl").unwrap(), after_first);
}

#[tokio::test]
async fn a_note_without_trailing_newline_gains_a_separator() {
  let fake = FakeVault::default();
  fake.seed("/vault/daily/2018-10-10.jsonl", "{\"id\":\"1\"}");
  let (engine, _server) =
    engine_with(vec![post("1", DAY1), post("2", DAY1)], &fake).await;

  engine.sync("daily", None).await.unwrap();

  let content = fake.note("/vault/daily/2018-10-10.jsonl").unwrap();
  assert!(content.starts_with("{\"id\":\"1\"}\n"));
  assert_eq!(content.lines().count(), 2);
  assert!(content.ends_with('\n'));
}

#[tokio::test]
async fn a_failed_bucket_does_not_block_the_others() {
  let fake = FakeVault::default();
  fake.poison("/vault/daily/2018-10-10.jsonl");
  let (engine, _server) =
    engine_with(vec![post("1", DAY1), post("2", DAY2)], &fake).await;

  let summary = engine.sync("daily", None).await.unwrap();
  assert_eq!(summary.total, 2);
  assert_eq!(summary.synced, 1);
  assert_eq!(summary.files, 1);
  assert_eq!(summary.errors.len(), 1);
  assert!(summary.errors[0].contains("2018-10-10"));

  let content = fake.note("/vault/daily/2018-10-11.jsonl").unwrap();
  assert_eq!(line_ids(&content), HashSet::from(["2".into()]));
}

#[tokio::test]
async fn posts_split_across_days_land_in_separate_notes() {
  let fake = FakeVault::default();
  let (engine, _server) =
    engine_with(vec![post("1", DAY1), post("2", DAY2)], &fake).await;

  let summary = engine.sync("daily", None).await.unwrap();
  assert_eq!(summary.files, 2);
  assert!(fake.note("/vault/daily/2018-10-10.jsonl").is_some());
  assert!(fake.note("/vault/daily/2018-10-11.jsonl").is_some());
}

#[tokio::test]
async fn an_offset_in_the_future_yields_an_empty_pass() {
  let fake = FakeVault::default();
  let (engine, _server) = engine_with(vec![post("1", DAY1)], &fake).await;

  let summary = engine.sync("daily", Some(i64::MAX)).await.unwrap();
  assert_eq!(summary, SyncSummary::default());
  assert!(fake.note("/vault/daily/2018-10-10.jsonl").is_none());
}

#[tokio::test]
async fn profiles_are_never_exported() {
  let fake = FakeVault::default();
  let (engine, _server) =
    engine_with(vec![post("1", DAY1), profile("u1")], &fake).await;

  let summary = engine.sync("daily", None).await.unwrap();
  assert_eq!(summary.total, 1);
  assert_eq!(summary.synced, 1);
  let content = fake.note("/vault/daily/2018-10-10.jsonl").unwrap();
  assert_eq!(line_ids(&content), HashSet::from(["1".into()]));
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

struct FakeHost {
  visible: AtomicBool,
  online:  AtomicBool,
  last:    Mutex<Option<i64>>,
}

impl Default for FakeHost {
  fn default() -> Self {
    Self {
      visible: AtomicBool::new(true),
      online:  AtomicBool::new(true),
      last:    Mutex::new(None),
    }
  }
}

impl SyncHost for Arc<FakeHost> {
  async fn last_sync(&self) -> Option<i64> {
    *self.last.lock().unwrap()
  }

  async fn set_last_sync(&self, epoch_ms: i64) {
    *self.last.lock().unwrap() = Some(epoch_ms);
  }

  fn is_visible(&self) -> bool {
    self.visible.load(Ordering::Relaxed)
  }

  fn is_online(&self) -> bool {
    self.online.load(Ordering::Relaxed)
  }
}

fn settings() -> SyncSettings {
  SyncSettings {
    enabled:          true,
    interval_minutes: 30,
    token:            Some("tok".to_owned()),
    folder:           "daily".to_owned(),
  }
}

async fn scheduler_with(
  records: Vec<Record>,
  fake: &FakeVault,
) -> (Arc<Scheduler<SqliteStore, Arc<FakeHost>>>, Arc<FakeHost>, MockServer) {
  let (engine, server) = engine_with(records, fake).await;
  let host = Arc::new(FakeHost::default());
  let scheduler = Arc::new(Scheduler::new(engine, host.clone()));
  (scheduler, host, server)
}

fn skip_reason(outcome: TickOutcome) -> SkipReason {
  match outcome {
    TickOutcome::Skipped(reason) => reason,
    TickOutcome::Completed(summary) => {
      panic!("expected a skip, pass completed: {summary:?}")
    }
  }
}

#[test]
fn interval_settings_are_clamped_to_bounds() {
  assert_eq!(clamp_interval(0), MIN_INTERVAL_MINUTES);
  assert_eq!(clamp_interval(4), MIN_INTERVAL_MINUTES);
  assert_eq!(clamp_interval(30), 30);
  assert_eq!(clamp_interval(181), MAX_INTERVAL_MINUTES);
  assert_eq!(clamp_interval(u64::MAX), MAX_INTERVAL_MINUTES);
}

#[tokio::test]
async fn gates_are_checked_in_order() {
  let fake = FakeVault::default();
  let (scheduler, host, _server) = scheduler_with(vec![], &fake).await;

  let disabled = SyncSettings { enabled: false, ..settings() };
  let outcome = scheduler.tick(&disabled).await.unwrap();
  assert_eq!(skip_reason(outcome), SkipReason::Disabled);

  let no_token = SyncSettings { token: None, ..settings() };
  let outcome = scheduler.tick(&no_token).await.unwrap();
  assert_eq!(skip_reason(outcome), SkipReason::MissingCredential);

  let blank_token = SyncSettings { token: Some("  ".to_owned()), ..settings() };
  let outcome = scheduler.tick(&blank_token).await.unwrap();
  assert_eq!(skip_reason(outcome), SkipReason::MissingCredential);

  host.visible.store(false, Ordering::Relaxed);
  let outcome = scheduler.tick(&settings()).await.unwrap();
  assert_eq!(skip_reason(outcome), SkipReason::NotVisible);

  host.visible.store(true, Ordering::Relaxed);
  host.online.store(false, Ordering::Relaxed);
  let outcome = scheduler.tick(&settings()).await.unwrap();
  assert_eq!(skip_reason(outcome), SkipReason::Offline);

  // Nothing ran, so the offset never moved.
  assert!(host.last.lock().unwrap().is_none());
}

#[tokio::test]
async fn a_clean_pass_advances_the_offset() {
  let fake = FakeVault::default();
  let (scheduler, host, _server) =
    scheduler_with(vec![post("1", DAY1), post("2", DAY1)], &fake).await;

  // Capture stamps must be older than the tick's start time.
  tokio::time::sleep(Duration::from_millis(5)).await;

  let outcome = scheduler.tick(&settings()).await.unwrap();
  match outcome {
    TickOutcome::Completed(summary) => {
      assert_eq!(summary.synced, 2);
      assert!(summary.errors.is_empty());
    }
    other => panic!("expected a completed pass, got {other:?}"),
  }
  assert!(host.last.lock().unwrap().is_some());

  // Everything is behind the offset now.
  let outcome = scheduler.tick(&settings()).await.unwrap();
  assert_eq!(skip_reason(outcome), SkipReason::NoNewCaptures);
}

#[tokio::test]
async fn a_pass_with_failed_buckets_keeps_the_offset() {
  let fake = FakeVault::default();
  fake.poison("/vault/daily/2018-10-10.jsonl");
  let (scheduler, host, _server) =
    scheduler_with(vec![post("1", DAY1)], &fake).await;

  let outcome = scheduler.tick(&settings()).await.unwrap();
  match outcome {
    TickOutcome::Completed(summary) => {
      assert_eq!(summary.errors.len(), 1);
      assert_eq!(summary.synced, 0);
    }
    other => panic!("expected a completed pass, got {other:?}"),
  }
  assert!(host.last.lock().unwrap().is_none());
}

#[tokio::test]
async fn an_idle_offset_skips_without_running_a_pass() {
  let fake = FakeVault::default();
  let (scheduler, host, _server) =
    scheduler_with(vec![post("1", DAY1)], &fake).await;

  // Everything in the store is already behind the offset.
  *host.last.lock().unwrap() = Some(i64::MAX);

  let outcome = scheduler.tick(&settings()).await.unwrap();
  assert_eq!(skip_reason(outcome), SkipReason::NoNewCaptures);

  // The skip happens before the guard: the offset stays put and the
  // vault never sees a request.
  assert_eq!(*host.last.lock().unwrap(), Some(i64::MAX));
  assert!(fake.note("/vault/daily/2018-10-10.jsonl").is_none());
}

#[tokio::test]
async fn an_empty_pass_still_advances_the_offset() {
  let fake = FakeVault::default();
  let (scheduler, host, _server) = scheduler_with(vec![], &fake).await;

  let outcome = scheduler.tick(&settings()).await.unwrap();
  assert_eq!(skip_reason(outcome), SkipReason::NoNewCaptures);
  assert!(host.last.lock().unwrap().is_some());
}

#[tokio::test]
async fn overlapping_ticks_run_single_flight() {
  let fake = FakeVault { delay: Some(Duration::from_millis(150)), ..FakeVault::default() };
  let (scheduler, _host, _server) =
    scheduler_with(vec![post("1", DAY1)], &fake).await;

  let s = settings();
  let (a, b) = tokio::join!(scheduler.tick(&s), scheduler.tick(&s));
  let outcomes = [a.unwrap(), b.unwrap()];

  let already_running = outcomes
    .iter()
    .filter(|o| {
      matches!(o, TickOutcome::Skipped(SkipReason::AlreadyRunning))
    })
    .count();
  let completed = outcomes
    .iter()
    .filter(|o| matches!(o, TickOutcome::Completed(_)))
    .count();
  assert_eq!(already_running, 1);
  assert_eq!(completed, 1);
  assert_eq!(scheduler.state(), SchedulerState::Scheduled);
}

#[tokio::test]
async fn run_loop_passes_immediately_and_parks_when_disabled() {
  let fake = FakeVault::default();
  let (scheduler, host, _server) = scheduler_with(vec![], &fake).await;

  let (tx, rx) = watch::channel(settings());
  let task = tokio::spawn(scheduler::run(scheduler.clone(), rx));

  // The enabled snapshot gets a pass without waiting for the interval.
  let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
  while host.last.lock().unwrap().is_none() {
    assert!(tokio::time::Instant::now() < deadline, "no immediate pass");
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  assert_eq!(scheduler.state(), SchedulerState::Scheduled);

  tx.send(SyncSettings { enabled: false, ..settings() }).unwrap();
  let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
  while scheduler.state() != SchedulerState::Idle {
    assert!(tokio::time::Instant::now() < deadline, "never parked");
    tokio::time::sleep(Duration::from_millis(10)).await;
  }

  // Closing the settings channel shuts the loop down.
  drop(tx);
  tokio::time::timeout(Duration::from_secs(2), task)
    .await
    .expect("run loop did not exit")
    .unwrap();
}
