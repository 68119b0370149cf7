use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cardgate::actuator::Actuator;
use cardgate::audit::EventLog;
use cardgate::engine::{Collaborators, Command, Engine, Mode, Outcome, run_engine_loop};
use cardgate::input::InputEvent;
use cardgate::keystore::SecretKey;
use cardgate::notify::Notifier;
use cardgate::prompt::NamePrompt;
use cardgate::scanner::{CardId, ScanBuffer, Submission};
use cardgate::store::{CredentialStore, StoreError};
use tokio::sync::mpsc;

#[derive(Clone, Default)]
struct Recorder {
    opens: Arc<Mutex<usize>>,
    notes: Arc<Mutex<Vec<String>>>,
    log: Arc<Mutex<Vec<String>>>,
    names: Arc<Mutex<Vec<Option<String>>>>,
}

struct MockActuator(Recorder);
struct MockNotifier(Recorder);
struct MockLog(Recorder);
struct MockPrompt(Recorder);

impl Actuator for MockActuator {
    fn trigger_open(&self) {
        *self.0.opens.lock().unwrap() += 1;
    }
}

impl Notifier for MockNotifier {
    fn notify(&self, _title: &str, message: &str) {
        self.0.notes.lock().unwrap().push(message.to_string());
    }
}

impl EventLog for MockLog {
    fn log_event(&self, message: &str) {
        self.0.log.lock().unwrap().push(message.to_string());
    }
}

impl NamePrompt for MockPrompt {
    fn ask_optional_name(&self) -> Option<String> {
        self.0.names.lock().unwrap().pop().flatten()
    }
}

impl Recorder {
    fn opens(&self) -> usize {
        *self.opens.lock().unwrap()
    }

    fn last_log(&self) -> String {
        self.log.lock().unwrap().last().cloned().unwrap_or_default()
    }

    fn answer_with(&self, name: Option<&str>) {
        self.names.lock().unwrap().push(name.map(String::from));
    }
}

fn collaborators(rec: &Recorder) -> Collaborators {
    Collaborators {
        actuator: Box::new(MockActuator(rec.clone())),
        notifier: Box::new(MockNotifier(rec.clone())),
        log: Box::new(MockLog(rec.clone())),
        prompt: Box::new(MockPrompt(rec.clone())),
    }
}

fn engine_in(dir: &std::path::Path) -> (Engine, Recorder) {
    let rec = Recorder::default();
    let store = CredentialStore::open(SecretKey::from_bytes([0x42; 32]), dir).unwrap();
    (Engine::new(store, collaborators(&rec)).unwrap(), rec)
}

/// Key events for `line` starting at `start`, `step` apart, then Enter.
fn typed(line: &str, start: Instant, step: Duration) -> Vec<InputEvent> {
    let mut at = start;
    let mut events = Vec::new();
    for ch in line.chars() {
        events.push(InputEvent::Key { ch, at });
        at += step;
    }
    events.push(InputEvent::Enter { at });
    events
}

/// Feed `events` through the engine loop until they are exhausted.
fn drive(engine: &mut Engine, events: Vec<InputEvent>) {
    let (tx, rx) = mpsc::channel(events.len().max(1));
    for event in events {
        tx.try_send(event).unwrap();
    }
    drop(tx);
    run_engine_loop(rx, engine, Duration::from_secs(2));
}

fn scan(engine: &mut Engine, card: &str) -> Outcome {
    engine
        .handle(Command::Scan(CardId::parse(card).unwrap()))
        .unwrap()
}

/// Fresh engine with master `ABC123` and user `XYZ999` named Alice.
fn enrolled(dir: &std::path::Path) -> (Engine, Recorder) {
    let (mut engine, rec) = engine_in(dir);
    scan(&mut engine, "ABC123");
    engine.handle(Command::EnableAdd).unwrap();
    scan(&mut engine, "ABC123");
    rec.answer_with(Some("Alice"));
    scan(&mut engine, "XYZ999");
    (engine, rec)
}

#[test]
fn test_bootstrap_creates_master_once() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, rec) = engine_in(dir.path());
    assert_eq!(engine.mode(), Mode::Bootstrap);

    assert_eq!(scan(&mut engine, "ABC123"), Outcome::MasterCreated);
    assert_eq!(engine.mode(), Mode::Normal);
    assert!(engine.store().has_master().unwrap());
    assert!(engine.store().verify_master("ABC123").unwrap());
    assert_eq!(rec.last_log(), "Master created");
    assert_eq!(rec.opens(), 0, "bootstrap must not open the door");

    // A different card afterwards is a normal (denied) scan, not a new master.
    assert_eq!(scan(&mut engine, "OTHER1"), Outcome::Denied);
    assert!(engine.store().verify_master("ABC123").unwrap());
    assert!(!engine.store().verify_master("OTHER1").unwrap());
}

#[test]
fn test_restart_resumes_in_normal() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (mut engine, _) = engine_in(dir.path());
        scan(&mut engine, "ABC123");
    }
    let (engine, _) = engine_in(dir.path());
    assert_eq!(engine.mode(), Mode::Normal);
}

#[test]
fn test_admin_enrolls_named_user() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, rec) = engine_in(dir.path());
    scan(&mut engine, "ABC123");

    assert_eq!(engine.handle(Command::EnableAdd).unwrap(), Outcome::AddArmed);
    assert_eq!(engine.mode(), Mode::AdminAuthorizing);
    assert_eq!(scan(&mut engine, "ABC123"), Outcome::AdminAuthorized);
    assert_eq!(engine.mode(), Mode::AdminAwaitingNewUser);

    rec.answer_with(Some("Alice"));
    assert_eq!(
        scan(&mut engine, "XYZ999"),
        Outcome::UserAdded {
            name: "Alice".into()
        }
    );
    assert_eq!(engine.mode(), Mode::Normal);
    assert!(engine.store().verify_user("XYZ999").unwrap());
    assert_eq!(
        engine.store().get_display_name("XYZ999").unwrap().as_deref(),
        Some("Alice")
    );
    assert_eq!(rec.last_log(), "User added: Alice");
    assert_eq!(rec.opens(), 0);
}

#[test]
fn test_enrollment_without_name_gets_default() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, rec) = enrolled(dir.path());

    engine.handle(Command::EnableAdd).unwrap();
    scan(&mut engine, "ABC123");
    rec.answer_with(None);
    assert_eq!(
        scan(&mut engine, "NEW002"),
        Outcome::UserAdded {
            name: "User 2".into()
        }
    );
}

#[test]
fn test_admin_denied_by_non_master() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, rec) = enrolled(dir.path());

    engine.handle(Command::EnableAdd).unwrap();
    // A valid user is still not the master.
    assert_eq!(scan(&mut engine, "XYZ999"), Outcome::AdminDenied);
    assert_eq!(engine.mode(), Mode::Normal);
    assert_eq!(rec.opens(), 0, "scan consumed by admin flow must not open the door");
    assert_eq!(engine.store().user_count().unwrap(), 1);
}

#[test]
fn test_normal_access_decisions() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, rec) = enrolled(dir.path());

    assert_eq!(
        scan(&mut engine, "ABC123"),
        Outcome::Granted {
            name: "Master".into(),
            master: true
        }
    );
    assert_eq!(
        scan(&mut engine, "xyz999"),
        Outcome::Granted {
            name: "Alice".into(),
            master: false
        }
    );
    assert_eq!(rec.opens(), 2);

    assert_eq!(scan(&mut engine, "NOBODY"), Outcome::Denied);
    assert_eq!(rec.opens(), 2);
    assert!(rec.last_log().starts_with("Access denied: unknown card "));
    assert!(!rec.last_log().contains("NOBODY"));
    let notes = rec.notes.lock().unwrap().clone();
    assert_eq!(
        notes,
        vec![
            "Master opened door: Master",
            "Access granted: Alice",
            "Access denied: Unknown"
        ]
    );
}

#[test]
fn test_delete_confirmed_by_master() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, rec) = enrolled(dir.path());

    assert_eq!(
        engine.handle(Command::RequestDelete(0)).unwrap(),
        Outcome::DeleteArmed { index: 0 }
    );
    assert_eq!(engine.mode(), Mode::DeleteConfirm { pending_index: 0 });
    assert_eq!(scan(&mut engine, "ABC123"), Outcome::UserDeleted { index: 0 });
    assert_eq!(engine.mode(), Mode::Normal);
    assert_eq!(rec.last_log(), "User 1 deleted by MASTER");
    assert!(!engine.store().verify_user("XYZ999").unwrap());
    assert_eq!(rec.opens(), 0);
}

#[test]
fn test_delete_denied_takes_precedence_over_access() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, rec) = enrolled(dir.path());

    engine.handle(Command::RequestDelete(0)).unwrap();
    // XYZ999 is a valid user but not the master.
    assert_eq!(scan(&mut engine, "XYZ999"), Outcome::DeletionDenied);
    assert_eq!(engine.mode(), Mode::Normal);
    assert_eq!(rec.opens(), 0, "deletion branch must consume the scan");
    assert_eq!(rec.last_log(), "Deletion denied");
    assert_eq!(engine.store().user_count().unwrap(), 1);
}

#[test]
fn test_delete_stale_index_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, _) = enrolled(dir.path());

    engine.handle(Command::RequestDelete(7)).unwrap();
    assert_eq!(scan(&mut engine, "ABC123"), Outcome::NothingToDelete { index: 7 });
    assert_eq!(engine.mode(), Mode::Normal);
    assert_eq!(engine.store().user_count().unwrap(), 1);
}

#[test]
fn test_commands_rejected_outside_normal() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, _) = engine_in(dir.path());

    assert!(matches!(
        engine.handle(Command::EnableAdd).unwrap(),
        Outcome::Rejected { .. }
    ));
    assert_eq!(engine.mode(), Mode::Bootstrap);

    scan(&mut engine, "ABC123");
    engine.handle(Command::RequestDelete(0)).unwrap();
    assert!(matches!(
        engine.handle(Command::EnableAdd).unwrap(),
        Outcome::Rejected { .. }
    ));
    assert_eq!(engine.mode(), Mode::DeleteConfirm { pending_index: 0 });

    assert_eq!(engine.handle(Command::Cancel).unwrap(), Outcome::Cancelled);
    assert_eq!(engine.mode(), Mode::Normal);
    assert!(matches!(
        engine.handle(Command::Cancel).unwrap(),
        Outcome::Rejected { .. }
    ));
}

#[test]
fn test_store_failure_does_not_leave_side_protocol_pending() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, _) = enrolled(dir.path());

    engine.handle(Command::RequestDelete(0)).unwrap();
    std::fs::write(dir.path().join("master.dat"), b"garbage that will not decrypt").unwrap();

    let result = engine.handle(Command::Scan(CardId::parse("ABC123").unwrap()));
    assert!(result.is_err());
    assert_eq!(engine.mode(), Mode::Normal);
}

#[test]
fn test_slow_burst_causes_no_transition() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, rec) = engine_in(dir.path());
    let mut buffer = ScanBuffer::new(Duration::from_secs(2));

    let t0 = Instant::now();
    for (i, ch) in "ABC123".chars().enumerate() {
        buffer.push(ch, t0 + Duration::from_millis(500 * i as u64));
    }
    let submission = buffer.submit(t0 + Duration::from_millis(2500));
    assert!(matches!(submission, Submission::Discarded { .. }));

    // Nothing reached the engine.
    assert_eq!(engine.mode(), Mode::Bootstrap);
    assert!(!engine.store().has_master().unwrap());
    assert!(rec.log.lock().unwrap().is_empty());

    // A fast scan afterwards still bootstraps normally.
    for ch in "ABC123".chars() {
        buffer.push(ch, t0 + Duration::from_secs(10));
    }
    if let Submission::Card(card) = buffer.submit(t0 + Duration::from_millis(10_050)) {
        assert_eq!(
            engine.handle(Command::Scan(card)).unwrap(),
            Outcome::MasterCreated
        );
    } else {
        panic!("fast burst must yield a card");
    }
}

#[test]
fn test_admin_authorizing_store_failure_resets_mode() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, rec) = enrolled(dir.path());

    engine.handle(Command::EnableAdd).unwrap();
    std::fs::write(dir.path().join("master.dat"), b"garbage that will not decrypt").unwrap();

    let result = engine.handle(Command::Scan(CardId::parse("ABC123").unwrap()));
    assert!(matches!(result, Err(StoreError::CorruptStore(_))));
    assert_eq!(engine.mode(), Mode::Normal);
    assert_eq!(rec.last_log(), "User added: Alice", "nothing logged for the failed scan");
}

#[test]
fn test_awaiting_new_user_store_failure_resets_mode() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, rec) = enrolled(dir.path());

    engine.handle(Command::EnableAdd).unwrap();
    scan(&mut engine, "ABC123");
    assert_eq!(engine.mode(), Mode::AdminAwaitingNewUser);
    std::fs::write(dir.path().join("users.dat"), b"garbage that will not decrypt").unwrap();

    rec.answer_with(Some("Bob"));
    let result = engine.handle(Command::Scan(CardId::parse("NEW002").unwrap()));
    assert!(matches!(result, Err(StoreError::CorruptStore(_))));
    assert_eq!(engine.mode(), Mode::Normal);
    assert_eq!(rec.last_log(), "Master authorized admin mode");

    // The next scan is an ordinary access check again.
    assert_eq!(
        scan(&mut engine, "ABC123"),
        Outcome::Granted {
            name: "Master".into(),
            master: true
        }
    );
}

#[test]
fn test_bootstrap_save_failure_stays_in_bootstrap() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, rec) = engine_in(dir.path());

    // A non-empty directory where the master slot should be makes the
    // final rename fail.
    let slot = dir.path().join("master.dat");
    std::fs::remove_file(&slot).unwrap();
    std::fs::create_dir(&slot).unwrap();
    std::fs::write(slot.join("blocker"), b"x").unwrap();

    let result = engine.handle(Command::Scan(CardId::parse("ABC123").unwrap()));
    assert!(matches!(result, Err(StoreError::StorageFailure(_))));
    assert_eq!(engine.mode(), Mode::Bootstrap);
    assert!(rec.log.lock().unwrap().is_empty());

    // Once the slot is writable again the next scan becomes the master.
    std::fs::remove_dir_all(&slot).unwrap();
    assert_eq!(scan(&mut engine, "ABC123"), Outcome::MasterCreated);
    assert_eq!(engine.mode(), Mode::Normal);
}

#[test]
fn test_unreadable_data_dir_fails_engine_start() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir(&data).unwrap();
    let store = CredentialStore::open(SecretKey::from_bytes([0x42; 32]), &data).unwrap();

    std::fs::remove_dir_all(&data).unwrap();
    std::fs::write(&data, b"not a directory").unwrap();

    let rec = Recorder::default();
    let result = Engine::new(store, collaborators(&rec));
    assert!(matches!(result, Err(StoreError::StorageFailure(_))));
}

#[test]
fn test_loop_discards_slowly_typed_card() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, rec) = engine_in(dir.path());

    // Six keys one second apart: the burst spans six seconds.
    let t0 = Instant::now();
    drive(&mut engine, typed("abc123", t0, Duration::from_secs(1)));

    assert_eq!(engine.mode(), Mode::Bootstrap);
    assert!(!engine.store().has_master().unwrap());
    assert!(rec.log.lock().unwrap().is_empty());
}

#[test]
fn test_loop_runs_bootstrap_and_enrollment() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, rec) = engine_in(dir.path());
    rec.answer_with(Some("Alice"));

    let t0 = Instant::now();
    let step = Duration::from_millis(10);
    let mut events = typed("abc123", t0, step);
    // Operator lines are not subject to the burst window.
    events.extend(typed("/add", t0 + Duration::from_secs(1), Duration::from_secs(1)));
    events.extend(typed("ABC123", t0 + Duration::from_secs(10), step));
    events.extend(typed("xyz999", t0 + Duration::from_secs(20), step));
    // Slow noise between scans is dropped without effect.
    events.extend(typed("NOISE", t0 + Duration::from_secs(30), Duration::from_secs(1)));
    events.extend(typed("XYZ999", t0 + Duration::from_secs(40), step));
    drive(&mut engine, events);

    assert_eq!(engine.mode(), Mode::Normal);
    assert!(engine.store().verify_master("ABC123").unwrap());
    assert_eq!(
        engine.store().get_display_name("XYZ999").unwrap().as_deref(),
        Some("Alice")
    );
    assert_eq!(
        rec.log.lock().unwrap().clone(),
        vec![
            "Master created",
            "Master authorized admin mode",
            "User added: Alice",
            "Access granted: Alice",
        ]
    );
    assert_eq!(rec.opens(), 1);
}
