//! Session manager — one saved game with persist-after-apply semantics.
//!
//! Each game gets its own directory with an event log and snapshots:
//!   <save_dir>/<game>/events.log
//!   <save_dir>/<game>/snapshots/
//!
//! Apply-before-persist order:
//!   1. engine.apply_event(event)  — on a copy; a rejection changes nothing
//!   2. event_store.append_event() — only if step 1 succeeded
//!   3. snapshot if the autosave interval is reached
//!
//! Concurrency: `SharedSession` serialises access with a Mutex.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use spaghetto_engine::arithmetic::validate_name;
use spaghetto_engine::domain::{Dish, GameState, Item, TransitionResult};
use spaghetto_engine::engine::Engine;
use spaghetto_engine::events::{EventEnvelope, GameEvent};
use spaghetto_engine::hashing::canonical_hash;
use spaghetto_engine::loans::Loan;

use crate::config::AppConfig;
use crate::demand::DemandModel;
use crate::drift::{self, DriftReport};
use crate::error::{Result, RuntimeError};
use crate::event_store::EventStore;
use crate::loan_market;
use crate::proto_bridge::{engine_to_proto, proto_to_engine};
use crate::replay;
use crate::snapshot::{self, verify_snapshot_hash};
use crate::snapshot_codec;

const EVENT_LOG_NAME: &str = "events.log";
const SNAPSHOT_DIR_NAME: &str = "snapshots";

/// Title of the opening owner deposit.
pub const STARTING_CAPITAL: &str = "Starting Capital";

/// A single saved game: live engine, event log and simulation RNG.
pub struct Session {
    game_id: String,
    dir: PathBuf,
    engine: Engine,
    event_store: EventStore,
    config: AppConfig,
    demand: DemandModel,
    rng: StdRng,
}

/// Result of checking a game's files.
#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub events: usize,
    /// Hash of the replayed log, equal across two replays.
    pub hash: String,
    /// Whether the live session agrees with the replay.
    pub matches_session: bool,
    pub snapshot: Option<SnapshotCheck>,
}

/// How the latest snapshot relates to the event log.
#[derive(Debug, Clone)]
pub struct SnapshotCheck {
    pub sequence: u64,
    /// Stored hash matches the stored JSON.
    pub intact: bool,
    /// Stored hash matches a replay of the log up to `sequence`.
    pub matches_log: bool,
    /// Changes since the snapshot was taken.
    pub drift: Option<DriftReport>,
}

impl Session {
    /// Open the game `game_id` under `base_dir`, creating it if needed.
    ///
    /// An existing log is replayed through the engine. If the latest
    /// snapshot disagrees with the replay a warning is logged and the
    /// log wins.
    pub fn open(base_dir: &Path, game_id: &str, config: &AppConfig) -> Result<Self> {
        validate_game_id(game_id)?;
        config.validate()?;

        let dir = base_dir.join(game_id);
        let log_path = dir.join(EVENT_LOG_NAME);
        let event_store = EventStore::open(&log_path).map_err(|e| RuntimeError::io(&log_path, e))?;

        let events = load_events(&event_store)?;
        let engine = replay::rebuild_engine(&events)?;
        check_latest_snapshot(&dir.join(SNAPSHOT_DIR_NAME), &events)?;

        let rng = match config.simulation.seed {
            // Offset by position so each run continues the stream differently
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(engine.last_sequence())),
            None => StdRng::from_os_rng(),
        };

        let mut session = Self {
            game_id: game_id.to_string(),
            dir,
            engine,
            event_store,
            config: config.clone(),
            demand: DemandModel::from(&config.economy),
            rng,
        };

        if events.is_empty() {
            session.start_new_game()?;
            info!(game = game_id, "new game created");
        } else {
            info!(
                game = game_id,
                events = events.len(),
                week = session.state().total_weeks,
                "game resumed"
            );
        }
        Ok(session)
    }

    /// Whether a game already has an event log under `base_dir`.
    pub fn exists(base_dir: &Path, game_id: &str) -> bool {
        base_dir.join(game_id).join(EVENT_LOG_NAME).exists()
    }

    fn start_new_game(&mut self) -> Result<()> {
        self.submit(GameEvent::InitializeConstants {
            constants: self.config.constants(),
        })?;
        let capital = self.config.game.starting_balance;
        if capital > 0 {
            self.deposit(STARTING_CAPITAL, capital)?;
        }
        Ok(())
    }

    /// Apply `event` to a copy of the engine, persist it, then commit.
    fn submit(&mut self, event: GameEvent) -> Result<TransitionResult> {
        let envelope = EventEnvelope::new(
            self.engine.next_sequence(),
            self.engine.state().total_weeks as u64,
            event,
        );

        // Step 1: Apply to engine
        let mut next = self.engine.clone();
        let (_, result) = next.apply_event(&envelope)?;

        // Step 2: Persist to event log (only if step 1 succeeded)
        let proto = engine_to_proto(&envelope)?;
        let log_path = self.event_store.path().to_path_buf();
        self.event_store
            .append_event(&proto)
            .map_err(|e| RuntimeError::io(log_path, e))?;
        self.engine = next;

        // Step 3: Autosave at interval. The event is already committed,
        // so a failed snapshot is only reported.
        let interval = self.config.game.autosave_interval;
        if interval > 0 && envelope.sequence % interval == 0 {
            if let Err(e) = self.save() {
                warn!(game = %self.game_id, sequence = envelope.sequence, error = %e, "autosave failed");
            }
        }

        debug!(
            game = %self.game_id,
            sequence = envelope.sequence,
            event_type = envelope.event_type(),
            "event persisted"
        );
        Ok(result)
    }

    // ── Bookkeeping ────────────────────────────────────────────────

    pub fn deposit(&mut self, title: &str, cents: i64) -> Result<TransitionResult> {
        self.submit(GameEvent::Deposit {
            title: title.to_string(),
            cents,
        })
    }

    pub fn withdraw(&mut self, title: &str, cents: i64) -> Result<TransitionResult> {
        self.submit(GameEvent::Withdraw {
            title: title.to_string(),
            cents,
        })
    }

    // ── Inventory ──────────────────────────────────────────────────

    /// Add stock already on hand without paying for it.
    pub fn stock_item(&mut self, item: Item) -> Result<TransitionResult> {
        self.submit(GameEvent::StockItem { item })
    }

    pub fn buy_item(&mut self, item: Item) -> Result<TransitionResult> {
        self.submit(GameEvent::BuyItem { item })
    }

    pub fn discard_item(&mut self, name: &str, quantity: i64) -> Result<TransitionResult> {
        self.submit(GameEvent::DiscardItem {
            name: name.to_string(),
            quantity,
        })
    }

    pub fn remove_item(&mut self, name: &str) -> Result<TransitionResult> {
        self.submit(GameEvent::RemoveItem {
            name: name.to_string(),
        })
    }

    // ── Menu ───────────────────────────────────────────────────────

    pub fn add_dish(&mut self, dish: Dish) -> Result<TransitionResult> {
        self.submit(GameEvent::AddDish { dish })
    }

    pub fn remove_dish(&mut self, name: &str) -> Result<TransitionResult> {
        self.submit(GameEvent::RemoveDish {
            name: name.to_string(),
        })
    }

    pub fn set_dish_price(&mut self, name: &str, price: i64) -> Result<TransitionResult> {
        self.submit(GameEvent::SetDishPrice {
            name: name.to_string(),
            price,
        })
    }

    // ── Staff ──────────────────────────────────────────────────────

    pub fn hire(&mut self, count: i64) -> Result<TransitionResult> {
        self.submit(GameEvent::HireEmployees { count })
    }

    pub fn fire(&mut self, count: i64) -> Result<TransitionResult> {
        self.submit(GameEvent::FireEmployees { count })
    }

    // ── Loans ──────────────────────────────────────────────────────

    /// Roll a fresh list of offers from the loan market.
    pub fn refresh_loan_offers(&mut self) -> Result<&BTreeMap<String, Loan>> {
        let metrics = self.state().metrics();
        let count = self.state().constants.loan_offer_limit.max(0) as usize;
        let offers = loan_market::generate_offers(&mut self.rng, &metrics, count)?;
        self.submit(GameEvent::OfferLoans { offers })?;
        Ok(&self.state().loan_offers)
    }

    pub fn accept_loan(&mut self, name: &str) -> Result<TransitionResult> {
        self.submit(GameEvent::AcceptLoan {
            name: name.to_string(),
        })
    }

    // ── Time ───────────────────────────────────────────────────────

    /// Simulate `weeks` weeks, rolling demand for each.
    /// Stops at the first week the engine rejects.
    pub fn advance_weeks(&mut self, weeks: u32) -> Result<Vec<TransitionResult>> {
        let mut results = Vec::with_capacity(weeks as usize);
        for _ in 0..weeks {
            let orders = self.demand.weekly_orders(&mut self.rng, self.engine.state())?;
            results.push(self.submit(GameEvent::AdvanceWeek { orders })?);
        }
        Ok(results)
    }

    // ── Persistence ────────────────────────────────────────────────

    /// Snapshot the current state now.
    pub fn save(&self) -> Result<PathBuf> {
        let path = snapshot::save_snapshot(
            &self.snapshot_dir(),
            self.engine.last_sequence(),
            self.engine.state(),
        )?;
        info!(game = %self.game_id, sequence = self.engine.last_sequence(), "game saved");
        Ok(path)
    }

    /// Rebuild the engine from the event log on disk.
    pub fn reload(&mut self) -> Result<&GameState> {
        let events = self.events()?;
        self.engine = replay::rebuild_engine(&events)?;
        info!(game = %self.game_id, events = events.len(), "game reloaded");
        Ok(self.engine.state())
    }

    /// All logged events in order.
    pub fn events(&self) -> Result<Vec<EventEnvelope>> {
        load_events(&self.event_store)
    }

    /// Replay the log twice, compare with the live session and the
    /// latest snapshot.
    pub fn verify(&self) -> Result<VerifyReport> {
        let events = self.events()?;
        let hash = drift::verify_determinism(&events)?;
        let matches_session = hash == self.current_hash()?;

        let snapshot = match snapshot::load_latest_snapshot(&self.snapshot_dir())? {
            None => None,
            Some(snap) => {
                let intact = verify_snapshot_hash(&snap);
                let matches_log = prefix_hash(&events, snap.sequence)?.as_deref() == Some(&*snap.hash);
                let drift = if intact {
                    let saved = snap.restore()?;
                    Some(drift::compare_states(&saved, self.state())?)
                } else {
                    None
                };
                Some(SnapshotCheck {
                    sequence: snap.sequence,
                    intact,
                    matches_log,
                    drift,
                })
            }
        };

        Ok(VerifyReport {
            events: events.len(),
            hash,
            matches_session,
            snapshot,
        })
    }

    /// Write the current state as a portable save file.
    pub fn export(&self, path: &Path) -> Result<()> {
        snapshot_codec::export_snapshot_to_file(self.state(), path)?;
        info!(game = %self.game_id, ?path, "game exported");
        Ok(())
    }

    // ── Accessors ──────────────────────────────────────────────────

    pub fn state(&self) -> &GameState {
        self.engine.state()
    }

    pub fn current_hash(&self) -> Result<String> {
        Ok(canonical_hash(self.engine.state())?)
    }

    pub fn current_sequence(&self) -> u64 {
        self.engine.last_sequence()
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn snapshot_dir(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_DIR_NAME)
    }
}

fn validate_game_id(game_id: &str) -> Result<()> {
    let bad = validate_name("game", game_id).is_err()
        || game_id == "."
        || game_id == ".."
        || game_id.contains(['/', '\\']);
    if bad {
        return Err(RuntimeError::InvalidGame(game_id.to_string()));
    }
    Ok(())
}

fn load_events(store: &EventStore) -> Result<Vec<EventEnvelope>> {
    let frames = store
        .load_all_events()
        .map_err(|e| RuntimeError::io(store.path(), e))?;
    frames.iter().map(proto_to_engine).collect()
}

/// Hash of the state after the first `sequence` events, if the log is
/// that long.
fn prefix_hash(events: &[EventEnvelope], sequence: u64) -> Result<Option<String>> {
    let n = sequence as usize;
    if n > events.len() {
        return Ok(None);
    }
    Ok(Some(replay::rebuild_hash(&events[..n])?))
}

/// Warn when the latest snapshot disagrees with the log.
fn check_latest_snapshot(dir: &Path, events: &[EventEnvelope]) -> Result<()> {
    let snap = match snapshot::load_latest_snapshot(dir) {
        Ok(Some(snap)) => snap,
        Ok(None) => return Ok(()),
        Err(e) => {
            warn!(error = %e, "unreadable snapshot ignored, using the event log");
            return Ok(());
        }
    };

    if !verify_snapshot_hash(&snap) {
        warn!(sequence = snap.sequence, "snapshot is corrupt, using the event log");
        return Ok(());
    }
    match prefix_hash(events, snap.sequence)? {
        None => warn!(
            sequence = snap.sequence,
            events = events.len(),
            "snapshot is ahead of the event log, using the event log"
        ),
        Some(hash) if hash != snap.hash => warn!(
            sequence = snap.sequence,
            snapshot = %snap.hash,
            replay = %hash,
            "snapshot drift detected, using the event log"
        ),
        Some(_) => debug!(sequence = snap.sequence, "snapshot matches event log"),
    }
    Ok(())
}

/// Thread-safe session handle using Mutex.
pub struct SharedSession {
    inner: Mutex<Session>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Mutex::new(session),
        }
    }

    /// Lock the session. A panic in another holder does not corrupt
    /// it, since every change is committed only after persisting.
    pub fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Advance time under lock.
    pub fn advance_weeks(&self, weeks: u32) -> Result<Vec<TransitionResult>> {
        self.lock().advance_weeks(weeks)
    }

    /// Get current hash under lock.
    pub fn current_hash(&self) -> Result<String> {
        self.lock().current_hash()
    }

    /// Get current sequence under lock.
    pub fn current_sequence(&self) -> u64 {
        self.lock().current_sequence()
    }

    pub fn into_inner(self) -> Session {
        self.inner.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.simulation.seed = Some(5);
        config.game.autosave_interval = 0;
        config
    }

    #[test]
    fn new_game_starts_with_capital() {
        let tmp = tempfile::tempdir().unwrap();
        let session = Session::open(tmp.path(), "trattoria", &config()).unwrap();
        assert_eq!(session.current_sequence(), 2);
        assert_eq!(session.state().balance, 1_000_000);
        assert_eq!(session.state().transactions[0].title, STARTING_CAPITAL);
        assert!(Session::exists(tmp.path(), "trattoria"));
    }

    #[test]
    fn zero_capital_skips_deposit() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config();
        config.game.starting_balance = 0;
        let session = Session::open(tmp.path(), "trattoria", &config).unwrap();
        assert_eq!(session.current_sequence(), 1);
        assert!(session.state().transactions.is_empty());
    }

    #[test]
    fn rejects_path_like_game_names() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["", "..", "a/b", " padded"] {
            let err = Session::open(tmp.path(), name, &config()).err().unwrap();
            assert!(matches!(err, RuntimeError::InvalidGame(_)), "{name:?}");
        }
    }

    #[test]
    fn rejected_event_is_not_logged() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = Session::open(tmp.path(), "trattoria", &config()).unwrap();
        let before = session.current_hash().unwrap();
        assert!(session.withdraw("Too much", 5_000_000).is_err());
        assert_eq!(session.current_sequence(), 2);
        assert_eq!(session.events().unwrap().len(), 2);
        assert_eq!(session.current_hash().unwrap(), before);
    }

    #[test]
    fn autosave_every_interval() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config();
        config.game.autosave_interval = 3;
        let mut session = Session::open(tmp.path(), "trattoria", &config).unwrap();
        session.hire(2).unwrap();
        let snap = snapshot::load_latest_snapshot(&session.dir().join("snapshots"))
            .unwrap()
            .unwrap();
        assert_eq!(snap.sequence, 3);
    }

    #[test]
    fn failed_autosave_keeps_the_event() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = Session::open(tmp.path(), "trattoria", &config()).unwrap();
        // a plain file where the snapshot directory should go
        std::fs::write(session.dir().join("snapshots"), b"").unwrap();
        session.config.game.autosave_interval = 3;

        let result = session.hire(2).unwrap();
        assert_eq!(result.event_type, "hire_employees");
        assert_eq!(session.current_sequence(), 3);
        assert_eq!(session.events().unwrap().len(), 3);
        assert_eq!(session.state().employee_count, 2);
    }

    #[test]
    fn refresh_offers_fills_the_menu() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = Session::open(tmp.path(), "trattoria", &config()).unwrap();
        let offers = session.refresh_loan_offers().unwrap();
        assert_eq!(offers.len(), 8);
    }
}
