//! Health check scheduling.
//!
//! # Responsibilities
//! - Own one background task per registered check
//! - Invoke the probe at the cadence matching the check's current health
//! - Apply each outcome to the check's state machine and publish a snapshot
//! - Stop every task on unregister/shutdown, bounded by a grace period
//!
//! # Design Decisions
//! - The state machine lives inside its task (single writer, no lock)
//! - Readers get `Arc<CheckSnapshot>` through `ArcSwap`, never the machine
//! - Probe errors, timeouts and panics are failures, never loop exits
//! - A supervisor restarts a panicked loop from the last published snapshot

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use arc_swap::ArcSwap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::health::aggregator::{HealthAggregator, HealthReport};
use crate::health::check::{HealthCheckDefinition, HealthCheckType};
use crate::health::error::{HealthError, ProbeError};
use crate::health::probe::Probe;
use crate::health::state::{CheckSnapshot, CheckState, HealthState, Outcome};
use crate::observability::metrics;
use crate::resilience::backoff;

/// How long `shutdown` waits for in-flight probes before aborting them.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub(crate) type Registry = Arc<DashMap<String, RegisteredCheck>>;

/// Registry slot for one check.
pub(crate) struct RegisteredCheck {
    pub(crate) definition: Arc<HealthCheckDefinition>,
    pub(crate) snapshot: Arc<ArcSwap<CheckSnapshot>>,
    stop_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RegisteredCheck {
    fn stop(&self) -> Option<JoinHandle<()>> {
        let _ = self.stop_tx.send(true);
        self.task.lock().ok().and_then(|mut task| task.take())
    }
}

/// Runs registered checks and answers health queries about them.
pub struct HealthEngine {
    checks: Registry,
    draining: Arc<AtomicBool>,
    /// Set by `shutdown`. Registration holds the read side until its task
    /// is in the registry, so `shutdown` never misses a freshly spawned task.
    closed: RwLock<bool>,
    shutdown_grace: Duration,
}

impl Default for HealthEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthEngine {
    pub fn new() -> Self {
        Self::with_shutdown_grace(DEFAULT_SHUTDOWN_GRACE)
    }

    pub fn with_shutdown_grace(shutdown_grace: Duration) -> Self {
        Self {
            checks: Arc::new(DashMap::new()),
            draining: Arc::new(AtomicBool::new(false)),
            closed: RwLock::new(false),
            shutdown_grace,
        }
    }

    /// Register a check and start its task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn register_check(
        &self,
        definition: HealthCheckDefinition,
        probe: Arc<dyn Probe>,
    ) -> Result<(), HealthError> {
        definition.validate()?;
        let closed = self.closed.read().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Err(HealthError::ShutDown);
        }

        match self.checks.entry(definition.name.clone()) {
            Entry::Occupied(_) => Err(HealthError::DuplicateCheck(definition.name)),
            Entry::Vacant(slot) => {
                let definition = Arc::new(definition);
                let initial = CheckSnapshot::initial(&definition);
                metrics::record_check_state(&definition.name, definition.check_type, initial.health);

                let snapshot = Arc::new(ArcSwap::from_pointee(initial));
                let (stop_tx, stop_rx) = watch::channel(false);
                let runner = CheckRunner {
                    definition: definition.clone(),
                    probe,
                    snapshot: snapshot.clone(),
                };
                let handle = tokio::spawn(supervise(runner, stop_rx));

                info!(
                    check = %definition.name,
                    check_type = %definition.check_type,
                    critical = definition.critical,
                    initial_delay = ?definition.schedule.initial_delay(),
                    "Health check registered"
                );

                slot.insert(RegisteredCheck {
                    definition,
                    snapshot,
                    stop_tx,
                    task: Mutex::new(Some(handle)),
                });
                Ok(())
            }
        }
    }

    /// Remove a check. Its task stops at its next wake-up; an in-flight
    /// probe is left to finish. Returns false if the name is unknown.
    pub fn unregister_check(&self, name: &str) -> bool {
        match self.checks.remove(name) {
            Some((_, check)) => {
                // Dropping the handle detaches the task; the stop signal ends it.
                drop(check.stop());
                info!(check = %name, "Health check unregistered");
                true
            }
            None => false,
        }
    }

    /// Aggregate health for `check_type`. Reads in-memory state only.
    pub fn evaluate(&self, check_type: HealthCheckType) -> HealthState {
        self.aggregator().evaluate(check_type)
    }

    /// Aggregate health plus a per-check breakdown for `check_type`.
    pub fn report(&self, check_type: HealthCheckType) -> HealthReport {
        self.aggregator().report(check_type)
    }

    /// Latest snapshot of a single check.
    pub fn snapshot(&self, name: &str) -> Option<Arc<CheckSnapshot>> {
        self.checks.get(name).map(|check| check.snapshot.load_full())
    }

    pub fn check_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.checks.iter().map(|c| c.key().clone()).collect();
        names.sort();
        names
    }

    /// A read-only view over this engine's checks, cheap to clone.
    pub fn aggregator(&self) -> HealthAggregator {
        HealthAggregator::new(self.checks.clone(), self.draining.clone())
    }

    /// Start draining: readiness reports unhealthy from now on, liveness is
    /// unaffected. Checks keep running until `shutdown`.
    pub fn begin_shutdown(&self) {
        if !self.draining.swap(true, Ordering::SeqCst) {
            info!("Health engine draining, readiness now reports unhealthy");
        }
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Stop every check task.
    ///
    /// In-flight probes get `shutdown_grace` to finish before their tasks
    /// are aborted. Snapshots stay readable afterwards.
    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut closed = self.closed.write().unwrap_or_else(PoisonError::into_inner);
            *closed = true;
            self.checks.iter().filter_map(|check| check.stop()).collect()
        };
        if handles.is_empty() {
            return;
        }

        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
        let count = handles.len();
        match tokio::time::timeout(self.shutdown_grace, futures_util::future::join_all(handles)).await
        {
            Ok(_) => info!(checks = count, "Health check tasks stopped"),
            Err(_) => {
                warn!(
                    checks = count,
                    grace = ?self.shutdown_grace,
                    "Health check tasks still busy after grace period, aborting"
                );
                for abort in aborts {
                    abort.abort();
                }
            }
        }
    }
}

/// Everything one check task needs. Cheap to clone for restarts.
#[derive(Clone)]
struct CheckRunner {
    definition: Arc<HealthCheckDefinition>,
    probe: Arc<dyn Probe>,
    snapshot: Arc<ArcSwap<CheckSnapshot>>,
}

impl CheckRunner {
    async fn run(self, mut stop: watch::Receiver<bool>, first_delay: Duration) {
        let schedule = &self.definition.schedule;
        let mut state = CheckState::resume(&self.snapshot.load(), schedule);
        let mut delay = first_delay;

        loop {
            tokio::select! {
                biased;
                _ = stopped(&mut stop) => break,
                _ = tokio::time::sleep(delay) => {}
            }
            if *stop.borrow() {
                break;
            }

            let (result, elapsed) = self.invoke().await;
            self.apply(&mut state, result, elapsed);
            delay = state.next_delay(schedule);
        }

        debug!(check = %self.definition.name, "Health check loop stopped");
    }

    async fn invoke(&self) -> (Result<(), ProbeError>, Duration) {
        let started = Instant::now();
        let result = match AssertUnwindSafe(self.probe.check()).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(ProbeError::Panicked(panic_message(panic))),
        };
        (result, started.elapsed())
    }

    fn apply(&self, state: &mut CheckState, result: Result<(), ProbeError>, elapsed: Duration) {
        let definition = &self.definition;
        let outcome = Outcome::from(&result);
        let error = result.err();

        metrics::record_probe(
            &definition.name,
            error.as_ref().map_or("success", ProbeError::kind),
            elapsed,
        );
        if let Some(e) = &error {
            debug!(check = %definition.name, error = %e, elapsed = ?elapsed, "Health probe failed");
        }

        if let Some(transition) = state.record(outcome) {
            match transition.to {
                HealthState::Unhealthy => warn!(
                    check = %definition.name,
                    check_type = %definition.check_type,
                    critical = definition.critical,
                    error = ?error.as_ref().map(ToString::to_string),
                    "Health check became unhealthy"
                ),
                HealthState::Healthy => info!(
                    check = %definition.name,
                    check_type = %definition.check_type,
                    "Health check recovered"
                ),
            }
            metrics::record_check_state(&definition.name, definition.check_type, transition.to);
        }

        let snapshot = CheckSnapshot::evaluated(
            definition,
            state,
            elapsed,
            error.map(|e| e.to_string()),
        );
        self.snapshot.store(Arc::new(snapshot));

        #[cfg(test)]
        faults::trip(&definition.name);
    }
}


/// Runs the check loop and restarts it if it panics.
async fn supervise(runner: CheckRunner, stop: watch::Receiver<bool>) {
    let mut restarts = 0u32;
    let mut first_delay = runner.definition.schedule.initial_delay();

    loop {
        let mut task = AbortOnDrop(tokio::spawn(runner.clone().run(stop.clone(), first_delay)));
        match (&mut task.0).await {
            Ok(()) => return,
            Err(e) if e.is_panic() => {
                restarts = restarts.saturating_add(1);
                first_delay = backoff::restart_delay(restarts);
                error!(
                    check = %runner.definition.name,
                    restarts,
                    restart_in = ?first_delay,
                    panic = %panic_message(e.into_panic()),
                    "Health check loop panicked, restarting"
                );
            }
            Err(_) => return,
        }
    }
}

/// Aborts the wrapped task when the supervisor itself is dropped or aborted.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Resolves once a stop was requested or the engine was dropped.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    while !*stop.borrow_and_update() {
        if stop.changed().await.is_err() {
            return;
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::probe::{FnProbe, StaticProbe};
    use crate::health::schedule::Schedule;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicU32;
    use tokio::sync::mpsc;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn assert_close(actual: Duration, expected: Duration) {
        let diff = if actual > expected {
            actual - expected
        } else {
            expected - actual
        };
        assert!(
            diff <= Duration::from_millis(10),
            "expected ~{expected:?}, got {actual:?}"
        );
    }

    /// Probe that plays back `outcomes` (then succeeds) and reports each call time.
    fn scripted(outcomes: Vec<bool>) -> (Arc<dyn Probe>, mpsc::UnboundedReceiver<Instant>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let script = Arc::new(Mutex::new(VecDeque::from(outcomes)));
        let probe = FnProbe::new(move || {
            let tx = tx.clone();
            let script = script.clone();
            async move {
                let _ = tx.send(Instant::now());
                let healthy = script.lock().unwrap().pop_front().unwrap_or(true);
                if healthy {
                    Ok(())
                } else {
                    Err(ProbeError::Unhealthy("scripted failure".to_string()))
                }
            }
        });
        (Arc::new(probe), rx)
    }

    fn counting(calls: Arc<AtomicU32>) -> Arc<dyn Probe> {
        Arc::new(FnProbe::new(move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<(), ProbeError>(())
            }
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn cadence_follows_health_after_each_transition() {
        let engine = HealthEngine::new();
        let def = HealthCheckDefinition::new("db", HealthCheckType::Ready)
            .critical(true)
            .schedule(Schedule::new(secs(5), secs(1)).with_attempts(3, 2));
        let (probe, mut calls) = scripted(vec![false, false, false, true, true, true]);

        let start = Instant::now();
        engine.register_check(def, probe).unwrap();

        let mut offsets = Vec::new();
        for i in 0..6 {
            let at = calls.recv().await.unwrap();
            offsets.push(at.duration_since(start));
            if i == 3 {
                // Third failure has been applied; recovery probing is fast.
                assert_eq!(engine.evaluate(HealthCheckType::Ready), HealthState::Unhealthy);
            }
        }

        // First run after initial_delay (= check_interval), three failures at
        // the healthy cadence, then downtime cadence until recovery.
        for (actual, expected) in offsets.into_iter().zip([5, 10, 15, 16, 17, 22]) {
            assert_close(actual, secs(expected));
        }
        assert_eq!(engine.evaluate(HealthCheckType::Ready), HealthState::Healthy);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn initial_state_holds_until_first_probe() {
        let engine = HealthEngine::new();
        let def = HealthCheckDefinition::new("cache", HealthCheckType::Alive)
            .critical(true)
            .initial_state(false)
            .schedule(
                Schedule::new(secs(10), secs(10))
                    .with_initial_delay(secs(2))
                    .with_attempts(3, 0),
            );
        engine.register_check(def, Arc::new(StaticProbe::new(true))).unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let snapshot = engine.snapshot("cache").unwrap();
        assert_eq!(snapshot.health, HealthState::Unhealthy);
        assert!(snapshot.last_checked.is_none());

        tokio::time::sleep(secs(1)).await;
        let snapshot = engine.snapshot("cache").unwrap();
        assert_eq!(snapshot.health, HealthState::Healthy);
        assert!(snapshot.last_duration.is_some());
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn duplicate_and_invalid_registrations_fail_fast() {
        let engine = HealthEngine::new();
        let def = HealthCheckDefinition::new("db", HealthCheckType::Ready);
        engine
            .register_check(def.clone(), Arc::new(StaticProbe::new(true)))
            .unwrap();

        assert_eq!(
            engine.register_check(def, Arc::new(StaticProbe::new(true))),
            Err(HealthError::DuplicateCheck("db".to_string()))
        );

        let bad = HealthCheckDefinition::new("zero", HealthCheckType::Ready)
            .schedule(Schedule::new(Duration::ZERO, secs(1)));
        assert!(matches!(
            engine.register_check(bad, Arc::new(StaticProbe::new(true))),
            Err(HealthError::InvalidDefinition { .. })
        ));

        engine.shutdown().await;
        let late = HealthCheckDefinition::new("late", HealthCheckType::Ready);
        assert_eq!(
            engine.register_check(late, Arc::new(StaticProbe::new(true))),
            Err(HealthError::ShutDown)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn no_invocations_after_shutdown() {
        let engine = HealthEngine::with_shutdown_grace(secs(1));
        let calls = Arc::new(AtomicU32::new(0));
        let def = HealthCheckDefinition::new("db", HealthCheckType::Ready)
            .schedule(Schedule::new(secs(1), secs(1)));
        engine.register_check(def, counting(calls.clone())).unwrap();

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        engine.shutdown().await;
        let after_shutdown = calls.load(Ordering::SeqCst);
        tokio::time::sleep(secs(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_shutdown);
    }

    #[tokio::test(start_paused = true)]
    async fn unregister_stops_only_that_check() {
        let engine = HealthEngine::new();
        let a_calls = Arc::new(AtomicU32::new(0));
        let b_calls = Arc::new(AtomicU32::new(0));
        let schedule = Schedule::new(secs(1), secs(1));
        engine
            .register_check(
                HealthCheckDefinition::new("a", HealthCheckType::Ready).schedule(schedule.clone()),
                counting(a_calls.clone()),
            )
            .unwrap();
        engine
            .register_check(
                HealthCheckDefinition::new("b", HealthCheckType::Alive).schedule(schedule),
                counting(b_calls.clone()),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(engine.unregister_check("a"));
        assert!(!engine.unregister_check("a"));
        let a_before = a_calls.load(Ordering::SeqCst);

        tokio::time::sleep(secs(5)).await;
        assert_eq!(a_calls.load(Ordering::SeqCst), a_before);
        assert_eq!(b_calls.load(Ordering::SeqCst), 7);
        assert_eq!(engine.check_names(), vec!["b".to_string()]);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_probe_counts_as_failure() {
        let engine = HealthEngine::new();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let probe = FnProbe::new(move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("boom");
                }
                Ok::<(), ProbeError>(())
            }
        });
        let def = HealthCheckDefinition::new("flaky", HealthCheckType::Alive)
            .critical(true)
            .schedule(Schedule::new(secs(1), secs(1)).with_attempts(0, 1));
        engine.register_check(def, Arc::new(probe)).unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let snapshot = engine.snapshot("flaky").unwrap();
        assert_eq!(snapshot.health, HealthState::Unhealthy);
        assert!(snapshot.last_error.as_deref().unwrap_or_default().contains("boom"));

        tokio::time::sleep(secs(1)).await;
        assert_eq!(engine.evaluate(HealthCheckType::Alive), HealthState::Healthy);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn panicked_loop_restarts_from_last_snapshot() {
        let engine = HealthEngine::new();
        let def = HealthCheckDefinition::new("restarted", HealthCheckType::Ready)
            .critical(true)
            .schedule(Schedule::new(secs(1), secs(1)).with_attempts(2, 1));
        let (probe, mut calls) = scripted(vec![false; 4]);

        faults::arm("restarted");
        engine.register_check(def, probe).unwrap();

        // First failure is published, then the loop dies.
        tokio::time::sleep(Duration::from_millis(1050)).await;
        let snapshot = engine.snapshot("restarted").unwrap();
        assert_eq!(snapshot.consecutive_failures, 1);
        assert_eq!(snapshot.health, HealthState::Healthy);

        // Restarted after the backoff delay with the failure count carried over,
        // so one more failure crosses the threshold.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let snapshot = engine.snapshot("restarted").unwrap();
        assert_eq!(snapshot.health, HealthState::Unhealthy);
        assert_eq!(snapshot.consecutive_failures, 0);
        assert_eq!(engine.evaluate(HealthCheckType::Ready), HealthState::Unhealthy);

        // Still probing, now at the downtime cadence.
        tokio::time::sleep(secs(1)).await;
        assert_eq!(engine.snapshot("restarted").unwrap().consecutive_failures, 1);

        let mut invocations = 0;
        while calls.try_recv().is_ok() {
            invocations += 1;
        }
        assert_eq!(invocations, 3);
        engine.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn registration_racing_shutdown_leaves_nothing_running() {
        for round in 0..50 {
            let engine = Arc::new(HealthEngine::with_shutdown_grace(secs(1)));
            let calls = Arc::new(AtomicU32::new(0));

            let registrar = {
                let engine = engine.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    let mut i = 0u32;
                    loop {
                        let def = HealthCheckDefinition::new(format!("check-{i}"), HealthCheckType::Ready)
                            .schedule(
                                Schedule::new(Duration::from_millis(1), Duration::from_millis(1))
                                    .with_initial_delay(Duration::ZERO),
                            );
                        if let Err(e) = engine.register_check(def, counting(calls.clone())) {
                            return e;
                        }
                        i += 1;
                        tokio::task::yield_now().await;
                    }
                })
            };

            tokio::time::sleep(Duration::from_millis(5)).await;
            engine.shutdown().await;
            assert_eq!(registrar.await.unwrap(), HealthError::ShutDown);

            let after_shutdown = calls.load(Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert_eq!(calls.load(Ordering::SeqCst), after_shutdown, "round {round}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_probe_neither_blocks_siblings_nor_shutdown() {
        let engine = HealthEngine::with_shutdown_grace(secs(2));
        let stuck = FnProbe::new(|| async {
            std::future::pending::<()>().await;
            Ok::<(), ProbeError>(())
        });
        engine
            .register_check(
                HealthCheckDefinition::new("stuck", HealthCheckType::Ready)
                    .schedule(Schedule::new(secs(1), secs(1))),
                Arc::new(stuck),
            )
            .unwrap();

        let calls = Arc::new(AtomicU32::new(0));
        engine
            .register_check(
                HealthCheckDefinition::new("steady", HealthCheckType::Ready)
                    .schedule(Schedule::new(secs(1), secs(1))),
                counting(calls.clone()),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(5500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        let started = Instant::now();
        engine.shutdown().await;
        let waited = started.elapsed();
        assert!(waited >= secs(2) && waited < secs(3), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn draining_fails_readiness_only() {
        let engine = HealthEngine::new();
        engine
            .register_check(
                HealthCheckDefinition::new("db", HealthCheckType::Ready).critical(true),
                Arc::new(StaticProbe::new(true)),
            )
            .unwrap();

        assert_eq!(engine.evaluate(HealthCheckType::Ready), HealthState::Healthy);
        engine.begin_shutdown();
        assert!(engine.is_draining());
        assert_eq!(engine.evaluate(HealthCheckType::Ready), HealthState::Unhealthy);
        assert_eq!(engine.evaluate(HealthCheckType::Alive), HealthState::Healthy);
        engine.shutdown().await;
    }
}
