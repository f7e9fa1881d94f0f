//! Scenario runner
//!
//! Replays scenario steps at their scheduled times against a live session
//! and collects a decision trace.

use super::{Expectation, Scenario, StepAction};
use crate::arbitration::{Action, LexiconConfig};
use crate::generator::ChannelGenerator;
use crate::playback::{SimulatedPlayback, SimulatedPlaybackConfig};
use crate::session::{Session, SessionConfig, SessionEvent, SessionHandle, SessionStats, SpeakingState};
use crate::{Result, TurnError};
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// How long a step may take to be picked up by the session
const SETTLE_TIMEOUT: Duration = Duration::from_secs(1);

/// One arbitration as seen by the runner
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    /// Milliseconds after scenario start
    pub time_ms: u64,
    pub text: String,
    pub state: SpeakingState,
    pub action: Action,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub passed: bool,
    pub decisions: Vec<DecisionRecord>,
    /// Normalized text of every forwarded fragment
    pub forwarded: Vec<String>,
    /// Every agent turn that started playing
    pub played: Vec<String>,
    pub failures: Vec<String>,
    pub stats: SessionStats,
}

pub struct ScenarioRunner {
    scenario: Scenario,
    lexicon: LexiconConfig,
}

/// Mutable bookkeeping while a scenario runs
struct Trace {
    start: Instant,
    decisions: Vec<DecisionRecord>,
    failures: Vec<String>,
}

impl Trace {
    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn record(&mut self, event: SessionEvent) -> Option<DecisionRecord> {
        match event {
            SessionEvent::Arbitrated {
                fragment,
                state,
                action,
            } => {
                let record = DecisionRecord {
                    time_ms: self.elapsed_ms(),
                    text: fragment.raw,
                    state,
                    action,
                };
                self.decisions.push(record.clone());
                Some(record)
            }
            _ => None,
        }
    }

    fn drain(&mut self, handle: &SessionHandle) {
        while let Some(event) = handle.try_recv_event() {
            self.record(event);
        }
    }

    fn last_action(&self) -> Option<Action> {
        self.decisions.last().map(|d| d.action)
    }
}

impl ScenarioRunner {
    pub fn new(scenario: Scenario) -> Self {
        info!("[SCENARIO] Loaded: {}", scenario.scenario.name);
        if !scenario.scenario.description.is_empty() {
            info!("[SCENARIO] Description: {}", scenario.scenario.description);
        }
        info!("[SCENARIO] Total steps: {}", scenario.steps.len());

        Self {
            scenario,
            lexicon: LexiconConfig::default(),
        }
    }

    pub fn with_lexicon(mut self, lexicon: LexiconConfig) -> Self {
        self.lexicon = lexicon;
        self
    }

    /// Run every step and return the report
    ///
    /// Failed expectations are reported, not returned as errors.
    pub fn run(&self) -> Result<ScenarioReport> {
        let meta = &self.scenario.scenario;
        let playback = Arc::new(SimulatedPlayback::new(
            SimulatedPlaybackConfig::default().with_ms_per_word(meta.ms_per_word),
        ));
        let (generator, forwarded_rx) = ChannelGenerator::with_receiver();

        let mut config = SessionConfig::new().with_lexicon(self.lexicon.clone());
        if let Some(greeting) = &meta.greeting {
            config = config.with_greeting(greeting.clone());
        }

        let (session, handle) = Session::new(config, playback.clone(), Arc::new(generator))?;
        let worker = session.start()?;

        let mut trace = Trace {
            start: Instant::now(),
            decisions: Vec::new(),
            failures: Vec::new(),
        };

        for (index, step) in self.scenario.steps.iter().enumerate() {
            let due = trace.start + step.delay();
            let now = Instant::now();
            if due > now {
                thread::sleep(due - now);
            }
            trace.drain(&handle);

            match &step.action {
                StepAction::Speak { text } => {
                    let before = handle.stats();
                    handle.speak(text.clone())?;
                    wait_for_playback_attempt(&handle, &before);
                }
                StepAction::Transcript { text } => {
                    handle.submit_transcript(text.clone())?;
                    if !wait_for_decision(&handle, &mut trace, text) {
                        trace
                            .failures
                            .push(format!("step {}: no decision for '{}'", index, text));
                    }
                }
                StepAction::Wait => {}
                StepAction::Log { message } => info!("[SCENARIO] {}", message),
            }

            if let Some(expect) = &step.expect {
                trace.drain(&handle);
                if let Err(reason) = check(expect, &handle, &trace) {
                    warn!("[SCENARIO] Step {} failed: {}", index, reason);
                    trace.failures.push(format!("step {}: {}", index, reason));
                }
            }
        }

        handle.shutdown()?;
        worker
            .join()
            .map_err(|_| TurnError::ScenarioError("Session worker panicked".to_string()))?;
        trace.drain(&handle);

        let report = ScenarioReport {
            name: meta.name.clone(),
            passed: trace.failures.is_empty(),
            decisions: trace.decisions,
            forwarded: forwarded_rx.try_iter().map(|f| f.text).collect(),
            played: playback.started_texts(),
            failures: trace.failures,
            stats: handle.stats(),
        };

        info!(
            "[SCENARIO] {} {}",
            report.name,
            if report.passed { "PASSED" } else { "FAILED" }
        );
        Ok(report)
    }
}

/// Wait until the session has attempted the requested playback, or has
/// queued it behind the active one
fn wait_for_playback_attempt(handle: &SessionHandle, before: &SessionStats) {
    let deadline = Instant::now() + Duration::from_millis(100);
    while Instant::now() < deadline {
        let now = handle.stats();
        if now.playbacks_started + now.playback_failures
            > before.playbacks_started + before.playback_failures
        {
            return;
        }
        thread::sleep(Duration::from_millis(2));
    }
}

fn wait_for_decision(handle: &SessionHandle, trace: &mut Trace, text: &str) -> bool {
    let deadline = Instant::now() + SETTLE_TIMEOUT;
    while Instant::now() < deadline {
        if let Some(event) = handle.recv_event_timeout(Duration::from_millis(20)) {
            if let Some(record) = trace.record(event) {
                if record.text == text {
                    return true;
                }
            }
        }
    }
    false
}

fn check(
    expect: &Expectation,
    handle: &SessionHandle,
    trace: &Trace,
) -> std::result::Result<(), String> {
    match expect {
        Expectation::IsSpeaking => {
            if handle.is_speaking() {
                Ok(())
            } else {
                Err("expected agent to be speaking".to_string())
            }
        }
        Expectation::IsIdle => {
            if handle.is_speaking() {
                Err("expected agent to be idle".to_string())
            } else {
                Ok(())
            }
        }
        Expectation::LastAction { action } => match trace.last_action() {
            Some(last) if last == *action => Ok(()),
            Some(last) => Err(format!("expected last action {}, got {}", action, last)),
            None => Err(format!("expected last action {}, got none", action)),
        },
        Expectation::ForwardedCount { count } => {
            let forwarded = handle.stats().forwarded;
            if forwarded == *count {
                Ok(())
            } else {
                Err(format!("expected {} forwarded, got {}", count, forwarded))
            }
        }
    }
}
