//! Scripted conversation scenarios
//!
//! A scenario is a TOML file of timed steps (agent turns and user
//! transcripts) with optional expectations, replayed against a session that
//! uses the simulated playback engine.

mod runner;

pub use runner::{DecisionRecord, ScenarioReport, ScenarioRunner};

use crate::arbitration::Action;
use crate::{Result, TurnError};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// A scenario loaded from a TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub scenario: ScenarioMetadata,
    pub steps: Vec<ScenarioStep>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Simulated playback time per spoken word
    #[serde(default = "default_ms_per_word")]
    pub ms_per_word: u64,
    /// Agent turn played when the session starts
    #[serde(default)]
    pub greeting: Option<String>,
}

fn default_ms_per_word() -> u64 {
    200
}

/// Upper bound for `ms_per_word`
pub const MAX_MS_PER_WORD: u64 = 60_000;

/// Latest time a step may be scheduled at (one hour)
pub const MAX_STEP_TIME_MS: u64 = 3_600_000;

/// One timed step
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioStep {
    /// Milliseconds after scenario start
    pub time_ms: u64,
    pub action: StepAction,
    /// Checked once the action has been handled
    #[serde(default)]
    pub expect: Option<Expectation>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAction {
    /// Agent turn
    Speak { text: String },
    /// User transcript fragment
    Transcript { text: String },
    /// Nothing; a point in time to check an expectation
    Wait,
    Log { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expectation {
    IsSpeaking,
    IsIdle,
    /// The most recent arbitration produced `action`
    LastAction { action: Action },
    /// Total fragments handed to the response generator so far
    ForwardedCount { count: u64 },
}

impl Scenario {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            TurnError::ScenarioError(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| TurnError::ScenarioError(format!("'{}': {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let scenario: Scenario = toml::from_str(content)
            .map_err(|e| TurnError::ScenarioError(format!("Failed to parse scenario: {}", e)))?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(TurnError::ScenarioError(
                "Scenario must have at least one step".to_string(),
            ));
        }

        if self.scenario.ms_per_word > MAX_MS_PER_WORD {
            return Err(TurnError::ScenarioError(format!(
                "ms_per_word must be at most {}, got {}",
                MAX_MS_PER_WORD, self.scenario.ms_per_word
            )));
        }

        let mut last_time = 0;
        for step in &self.steps {
            if step.time_ms > MAX_STEP_TIME_MS {
                return Err(TurnError::ScenarioError(format!(
                    "Step at {}ms is past the {}ms limit",
                    step.time_ms, MAX_STEP_TIME_MS
                )));
            }
            if step.time_ms < last_time {
                return Err(TurnError::ScenarioError(format!(
                    "Steps must be ordered by time. Found step at {}ms after step at {}ms",
                    step.time_ms, last_time
                )));
            }
            last_time = step.time_ms;
        }

        Ok(())
    }
}

impl ScenarioStep {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.time_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::parse(
            r#"
            [scenario]
            name = "Barge-in"
            ms_per_word = 100
            greeting = "Hello, how can I help?"

            [[steps]]
            time_ms = 100
            action = { type = "transcript", text = "yeah" }
            expect = { type = "last_action", action = "ignore" }

            [[steps]]
            time_ms = 200
            action = { type = "speak", text = "It is sunny" }

            [[steps]]
            time_ms = 900
            action = { type = "wait" }
            expect = { type = "forwarded_count", count = 0 }
            "#,
        )
        .unwrap();

        assert_eq!(scenario.scenario.name, "Barge-in");
        assert_eq!(scenario.scenario.ms_per_word, 100);
        assert_eq!(
            scenario.scenario.greeting.as_deref(),
            Some("Hello, how can I help?")
        );
        assert_eq!(scenario.steps.len(), 3);
        assert!(matches!(scenario.steps[0].action, StepAction::Transcript { ref text } if text == "yeah"));
        assert_eq!(
            scenario.steps[0].expect,
            Some(Expectation::LastAction {
                action: Action::Ignore
            })
        );
        assert!(matches!(scenario.steps[2].action, StepAction::Wait));
        assert_eq!(scenario.steps[1].delay(), Duration::from_millis(200));
    }

    #[test]
    fn test_defaults() {
        let scenario = Scenario::parse(
            r#"
            [scenario]
            name = "Minimal"

            [[steps]]
            time_ms = 0
            action = { type = "log", message = "hi" }
            "#,
        )
        .unwrap();

        assert_eq!(scenario.scenario.ms_per_word, 200);
        assert!(scenario.scenario.greeting.is_none());
        assert!(scenario.scenario.description.is_empty());
        assert!(scenario.steps[0].expect.is_none());
    }

    #[test]
    fn test_unordered_steps_rejected() {
        let err = Scenario::parse(
            r#"
            [scenario]
            name = "Out of order"

            [[steps]]
            time_ms = 500
            action = { type = "wait" }

            [[steps]]
            time_ms = 100
            action = { type = "wait" }
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, TurnError::ScenarioError(ref msg) if msg.contains("ordered")));
    }

    #[test]
    fn test_huge_ms_per_word_rejected() {
        let err = Scenario::parse(
            r#"
            [scenario]
            name = "Slow talker"
            ms_per_word = 9223372036854775807
            greeting = "one two three"

            [[steps]]
            time_ms = 0
            action = { type = "wait" }
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, TurnError::ScenarioError(ref msg) if msg.contains("ms_per_word")));
    }

    #[test]
    fn test_step_time_limit() {
        let scenario = |time_ms: u64| {
            format!(
                r#"
                [scenario]
                name = "Far future"

                [[steps]]
                time_ms = {}
                action = {{ type = "wait" }}
                "#,
                time_ms
            )
        };

        assert!(Scenario::parse(&scenario(MAX_STEP_TIME_MS)).is_ok());
        let err = Scenario::parse(&scenario(9223372036854775807)).unwrap_err();
        assert!(matches!(err, TurnError::ScenarioError(ref msg) if msg.contains("limit")));
    }

    #[test]
    fn test_empty_steps_rejected() {
        let err = Scenario::parse(
            r#"
            steps = []

            [scenario]
            name = "Empty"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, TurnError::ScenarioError(_)));
    }

    #[test]
    fn test_unknown_action_rejected() {
        let err = Scenario::parse(
            r#"
            [scenario]
            name = "Bad"

            [[steps]]
            time_ms = 0
            action = { type = "dance" }
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, TurnError::ScenarioError(ref msg) if msg.contains("parse")));
    }
}
