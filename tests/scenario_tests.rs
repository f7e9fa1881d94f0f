//! Runs the scenarios shipped in `scenarios/`

use std::path::PathBuf;
use turnkeeper::scenario::{Scenario, ScenarioRunner};
use turnkeeper::{Action, LexiconConfig, SpeakingState};

fn scenario_file(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(name)
}

#[test]
fn test_barge_in_scenario_passes() {
    let scenario = Scenario::load(scenario_file("barge_in.toml")).unwrap();
    let lexicon = LexiconConfig::load(scenario_file("lexicon.toml")).unwrap();

    let report = ScenarioRunner::new(scenario).with_lexicon(lexicon).run().unwrap();

    assert!(report.passed, "failures: {:?}", report.failures);
    assert_eq!(report.decisions.len(), 5);
    assert_eq!(report.decisions[0].state, SpeakingState::Speaking);
    assert_eq!(report.decisions[4].action, Action::Forward);
    assert_eq!(
        report.forwarded,
        vec!["no wait stop please", "what is it like in paris", "hmm"]
    );
    assert_eq!(report.played.len(), 2);
}

#[test]
fn test_sample_lexicon_is_disjoint() {
    let lexicon = LexiconConfig::load(scenario_file("lexicon.toml")).unwrap();
    assert!(lexicon.strip_punctuation);
    assert!(turnkeeper::Lexicon::from_config(&lexicon).is_ok());
}
