//! E2E Test: Command-Trigger Protocol
//!
//! Clicks the links of rendered pages through `Scenario::handle_uri`:
//! - play links honour the limits and terminals written in the page
//! - invocation counters survive reloads
//! - page links navigate
//! - hand-made and broken URIs degrade or fail as documented

mod helpers;

use helpers::{play_links, ScenarioDir, INTRO_MD, STEP2_MD, TWO_TERMINAL_CONFIG};
use katapod::trigger::{TargetStep, Trigger};
use katapod::{CodeBlockId, DispatchOutcome, ResolvedCommand, ScenarioError, TriggerOutcome};

fn scenario_dir() -> ScenarioDir {
    ScenarioDir::new()
        .with_config(TWO_TERMINAL_CONFIG)
        .with_step("intro", INTRO_MD)
        .with_step("step2", STEP2_MD)
}

fn dispatched(outcome: TriggerOutcome) -> DispatchOutcome {
    match outcome {
        TriggerOutcome::Dispatched(outcome) => outcome,
        other => panic!("expected a dispatch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_play_links_respect_page_limits() {
    let dir = scenario_dir();
    let (workbench, scenario) = dir.activate().await;
    let links = play_links(&workbench.last_html().unwrap());
    assert_eq!(links.len(), 2);

    // Block 0: shell, maxInvocations 1
    let first = dispatched(scenario.handle_uri(&links[0]).await.unwrap());
    let second = dispatched(scenario.handle_uri(&links[0]).await.unwrap());
    assert!(first.is_executed());
    assert_eq!(second, DispatchOutcome::LimitReached { invocations: 1 });

    // Block 1: cqlsh, unlimited
    for _ in 0..3 {
        let outcome = dispatched(scenario.handle_uri(&links[1]).await.unwrap());
        assert!(outcome.is_executed());
    }

    let shell = workbench.sends_to("Shell");
    assert_eq!(shell.iter().filter(|s| s.as_str() == "./setup.sh\n").count(), 1);
    let cqlsh = workbench.sends_to("cqlsh-editor");
    assert_eq!(
        cqlsh
            .iter()
            .filter(|s| s.as_str() == "SELECT * FROM system.local;\n")
            .count(),
        3
    );
}

#[tokio::test]
async fn test_counters_survive_reload() {
    let dir = scenario_dir();
    let (workbench, scenario) = dir.activate().await;

    let link = play_links(&workbench.last_html().unwrap())[0].clone();
    assert!(dispatched(scenario.handle_uri(&link).await.unwrap()).is_executed());

    let outcome = scenario.handle_uri("command:katapod.reloadPage").await.unwrap();
    assert!(matches!(outcome, TriggerOutcome::Reloaded(Some(_))));

    // The re-rendered page carries the same code block id
    let relinked = play_links(&workbench.last_html().unwrap())[0].clone();
    assert_eq!(relinked, link);
    assert_eq!(
        dispatched(scenario.handle_uri(&relinked).await.unwrap()),
        DispatchOutcome::LimitReached { invocations: 1 }
    );

    let state = scenario.snapshot_state().await;
    assert_eq!(
        state
            .invocation_counts
            .get(&CodeBlockId::in_page("intro", 0)),
        1
    );
}

#[tokio::test]
async fn test_page_link_navigates() {
    let dir = scenario_dir();
    let (workbench, scenario) = dir.activate().await;

    let html = workbench.last_html().unwrap();
    let start = html.find("command:katapod.loadPage?").unwrap();
    let end = start + html[start..].find('"').unwrap();

    let outcome = scenario.handle_uri(&html[start..end]).await.unwrap();
    match outcome {
        TriggerOutcome::Loaded(load) => {
            assert_eq!(load.step, "step2");
            assert_eq!(load.rendered.commands.len(), 1);
        }
        other => panic!("expected a page load, got {:?}", other),
    }
    assert_eq!(scenario.current_step().await.as_deref(), Some("step2"));
}

#[tokio::test]
async fn test_unknown_terminal_in_payload_falls_back() {
    let dir = scenario_dir();
    let (workbench, scenario) = dir.activate().await;

    let command = ResolvedCommand::builder("whoami", CodeBlockId::in_page("intro", 99))
        .terminal_id("nonexistent")
        .build();
    let uri = Trigger::SendText(command).to_uri().unwrap();

    let outcome = dispatched(scenario.handle_uri(&uri).await.unwrap());
    assert_eq!(
        outcome,
        DispatchOutcome::Executed {
            terminal: "cqlsh-editor".into(),
            invocations: 1
        }
    );
    assert_eq!(workbench.sends_to("cqlsh-editor").last().map(String::as_str), Some("whoami"));
}

#[tokio::test]
async fn test_broken_uris_are_errors_without_side_effects() {
    let dir = scenario_dir();
    let (workbench, scenario) = dir.activate().await;
    let before = workbench.events().len();

    for uri in [
        "command:katapod.sendText?%5B%5D",
        "command:katapod.sendText?%7Bnot-json",
        "command:katapod.unknown",
        "not a uri",
    ] {
        let result = scenario.handle_uri(uri).await;
        assert!(matches!(result, Err(ScenarioError::Trigger(_))), "{}", uri);
    }
    assert_eq!(workbench.events().len(), before);
}

#[tokio::test]
async fn test_direct_trigger_matches_uri() {
    let dir = scenario_dir();
    let (_workbench, scenario) = dir.activate().await;

    let outcome = scenario
        .handle_trigger(Trigger::LoadPage(TargetStep::new("step2")))
        .await
        .unwrap();
    assert!(matches!(outcome, TriggerOutcome::Loaded(ref load) if load.step == "step2"));
}
