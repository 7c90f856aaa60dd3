use anyhow::{Result, ensure};
use holdout_game::{DifficultyPreset, EndReason, EventKind, GameConfig};

use crate::logic::{PlayerStrategy, SimulationPlan, SimulationSummary};

/// Named logic scenario.
#[derive(Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub description: &'static str,
    pub plan: SimulationPlan,
}

struct CatalogEntry {
    key: &'static str,
    name: &'static str,
    description: &'static str,
    plan: fn() -> SimulationPlan,
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        key: "smoke",
        name: "Smoke",
        description: "Attentive player, default tuning; the session must end and score",
        plan: smoke_plan,
    },
    CatalogEntry {
        key: "coverage",
        name: "Guaranteed Coverage",
        description: "Every guaranteed event fires in sessions that run out the clock",
        plan: coverage_plan,
    },
    CatalogEntry {
        key: "idle-player",
        name: "Idle Player",
        description: "Nobody answers; every cop check must auto-resolve",
        plan: idle_plan,
    },
    CatalogEntry {
        key: "attentive-player",
        name: "Attentive Player",
        description: "Correct answers only; no auto-resolve penalties",
        plan: attentive_plan,
    },
    CatalogEntry {
        key: "resting-player",
        name: "Resting Player",
        description: "Rests whenever tired; exercises the rest/raise exclusion",
        plan: resting_plan,
    },
    CatalogEntry {
        key: "erratic-player",
        name: "Erratic Player",
        description: "Random inputs and answers; invariants only",
        plan: erratic_plan,
    },
    CatalogEntry {
        key: "hard-difficulty",
        name: "Hard Difficulty",
        description: "Hard preset; probabilistic events stay under the cap",
        plan: hard_plan,
    },
    CatalogEntry {
        key: "short-session",
        name: "Short Session",
        description: "Session shorter than the first-event window; no events fire",
        plan: short_plan,
    },
];

/// Every scenario key with its description, in catalog order.
#[must_use]
pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    CATALOG
        .iter()
        .map(|entry| (entry.key, entry.description))
        .collect()
}

#[must_use]
pub fn get_scenario(key: &str) -> Option<TestScenario> {
    let key = key.trim().to_ascii_lowercase();
    CATALOG
        .iter()
        .find(|entry| entry.key == key)
        .map(|entry| TestScenario {
            name: entry.name.to_string(),
            description: entry.description,
            plan: (entry.plan)(),
        })
}

/// Expand `all` into the full catalog, keeping any explicit keys.
#[must_use]
pub fn expand_scenarios(requested: &[String]) -> Vec<String> {
    let mut scenarios: Vec<String> = requested
        .iter()
        .filter(|key| key.as_str() != "all")
        .cloned()
        .collect();
    if requested.iter().any(|key| key == "all") {
        for entry in CATALOG {
            if !scenarios.iter().any(|key| key == entry.key) {
                scenarios.push(entry.key.to_string());
            }
        }
    }
    scenarios
}

fn session_ended(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.results.end_reason.is_some(),
        "session did not end after {} ticks",
        summary.ticks
    );
    Ok(())
}

fn guaranteed_fired(summary: &SimulationSummary) -> Result<()> {
    if summary.results.end_reason != Some(EndReason::Time) {
        return Ok(());
    }
    for kind in &summary.guaranteed {
        ensure!(
            summary.events.contains(kind),
            "guaranteed {kind} never fired ({:?})",
            summary.events
        );
    }
    Ok(())
}

fn smoke_plan() -> SimulationPlan {
    SimulationPlan::new(PlayerStrategy::Attentive)
        .with_expectation(session_ended)
        .with_expectation(|summary: &SimulationSummary| -> Result<()> {
            if summary.results.end_reason == Some(EndReason::Time) {
                ensure!(!summary.events.is_empty(), "a full session saw no events");
            }
            Ok(())
        })
}

fn coverage_plan() -> SimulationPlan {
    SimulationPlan::new(PlayerStrategy::Attentive).with_expectation(guaranteed_fired)
}

fn idle_plan() -> SimulationPlan {
    SimulationPlan::new(PlayerStrategy::Idle)
        .with_expectation(session_ended)
        .with_expectation(guaranteed_fired)
        .with_expectation(|summary: &SimulationSummary| -> Result<()> {
            ensure!(summary.decisions.is_empty(), "idle player answered");
            let checks = summary.count(EventKind::CopCheck);
            ensure!(
                summary.auto_resolved <= checks,
                "{} auto-resolves for {checks} cop checks",
                summary.auto_resolved
            );
            ensure!(
                summary.results.total_reactions() == 0,
                "idle player recorded reactions"
            );
            Ok(())
        })
}

fn attentive_plan() -> SimulationPlan {
    SimulationPlan::new(PlayerStrategy::Attentive)
        .with_expectation(session_ended)
        .with_expectation(|summary: &SimulationSummary| -> Result<()> {
            ensure!(
                summary.decisions.iter().all(|decision| decision.correct),
                "attentive player gave a wrong answer"
            );
            ensure!(
                summary.auto_resolved == 0,
                "{} cop checks auto-resolved",
                summary.auto_resolved
            );
            Ok(())
        })
}

fn resting_plan() -> SimulationPlan {
    SimulationPlan::new(PlayerStrategy::Rester).with_expectation(session_ended)
}

fn erratic_plan() -> SimulationPlan {
    SimulationPlan::new(PlayerStrategy::Erratic).with_expectation(session_ended)
}

fn hard_plan() -> SimulationPlan {
    SimulationPlan::new(PlayerStrategy::Attentive)
        .with_difficulty(DifficultyPreset::Hard)
        .with_expectation(session_ended)
        .with_expectation(|summary: &SimulationSummary| -> Result<()> {
            let limit = summary.event_cap + summary.guaranteed.len();
            ensure!(
                summary.events.len() <= limit,
                "{} events exceed cap {limit}",
                summary.events.len()
            );
            ensure!(summary.count(EventKind::Weather) <= 1, "rain fired twice");
            ensure!(summary.count(EventKind::Karma) <= 1, "karma fired twice");
            Ok(())
        })
}

fn shorten_session(config: &mut GameConfig) {
    config.session.duration_seconds = 20.0;
}

fn short_plan() -> SimulationPlan {
    SimulationPlan::new(PlayerStrategy::Idle)
        .with_setup(shorten_session)
        .with_expectation(|summary: &SimulationSummary| -> Result<()> {
            ensure!(
                summary.results.end_reason == Some(EndReason::Time),
                "short session ended by {:?}",
                summary.results.end_reason
            );
            ensure!(summary.events.is_empty(), "events fired: {:?}", summary.events);
            Ok(())
        })
}
