use holdout_game::scheduler::{CopOption, CopScenario, KarmaPhase};
use holdout_game::state::StateChange;
use holdout_game::{
    Difficulty, EndReason, EventKind, EventOutcome, GameConfig, RngBundle, SchedulerEvent,
    SchedulerPhase, Session, SessionConfig, SessionState, SignMaterial, WeatherConfig,
    WeatherControl, WeatherSimulation, WeatherState,
};
use std::rc::Rc;

const DT: f32 = 0.1;

fn single_scenario_config(scenario: CopScenario) -> GameConfig {
    let mut config = GameConfig::default_config();
    config.cop_check.scenarios = vec![scenario];
    config
}

fn scenario(auto_resolve_seconds: f32, auto_resolve_penalty: f32) -> CopScenario {
    CopScenario {
        id: "test".to_string(),
        description: "Officer approaches.".to_string(),
        opening_line: "What's all this?".to_string(),
        options: vec![CopOption {
            text: "Just exercising my rights.".to_string(),
            correct: true,
            confidence_delta: 10.0,
            score_delta: 0,
            reply: "Carry on.".to_string(),
            dismiss_delay_seconds: 3.0,
        }],
        auto_resolve_seconds,
        auto_resolve_penalty,
    }
}

fn tick_for(session: &mut Session, seconds: f32) {
    let steps = (seconds / DT).round() as usize;
    for _ in 0..steps {
        session.tick(DT);
    }
}

#[test]
fn cop_check_answer_moves_confidence_only() {
    let mut config = single_scenario_config(scenario(12.0, -15.0));
    config.session.starting_confidence = 30.0;
    let mut session = Session::seeded(config, 1);
    session.force_trigger(EventKind::CopCheck).expect("cop check");

    let outcome = session.select_cop_option(0).expect("answer");
    assert!(outcome.correct);
    assert!((session.state().confidence() - 40.0).abs() < 0.01);
    assert_eq!(session.state().score(), 0);
    let results = session.results();
    assert_eq!(results.total_reactions(), 0);
}

#[test]
fn unanswered_cop_check_applies_penalty_exactly_once() {
    let auto_resolve = 8.0;
    let penalty = -15.0;
    let mut config = single_scenario_config(scenario(auto_resolve, penalty));
    config.weather.confidence_drain_per_second = 0.0;
    let mut session = Session::seeded(config, 2);
    session.force_trigger(EventKind::CopCheck).expect("cop check");
    let start = session.state().confidence();

    tick_for(&mut session, auto_resolve - 1.0);
    assert!((session.state().confidence() - start).abs() < 0.01);
    assert!(session.scheduler().cop_check_time_remaining().is_some());

    tick_for(&mut session, 1.5);
    assert!((session.state().confidence() - (start + penalty)).abs() < 0.01);

    tick_for(&mut session, 5.0);
    assert!((session.state().confidence() - (start + penalty)).abs() < 0.01);
    assert_eq!(session.scheduler().current_state(), SchedulerPhase::Idle);

    let events = session.drain_scheduler_events();
    let froze = events
        .iter()
        .filter(|event| matches!(event, SchedulerEvent::CopCheckReplied { correct: None, .. }))
        .count();
    assert_eq!(froze, 1);
    assert!(events.contains(&SchedulerEvent::EventEnded {
        kind: EventKind::CopCheck,
        outcome: EventOutcome::AutoResolved,
    }));
}

#[test]
fn karma_total_is_phase_sum_plus_boost() {
    let mut config = GameConfig::default_config();
    config.karma.phases = vec![
        KarmaPhase {
            duration_seconds: 2.0,
            confidence_delta: -4.0,
            score_delta: 10,
            banner: "one".to_string(),
        },
        KarmaPhase {
            duration_seconds: 1.5,
            confidence_delta: 7.0,
            score_delta: 0,
            banner: "two".to_string(),
        },
        KarmaPhase {
            duration_seconds: 2.5,
            confidence_delta: 3.0,
            score_delta: 5,
            banner: "three".to_string(),
        },
    ];
    config.karma.total_boost = 6.0;
    let mut session = Session::seeded(config, 3);
    let start = session.state().confidence();
    session.force_trigger(EventKind::Karma).expect("karma");
    session.drain_state_changes();

    tick_for(&mut session, 8.0);
    assert_eq!(session.scheduler().current_state(), SchedulerPhase::Idle);
    let expected = start - 4.0 + 7.0 + 3.0 + 6.0;
    assert!((session.state().confidence() - expected).abs() < 0.01);
    assert_eq!(session.state().score(), 15);

    tick_for(&mut session, 10.0);
    assert!((session.state().confidence() - expected).abs() < 0.01);
    let ended = session
        .drain_scheduler_events()
        .into_iter()
        .filter(|event| {
            matches!(
                event,
                SchedulerEvent::EventEnded {
                    kind: EventKind::Karma,
                    outcome: EventOutcome::Completed
                }
            )
        })
        .count();
    assert_eq!(ended, 1);
}

#[test]
fn forty_seconds_of_rain_degrades_and_clears() {
    let config = WeatherConfig::default();
    let rate = config.degradation_per_second;
    let cap = config.max_sign_degradation;
    let mut weather = WeatherSimulation::new(
        config,
        &SignMaterial::cardboard(),
        &Difficulty::normal(),
        Rc::new(RngBundle::from_user_seed(4)),
    );
    let mut state = SessionState::default();
    weather.start_rain_for(40.0, &mut state);
    assert_eq!(state.weather_state(), WeatherState::Rain);
    // a few spare ticks absorb f32 drift in the countdown
    for _ in 0..405 {
        state.update_time(DT);
        weather.update(DT, &mut state);
    }
    let expected = (rate * 40.0).min(cap);
    assert!((state.sign_degradation() - expected).abs() < 0.01);
    assert_eq!(state.weather_state(), WeatherState::Clear);
    assert!(!weather.is_raining());
}

#[test]
fn confidence_floor_fires_terminal_event_once() {
    let mut config = GameConfig::default_config();
    config.session.starting_confidence = 10.0;
    let mut session = Session::seeded(config, 5);
    tick_for(&mut session, 5.0);
    session.force_trigger(EventKind::Weather).expect("rain");
    session
        .scheduler_mut()
        .karma_config_mut()
        .phases
        .iter_mut()
        .for_each(|phase| phase.confidence_delta = -20.0);
    session.force_trigger(EventKind::Karma).expect("karma");
    tick_for(&mut session, 20.0);

    let state = session.state();
    assert!(!state.is_session_active());
    assert_eq!(state.end_reason(), Some(EndReason::Confidence));
    let changes = session.drain_state_changes();
    let ends = changes
        .iter()
        .filter(|change| matches!(change, StateChange::SessionEnd { .. }))
        .count();
    let zeros = changes
        .iter()
        .filter(|change| matches!(change, StateChange::ConfidenceZero))
        .count();
    assert_eq!(ends, 1);
    assert_eq!(zeros, 1);
}

#[test]
fn session_time_cannot_go_negative() {
    let config = SessionConfig {
        duration_seconds: 3.0,
        ..SessionConfig::default()
    };
    let mut state = SessionState::new(&config);
    for _ in 0..10 {
        state.update_time(1.0);
        assert!(state.time_remaining() >= 0.0);
    }
    assert_eq!(state.end_reason(), Some(EndReason::Time));
}

#[test]
fn hot_tuning_applies_on_the_next_tick() {
    let mut session = Session::seeded(GameConfig::default_config(), 6);
    session.fatigue_mut().config_mut().base_drain_per_second = 10.0;
    session.tick(1.0);
    assert!((session.state().arm_fatigue() - 10.0).abs() < 0.01);
}
