//! Integration Test: Daemon Loop
//!
//! 繰り返し実行と割り込みによる停止をテスト

#![cfg(unix)]

use super::support::{client_for, mount_accepting, GRAPHQL_PATH, RESULT_COMMAND};
use chrono::Local;
use isl_client_agent::{
    scheduler::Scheduler,
    shutdown::{ShutdownLevel, ShutdownSignal},
};
use isl_client_common::types::CycleOutcome;
use std::time::Duration;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

async fn received(server: &MockServer) -> u64 {
    server
        .received_requests()
        .await
        .map(|requests| requests.len() as u64)
        .unwrap_or(0)
}

#[tokio::test]
async fn test_interrupt_during_wait_stops_daemon() {
    // Arrange: 1サイクル目の後は60秒待機に入る
    let primary = MockServer::start().await;
    let fallback = MockServer::start().await;
    mount_accepting(&primary, 1).await;
    mount_accepting(&fallback, 0).await;

    let shutdown = ShutdownSignal::manual();
    let scheduler = Scheduler::new(
        RESULT_COMMAND.to_string(),
        Duration::from_secs(60),
        client_for(&primary, &fallback),
        shutdown.clone(),
    );

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.escalate();
    });

    // Act
    let state = tokio::time::timeout(Duration::from_secs(10), scheduler.run_daemon())
        .await
        .expect("daemon should stop without waiting for the next cycle");

    // Assert
    assert_eq!(state.cycles_completed, 1);
    assert_eq!(state.last_outcome, Some(CycleOutcome::Success));
    assert!(state.shutdown_requested);
    assert!(!state.cycle_in_flight);
    assert!(state.next_run_at.is_none());
}

#[tokio::test]
async fn test_daemon_keeps_cycling_after_failures() {
    let primary = MockServer::start().await;
    let fallback = MockServer::start().await;
    mount_accepting(&primary, 0).await;
    mount_accepting(&fallback, 0).await;

    let shutdown = ShutdownSignal::manual();
    let scheduler = Scheduler::new(
        "echo 'no measurement today'".to_string(),
        Duration::from_millis(100),
        client_for(&primary, &fallback),
        shutdown.clone(),
    );

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        trigger.request(ShutdownLevel::Graceful);
    });

    let state = tokio::time::timeout(Duration::from_secs(10), scheduler.run_daemon())
        .await
        .expect("daemon should stop after the interrupt");

    assert!(
        state.cycles_completed >= 2,
        "expected repeated cycles, got {}",
        state.cycles_completed
    );
    assert_eq!(state.last_outcome, Some(CycleOutcome::ProcessFailed));
}

#[tokio::test]
async fn test_shutdown_before_start_runs_no_cycle() {
    let primary = MockServer::start().await;
    let fallback = MockServer::start().await;
    mount_accepting(&primary, 0).await;
    mount_accepting(&fallback, 0).await;

    let shutdown = ShutdownSignal::manual();
    shutdown.request(ShutdownLevel::Graceful);
    let scheduler = Scheduler::new(
        RESULT_COMMAND.to_string(),
        Duration::from_secs(60),
        client_for(&primary, &fallback),
        shutdown,
    );

    let state = scheduler.run_daemon().await;

    assert_eq!(state.cycles_completed, 0);
    assert!(state.shutdown_requested);
    assert!(state.last_outcome.is_none());
    assert_eq!(scheduler.interval(), Duration::from_secs(60));
}

#[tokio::test]
async fn test_daemon_keeps_cycling_after_submission_failures() {
    // Arrange: 結果は出るが通常URLもフォールバックも500
    let primary = MockServer::start().await;
    let fallback = MockServer::start().await;
    for server in [&primary, &fallback] {
        Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .respond_with(ResponseTemplate::new(500))
            .expect(2..)
            .mount(server)
            .await;
    }

    let shutdown = ShutdownSignal::manual();
    let scheduler = Scheduler::new(
        RESULT_COMMAND.to_string(),
        Duration::from_millis(100),
        client_for(&primary, &fallback),
        shutdown.clone(),
    );

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1200)).await;
        trigger.request(ShutdownLevel::Graceful);
    });

    // Act
    let state = tokio::time::timeout(Duration::from_secs(15), scheduler.run_daemon())
        .await
        .expect("daemon should stop after the interrupt");

    // Assert: 1サイクルにつき通常1回 + フォールバック1回
    assert!(
        state.cycles_completed >= 2,
        "expected repeated cycles, got {}",
        state.cycles_completed
    );
    assert_eq!(state.last_outcome, Some(CycleOutcome::SubmissionFailed));
    assert_eq!(received(&primary).await, state.cycles_completed);
    assert_eq!(received(&fallback).await, state.cycles_completed);
}

#[tokio::test]
async fn test_next_run_is_scheduled_one_interval_ahead() {
    let primary = MockServer::start().await;
    let fallback = MockServer::start().await;
    mount_accepting(&primary, 1).await;
    mount_accepting(&fallback, 0).await;

    let interval = Duration::from_secs(60);
    let shutdown = ShutdownSignal::manual();
    let scheduler = Scheduler::new(
        RESULT_COMMAND.to_string(),
        interval,
        client_for(&primary, &fallback),
        shutdown.clone(),
    );

    let mut state_rx = scheduler.watch_state();
    let observer = async {
        let waiting = state_rx
            .wait_for(|state| state.next_run_at.is_some())
            .await
            .expect("state channel should stay open")
            .clone();
        let observed_at = Local::now();
        shutdown.request(ShutdownLevel::Graceful);
        (waiting, observed_at)
    };

    let (final_state, (waiting, observed_at)) = tokio::time::timeout(
        Duration::from_secs(10),
        async { tokio::join!(scheduler.run_daemon(), observer) },
    )
    .await
    .expect("daemon should stop while waiting");

    let next_run_at = waiting.next_run_at.expect("next run should be scheduled");
    let ahead = next_run_at - observed_at;
    assert!(
        ahead <= chrono::Duration::seconds(60) && ahead >= chrono::Duration::seconds(55),
        "next run should be about one interval ahead, got {:?}",
        ahead
    );
    assert_eq!(waiting.cycles_completed, 1);
    assert!(!waiting.cycle_in_flight);
    assert_eq!(waiting.last_outcome, Some(CycleOutcome::Success));

    assert_eq!(final_state.cycles_completed, 1);
    assert!(final_state.next_run_at.is_none());
    assert_eq!(scheduler.watch_state().borrow().clone(), final_state);
}
