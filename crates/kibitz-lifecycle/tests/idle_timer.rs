//! Integration tests for the idle-eviction timer.
//!
//! All tests run with `start_paused = true` so `tokio::time::sleep`
//! advances the clock deterministically instead of waiting in real time.

use std::time::Duration;

use kibitz_lifecycle::{IdleTimer, TimerState};
use tokio::sync::mpsc;

const TIMEOUT: Duration = Duration::from_secs(60);

fn timer() -> (IdleTimer<String>, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (IdleTimer::new("room-1".to_string(), TIMEOUT, tx), rx)
}

/// Sleeps past the timeout, letting the countdown task run to completion.
async fn run_out_the_clock() {
    tokio::time::sleep(TIMEOUT + Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_new_timer_is_disarmed() {
    let (t, mut rx) = timer();
    assert_eq!(t.state(), TimerState::Disarmed);
    assert!(!t.is_armed());

    run_out_the_clock().await;
    assert!(rx.try_recv().is_err(), "disarmed timer must not deliver");
}

#[tokio::test(start_paused = true)]
async fn test_armed_timer_delivers_after_full_duration() {
    let (mut t, mut rx) = timer();
    t.arm();
    assert!(t.is_armed());

    // Not yet.
    tokio::time::sleep(TIMEOUT - Duration::from_millis(1)).await;
    assert!(rx.try_recv().is_err());

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert_eq!(rx.try_recv().unwrap(), "room-1");
}

#[tokio::test(start_paused = true)]
async fn test_disarm_cancels_pending_delivery() {
    let (mut t, mut rx) = timer();
    t.arm();
    tokio::time::sleep(TIMEOUT / 2).await;
    t.disarm();
    assert_eq!(t.state(), TimerState::Disarmed);

    run_out_the_clock().await;
    run_out_the_clock().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_rearm_restarts_full_duration() {
    let (mut t, mut rx) = timer();
    t.arm();

    // Burn 90% of the countdown, then cycle disarm/arm.
    tokio::time::sleep(TIMEOUT * 9 / 10).await;
    t.disarm();
    t.arm();

    // Another 90% — no credit for the time already elapsed.
    tokio::time::sleep(TIMEOUT * 9 / 10).await;
    assert!(rx.try_recv().is_err(), "rearm must reset the full duration");

    tokio::time::sleep(TIMEOUT * 2 / 10).await;
    assert_eq!(rx.try_recv().unwrap(), "room-1");
}

#[tokio::test(start_paused = true)]
async fn test_arm_while_armed_restarts_countdown() {
    let (mut t, mut rx) = timer();
    t.arm();
    tokio::time::sleep(TIMEOUT * 9 / 10).await;
    t.arm();

    tokio::time::sleep(TIMEOUT * 9 / 10).await;
    assert!(rx.try_recv().is_err());

    tokio::time::sleep(TIMEOUT * 2 / 10).await;
    assert!(rx.try_recv().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_fire_confirms_exactly_once() {
    let (mut t, mut rx) = timer();
    t.arm();
    run_out_the_clock().await;
    assert!(rx.try_recv().is_ok());

    assert!(t.fire(), "first confirmation succeeds");
    assert_eq!(t.state(), TimerState::Fired);
    assert!(!t.fire(), "second confirmation must fail");
}

#[tokio::test(start_paused = true)]
async fn test_fire_after_disarm_is_rejected() {
    let (mut t, _rx) = timer();
    t.arm();
    t.disarm();
    // A stale token arriving now must not be confirmed.
    assert!(!t.fire());
    assert_eq!(t.state(), TimerState::Disarmed);
}

#[tokio::test(start_paused = true)]
async fn test_fired_is_terminal() {
    let (mut t, mut rx) = timer();
    t.arm();
    run_out_the_clock().await;
    let _ = rx.try_recv();
    assert!(t.fire());

    // arm/disarm are no-ops after firing.
    t.arm();
    assert_eq!(t.state(), TimerState::Fired);
    t.disarm();
    assert_eq!(t.state(), TimerState::Fired);

    run_out_the_clock().await;
    assert!(rx.try_recv().is_err(), "fired timer never counts again");
}

#[tokio::test(start_paused = true)]
async fn test_delivery_without_confirmation_does_not_transition() {
    let (mut t, mut rx) = timer();
    t.arm();
    run_out_the_clock().await;
    assert!(rx.try_recv().is_ok());
    // Token delivered, but until fire() the state is still Armed.
    assert_eq!(t.state(), TimerState::Armed);
}
