use crate::terminator::kill_targets;
use crate::{SignalTerminator, SupervisedProcess, Terminator};

use std::net::TcpListener;
use std::time::Duration;

use tokio::process::Command;
use wd_config::Binding;

fn free_binding() -> Binding {
    let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let port = listener.local_addr().unwrap().port();
    Binding::new("127.0.0.1", port)
}

async fn reaped(binding: Binding) -> SupervisedProcess {
    let child = Command::new("true").spawn().unwrap();
    let mut process = SupervisedProcess::spawned(binding, child, 1);
    for _ in 0..50 {
        if !process.is_running() {
            return process;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("`true` did not exit");
}

#[tokio::test]
async fn given_running_child_when_kill_targets_then_pid_is_signalled() {
    // Given
    let child = Command::new("sleep").arg("30").spawn().unwrap();
    let mut process = SupervisedProcess::spawned(free_binding(), child, 1);
    let pid = process.pid().unwrap() as i32;

    // When
    let targets = kill_targets(&process);

    // Then
    assert!(targets.iter().any(|(target, _)| target.as_raw() == pid));
    process.start_kill();
}

#[tokio::test]
async fn given_reaped_child_when_checked_again_then_not_running() {
    // Given
    let mut process = reaped(free_binding()).await;

    // When
    let running = process.is_running();

    // Then
    assert!(process.has_exited());
    assert!(!running);
    assert!(process.pid().is_some());
}

#[tokio::test]
async fn given_reaped_child_when_kill_targets_then_nothing_is_signalled() {
    // Given
    let process = reaped(free_binding()).await;

    // When
    let targets = kill_targets(&process);

    // Then
    assert!(targets.is_empty(), "targets: {targets:?}");
}

#[tokio::test]
async fn given_reaped_child_when_terminate_then_confirmed_without_signals() {
    // Given
    let binding = free_binding();
    let mut process = reaped(binding.clone()).await;
    let terminator = SignalTerminator::new(None, Duration::from_secs(2));

    // When
    let result = terminator.terminate(&binding, Some(&mut process)).await;

    // Then
    assert!(result.is_ok());
    assert!(!process.is_running());
}
