// tests/saga_execution_tests.rs
mod common;

use common::*;
use sagaflow::{Saga, SagaError, SagaState};
use serial_test::serial;
use std::time::Duration;

fn saga_of(steps: Vec<RecordingStep>) -> Saga<TestContext, TestError> {
  steps.into_iter().fold(Saga::new(), |saga, step| saga.add_step(step))
}

#[tokio::test]
#[serial]
async fn test_saga_runs_steps_in_insertion_order() {
  setup_tracing();
  let mut saga = saga_of(vec![
    RecordingStep::ok("a"),
    RecordingStep::ok("b"),
    RecordingStep::ok("c"),
  ]);
  assert_eq!(saga.step_names(), vec!["a", "b", "c"]);
  assert_eq!(saga.state(), SagaState::NotStarted);

  let mut ctx = TestContext::default();
  let result = saga.execute(&mut ctx).await;

  assert!(result.is_ok());
  assert_eq!(ctx.executed(), vec!["a", "b", "c"]);
  assert!(ctx.compensated().is_empty(), "no compensation on success");
  assert_eq!(ctx.counter, 3);
  assert_eq!(saga.state(), SagaState::Succeeded);
}

#[tokio::test]
#[serial]
async fn test_first_failure_compensates_prior_steps_in_reverse() {
  setup_tracing();
  const N: usize = 5;

  for k in 1..=N {
    let names: Vec<String> = (1..=N).map(|i| format!("s{i}")).collect();
    let steps = names
      .iter()
      .enumerate()
      .map(|(i, name)| {
        if i + 1 == k {
          RecordingStep::failing(name)
        } else {
          RecordingStep::ok(name)
        }
      })
      .collect();
    let mut saga = saga_of(steps);
    let mut ctx = TestContext::default();

    let err = saga.execute(&mut ctx).await.unwrap_err();

    assert_eq!(err, TestError::Step(format!("s{k}")), "k = {k}");
    let expected_executed: Vec<&str> = names[..k].iter().map(String::as_str).collect();
    assert_eq!(ctx.executed(), expected_executed, "steps after s{k} never run");
    let expected_compensated: Vec<&str> = names[..k - 1].iter().rev().map(String::as_str).collect();
    assert_eq!(ctx.compensated(), expected_compensated, "k = {k}");
    assert_eq!(ctx.counter, 0, "every successful step was undone exactly once");
    assert_eq!(saga.state(), SagaState::Failed);
  }
}

#[tokio::test]
#[serial]
async fn test_compensation_failure_does_not_stop_remaining_compensators() {
  setup_tracing();
  let mut saga = saga_of(vec![
    RecordingStep::ok("first"),
    RecordingStep::ok("second").with_failing_compensation(),
    RecordingStep::ok("third"),
    RecordingStep::failing("fourth"),
  ]);
  let mut ctx = TestContext::default();

  let err = saga.execute(&mut ctx).await.unwrap_err();

  // The run's error stays the original step failure.
  assert_eq!(err, TestError::Step("fourth".to_string()));
  assert_eq!(ctx.compensated(), vec!["third", "second", "first"]);
  assert_eq!(
    saga.compensation_failures(),
    &[SagaError::CompensationFailed {
      step_name: "second".to_string(),
      message: "Test compensation failed: second".to_string(),
    }]
  );
}

#[tokio::test]
#[serial]
async fn test_failing_first_step_compensates_nothing() {
  setup_tracing();
  let mut saga = saga_of(vec![RecordingStep::failing("only"), RecordingStep::ok("never")]);
  let mut ctx = TestContext::default();

  assert!(saga.execute(&mut ctx).await.is_err());
  assert_eq!(ctx.calls, vec!["execute:only"]);
  assert!(saga.compensation_failures().is_empty());
}

#[tokio::test(start_paused = true)]
#[serial]
async fn test_step_deadline_becomes_timeout_error_and_compensates() {
  setup_tracing();
  let mut saga = saga_of(vec![
    RecordingStep::ok("fast"),
    RecordingStep::ok("slow").slow(Duration::from_secs(30), Duration::from_secs(1)),
    RecordingStep::ok("after"),
  ]);
  let mut ctx = TestContext::default();

  let err = saga.execute(&mut ctx).await.unwrap_err();

  assert_eq!(
    err,
    TestError::Saga(SagaError::StepTimedOut {
      step_name: "slow".to_string(),
      timeout: Duration::from_secs(1),
    })
  );
  // The timed-out step did not succeed, so it is aborted and only "fast" is undone.
  assert_eq!(ctx.aborted(), vec!["slow"]);
  assert_eq!(ctx.compensated(), vec!["fast"]);
  assert_eq!(ctx.executed(), vec!["fast", "slow"]);
  assert_eq!(
    ctx.calls,
    vec!["execute:fast", "execute:slow", "abort:slow", "compensate:fast"]
  );
  assert!(saga.compensation_failures().is_empty());
}

#[tokio::test(start_paused = true)]
#[serial]
async fn test_failed_abort_is_recorded_and_rollback_continues() {
  setup_tracing();
  let mut saga = saga_of(vec![
    RecordingStep::ok("fast"),
    RecordingStep::ok("slow")
      .slow(Duration::from_secs(30), Duration::from_secs(1))
      .with_failing_abort(),
  ]);
  let mut ctx = TestContext::default();

  let err = saga.execute(&mut ctx).await.unwrap_err();

  assert!(matches!(err, TestError::Saga(SagaError::StepTimedOut { .. })), "{err:?}");
  assert_eq!(ctx.compensated(), vec!["fast"]);
  let failures = saga.compensation_failures();
  assert_eq!(failures.len(), 1);
  assert_eq!(failures[0].step_name(), "slow");
  assert_eq!(saga.state(), SagaState::Failed);
}

#[tokio::test]
#[serial]
async fn test_step_errors_do_not_trigger_abort() {
  setup_tracing();
  let mut saga = saga_of(vec![RecordingStep::ok("a"), RecordingStep::failing("b")]);
  let mut ctx = TestContext::default();

  assert!(saga.execute(&mut ctx).await.is_err());
  assert!(ctx.aborted().is_empty());
}

#[tokio::test]
#[serial]
async fn test_rerun_starts_from_scratch() {
  setup_tracing();
  let mut saga = saga_of(vec![RecordingStep::ok("a"), RecordingStep::failing("b")]);

  let mut first = TestContext::default();
  assert!(saga.execute(&mut first).await.is_err());
  assert_eq!(first.compensated(), vec!["a"]);

  // A second run must not compensate anything recorded by the first one.
  let mut second = TestContext::default();
  assert!(saga.execute(&mut second).await.is_err());
  assert_eq!(second.calls, vec!["execute:a", "execute:b", "compensate:a"]);
  assert_eq!(saga.state(), SagaState::Failed);
}

#[tokio::test]
#[serial]
async fn test_empty_saga_succeeds() {
  setup_tracing();
  let mut saga: Saga<TestContext, TestError> = Saga::default();
  let mut ctx = TestContext::default();

  assert!(saga.is_empty());
  assert!(saga.execute(&mut ctx).await.is_ok());
  assert_eq!(saga.state(), SagaState::Succeeded);
  assert!(saga.state().is_terminal());
}
