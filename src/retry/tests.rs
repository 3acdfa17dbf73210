//! Executor behavior, driven through a pipeline over a scripted transport.

use super::*;
use crate::config::RetryOptions;
use crate::error::{PipelineError, TransportErrorKind};
use crate::pipeline::{ClientRequestId, DEFAULT_REQUEST_ID_HEADER, OPERATION_ABORTED};
use crate::request::Request;
use crate::response::Response;
use crate::testing::{CountingTimer, ScriptStep, ScriptedTransport};
use crate::{assert_budget_exceeded, assert_cancelled, Pipeline};
use http::StatusCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

fn no_jitter() -> RetryOptions {
    RetryOptions {
        jitter: 0.0,
        ..RetryOptions::default()
    }
}

fn pipeline_with(transport: &Arc<ScriptedTransport>, policy: RetryPolicy) -> Pipeline {
    Pipeline::builder(Arc::clone(transport))
        .with(RetryPolicy::NAME, policy)
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_persistent_503_exhausts_budget() {
    let transport = Arc::new(ScriptedTransport::always(ScriptStep::status(StatusCode::SERVICE_UNAVAILABLE)));
    let pipeline = pipeline_with(&transport, RetryPolicy::from_options(&no_jitter()));

    let result = pipeline.send(Request::get("https://example.com")).await;

    assert_eq!(transport.attempts(), 4);
    match result {
        Err(PipelineError::RetryBudgetExceeded { attempts, cause }) => {
            assert_eq!(attempts, 4);
            assert!(matches!(
                *cause,
                PipelineError::RetryableStatus { status } if status == 503
            ));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_backoff_doubles_between_attempts() {
    let transport = Arc::new(ScriptedTransport::always(ScriptStep::status(StatusCode::INTERNAL_SERVER_ERROR)));
    let timer = Arc::new(CountingTimer::new());
    let policy = RetryPolicy::from_options(&no_jitter()).with_timer(Arc::clone(&timer));
    let pipeline = pipeline_with(&transport, policy);

    let _ = pipeline.send(Request::get("https://example.com")).await;

    assert_eq!(
        timer.durations(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );
    let at: Vec<Instant> = transport.recorded().iter().map(|a| a.at).collect();
    assert!(at[1] - at[0] >= Duration::from_secs(1));
    assert!(at[3] - at[2] >= Duration::from_secs(4));
    assert!(at[3] - at[2] < Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_transient_failures() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        ScriptStep::status(StatusCode::INTERNAL_SERVER_ERROR),
        ScriptStep::Fail(TransportErrorKind::ConnectionReset),
        ScriptStep::ok(),
    ]));
    let pipeline = pipeline_with(&transport, RetryPolicy::from_options(&no_jitter()));

    let response = pipeline.send(Request::get("https://example.com")).await.unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(transport.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_status_returned_unchanged() {
    let transport = Arc::new(ScriptedTransport::always(ScriptStep::Respond(
        Response::new(StatusCode::NOT_FOUND).with_body("missing"),
    )));
    let pipeline = pipeline_with(&transport, RetryPolicy::default());

    let response = pipeline.send(Request::get("https://example.com")).await.unwrap();

    assert_eq!(response.status(), 404);
    assert_eq!(response.body(), b"missing");
    assert_eq!(transport.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_non_system_transport_error_propagates() {
    let transport = Arc::new(ScriptedTransport::always(ScriptStep::Fail(
        TransportErrorKind::Other,
    )));
    let pipeline = pipeline_with(&transport, RetryPolicy::default());

    let err = pipeline
        .send(Request::get("https://example.com"))
        .await
        .unwrap_err();

    assert_eq!(err.transport_kind(), Some(TransportErrorKind::Other));
    assert_eq!(transport.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transport_budget_keeps_last_error_as_cause() {
    let transport = Arc::new(ScriptedTransport::always(ScriptStep::Fail(
        TransportErrorKind::Dns,
    )));
    let options = RetryOptions {
        max_retries: 1,
        ..no_jitter()
    };
    let pipeline = pipeline_with(&transport, RetryPolicy::system_errors(&options));

    let err = pipeline
        .send(Request::get("https://example.com"))
        .await
        .unwrap_err();

    match err {
        PipelineError::RetryBudgetExceeded { attempts, cause } => {
            assert_eq!(attempts, 2);
            assert_eq!(cause.transport_kind(), Some(TransportErrorKind::Dns));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_throttled_retry_waits_server_delay() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        ScriptStep::throttled(2),
        ScriptStep::ok(),
    ]));
    let pipeline = pipeline_with(&transport, RetryPolicy::default());

    let start = Instant::now();
    let response = pipeline.send(Request::get("https://example.com")).await.unwrap();

    assert_eq!(response.status(), 200);
    assert!(start.elapsed() >= Duration::from_secs(2));
    let recorded = transport.recorded();
    assert!(recorded[1].at - recorded[0].at < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_throttling_wins_over_exponential() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        ScriptStep::Respond(
            Response::new(StatusCode::TOO_MANY_REQUESTS).with_header("retry-after-ms", 1500u64),
        ),
        ScriptStep::ok(),
    ]));
    let timer = Arc::new(CountingTimer::new());
    let policy = RetryPolicy::default().with_timer(Arc::clone(&timer));
    let pipeline = pipeline_with(&transport, policy);

    pipeline.send(Request::get("https://example.com")).await.unwrap();

    assert_eq!(timer.durations(), vec![Duration::from_millis(1500)]);
}

#[tokio::test(start_paused = true)]
async fn test_429_without_hint_falls_back_to_backoff() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        ScriptStep::status(StatusCode::TOO_MANY_REQUESTS),
        ScriptStep::ok(),
    ]));
    let timer = Arc::new(CountingTimer::new());
    let policy = RetryPolicy::from_options(&no_jitter()).with_timer(Arc::clone(&timer));
    let pipeline = pipeline_with(&transport, policy);

    pipeline.send(Request::get("https://example.com")).await.unwrap();

    assert_eq!(timer.durations(), vec![Duration::from_secs(1)]);
}

#[tokio::test(start_paused = true)]
async fn test_executor_caps_delays() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        ScriptStep::throttled(600),
        ScriptStep::ok(),
    ]));
    let timer = Arc::new(CountingTimer::new());
    let policy = RetryPolicy::throttling()
        .with_max_delay(Duration::from_secs(10))
        .with_timer(Arc::clone(&timer));
    let pipeline = pipeline_with(&transport, policy);

    pipeline.send(Request::get("https://example.com")).await.unwrap();

    assert_eq!(timer.durations(), vec![Duration::from_secs(10)]);
}

#[tokio::test(start_paused = true)]
async fn test_configured_ceilings_above_default_are_honored() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        ScriptStep::throttled(240),
        ScriptStep::ok(),
    ]));
    let timer = Arc::new(CountingTimer::new());
    let policy = RetryPolicy::from_options(&RetryOptions {
        max_throttle_delay_in_ms: 300_000,
        max_retry_delay_in_ms: 300_000,
        ..no_jitter()
    })
    .with_timer(Arc::clone(&timer));
    let pipeline = pipeline_with(&transport, policy);

    pipeline.send(Request::get("https://example.com")).await.unwrap();

    assert_eq!(timer.durations(), vec![Duration::from_secs(240)]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff_stops_retrying() {
    let transport = Arc::new(ScriptedTransport::always(ScriptStep::status(StatusCode::SERVICE_UNAVAILABLE)));
    let pipeline = pipeline_with(&transport, RetryPolicy::from_options(&no_jitter()));

    let request = Request::get("https://example.com");
    let token = request.cancellation().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        token.cancel();
    });

    let start = Instant::now();
    let result = pipeline.send(request).await;

    let err = result.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.to_string(), OPERATION_ABORTED);
    assert_eq!(transport.attempts(), 1);
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_attempt_is_not_retried() {
    let transport = Arc::new(ScriptedTransport::always(ScriptStep::Hang));
    let pipeline = pipeline_with(&transport, RetryPolicy::default());

    let request = Request::get("https://example.com");
    let token = request.cancellation().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    assert_cancelled!(pipeline.send(request).await);
    assert_eq!(transport.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_timeout_is_retried() {
    let transport = Arc::new(ScriptedTransport::new(vec![ScriptStep::Hang, ScriptStep::ok()]));
    let pipeline = pipeline_with(&transport, RetryPolicy::from_options(&no_jitter()));

    let response = pipeline
        .send(Request::get("https://example.com").with_timeout(Duration::from_secs(5)))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(transport.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_request_id_stable_across_attempts() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        ScriptStep::status(StatusCode::SERVICE_UNAVAILABLE),
        ScriptStep::status(StatusCode::SERVICE_UNAVAILABLE),
        ScriptStep::ok(),
    ]));
    let pipeline = Pipeline::builder(Arc::clone(&transport))
        .with(ClientRequestId::NAME, ClientRequestId::new())
        .with(RetryPolicy::NAME, RetryPolicy::from_options(&no_jitter()))
        .build()
        .unwrap();

    let request = Request::get("https://example.com");
    let id = request.request_id();
    pipeline.send(request).await.unwrap();

    let recorded = transport.recorded();
    assert_eq!(recorded.len(), 3);
    for attempt in &recorded {
        assert_eq!(attempt.request_id, id);
        assert_eq!(
            attempt.headers.get(DEFAULT_REQUEST_ID_HEADER),
            Some(id.to_string().as_str())
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_hook_sees_every_retry_and_the_give_up() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let policy = RetryPolicy::from_options(&RetryOptions {
        max_retries: 2,
        ..no_jitter()
    })
    .on_retry(move |event| {
        let status = match event.outcome {
            AttemptOutcome::Status(status) => status.as_u16(),
            AttemptOutcome::Failure(_) => 0,
        };
        sink.lock()
            .unwrap()
            .push((event.attempt, status, event.next_delay));
    });

    let transport = Arc::new(ScriptedTransport::always(ScriptStep::status(StatusCode::BAD_GATEWAY)));
    let pipeline = pipeline_with(&transport, policy);

    assert_budget_exceeded!(pipeline.send(Request::get("https://example.com")).await, 3);

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            (1, 502, Some(Duration::from_secs(1))),
            (2, 502, Some(Duration::from_secs(2))),
            (3, 502, None),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_zero_retries_means_single_attempt() {
    let transport = Arc::new(ScriptedTransport::always(ScriptStep::status(StatusCode::SERVICE_UNAVAILABLE)));
    let policy = RetryPolicy::from_options(&RetryOptions {
        max_retries: 0,
        ..no_jitter()
    });
    let pipeline = pipeline_with(&transport, policy);

    assert_budget_exceeded!(pipeline.send(Request::get("https://example.com")).await, 1);
    assert_eq!(transport.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_executor_budget_bounds_throttling() {
    let transport = Arc::new(ScriptedTransport::always(ScriptStep::throttled(1)));
    let pipeline = pipeline_with(&transport, RetryPolicy::throttling().with_max_retries(2));

    assert_budget_exceeded!(pipeline.send(Request::get("https://example.com")).await, 3);
    assert_eq!(transport.attempts(), 3);
}

#[tokio::test]
async fn test_empty_strategy_list_never_retries() {
    let transport = Arc::new(ScriptedTransport::always(ScriptStep::status(StatusCode::SERVICE_UNAVAILABLE)));
    let pipeline = pipeline_with(&transport, RetryPolicy::new(Vec::new()));

    let response = pipeline.send(Request::get("https://example.com")).await.unwrap();
    assert_eq!(response.status(), 503);
    assert_eq!(transport.attempts(), 1);
}
