//! Retry Demo
//!
//! Drives the standard pipeline against a flaky in-memory transport and
//! prints the retry events as they happen.
//!
//! Run with: cargo run --example retry_demo

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use retryline::config::{PipelineOptions, RetryOptions};
use retryline::retry::{AttemptOutcome, RetryPolicy};
use retryline::{
    transport_fn, Pipeline, Request, Response, StatusCode, TransportError, TransportErrorKind,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let transport = transport_fn(move |_request: Request| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            match n {
                0 => Err(TransportError::new(
                    TransportErrorKind::ConnectionReset,
                    "socket hang up",
                )),
                1 => Ok(Response::new(StatusCode::TOO_MANY_REQUESTS)
                    .with_header("retry-after-ms", 300u64)),
                2 => Ok(Response::new(StatusCode::SERVICE_UNAVAILABLE)),
                _ => Ok(Response::new(StatusCode::OK).with_body("hello")),
            }
        }
    });

    let options = PipelineOptions {
        retry: RetryOptions {
            retry_delay_in_ms: 200,
            ..RetryOptions::default()
        },
        ..PipelineOptions::default()
    };

    let policy = RetryPolicy::from_options(&options.retry).on_retry(|event| {
        let outcome = match event.outcome {
            AttemptOutcome::Status(status) => format!("status {status}"),
            AttemptOutcome::Failure(err) => err.to_string(),
        };
        println!(
            "attempt {} of {} {} -> {}, next delay {:?}",
            event.attempt, event.method, event.url, outcome, event.next_delay
        );
    });

    let pipeline = match Pipeline::from_options(transport, &options).and_then(|pipeline| {
        pipeline
            .to_builder()
            .replace(RetryPolicy::NAME, policy)
            .build()
    }) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            eprintln!("invalid pipeline: {err}");
            return;
        }
    };

    match pipeline.send(Request::get("https://example.com/greeting")).await {
        Ok(response) => println!(
            "status {} after {} calls: {}",
            response.status(),
            calls.load(Ordering::SeqCst),
            String::from_utf8_lossy(response.body())
        ),
        Err(err) => println!("failed: {err}"),
    }
}
