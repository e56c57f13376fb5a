/*
 * Copyright (c) 2025. The Cellmesh Authors
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use cellmesh::prelude::*;
use tokio::time::{sleep, timeout};

use crate::setup::initialize_tracing;
mod setup;

#[tokio::test]
async fn loop_runs_until_stopped() -> anyhow::Result<()> {
    initialize_tracing();

    let ticks = Arc::new(AtomicU32::new(0));
    let counter = ticks.clone();
    let runner = Loop::builder(move |done: CancellationToken| {
        let ticks = counter.clone();
        async move {
            loop {
                tokio::select! {
                    _ = done.cancelled() => return Ok(()),
                    _ = sleep(Duration::from_millis(5)) => {
                        ticks.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
        }
    })
    .build()?;

    assert_eq!(runner.status(), Status::Ready);
    runner.go()?;
    assert_eq!(runner.status(), Status::Working);

    sleep(Duration::from_millis(60)).await;
    runner.stop(None).await?;
    assert_eq!(runner.status(), Status::Stopped);
    assert!(runner.err().is_none());
    assert!(ticks.load(Ordering::SeqCst) > 0);
    Ok(())
}

#[tokio::test]
async fn stop_before_go_is_refused() -> anyhow::Result<()> {
    initialize_tracing();

    let runner = Loop::builder(|done: CancellationToken| async move {
        done.cancelled().await;
        Ok(())
    })
    .build()?;

    assert!(matches!(runner.stop(None).await, Err(Error::NotWorking)));
    assert_eq!(runner.status(), Status::Ready);
    Ok(())
}

#[tokio::test]
async fn go_is_one_shot() -> anyhow::Result<()> {
    initialize_tracing();

    let runner = Loop::builder(|done: CancellationToken| async move {
        done.cancelled().await;
        Ok(())
    })
    .build()?;

    runner.go()?;
    assert!(matches!(runner.go(), Err(Error::NotReady(Status::Working))));
    runner.stop(None).await?;
    assert!(matches!(runner.go(), Err(Error::NotReady(Status::Stopped))));
    Ok(())
}

#[tokio::test]
async fn zero_stop_timeout_is_rejected() {
    initialize_tracing();

    let result = Loop::builder(|_done: CancellationToken| async move { Ok(()) })
        .stop_timeout(Duration::ZERO)
        .build();
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[tokio::test]
async fn worker_error_becomes_terminal() -> anyhow::Result<()> {
    initialize_tracing();

    let runner = Loop::builder(|_done: CancellationToken| async move {
        Err(Error::action(anyhow!("worker failed")))
    })
    .build()?;

    let result = runner.work().await;
    assert!(result.is_err());
    let err = runner.err().ok_or_else(|| anyhow!("terminal error missing"))?;
    assert!(err.to_string().contains("worker failed"));
    assert_eq!(runner.status(), Status::Stopped);

    // Stopping after termination reports the stored error, repeatedly.
    assert!(runner.stop(None).await.is_err());
    assert!(runner.stop(None).await.is_err());
    Ok(())
}

#[tokio::test]
async fn finalizer_rewrites_the_result() -> anyhow::Result<()> {
    initialize_tracing();

    let runner = Loop::builder(|_done: CancellationToken| async move { Ok(()) })
        .finalizer(|result| result.and_then(|_| Err(Error::action(anyhow!("cleanup failed")))))
        .build()?;

    let result = runner.work().await;
    match result {
        Err(err) => assert!(err.to_string().contains("cleanup failed")),
        Ok(()) => panic!("finalizer error was dropped"),
    }
    Ok(())
}

#[tokio::test]
async fn external_token_terminates_the_loop() -> anyhow::Result<()> {
    initialize_tracing();

    let trigger = CancellationToken::new();
    let runner = Loop::builder(|done: CancellationToken| async move {
        done.cancelled().await;
        Ok(())
    })
    .cancel_on(trigger.clone())
    .build()?;

    runner.go()?;
    trigger.cancel();
    timeout(Duration::from_secs(1), runner.stopped()).await?;
    assert_eq!(runner.status(), Status::Stopped);
    assert!(runner.err().is_none());
    Ok(())
}

#[tokio::test]
async fn recovered_panic_reinvokes_the_worker() -> anyhow::Result<()> {
    initialize_tracing();

    let attempts = Arc::new(AtomicU32::new(0));
    let counter = attempts.clone();
    let runner = Loop::builder(move |done: CancellationToken| {
        let attempts = counter.clone();
        async move {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first attempt");
            }
            done.cancelled().await;
            Ok(())
        }
    })
    .recoverer(|reason: String| async move {
        assert!(reason.contains("first attempt"));
        Ok(())
    })
    .build()?;

    runner.go()?;
    sleep(Duration::from_millis(50)).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    runner.stop(None).await?;
    assert!(runner.err().is_none());
    Ok(())
}

#[tokio::test]
async fn unrecovered_panic_terminates_with_its_reason() -> anyhow::Result<()> {
    initialize_tracing();

    let runner = Loop::builder(|_done: CancellationToken| async move {
        panic!("no way back");
    })
    .build()?;

    match runner.work().await {
        Err(Error::Panicked(reason)) => assert!(reason.contains("no way back")),
        other => panic!("expected panic termination, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn escalating_recoverer_terminates_the_loop() -> anyhow::Result<()> {
    initialize_tracing();

    let runner = Loop::builder(|_done: CancellationToken| async move {
        panic!("boom");
    })
    .recoverer(|_reason: String| async move { Err(anyhow!("giving up")) })
    .build()?;

    match runner.work().await {
        Err(err) => assert!(err.to_string().contains("giving up")),
        Ok(()) => panic!("escalation was dropped"),
    }
    Ok(())
}

#[tokio::test]
async fn token_deaf_worker_hits_the_stop_timeout() -> anyhow::Result<()> {
    initialize_tracing();

    let runner = Loop::builder(|_done: CancellationToken| async move {
        futures::future::pending::<()>().await;
        Ok(())
    })
    .stop_timeout(Duration::from_millis(100))
    .build()?;
    runner.go()?;

    match runner.stop(None).await {
        Err(Error::StopTimeout(_)) => {}
        other => panic!("expected a stop timeout, got {other:?}"),
    }
    // The overrun is the loop's terminal error, not just stop's return.
    assert!(matches!(runner.err(), Some(Error::StopTimeout(_))));
    Ok(())
}
