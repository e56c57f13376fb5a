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
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use cellmesh::prelude::*;
use tokio::time::sleep;

use crate::setup::initialize_tracing;
mod setup;

#[tokio::test]
async fn actions_run_serialized_and_in_order() -> anyhow::Result<()> {
    initialize_tracing();

    let actor = Actor::builder().capacity(16).build()?;
    let order = Arc::new(Mutex::new(Vec::new()));
    for n in 0..1000u32 {
        let order = order.clone();
        actor
            .do_async(move || async move {
                order.lock().unwrap().push(n);
                Ok(())
            })
            .await?;
    }
    // A sync barrier action: once it ran, everything before it has too.
    actor.do_sync(|| async move { Ok(()) }).await?;

    let seen = order.lock().unwrap().clone();
    assert_eq!(seen, (0..1000).collect::<Vec<_>>());
    actor.stop(None).await?;
    Ok(())
}

#[tokio::test]
async fn do_sync_waits_for_the_action_result() -> anyhow::Result<()> {
    initialize_tracing();

    let actor = Actor::builder().build()?;
    let ran = Arc::new(AtomicU32::new(0));
    let counter = ran.clone();
    actor
        .do_sync(move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await?;
    assert_eq!(ran.load(Ordering::SeqCst), 1);

    // Action errors surface on the waiting caller.
    let result = actor
        .do_sync(|| async move { Err(anyhow!("action failed")) })
        .await;
    match result {
        Err(err) => assert!(err.to_string().contains("action failed")),
        Ok(()) => panic!("action error was dropped"),
    }
    Ok(())
}

#[tokio::test]
async fn do_sync_timeout_abandons_the_wait_not_the_action() -> anyhow::Result<()> {
    initialize_tracing();

    let actor = Actor::builder().capacity(4).build()?;
    let ran = Arc::new(AtomicU32::new(0));
    let counter = ran.clone();
    let result = actor
        .do_sync_timeout(Duration::from_millis(50), move || async move {
            sleep(Duration::from_millis(200)).await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;
    assert!(matches!(result, Err(Error::Timeout(_))));

    // The abandoned action still runs to completion behind the timeout.
    sleep(Duration::from_millis(300)).await;
    assert_eq!(ran.load(Ordering::SeqCst), 1);

    // And the actor keeps serving afterwards.
    actor.do_sync(|| async move { Ok(()) }).await?;
    actor.stop(None).await?;
    Ok(())
}

#[tokio::test]
async fn action_error_is_terminal_and_fails_fast() -> anyhow::Result<()> {
    initialize_tracing();

    let actor = Actor::builder().build()?;
    let _ = actor
        .do_sync(|| async move { Err(anyhow!("fatal action")) })
        .await;
    actor.stopped().await;

    let err = actor.err().ok_or_else(|| anyhow!("terminal error missing"))?;
    assert!(err.to_string().contains("fatal action"));

    // Later submissions are refused with the same error, without running.
    let result = actor.do_async(|| async move { Ok(()) }).await;
    match result {
        Err(err) => assert!(err.to_string().contains("fatal action")),
        Ok(()) => panic!("submission after terminal error succeeded"),
    }
    Ok(())
}

#[tokio::test]
async fn recovered_panic_keeps_the_actor_serving() -> anyhow::Result<()> {
    initialize_tracing();

    let recovered = Arc::new(AtomicU32::new(0));
    let counter = recovered.clone();
    let actor = Actor::builder()
        .recoverer(move |reason| {
            let recovered = counter.clone();
            async move {
                assert!(reason.contains("bad action"));
                recovered.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .build()?;

    actor
        .do_async(|| async move {
            panic!("bad action");
        })
        .await?;
    sleep(Duration::from_millis(50)).await;
    assert_eq!(recovered.load(Ordering::SeqCst), 1);

    // The panicking action was dropped; the mailbox still works.
    actor.do_sync(|| async move { Ok(()) }).await?;
    actor.stop(None).await?;
    Ok(())
}

#[tokio::test]
async fn escalating_recoverer_terminates_the_actor() -> anyhow::Result<()> {
    initialize_tracing();

    let actor = Actor::builder()
        .recoverer(|_reason| async move { Err(anyhow!("not recoverable")) })
        .build()?;

    actor
        .do_async(|| async move {
            panic!("bad action");
        })
        .await?;
    actor.stopped().await;
    assert_eq!(actor.status(), Status::Stopped);
    let err = actor.err().ok_or_else(|| anyhow!("terminal error missing"))?;
    assert!(err.to_string().contains("not recoverable"));
    Ok(())
}

#[tokio::test]
async fn zero_capacity_is_rejected() {
    initialize_tracing();
    assert!(matches!(
        Actor::builder().capacity(0).build(),
        Err(Error::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn stopped_actor_refuses_submissions() -> anyhow::Result<()> {
    initialize_tracing();

    let actor = Actor::builder().build()?;
    actor.stop(None).await?;
    assert!(matches!(
        actor.do_async(|| async move { Ok(()) }).await,
        Err(Error::NotWorking)
    ));
    Ok(())
}
