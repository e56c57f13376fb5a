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

use std::time::Duration;

use cellmesh::prelude::*;
use tokio::time::timeout;

use crate::setup::initialize_tracing;
mod setup;

#[tokio::test]
async fn notifier_observes_every_loop_transition() -> anyhow::Result<()> {
    initialize_tracing();

    let notifier = Notifier::new();
    let runner = Loop::builder(|done: CancellationToken| async move {
        done.cancelled().await;
        Ok(())
    })
    .notifier(notifier.clone())
    .build()?;

    // Build itself reaches Ready.
    timeout(Duration::from_secs(1), notifier.ready()).await?;

    runner.go()?;
    timeout(Duration::from_secs(1), notifier.working()).await?;

    runner.stop(None).await?;
    timeout(Duration::from_secs(1), notifier.stopping()).await?;
    timeout(Duration::from_secs(1), notifier.stopped()).await?;
    assert!(notifier.is_stopped());
    Ok(())
}

#[tokio::test]
async fn late_registration_does_not_replay_transitions() -> anyhow::Result<()> {
    initialize_tracing();

    let bundle = Bundle::new();
    bundle.notify(Status::Ready);

    let notifier = Notifier::new();
    bundle.register(notifier.clone());

    // Ready happened before registration and is never replayed.
    assert!(timeout(Duration::from_millis(50), notifier.ready())
        .await
        .is_err());

    bundle.notify(Status::Working);
    timeout(Duration::from_secs(1), notifier.working()).await?;
    Ok(())
}

#[tokio::test]
async fn external_token_stops_an_actor() -> anyhow::Result<()> {
    initialize_tracing();

    let trigger = CancellationToken::new();
    let notifier = Notifier::new();
    let actor = Actor::builder()
        .cancel_on(trigger.clone())
        .notifier(notifier.clone())
        .build()?;

    assert_eq!(actor.status(), Status::Working);
    trigger.cancel();
    timeout(Duration::from_secs(1), notifier.stopped()).await?;
    assert_eq!(actor.status(), Status::Stopped);
    assert!(actor.err().is_none());
    Ok(())
}

#[tokio::test]
async fn multiple_notifiers_all_observe_stop() -> anyhow::Result<()> {
    initialize_tracing();

    let first = Notifier::new();
    let second = Notifier::new();
    let actor = Actor::builder()
        .notifier(first.clone())
        .notifier(second.clone())
        .build()?;

    actor.stop(None).await?;
    timeout(Duration::from_secs(1), first.stopped()).await?;
    timeout(Duration::from_secs(1), second.stopped()).await?;
    Ok(())
}
