//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Stress tests for concurrent broker operations and edge cases.

mod common;

use common::{Add, Body, Echo, Envelope, Import, connected_pair, serve_all};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_callers() {
    let (client, server) = connected_pair(1024);
    serve_all(&server);

    let ctx = CancellationToken::new();
    server.start(ctx.clone()).unwrap();
    client.start(ctx.clone()).unwrap();

    // Spawn 10 tasks, each making 50 calls
    let mut handles = vec![];
    for task_id in 0..10i64 {
        let client = client.clone();
        let token = ctx.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..50i64 {
                let id = format!("task{}-call{}", task_id, i);
                let reply = client
                    .send(&token, Envelope::new(&id, Body::Add(Add { a: task_id, b: i })))
                    .await
                    .unwrap_or_else(|e| panic!("call {} failed: {}", id, e));
                assert_eq!(reply.request_id, id);
                assert_eq!(reply.sum(), Some(task_id + i));
            }
        }));
    }

    for handle in handles {
        timeout(Duration::from_secs(30), handle)
            .await
            .expect("callers timed out")
            .expect("Task panicked");
    }

    assert_eq!(client.metrics().total_requests_sent(), 500);
    assert_eq!(server.metrics().total_handlers_invoked(), 500);
    assert_eq!(client.pending_count(), 0);
    ctx.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_progress_streams_stay_separate() {
    let (client, server) = connected_pair(1024);
    serve_all(&server);

    let ctx = CancellationToken::new();
    server.start(ctx.clone()).unwrap();
    client.start(ctx.clone()).unwrap();

    let mut handles = vec![];
    for task_id in 0..20u32 {
        let client = client.clone();
        let token = ctx.clone();
        handles.push(tokio::spawn(async move {
            let steps = task_id % 5 + 1;
            let mut updates = Vec::new();
            let reply = client
                .send_with_progress(
                    &token,
                    Envelope::new(&format!("import-{}", task_id), Body::Import(Import { steps })),
                    |text| updates.push(text.to_string()),
                )
                .await
                .expect("import failed");

            let expected: Vec<String> = (1..=steps)
                .map(|step| format!("step {}/{}", step, steps))
                .collect();
            assert_eq!(updates, expected);
            assert_eq!(reply.text(), Some("imported"));
        }));
    }

    for handle in handles {
        timeout(Duration::from_secs(30), handle)
            .await
            .expect("imports timed out")
            .expect("Task panicked");
    }
    ctx.cancel();
}

#[tokio::test]
async fn test_cancellation_storm_leaves_registry_empty() {
    // The server has no handlers, so nothing is ever answered.
    let (client, server) = connected_pair(1024);

    let ctx = CancellationToken::new();
    server.start(ctx.clone()).unwrap();
    client.start(ctx.clone()).unwrap();

    let callers = CancellationToken::new();
    let mut handles = vec![];
    for i in 0..100 {
        let client = client.clone();
        let token = callers.child_token();
        handles.push(tokio::spawn(async move {
            client
                .send(&token, Envelope::new(&format!("c{}", i), Body::Echo(Echo("x".into()))))
                .await
        }));
    }

    timeout(Duration::from_secs(5), async {
        while client.pending_count() < 100 {
            sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("callers never registered");

    callers.cancel();

    for handle in handles {
        let err = handle.await.expect("Task panicked").unwrap_err();
        assert!(err.is_cancelled());
    }
    assert_eq!(client.pending_count(), 0);
    assert!(client.is_running());
    ctx.cancel();
}

#[tokio::test]
async fn test_repeated_close_under_load() {
    let (client, server) = connected_pair(256);
    serve_all(&server);

    let ctx = CancellationToken::new();
    server.start(ctx.clone()).unwrap();
    client.start(ctx.clone()).unwrap();

    let mut handles = vec![];
    for i in 0..50i64 {
        let client = client.clone();
        let token = ctx.clone();
        handles.push(tokio::spawn(async move {
            client
                .send(&token, Envelope::new(&format!("r{}", i), Body::Add(Add { a: i, b: 0 })))
                .await
        }));
    }

    let closers: Vec<_> = (0..5)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.close() })
        })
        .collect();
    for closer in closers {
        closer.await.expect("Task panicked");
    }

    // Every call either completed before the close or was released by it.
    for handle in handles {
        match timeout(Duration::from_secs(5), handle)
            .await
            .expect("call hung after close")
            .expect("Task panicked")
        {
            Ok(reply) => assert!(reply.sum().is_some()),
            Err(e) => assert!(e.is_closed(), "unexpected error: {}", e),
        }
    }
    assert_eq!(client.pending_count(), 0);
    ctx.cancel();
}
