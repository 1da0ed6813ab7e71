use crate::config::DispatchConfig;
use crate::ports::{PushSender, SendFailure, TimeProvider};
use crate::store::{Store, StoreError};
use crate::types::push::PushPayload;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DispatchSummary {
    /// Notifications claimed by this run.
    pub(crate) processed: usize,
    /// Successful sends across all subscriptions.
    pub(crate) sent: usize,
    /// Notifications marked terminally failed.
    pub(crate) failed: usize,
    /// Notifications released back to pending for a later run.
    pub(crate) deferred: usize,
}

/// One dispatch pass: claim the due batch, fan each notification out to the
/// recipient's devices sequentially, prune dead endpoints, and settle the
/// row's status. Per-subscription delivery errors never abort the pass.
pub(crate) async fn run_dispatch<T, S>(
    time: &T,
    sender: &S,
    store: &Store,
    config: &DispatchConfig,
) -> Result<DispatchSummary, StoreError>
where
    T: TimeProvider,
    S: PushSender,
{
    let now = time.now();
    let due = store.claim_due(now, config.batch_size)?;
    let mut summary = DispatchSummary::default();

    for notification in due {
        summary.processed += 1;

        let subscriptions = store.subscriptions_for(&notification.user);
        if subscriptions.is_empty() {
            // The user may still register a device; keep the row
            // re-selectable until the retry window has lapsed.
            if now - notification.fire_at > config.retry_window {
                store.mark_failed(notification.id)?;
                summary.failed += 1;
                eprintln!(
                    "push dispatch: giving up on notification {} for '{}': no subscriptions",
                    notification.id, notification.user
                );
            } else {
                store.release_notification(notification.id)?;
                summary.deferred += 1;
            }
            continue;
        }

        let payload = PushPayload {
            title: notification.title.clone(),
            body: notification.body.clone(),
        };
        for subscription in &subscriptions {
            match sender.send(subscription, &payload).await {
                Ok(()) => summary.sent += 1,
                Err(err) if err.endpoint_gone() => {
                    store.delete_subscription(&subscription.endpoint)?;
                    eprintln!(
                        "push dispatch: pruned dead endpoint {} (user {})",
                        subscription.endpoint, notification.user
                    );
                }
                Err(err) => {
                    eprintln!(
                        "push delivery error: {} (user {}, notification {})",
                        err, notification.user, notification.id
                    );
                }
            }
        }

        // Settled even when individual sends failed; the next tick must not
        // re-deliver to the devices that did receive it.
        store.mark_sent(notification.id, time.now())?;
    }

    Ok(summary)
}

#[cfg(test)]
#[allow(non_snake_case)]
pub(crate) mod tests {
    use super::*;
    use crate::ports;
    use crate::types::push::{NotificationStatus, Subscription};

    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use time::OffsetDateTime;
    use time::format_description::well_known::Rfc3339;

    #[derive(Clone)]
    pub(crate) struct TestTime {
        pub(crate) now: OffsetDateTime,
    }

    impl ports::TimeProvider for TestTime {
        type Sleep<'a>
            = std::future::Ready<()>
        where
            Self: 'a;

        fn now(&self) -> OffsetDateTime {
            self.now
        }

        fn sleep<'a>(&'a self, _duration: Duration) -> Self::Sleep<'a> {
            std::future::ready(())
        }
    }

    #[derive(Debug)]
    pub(crate) struct TestSendError {
        gone: bool,
    }

    impl std::fmt::Display for TestSendError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("test send error")
        }
    }

    impl ports::SendFailure for TestSendError {
        fn endpoint_gone(&self) -> bool {
            self.gone
        }
    }

    #[derive(Clone, Default)]
    pub(crate) struct TestSender {
        sent: Arc<Mutex<Vec<(String, String)>>>,
        failures: Arc<Mutex<HashMap<String, bool>>>,
    }

    impl TestSender {
        pub(crate) fn fail_endpoint(&self, endpoint: &str, gone: bool) {
            self.failures
                .lock()
                .expect("failures lock")
                .insert(endpoint.to_string(), gone);
        }

        pub(crate) fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().expect("sent lock").clone()
        }
    }

    impl ports::PushSender for TestSender {
        type Error = TestSendError;
        type Fut<'a>
            = std::future::Ready<Result<(), TestSendError>>
        where
            Self: 'a;

        fn send<'a>(
            &'a self,
            subscription: &'a Subscription,
            payload: &'a PushPayload,
        ) -> Self::Fut<'a> {
            if let Some(gone) = self
                .failures
                .lock()
                .expect("failures lock")
                .get(&subscription.endpoint)
            {
                return std::future::ready(Err(TestSendError { gone: *gone }));
            }
            self.sent
                .lock()
                .expect("sent lock")
                .push((subscription.endpoint.clone(), payload.title.clone()));
            std::future::ready(Ok(()))
        }
    }

    pub(crate) fn create_temp_store(test_name: &str) -> (PathBuf, Store) {
        let mut dir = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        dir.push(format!("byb-dispatch-{}-{}", test_name, nanos));
        let store = Store::open(&dir).expect("open store");
        (dir, store)
    }

    pub(crate) fn parse_now() -> OffsetDateTime {
        OffsetDateTime::parse("2025-01-12T09:30:00Z", &Rfc3339).expect("parse now")
    }

    pub(crate) fn subscription(user: &str, endpoint: &str) -> Subscription {
        Subscription {
            user: user.to_string(),
            endpoint: endpoint.to_string(),
            p256dh: "p256".to_string(),
            auth: "auth".to_string(),
            tz: None,
            platform: None,
            ua: None,
        }
    }

    #[tokio::test]
    async fn run_dispatch__should_send_to_each_subscription_and_mark_sent() {
        // Given a due notification and two registered devices
        let (dir, store) = create_temp_store("fanout");
        let now = parse_now();
        let notification = store
            .schedule_notification("marten", now, "Stretch", "Time to move.")
            .expect("schedule");
        store
            .upsert_subscription(subscription("marten", "https://push.example/1"))
            .expect("insert");
        store
            .upsert_subscription(subscription("marten", "https://push.example/2"))
            .expect("insert");
        let time = TestTime { now };
        let sender = TestSender::default();

        // When
        let summary = run_dispatch(&time, &sender, &store, &DispatchConfig::default())
            .await
            .expect("dispatch");

        // Then
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.sent, 2);
        let sent = sender.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|(_, title)| title == "Stretch"));
        let stored = &store.registry_snapshot().notifications[0];
        assert_eq!(stored.id, notification.id);
        assert_eq!(stored.status, NotificationStatus::Sent);
        assert_eq!(stored.sent_at, Some(now));

        std::fs::remove_dir_all(&dir).expect("cleanup");
    }

    #[tokio::test]
    async fn run_dispatch__should_return_zero_summary_when_nothing_due() {
        // Given
        let (dir, store) = create_temp_store("idle");
        let now = parse_now();
        store
            .schedule_notification("marten", now + time::Duration::hours(1), "Later", "")
            .expect("schedule");

        // When
        let summary = run_dispatch(
            &TestTime { now },
            &TestSender::default(),
            &store,
            &DispatchConfig::default(),
        )
        .await
        .expect("dispatch");

        // Then
        assert_eq!(summary, DispatchSummary::default());

        std::fs::remove_dir_all(&dir).expect("cleanup");
    }

    #[tokio::test]
    async fn run_dispatch__should_prune_gone_endpoint_and_still_mark_sent() {
        // Given one dead and one live device
        let (dir, store) = create_temp_store("prune");
        let now = parse_now();
        store
            .schedule_notification("marten", now, "Stretch", "")
            .expect("schedule");
        store
            .upsert_subscription(subscription("marten", "https://push.example/dead"))
            .expect("insert");
        store
            .upsert_subscription(subscription("marten", "https://push.example/live"))
            .expect("insert");
        let sender = TestSender::default();
        sender.fail_endpoint("https://push.example/dead", true);

        // When
        let summary = run_dispatch(
            &TestTime { now },
            &sender,
            &store,
            &DispatchConfig::default(),
        )
        .await
        .expect("dispatch");

        // Then the dead subscription row is gone and the notification is
        // still settled as sent
        assert_eq!(summary.sent, 1);
        let registry = store.registry_snapshot();
        assert_eq!(registry.subscriptions.len(), 1);
        assert_eq!(registry.subscriptions[0].endpoint, "https://push.example/live");
        assert_eq!(registry.notifications[0].status, NotificationStatus::Sent);

        std::fs::remove_dir_all(&dir).expect("cleanup");
    }

    #[tokio::test]
    async fn run_dispatch__should_keep_subscription_on_transient_error() {
        // Given
        let (dir, store) = create_temp_store("transient");
        let now = parse_now();
        store
            .schedule_notification("marten", now, "Stretch", "")
            .expect("schedule");
        store
            .upsert_subscription(subscription("marten", "https://push.example/flaky"))
            .expect("insert");
        let sender = TestSender::default();
        sender.fail_endpoint("https://push.example/flaky", false);

        // When
        let summary = run_dispatch(
            &TestTime { now },
            &sender,
            &store,
            &DispatchConfig::default(),
        )
        .await
        .expect("dispatch");

        // Then the error is swallowed: no sends, no pruning, row settled
        assert_eq!(summary.sent, 0);
        let registry = store.registry_snapshot();
        assert_eq!(registry.subscriptions.len(), 1);
        assert_eq!(registry.notifications[0].status, NotificationStatus::Sent);

        std::fs::remove_dir_all(&dir).expect("cleanup");
    }

    #[tokio::test]
    async fn run_dispatch__should_defer_subscriberless_notification_inside_window() {
        // Given a due notification whose user has no devices yet
        let (dir, store) = create_temp_store("defer");
        let now = parse_now();
        store
            .schedule_notification("marten", now, "Stretch", "")
            .expect("schedule");

        // When
        let summary = run_dispatch(
            &TestTime { now },
            &TestSender::default(),
            &store,
            &DispatchConfig::default(),
        )
        .await
        .expect("dispatch");

        // Then the row goes back to pending and a later run re-selects it
        assert_eq!(summary.deferred, 1);
        assert_eq!(summary.failed, 0);
        let registry = store.registry_snapshot();
        assert_eq!(registry.notifications[0].status, NotificationStatus::Pending);

        let again = run_dispatch(
            &TestTime { now },
            &TestSender::default(),
            &store,
            &DispatchConfig::default(),
        )
        .await
        .expect("second dispatch");
        assert_eq!(again.deferred, 1);

        std::fs::remove_dir_all(&dir).expect("cleanup");
    }

    #[tokio::test]
    async fn run_dispatch__should_fail_subscriberless_notification_after_window() {
        // Given a notification stranded past the retry window
        let (dir, store) = create_temp_store("expire");
        let now = parse_now();
        store
            .schedule_notification("marten", now - time::Duration::hours(25), "Stale", "")
            .expect("schedule");

        // When
        let summary = run_dispatch(
            &TestTime { now },
            &TestSender::default(),
            &store,
            &DispatchConfig::default(),
        )
        .await
        .expect("dispatch");

        // Then it is settled terminally and never re-selected
        assert_eq!(summary.failed, 1);
        let registry = store.registry_snapshot();
        assert_eq!(registry.notifications[0].status, NotificationStatus::Failed);

        let again = run_dispatch(
            &TestTime { now },
            &TestSender::default(),
            &store,
            &DispatchConfig::default(),
        )
        .await
        .expect("second dispatch");
        assert_eq!(again.processed, 0);

        std::fs::remove_dir_all(&dir).expect("cleanup");
    }

    #[tokio::test]
    async fn run_dispatch__should_skip_batch_claimed_by_overlapping_run() {
        // Given another run already claimed the due row
        let (dir, store) = create_temp_store("overlap");
        let now = parse_now();
        store
            .schedule_notification("marten", now, "Stretch", "")
            .expect("schedule");
        store
            .upsert_subscription(subscription("marten", "https://push.example/1"))
            .expect("insert");
        let claimed = store.claim_due(now, 100).expect("claim");
        assert_eq!(claimed.len(), 1);
        let sender = TestSender::default();

        // When this run starts before the first one settles
        let summary = run_dispatch(
            &TestTime { now },
            &sender,
            &store,
            &DispatchConfig::default(),
        )
        .await
        .expect("dispatch");

        // Then nothing is double-sent
        assert_eq!(summary.processed, 0);
        assert!(sender.sent().is_empty());

        std::fs::remove_dir_all(&dir).expect("cleanup");
    }

    #[tokio::test]
    async fn run_dispatch__should_cap_work_at_batch_size() {
        // Given
        let (dir, store) = create_temp_store("batch");
        let now = parse_now();
        for index in 0..3 {
            store
                .schedule_notification("marten", now, &format!("Reminder {index}"), "")
                .expect("schedule");
        }
        store
            .upsert_subscription(subscription("marten", "https://push.example/1"))
            .expect("insert");
        let config = DispatchConfig {
            batch_size: 2,
            ..DispatchConfig::default()
        };

        // When
        let summary = run_dispatch(&TestTime { now }, &TestSender::default(), &store, &config)
            .await
            .expect("dispatch");

        // Then
        assert_eq!(summary.processed, 2);

        std::fs::remove_dir_all(&dir).expect("cleanup");
    }
}
