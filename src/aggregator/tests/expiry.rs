//! Tests for store expiry sweeps and the reaper

#[cfg(test)]
mod tests {
    use crate::aggregator::tests::support::fixtures::{
        discard, keyed, output, payloads, sequenced,
    };
    use crate::aggregator::{
        AggregationEventType, AggregatorConfig, CorrelatingMessageHandler, GroupTimeout, Reaper,
        TaskScheduler,
    };
    use crate::core::time::ManualTimeProvider;
    use crate::message::CorrelationKey;
    use crate::store::{MessageGroup, MessageGroupStore, SimpleMessageGroupStore};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_sweep_discards_incomplete_groups() {
        let output = output();
        let discard = discard();
        let handler = CorrelatingMessageHandler::builder()
            .output_channel(output.clone())
            .discard_channel(discard.clone())
            .build()
            .unwrap();

        handler.handle(sequenced("k", 1, 1, 3)).unwrap();
        handler.handle(sequenced("k", 2, 2, 3)).unwrap();

        assert_eq!(handler.expire_message_groups(Duration::ZERO), 1);

        assert_eq!(payloads(&discard.drain()), vec![json!(1), json!(2)]);
        assert!(output.is_empty());
        assert_eq!(handler.store().message_group_count(), 0);
        assert_eq!(handler.statistics().groups_expired, 1);
    }

    #[test]
    fn test_sweep_releases_partial_result_when_configured() {
        let output = output();
        let handler = CorrelatingMessageHandler::builder()
            .output_channel(output.clone())
            .config(AggregatorConfig {
                send_partial_result_on_timeout: true,
                ..AggregatorConfig::default()
            })
            .build()
            .unwrap();

        handler.handle(sequenced("k", 1, 1, 3)).unwrap();
        handler.expire_message_groups(Duration::ZERO);

        assert_eq!(payloads(&output.drain()), vec![json!([1])]);
        assert_eq!(handler.store().message_group_count(), 0);
    }

    #[test]
    fn test_sweep_only_touches_old_groups() {
        let clock = ManualTimeProvider::new();
        let store = Arc::new(SimpleMessageGroupStore::with_time_provider(
            None,
            Arc::new(clock.clone()),
        ));
        let discard = discard();
        let handler = CorrelatingMessageHandler::builder()
            .output_channel(output())
            .discard_channel(discard.clone())
            .store(store.clone())
            .build()
            .unwrap();

        handler.handle(sequenced("old", 1, 1, 2)).unwrap();
        clock.advance(Duration::from_secs(60));
        handler.handle(sequenced("new", 2, 1, 2)).unwrap();

        assert_eq!(handler.expire_message_groups(Duration::from_secs(30)), 1);

        assert_eq!(payloads(&discard.drain()), vec![json!(1)]);
        assert_eq!(store.message_group_count(), 1);
        assert_eq!(
            store.get_message_group(&CorrelationKey::from("new")).size(),
            1
        );
    }

    #[test]
    fn test_sweeps_of_a_shared_store_go_through_the_handler() {
        let store = Arc::new(SimpleMessageGroupStore::new());
        let discard = discard();
        let handler = CorrelatingMessageHandler::builder()
            .output_channel(output())
            .discard_channel(discard.clone())
            .store(store.clone())
            .build()
            .unwrap();

        handler.handle(keyed("k", 1).with_sequence(1, 2)).unwrap();
        store.expire_message_groups(Duration::ZERO);

        assert_eq!(discard.drain().len(), 1);
        assert_eq!(store.message_group_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sweep_cancels_pending_timeout() {
        let discard = discard();
        let handler = CorrelatingMessageHandler::builder()
            .output_channel(output())
            .discard_channel(discard.clone())
            .group_timeout(GroupTimeout::Fixed(Duration::from_secs(30)))
            .build()
            .unwrap();
        let key = CorrelationKey::from("k");

        handler.handle(sequenced("k", 1, 1, 2)).unwrap();
        assert!(handler.has_pending_timeout(&key));

        handler.expire_message_groups(Duration::ZERO);

        assert!(!handler.has_pending_timeout(&key));
        assert_eq!(discard.drain().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reaper_expires_idle_groups_through_handler() {
        let discard = discard();
        let handler = CorrelatingMessageHandler::builder()
            .output_channel(output())
            .discard_channel(discard.clone())
            .build()
            .unwrap();
        let mut events = handler.subscribe("test");
        let scheduler = TaskScheduler::try_current().unwrap();
        let reaper = Reaper::start(
            Arc::clone(handler.store()),
            &scheduler,
            Duration::from_millis(20),
            Duration::from_millis(20),
        );

        handler.handle(sequenced("k", 1, 1, 2)).unwrap();

        let mut seen = Vec::new();
        while !seen.contains(&AggregationEventType::GroupExpired) {
            seen.push(events.recv().await.unwrap().event_type);
        }
        reaper.stop();

        assert_eq!(discard.drain().len(), 1);
        assert_eq!(handler.store().message_group_count(), 0);
    }

    #[test]
    fn test_sweep_skips_group_modified_after_selection() {
        let clock = ManualTimeProvider::new();
        let store = Arc::new(SimpleMessageGroupStore::with_time_provider(
            None,
            Arc::new(clock.clone()),
        ));
        // Registered ahead of the handler, so it runs between the sweep
        // selecting "k" and the handler expiring it
        let writer = Arc::downgrade(&store);
        let added = Arc::new(AtomicBool::new(false));
        let late = Arc::new(sequenced("k", 2, 2, 3));
        store.register_expiry_callback(Arc::new({
            let added = added.clone();
            move |group: &MessageGroup| {
                if let Some(store) = writer.upgrade() {
                    if !added.swap(true, Ordering::SeqCst) {
                        store.add_message_to_group(group.key(), late.clone()).unwrap();
                    }
                }
            }
        }));
        let discard = discard();
        let handler = CorrelatingMessageHandler::builder()
            .output_channel(output())
            .discard_channel(discard.clone())
            .store(store.clone())
            .build()
            .unwrap();

        handler.handle(sequenced("k", 1, 1, 3)).unwrap();
        clock.advance(Duration::from_secs(10));
        handler.expire_message_groups(Duration::from_secs(5));

        assert!(added.load(Ordering::SeqCst));
        assert!(discard.is_empty());
        assert_eq!(store.get_message_group(&CorrelationKey::from("k")).size(), 2);
        assert_eq!(handler.statistics().groups_expired, 0);

        // The next sweep sees the group as it now is
        clock.advance(Duration::from_secs(10));
        handler.expire_message_groups(Duration::from_secs(5));

        assert_eq!(payloads(&discard.drain()), vec![json!(1), json!(2)]);
        assert_eq!(store.message_group_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_configured_reaper_interval_expires_idle_groups() {
        let discard = discard();
        let handler = CorrelatingMessageHandler::builder()
            .output_channel(output())
            .discard_channel(discard.clone())
            .config(AggregatorConfig {
                reaper_interval: Some(Duration::from_millis(20)),
                ..AggregatorConfig::default()
            })
            .build()
            .unwrap();
        let mut events = handler.subscribe("test");
        assert_eq!(
            handler.reaper().map(|reaper| reaper.group_age()),
            Some(Duration::from_millis(20))
        );

        handler.handle(sequenced("k", 1, 1, 2)).unwrap();

        let mut seen = Vec::new();
        while !seen.contains(&AggregationEventType::GroupExpired) {
            seen.push(events.recv().await.unwrap().event_type);
        }

        assert_eq!(discard.drain().len(), 1);
        assert_eq!(handler.store().message_group_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dropped_handler_stops_its_reaper() {
        let store = Arc::new(SimpleMessageGroupStore::new());
        let handler = CorrelatingMessageHandler::builder()
            .output_channel(output())
            .store(store.clone())
            .config(AggregatorConfig {
                reaper_interval: Some(Duration::from_millis(20)),
                ..AggregatorConfig::default()
            })
            .build()
            .unwrap();
        drop(handler);

        store
            .add_message_to_group(&CorrelationKey::from("k"), Arc::new(sequenced("k", 1, 1, 2)))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(store.message_group_count(), 1);
    }

    #[test]
    fn test_reaper_interval_without_runtime_is_rejected() {
        let result = CorrelatingMessageHandler::builder()
            .output_channel(output())
            .config(AggregatorConfig {
                reaper_interval: Some(Duration::from_millis(20)),
                ..AggregatorConfig::default()
            })
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn test_dropped_handler_leaves_sweeps_to_the_store() {
        let store = Arc::new(SimpleMessageGroupStore::new());
        let handler = CorrelatingMessageHandler::builder()
            .output_channel(output())
            .store(store.clone())
            .build()
            .unwrap();
        handler.handle(sequenced("k", 1, 1, 2)).unwrap();
        drop(handler);

        assert_eq!(store.expire_message_groups(Duration::ZERO), 1);
        assert_eq!(store.message_count(), 1);
    }
}
