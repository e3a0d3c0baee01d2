// ==========================================
// 实时分发集成测试
// ==========================================
// 职责: 验证订阅范围过滤、单出餐项有序投递、迟到补发、关闭
// ==========================================


#[cfg(test)]
mod realtime_test {
    use chrono::Utc;
    use futures::StreamExt;
    use kitchen_fulfillment::api::KitchenError;
    use kitchen_fulfillment::domain::PrepState;
    use kitchen_fulfillment::engine::{ChangeEvent, ChangeKind, SubscriptionScope};
    use std::collections::HashMap;
    use std::thread;
    use std::time::Duration;

    use crate::test_helpers::{build_api, find_item, open_conn, order_101, setup_kitchen};
    use kitchen_fulfillment::engine::FanoutHub;

    fn drain(sub: &mut kitchen_fulfillment::engine::Subscription) -> Vec<ChangeEvent> {
        let mut events = Vec::new();
        while let Some(e) = sub.try_recv() {
            events.push(e);
        }
        events
    }

    #[tokio::test]
    async fn test_station_subscriber_sees_only_its_station() {
        let k = setup_kitchen();
        let mut grill = k
            .api
            .subscribe(SubscriptionScope::Station("GRILL".to_string()))
            .unwrap();

        let items = k.api.decompose_order(&order_101(Utc::now())).unwrap();
        let id = find_item(&items, "101-A", "GRILL").item_id.clone();

        let created = tokio::time::timeout(Duration::from_secs(1), grill.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(created.kind, ChangeKind::Created);
        assert_eq!(created.item_id, id);
        assert_eq!(created.progress.total_items, 3);

        k.api.transition(&id, PrepState::InProgress).unwrap();
        let next = tokio::time::timeout(Duration::from_secs(1), grill.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.new_state, PrepState::InProgress);
        assert_eq!(next.revision, 1);

        // PLATING 的变更不会到达
        let plating = find_item(&items, "101-B", "PLATING").item_id.clone();
        k.api.transition(&plating, PrepState::InProgress).unwrap();
        assert!(grill.try_recv().is_none());
    }

    #[test]
    fn test_order_subscriber_tracks_progress() {
        let k = setup_kitchen();
        let mut sub = k
            .api
            .subscribe(SubscriptionScope::Order("101".to_string()))
            .unwrap();
        let items = k.api.decompose_order(&order_101(Utc::now())).unwrap();

        for item in &items {
            k.api.transition(&item.item_id, PrepState::InProgress).unwrap();
            k.api.transition(&item.item_id, PrepState::Ready).unwrap();
        }

        let events = drain(&mut sub);
        assert_eq!(events.len(), 3 + 6);
        let last = events.last().unwrap();
        assert_eq!(last.progress.items_ready_or_later, 3);
        assert_eq!(last.progress.percent_complete, 100);

        // 序号单调递增
        assert!(events.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }

    #[test]
    fn test_per_item_order_under_concurrency() {
        let k = setup_kitchen();
        let mut all = k.api.subscribe(SubscriptionScope::AllStations).unwrap();
        let items = k.api.decompose_order(&order_101(Utc::now())).unwrap();

        // 每个出餐项 2 个线程抢着推进全流程
        let handles: Vec<_> = items
            .iter()
            .flat_map(|item| [item.item_id.clone(), item.item_id.clone()])
            .map(|id| {
                let api = k.api.clone();
                thread::spawn(move || {
                    for state in [PrepState::InProgress, PrepState::Ready, PrepState::Delivered] {
                        match api.transition(&id, state) {
                            Ok(_) => {}
                            Err(KitchenError::StaleTransition { .. }) => {}
                            Err(KitchenError::TerminalState { .. }) => {}
                            Err(e) => panic!("unexpected error: {}", e),
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut seen: HashMap<String, Vec<(i64, PrepState)>> = HashMap::new();
        for e in drain(&mut all) {
            seen.entry(e.item_id.clone())
                .or_default()
                .push((e.revision, e.new_state));
        }

        // 每个订阅方看到的是 pending → in_progress → ready → delivered 的有序子序列
        assert_eq!(seen.len(), 3);
        for (item_id, states) in seen {
            assert_eq!(states.first(), Some(&(0, PrepState::Pending)), "item {}", item_id);
            assert_eq!(states.last(), Some(&(3, PrepState::Delivered)), "item {}", item_id);
            assert!(
                states.windows(2).all(|w| w[0].0 < w[1].0 && w[0].1 < w[1].1),
                "item {} 事件乱序或重复: {:?}",
                item_id,
                states
            );
        }
    }

    #[test]
    fn test_late_subscriber_replays_from_sequence() {
        let k = setup_kitchen();
        let items = k.api.decompose_order(&order_101(Utc::now())).unwrap();
        let checkpoint = k.hub.last_sequence();
        assert_eq!(checkpoint, 3);

        let id = find_item(&items, "101-A", "PLATING").item_id.clone();
        k.api.transition(&id, PrepState::InProgress).unwrap();

        let mut late = k
            .api
            .subscribe_since(SubscriptionScope::Station("PLATING".to_string()), checkpoint)
            .unwrap();
        let replayed = drain(&mut late);
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].item_id, id);
        assert_eq!(replayed[0].new_state, PrepState::InProgress);

        let mut from_start = k
            .api
            .subscribe_since(SubscriptionScope::Station("PLATING".to_string()), 0)
            .unwrap();
        assert_eq!(drain(&mut from_start).len(), 3);
    }

    #[test]
    fn test_replay_on_fresh_hub_skips_advanced_items() {
        let k = setup_kitchen();
        let items = k.api.decompose_order(&order_101(Utc::now())).unwrap();
        let grill = find_item(&items, "101-A", "GRILL").item_id.clone();
        k.api.transition(&grill, PrepState::InProgress).unwrap();
        k.api.transition(&grill, PrepState::Ready).unwrap();

        // 另一个进程: 同一个库,全新的 hub
        let other = build_api(open_conn(&k.db_path), FanoutHub::new(64));
        let mut sub = other.subscribe(SubscriptionScope::AllStations).unwrap();
        let replayed = other.decompose_order_by_id("101").unwrap();
        assert_eq!(replayed.len(), 3);

        let events = drain(&mut sub);
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .all(|e| e.kind == ChangeKind::Created && e.new_state == PrepState::Pending));
        assert!(events.iter().all(|e| e.item_id != grill));
    }

    #[test]
    fn test_closed_subscription_is_unregistered() {
        let k = setup_kitchen();
        let mut sub = k.api.subscribe(SubscriptionScope::AllStations).unwrap();
        let dropped = k.api.subscribe(SubscriptionScope::AllStations).unwrap();
        assert_eq!(k.hub.subscriber_count(), 2);

        drop(dropped);
        sub.close();
        assert_eq!(k.hub.subscriber_count(), 0);

        k.api.decompose_order(&order_101(Utc::now())).unwrap();
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_shutdown_makes_writes_report_unavailable() {
        let k = setup_kitchen();
        let items = k.api.decompose_order(&order_101(Utc::now())).unwrap();
        k.hub.shutdown();

        let err = k
            .api
            .transition(&items[0].item_id, PrepState::InProgress)
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, KitchenError::StoreUnavailable(_)));

        let err = k.api.subscribe(SubscriptionScope::AllStations).unwrap_err();
        assert!(err.is_retryable());
    }
}
