// ==========================================
// 订单拆分集成测试
// ==========================================
// 职责: 验证拆分数量、幂等、并发拆分、非法订单
// ==========================================


#[cfg(test)]
mod decomposition_test {
    use chrono::Utc;
    use kitchen_fulfillment::api::KitchenError;
    use kitchen_fulfillment::domain::PrepState;
    use kitchen_fulfillment::engine::FanoutHub;
    use kitchen_fulfillment::repository::{AssignmentRepository, OrderRepository, StationRepository};
    use std::thread;

    use crate::test_helpers::{
        assignment, build_api, find_item, line, open_conn, order, order_101, setup_kitchen, station,
    };

    #[test]
    fn test_order_101_yields_three_items() {
        let k = setup_kitchen();
        let items = k.api.decompose_order(&order_101(Utc::now())).unwrap();

        assert_eq!(items.len(), 3);
        find_item(&items, "101-A", "GRILL");
        find_item(&items, "101-A", "PLATING");
        find_item(&items, "101-B", "PLATING");
        assert!(items.iter().all(|i| i.state == PrepState::Pending));
        assert_eq!(find_item(&items, "101-A", "GRILL").estimated_minutes, 20);

        // 重复拆分不新增
        let again = k.api.decompose_order(&order_101(Utc::now())).unwrap();
        assert_eq!(again.len(), 3);
        let progress = k.api.get_order_progress("101").unwrap();
        assert_eq!(progress.total_items, 3);
    }

    #[test]
    fn test_item_count_is_sum_of_assignments() {
        let k = setup_kitchen();
        let stations = StationRepository::new(k.conn.clone());
        stations.upsert(&station("FRYER", 3)).unwrap();
        let assignments = AssignmentRepository::new(k.conn.clone());
        assignments.upsert(&assignment("C", "FRYER", 4)).unwrap();
        assignments.upsert(&assignment("C", "GRILL", 6)).unwrap();
        assignments.upsert(&assignment("C", "PLATING", 1)).unwrap();

        // A:2 + B:1 + C:3 + A:2 + D(无关联):0
        let o = order(
            "202",
            Utc::now(),
            vec![
                line("202", "1", "A", 1),
                line("202", "2", "B", 3),
                line("202", "3", "C", 1),
                line("202", "4", "A", 2),
                line("202", "5", "D", 1),
            ],
        );
        let items = k.api.decompose_order(&o).unwrap();
        assert_eq!(items.len(), 8);
        assert_eq!(find_item(&items, "202-2", "PLATING").quantity, 3);
        assert!(items.iter().all(|i| i.order_line_id != "202-5"));

        assert_eq!(k.api.decompose_order(&o).unwrap().len(), 8);
    }

    #[test]
    fn test_decompose_stored_order_by_id() {
        let k = setup_kitchen();
        let mut o = order_101(Utc::now());
        o.priority = 5;
        OrderRepository::new(k.conn.clone()).insert_order(&o).unwrap();

        let items = k.api.decompose_order_by_id("101").unwrap();
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| i.priority == 5));
    }

    #[test]
    fn test_concurrent_decomposition_writes_once() {
        let k = setup_kitchen();
        OrderRepository::new(k.conn.clone())
            .insert_order(&order_101(Utc::now()))
            .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let db_path = k.db_path.clone();
                thread::spawn(move || {
                    let api = build_api(open_conn(&db_path), FanoutHub::new(16));
                    api.decompose_order_by_id("101")
                })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            let items = handle.join().unwrap().unwrap();
            let mut ids: Vec<String> = items.into_iter().map(|i| i.item_id).collect();
            ids.sort();
            results.push(ids);
        }

        assert_eq!(results[0].len(), 3);
        assert!(results.iter().all(|ids| *ids == results[0]));
    }

    #[test]
    fn test_invalid_orders() {
        let k = setup_kitchen();

        let empty = order("301", Utc::now(), vec![]);
        assert!(matches!(
            k.api.decompose_order(&empty).unwrap_err(),
            KitchenError::InvalidOrder(_)
        ));

        let zero_qty = order("302", Utc::now(), vec![line("302", "1", "A", 0)]);
        assert!(matches!(
            k.api.decompose_order(&zero_qty).unwrap_err(),
            KitchenError::InvalidOrder(_)
        ));

        let foreign_line = order("303", Utc::now(), vec![line("999", "1", "A", 1)]);
        assert!(matches!(
            k.api.decompose_order(&foreign_line).unwrap_err(),
            KitchenError::InvalidOrder(_)
        ));

        // 失败的拆分不留下出餐项
        assert_eq!(k.api.get_order_progress("302").unwrap().total_items, 0);
    }

    #[test]
    fn test_duplicate_line_id_rejected_before_write() {
        let k = setup_kitchen();

        let dup = order(
            "304",
            Utc::now(),
            vec![line("304", "1", "A", 1), line("304", "1", "B", 1)],
        );
        match k.api.decompose_order(&dup).unwrap_err() {
            KitchenError::InvalidOrder(msg) => assert!(msg.contains("304-1")),
            other => panic!("unexpected error: {:?}", other),
        }

        // 订单头也未写入
        assert!(matches!(
            k.api.decompose_order_by_id("304").unwrap_err(),
            KitchenError::NotFound(_)
        ));
    }
}
