//! Cluster Module Tests
//!
//! ## Test Scopes
//! - **Lifecycle**: The transition table, idempotent self-transitions, rejection of illegal moves.
//! - **Node Records**: Set semantics of buckets and URIs.
//! - **State Machine**: Serial ordering, idempotent application, tolerance of unknown nodes,
//!   deterministic replay, leader/self bookkeeping and change events in serial order.

#[cfg(test)]
mod tests {
    use crate::cluster::events::NodeChange;
    use crate::cluster::node::{NodeId, NodeInfo, NodeState};
    use crate::cluster::state::ClusterStateMachine;
    use crate::error::ClusterError;
    use crate::journal::types::{JournalCommand, JournaledCommand};
    use reqwest::Url;
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn uri(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    fn machine_with_node(node_id: NodeId) -> ClusterStateMachine {
        let machine = ClusterStateMachine::new(NodeInfo::new(NodeId::new(), "self", []));
        machine.add_node(NodeInfo::new(node_id, "node-g", []));
        machine
    }

    fn add_buckets(serial: u64, node_id: NodeId, buckets: &[u32]) -> JournaledCommand {
        JournaledCommand::new(
            serial,
            JournalCommand::AddBucketsToNode,
            json!({"NodeId": node_id, "Buckets": buckets}),
        )
    }

    fn remove_buckets(serial: u64, node_id: NodeId, buckets: &[u32]) -> JournaledCommand {
        JournaledCommand::new(
            serial,
            JournalCommand::RemoveBucketsFromNode,
            json!({"NodeId": node_id, "Buckets": buckets}),
        )
    }

    fn state_update(serial: u64, node_id: NodeId, state: NodeState) -> JournaledCommand {
        JournaledCommand::new(
            serial,
            JournalCommand::NodeStateUpdate,
            json!({"NodeId": node_id, "State": state}),
        )
    }

    fn node_only(serial: u64, command: JournalCommand, node_id: NodeId) -> JournaledCommand {
        JournaledCommand::new(serial, command, json!({"NodeId": node_id}))
    }

    // ============================================================
    // LIFECYCLE TESTS
    // ============================================================

    #[test]
    fn test_transition_table() {
        use NodeState::*;

        let legal = [
            (Unknown, vec![Offline, Pending, Unhealthy, Operational, Blocked]),
            (Offline, vec![Pending, Unhealthy, Operational, Blocked]),
            (Pending, vec![Offline, Unhealthy, Operational, Blocked]),
            (Unhealthy, vec![Operational, Offline, Unhealthy]),
            (Operational, vec![Unhealthy, Offline]),
            (Blocked, vec![Offline]),
        ];

        for (from, allowed) in legal {
            for to in NodeState::ALL {
                let expected = from == to || allowed.contains(&to);
                assert_eq!(
                    from.can_transition_to(to),
                    expected,
                    "{:?} -> {:?}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_nothing_returns_to_unknown() {
        for from in NodeState::ALL.into_iter().filter(|s| *s != NodeState::Unknown) {
            assert!(!from.can_transition_to(NodeState::Unknown));
        }
    }

    #[test]
    fn test_illegal_set_state_leaves_node_unchanged() {
        let mut node = NodeInfo::new(NodeId::new(), "n", []);
        node.set_state(NodeState::Blocked).unwrap();

        let err = node.set_state(NodeState::Operational).unwrap_err();

        assert!(matches!(
            err,
            ClusterError::IllegalTransition {
                from: NodeState::Blocked,
                to: NodeState::Operational,
                ..
            }
        ));
        assert_eq!(node.state(), NodeState::Blocked);
    }

    // ============================================================
    // NODE RECORD TESTS
    // ============================================================

    #[test]
    fn test_node_bucket_set_semantics() {
        let mut node = NodeInfo::new(NodeId::new(), "n", []);

        assert_eq!(node.add_buckets([1, 2, 2, 4]), vec![1, 2, 4]);
        assert!(node.add_buckets([4, 2, 1]).is_empty());
        assert_eq!(node.buckets(), &BTreeSet::from([1, 2, 4]));

        assert_eq!(node.remove_buckets([2, 99]), vec![2]);
        assert_eq!(node.buckets(), &BTreeSet::from([1, 4]));

        assert_eq!(node.clear_buckets(), vec![1, 4]);
        assert!(node.buckets().is_empty());
        assert!(node.clear_buckets().is_empty());
    }

    #[test]
    fn test_set_uris_replaces_wholesale() {
        let mut node = NodeInfo::new(NodeId::new(), "n", [uri("http://a:1/"), uri("http://b:1/")]);

        assert!(node.set_uris([uri("http://c:1/")]));
        assert_eq!(node.uris(), &BTreeSet::from([uri("http://c:1/")]));
        assert!(!node.set_uris([uri("http://c:1/")]));
    }

    #[test]
    fn test_node_serializes_uris_as_strings() {
        let node = NodeInfo::new(NodeId::new(), "n", [uri("http://10.0.0.1:8080/")]);
        let json = serde_json::to_value(&node).unwrap();

        assert_eq!(json["uris"], json!(["http://10.0.0.1:8080/"]));
        assert_eq!(json["state"], json!("Unknown"));
    }

    // ============================================================
    // STATE MACHINE TESTS
    // ============================================================

    #[test]
    fn test_add_buckets_scenario() {
        let g = NodeId::new();
        let machine = machine_with_node(g);

        machine.apply(&add_buckets(0, g, &[1, 2, 4])).unwrap();

        let node = machine.node(&g).unwrap();
        assert_eq!(node.buckets(), &BTreeSet::from([1, 2, 4]));
        assert_eq!(machine.last_applied_serial(), Some(0));
    }

    #[test]
    fn test_add_buckets_is_idempotent() {
        let g = NodeId::new();
        let machine = machine_with_node(g);

        machine.apply(&add_buckets(1, g, &[1, 2, 4])).unwrap();
        let event = machine.apply(&add_buckets(2, g, &[1, 2, 4])).unwrap();

        assert_eq!(event.change, NodeChange::Unchanged);
        assert_eq!(machine.node(&g).unwrap().buckets(), &BTreeSet::from([1, 2, 4]));
    }

    #[test]
    fn test_remove_absent_bucket_is_noop() {
        let g = NodeId::new();
        let machine = machine_with_node(g);
        machine.apply(&add_buckets(1, g, &[1, 2])).unwrap();

        let event = machine.apply(&remove_buckets(2, g, &[7])).unwrap();

        assert_eq!(event.change, NodeChange::Unchanged);
        assert_eq!(machine.node(&g).unwrap().buckets(), &BTreeSet::from([1, 2]));

        machine.apply(&remove_buckets(3, g, &[2, 7])).unwrap();
        assert_eq!(machine.node(&g).unwrap().buckets(), &BTreeSet::from([1]));
    }

    #[test]
    fn test_clear_buckets_empties_set() {
        let g = NodeId::new();
        let machine = machine_with_node(g);
        machine.apply(&add_buckets(1, g, &[3, 5, 8, 13])).unwrap();

        machine
            .apply(&node_only(2, JournalCommand::NodeClearBuckets, g))
            .unwrap();
        assert!(machine.node(&g).unwrap().buckets().is_empty());

        // Clearing an empty set is fine too
        machine
            .apply(&node_only(3, JournalCommand::NodeClearBuckets, g))
            .unwrap();
        assert!(machine.node(&g).unwrap().buckets().is_empty());
    }

    #[test]
    fn test_out_of_order_serial_is_rejected() {
        let g = NodeId::new();
        let machine = machine_with_node(g);

        machine.apply(&add_buckets(5, g, &[1])).unwrap();
        let before = machine.snapshot();

        let err = machine.apply(&add_buckets(3, g, &[2])).unwrap_err();
        assert!(matches!(
            err,
            ClusterError::OutOfOrderSerial {
                serial: 3,
                last_applied: 5
            }
        ));

        // A duplicate of the last serial is rejected as well
        assert!(matches!(
            machine.apply(&add_buckets(5, g, &[2])),
            Err(ClusterError::OutOfOrderSerial { .. })
        ));

        assert_eq!(machine.snapshot(), before);
        assert_eq!(machine.last_applied_serial(), Some(5));
    }

    #[test]
    fn test_illegal_transition_via_journal() {
        let g = NodeId::new();
        let machine = machine_with_node(g);
        machine
            .apply(&node_only(1, JournalCommand::BlockNode, g))
            .unwrap();

        let err = machine
            .apply(&state_update(2, g, NodeState::Operational))
            .unwrap_err();

        assert!(matches!(err, ClusterError::IllegalTransition { .. }));
        assert_eq!(machine.node(&g).unwrap().state(), NodeState::Blocked);
        assert_eq!(machine.last_applied_serial(), Some(1));
        assert_eq!(machine.journal_entries(0).len(), 1);

        // Blocked nodes may still go offline
        machine
            .apply(&state_update(2, g, NodeState::Offline))
            .unwrap();
        assert_eq!(machine.node(&g).unwrap().state(), NodeState::Offline);
    }

    #[test]
    fn test_repeated_state_update_is_idempotent() {
        let g = NodeId::new();
        let machine = machine_with_node(g);

        machine
            .apply(&state_update(1, g, NodeState::Operational))
            .unwrap();
        let event = machine
            .apply(&state_update(2, g, NodeState::Operational))
            .unwrap();

        assert_eq!(event.change, NodeChange::Unchanged);
        assert_eq!(machine.node(&g).unwrap().state(), NodeState::Operational);
    }

    #[test]
    fn test_unknown_node_is_noop() {
        let machine = machine_with_node(NodeId::new());
        let before = machine.snapshot();
        let stranger = NodeId::new();

        let commands = [
            add_buckets(1, stranger, &[1]),
            remove_buckets(2, stranger, &[1]),
            node_only(3, JournalCommand::NodeClearBuckets, stranger),
            node_only(4, JournalCommand::BlockNode, stranger),
            state_update(5, stranger, NodeState::Offline),
            JournaledCommand::new(
                6,
                JournalCommand::NodeContactUpdate,
                json!({"NodeId": stranger, "Uris": ["http://x:1/"]}),
            ),
            JournaledCommand::new(
                7,
                JournalCommand::NodeNotifyBucketSynchronized,
                json!({"NodeId": stranger, "Bucket": 1}),
            ),
        ];

        for command in &commands {
            let event = machine.apply(command).unwrap();
            assert_eq!(event.change, NodeChange::NodeMissing);
        }

        assert_eq!(machine.snapshot().nodes(), before.nodes());
        assert_eq!(machine.last_applied_serial(), Some(7));
    }

    #[test]
    fn test_add_node_creates_pending_node() {
        let machine = ClusterStateMachine::new(NodeInfo::new(NodeId::new(), "self", []));
        let new_id = NodeId::new();
        let command = JournaledCommand::new(
            1,
            JournalCommand::AddNode,
            json!({"NodeId": new_id, "Name": "storage-2", "Uris": ["http://10.0.0.2:7000/"]}),
        );

        let event = machine.apply(&command).unwrap();
        assert_eq!(
            event.change,
            NodeChange::NodeAdded {
                name: "storage-2".to_string()
            }
        );

        let node = machine.node(&new_id).unwrap();
        assert_eq!(node.name(), "storage-2");
        assert_eq!(node.state(), NodeState::Pending);
        assert_eq!(node.uris(), &BTreeSet::from([uri("http://10.0.0.2:7000/")]));
        assert!(node.buckets().is_empty());

        // Re-adding does not reset the existing record
        machine.apply(&add_buckets(2, new_id, &[9])).unwrap();
        let mut again = command.clone();
        again.serial_number = 3;
        assert_eq!(machine.apply(&again).unwrap().change, NodeChange::Unchanged);
        assert_eq!(machine.node(&new_id).unwrap().buckets(), &BTreeSet::from([9]));
    }

    #[test]
    fn test_contact_update_replaces_uris() {
        let g = NodeId::new();
        let machine = ClusterStateMachine::new(NodeInfo::new(NodeId::new(), "self", []));
        machine.add_node(NodeInfo::new(g, "g", [uri("http://old:1/"), uri("http://older:1/")]));

        machine
            .apply(&JournaledCommand::new(
                1,
                JournalCommand::NodeContactUpdate,
                json!({"NodeId": g, "Uris": ["http://new:1/"]}),
            ))
            .unwrap();

        assert_eq!(
            machine.node(&g).unwrap().uris(),
            &BTreeSet::from([uri("http://new:1/")])
        );
    }

    #[test]
    fn test_bucket_synchronized_is_recorded() {
        let g = NodeId::new();
        let machine = machine_with_node(g);
        machine.apply(&add_buckets(1, g, &[4, 5])).unwrap();

        let sync = JournaledCommand::new(
            2,
            JournalCommand::NodeNotifyBucketSynchronized,
            json!({"NodeId": g, "Bucket": 4}),
        );
        let event = machine.apply(&sync).unwrap();

        assert_eq!(event.change, NodeChange::BucketSynchronized(4));
        let node = machine.node(&g).unwrap();
        assert_eq!(node.synchronized_buckets(), &BTreeSet::from([4]));
        assert_eq!(node.buckets(), &BTreeSet::from([4, 5]));

        machine.apply(&remove_buckets(3, g, &[4])).unwrap();
        assert!(machine.node(&g).unwrap().synchronized_buckets().is_empty());
    }

    #[test]
    fn test_nodes_for_bucket() {
        let a = NodeId::new();
        let b = NodeId::new();
        let machine = machine_with_node(a);
        machine.add_node(NodeInfo::new(b, "b", []));

        machine.apply(&add_buckets(1, a, &[1, 2])).unwrap();
        machine.apply(&add_buckets(2, b, &[2, 3])).unwrap();

        let owners = |bucket| -> BTreeSet<NodeId> {
            machine.nodes_for_bucket(bucket).iter().map(|n| n.id()).collect()
        };

        assert_eq!(owners(1), BTreeSet::from([a]));
        assert_eq!(owners(2), BTreeSet::from([a, b]));
        assert_eq!(owners(3), BTreeSet::from([b]));
        assert!(owners(4).is_empty());
        assert_eq!(machine.nodes().len(), 3);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let self_id = NodeId::new();
        let a = NodeId::new();
        let b = NodeId::new();

        let journal = vec![
            JournaledCommand::new(1, JournalCommand::AddNode, json!({"NodeId": a, "Name": "a"})),
            JournaledCommand::new(2, JournalCommand::AddNode, json!({"NodeId": b, "Name": "b"})),
            add_buckets(3, a, &[1, 2, 3]),
            add_buckets(4, b, &[3, 4]),
            state_update(5, a, NodeState::Operational),
            node_only(6, JournalCommand::BlockNode, b),
            remove_buckets(8, a, &[2]),
            node_only(9, JournalCommand::NodeClearBuckets, b),
            add_buckets(12, a, &[7]),
        ];

        let replay = || {
            let machine = ClusterStateMachine::new(NodeInfo::new(self_id, "self", []));
            assert_eq!(machine.replay(&journal).unwrap(), journal.len());
            machine
        };

        let first = replay();
        let second = replay();

        assert_eq!(first.snapshot(), second.snapshot());
        assert_eq!(
            first.node(&a).unwrap().buckets(),
            &BTreeSet::from([1, 3, 7])
        );
        assert_eq!(first.node(&a).unwrap().state(), NodeState::Operational);
        assert_eq!(first.node(&b).unwrap().state(), NodeState::Blocked);
        assert_eq!(first.journal_entries(0), journal);
        assert_eq!(first.journal_entries(8).len(), 3);
    }

    #[test]
    fn test_undecodable_command_does_not_advance() {
        let machine = machine_with_node(NodeId::new());
        let bogus = JournaledCommand {
            serial_number: 1,
            kind: 99,
            data: json!({}),
        };

        assert!(matches!(
            machine.apply(&bogus),
            Err(ClusterError::Journal(_))
        ));
        assert_eq!(machine.last_applied_serial(), None);
    }

    #[test]
    fn test_leader_and_self() {
        let self_id = NodeId::new();
        let other = NodeId::new();
        let machine = ClusterStateMachine::new(NodeInfo::new(self_id, "self", []));

        assert_eq!(machine.self_node().id(), self_id);
        assert_eq!(machine.leader().id(), self_id);

        assert!(matches!(
            machine.set_leader(other),
            Err(ClusterError::UnknownNode(_))
        ));

        machine.add_node(NodeInfo::new(other, "other", []));
        machine.set_leader(other).unwrap();
        assert_eq!(machine.leader().id(), other);
        assert_eq!(machine.self_node().id(), self_id);
    }

    #[test]
    fn test_events_published_per_apply() {
        let g = NodeId::new();
        let machine = machine_with_node(g);
        let mut rx = machine.subscribe();

        machine.apply(&add_buckets(1, g, &[1, 2])).unwrap();
        machine
            .apply(&state_update(2, g, NodeState::Pending))
            .unwrap();
        let _ = machine.apply(&add_buckets(1, g, &[3]));

        let first = rx.try_recv().unwrap();
        assert_eq!(first.serial, 1);
        assert_eq!(first.node_id, g);
        assert_eq!(first.command, JournalCommand::AddBucketsToNode);
        assert_eq!(first.change, NodeChange::BucketsAdded(vec![1, 2]));

        let second = rx.try_recv().unwrap();
        assert_eq!(
            second.change,
            NodeChange::StateChanged {
                from: NodeState::Unknown,
                to: NodeState::Pending
            }
        );

        // The rejected apply publishes nothing
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_concurrent_readers_see_whole_applies() {
        let g = NodeId::new();
        let machine = Arc::new(machine_with_node(g));

        let reader = {
            let machine = machine.clone();
            std::thread::spawn(move || {
                for _ in 0..2_000 {
                    let node = machine.node(&g).unwrap();
                    // Each apply adds a pair of buckets, so a consistent view is always even
                    assert_eq!(node.buckets().len() % 2, 0);
                }
            })
        };

        for serial in 0..500u64 {
            let base = (serial * 2) as u32;
            machine
                .apply(&add_buckets(serial, g, &[base, base + 1]))
                .unwrap();
        }

        reader.join().unwrap();
        assert_eq!(machine.node(&g).unwrap().buckets().len(), 1000);
    }

    #[test]
    fn test_concurrent_appliers_publish_in_serial_order() {
        let g = NodeId::new();
        let machine = Arc::new(machine_with_node(g));
        let mut rx = machine.subscribe();

        let appliers: Vec<_> = (0..4)
            .map(|_| {
                let machine = machine.clone();
                std::thread::spawn(move || {
                    for serial in 0..300u64 {
                        // Losing the race to another applier is expected
                        let _ = machine.apply(&add_buckets(serial, g, &[serial as u32]));
                    }
                })
            })
            .collect();
        for applier in appliers {
            applier.join().unwrap();
        }

        let mut published = Vec::new();
        while let Ok(event) = rx.try_recv() {
            published.push(event.serial);
        }
        let journaled: Vec<u64> = machine
            .journal_entries(0)
            .iter()
            .map(|command| command.serial_number)
            .collect();

        assert!(published.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(published, journaled);
        assert_eq!(machine.last_applied_serial(), Some(299));
    }
}
