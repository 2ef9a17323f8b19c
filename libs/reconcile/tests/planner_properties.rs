//! Property tests for the planner over randomly generated snapshots.

use nodeset_reconcile::{count_unavailable, plan, Node, NodeTopology, Pod, Revision};
use nodeset_testing::{nodes, PodBuilder, RolloutSim};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct PodSpec {
    revision: Option<bool>,
    ready: bool,
    terminating: bool,
}

fn pod_spec() -> impl Strategy<Value = PodSpec> {
    (
        prop_oneof![Just(None), Just(Some(false)), Just(Some(true))],
        any::<bool>(),
        prop::bool::weighted(0.2),
    )
        .prop_map(|(revision, ready, terminating)| PodSpec {
            revision,
            ready,
            terminating,
        })
}

/// Up to 2 pods per node, plus a few pods on nodes outside the cluster.
fn snapshot() -> impl Strategy<Value = (Vec<Node>, Vec<Pod>)> {
    (1usize..25).prop_flat_map(|count| {
        (
            prop::collection::vec(prop::collection::vec(pod_spec(), 0..=2), count),
            prop::collection::vec(pod_spec(), 0..3),
        )
            .prop_map(move |(per_node, strays)| {
                let cluster = nodes(count);
                let mut pods = Vec::new();
                let placed = per_node
                    .into_iter()
                    .enumerate()
                    .flat_map(|(i, specs)| specs.into_iter().map(move |s| (format!("node-{i}"), s)));
                let stray = strays
                    .into_iter()
                    .map(|s| ("node-removed".to_string(), s));
                for (n, (node, spec)) in placed.chain(stray).enumerate() {
                    pods.push(build(&format!("pod-{n}"), &node, &spec));
                }
                (cluster, pods)
            })
    })
}

fn build(name: &str, node: &str, spec: &PodSpec) -> Pod {
    let mut builder = PodBuilder::new(name, node);
    builder = match spec.revision {
        None => builder.no_revision(),
        Some(true) => builder.revision("v2"),
        Some(false) => builder.revision("v1"),
    };
    if spec.ready {
        builder = builder.ready();
    }
    if spec.terminating {
        builder = builder.terminating();
    }
    builder.build()
}

proptest! {
    #[test]
    fn plan_is_deterministic((cluster, pods) in snapshot(), max in 0u32..10) {
        let topology = NodeTopology::build(&cluster, pods);
        let num = count_unavailable(&cluster, &topology);
        let desired = Revision::new("v2");

        prop_assert_eq!(
            plan(&topology, &desired, max, num),
            plan(&topology, &desired, max, num)
        );
    }

    #[test]
    fn available_nodes_lose_at_most_remaining_budget((cluster, pods) in snapshot(), max in 0u32..10) {
        let topology = NodeTopology::build(&cluster, pods);
        let num = count_unavailable(&cluster, &topology);
        let result = plan(&topology, &Revision::new("v2"), max, num);

        let stale_from_available = result
            .deletions
            .iter()
            .filter(|d| d.reason.is_stale())
            .filter(|d| topology.is_node_available(&d.pod.node_name))
            .count();

        let remaining = max.saturating_sub(num) as usize;
        prop_assert!(stale_from_available <= remaining);
        prop_assert_eq!(stale_from_available, result.budgeted_deletions());
    }

    #[test]
    fn creations_target_exactly_the_empty_nodes((cluster, pods) in snapshot(), max in 0u32..10) {
        let topology = NodeTopology::build(&cluster, pods);
        let num = count_unavailable(&cluster, &topology);
        let result = plan(&topology, &Revision::new("v2"), max, num);

        let empty: Vec<_> = topology
            .iter()
            .filter(|(_, pods)| pods.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        prop_assert_eq!(&result.creations, &empty);

        for deletion in &result.deletions {
            prop_assert!(!result.creations.contains(&deletion.pod.node_name));
        }
    }

    #[test]
    fn terminating_and_current_singletons_are_never_deleted(
        (cluster, pods) in snapshot(),
        max in 0u32..10,
    ) {
        let topology = NodeTopology::build(&cluster, pods);
        let num = count_unavailable(&cluster, &topology);
        let desired = Revision::new("v2");
        let result = plan(&topology, &desired, max, num);

        for slot in topology.slots(&desired) {
            if slot.current.len() == 1 {
                let only = &slot.current[0].name;
                prop_assert!(result.pods_to_delete().all(|name| name != only));
            }
        }
        for deletion in &result.deletions {
            prop_assert!(!deletion.pod.is_terminating());
        }
    }

    #[test]
    fn ready_old_pods_untouched_across_resyncs(budgets in prop::collection::vec(0i64..10, 10)) {
        let mut sim = RolloutSim::new(20);
        sim.sync();
        sim.mark_all_ready();
        sim.set_revision("v2");
        sim.set_max_unavailable(10);
        sim.sync();
        sim.sync();
        sim.sync();
        let old_ready = sim.ready_pod_names();

        for (i, budget) in budgets.into_iter().enumerate() {
            sim.set_max_unavailable(budget);
            sim.set_revision(&format!("v3-{i}"));
            for _ in 0..3 {
                let result = sim.sync();
                for name in result.deleted_names() {
                    prop_assert!(!old_ready.contains(&name));
                }
            }
            prop_assert_eq!(sim.ready_pod_names(), old_ready.clone());
        }
    }
}
