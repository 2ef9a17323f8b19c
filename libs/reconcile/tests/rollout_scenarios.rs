//! Multi-pass rollout scenarios driven through the in-memory simulator.
//!
//! Each `sync` plans against the current state and applies the plan the
//! way the cache would eventually observe it.

use nodeset_reconcile::DeletionReason;
use nodeset_testing::RolloutSim;

fn assert_sync(sim: &mut RolloutSim, creates: usize, deletes: usize) {
    let result = sim.sync();
    assert_eq!(
        (result.created(), result.deleted()),
        (creates, deletes),
        "unexpected (creates, deletes) with max={} num={}",
        result.max_unavailable,
        result.num_unavailable
    );
}

#[test]
fn rolling_update_proceeds_in_budget_sized_steps() {
    let mut sim = RolloutSim::new(5);
    assert_sync(&mut sim, 5, 0);
    sim.mark_all_ready();

    sim.set_revision("v2");
    sim.set_max_unavailable(2);

    assert_sync(&mut sim, 0, 2);
    assert!(sim.num_unavailable() <= 2);
    assert_sync(&mut sim, 2, 0);
    sim.mark_all_ready();

    assert_sync(&mut sim, 0, 2);
    assert!(sim.num_unavailable() <= 2);
    assert_sync(&mut sim, 2, 0);
    sim.mark_all_ready();

    assert_sync(&mut sim, 0, 1);
    assert_sync(&mut sim, 1, 0);
    sim.mark_all_ready();

    assert_sync(&mut sim, 0, 0);
    assert!(sim.pods().iter().all(|p| p.revision.as_ref() == Some(sim.revision())));
}

#[test]
fn rollout_waits_while_new_pods_are_not_ready() {
    let mut sim = RolloutSim::new(5);
    assert_sync(&mut sim, 5, 0);
    sim.mark_all_ready();

    sim.set_revision("v2");
    sim.set_max_unavailable(3);

    assert_sync(&mut sim, 0, 3);
    assert_sync(&mut sim, 3, 0);
    // The three new pods never become ready: the budget stays spent.
    assert_sync(&mut sim, 0, 0);
}

#[test]
fn all_old_pods_not_ready_are_replaced_at_once() {
    let mut sim = RolloutSim::new(5);
    assert_sync(&mut sim, 5, 0);

    sim.set_revision("v2");
    sim.set_max_unavailable(3);

    assert_sync(&mut sim, 0, 5);
    assert_sync(&mut sim, 5, 0);
    assert_sync(&mut sim, 0, 0);
}

#[test]
fn unchanged_template_needs_no_actions() {
    let mut sim = RolloutSim::new(5);
    assert_sync(&mut sim, 5, 0);

    sim.set_max_unavailable(3);
    assert_sync(&mut sim, 0, 0);
}

#[test]
fn ready_old_pods_survive_repeated_template_changes() {
    let mut sim = RolloutSim::new(20);
    assert_sync(&mut sim, 20, 0);
    sim.mark_all_ready();

    // First update leaves 10 old ready pods that must never be touched.
    sim.set_revision("v2");
    sim.set_max_unavailable(10);
    assert_sync(&mut sim, 0, 10);
    assert_sync(&mut sim, 10, 0);
    assert_sync(&mut sim, 0, 0);

    let old_ready = sim.ready_pod_names();
    assert_eq!(old_ready.len(), 10);

    // Deterministic stand-in for random budgets in [0, 10).
    let budgets = [3, 0, 9, 5, 1, 7, 2, 8, 4, 6];
    for (i, budget) in budgets.into_iter().enumerate() {
        sim.set_max_unavailable(budget);
        sim.set_revision(&format!("v3-{i}"));

        // Only the 10 unavailable pods may be replaced.
        let result = sim.sync();
        assert_eq!(result.deleted(), 10, "iteration {i}");
        for name in result.deleted_names() {
            assert!(!old_ready.contains(&name), "{name} deleted in iteration {i}");
        }
        assert_sync(&mut sim, 10, 0);
        assert_sync(&mut sim, 0, 0);

        assert_eq!(sim.ready_pod_names(), old_ready, "iteration {i}");
    }

    // One more unit of budget than there are unavailable nodes.
    sim.set_max_unavailable(11);
    sim.set_revision("v4");
    let result = sim.sync();
    assert_eq!(result.deleted(), 11);
    assert_eq!(result.plan.budgeted_deletions(), 1);
    assert_sync(&mut sim, 11, 0);
    assert_sync(&mut sim, 0, 0);

    assert_eq!(sim.ready_pod_names().len(), 9);
}

#[test]
fn unavailable_old_pods_replaced_when_budget_exhausted() {
    let mut sim = RolloutSim::new(100);
    assert_sync(&mut sim, 100, 0);
    sim.mark_all_ready();
    let first_revision = sim.revision().clone();

    sim.set_revision("v2");
    sim.set_max_unavailable(10);
    for _ in 0..10 {
        assert_sync(&mut sim, 0, 10);
        assert_sync(&mut sim, 10, 0);
        sim.mark_all_ready();
    }
    assert_sync(&mut sim, 0, 0);

    // 88 unavailable new pods, 2 unavailable old pods, 10 available old pods.
    let mut old_unavailable = Vec::new();
    for (i, pod) in sim.pods_mut().iter_mut().enumerate() {
        if i >= 10 {
            pod.ready = false;
        }
        if i < 12 {
            pod.revision = Some(first_revision.clone());
            if i >= 10 {
                old_unavailable.push(pod.name.clone());
            }
        }
    }

    let result = sim.sync();
    assert_eq!(result.deleted(), 2);
    assert!(result
        .plan
        .deletions
        .iter()
        .all(|d| d.reason == DeletionReason::StaleUnavailable));
    let mut deleted = result.deleted_names();
    deleted.sort();
    old_unavailable.sort();
    assert_eq!(deleted, old_unavailable);

    assert_sync(&mut sim, 2, 0);
    assert_sync(&mut sim, 0, 0);
    assert!(sim.pods().iter().all(|p| !old_unavailable.contains(&p.name)));
}

#[test]
fn empty_cluster_is_a_noop() {
    let mut sim = RolloutSim::new(0);
    sim.set_max_unavailable("50%");
    let result = sim.sync();
    assert!(result.plan.is_empty());
    assert_eq!(result.max_unavailable, 0);
    assert_eq!(result.num_unavailable, 0);
}

#[test]
fn percent_budget_rolls_two_nodes_one_at_a_time() {
    let mut sim = RolloutSim::new(2);
    assert_sync(&mut sim, 2, 0);
    sim.mark_all_ready();

    sim.set_revision("v2");
    sim.set_max_unavailable("50%");
    assert_sync(&mut sim, 0, 1);
    assert_sync(&mut sim, 1, 0);
    sim.mark_all_ready();
    assert_sync(&mut sim, 0, 1);
    assert_sync(&mut sim, 1, 0);
    sim.mark_all_ready();
    assert_sync(&mut sim, 0, 0);
}
