//! Availability budgeting.
//!
//! The budget (`max_unavailable`) bounds how many eligible nodes may be
//! without an available pod at once; the unavailable count is how much of
//! it is already spent before this pass does anything.

use serde::{Deserialize, Serialize};

use crate::error::BudgetError;
use crate::model::{MaxUnavailable, Node, UpdateStrategy};
use crate::topology::NodeTopology;

/// Rounding applied when a percentage budget is resolved against the
/// eligible node count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BudgetRounding {
    /// `floor(percent * nodes / 100)`; small clusters may resolve to 0.
    #[default]
    Down,

    /// Like `Down`, but a non-zero percentage over a non-empty cluster
    /// always allows at least one node of progress.
    DownAtLeastOne,
}

impl std::str::FromStr for BudgetRounding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "down" => Ok(Self::Down),
            "down-at-least-one" => Ok(Self::DownAtLeastOne),
            other => Err(format!(
                "unknown budget rounding '{other}', expected 'down' or 'down-at-least-one'"
            )),
        }
    }
}

/// The budget and how much of it is already spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableBudget {
    pub max_unavailable: u32,
    pub num_unavailable: u32,
}

impl UnavailableBudget {
    /// Nodes that may still be pushed into unavailability this pass.
    pub fn remaining(&self) -> u32 {
        self.max_unavailable.saturating_sub(self.num_unavailable)
    }
}

/// Resolve `max_unavailable` against `eligible_nodes` with `Down` rounding.
pub fn compute_budget(
    max_unavailable: &MaxUnavailable,
    eligible_nodes: usize,
) -> Result<u32, BudgetError> {
    compute_budget_with(max_unavailable, eligible_nodes, BudgetRounding::Down)
}

/// Resolve `max_unavailable` against `eligible_nodes`.
///
/// Absolute values are returned unchanged, even when larger than the node
/// count. Percentages must be a non-negative integer followed by `%`.
pub fn compute_budget_with(
    max_unavailable: &MaxUnavailable,
    eligible_nodes: usize,
    rounding: BudgetRounding,
) -> Result<u32, BudgetError> {
    match max_unavailable {
        MaxUnavailable::Int(value) => {
            if *value < 0 {
                return Err(BudgetError::Negative { value: *value });
            }
            Ok(u32::try_from(*value).unwrap_or(u32::MAX))
        }
        MaxUnavailable::Percent(raw) => {
            let percent = parse_percent(raw)?;
            let nodes = eligible_nodes as u128;
            // u64 * usize always fits in u128.
            let floor = u128::from(percent) * nodes / 100;
            let resolved = match rounding {
                BudgetRounding::Down => floor,
                BudgetRounding::DownAtLeastOne if percent > 0 && nodes > 0 => floor.max(1),
                BudgetRounding::DownAtLeastOne => floor,
            };
            Ok(u32::try_from(resolved).unwrap_or(u32::MAX))
        }
    }
}

fn parse_percent(raw: &str) -> Result<u64, BudgetError> {
    let malformed = || BudgetError::MalformedPercent {
        value: raw.to_string(),
    };

    let digits = raw.trim().strip_suffix('%').ok_or_else(malformed)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    digits.parse::<u64>().map_err(|_| malformed())
}

/// Count eligible nodes that have no ready, non-terminating pod.
///
/// A node with no pods at all is unavailable.
pub fn count_unavailable(eligible_nodes: &[Node], topology: &NodeTopology) -> u32 {
    let count = eligible_nodes
        .iter()
        .filter(|node| !topology.is_node_available(&node.name))
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Compute the budget for `strategy` and the number of nodes already
/// unavailable.
///
/// `OnDelete` never spends budget on stale pods, so its budget is zero.
pub fn get_unavailable_budget(
    strategy: &UpdateStrategy,
    eligible_nodes: &[Node],
    topology: &NodeTopology,
    rounding: BudgetRounding,
) -> Result<UnavailableBudget, BudgetError> {
    let max_unavailable = match strategy {
        UpdateStrategy::RollingUpdate { max_unavailable } => {
            compute_budget_with(max_unavailable, eligible_nodes.len(), rounding)?
        }
        UpdateStrategy::OnDelete => 0,
    };

    Ok(UnavailableBudget {
        max_unavailable,
        num_unavailable: count_unavailable(eligible_nodes, topology),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Pod;
    use crate::revision::Revision;
    use chrono::Utc;
    use nodeset_id::WorkloadId;
    use proptest::prelude::*;
    use rstest::rstest;

    fn nodes(count: usize) -> Vec<Node> {
        (0..count)
            .map(|i| Node::new(format!("node-{i}").parse().unwrap()))
            .collect()
    }

    fn ready_pod(node: &str) -> Pod {
        Pod {
            name: format!("pod-{node}").parse().unwrap(),
            workload: WorkloadId::new(),
            node_name: node.parse().unwrap(),
            revision: Some(Revision::new("a")),
            ready: true,
            deletion_timestamp: None,
            created_at: Utc::now(),
        }
    }

    #[rstest]
    #[case(MaxUnavailable::Int(0), 5, 0)]
    #[case(MaxUnavailable::Int(2), 5, 2)]
    #[case(MaxUnavailable::Int(11), 5, 11)]
    #[case(MaxUnavailable::from("50%"), 2, 1)]
    #[case(MaxUnavailable::from("50%"), 5, 2)]
    #[case(MaxUnavailable::from("10%"), 5, 0)]
    #[case(MaxUnavailable::from("100%"), 7, 7)]
    #[case(MaxUnavailable::from("150%"), 2, 3)]
    #[case(MaxUnavailable::from("0%"), 9, 0)]
    #[case(MaxUnavailable::from("50%"), 0, 0)]
    #[case(MaxUnavailable::from("1000000000000000000%"), 20, u32::MAX)]
    #[case(MaxUnavailable::from("18446744073709551615%"), 1, u32::MAX)]
    #[case(MaxUnavailable::from("1000000000000000000%"), 0, 0)]
    fn test_compute_budget(
        #[case] max_unavailable: MaxUnavailable,
        #[case] eligible: usize,
        #[case] expected: u32,
    ) {
        assert_eq!(compute_budget(&max_unavailable, eligible).unwrap(), expected);
    }

    #[rstest]
    #[case("10%", 5, 1)]
    #[case("0%", 5, 0)]
    #[case("10%", 0, 0)]
    #[case("50%", 5, 2)]
    #[case("1000000000000000000%", 20, u32::MAX)]
    fn test_compute_budget_at_least_one(
        #[case] percent: &str,
        #[case] eligible: usize,
        #[case] expected: u32,
    ) {
        let budget = compute_budget_with(
            &MaxUnavailable::from(percent),
            eligible,
            BudgetRounding::DownAtLeastOne,
        )
        .unwrap();
        assert_eq!(budget, expected);
    }

    #[rstest]
    #[case("50")]
    #[case("%")]
    #[case("-5%")]
    #[case("5.5%")]
    #[case("fifty%")]
    #[case("")]
    fn test_malformed_percent(#[case] raw: &str) {
        let err = compute_budget(&MaxUnavailable::from(raw), 4).unwrap_err();
        assert!(matches!(err, BudgetError::MalformedPercent { .. }));
    }

    #[test]
    fn test_negative_absolute() {
        let err = compute_budget(&MaxUnavailable::Int(-1), 4).unwrap_err();
        assert_eq!(err, BudgetError::Negative { value: -1 });
    }

    #[test]
    fn test_no_nodes() {
        let topology = NodeTopology::default();
        let budget = get_unavailable_budget(
            &UpdateStrategy::rolling(0),
            &[],
            &topology,
            BudgetRounding::Down,
        )
        .unwrap();
        assert_eq!(budget.max_unavailable, 0);
        assert_eq!(budget.num_unavailable, 0);

        let percent = get_unavailable_budget(
            &UpdateStrategy::rolling("50%"),
            &[],
            &topology,
            BudgetRounding::Down,
        )
        .unwrap();
        assert_eq!(percent.max_unavailable, 0);
        assert_eq!(percent.num_unavailable, 0);
    }

    #[test]
    fn test_two_nodes_with_ready_pods() {
        let nodes = nodes(2);
        let topology = NodeTopology::build(&nodes, vec![ready_pod("node-0"), ready_pod("node-1")]);

        let budget =
            get_unavailable_budget(&UpdateStrategy::rolling(1), &nodes, &topology, BudgetRounding::Down)
                .unwrap();
        assert_eq!(budget, UnavailableBudget { max_unavailable: 1, num_unavailable: 0 });
    }

    #[test]
    fn test_node_without_pods_is_unavailable() {
        let nodes = nodes(2);
        let topology = NodeTopology::build(&nodes, vec![ready_pod("node-0")]);

        let budget =
            get_unavailable_budget(&UpdateStrategy::rolling(0), &nodes, &topology, BudgetRounding::Down)
                .unwrap();
        assert_eq!(budget, UnavailableBudget { max_unavailable: 0, num_unavailable: 1 });
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn test_percent_with_terminating_pod() {
        let nodes = nodes(2);
        let mut terminating = ready_pod("node-1");
        terminating.deletion_timestamp = Some(Utc::now());
        let topology = NodeTopology::build(&nodes, vec![ready_pod("node-0"), terminating]);

        let budget = get_unavailable_budget(
            &UpdateStrategy::rolling("50%"),
            &nodes,
            &topology,
            BudgetRounding::Down,
        )
        .unwrap();
        assert_eq!(budget, UnavailableBudget { max_unavailable: 1, num_unavailable: 1 });
    }

    #[test]
    fn test_on_delete_has_no_budget() {
        let nodes = nodes(3);
        let topology = NodeTopology::build(&nodes, vec![ready_pod("node-0")]);

        let budget =
            get_unavailable_budget(&UpdateStrategy::OnDelete, &nodes, &topology, BudgetRounding::Down)
                .unwrap();
        assert_eq!(budget.max_unavailable, 0);
        assert_eq!(budget.num_unavailable, 2);
    }

    #[test]
    fn test_remaining_saturates() {
        let budget = UnavailableBudget {
            max_unavailable: 2,
            num_unavailable: 5,
        };
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn test_rounding_from_str() {
        assert_eq!("down".parse::<BudgetRounding>().unwrap(), BudgetRounding::Down);
        assert_eq!(
            "down-at-least-one".parse::<BudgetRounding>().unwrap(),
            BudgetRounding::DownAtLeastOne
        );
        assert!("up".parse::<BudgetRounding>().is_err());
    }

    proptest! {
        #[test]
        fn prop_percent_is_floor(percent in 0u64..=200, nodes in 0usize..=500) {
            let raw = format!("{percent}%");
            let budget = compute_budget(&MaxUnavailable::Percent(raw), nodes).unwrap();
            prop_assert_eq!(u64::from(budget), percent * nodes as u64 / 100);
        }

        #[test]
        fn prop_any_percent_saturates(percent in any::<u64>(), nodes in 0usize..=100_000) {
            let raw = format!("{percent}%");
            let budget = compute_budget(&MaxUnavailable::Percent(raw), nodes).unwrap();
            let exact = u128::from(percent) * nodes as u128 / 100;
            prop_assert_eq!(u128::from(budget), exact.min(u128::from(u32::MAX)));
        }

        #[test]
        fn prop_at_least_one_differs_only_on_zero(percent in 0u64..=100, nodes in 0usize..=500) {
            let raw = MaxUnavailable::Percent(format!("{percent}%"));
            let down = compute_budget_with(&raw, nodes, BudgetRounding::Down).unwrap();
            let at_least_one =
                compute_budget_with(&raw, nodes, BudgetRounding::DownAtLeastOne).unwrap();

            if down > 0 || percent == 0 || nodes == 0 {
                prop_assert_eq!(down, at_least_one);
            } else {
                prop_assert_eq!(at_least_one, 1);
            }
        }

        #[test]
        fn prop_absolute_passthrough(value in 0i64..10_000, nodes in 0usize..100) {
            let budget = compute_budget(&MaxUnavailable::Int(value), nodes).unwrap();
            prop_assert_eq!(i64::from(budget), value);
        }
    }
}
