//! Capacity planner.
//!
//! Pure function from (ASG config, provider reading, cluster state,
//! running allocation sum) to a scaling decision. Rules are evaluated
//! in order and the first one that changes the target wins:
//!
//! 1. scale up for pending work matching the group's tags;
//! 2. scale up by one to absorb untagged pending work while the group
//!    fleet as a whole is short on capacity;
//! 3. scale down by one when no matching or untagged work exists;
//! 4. otherwise keep the current desired size.

use runnergrid_config::AsgConfig;
use runnergrid_gitlab::ClusterState;
use runnergrid_provider::AsgReading;

/// Outcome of planning one ASG for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Write this target; it differs from the current desired size.
    ScaleTo(i64),
    /// No write required.
    NoChange,
}

/// Compute the target size for `asg`.
///
/// `total_allocated` is the sum of allocations the current tick has
/// accounted so far, including this group's own reading; rule 2 uses it
/// as the fleet-wide deficit check.
pub fn plan(
    asg: &AsgConfig,
    reading: &AsgReading,
    state: &ClusterState,
    total_allocated: i64,
) -> Decision {
    // Defensive clamp: a provider reporting negatives is an error on the
    // read path, but planning still treats them as zero.
    let allocated = reading.allocated.max(0);
    let desired = reading.desired.max(0);

    let pending_for: i64 = asg.tags.iter().map(|tag| state.pending_for_tag(tag)).sum();
    let running_for: i64 = asg.tags.iter().map(|tag| state.running_for_tag(tag)).sum();

    let pending_match = pending_for > 0;
    let running_match = running_for > 0;
    let pending_untagged = state.pending_without_tags > 0;
    let running_untagged = state.running_without_tags > 0;

    // Rule 1: matching pending work beyond the group's free slots.
    if pending_match {
        let free = (allocated - running_for).max(0);
        let additional = (pending_for - free).max(0);
        if additional > 0 {
            let target = (desired + additional).min(asg.max_capacity);
            // Instances still coming up cover the proposal; skip the
            // redundant write.
            if allocated < target && target != desired {
                return Decision::ScaleTo(target);
            }
        }
    }

    // Rule 2: untagged pending work while the fleet is short overall.
    if pending_untagged && state.total_pending + state.total_running > total_allocated {
        let target = (desired + 1).min(asg.max_capacity);
        if target > desired {
            return Decision::ScaleTo(target);
        }
    }

    // Rule 3: nothing to serve, shrink by one down to the floor.
    if !pending_match && !running_match && !pending_untagged && !running_untagged {
        let floor = if asg.scale_to_zero { 0 } else { 1 };
        let target = allocated - 1;
        if target >= floor && target != desired {
            return Decision::ScaleTo(target);
        }
    }

    Decision::NoChange
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn asg(tags: &[&str], max_capacity: i64, scale_to_zero: bool) -> AsgConfig {
        AsgConfig {
            name: "test-asg".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            max_capacity,
            scale_to_zero,
            region: None,
        }
    }

    fn reading(allocated: i64, desired: i64) -> AsgReading {
        AsgReading { allocated, desired }
    }

    fn tag_map(entries: &[(&str, i64)]) -> HashMap<String, i64> {
        entries
            .iter()
            .map(|(tag, count)| (tag.to_string(), *count))
            .collect()
    }

    fn state_with_tags(
        pending: &[(&str, i64)],
        running: &[(&str, i64)],
    ) -> ClusterState {
        let pending_by_tag = tag_map(pending);
        let running_by_tag = tag_map(running);
        ClusterState {
            total_pending: pending_by_tag.values().sum(),
            total_running: running_by_tag.values().sum(),
            pending_without_tags: 0,
            running_without_tags: 0,
            pending_by_tag,
            running_by_tag,
        }
    }

    #[test]
    fn scales_up_for_matching_pending_work() {
        // allocated=1 covers one free slot; four pending amd64 jobs need
        // three more on top of the current desired.
        let state = state_with_tags(&[("amd64", 4)], &[]);
        let decision = plan(&asg(&["amd64"], 10, true), &reading(1, 1), &state, 1);
        assert_eq!(decision, Decision::ScaleTo(4));
    }

    #[test]
    fn overlapping_tags_sum_per_group() {
        let state = state_with_tags(&[("common", 3), ("a", 1), ("b", 2)], &[]);

        let first = plan(&asg(&["common", "a"], 10, false), &reading(1, 1), &state, 1);
        assert_eq!(first, Decision::ScaleTo(4));

        let second = plan(&asg(&["common", "b"], 10, false), &reading(0, 0), &state, 1);
        assert_eq!(second, Decision::ScaleTo(5));
    }

    #[test]
    fn no_write_when_allocation_suffices() {
        // free = 7 - 3 = 4 covers the single pending job.
        let state = state_with_tags(&[("arm64", 1)], &[("arm64", 3)]);
        let decision = plan(&asg(&["arm64"], 10, false), &reading(7, 7), &state, 7);
        assert_eq!(decision, Decision::NoChange);
    }

    #[test]
    fn matching_running_work_blocks_scale_down() {
        // Pending work exists but fits in the free slots, and running
        // work keeps the idle rule from firing.
        let state = state_with_tags(&[("amd64", 3)], &[("amd64", 2)]);
        let decision = plan(&asg(&["amd64"], 10, true), &reading(6, 6), &state, 6);
        assert_eq!(decision, Decision::NoChange);
    }

    #[test]
    fn idle_group_shrinks_by_one() {
        let state = ClusterState::default();
        let decision = plan(&asg(&["amd64"], 10, true), &reading(3, 3), &state, 3);
        assert_eq!(decision, Decision::ScaleTo(2));
    }

    #[test]
    fn floor_of_one_blocks_final_shrink() {
        let state = ClusterState::default();
        let decision = plan(&asg(&["amd64"], 10, false), &reading(1, 1), &state, 1);
        assert_eq!(decision, Decision::NoChange);
    }

    #[test]
    fn scale_to_zero_allows_final_shrink() {
        let state = ClusterState::default();
        let decision = plan(&asg(&["amd64"], 10, true), &reading(1, 1), &state, 1);
        assert_eq!(decision, Decision::ScaleTo(0));
    }

    #[test]
    fn target_never_exceeds_max_capacity() {
        let state = state_with_tags(&[("amd64", 50)], &[]);
        let decision = plan(&asg(&["amd64"], 5, false), &reading(2, 2), &state, 2);
        assert_eq!(decision, Decision::ScaleTo(5));
    }

    #[test]
    fn zero_max_capacity_collapses_scale_up() {
        let state = state_with_tags(&[("amd64", 4)], &[]);
        let decision = plan(&asg(&["amd64"], 0, true), &reading(0, 0), &state, 0);
        assert_eq!(decision, Decision::NoChange);
    }

    #[test]
    fn zero_max_capacity_still_scales_down() {
        let state = ClusterState::default();
        let decision = plan(&asg(&["amd64"], 0, true), &reading(2, 2), &state, 2);
        assert_eq!(decision, Decision::ScaleTo(1));
    }

    #[test]
    fn untagged_pending_work_adds_one_while_fleet_is_short() {
        let state = ClusterState {
            total_pending: 3,
            pending_without_tags: 3,
            ..ClusterState::default()
        };
        // Fleet has accounted 2 allocations so far, backlog is 3.
        let decision = plan(&asg(&["amd64"], 10, false), &reading(2, 2), &state, 2);
        assert_eq!(decision, Decision::ScaleTo(3));
    }

    #[test]
    fn untagged_pending_work_ignored_when_fleet_covers_backlog() {
        let state = ClusterState {
            total_pending: 2,
            pending_without_tags: 2,
            ..ClusterState::default()
        };
        let decision = plan(&asg(&["amd64"], 10, false), &reading(5, 5), &state, 5);
        assert_eq!(decision, Decision::NoChange);
    }

    #[test]
    fn untagged_running_work_only_blocks_scale_down() {
        let state = ClusterState {
            total_running: 1,
            running_without_tags: 1,
            ..ClusterState::default()
        };
        let decision = plan(&asg(&["amd64"], 10, true), &reading(3, 3), &state, 3);
        assert_eq!(decision, Decision::NoChange);
    }

    #[test]
    fn over_allocated_group_is_not_forced_down() {
        // allocated exceeds max capacity, but matching running work
        // keeps the idle rule off; nothing fires.
        let state = state_with_tags(&[], &[("amd64", 1)]);
        let decision = plan(&asg(&["amd64"], 2, true), &reading(5, 5), &state, 5);
        assert_eq!(decision, Decision::NoChange);
    }

    #[test]
    fn negative_reading_fields_planned_as_zero() {
        let state = state_with_tags(&[("amd64", 2)], &[]);
        let decision = plan(&asg(&["amd64"], 10, true), &reading(-3, -1), &state, 0);
        // allocated and desired treated as zero: two jobs need two slots.
        assert_eq!(decision, Decision::ScaleTo(2));
    }

    #[test]
    fn plan_is_idempotent_on_converged_readings() {
        let state = state_with_tags(&[("amd64", 4)], &[]);
        let group = asg(&["amd64"], 10, true);

        let first = plan(&group, &reading(1, 1), &state, 1);
        let Decision::ScaleTo(target) = first else {
            panic!("expected a scale-up");
        };

        // Once allocation has caught up with the written target, the
        // same state plans to the same size with no further write.
        let converged = reading(target, target);
        assert_eq!(plan(&group, &converged, &state, target), Decision::NoChange);
    }

    #[test]
    fn idle_second_pass_requires_no_write() {
        let state = ClusterState::default();
        let group = asg(&["amd64"], 10, true);

        assert_eq!(plan(&group, &reading(3, 3), &state, 3), Decision::ScaleTo(2));
        // Provider converged on 2; the next shrink goes to 1.
        assert_eq!(plan(&group, &reading(2, 2), &state, 2), Decision::ScaleTo(1));
        assert_eq!(plan(&group, &reading(0, 0), &state, 0), Decision::NoChange);
    }

    #[test]
    fn target_respects_floor_and_ceiling_across_inputs() {
        // Invariant sweep: any decision stays within [floor, max].
        let states = [
            ClusterState::default(),
            state_with_tags(&[("t", 100)], &[]),
            state_with_tags(&[("t", 1)], &[("t", 50)]),
            ClusterState {
                total_pending: 10,
                pending_without_tags: 10,
                ..ClusterState::default()
            },
        ];
        for scale_to_zero in [false, true] {
            for max_capacity in [0, 1, 7] {
                let group = asg(&["t"], max_capacity, scale_to_zero);
                for state in &states {
                    for allocated in [0, 1, 5, 9] {
                        for desired in [0, 1, 5, 9] {
                            if let Decision::ScaleTo(target) =
                                plan(&group, &reading(allocated, desired), state, allocated)
                            {
                                assert!(target >= 0, "negative target {target}");
                                let scaled_up = target > desired;
                                if scaled_up {
                                    assert!(
                                        target <= max_capacity,
                                        "scale-up past max: {target} > {max_capacity}"
                                    );
                                } else {
                                    let floor = if scale_to_zero { 0 } else { 1 };
                                    assert!(
                                        target >= floor,
                                        "scale-down below floor: {target} < {floor}"
                                    );
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}
