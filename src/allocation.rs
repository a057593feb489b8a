//! Allocation engine (C6): turns a canonically-sorted candidate list into a
//! bounded set of work slices within a budget.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scoring::ScoredCandidate;

/// Per-item effective session window after clamping against the item's
/// remaining planned work and the project/work-item session policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveWindow {
    pub lo: u32,
    pub hi: u32,
}

/// Allocation-time view of one candidate — the fields the allocator needs
/// that scoring doesn't carry.
#[derive(Debug, Clone)]
pub struct AllocationCandidate {
    pub scored: ScoredCandidate,
    pub min_session: u32,
    pub max_session: u32,
    pub default_session: u32,
    /// `planned_min - logged_min`, if positive; `None` means unbounded
    /// (fixed-duration or already-over items don't cap the window).
    pub remaining_planned_min: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkSlice {
    pub work_item_id: Uuid,
    pub project_id: Uuid,
    pub allocated_min: u32,
    pub min_session: u32,
    pub max_session: u32,
    pub score_for_display: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationBlocker {
    pub work_item_id: Uuid,
    pub code: crate::error::BlockerCode,
}

#[derive(Debug, Clone)]
pub struct AllocationResult {
    pub slices: Vec<WorkSlice>,
    pub blockers: Vec<AllocationBlocker>,
    pub unallocated_min: u32,
}

fn effective_window(candidate: &AllocationCandidate, available_min: u32) -> EffectiveWindow {
    let hi_policy = if candidate.default_session > 0 {
        candidate.max_session.min(candidate.default_session)
    } else {
        candidate.max_session
    };
    let mut hi = hi_policy;
    if let Some(remaining) = candidate.remaining_planned_min {
        if remaining > 0 {
            hi = hi.min(remaining);
        }
    }
    hi = hi.min(available_min);
    EffectiveWindow {
        lo: candidate.min_session,
        hi,
    }
}

/// Blocked both when the budget can't cover `lo` and when the item's own
/// remaining planned work is narrower than `lo` — in both cases there's no
/// way to take a slice that respects the minimum session length.
fn allocate_one(candidate: &AllocationCandidate, available_min: u32) -> Result<u32, ()> {
    let window = effective_window(candidate, available_min);
    if available_min < window.lo || window.hi < window.lo {
        return Err(());
    }
    let target = candidate.default_session.clamp(window.lo, window.hi);
    Ok(target)
}

/// Allocates up to `max_slices` slices from `candidates` (already
/// canonically sorted) against `available_min`. When `enforce_variation` is
/// set and `critical_mode` is false, runs the two-pass variation policy;
/// otherwise allocates in strict canonical order.
pub fn allocate(
    candidates: &[AllocationCandidate],
    available_min: u32,
    max_slices: usize,
    enforce_variation: bool,
    critical_mode: bool,
) -> AllocationResult {
    let mut remaining = available_min;
    let mut slices = Vec::new();
    let mut blockers = Vec::new();
    let mut chosen = std::collections::HashSet::new();

    let mut try_take = |candidate: &AllocationCandidate,
                         remaining: &mut u32,
                         slices: &mut Vec<WorkSlice>,
                         blockers: &mut Vec<AllocationBlocker>|
     -> bool {
        match allocate_one(candidate, *remaining) {
            Ok(allocated) => {
                *remaining -= allocated;
                slices.push(WorkSlice {
                    work_item_id: candidate.scored.work_item_id,
                    project_id: candidate.scored.project_id,
                    allocated_min: allocated,
                    min_session: candidate.min_session,
                    max_session: candidate.max_session,
                    score_for_display: candidate.scored.total_score,
                });
                true
            }
            Err(()) => {
                blockers.push(AllocationBlocker {
                    work_item_id: candidate.scored.work_item_id,
                    code: crate::error::BlockerCode::SessionMinExceedsAvail,
                });
                false
            }
        }
    };

    if enforce_variation && !critical_mode {
        let mut seen_projects = std::collections::HashSet::new();
        let mut attempted = std::collections::HashSet::new();
        for candidate in candidates {
            if slices.len() >= max_slices || remaining == 0 {
                break;
            }
            if !seen_projects.insert(candidate.scored.project_id) {
                continue;
            }
            attempted.insert(candidate.scored.work_item_id);
            if try_take(candidate, &mut remaining, &mut slices, &mut blockers) {
                chosen.insert(candidate.scored.work_item_id);
            }
        }
        for candidate in candidates {
            if slices.len() >= max_slices || remaining == 0 {
                break;
            }
            if chosen.contains(&candidate.scored.work_item_id)
                || attempted.contains(&candidate.scored.work_item_id)
            {
                continue;
            }
            if try_take(candidate, &mut remaining, &mut slices, &mut blockers) {
                chosen.insert(candidate.scored.work_item_id);
            }
        }
    } else {
        for candidate in candidates {
            if slices.len() >= max_slices || remaining == 0 {
                break;
            }
            try_take(candidate, &mut remaining, &mut slices, &mut blockers);
        }
    }

    let allocated_total: u32 = slices.iter().map(|s| s.allocated_min).sum();
    AllocationResult {
        slices,
        blockers,
        unallocated_min: available_min.saturating_sub(allocated_total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskLevel;

    fn candidate(id: u128, project: u128, default_session: u32) -> AllocationCandidate {
        AllocationCandidate {
            scored: ScoredCandidate {
                work_item_id: Uuid::from_u128(id),
                project_id: Uuid::from_u128(project),
                work_item_seq: id as u64,
                project_risk: RiskLevel::OnTrack,
                effective_due_date: None,
                factor_deadline_pressure: 0.0,
                factor_behind_pace: 0.0,
                factor_spacing: 0.0,
                factor_variation: 0.0,
                total_score: 1.0 / id as f64,
            },
            min_session: 15,
            max_session: 60,
            default_session,
            remaining_planned_min: None,
        }
    }

    #[test]
    fn allocates_default_session_when_budget_allows() {
        let candidates = vec![candidate(1, 1, 30)];
        let result = allocate(&candidates, 120, 3, false, false);
        assert_eq!(result.slices.len(), 1);
        assert_eq!(result.slices[0].allocated_min, 30);
        assert_eq!(result.unallocated_min, 90);
    }

    #[test]
    fn blocks_when_available_below_min_session() {
        let candidates = vec![candidate(1, 1, 30)];
        let result = allocate(&candidates, 10, 3, false, false);
        assert!(result.slices.is_empty());
        assert_eq!(result.blockers.len(), 1);
        assert_eq!(
            result.blockers[0].code,
            crate::error::BlockerCode::SessionMinExceedsAvail
        );
    }

    #[test]
    fn respects_max_slices() {
        let candidates = vec![
            candidate(1, 1, 30),
            candidate(2, 1, 30),
            candidate(3, 1, 30),
            candidate(4, 1, 30),
        ];
        let result = allocate(&candidates, 200, 2, false, false);
        assert_eq!(result.slices.len(), 2);
    }

    #[test]
    fn remaining_planned_min_narrower_than_min_session_blocks() {
        let mut c = candidate(1, 1, 30);
        c.remaining_planned_min = Some(10); // below min_session(15): can't take a valid slice
        let result = allocate(&[c], 120, 3, false, false);
        assert!(result.slices.is_empty());
        assert_eq!(result.blockers.len(), 1);
    }

    #[test]
    fn clamps_to_remaining_planned_min_above_min_session() {
        let mut c = candidate(1, 1, 30);
        c.remaining_planned_min = Some(20);
        let result = allocate(&[c], 120, 3, false, false);
        assert_eq!(result.slices[0].allocated_min, 20);
    }

    #[test]
    fn variation_policy_spreads_across_projects_first() {
        let candidates = vec![
            candidate(1, 1, 30),
            candidate(2, 1, 30),
            candidate(3, 2, 30),
        ];
        let result = allocate(&candidates, 200, 2, true, false);
        assert_eq!(result.slices.len(), 2);
        let projects: std::collections::HashSet<_> =
            result.slices.iter().map(|s| s.project_id).collect();
        assert_eq!(projects.len(), 2);
    }

    #[test]
    fn variation_policy_blocks_failing_candidate_only_once() {
        // Project 1's sole candidate needs a longer minimum session than the
        // whole budget allows; projects 2 and 3 each have a candidate that
        // fits fine within the same budget.
        let mut unfit = candidate(1, 1, 30);
        unfit.min_session = 25;
        let candidates = vec![unfit, candidate(2, 2, 30), candidate(3, 3, 30)];
        let result = allocate(&candidates, 20, 3, true, false);
        let distinct_blocked: std::collections::HashSet<_> =
            result.blockers.iter().map(|b| b.work_item_id).collect();
        assert_eq!(result.blockers.len(), distinct_blocked.len());
        assert_eq!(distinct_blocked.len(), 1);
        assert!(distinct_blocked.contains(&Uuid::from_u128(1)));
    }

    #[test]
    fn sum_of_allocations_never_exceeds_requested() {
        let candidates = vec![candidate(1, 1, 30), candidate(2, 1, 30), candidate(3, 1, 30)];
        let result = allocate(&candidates, 50, 3, false, false);
        let total: u32 = result.slices.iter().map(|s| s.allocated_min).sum();
        assert!(total <= 50);
    }
}
