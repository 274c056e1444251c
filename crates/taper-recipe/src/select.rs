//! Choosing the winning taper among the simulated candidates

use serde::{Deserialize, Serialize};

use crate::geometry::Candidate;
use crate::sweep::OptimalPoint;

/// Per-candidate figures of merit fed to the selection rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub candidate: Candidate,
    /// Optimal length (µm) with T/R (dB) at that length
    pub point: OptimalPoint,
    /// False when the routing loss target could not be met in the swept range
    pub reached_target: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    /// Shortest taper is also the least reflective one
    ShortestAndQuietest,
    /// Shortest taper reflects less than the limit, though another reflects less still
    ShortestBelowLimit,
    /// Shortest taper reflects too much; least reflective taper wins instead
    LowestReflection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub index: usize,
    pub reason: SelectionReason,
}

/// Index of the first minimum, like `list.index(min(list))`.
fn first_min_by<T>(items: &[T], key: impl Fn(&T) -> f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, item) in items.iter().enumerate() {
        let v = key(item);
        match best {
            Some((_, b)) if v.total_cmp(&b).is_ge() => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Pick the shortest taper unless it reflects more than `max_reflection` (dB)
/// and another taper reflects less; then pick the least reflective one.
///
/// Only the shortest and the least reflective candidates are ever compared.
/// Returns `None` when there is nothing to choose from.
pub fn select(scores: &[CandidateScore], max_reflection: f64) -> Option<Selection> {
    let shortest = first_min_by(scores, |s| s.point.length)?;
    let quietest = first_min_by(scores, |s| s.point.reflection)?;

    let selection = if shortest == quietest {
        Selection {
            index: shortest,
            reason: SelectionReason::ShortestAndQuietest,
        }
    } else if scores[shortest].point.reflection < max_reflection {
        Selection {
            index: shortest,
            reason: SelectionReason::ShortestBelowLimit,
        }
    } else {
        Selection {
            index: quietest,
            reason: SelectionReason::LowestReflection,
        }
    };
    Some(selection)
}
