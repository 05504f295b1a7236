//! Dedup & relabel stage plus the prior-sources policy.
//!
//! Turns a hop's candidate frontier into the ordered source list handed to
//! the local sampling primitive. Sources come out sorted by (label, vertex),
//! so a label's requests are contiguous and the draw offsets each source
//! gets do not depend on the order candidates arrived in.

use hashbrown::HashSet;

use crate::algs::frontier::FrontierEntry;
use crate::config::PriorSourcesBehavior;
use crate::topology::vertex::VertexId;

/// Per-call source selector; remembers which (vertex, label) pairs have
/// already been used as sources when the policy needs it.
#[derive(Clone, Debug)]
pub struct SourceSelector<V: VertexId> {
    behavior: PriorSourcesBehavior,
    dedupe: bool,
    used: HashSet<FrontierEntry<V>>,
    /// `used` in first-use order, for carry-over.
    used_order: Vec<FrontierEntry<V>>,
}

impl<V: VertexId> SourceSelector<V> {
    pub fn new(behavior: PriorSourcesBehavior, dedupe: bool) -> Self {
        Self {
            behavior,
            dedupe,
            used: HashSet::new(),
            used_order: Vec::new(),
        }
    }

    /// Sources to sample this hop from `candidates`.
    pub fn select(&mut self, mut candidates: Vec<FrontierEntry<V>>) -> Vec<FrontierEntry<V>> {
        match self.behavior {
            PriorSourcesBehavior::Default => {}
            PriorSourcesBehavior::Exclude => candidates.retain(|e| !self.used.contains(e)),
            PriorSourcesBehavior::CarryOver => {
                candidates.extend(self.used_order.iter().copied());
            }
        }

        if self.dedupe {
            candidates.sort_unstable();
            candidates.dedup();
        } else {
            candidates.sort();
        }

        if self.behavior != PriorSourcesBehavior::Default {
            for &e in &candidates {
                if self.used.insert(e) {
                    self.used_order.push(e);
                }
            }
        }
        candidates
    }

    /// Distinct (vertex, label) pairs used as sources so far.
    pub fn used_len(&self) -> usize {
        self.used.len()
    }
}
