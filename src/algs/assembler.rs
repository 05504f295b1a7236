//! Result assembly: accumulate sampled edges, group them by label and turn
//! them into typed output columns.
//!
//! Rows are kept in wire form while hops run, so that the optional
//! rebalance step can ship them without another encoding pass. Grouping is a
//! stable counting sort over the global label order, so the relative order
//! of rows inside a label segment is the order they were appended in.

use std::ops::Range;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::algs::wire::{WireEdge, WireLabel};
use crate::debug_invariants::DebugInvariants;
use crate::graph::PropertyPresence;
use crate::sampler_error::{SamplerError, try_reserve};
use crate::topology::vertex::{EdgeId, EdgeType, EdgeWeight, Label, VertexId};

// ===== Label bookkeeping ===================================================

/// Distinct labels of one rank's starting list, in first-occurrence order.
pub fn first_occurrence(labels: &[Label]) -> Vec<WireLabel> {
    let mut seen = hashbrown::HashSet::with_capacity(labels.len());
    labels
        .iter()
        .filter(|&&l| seen.insert(l))
        .map(|&l| WireLabel::new(l))
        .collect()
}

/// Group-wide label order: first occurrence in the concatenation of every
/// rank's starting labels, in rank order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelOrder {
    labels: Vec<Label>,
    position: HashMap<Label, usize>,
}

impl LabelOrder {
    /// Merge the per-rank first-occurrence lists gathered from every rank.
    pub fn from_gathered(per_rank: &[Vec<WireLabel>]) -> Self {
        let mut order = LabelOrder::default();
        for l in per_rank.iter().flatten().map(WireLabel::get) {
            let next = order.labels.len();
            order.position.entry(l).or_insert_with(|| {
                order.labels.push(l);
                next
            });
        }
        order
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn position(&self, label: Label) -> Option<usize> {
        self.position.get(&label).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Destination rank for every label's output rows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelToRankMap {
    map: HashMap<Label, usize>,
}

impl LabelToRankMap {
    /// Build from `(label, rank)` pairs; a label may appear only once.
    pub fn new(pairs: impl IntoIterator<Item = (Label, usize)>) -> Result<Self, SamplerError> {
        let mut map = HashMap::new();
        for (label, rank) in pairs {
            if map.insert(label, rank).is_some_and(|prev| prev != rank) {
                return Err(SamplerError::invalid(format!(
                    "label {label} mapped to more than one output rank"
                )));
            }
        }
        Ok(Self { map })
    }

    /// Build from parallel label / rank columns.
    pub fn from_columns(labels: &[Label], ranks: &[usize]) -> Result<Self, SamplerError> {
        if labels.len() != ranks.len() {
            return Err(SamplerError::invalid(format!(
                "label map has {} labels but {} ranks",
                labels.len(),
                ranks.len()
            )));
        }
        Self::new(labels.iter().copied().zip(ranks.iter().copied()))
    }

    pub fn rank_of(&self, label: Label) -> Option<usize> {
        self.map.get(&label).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The map must cover exactly the labels in use and name existing ranks.
    pub(crate) fn validate(&self, order: &LabelOrder, group_size: usize) -> Result<(), SamplerError> {
        for &l in order.labels() {
            match self.rank_of(l) {
                None => {
                    return Err(SamplerError::invalid(format!("label {l} has no output rank")));
                }
                Some(r) if r >= group_size => {
                    return Err(SamplerError::invalid(format!(
                        "label {l} mapped to rank {r}, group has {group_size} ranks"
                    )));
                }
                Some(_) => {}
            }
        }
        let mut unused: Vec<Label> = self
            .map
            .keys()
            .copied()
            .filter(|&l| order.position(l).is_none())
            .collect();
        if !unused.is_empty() {
            unused.sort_unstable();
            return Err(SamplerError::invalid(format!(
                "label map references labels not in any starting list: {unused:?}"
            )));
        }
        Ok(())
    }
}

/// `offsets[i]..offsets[i + 1]` is the row range of `labels[i]`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelOffsets {
    pub labels: Vec<Label>,
    pub offsets: Vec<usize>,
}

impl LabelOffsets {
    /// Rows of `label` on this rank; `None` if the label is not in use.
    pub fn segment(&self, label: Label) -> Option<Range<usize>> {
        let i = self.labels.iter().position(|&l| l == label)?;
        Some(self.offsets[i]..self.offsets[i + 1])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Label, Range<usize>)> + '_ {
        self.labels
            .iter()
            .zip(self.offsets.windows(2))
            .map(|(&l, w)| (l, w[0]..w[1]))
    }
}

// ===== Accumulation ========================================================

/// Edges that landed on this rank, in arrival order; append-only.
#[derive(Clone, Debug, Default)]
pub struct SampledBatch {
    rows: Vec<WireEdge>,
    per_hop: Vec<usize>,
}

impl SampledBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the edges received for one hop.
    pub fn append_hop(&mut self, received: &[WireEdge]) -> Result<(), SamplerError> {
        try_reserve(&mut self.rows, received.len(), "sampled edge rows")?;
        self.rows.extend_from_slice(received);
        self.per_hop.push(received.len());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows received in each completed hop.
    pub fn per_hop(&self) -> &[usize] {
        &self.per_hop
    }

    pub fn into_rows(self) -> Vec<WireEdge> {
        self.rows
    }
}

/// Stable grouping of `rows` by `order`; every label gets a (maybe empty)
/// segment.
pub fn group_by_label(
    rows: Vec<WireEdge>,
    order: &LabelOrder,
) -> Result<(Vec<WireEdge>, LabelOffsets), SamplerError> {
    let mut slot = Vec::new();
    try_reserve(&mut slot, rows.len(), "label grouping")?;
    let mut counts = vec![0usize; order.len()];
    for r in &rows {
        let p = order.position(r.label()).ok_or_else(|| {
            SamplerError::invalid(format!("row carries label {} not in use", r.label()))
        })?;
        counts[p] += 1;
        slot.push(p);
    }

    let mut offsets = Vec::with_capacity(order.len() + 1);
    offsets.push(0);
    for c in &counts {
        offsets.push(offsets[offsets.len() - 1] + c);
    }

    let mut cursor = offsets[..order.len()].to_vec();
    let mut grouped = Vec::new();
    try_reserve(&mut grouped, rows.len(), "label grouping")?;
    grouped.resize(rows.len(), bytemuck::Zeroable::zeroed());
    for (r, p) in rows.into_iter().zip(slot) {
        grouped[cursor[p]] = r;
        cursor[p] += 1;
    }
    Ok((
        grouped,
        LabelOffsets {
            labels: order.labels().to_vec(),
            offsets,
        },
    ))
}

// ===== Output ==============================================================

/// Which columns a call produces.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct OutputShape {
    pub properties: PropertyPresence,
    pub hops: bool,
    pub labels: bool,
}

/// Sampled edges held by one rank; all present columns have equal length.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleOutput<V, E, W> {
    pub sources: Vec<V>,
    pub destinations: Vec<V>,
    pub weights: Option<Vec<W>>,
    pub edge_ids: Option<Vec<E>>,
    pub edge_types: Option<Vec<EdgeType>>,
    pub hops: Option<Vec<i32>>,
    pub labels: Option<Vec<Label>>,
    pub label_offsets: Option<LabelOffsets>,
}

impl<V: VertexId, E: EdgeId, W: EdgeWeight> SampleOutput<V, E, W> {
    /// Decode wire rows into the columns named by `shape`.
    pub fn from_rows(
        rows: &[WireEdge],
        shape: OutputShape,
        label_offsets: Option<LabelOffsets>,
    ) -> Result<Self, SamplerError> {
        fn column<T>(
            rows: &[WireEdge],
            present: bool,
            f: impl Fn(&WireEdge) -> T,
        ) -> Result<Option<Vec<T>>, SamplerError> {
            if !present {
                return Ok(None);
            }
            let mut col = Vec::new();
            try_reserve(&mut col, rows.len(), "output column")?;
            col.extend(rows.iter().map(f));
            Ok(Some(col))
        }

        let p = shape.properties;
        let out = SampleOutput {
            sources: column(rows, true, |r| V::from_wire(r.src()))?.unwrap_or_default(),
            destinations: column(rows, true, |r| V::from_wire(r.dst()))?.unwrap_or_default(),
            weights: column(rows, p.weights, |r| W::from_wire(r.weight()))?,
            edge_ids: column(rows, p.edge_ids, |r| E::from_wire(r.edge_id()))?,
            edge_types: column(rows, p.edge_types, WireEdge::edge_type)?,
            hops: column(rows, shape.hops, WireEdge::hop)?,
            labels: column(rows, shape.labels, WireEdge::label)?,
            label_offsets,
        };
        out.debug_assert_invariants();
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Row range of `label`, when the call was labeled.
    pub fn label_segment(&self, label: Label) -> Option<Range<usize>> {
        self.label_offsets.as_ref()?.segment(label)
    }

    /// `(source, destination)` pairs in row order.
    pub fn edges(&self) -> impl Iterator<Item = (V, V)> + '_ {
        self.sources.iter().copied().zip(self.destinations.iter().copied())
    }
}

impl<V: VertexId, E: EdgeId, W: EdgeWeight> DebugInvariants for SampleOutput<V, E, W> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "SampleOutput");
    }

    fn validate_invariants(&self) -> Result<(), SamplerError> {
        let n = self.sources.len();
        let lens = [
            ("destinations", Some(self.destinations.len())),
            ("weights", self.weights.as_ref().map(Vec::len)),
            ("edge_ids", self.edge_ids.as_ref().map(Vec::len)),
            ("edge_types", self.edge_types.as_ref().map(Vec::len)),
            ("hops", self.hops.as_ref().map(Vec::len)),
            ("labels", self.labels.as_ref().map(Vec::len)),
        ];
        for (name, len) in lens {
            if let Some(len) = len {
                if len != n {
                    return Err(SamplerError::invalid(format!(
                        "output column {name} has {len} rows, sources has {n}"
                    )));
                }
            }
        }
        if let Some(lo) = &self.label_offsets {
            if lo.offsets.len() != lo.labels.len() + 1
                || lo.offsets.first() != Some(&0)
                || lo.offsets.last() != Some(&n)
                || lo.offsets.windows(2).any(|w| w[0] > w[1])
            {
                return Err(SamplerError::invalid(format!(
                    "label offsets {:?} do not partition {n} rows",
                    lo.offsets
                )));
            }
            if let Some(labels) = &self.labels {
                for (l, range) in lo.iter() {
                    if labels[range].iter().any(|&x| x != l) {
                        return Err(SamplerError::invalid(format!(
                            "segment of label {l} holds rows of another label"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
