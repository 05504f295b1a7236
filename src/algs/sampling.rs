//! Multi-hop uniform neighbor sampling over a partitioned graph.
//!
//! [`uniform_neighbor_sample`] is a collective: every rank of the group calls
//! it with the same fan-out and flags, and all of them return together,
//! either each with its share of the sample or all with an error.
//!
//! ```text
//! INIT      validate, agree on flags and labels, route seeds to owners
//! hop h     dedup -> local sample -> route edges by destination owner
//!           -> append -> next frontier
//! FINALIZE  group by label, optional rebalance, commit draw counts
//! ```
//!
//! Each stage ends in one sequenced [`Exchange`] round. A rank that fails
//! locally aborts the next round instead of silently leaving, so its peers
//! fail with [`SamplerError::PeerAborted`] rather than block.
//! The caller's [`RngState`] is advanced only after the final commit round
//! succeeds on every rank.

use crate::algs::assembler::{
    LabelOrder, LabelToRankMap, OutputShape, SampleOutput, SampledBatch, first_occurrence,
    group_by_label,
};
use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::dedup::SourceSelector;
use crate::algs::exchange::Exchange;
use crate::algs::frontier::{Frontier, FrontierEntry};
use crate::algs::rng::RngState;
use crate::algs::wire::{WireEdge, WireFrontier, kind};
use crate::config::{PriorSourcesBehavior, SamplingConfig};
use crate::graph::{EdgeProperties, PartitionedGraph};
use crate::sampler_error::{SamplerError, try_reserve};
use crate::topology::ownership::mix64;
use crate::topology::vertex::{EdgeId, EdgeWeight, Label, VertexId};

/// Base tag of the sampling exchanges (header on `+0`, payload on `+1`).
pub const SAMPLING_TAG: CommTag = CommTag::new(0x5300);

/// Per-rank inputs of one sampling call.
#[derive(Copy, Clone, Debug)]
pub struct SampleRequest<'a, V> {
    /// Seeds held by this rank; they need not be owned locally.
    pub starting_vertices: &'a [V],
    /// One label per seed; all ranks either pass labels or none do.
    pub starting_labels: Option<&'a [Label]>,
    /// Where each label's rows end up; requires labels.
    pub label_to_output_rank: Option<&'a LabelToRankMap>,
    /// Per-hop fan-out; `-1` takes every out-edge. Same on every rank.
    pub fan_out: &'a [i32],
}

impl<'a, V: VertexId> SampleRequest<'a, V> {
    pub fn new(starting_vertices: &'a [V], fan_out: &'a [i32]) -> Self {
        Self {
            starting_vertices,
            starting_labels: None,
            label_to_output_rank: None,
            fan_out,
        }
    }

    pub fn with_labels(mut self, labels: &'a [Label]) -> Self {
        self.starting_labels = Some(labels);
        self
    }

    pub fn with_label_map(mut self, map: &'a LabelToRankMap) -> Self {
        self.label_to_output_rank = Some(map);
        self
    }
}

pub type SampleOutputU32U32 = SampleOutput<u32, u32, f32>;
pub type SampleOutputU32U64 = SampleOutput<u32, u64, f32>;
pub type SampleOutputU64U64 = SampleOutput<u64, u64, f64>;
pub type SampleOutputI32I32 = SampleOutput<i32, i32, f32>;
pub type SampleOutputI32I64 = SampleOutput<i32, i64, f32>;
pub type SampleOutputI64I64 = SampleOutput<i64, i64, f64>;

/// Sample `fan_out.len()` hops of uniform neighbors from the seeds.
///
/// On success every rank returns the edges it holds and `rng_state` has
/// moved past all randomness the call consumed anywhere in the group. On
/// error `rng_state` is untouched and no partial output is returned.
pub fn uniform_neighbor_sample<V, E, W, G, C>(
    comm: &C,
    graph: &G,
    props: EdgeProperties<'_, E, W>,
    request: &SampleRequest<'_, V>,
    rng_state: &mut RngState,
    cfg: &SamplingConfig,
) -> Result<SampleOutput<V, E, W>, SamplerError>
where
    V: VertexId,
    E: EdgeId,
    W: EdgeWeight,
    G: PartitionedGraph<V> + ?Sized,
    C: Communicator,
{
    let mut ex = Exchange::new(comm, SAMPLING_TAG);
    let run = SamplingRun {
        graph,
        props,
        request,
        rng: *rng_state,
        cfg,
    };
    match run.execute(&mut ex) {
        Ok((out, group_draws)) => {
            rng_state.advance(group_draws);
            Ok(out)
        }
        Err(err) => {
            if !matches!(err, SamplerError::PeerAborted { .. }) {
                ex.abort(&err);
            }
            Err(err)
        }
    }
}

struct SamplingRun<'r, 'p, V, E, W, G: ?Sized> {
    graph: &'r G,
    props: EdgeProperties<'p, E, W>,
    request: &'r SampleRequest<'r, V>,
    rng: RngState,
    cfg: &'r SamplingConfig,
}

impl<V, E, W, G> SamplingRun<'_, '_, V, E, W, G>
where
    V: VertexId,
    E: EdgeId,
    W: EdgeWeight,
    G: PartitionedGraph<V> + ?Sized,
{
    /// Returns this rank's output and the group-wide draw count.
    fn execute<C: Communicator>(
        &self,
        ex: &mut Exchange<'_, C>,
    ) -> Result<(SampleOutput<V, E, W>, u64), SamplerError> {
        let me = ex.rank();
        self.validate_local(ex)?;

        // INIT: agree on the call shape, then on the label order.
        let seeds = Frontier::seeds(self.request.starting_vertices, self.request.starting_labels)?;
        let present = self.props.presence();
        let flags = u64::from(self.request.starting_labels.is_some())
            | u64::from(self.request.label_to_output_rank.is_some()) << 1
            | u64::from(present.weights) << 8
            | u64::from(present.edge_ids) << 9
            | u64::from(present.edge_types) << 10;
        let local_labels = self
            .request
            .starting_labels
            .map(first_occurrence)
            .unwrap_or_default();
        let n = ex.size();
        let round = ex.all_to_all(
            kind::LABELS,
            vec![local_labels; n],
            self.call_fingerprint(flags),
        )?;
        if round.values.iter().any(|&v| v != round.values[me]) {
            return Err(SamplerError::invalid(
                "fan_out, flags, label usage or edge property views differ across ranks",
            ));
        }
        let mut per_rank = Vec::with_capacity(round.counts.len());
        let mut rest = round.records.as_slice();
        for &c in &round.counts {
            let (head, tail) = rest.split_at(c);
            per_rank.push(head.to_vec());
            rest = tail;
        }
        let order = LabelOrder::from_gathered(&per_rank);
        if let Some(map) = self.request.label_to_output_rank {
            map.validate(&order, n)?;
        }

        let ownership = self.graph.ownership();
        let seeds: Vec<WireFrontier> = seeds.into_iter().map(FrontierEntry::to_wire).collect();
        let routed = ex.redistribute(kind::SEEDS, seeds, |s| ownership.owner(V::from_wire(s.vertex())))?;
        let mut frontier = Frontier::<V>::initial(&routed);

        // Hops.
        let mut selector =
            SourceSelector::new(self.cfg.prior_sources_behavior, self.cfg.dedupe_sources);
        let mut batch = SampledBatch::new();
        let mut max_draws = 0u64;
        for (hop, &fanout) in self.request.fan_out.iter().enumerate() {
            let frontier_len = frontier.len();
            let sources = selector.select(frontier.take_entries());
            let (outgoing, draws) = self.sample_hop(me, hop, fanout, &sources)?;
            max_draws = max_draws.max(draws);
            let sampled = outgoing.len();
            let received = ex.redistribute(kind::HOP_EDGES, outgoing, |e| {
                ownership.owner(V::from_wire(e.dst()))
            })?;
            log::debug!(
                "[rank {me}] hop {hop}: frontier {frontier_len}, sources {}, sampled {sampled}, received {}",
                sources.len(),
                received.len()
            );
            batch.append_hop(&received)?;
            frontier = frontier.advance(&received)?;
        }

        // FINALIZE.
        log::debug!(
            "[rank {me}] rows per hop {:?}, {} distinct sources used",
            batch.per_hop(),
            selector.used_len()
        );
        let mut rows = batch.into_rows();
        if let Some(map) = self.request.label_to_output_rank {
            rows = ex.redistribute(kind::REBALANCE, rows, |r| {
                map.rank_of(r.label()).unwrap_or(usize::MAX)
            })?;
        }
        let labeled = self.request.starting_labels.is_some();
        let (rows, offsets) = if labeled {
            let (grouped, offsets) = group_by_label(rows, &order)?;
            (grouped, Some(offsets))
        } else {
            (rows, None)
        };
        let shape = OutputShape {
            properties: present,
            hops: self.cfg.return_hops,
            labels: labeled,
        };
        let out = SampleOutput::from_rows(&rows, shape, offsets)?;

        let group_draws = ex.all_reduce_max(kind::COMMIT, max_draws)?;
        log::debug!(
            "[rank {me}] sampled {} rows; rng counter advances by {group_draws}",
            out.len()
        );
        Ok((out, group_draws))
    }

    fn validate_local<C: Communicator>(&self, ex: &Exchange<'_, C>) -> Result<(), SamplerError> {
        let req = self.request;
        if req.fan_out.is_empty() {
            return Err(SamplerError::invalid("fan_out must name at least one hop"));
        }
        if let Some(&f) = req.fan_out.iter().find(|&&f| f < -1) {
            return Err(SamplerError::invalid(format!("fan-out {f} is below -1")));
        }
        if req.label_to_output_rank.is_some() && req.starting_labels.is_none() {
            return Err(SamplerError::invalid(
                "label_to_output_rank requires starting labels",
            ));
        }
        let ownership = self.graph.ownership();
        if ownership.num_ranks() != ex.size() || self.graph.rank() != ex.rank() {
            return Err(SamplerError::invalid(format!(
                "graph partition {} of {} used on rank {} of {}",
                self.graph.rank(),
                ownership.num_ranks(),
                ex.rank(),
                ex.size()
            )));
        }
        self.props.check_len(self.graph.local_edge_count())?;
        if self.cfg.do_expensive_check {
            for &v in req.starting_vertices {
                if !ownership.contains(v) {
                    return Err(SamplerError::OutOfRangeVertex {
                        vertex: v.to_wire(),
                        rank: ex.rank(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Mix of everything that must be identical on every rank.
    fn call_fingerprint(&self, flags: u64) -> u64 {
        let cfg = self.cfg;
        let prior = match cfg.prior_sources_behavior {
            PriorSourcesBehavior::Default => 0,
            PriorSourcesBehavior::CarryOver => 1,
            PriorSourcesBehavior::Exclude => 2,
        };
        let mut h = mix64(self.request.fan_out.len() as u64);
        for &f in self.request.fan_out {
            h = mix64(h ^ (f as u32 as u64));
        }
        let bits = flags
            | u64::from(cfg.with_replacement) << 2
            | u64::from(cfg.dedupe_sources) << 3
            | u64::from(cfg.return_hops) << 4
            | prior << 5;
        mix64(h ^ bits)
    }

    /// Sample one hop locally; returns the edge records and draws consumed.
    fn sample_hop(
        &self,
        rank: usize,
        hop: usize,
        fanout: i32,
        sources: &[FrontierEntry<V>],
    ) -> Result<(Vec<WireEdge>, u64), SamplerError> {
        let vertices: Vec<V> = sources.iter().map(|s| s.vertex).collect();
        let sub = self.rng.substream(rank, hop);
        let sample = self.graph.local_sample(
            &vertices,
            fanout,
            self.cfg.with_replacement,
            &sub,
            self.cfg.do_expensive_check,
        )?;
        let mut out = Vec::new();
        try_reserve(&mut out, sample.len(), "hop edge records")?;
        for ((&si, &dst), &pos) in sample
            .source_index
            .iter()
            .zip(&sample.destinations)
            .zip(&sample.edge_positions)
        {
            let src = sources[si];
            let (edge_id, weight, edge_type) = self.props.wire_tags(pos);
            out.push(WireEdge::new(
                src.vertex.to_wire(),
                dst.to_wire(),
                edge_id,
                weight,
                edge_type,
                src.label,
                hop as i32,
            ));
        }
        Ok((out, sample.draws))
    }
}
