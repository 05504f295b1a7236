#![allow(dead_code)]
use frontier_sampler::{
    algs::communicator::{Communicator, RayonComm},
    algs::rng::RngState,
    algs::sampling::{SampleRequest, uniform_neighbor_sample},
    config::SamplingConfig,
    graph::{EdgeProperties, InMemoryPartition},
    sampler_error::SamplerError,
    topology::ownership::VertexOwnership,
};
use frontier_sampler::algs::assembler::SampleOutput;

/// `{0→1, 1→3, 1→4, 2→0, 2→1, 2→3, 3→5, 4→5}` over vertices `0..6`.
pub const SMALL_EDGES: [(u32, u32); 8] =
    [(0, 1), (1, 3), (1, 4), (2, 0), (2, 1), (2, 3), (3, 5), (4, 5)];

pub type Out = SampleOutput<u32, u32, f32>;

/// Partitions of `edges` for an even contiguous split over `ranks`.
pub fn partitions(edges: &[(u32, u32)], num_vertices: u64, ranks: usize) -> Vec<InMemoryPartition<u32>> {
    let own = VertexOwnership::contiguous_even(num_vertices, ranks);
    InMemoryPartition::build_all(edges, &own).unwrap()
}

/// Run `f(rank_comm)` on `n` in-process ranks and collect per-rank results.
pub fn run_ranks<R, F>(n: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(&RayonComm) -> R + Sync,
{
    let comms = RayonComm::world(n);
    let f = &f;
    std::thread::scope(|s| {
        let handles: Vec<_> = comms.iter().map(|c| s.spawn(move || f(c))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// Sample `SMALL_EDGES` on `n` ranks; `seeds_on(rank)` gives each rank's seeds.
pub fn sample_small(
    n: usize,
    seeds_on: impl Fn(usize) -> Vec<u32> + Sync,
    fan_out: &[i32],
    cfg: &SamplingConfig,
    seed: u64,
) -> Vec<Result<(Out, RngState), SamplerError>> {
    let parts = partitions(&SMALL_EDGES, 6, n);
    run_ranks(n, |c| {
        let seeds = seeds_on(c.rank());
        let mut rng = RngState::new(seed);
        uniform_neighbor_sample(
            c,
            &parts[c.rank()],
            EdgeProperties::<u32, f32>::none(),
            &SampleRequest::new(&seeds, fan_out),
            &mut rng,
            cfg,
        )
        .map(|out| (out, rng))
    })
}

/// All `(src, dst, hop)` rows across ranks, sorted.
pub fn gathered_rows(outs: &[Out]) -> Vec<(u32, u32, i32)> {
    let mut rows: Vec<_> = outs
        .iter()
        .flat_map(|o| {
            let hops = o.hops.clone().unwrap_or_else(|| vec![-1; o.len()]);
            o.edges().zip(hops).map(|((s, d), h)| (s, d, h)).collect::<Vec<_>>()
        })
        .collect();
    rows.sort_unstable();
    rows
}

/// Assert vec is a permutation of another vec (order-agnostic).
pub fn assert_permutation<T: Ord + Copy + std::fmt::Debug>(got: &[T], want: &[T]) {
    let mut a = got.to_vec();
    a.sort_unstable();
    let mut b = want.to_vec();
    b.sort_unstable();
    assert_eq!(a, b, "not a permutation\n got={:?}\nwant={:?}", got, want);
}
