//! Two in-process ranks sample two hops from a small labeled batch.
//!
//! Run with `cargo run --example two_rank_sample`.

use frontier_sampler::prelude::*;

fn main() -> Result<(), SamplerError> {
    let edges: [(u32, u32); 8] = [(0, 1), (1, 3), (1, 4), (2, 0), (2, 1), (2, 3), (3, 5), (4, 5)];
    let ownership = VertexOwnership::contiguous_even(6, 2);
    let parts = InMemoryPartition::build_all(&edges, &ownership)?;
    let label_map = LabelToRankMap::new([(0, 0), (1, 1)])?;
    let cfg = SamplingConfig::default()
        .with_replacement(false)
        .with_prior_sources(PriorSourcesBehavior::Exclude);

    let comms = RayonComm::world(2);
    let results: Vec<Result<SampleOutput<u32, u32, f32>, SamplerError>> =
        std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|comm| {
                    let part = &parts[comm.rank()];
                    let (label_map, cfg) = (&label_map, &cfg);
                    s.spawn(move || {
                        let (seeds, labels): (Vec<u32>, Vec<Label>) = match comm.rank() {
                            0 => (vec![2], vec![0]),
                            _ => (vec![1], vec![1]),
                        };
                        let request = SampleRequest::new(&seeds, &[2, -1])
                            .with_labels(&labels)
                            .with_label_map(label_map);
                        uniform_neighbor_sample(
                            comm,
                            part,
                            EdgeProperties::<u32, f32>::none(),
                            &request,
                            &mut RngState::new(2024),
                            cfg,
                        )
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join().unwrap_or_else(|_| {
                        Err(SamplerError::InvalidArgument("sampling thread panicked".into()))
                    })
                })
                .collect()
        });

    for (rank, res) in results.into_iter().enumerate() {
        let out = res?;
        println!("rank {rank}: {} rows", out.len());
        let hops = out.hops.clone().unwrap_or_default();
        for (row, (s, d)) in out.edges().enumerate() {
            println!("  hop {} label {:?}: {s} -> {d}", hops[row], out.labels.as_ref().map(|l| l[row]));
        }
    }
    Ok(())
}
