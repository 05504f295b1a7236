mod util;

use frontier_sampler::algs::assembler::{LabelToRankMap, SampleOutput};
use frontier_sampler::algs::communicator::{Communicator, NoComm};
use frontier_sampler::algs::rng::RngState;
use frontier_sampler::algs::sampling::{SampleRequest, uniform_neighbor_sample};
use frontier_sampler::config::{PriorSourcesBehavior, SamplingConfig};
use frontier_sampler::graph::{EdgeProperties, InMemoryPartition};
use frontier_sampler::sampler_error::{ErrorCode, SamplerError};
use frontier_sampler::topology::ownership::VertexOwnership;
use util::*;

fn unwrap_all(results: Vec<Result<(Out, RngState), SamplerError>>) -> (Vec<Out>, Vec<RngState>) {
    results.into_iter().map(|r| r.unwrap()).unzip()
}

#[test]
fn exhaustive_single_hop_is_independent_of_seed_and_ranks() {
    let want = vec![
        (0, 1, 0),
        (1, 3, 0),
        (1, 4, 0),
        (2, 0, 0),
        (2, 1, 0),
        (2, 3, 0),
    ];
    for n in 1..=3 {
        for seed in [1, 99] {
            let res = sample_small(
                n,
                |r| [0u32, 1, 2].into_iter().filter(|v| *v as usize % n == r).collect(),
                &[-1],
                &SamplingConfig::default(),
                seed,
            );
            let (outs, _) = unwrap_all(res);
            assert_eq!(gathered_rows(&outs), want, "ranks={n} seed={seed}");
        }
    }
}

#[test]
fn exclude_drops_used_sources_from_later_hops() {
    let cfg = SamplingConfig::default()
        .with_replacement(false)
        .with_prior_sources(PriorSourcesBehavior::Exclude);
    let res = sample_small(2, |r| if r == 0 { vec![2] } else { vec![] }, &[-1, -1], &cfg, 3);
    let (outs, _) = unwrap_all(res);
    assert_eq!(
        gathered_rows(&outs),
        vec![
            (0, 1, 1),
            (1, 3, 1),
            (1, 4, 1),
            (2, 0, 0),
            (2, 1, 0),
            (2, 3, 0),
            (3, 5, 1),
        ]
    );
}

#[test]
fn carry_over_resamples_earlier_sources() {
    let cfg = SamplingConfig::default()
        .with_replacement(false)
        .with_prior_sources(PriorSourcesBehavior::CarryOver)
        .with_dedupe_sources(true);
    let res = sample_small(2, |r| if r == 1 { vec![2] } else { vec![] }, &[-1, -1], &cfg, 3);
    let (outs, _) = unwrap_all(res);
    let hop1: Vec<_> = gathered_rows(&outs)
        .into_iter()
        .filter(|r| r.2 == 1)
        .map(|(s, d, _)| (s, d))
        .collect();
    assert_eq!(
        hop1,
        vec![(0, 1), (1, 3), (1, 4), (2, 0), (2, 1), (2, 3), (3, 5)]
    );
}

/// 40 vertices with out-degree `u % 5`.
fn ring_edges() -> Vec<(u32, u32)> {
    (0u32..40)
        .flat_map(|u| (0..u % 5).map(move |k| (u, (u * 7 + k * 3 + 1) % 40)))
        .collect()
}

fn sample_ring(n: usize, rng: RngState, fan_out: &[i32]) -> Vec<(Out, RngState)> {
    let parts = partitions(&ring_edges(), 40, n);
    let cfg = SamplingConfig::default().with_replacement(false);
    run_ranks(n, |c| {
        let seeds: Vec<u32> = (0..40).filter(|v| v % 7 == c.rank() as u32).collect();
        let mut state = rng;
        let out = uniform_neighbor_sample(
            c,
            &parts[c.rank()],
            EdgeProperties::<u32, f32>::none(),
            &SampleRequest::new(&seeds, fan_out),
            &mut state,
            &cfg,
        )
        .unwrap();
        (out, state)
    })
}

#[test]
fn identical_inputs_give_identical_outputs() {
    let a = sample_ring(3, RngState::new(42), &[2, 3]);
    let b = sample_ring(3, RngState::new(42), &[2, 3]);
    assert_eq!(a, b);
    let counters: Vec<u64> = a.iter().map(|(_, s)| s.counter).collect();
    assert!(counters.iter().all(|&c| c == counters[0] && c > 0));
}

#[test]
fn counter_advances_across_calls() {
    let first = sample_ring(2, RngState::new(7), &[1]);
    let after_first = first[0].1;
    let second = sample_ring(2, after_first, &[1]);
    assert!(second.iter().all(|(_, s)| s.counter > after_first.counter));
    assert!(second.iter().all(|(_, s)| s.seed == 7));
}

#[test]
fn take_all_consumes_no_randomness() {
    let res = sample_small(2, |r| vec![r as u32 * 2], &[-1, -1], &SamplingConfig::default(), 5);
    let (_, states) = unwrap_all(res);
    assert!(states.iter().all(|s| *s == RngState::new(5)));
}

#[test]
fn dedupe_does_not_change_exhaustive_edge_sets() {
    let base = SamplingConfig::default().with_replacement(false);
    let run = |cfg: &SamplingConfig| {
        let (outs, _) = unwrap_all(sample_small(2, |_| vec![2, 2, 1], &[10, 10], cfg, 11));
        let mut rows = gathered_rows(&outs);
        rows.dedup();
        rows
    };
    assert_eq!(run(&base), run(&base.clone().with_dedupe_sources(true)));
}

#[test]
fn vertex_without_out_edges_yields_empty_output() {
    let res = sample_small(2, |r| if r == 0 { vec![5] } else { vec![] }, &[2, 2], &SamplingConfig::default(), 1);
    let (outs, states) = unwrap_all(res);
    assert!(outs.iter().all(Out::is_empty));
    assert!(states.iter().all(|s| s.counter == 0));
}

// ----- labels ---------------------------------------------------------------

fn labeled_run(map: Option<&LabelToRankMap>) -> Vec<Result<Out, SamplerError>> {
    let parts = partitions(&SMALL_EDGES, 6, 2);
    run_ranks(2, |c| {
        let (seeds, labels): (Vec<u32>, Vec<i32>) = if c.rank() == 0 {
            (vec![2, 1], vec![7, 3])
        } else {
            (vec![4], vec![3])
        };
        let mut req = SampleRequest::new(&seeds, &[-1]).with_labels(&labels);
        if let Some(m) = map {
            req = req.with_label_map(m);
        }
        uniform_neighbor_sample(
            c,
            &parts[c.rank()],
            EdgeProperties::<u32, f32>::none(),
            &req,
            &mut RngState::new(0),
            &SamplingConfig::default(),
        )
    })
}

#[test]
fn labeled_rows_stay_with_destination_owner_grouped_by_label() {
    let outs: Vec<Out> = labeled_run(None).into_iter().map(Result::unwrap).collect();

    let r0 = &outs[0];
    assert_eq!(r0.edges().collect::<Vec<_>>(), vec![(2, 0), (2, 1)]);
    assert_eq!(r0.labels, Some(vec![7, 7]));
    let lo = r0.label_offsets.as_ref().unwrap();
    assert_eq!((lo.labels.clone(), lo.offsets.clone()), (vec![7, 3], vec![0, 2, 2]));

    let r1 = &outs[1];
    assert_eq!(
        r1.edges().collect::<Vec<_>>(),
        vec![(2, 3), (1, 3), (1, 4), (4, 5)]
    );
    assert_eq!(r1.labels, Some(vec![7, 3, 3, 3]));
    assert_eq!(r1.label_segment(3), Some(1..4));
    assert_eq!(r1.label_segment(42), None);
}

#[test]
fn rebalance_moves_each_label_to_its_rank() {
    let map = LabelToRankMap::new([(7, 1), (3, 0)]).unwrap();
    let outs: Vec<Out> = labeled_run(Some(&map)).into_iter().map(Result::unwrap).collect();

    assert_permutation(
        &outs[0].edges().collect::<Vec<_>>(),
        &[(1, 3), (1, 4), (4, 5)],
    );
    assert!(outs[0].labels.as_ref().unwrap().iter().all(|&l| l == 3));
    assert_eq!(outs[0].label_segment(7), Some(0..0));

    assert_permutation(
        &outs[1].edges().collect::<Vec<_>>(),
        &[(2, 0), (2, 1), (2, 3)],
    );
    assert_eq!(outs[1].label_segment(7), Some(0..3));
    assert_eq!(outs[1].label_segment(3), Some(3..3));
}

#[test]
fn label_map_with_unused_label_fails_everywhere() {
    let map = LabelToRankMap::new([(7, 1), (3, 0), (11, 0)]).unwrap();
    for r in labeled_run(Some(&map)) {
        assert!(matches!(r, Err(SamplerError::InvalidArgument(_))), "{r:?}");
    }
}

// ----- properties -----------------------------------------------------------

#[test]
fn edge_properties_follow_their_edges() {
    let weights: Vec<f32> = (0..SMALL_EDGES.len()).map(|i| i as f32 + 0.5).collect();
    let ids: Vec<u64> = (0..SMALL_EDGES.len() as u64).map(|i| 100 + i).collect();
    let parts = partitions(&SMALL_EDGES, 6, 2);
    let outs = run_ranks(2, |c| {
        let part = &parts[c.rank()];
        let w = part.gather_edge_property(&weights).unwrap();
        let e = part.gather_edge_property(&ids).unwrap();
        let props = EdgeProperties::<u64, f32>::none().with_weights(&w).with_edge_ids(&e);
        let seeds: &[u32] = if c.rank() == 0 { &[2, 1] } else { &[] };
        uniform_neighbor_sample(
            c,
            part,
            props,
            &SampleRequest::new(seeds, &[-1]),
            &mut RngState::new(9),
            &SamplingConfig::default().with_return_hops(false),
        )
        .unwrap()
    });
    let mut seen = 0;
    for out in &outs {
        assert!(out.hops.is_none() && out.edge_types.is_none());
        let w = out.weights.as_ref().unwrap();
        let ids = out.edge_ids.as_ref().unwrap();
        for (row, (s, d)) in out.edges().enumerate() {
            let g = SMALL_EDGES.iter().position(|&e| e == (s, d)).unwrap();
            assert_eq!(w[row], g as f32 + 0.5);
            assert_eq!(ids[row], 100 + g as u64);
            seen += 1;
        }
    }
    assert_eq!(seen, 5);
}

#[test]
fn wide_signed_ids_sample_like_narrow_ones() {
    let edges: Vec<(i64, i64)> = SMALL_EDGES.iter().map(|&(s, d)| (s as i64, d as i64)).collect();
    let own = VertexOwnership::contiguous_even(6, 1);
    let part = InMemoryPartition::from_edges(0, &edges, &own).unwrap();
    let out: SampleOutput<i64, i64, f64> = uniform_neighbor_sample(
        &NoComm,
        &part,
        EdgeProperties::none(),
        &SampleRequest::new(&[0i64, 1, 2], &[-1]),
        &mut RngState::new(2),
        &SamplingConfig::default(),
    )
    .unwrap();
    let mut got: Vec<_> = out.edges().collect();
    got.sort_unstable();
    assert_eq!(got, vec![(0, 1), (1, 3), (1, 4), (2, 0), (2, 1), (2, 3)]);
}

// ----- failures -------------------------------------------------------------

#[test]
fn local_failure_aborts_every_rank() {
    let parts = partitions(&SMALL_EDGES, 6, 3);
    let results = run_ranks(3, |c| {
        let fan_out: &[i32] = if c.rank() == 1 { &[-2] } else { &[-1] };
        let mut state = RngState::new(1);
        let res = uniform_neighbor_sample(
            c,
            &parts[c.rank()],
            EdgeProperties::<u32, f32>::none(),
            &SampleRequest::new(&[0u32], fan_out),
            &mut state,
            &SamplingConfig::default(),
        );
        (res, state)
    });
    for (r, (res, state)) in results.iter().enumerate() {
        assert_eq!(*state, RngState::new(1));
        match r {
            1 => assert!(matches!(res, Err(SamplerError::InvalidArgument(_)))),
            _ => assert_eq!(
                res.as_ref().unwrap_err(),
                &SamplerError::PeerAborted {
                    rank: 1,
                    code: ErrorCode::InvalidArgument
                }
            ),
        }
    }
}

#[test]
fn diverging_fan_out_is_rejected_on_every_rank() {
    let res = run_ranks(2, |c| {
        let parts = partitions(&SMALL_EDGES, 6, 2);
        let fan_out = [c.rank() as i32 + 1];
        uniform_neighbor_sample(
            c,
            &parts[c.rank()],
            EdgeProperties::<u32, f32>::none(),
            &SampleRequest::new(&[2u32], &fan_out),
            &mut RngState::new(1),
            &SamplingConfig::default(),
        )
    });
    assert!(res.iter().all(|r| matches!(r, Err(SamplerError::InvalidArgument(_)))));
}

#[test]
fn diverging_property_views_are_rejected_on_every_rank() {
    let weights = [9.0f32; SMALL_EDGES.len()];
    let parts = partitions(&SMALL_EDGES, 6, 2);
    let res = run_ranks(2, |c| {
        let part = &parts[c.rank()];
        let w = part.gather_edge_property(&weights).unwrap();
        let props = if c.rank() == 0 {
            EdgeProperties::<u32, f32>::none().with_weights(&w)
        } else {
            EdgeProperties::none()
        };
        let seeds: &[u32] = if c.rank() == 0 { &[2] } else { &[] };
        let mut state = RngState::new(4);
        let res = uniform_neighbor_sample(
            c,
            part,
            props,
            &SampleRequest::new(seeds, &[-1, -1]),
            &mut state,
            &SamplingConfig::default(),
        );
        (res, state)
    });
    for (res, state) in &res {
        assert!(matches!(res, Err(SamplerError::InvalidArgument(_))), "{res:?}");
        assert_eq!(*state, RngState::new(4));
    }
}

#[test]
fn oversized_fan_out_aborts_instead_of_allocating() {
    let res = sample_small(
        2,
        |r| if r == 0 { vec![1, 1, 2] } else { vec![] },
        &[i32::MAX],
        &SamplingConfig::default(),
        1,
    );
    assert!(matches!(res[0], Err(SamplerError::ResourceExhausted { .. })), "{:?}", res[0]);
    assert_eq!(
        res[1].as_ref().unwrap_err(),
        &SamplerError::PeerAborted {
            rank: 0,
            code: ErrorCode::ResourceExhausted
        }
    );
}

#[test]
fn expensive_check_reports_out_of_range_seed() {
    let cfg = SamplingConfig::default().with_expensive_check(true);
    let res = sample_small(2, |r| if r == 0 { vec![17] } else { vec![1] }, &[1], &cfg, 1);
    assert!(matches!(
        res[0],
        Err(SamplerError::OutOfRangeVertex { vertex: 17, rank: 0 })
    ));
    assert!(matches!(
        res[1],
        Err(SamplerError::PeerAborted {
            rank: 0,
            code: ErrorCode::OutOfRangeVertex
        })
    ));
}

#[test]
fn unchecked_out_of_range_seed_samples_as_isolated() {
    let res = sample_small(2, |r| if r == 0 { vec![17, 2] } else { vec![] }, &[-1], &SamplingConfig::default(), 1);
    let (outs, _) = unwrap_all(res);
    assert_eq!(gathered_rows(&outs).len(), 3);
}

#[test]
fn label_map_without_labels_is_invalid() {
    let part = partitions(&SMALL_EDGES, 6, 1).remove(0);
    let map = LabelToRankMap::new([(0, 0)]).unwrap();
    let err = uniform_neighbor_sample(
        &NoComm,
        &part,
        EdgeProperties::<u32, f32>::none(),
        &SampleRequest::new(&[1u32], &[1]).with_label_map(&map),
        &mut RngState::new(0),
        &SamplingConfig::default(),
    )
    .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}
