//! Collective all-to-all redistribution of typed records.
//!
//! Every round runs in two stages, the same way section completion exchanges
//! sizes before data:
//!
//! 1. **Header round**: each rank sends every peer a [`WireHdr`] carrying its
//!    status, the round's sequence number and kind, the number of records
//!    that follow and one piggy-backed `u64`.
//! 2. **Data round**: records are sent to the peers that expect them.
//!
//! A rank that fails locally calls [`Exchange::abort`], which takes part in
//! the next header round with a non-zero status and no data. Because every
//! rank receives every header, all ranks see the same abort and all of them
//! skip the data round, so nobody is left blocked on an unmatched receive.
//! Every send and receive handle is drained before returning, even on error.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{WIRE_VERSION, WireHdr, cast_slice, decode_into};
use crate::sampler_error::{ErrorCode, SamplerError, try_reserve};
use bytemuck::Pod;
use std::mem::size_of;

/// Records received in one round plus the scalar each rank piggy-backed.
#[derive(Debug)]
pub struct Round<T> {
    /// Received records, concatenated in source-rank order.
    pub records: Vec<T>,
    /// `values[r]` is the scalar sent by rank `r` (self included).
    pub values: Vec<u64>,
    /// `counts[r]` is how many records came from rank `r`.
    pub counts: Vec<usize>,
}

/// Sequenced collective exchange over a [`Communicator`].
pub struct Exchange<'a, C: Communicator> {
    comm: &'a C,
    tag: CommTag,
    seq: u32,
}

impl<'a, C: Communicator> Exchange<'a, C> {
    pub fn new(comm: &'a C, tag: CommTag) -> Self {
        Self { comm, tag, seq: 0 }
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn size(&self) -> usize {
        self.comm.size()
    }

    /// Number of rounds issued so far.
    pub fn seq(&self) -> u32 {
        self.seq
    }

    fn hdr_tag(&self) -> u16 {
        self.tag.as_u16()
    }

    fn data_tag(&self) -> u16 {
        self.tag.offset(1).as_u16()
    }

    /// Send `outgoing[r]` to rank `r` and collect what every rank sent here.
    pub fn all_to_all<T: Pod>(
        &mut self,
        kind: u16,
        mut outgoing: Vec<Vec<T>>,
        value: u64,
    ) -> Result<Round<T>, SamplerError> {
        let me = self.rank();
        let n = self.size();
        if outgoing.len() != n {
            return Err(SamplerError::invalid(format!(
                "all_to_all needs one bucket per rank ({n}), got {}",
                outgoing.len()
            )));
        }
        if let Some(b) = outgoing.iter().find(|b| b.len() > u32::MAX as usize) {
            return Err(SamplerError::ResourceExhausted {
                what: "records in one exchange bucket",
                requested: b.len(),
            });
        }
        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);
        log::trace!("[rank {me}] exchange #{seq} kind {kind}");

        let counts_out: Vec<usize> = outgoing.iter().map(Vec::len).collect();
        let (headers, header_err) =
            self.header_round(kind, seq, ErrorCode::Ok, &counts_out, value)?;

        // 2) data round, only if nobody aborted
        let mut protocol_err = header_err;
        let mut values = vec![0u64; n];
        let mut counts_in = vec![0usize; n];
        for (peer, hdr) in headers.iter().enumerate() {
            if peer == me {
                values[peer] = value;
                counts_in[peer] = counts_out[me];
                continue;
            }
            let Some(hdr) = hdr else { continue };
            values[peer] = hdr.value();
            counts_in[peer] = hdr.count();
            if protocol_err.is_none() && (hdr.seq() != seq || hdr.kind() != kind) {
                protocol_err = Some(SamplerError::CollectiveProtocolError {
                    peer,
                    expected_seq: seq,
                    expected_kind: kind,
                    got_seq: hdr.seq(),
                    got_kind: hdr.kind(),
                });
            }
        }

        let mut per_peer: Vec<Vec<T>> = (0..n).map(|_| Vec::new()).collect();
        let mut alloc_err = None;
        let mut recvs = Vec::new();
        for peer in (0..n).filter(|&p| p != me && counts_in[p] > 0) {
            let bucket = &mut per_peer[peer];
            match try_reserve(bucket, counts_in[peer], "received records") {
                Ok(()) => bucket.resize(counts_in[peer], T::zeroed()),
                // still post the receive so the peer's payload is drained
                Err(e) => {
                    alloc_err.get_or_insert(e);
                }
            }
            let buf = bytemuck::cast_slice_mut::<T, u8>(bucket.as_mut_slice());
            recvs.push((peer, self.comm.irecv(peer, self.data_tag(), buf)));
        }
        let mut sends = Vec::new();
        for (peer, bucket) in outgoing.iter().enumerate() {
            if peer != me && !bucket.is_empty() {
                sends.push(self.comm.isend(peer, self.data_tag(), cast_slice(bucket)));
            }
        }

        per_peer[me] = std::mem::take(&mut outgoing[me]);
        let mut maybe_err = None;
        for (peer, h) in recvs {
            let expected = counts_in[peer] * size_of::<T>();
            match h.wait() {
                Some(data) if data.len() == expected => {
                    if maybe_err.is_none() {
                        if let Err(e) = decode_into(&data, &mut per_peer[peer]) {
                            maybe_err = Some(SamplerError::CommError {
                                neighbor: peer,
                                source: e.into(),
                            });
                        }
                    }
                }
                Some(data) if maybe_err.is_none() => {
                    maybe_err = Some(SamplerError::CommError {
                        neighbor: peer,
                        source: format!("expected {expected} payload bytes, got {}", data.len())
                            .into(),
                    });
                }
                None if maybe_err.is_none() => {
                    maybe_err = Some(SamplerError::CommError {
                        neighbor: peer,
                        source: format!("failed to receive payload from rank {peer}").into(),
                    });
                }
                _ => {} // already have an error; just drain
            }
        }
        for s in sends {
            let _ = s.wait();
        }

        if let Some(err) = protocol_err.or(alloc_err).or(maybe_err) {
            return Err(err);
        }

        let total: usize = per_peer.iter().map(Vec::len).sum();
        let mut records = Vec::new();
        try_reserve(&mut records, total, "received records")?;
        for bucket in per_peer {
            records.extend(bucket);
        }
        Ok(Round {
            records,
            values,
            counts: counts_in,
        })
    }

    /// Route each record to `owner(record)` and return the records now local.
    pub fn redistribute<T, F>(
        &mut self,
        kind: u16,
        records: Vec<T>,
        owner: F,
    ) -> Result<Vec<T>, SamplerError>
    where
        T: Pod,
        F: Fn(&T) -> usize,
    {
        let n = self.size();
        let mut buckets: Vec<Vec<T>> = (0..n).map(|_| Vec::new()).collect();
        for r in records {
            let dst = owner(&r);
            if dst >= n {
                return Err(SamplerError::invalid(format!(
                    "record routed to rank {dst}, group has {n} ranks"
                )));
            }
            buckets[dst].push(r);
        }
        Ok(self.all_to_all(kind, buckets, 0)?.records)
    }

    /// Send `local` to every rank; returns each rank's contribution.
    pub fn all_gather<T: Pod>(&mut self, kind: u16, local: &[T]) -> Result<Vec<Vec<T>>, SamplerError> {
        let n = self.size();
        let round = self.all_to_all(kind, vec![local.to_vec(); n], 0)?;
        let mut out = Vec::with_capacity(n);
        let mut rest = round.records.as_slice();
        for &c in &round.counts {
            let (head, tail) = rest.split_at(c);
            out.push(head.to_vec());
            rest = tail;
        }
        Ok(out)
    }

    /// Agree on the maximum of one scalar across the group.
    pub fn all_reduce_max(&mut self, kind: u16, value: u64) -> Result<u64, SamplerError> {
        let n = self.size();
        let empty: Vec<Vec<u8>> = vec![Vec::new(); n];
        let round = self.all_to_all(kind, empty, value)?;
        Ok(round.values.into_iter().max().unwrap_or(value))
    }

    /// Take part in the next header round with `err`'s abort status.
    ///
    /// Peers blocked in that round observe [`SamplerError::PeerAborted`].
    /// Errors while signalling are logged and swallowed: the caller is
    /// already failing with `err`.
    pub fn abort(&mut self, err: &SamplerError) {
        let me = self.rank();
        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);
        let code = match err.code() {
            ErrorCode::Ok => ErrorCode::Unknown,
            c => c,
        };
        log::warn!("[rank {me}] aborting sampling call at exchange #{seq}: {err}");
        let zero = vec![0usize; self.size()];
        match self.header_round(0, seq, code, &zero, 0) {
            Ok((_, None)) => {}
            Ok((_, Some(e))) | Err(e) => {
                log::warn!("[rank {me}] while broadcasting abort: {e}")
            }
        }
    }

    /// Header round. Returns `headers[peer]` (None for self) or the abort of
    /// the lowest-ranked peer that reported a failure.
    ///
    /// A local failure is returned alongside the headers when every peer's
    /// header still arrived: those peers go on to the data round, so this
    /// rank must take part in it before failing.
    fn header_round(
        &self,
        kind: u16,
        seq: u32,
        status: ErrorCode,
        counts_out: &[usize],
        value: u64,
    ) -> Result<(Vec<Option<WireHdr>>, Option<SamplerError>), SamplerError> {
        let me = self.rank();
        let n = self.size();

        // 1) post all receives
        let mut recvs = Vec::with_capacity(n.saturating_sub(1));
        for peer in (0..n).filter(|&p| p != me) {
            let mut buf = [0u8; size_of::<WireHdr>()];
            recvs.push((peer, self.comm.irecv(peer, self.hdr_tag(), &mut buf)));
        }

        // 2) post all sends
        let mut sends = Vec::with_capacity(n.saturating_sub(1));
        for peer in (0..n).filter(|&p| p != me) {
            let hdr = WireHdr::new(kind, seq, status.to_wire(), counts_out[peer], value);
            sends.push(
                self.comm
                    .isend(peer, self.hdr_tag(), cast_slice(std::slice::from_ref(&hdr))),
            );
        }

        // 3) wait for all recvs (but do not early-return)
        let mut headers: Vec<Option<WireHdr>> = vec![None; n];
        let mut maybe_err = None;
        for (peer, h) in recvs {
            match h.wait() {
                Some(data) if data.len() == size_of::<WireHdr>() => {
                    let hdr: WireHdr = bytemuck::pod_read_unaligned(&data);
                    if hdr.version() != WIRE_VERSION && maybe_err.is_none() {
                        maybe_err = Some(SamplerError::CommError {
                            neighbor: peer,
                            source: format!(
                                "wire version {} from rank {peer}, expected {WIRE_VERSION}",
                                hdr.version()
                            )
                            .into(),
                        });
                    }
                    headers[peer] = Some(hdr);
                }
                Some(data) if maybe_err.is_none() => {
                    maybe_err = Some(SamplerError::CommError {
                        neighbor: peer,
                        source: format!(
                            "expected {} bytes for round header, got {}",
                            size_of::<WireHdr>(),
                            data.len()
                        )
                        .into(),
                    });
                }
                None if maybe_err.is_none() => {
                    maybe_err = Some(SamplerError::CommError {
                        neighbor: peer,
                        source: format!("failed to receive round header from rank {peer}").into(),
                    });
                }
                _ => {}
            }
        }

        // 4) always drain all send handles before returning
        for s in sends {
            let _ = s.wait();
        }

        // 5) a peer abort wins over local transport trouble
        let aborted = headers.iter().enumerate().find_map(|(peer, h)| {
            (*h).filter(|h| h.status() != 0).map(|h| SamplerError::PeerAborted {
                rank: peer,
                code: ErrorCode::from_wire(h.status()),
            })
        });
        if let Some(err) = aborted {
            log::warn!("[rank {me}] exchange #{seq}: {err}");
            return Err(err);
        }
        let complete = headers
            .iter()
            .enumerate()
            .all(|(peer, h)| peer == me || h.is_some());
        match maybe_err {
            Some(err) if !complete => Err(err),
            local => Ok((headers, local)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{NoComm, RayonComm};
    use crate::algs::wire::{WireFrontier, kind};
    use std::time::Duration;

    const TAG: CommTag = CommTag::new(0x5A00);

    #[test]
    fn single_rank_round_is_local() {
        let comm = NoComm;
        let mut ex = Exchange::new(&comm, TAG);
        let recs = vec![WireFrontier::new(1, 0), WireFrontier::new(2, 5)];
        let got = ex.redistribute(kind::SEEDS, recs.clone(), |_| 0).unwrap();
        assert_eq!(got, recs);
        assert_eq!(ex.all_reduce_max(kind::COMMIT, 7).unwrap(), 7);
        assert_eq!(ex.seq(), 2);
    }

    #[test]
    fn redistribute_routes_by_owner_in_rank_order() {
        let comms = RayonComm::world(3);
        let results: Vec<Vec<u64>> = std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|c| {
                    s.spawn(move || {
                        let mut ex = Exchange::new(c, TAG);
                        let me = c.rank() as u64;
                        let recs: Vec<WireFrontier> =
                            (0..6).map(|v| WireFrontier::new(v * 10 + me, 0)).collect();
                        let got = ex
                            .redistribute(kind::HOP_EDGES, recs, |r| (r.vertex() / 10 % 3) as usize)
                            .unwrap();
                        got.iter().map(|r| r.vertex()).collect()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results[0], vec![0, 30, 1, 31, 2, 32]);
        assert_eq!(results[1], vec![10, 40, 11, 41, 12, 42]);
        assert_eq!(results[2], vec![20, 50, 21, 51, 22, 52]);
    }

    #[test]
    fn abort_reaches_every_peer() {
        let comms = RayonComm::world(3);
        let results: Vec<Result<u64, SamplerError>> = std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|c| {
                    s.spawn(move || {
                        let mut ex = Exchange::new(c, TAG);
                        if c.rank() == 1 {
                            let err = SamplerError::invalid("bad fanout");
                            ex.abort(&err);
                            return Err(err);
                        }
                        ex.all_reduce_max(kind::COMMIT, c.rank() as u64)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for (r, res) in results.iter().enumerate() {
            match r {
                1 => assert!(matches!(res, Err(SamplerError::InvalidArgument(_)))),
                _ => assert_eq!(
                    res,
                    &Err(SamplerError::PeerAborted {
                        rank: 1,
                        code: ErrorCode::InvalidArgument
                    })
                ),
            }
        }
        for c in &comms {
            assert_eq!(c.pending(), 0);
        }
    }

    #[test]
    fn mismatched_round_kind_is_protocol_error() {
        let comms = RayonComm::world_with_timeout(2, Duration::from_secs(5));
        let results: Vec<Result<u64, SamplerError>> = std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|c| {
                    s.spawn(move || {
                        let mut ex = Exchange::new(c, TAG);
                        let k = if c.rank() == 0 { kind::COMMIT } else { kind::LABELS };
                        ex.all_reduce_max(k, 1)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(SamplerError::CollectiveProtocolError { .. }))));
    }

    #[test]
    fn bad_header_version_still_drains_payload() {
        let comms = RayonComm::world_with_timeout(2, Duration::from_secs(5));
        let (c0, c1) = (&comms[0], &comms[1]);
        let (res, peer_hdr) = std::thread::scope(|s| {
            let peer = s.spawn(move || {
                let mut hdr = WireHdr::new(kind::SEEDS, 0, 0, 1, 0);
                hdr.version_le = (WIRE_VERSION + 1).to_le();
                c1.isend(0, TAG.as_u16(), cast_slice(std::slice::from_ref(&hdr)));
                c1.isend(0, TAG.offset(1).as_u16(), cast_slice(&[WireFrontier::new(4, 0)]));
                c1.irecv(0, TAG.as_u16(), &mut [0u8; size_of::<WireHdr>()]).wait()
            });
            let mut ex = Exchange::new(c0, TAG);
            let res = ex.redistribute(kind::SEEDS, vec![WireFrontier::new(1, 0)], |_| 0);
            (res, peer.join().unwrap())
        });
        assert!(matches!(res, Err(SamplerError::CommError { neighbor: 1, .. })), "{res:?}");
        assert!(peer_hdr.is_some());
        assert_eq!(c0.pending(), 0);
        assert_eq!(c1.pending(), 0);
    }

    #[test]
    fn all_gather_returns_each_contribution() {
        let comms = RayonComm::world(2);
        let results: Vec<Vec<Vec<WireFrontier>>> = std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|c| {
                    s.spawn(move || {
                        let mut ex = Exchange::new(c, TAG);
                        let mine = vec![WireFrontier::new(c.rank() as u64, 1); c.rank() + 1];
                        ex.all_gather(kind::LABELS, &mine).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for gathered in results {
            assert_eq!(gathered[0], vec![WireFrontier::new(0, 1)]);
            assert_eq!(gathered[1], vec![WireFrontier::new(1, 1); 2]);
        }
    }
}
