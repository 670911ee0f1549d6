//! Batch Scheduler and result tables.
//!
//! Pairs of a partition are generated lazily from its sorted member list and streamed in chunks
//! through a bounded channel to a fixed number of worker threads. The shared
//! [`DistanceContext`] is only borrowed; each worker owns its fallback aligner and is retired
//! and replaced after a fixed number of pairs.

use crate::libs::align::Realigner;
use crate::libs::dist::{evaluate, DistanceContext, Note, PairKey, PairResult};
use crate::libs::domain::Exclusion;
use crate::libs::weights::ClassWeights;
use fxhash::FxHashMap;
use itertools::Itertools;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Pairs sent to a worker at once.
pub const CHUNK_SIZE: usize = 64;

// A partition whose pairs are all in a table
#[derive(Debug, Clone, PartialEq)]
struct Coverage {
    class: String,
    weights: ClassWeights,
    members: BTreeSet<String>,
}

/// Results keyed by canonical `(A, B, class)`.
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    results: FxHashMap<PairKey, PairResult>,
    coverage: Vec<Coverage>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn insert(&mut self, key: PairKey, result: PairResult) {
        self.results.insert(key, result);
    }

    pub fn get(&self, key: &PairKey) -> Option<&PairResult> {
        self.results.get(key)
    }

    /// Results ordered by key.
    pub fn sorted(&self) -> Vec<(&PairKey, &PairResult)> {
        let mut rows: Vec<_> = self.results.iter().collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));
        rows
    }

    /// Records that every pair of `members` is present for `class`.
    pub fn mark_covered(&mut self, class: &str, weights: ClassWeights, members: &[String]) {
        self.coverage.push(Coverage {
            class: class.to_string(),
            weights,
            members: members.iter().cloned().collect(),
        });
    }

    /// Whether all pairs of `members` were computed for `class` with the same weights.
    pub fn covers(&self, class: &str, weights: ClassWeights, members: &[String]) -> bool {
        self.coverage.iter().any(|c| {
            c.class == class
                && c.weights == weights
                && members.iter().all(|m| c.members.contains(m))
        })
    }

    pub fn merge(&mut self, other: ResultTable) {
        self.results.extend(other.results);
        self.coverage.extend(other.coverage);
    }
}

/// Something that happened while evaluating one pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Diagnostic {
    pub kind: &'static str,
    pub a: String,
    pub b: String,
    pub class: String,
    pub detail: String,
}

impl Diagnostic {
    pub fn new(key: &PairKey, note: &Note) -> Self {
        Self {
            kind: note.kind(),
            a: key.a.clone(),
            b: key.b.clone(),
            class: key.class.clone(),
            detail: note.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub computed: usize,
    pub reused: usize,
    /// Pairs that ended with a sentinel because of an error
    pub failed: usize,
    pub diagnostics: Vec<Diagnostic>,
    /// Members that could not be scheduled
    pub excluded: Vec<Exclusion>,
}

impl BatchReport {
    pub fn merge(&mut self, other: BatchReport) {
        self.computed += other.computed;
        self.reused += other.reused;
        self.failed += other.failed;
        self.diagnostics.extend(other.diagnostics);
        self.excluded.extend(other.excluded);
    }
}

// Result of one pair sent back by a worker
struct Outcome {
    key: PairKey,
    result: PairResult,
    notes: Vec<Note>,
    failed: bool,
}

// Worker-local state, replaced after a fixed number of pairs
struct Worker {
    id: usize,
    generation: usize,
    realigner: Realigner,
    tasks: usize,
}

impl Worker {
    fn spawn(id: usize, generation: usize, domains_dir: &Path, cache_size: usize) -> Self {
        log::trace!("Worker {}.{} spawned", id, generation);
        Self {
            id,
            generation,
            realigner: Realigner::new(domains_dir, cache_size),
            tasks: 0,
        }
    }

    fn retire(self) -> usize {
        log::debug!(
            "Worker {}.{} retired after {} pairs, {} pairwise alignments",
            self.id,
            self.generation,
            self.tasks,
            self.realigner.realigned()
        );
        self.generation
    }

    fn evaluate(&mut self, ctx: &DistanceContext, a: &str, b: &str, class: &str) -> Outcome {
        self.tasks += 1;
        let key = PairKey::new(a, b, class);
        match evaluate(ctx, &mut self.realigner, a, b, class) {
            Ok(eval) => Outcome {
                key,
                result: eval.result,
                notes: eval.notes,
                failed: false,
            },
            Err(e) => {
                log::warn!(
                    "Distance between {} and {} set to 1: {}",
                    key.a,
                    key.b,
                    e
                );
                Outcome {
                    key,
                    result: PairResult::sentinel(),
                    notes: vec![Note::Failed(e.to_string())],
                    failed: true,
                }
            }
        }
    }
}

pub struct Scheduler<'a> {
    ctx: &'a DistanceContext,
    domains_dir: PathBuf,
    parallel: usize,
    tasks_per_worker: usize,
    cache_size: usize,
}

impl<'a> Scheduler<'a> {
    /// `domains_dir` holds the unaligned `<domain>.fasta` files used by the fallback aligner.
    pub fn new(ctx: &'a DistanceContext, domains_dir: &Path, parallel: usize) -> Self {
        Self {
            ctx,
            domains_dir: domains_dir.to_path_buf(),
            parallel: parallel.max(1),
            tasks_per_worker: 100,
            cache_size: 16,
        }
    }

    pub fn with_tasks_per_worker(mut self, tasks: usize) -> Self {
        self.tasks_per_worker = tasks.max(1);
        self
    }

    pub fn context(&self) -> &DistanceContext {
        self.ctx
    }

    /// Computes every pair of `members` with the weights of `class`.
    ///
    /// When `broader` covers the partition, its results are copied instead.
    pub fn run(
        &self,
        members: &[String],
        class: &str,
        broader: Option<&ResultTable>,
    ) -> anyhow::Result<(ResultTable, BatchReport)> {
        let mut report = BatchReport::default();

        // Members without domains are never scheduled
        let mut scheduled = vec![];
        for id in members {
            if self.ctx.index.contains(id) {
                scheduled.push(id.clone());
            } else {
                log::warn!("{} is not indexed, excluding its pairs", id);
                report
                    .excluded
                    .push(Exclusion::new(id, "not in the domain index"));
            }
        }
        scheduled.sort();
        scheduled.dedup();

        let weights = self.ctx.weights.get(class);
        let mut table = ResultTable::new();

        match broader {
            Some(broader) if broader.covers(class, weights, &scheduled) => {
                let mut missing = vec![];
                for (i, j) in (0..scheduled.len()).tuple_combinations() {
                    let key = PairKey::new(&scheduled[i], &scheduled[j], class);
                    match broader.get(&key) {
                        Some(result) => {
                            table.insert(key, *result);
                            report.reused += 1;
                        }
                        None => missing.push((i, j)),
                    }
                }
                log::debug!(
                    "Reused {} pairs for {}, {} left to compute",
                    report.reused,
                    class,
                    missing.len()
                );
                self.compute(&scheduled, missing.into_iter(), class, &mut table, &mut report)?;
            }
            _ => {
                let pairs = (0..scheduled.len()).tuple_combinations();
                self.compute(&scheduled, pairs, class, &mut table, &mut report)?;
            }
        }

        table.mark_covered(class, weights, &scheduled);
        report.diagnostics.sort();

        Ok((table, report))
    }

    // Adopt from https://rust-lang-nursery.github.io/rust-cookbook/concurrency/threads.html#create-a-parallel-pipeline
    fn compute<I>(
        &self,
        members: &[String],
        pairs: I,
        class: &str,
        table: &mut ResultTable,
        report: &mut BatchReport,
    ) -> anyhow::Result<()>
    where
        I: Iterator<Item = (usize, usize)> + Send,
    {
        // Channel 1 - Chunks of pairs
        let (snd1, rcv1) = crossbeam::channel::bounded::<Vec<(usize, usize)>>(self.parallel * 2);
        // Channel 2 - Results
        let (snd2, rcv2) = crossbeam::channel::bounded::<Vec<Outcome>>(self.parallel * 2);

        crossbeam::scope(|s| {
            //----------------------------
            // Pair generator
            //----------------------------
            s.spawn(move |_| {
                for chunk in &pairs.chunks(CHUNK_SIZE) {
                    if snd1.send(chunk.collect()).is_err() {
                        break;
                    }
                }
                // Close the channel so that the workers exit
                drop(snd1);
            });

            //----------------------------
            // Workers
            //----------------------------
            for id in 0..self.parallel {
                let (sendr, recvr) = (snd2.clone(), rcv1.clone());
                s.spawn(move |_| {
                    let mut worker = Worker::spawn(id, 0, &self.domains_dir, self.cache_size);
                    for chunk in recvr.iter() {
                        let mut outcomes = Vec::with_capacity(chunk.len());
                        for (i, j) in chunk {
                            if worker.tasks >= self.tasks_per_worker {
                                let generation = worker.retire();
                                worker = Worker::spawn(
                                    id,
                                    generation + 1,
                                    &self.domains_dir,
                                    self.cache_size,
                                );
                            }
                            outcomes.push(worker.evaluate(self.ctx, &members[i], &members[j], class));
                        }
                        if sendr.send(outcomes).is_err() {
                            break;
                        }
                    }
                    worker.retire();
                });
            }
            // Close the channel, otherwise the collector never finishes
            drop(snd2);

            //----------------------------
            // Collector
            //----------------------------
            for outcomes in rcv2.iter() {
                for outcome in outcomes {
                    report.computed += 1;
                    if outcome.failed {
                        report.failed += 1;
                    }
                    for note in &outcome.notes {
                        report.diagnostics.push(Diagnostic::new(&outcome.key, note));
                    }
                    table.insert(outcome.key, outcome.result);
                }
            }
        })
        .map_err(|_| anyhow::anyhow!("a worker thread panicked"))?;

        Ok(())
    }
}
