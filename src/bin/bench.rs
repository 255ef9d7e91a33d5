//! Benchmark worker: replays one trace against one policy or sketch
//! configuration and prints the resulting objective on stdout.
//!
//! Output contract: a single line — either the scalar objective, or
//! `objective,avg_update_secs,avg_estimate_secs` for sketch-backed
//! configurations.  Any failure exits non-zero with the error on stderr.

use std::hash::Hash;
use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use lungo::{
    AdaSketch, AdaSketchOptions, Adapter, CountMinSketch, EpsilonGreedyAdapter, EvolvingSketch,
    EvolvingSketchOptions, FifoPolicy, MockCache, OracleTrace, ReplacementPolicy, Sketch,
    SlidingWindowThompsonAdapter, StepRule, TransactionTrace, WTinyLfuPolicy,
};

/// Decay schedule shared by every time-decayed configuration.
fn decay(t: u32, alpha: f64) -> f32 {
    (alpha * f64::from(t) / 10_000.0).exp() as f32
}

/// Arm grid and bandit defaults used for the adaptive configurations.
const ADAPT_MIN_ALPHA: f64 = 0.01;
const ADAPT_MAX_ALPHA: f64 = 1000.0;
const ADAPT_NUM_ARMS: usize = 100;

#[derive(Parser)]
#[command(name = "lungo-bench")]
#[command(about = "Trace-driven sketch and cache-policy benchmarks")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay an oracleGeneral trace through a cache policy.
    ///
    /// Objective: miss ratio (lower is better).
    Caching {
        /// Policy / admission-sketch configuration.
        #[arg(long, value_enum)]
        policy: CachingConfig,
        /// Path to the .oracleGeneral trace file.
        trace_path: PathBuf,
        /// Number of cache slots.
        cache_size: usize,
        /// Updates between adaptation rounds (evolving configuration only).
        adapt_interval: u32,
        /// Initial decay rate for the time-decayed sketches.
        alpha: f64,
        /// Bandit strategy for the evolving configuration.
        #[arg(long, value_enum, default_value = "epsilon-greedy")]
        adapter: AdapterConfig,
        /// Record the adapter's (objective, alpha) history to this CSV.
        #[arg(long)]
        record_history: Option<PathBuf>,
    },
    /// Replay a transactions trace, ranking the top-k hottest products.
    ///
    /// Objective: DCG with gain 1/log2(rank + 1) (higher is better).
    Topk {
        /// Sketch configuration.
        #[arg(long, value_enum)]
        sketch: SketchConfig,
        /// Path to the transactions CSV file.
        trace_path: PathBuf,
        /// Capacity hint for the sketch.
        sketch_size: usize,
        /// Size of the maintained ranking.
        top_k: usize,
        /// Updates between adaptation rounds (evolving configuration only).
        adapt_interval: u32,
        /// Initial decay rate for the time-decayed sketches.
        alpha: f64,
        /// Bandit strategy for the evolving configuration.
        #[arg(long, value_enum, default_value = "epsilon-greedy")]
        adapter: AdapterConfig,
        /// Record the adapter's (objective, alpha) history to this CSV.
        #[arg(long)]
        record_history: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CachingConfig {
    /// FIFO baseline, no sketch.
    Fifo,
    /// W-TinyLFU over a plain Count-Min sketch.
    CountMin,
    /// W-TinyLFU over a fixed-decay AdaSketch.
    Ada,
    /// W-TinyLFU over an EvolvingSketch without adaptation.
    EvolvingPrune,
    /// W-TinyLFU over an EvolvingSketch with an online bandit.
    Evolving,
}

#[derive(Clone, Copy, ValueEnum)]
enum SketchConfig {
    CountMin,
    Ada,
    EvolvingPrune,
    Evolving,
}

#[derive(Clone, Copy, ValueEnum)]
enum AdapterConfig {
    EpsilonGreedy,
    Thompson,
}

fn build_adapter(kind: AdapterConfig, record: bool) -> Result<Box<dyn Adapter>> {
    let mut adapter: Box<dyn Adapter> = match kind {
        AdapterConfig::EpsilonGreedy => Box::new(EpsilonGreedyAdapter::new(
            ADAPT_MIN_ALPHA,
            ADAPT_MAX_ALPHA,
            ADAPT_NUM_ARMS,
            0.1,
            StepRule::Constant(0.99),
        )?),
        AdapterConfig::Thompson => Box::new(SlidingWindowThompsonAdapter::new(
            ADAPT_MIN_ALPHA,
            ADAPT_MAX_ALPHA,
            ADAPT_NUM_ARMS,
            5.0,
            500,
        )?),
    };
    if record {
        adapter.start_recording_history();
    }
    Ok(adapter)
}

fn main() -> Result<()> {
    env_logger::init();
    match Args::parse().command {
        Command::Caching {
            policy,
            trace_path,
            cache_size,
            adapt_interval,
            alpha,
            adapter,
            record_history,
        } => run_caching(
            policy,
            &trace_path,
            cache_size,
            adapt_interval,
            alpha,
            adapter,
            record_history.as_deref(),
        ),
        Command::Topk {
            sketch,
            trace_path,
            sketch_size,
            top_k,
            adapt_interval,
            alpha,
            adapter,
            record_history,
        } => run_topk(
            sketch,
            &trace_path,
            sketch_size,
            top_k,
            adapt_interval,
            alpha,
            adapter,
            record_history.as_deref(),
        ),
    }
}

// ---------------------------------------------------------------------------
// Caching benchmark
// ---------------------------------------------------------------------------

/// Replays the trace and returns the miss ratio.
fn replay_caching<P: ReplacementPolicy<u64, u64>>(
    policy: &mut P,
    trace: &OracleTrace,
    cache_size: usize,
    mut on_hit: impl FnMut(&mut P),
) -> f64 {
    let mut cache: MockCache<u64> = MockCache::new(cache_size);
    let mut hits = 0usize;
    for request in trace {
        if cache.contains(&request.obj_id) {
            hits += 1;
            on_hit(policy);
            policy.on_hit(&request.obj_id);
        } else {
            policy.on_miss(&mut cache, request.obj_id, u64::from(request.obj_size));
        }
    }
    (trace.len() - hits) as f64 / trace.len() as f64
}

fn report_sketch_line<K, S>(objective: f64, policy: &WTinyLfuPolicy<K, S>)
where
    K: lungo::hash::SketchKey + Hash + Eq + Clone,
    S: Sketch<K>,
{
    println!(
        "{},{},{}",
        objective,
        policy.update_time_avg_seconds(),
        policy.estimate_time_avg_seconds()
    );
}

fn run_caching(
    config: CachingConfig,
    trace_path: &std::path::Path,
    cache_size: usize,
    adapt_interval: u32,
    alpha: f64,
    adapter: AdapterConfig,
    record_history: Option<&std::path::Path>,
) -> Result<()> {
    let trace = OracleTrace::open(trace_path)
        .with_context(|| format!("opening trace {}", trace_path.display()))?;
    ensure!(!trace.is_empty(), "trace {} has no records", trace_path.display());

    match config {
        CachingConfig::Fifo => {
            let mut policy = FifoPolicy::new(cache_size)?;
            let miss_ratio = replay_caching(&mut policy, &trace, cache_size, |_| {});
            println!("{}", miss_ratio);
        }
        CachingConfig::CountMin => {
            let sketch = CountMinSketch::new(cache_size)?;
            let mut policy = WTinyLfuPolicy::new(cache_size, sketch)?;
            let miss_ratio = replay_caching(&mut policy, &trace, cache_size, |_| {});
            report_sketch_line(miss_ratio, &policy);
        }
        CachingConfig::Ada => {
            let sketch = AdaSketch::new(
                cache_size,
                AdaSketchOptions {
                    f: move |t| decay(t, alpha),
                    tune_interval: 0,
                },
            )?;
            let mut policy = WTinyLfuPolicy::new(cache_size, sketch)?;
            let miss_ratio = replay_caching(&mut policy, &trace, cache_size, |_| {});
            report_sketch_line(miss_ratio, &policy);
        }
        CachingConfig::EvolvingPrune => {
            let sketch = EvolvingSketch::new(
                cache_size,
                EvolvingSketchOptions {
                    f: decay,
                    initial_alpha: alpha,
                    adapter: None,
                    adapt_interval: 0,
                },
            )?;
            let mut policy = WTinyLfuPolicy::new(cache_size, sketch)?;
            let miss_ratio = replay_caching(&mut policy, &trace, cache_size, |_| {});
            report_sketch_line(miss_ratio, &policy);
        }
        CachingConfig::Evolving => {
            let sketch = EvolvingSketch::new(
                cache_size,
                EvolvingSketchOptions {
                    f: decay,
                    initial_alpha: alpha,
                    adapter: Some(build_adapter(adapter, record_history.is_some())?),
                    adapt_interval,
                },
            )?;
            let mut policy = WTinyLfuPolicy::new(cache_size, sketch)?;
            // Each hit is one unit of reward for the adaptation interval.
            let miss_ratio =
                replay_caching(&mut policy, &trace, cache_size, |p| p.sketch_mut().sum += 1.0);
            if let Some(path) = record_history {
                if let Some(adapter) = policy.sketch().adapter() {
                    adapter.save_history(path)?;
                }
            }
            report_sketch_line(miss_ratio, &policy);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Top-k trending benchmark
// ---------------------------------------------------------------------------

/// Ranking of the k hottest keys, ordered by descending frequency with
/// ascending-key tie-breaks.  k is small, so a sorted vector beats a tree.
struct TopK<F> {
    k: usize,
    entries: Vec<(u64, F)>,
}

impl<F: PartialOrd + Copy> TopK<F> {
    fn new(k: usize) -> Self {
        TopK {
            k,
            entries: Vec::with_capacity(k + 1),
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    /// 1-based rank of `key`, or `None` when it is not ranked.
    fn rank_of(&self, key: u64) -> Option<usize> {
        self.entries
            .iter()
            .position(|&(ranked, _)| ranked == key)
            .map(|at| at + 1)
    }

    fn remove(&mut self, key: u64) -> Option<F> {
        let at = self.entries.iter().position(|&(ranked, _)| ranked == key)?;
        Some(self.entries.remove(at).1)
    }

    fn insert_sorted(&mut self, key: u64, freq: F) {
        let at = self
            .entries
            .partition_point(|&(ranked, ranked_freq)| {
                ranked_freq > freq || (ranked_freq == freq && ranked < key)
            });
        self.entries.insert(at, (key, freq));
    }

    fn smallest(&self) -> Option<(u64, F)> {
        self.entries.last().copied()
    }

    fn pop_smallest(&mut self) -> Option<(u64, F)> {
        self.entries.pop()
    }
}

fn rank_gain(rank: usize) -> f64 {
    1.0 / ((rank + 1) as f64).log2()
}

/// Replays the trace maintaining a top-k ranking by estimated frequency;
/// returns the accumulated DCG.
fn replay_topk<S: Sketch<u64>>(
    sketch: &mut S,
    trace: &TransactionTrace,
    top_k: usize,
    mut on_hit: impl FnMut(&mut S, f64),
) -> f64 {
    let mut ranking: TopK<S::Freq> = TopK::new(top_k);
    let mut dcg = 0.0;

    for transaction in trace.iter() {
        let product = transaction.product_code;

        if let Some(rank) = ranking.rank_of(product) {
            let gain = rank_gain(rank);
            dcg += gain;
            on_hit(sketch, gain);
            sketch.update(&product);
            ranking.remove(product);
            let freq = sketch.estimate(&product);
            ranking.insert_sorted(product, freq);
            continue;
        }

        sketch.update(&product);
        let freq = sketch.estimate(&product);

        if ranking.len() < top_k {
            ranking.insert_sorted(product, freq);
            continue;
        }

        // The sketch may have decayed the incumbents since they were last
        // scored; re-estimate the cheapest ones before swapping in.
        let mut tries = 0;
        while let Some((_, stale_freq)) = ranking.smallest() {
            if !(freq > stale_freq) || tries >= top_k {
                break;
            }
            tries += 1;
            let Some((popped, _)) = ranking.pop_smallest() else {
                break;
            };
            let latest = sketch.estimate(&popped);
            if latest >= freq {
                ranking.insert_sorted(popped, latest);
            } else {
                ranking.insert_sorted(product, freq);
                break;
            }
        }
    }

    dcg
}

#[allow(clippy::too_many_arguments)]
fn run_topk(
    config: SketchConfig,
    trace_path: &std::path::Path,
    sketch_size: usize,
    top_k: usize,
    adapt_interval: u32,
    alpha: f64,
    adapter: AdapterConfig,
    record_history: Option<&std::path::Path>,
) -> Result<()> {
    let trace = TransactionTrace::open(trace_path)
        .with_context(|| format!("opening trace {}", trace_path.display()))?;
    ensure!(!trace.is_empty(), "trace {} has no records", trace_path.display());
    ensure!(top_k > 0, "top_k must be greater than 0");

    match config {
        SketchConfig::CountMin => {
            let mut sketch: CountMinSketch<u64> = CountMinSketch::new(sketch_size)?;
            let dcg = replay_topk(&mut sketch, &trace, top_k, |_, _| {});
            println!(
                "{},{},{}",
                dcg,
                sketch.update_time_avg_seconds(),
                sketch.estimate_time_avg_seconds()
            );
        }
        SketchConfig::Ada => {
            let mut sketch: AdaSketch<u64, _> = AdaSketch::new(
                sketch_size,
                AdaSketchOptions {
                    f: move |t| decay(t, alpha),
                    tune_interval: 0,
                },
            )?;
            let dcg = replay_topk(&mut sketch, &trace, top_k, |_, _| {});
            println!(
                "{},{},{}",
                dcg,
                sketch.update_time_avg_seconds(),
                sketch.estimate_time_avg_seconds()
            );
        }
        SketchConfig::EvolvingPrune => {
            let mut sketch: EvolvingSketch<u64, _> = EvolvingSketch::new(
                sketch_size,
                EvolvingSketchOptions {
                    f: decay,
                    initial_alpha: alpha,
                    adapter: None,
                    adapt_interval: 0,
                },
            )?;
            let dcg = replay_topk(&mut sketch, &trace, top_k, |_, _| {});
            println!(
                "{},{},{}",
                dcg,
                sketch.update_time_avg_seconds(),
                sketch.estimate_time_avg_seconds()
            );
        }
        SketchConfig::Evolving => {
            let mut sketch: EvolvingSketch<u64, _> = EvolvingSketch::new(
                sketch_size,
                EvolvingSketchOptions {
                    f: decay,
                    initial_alpha: alpha,
                    adapter: Some(build_adapter(adapter, record_history.is_some())?),
                    adapt_interval,
                },
            )?;
            // Each in-ranking access contributes its DCG gain as reward.
            let dcg = replay_topk(&mut sketch, &trace, top_k, |s, gain| s.sum += gain);
            if let Some(path) = record_history {
                if let Some(adapter) = sketch.adapter() {
                    adapter.save_history(path)?;
                }
            }
            println!(
                "{},{},{}",
                dcg,
                sketch.update_time_avg_seconds(),
                sketch.estimate_time_avg_seconds()
            );
        }
    }
    Ok(())
}
