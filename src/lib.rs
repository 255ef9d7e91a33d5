pub mod adapt;
pub mod buffer;
pub mod error;
pub mod hash;
pub mod policy;
pub mod sketch;
pub mod timing;
pub mod trace;

pub use adapt::{
    Adapter, AdapterState, EpsilonGreedyAdapter, GradientDescentAdapter,
    SlidingWindowThompsonAdapter, StepRule,
};
pub use error::Error;
pub use policy::{
    CacheStore, FifoPolicy, MockCache, ReplacementPolicy, Segment, WTinyLfuPolicy,
};
pub use sketch::{
    AdaSketch, AdaSketchOptions, CountMinSketch, EvolvingSketch, EvolvingSketchOptions, Sketch,
    PRUNE_THRESHOLD,
};
pub use trace::{OracleTrace, Request, Transaction, TransactionTrace};
