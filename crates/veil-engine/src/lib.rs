//! # veil-engine
//!
//! The workflow execution engine: given a materialized graph and a trigger
//! payload, dispatches every node in topological order (batching adjacent
//! MPC-eligible nodes), meters credit usage, and produces a terminal run
//! result with a per-node trace.

pub mod adapters;
pub mod batch;
pub mod context;
pub mod credit;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod input_gather;
pub mod materializer;
pub mod mock;
pub mod resolver;
pub mod runtime;
pub mod storage;

pub use adapters::*;
pub use batch::{execute_batch, plan_batch};
pub use context::ValueContext;
pub use credit::{commit, plan, reserve, BASE_RUN_COST};
pub use engine::RunExecutor;
pub use error::*;
pub use input_gather::gather_inputs;
pub use materializer::materialize;
pub use resolver::resolve;
pub use runtime::RuntimeContext;
pub use storage::*;
