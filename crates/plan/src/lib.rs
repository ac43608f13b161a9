//! The pull-based physical execution pipeline (spec §3/§4.3): the
//! `Operator` stream IR and the engine that drives it into rows.

pub mod error;
pub mod iter;
pub mod operator;

pub use error::{internal, PlanError, Result, StreamClosed};
pub use iter::{absorb_stream_closed, open, ExecCtx, Frame, StreamIterator};
pub use operator::{AggregateSpec, Operator};
