//! Victim selection for eviction.
//!
//! Currently implements:
//! - [`FifoReplacer`] - Evicts resident pages in arrival order

mod fifo;

pub use fifo::FifoReplacer;
