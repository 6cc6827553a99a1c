pub mod graph;
pub mod loc;
pub mod parallelism;
pub mod seq;
