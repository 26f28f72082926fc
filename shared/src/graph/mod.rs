pub mod graph;
pub mod records;
