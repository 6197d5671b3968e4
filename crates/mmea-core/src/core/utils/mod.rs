pub mod geometry;
pub mod naming;
