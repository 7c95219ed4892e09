pub(crate) mod cache;
pub(crate) mod stats;
pub(crate) mod utils;

pub mod explain;
pub mod sentiment;
