mod chain_node;
mod repository;

pub use chain_node::*;
pub use repository::*;
