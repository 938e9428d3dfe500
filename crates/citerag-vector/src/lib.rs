//! Vector Index Adapters.
//!
//! Distance convention for every adapter: cosine distance `1 - cos(q, v)`,
//! lower is better, hits ordered by ascending distance.

pub mod flat;
pub mod lance;

pub use flat::FlatVectorIndex;
pub use lance::LanceVectorIndex;
