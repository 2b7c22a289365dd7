//! Reading the engine's model back into LED space.

mod extract;

pub use extract::{Extraction, extract, load_artifact};
