pub mod classification;
pub mod evaluator;

pub use classification::*;
pub use evaluator::*;
