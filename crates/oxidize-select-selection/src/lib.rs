pub mod cascade;
pub mod config;
pub mod grid;
pub mod metadata;
pub mod registry;
pub mod selector;
pub mod validator;

pub use cascade::*;
pub use config::*;
pub use grid::*;
pub use metadata::*;
pub use registry::*;
pub use selector::*;
pub use validator::*;
