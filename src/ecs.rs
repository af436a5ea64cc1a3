mod picking;
mod registry;
mod types;

pub use picking::*;
pub use registry::*;
pub use types::*;
