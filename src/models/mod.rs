pub mod dataset;
pub mod delta;
pub mod time;

pub use dataset::*;
pub use delta::*;
pub use time::*;
