mod set;
mod splice;

pub use set::{Range, RangeSet};
pub use splice::Splicer;
