pub mod delta;
pub mod model;
