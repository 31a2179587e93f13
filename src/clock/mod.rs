pub mod painter;
pub mod render;
