pub mod check;
pub mod plan;
pub mod preview;
pub mod render;
