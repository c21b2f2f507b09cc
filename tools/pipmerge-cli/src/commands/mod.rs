pub mod check;
pub mod compose;
pub mod config;
pub mod mask;
