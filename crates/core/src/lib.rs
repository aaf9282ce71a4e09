#![forbid(unsafe_code)]

pub mod adaptive;
pub mod grading;
pub mod model;
pub mod time;

pub use time::Clock;
