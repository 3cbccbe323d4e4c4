pub mod config;
pub mod core;
pub mod distributions;
pub mod error;
pub mod io;
pub mod linalg;
pub mod matrix;
pub mod metropolis_hastings;
pub mod stats;

pub use error::{Error, Result};
