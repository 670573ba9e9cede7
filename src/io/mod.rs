//! Persistence of simulation results

pub mod result_file;

pub use result_file::{open_result, save_result};
