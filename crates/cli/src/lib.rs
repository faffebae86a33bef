#![forbid(unsafe_code)]

pub mod cli;
pub mod error;
pub mod seed;
pub mod signals;
