// src/io/mod.rs

pub mod read;
pub mod write;

pub use read::{expand_inputs, read_all, read_delimited};
pub use write::{write_csv, write_parquet};
