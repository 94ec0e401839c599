pub mod aggregate;
pub mod config;
pub mod io;
pub mod station;
pub mod table;

pub use config::Config;
pub use table::Table;
