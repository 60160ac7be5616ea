pub mod config;
pub mod error;
pub mod io;
pub mod process;

pub use config::{Config, Credentials};
pub use error::EtlError;
pub use process::run;
