pub mod reader;
pub mod writer;

pub use reader::{read_delimited, read_parquet_dir, Table};
pub use writer::{escape_partition_value, TableWriter, WriteSummary};
