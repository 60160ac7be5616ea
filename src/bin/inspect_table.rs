use anyhow::{bail, Context, Result};
use glob::glob;
use i94etl::io::writer::SUCCESS_MARKER;
use parquet::arrow::parquet_to_arrow_schema;
use parquet::file::metadata::RowGroupMetaData;
use parquet::file::reader::{FileReader, SerializedFileReader};
use std::{
    env,
    fs::File,
    path::{Path, PathBuf},
    process::exit,
};

fn main() {
    // Expect exactly one CLI argument: an output table directory.
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <TABLE_DIR>", args[0]);
        exit(1);
    }
    if let Err(e) = inspect_table(Path::new(&args[1])) {
        eprintln!("Error: {:#}", e);
        exit(1);
    }
}

/// Print the schema, each part file (with its partition path) and row totals.
fn inspect_table(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        bail!("not a directory: {}", dir.display());
    }
    let mut files: Vec<PathBuf> = glob(&format!("{}/**/*.parquet", dir.display()))?
        .filter_map(Result::ok)
        .collect();
    files.sort();

    println!("=== Table: {} ===", dir.display());
    println!(
        "Committed:            {}",
        if dir.join(SUCCESS_MARKER).exists() { "yes" } else { "no" }
    );
    println!("Part files:           {}", files.len());
    println!();

    let mut total_rows = 0i64;
    for (i, path) in files.iter().enumerate() {
        let reader = SerializedFileReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )
        .with_context(|| format!("reading footer of {}", path.display()))?;
        let meta = reader.metadata();
        let file_meta = meta.file_metadata();

        if i == 0 {
            let schema = parquet_to_arrow_schema(
                file_meta.schema_descr(),
                file_meta.key_value_metadata(),
            )?;
            println!("=== Schema (data files) ===");
            for field in schema.fields() {
                println!(
                    "- {:<24} | {:<12} | nullable: {}",
                    field.name(),
                    field.data_type().to_string(),
                    field.is_nullable()
                );
            }
            println!();
        }

        let rel = path.strip_prefix(dir).unwrap_or(path);
        println!(
            "--- {} : {} rows in {} row group(s)",
            rel.display(),
            file_meta.num_rows(),
            meta.num_row_groups()
        );
        for rg_idx in 0..meta.num_row_groups() {
            print_row_group(rg_idx, meta.row_group(rg_idx));
        }
        total_rows += file_meta.num_rows();
    }

    println!();
    println!("Total rows:           {}", total_rows);
    Ok(())
}

/// One line per column chunk: codec, sizes and null count.
fn print_row_group(idx: usize, rg_md: &RowGroupMetaData) {
    println!(
        "    row group {}: {} rows, {} bytes uncompressed",
        idx,
        rg_md.num_rows(),
        rg_md.total_byte_size()
    );
    for col_md in rg_md.columns() {
        let nulls = col_md
            .statistics()
            .and_then(|s| s.null_count_opt())
            .map_or("?".to_string(), |n| n.to_string());
        println!(
            "      {:<24} {:<10} {:>10} -> {:>10} bytes, nulls: {}",
            col_md.column_descr().name(),
            format!("{:?}", col_md.compression()),
            col_md.uncompressed_size(),
            col_md.compressed_size(),
            nulls
        );
    }
}
