// Copyright 2026 graniteq developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use dotenv::dotenv;

use graniteq::{
    decode_index, setup_local_tracing, GeneralConfig, LogConfig, LogManager, StoreConfig,
    StoreError, StoreResult, INDEX_RECORD_LEN,
};

#[derive(Parser)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the records of one segment data file
    Data {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Print the entries of one segment index file
    Index {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Print the aggregate stored bytes per topic partition
    Inventory {
        #[arg(short, long)]
        dir: PathBuf,
    },
}

fn main() -> StoreResult<()> {
    dotenv().ok();
    setup_local_tracing()?;

    let cli = Cli::parse();
    match &cli.command {
        Commands::Data { file } => parse_data(file),
        Commands::Index { file } => parse_index(file),
        Commands::Inventory { dir } => print_inventory(dir),
    }
}

fn parse_index(file: &Path) -> StoreResult<()> {
    let bytes = fs::read(file)?;
    for (i, record) in bytes.chunks(INDEX_RECORD_LEN).enumerate() {
        match decode_index(record) {
            Ok((offset, position)) => {
                println!("{:>6}  offset={} position={}", i, offset, position)
            }
            Err(e) => {
                println!("{:>6}  <torn record: {}>", i, e);
                break;
            }
        }
    }
    Ok(())
}

/// Slices the data file along its index entries, so records are printed
/// exactly as stored rather than re-split on the separator byte.
fn parse_data(file: &Path) -> StoreResult<()> {
    let data = fs::read(file)?;
    let index_path = file.with_extension("index");
    let index = fs::read(&index_path).map_err(|e| {
        StoreError::DetailedIoError(format!(
            "open index file: {} error: {}",
            index_path.display(),
            e
        ))
    })?;

    let entries: Vec<(i64, i64)> = index
        .chunks_exact(INDEX_RECORD_LEN)
        .map(decode_index)
        .collect::<StoreResult<_>>()?;

    for (i, &(offset, position)) in entries.iter().enumerate() {
        let end = entries
            .get(i + 1)
            .map(|&(_, next_position)| next_position as usize - 1)
            .unwrap_or_else(|| data.len().saturating_sub(1));
        let record = &data[position as usize..end];
        println!("offset {}: {}", offset, String::from_utf8_lossy(record));
    }
    Ok(())
}

fn print_inventory(dir: &Path) -> StoreResult<()> {
    let config = StoreConfig {
        general: GeneralConfig {
            data_dir: dir.to_string_lossy().to_string(),
        },
        log: LogConfig::default(),
    };
    let manager = LogManager::new(config)?;
    for entry in manager.inventory()? {
        println!("{:<32} {:>12} bytes", entry.topic_partition.id(), entry.size_bytes);
    }
    Ok(())
}
