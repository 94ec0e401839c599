use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use stationtab::{
    aggregate::{group_stats, keys_where, missing_by_group},
    io::{write_csv, write_parquet},
    station,
    table::{missing::SkipAbsent, transform::text_mask},
    Config,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "stationtab", version, about = "Clean and summarise monthly weather-station tables")]
struct Cli {
    /// YAML config; defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Clean the input and write it back out
    Prepare {
        /// Input files or glob patterns
        #[arg(required = true)]
        inputs: Vec<String>,
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long, value_enum, default_value_t = Format::Csv)]
        format: Format,
    },
    /// List groups with at least one absent value in the target column
    Missing {
        #[arg(required = true)]
        inputs: Vec<String>,
        #[arg(long)]
        target: Option<String>,
        #[arg(long)]
        group: Option<String>,
        /// Print every group and its flag as JSON
        #[arg(long)]
        json: bool,
    },
    /// Count, sum and mean of the target column per group
    Stats {
        #[arg(required = true)]
        inputs: Vec<String>,
        #[arg(long)]
        target: Option<String>,
        #[arg(long)]
        group: Option<String>,
        /// Ignore absent values instead of propagating them
        #[arg(long)]
        skip_absent: bool,
        #[arg(long)]
        json: bool,
    },
    /// Print the first rows of the cleaned table
    Head {
        #[arg(required = true)]
        inputs: Vec<String>,
        #[arg(short = 'n', long, default_value_t = 6)]
        rows: usize,
        /// Only rows whose group column contains this text
        #[arg(long)]
        matching: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Parquet,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Command::Prepare {
            inputs,
            out,
            format,
        } => {
            let table = station::load(&inputs, &config)?;
            let bytes = match format {
                Format::Csv => write_csv(&table, &out, config.delimiter_byte(), &config.na)?,
                Format::Parquet => write_parquet(&table, &out)?,
            };
            info!(out = %out.display(), bytes, "done");
        }

        Command::Missing {
            inputs,
            target,
            group,
            json,
        } => {
            if let Some(g) = group {
                config.group_column = g;
            }
            let target = target.unwrap_or_else(|| config.target_column.clone());
            let table = station::load(&inputs, &config)?;
            if json {
                let scan = missing_by_group(&table, &target, &config.group_column)?;
                println!("{}", serde_json::to_string_pretty(&scan)?);
            } else {
                let stations = station::stations_with_missing(&table, &target, &config)?;
                info!(count = stations.len(), target = %target, "groups with absent values");
                for s in stations {
                    println!("{}", s);
                }
            }
        }

        Command::Stats {
            inputs,
            target,
            group,
            skip_absent,
            json,
        } => {
            let target = target.unwrap_or_else(|| config.target_column.clone());
            let group = group.unwrap_or_else(|| config.group_column.clone());
            let table = station::load(&inputs, &config)?;
            let skip = SkipAbsent::from_flag(skip_absent);
            let stats = group_stats(&table, &target, &group, skip)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                let incomplete = keys_where(&stats, |s| s.absent > 0);
                for (key, s) in &stats {
                    println!(
                        "{}\tcount={}\tabsent={}\tsum={}\tmean={}",
                        key,
                        s.count,
                        s.absent,
                        fmt_opt(s.sum, &config.na),
                        fmt_opt(s.mean, &config.na)
                    );
                }
                info!(groups = stats.len(), incomplete = incomplete.len(), "stats");
            }
        }

        Command::Head {
            inputs,
            rows,
            matching,
        } => {
            let mut table = station::load(&inputs, &config)?;
            if let Some(needle) = matching {
                let keep = text_mask(table.text(&config.group_column)?, |s| s.contains(&needle));
                table = table.filter(&keep)?;
            }
            println!("{}", table.head(rows));
            println!("{} rows x {} columns", table.num_rows(), table.num_columns());
        }
    }

    Ok(())
}

fn fmt_opt(v: Option<f64>, na: &str) -> String {
    v.map(|x| x.to_string()).unwrap_or_else(|| na.to_string())
}
