use anyhow::{Context, Result};
use clap::Parser;
use lipread_data::{
    dataset::GenericDataset, stats::compute_dataset_stats, DatasetConfig, LipreadingDataset,
};
use prettytable::{cell, row, Table};
use std::{
    env,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Parser)]
/// Inspect lip reading datasets.
enum Opts {
    /// Show the dataset layout and the shapes of the first sample.
    Info {
        /// configuration file
        config_file: PathBuf,
        /// skip decoding the first sample
        #[clap(long)]
        no_sample: bool,
    },
    /// List class ids with their clip counts.
    Labels {
        /// configuration file
        config_file: PathBuf,
    },
    /// Compute pixel mean and standard deviation of raw clips and heatmaps.
    Stats {
        /// configuration file
        config_file: PathBuf,
        /// visit only the first N clips
        #[clap(long)]
        limit: Option<usize>,
    },
}

fn main() -> Result<()> {
    // setup logger
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();

    match Opts::parse() {
        Opts::Info {
            config_file,
            no_sample,
        } => info(config_file, !no_sample)?,
        Opts::Labels { config_file } => labels(config_file)?,
        Opts::Stats { config_file, limit } => stats(config_file, limit)?,
    }

    Ok(())
}

fn load_dataset(config_file: impl AsRef<Path>) -> Result<LipreadingDataset> {
    let config_file = config_file.as_ref();
    let config = DatasetConfig::open(config_file)
        .with_context(|| format!("failed to load config file '{}'", config_file.display()))?;
    LipreadingDataset::from_config(config)
}

fn info(config_file: impl AsRef<Path>, decode_sample: bool) -> Result<()> {
    let dataset = load_dataset(config_file)?;
    let config = dataset.config();

    {
        let mut table = Table::new();
        table.add_row(row!["root", config.root_dir.display()]);
        table.add_row(row!["split", config.split]);
        table.add_row(row!["clips", dataset.len()]);
        table.add_row(row!["classes", dataset.classes().len()]);
        table.add_row(row!["augment", config.augment]);
        table.add_row(row!["landmark mode", format!("{:?}", dataset.landmark_mode())]);
        table.add_row(row!["input channels", dataset.input_channels()]);
        table.add_row(row!["output size", config.output_size()]);
        table.printstd();
    }

    if decode_sample && !dataset.is_empty() {
        let sample = dataset.get(0)?;

        let mut table = Table::new();
        table.add_row(row!["file", "label", "clip shape", "landmark shape"]);
        table.add_row(row![
            dataset.files()[0].display(),
            sample.label,
            format!("{:?}", sample.clip.size()),
            sample
                .landmark
                .as_ref()
                .map(|landmark| format!("{:?}", landmark.size()))
                .unwrap_or_else(|| "-".into()),
        ]);
        table.printstd();
    }

    Ok(())
}

fn labels(config_file: impl AsRef<Path>) -> Result<()> {
    let dataset = load_dataset(config_file)?;
    let label_index = dataset.label_index();

    let mut counts = vec![0usize; label_index.num_classes()];
    for label in dataset.labels() {
        let id = label_index.f_id(label)?;
        counts[id] += 1;
    }

    let mut table = Table::new();
    table.add_row(row!["id", "label", "clips"]);
    label_index.iter().for_each(|(id, label)| {
        table.add_row(row![id, label, counts[id]]);
    });
    table.printstd();

    Ok(())
}

fn stats(config_file: impl AsRef<Path>, limit: Option<usize>) -> Result<()> {
    let dataset = load_dataset(config_file)?;
    let stats = compute_dataset_stats(&dataset, limit)?;

    let format = |value: Option<f64>| value.map_or_else(|| "-".into(), |value| format!("{}", value));

    let mut table = Table::new();
    table.add_row(row!["kind", "count", "mean", "std"]);
    table.add_row(row![
        "clip",
        stats.clip.count(),
        format(stats.clip.mean()),
        format(stats.clip.std()),
    ]);
    if let Some(landmark) = &stats.landmark {
        table.add_row(row![
            "landmark",
            landmark.count(),
            format(landmark.mean()),
            format(landmark.std()),
        ]);
    }
    println!("{} clips", stats.num_clips);
    table.printstd();

    Ok(())
}
