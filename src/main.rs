use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use arrow::util::pretty::pretty_format_batches;
use clap::Parser;

use rusty_fits::{
    classify, ingest, is_fits, read_as_cube_labelled, Container, ContainerSummary, Dataset,
    IngestOptions,
};

/// Inspect a FITS container: list the datasets it ingests into.
#[derive(Debug, Parser)]
#[command(name = "rusty-fits", version)]
struct Args {
    /// Container to read (`.fits`, `.fits.gz`, or any gzip-wrapped FITS)
    path: PathBuf,

    /// Group same-shape segments into one dataset
    #[arg(long)]
    auto_merge: bool,

    /// Skip the segment with this name (repeatable)
    #[arg(long = "exclude", value_name = "NAME")]
    exclude: Vec<String>,

    /// Label prefix instead of the file name (also used with --cube)
    #[arg(long)]
    label: Option<String>,

    /// JSON file with ingest options; flags override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Read the container as a Stokes cube
    #[arg(long, conflicts_with_all = ["auto_merge", "exclude"])]
    cube: bool,

    /// Only report which convention the container follows
    #[arg(long)]
    detect: bool,

    /// Print the header cards of one segment
    #[arg(long, value_name = "NAME")]
    header: Option<String>,

    /// Print the first N rows of every dataset
    #[arg(long, value_name = "N")]
    head: Option<usize>,

    /// Emit dataset summaries as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn options(&self) -> Result<IngestOptions> {
        let mut options = match &self.config {
            Some(path) => IngestOptions::from_json_file(path)
                .with_context(|| format!("loading options from {}", path.display()))?,
            None => IngestOptions::default(),
        };
        options = options.with_exclude(self.exclude.iter().cloned());
        if self.auto_merge {
            options.auto_merge = true;
        }
        if let Some(label) = &self.label {
            options.label = Some(label.clone());
        }
        Ok(options)
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if !is_fits(&args.path).with_context(|| format!("probing {}", args.path.display()))? {
        bail!("{} is not a FITS container", args.path.display());
    }
    let container = Container::open(&args.path)
        .with_context(|| format!("opening {}", args.path.display()))?;

    if args.detect {
        let summary = ContainerSummary::from_container(&container);
        println!("{:?}", classify(&summary));
        return Ok(());
    }

    if let Some(name) = &args.header {
        let segment = container.segment(name)?;
        for card in segment.header().cards() {
            match &card.value {
                Some(value) => println!("{:<8}= {value}", card.keyword),
                None => println!("{}", card.keyword),
            }
        }
        return Ok(());
    }

    let options = args.options()?;
    let datasets = if args.cube {
        let prefix = options
            .label
            .clone()
            .unwrap_or_else(|| container.label_prefix());
        vec![read_as_cube_labelled(&container, &prefix)?]
    } else {
        ingest(&container, &options)?
    };

    if args.json {
        let summaries: Vec<_> = datasets.iter().map(Dataset::summary).collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    for dataset in &datasets {
        println!(
            "{}  shape {:?}  components {:?}",
            dataset.label(),
            dataset.shape(),
            dataset.component_names()
        );
        if let Some(n) = args.head {
            if dataset.components().is_empty() {
                continue;
            }
            let batch = dataset
                .to_record_batch()
                .with_context(|| format!("materializing {}", dataset.label()))?;
            let rows = n.min(batch.num_rows());
            println!("{}", pretty_format_batches(&[batch.slice(0, rows)])?);
        }
    }
    Ok(())
}
