use std::path::Path;

use anyhow::Result;
use clap::Parser;

use local_cluster::data;
use local_cluster::engine::ClusterEngine;
use local_cluster::graph::{CompressedGraph, LazyGraph};
use local_cluster::storage;
use local_cluster::viz;
use local_cluster::Config;

#[derive(Parser, Debug)]
#[clap(
    name = "local-cluster",
    about = "Local cluster discovery around seed nodes of an edge list"
)]
struct Cli {
    /// Path to the input edge list (CSV, or Parquet by extension)
    #[clap(long)]
    input: String,

    /// Name of a seed node, repeat for several seeds
    #[clap(long = "seed", required = true)]
    seeds: Vec<String>,

    /// JSON configuration file, flags below override its values
    #[clap(long)]
    config: Option<String>,

    /// Output directory for results
    #[clap(long, default_value = "cluster_results")]
    output_dir: String,

    /// Source column of a Parquet edge table
    #[clap(long, default_value = "source")]
    source_column: String,

    /// Target column of a Parquet edge table
    #[clap(long, default_value = "target")]
    target_column: String,

    /// The CSV edge list has no header row
    #[clap(long)]
    no_header: bool,

    #[clap(long)]
    max_cluster_size: Option<usize>,

    #[clap(long)]
    min_cluster_size: Option<usize>,

    /// Relax the cluster definition until the minimum cluster size is reached
    #[clap(long)]
    hierarchical: bool,

    #[clap(long)]
    weighting_coefficient: Option<f64>,

    #[clap(long)]
    threshold_modifier: Option<f64>,

    /// Expansion phases per iteration
    #[clap(long)]
    expansion_steps: Option<usize>,

    /// Reduction phases per iteration
    #[clap(long)]
    reduction_steps: Option<usize>,

    /// Number of neighbor shells included in the visualizations
    #[clap(long, default_value = "1")]
    export_distance: usize,

    /// Reveal the whole graph up front instead of on first visit
    #[clap(long)]
    eager: bool,

    /// Skip visualizations
    #[clap(long)]
    skip_viz: bool,

    /// Verbose logging
    #[clap(long, short)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)?,
            None => Config::default(),
        };

        if let Some(value) = self.max_cluster_size {
            config.max_cluster_size = value;
        }
        if let Some(value) = self.min_cluster_size {
            config.min_cluster_size = value;
        }
        if let Some(value) = self.weighting_coefficient {
            config.weighting_coefficient = value;
        }
        if let Some(value) = self.threshold_modifier {
            config.threshold_modifier = value;
        }
        if let Some(value) = self.expansion_steps {
            config.expansion_step_count = value;
        }
        if let Some(value) = self.reduction_steps {
            config.reduction_step_count = value;
        }

        config.validate()?;
        Ok(config)
    }

    fn load_graph(&self) -> Result<CompressedGraph> {
        let is_parquet = Path::new(&self.input)
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("parquet"));

        if is_parquet {
            data::parquet::load_edge_table(&self.input, &self.source_column, &self.target_column)
        } else {
            data::csv::load_edge_list(&self.input, !self.no_header)
        }
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Cli::parse();

    // Configure logging
    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    let config = args.config()?;
    log::info!("Starting local cluster analysis");
    log::info!("Input: {}", args.input);
    log::info!("Output: {}", args.output_dir);
    log::debug!("Configuration: {:?}", config);

    std::fs::create_dir_all(&args.output_dir)?;

    // 1. Load data
    let source = args.load_graph()?;
    log::info!(
        "Loaded graph with {} nodes and {} edges ({} KiB)",
        source.node_count,
        source.edge_count(),
        source.memory_usage() / 1024
    );
    let graph = if args.eager {
        LazyGraph::eager(source)
    } else {
        LazyGraph::new(source)
    };
    let seeds = graph.resolve_names(args.seeds.as_slice())?;

    // 2. Find the cluster
    let run = if args.hierarchical {
        config.hierarchical_engine()?.cluster(&graph, &seeds)?
    } else {
        config.local_engine()?.cluster(&graph, &seeds)?
    };

    log::info!(
        "Found a cluster of {} nodes after {} steps ({}), {} of {} nodes visited",
        run.cluster.len(),
        run.history.len(),
        run.termination,
        graph.loaded_count(),
        graph.node_count()
    );
    log::debug!("Step history:\n{}", run.history);

    // 3. Save results
    storage::save_results(&run, graph.source(), &args.output_dir)?;

    // 4. Generate visualizations if requested
    if !args.skip_viz {
        let ranks = run.rank_provider();
        let export = viz::to_export(&graph, &run.cluster, args.export_distance, Some(&ranks), true)?;
        viz::generate_visualizations(&export, &args.output_dir)?;
    }

    log::info!("Analysis complete. Results saved to {}", args.output_dir);

    Ok(())
}
