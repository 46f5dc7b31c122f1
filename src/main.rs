use chart_tiles::config::{self, ToolConfig};
use chart_tiles::fetch::ReqwestClient;
use chart_tiles::layout::StageLayout;
use chart_tiles::pipeline::{self, Pipeline};
use chart_tiles::toolkit::GdalToolkit;
use chart_tiles::types::Category;
use chart_tiles::{logging, output};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

/// Category selection for the `run` command.
#[derive(clap::Args, Clone)]
struct CategoryArgs {
    /// Process the VFR sectional charts
    #[arg(long)]
    sectional: bool,

    /// Process the terminal area charts
    #[arg(long)]
    tac: bool,

    /// Process the VFR wall planning chart
    #[arg(long)]
    planning: bool,
}

impl CategoryArgs {
    fn selected(&self) -> Vec<Category> {
        [
            (self.sectional, Category::Sectional),
            (self.tac, Category::Tac),
            (self.planning, Category::Planning),
        ]
        .into_iter()
        .filter_map(|(on, category)| on.then_some(category))
        .collect()
    }
}

#[derive(Parser)]
#[command(name = "chart-tiles")]
#[command(about = "Incremental FAA raster chart to web tile pipeline")]
#[command(long_about = "\
Incremental FAA raster chart to web tile pipeline

Keeps a local mirror of the FAA VFR raster charts current and turns it into
an XYZ tile pyramid. Only charts whose published version changed are
downloaded; every stage resumes where an interrupted run stopped.

Stages (per category, under <work_dir>/<category>/):

  01_raw/       archive raster, as published
  02_rgba/      palette expanded to RGBA        (gdal_translate)
  03_cropped/   legend and border cut away      (gdalwarp -cutline)
  04_warped/    reprojected to Web Mercator     (gdalwarp -t_srs)
  tiles         mosaic + pyramid, swapped into <tiles_dir>/<category>/
                                                (gdalbuildvrt, gdal2tiles)

Requires the GDAL command-line utilities on PATH.

Run 'chart-tiles gen-config' to generate a documented chart-tiles.toml.")]
#[command(version)]
struct Cli {
    /// Configuration file (missing file = stock defaults)
    #[arg(long, default_value = "chart-tiles.toml", global = true)]
    config: PathBuf,

    /// Debug logging for this tool (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch new chart versions and rebuild tiles for the selected categories
    Run {
        #[command(flatten)]
        categories: CategoryArgs,

        /// Skip the catalog and work with already-downloaded charts
        #[arg(long)]
        no_fetch: bool,
    },
    /// Show ledger entries and staged artifact counts
    Status {
        /// Categories to inspect (default: all)
        #[arg(value_enum)]
        categories: Vec<Category>,
    },
    /// Delete every staged artifact of a category so it is rebuilt from scratch
    Reset {
        #[arg(value_enum)]
        category: Category,
    },
    /// Print a stock chart-tiles.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Command::Run {
            categories,
            no_fetch,
        } => {
            let selected = categories.selected();
            if selected.is_empty() {
                return Err("select at least one of --sectional, --tac, --planning".into());
            }
            let tool_config = config::load_config(&cli.config)?;
            run(&tool_config, &selected, !no_fetch)?;
        }
        Command::Status { categories } => {
            let tool_config = config::load_config(&cli.config)?;
            let categories = if categories.is_empty() {
                Category::ALL.to_vec()
            } else {
                categories
            };
            for category in categories {
                let status =
                    pipeline::category_status(&tool_config.pipeline_config(category, false))?;
                output::print_status(&status);
            }
        }
        Command::Reset { category } => {
            let tool_config = config::load_config(&cli.config)?;
            let pipeline_config = tool_config.pipeline_config(category, false);
            StageLayout::new(&pipeline_config.work_dir).reset()?;
            info!(%category, "staged artifacts removed, ledger kept");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn run(
    tool_config: &ToolConfig,
    categories: &[Category],
    should_fetch: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let http = ReqwestClient::with_timeout(tool_config.catalog.timeout_secs)?;
    let toolkit = GdalToolkit::new(tool_config.toolkit.clone());

    let mut failures = 0;
    for &category in categories {
        let config = tool_config.pipeline_config(category, should_fetch);
        let mut pipeline = Pipeline::new(config, &toolkit, &http)?;
        let report = pipeline.run()?;
        output::print_run_report(&report);
        if report.has_failures() {
            failures += 1;
        }
    }

    if failures > 0 {
        warn!(
            categories = failures,
            "some charts failed and will be retried on the next run"
        );
    }
    Ok(())
}
