use anomscan::{
    detect::{run_detection, DetectionRun, MaxSamplesClamp, RunConfig},
    fetch::{self, Credentials},
    report,
    summary::{explanation_frequency, group_summary, ResultFilter},
    table::{self, RawTable},
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

#[derive(Parser)]
#[command(name = "anomscan")]
#[command(about = "Flag and explain anomalous latest-period values, row by row")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every row of one or more CSV tables and write reports
    Scan {
        /// CSV paths, glob patterns or http(s) URLs
        inputs: Vec<String>,

        /// Fetch a planning-model export instead of (or as well as) INPUTS
        #[arg(long, num_args = 3, value_names = ["WORKSPACE", "MODEL", "FILE"])]
        anaplan: Option<Vec<String>>,

        /// YAML or JSON run configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of trees
        #[arg(long)]
        n_estimators: Option<usize>,

        /// Expected outlier share, in (0, 0.5]
        #[arg(long)]
        contamination: Option<f64>,

        /// Upper bound on each tree's sub-sample
        #[arg(long)]
        max_samples: Option<usize>,

        /// How max-samples is bounded: column_count, sample_count or none
        #[arg(long)]
        max_samples_clamp: Option<String>,

        /// Seed for every per-row forest
        #[arg(long)]
        random_state: Option<u64>,

        /// Dimension column(s) to group the chart summary by
        #[arg(short, long)]
        group_by: Vec<String>,

        /// Keep only the N most frequent groups
        #[arg(long)]
        top_n: Option<usize>,

        /// All, Anomaly, Normal or "Insufficient Data"
        #[arg(long)]
        filter: Option<ResultFilter>,

        /// Report directory; one sub-directory per input
        #[arg(short, long, default_value = "reports")]
        out: PathBuf,
    },
}

/// One table to scan, with the name its reports are filed under.
enum Source {
    Local(PathBuf),
    Remote(Url),
}

impl Source {
    fn name(&self) -> String {
        match self {
            Source::Local(p) => p
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| p.display().to_string()),
            Source::Remote(u) => fetch::source_name(u),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,anomscan=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Scan {
            inputs,
            anaplan,
            config,
            n_estimators,
            contamination,
            max_samples,
            max_samples_clamp,
            random_state,
            group_by,
            top_n,
            filter,
            out,
        } => {
            // ─── 2) resolve configuration ─────────────────────────────────
            let mut cfg = match &config {
                Some(path) => RunConfig::from_path(path)?,
                None => RunConfig::default(),
            };
            let det = &mut cfg.detection;
            if let Some(v) = n_estimators {
                det.n_estimators = v;
            }
            if let Some(v) = contamination {
                det.contamination = v;
            }
            if let Some(v) = max_samples {
                det.max_samples = v;
            }
            if let Some(v) = max_samples_clamp {
                det.max_samples_clamp = parse_clamp(&v)?;
            }
            if let Some(v) = random_state {
                det.random_state = v;
            }
            if !group_by.is_empty() {
                cfg.chart.group_by = group_by;
            }
            if let Some(v) = top_n {
                cfg.chart.top_n = v;
            }
            if let Some(v) = filter {
                cfg.chart.result_filter = v;
            }
            cfg.validate()?;
            info!(config = ?cfg, "startup");

            // ─── 3) resolve inputs ────────────────────────────────────────
            let mut sources = resolve_inputs(&inputs)?;
            if let Some(ids) = anaplan {
                sources.push(Source::Remote(fetch::anaplan_chunk_url(
                    &ids[0], &ids[1], &ids[2],
                )?));
            }
            if sources.is_empty() {
                return Err(anyhow!("no inputs given"));
            }
            info!("{} table(s) to scan", sources.len());

            // ─── 4) scan each input; one failure does not stop the rest ──
            let client = Client::new();
            let credentials = Credentials::from_env("ANOMSCAN");
            let mut failed = 0usize;
            for source in &sources {
                let name = source.name();
                let start = Instant::now();
                match scan_one(&client, credentials.as_ref(), source, &cfg, &out).await {
                    Ok(()) => info!(source = %name, elapsed = ?start.elapsed(), "scanned"),
                    Err(e) => {
                        error!(source = %name, "scan failed: {:#}", e);
                        failed += 1;
                    }
                }
            }

            if failed > 0 {
                return Err(anyhow!("{} of {} input(s) failed", failed, sources.len()));
            }
            info!("all done");
        }
    }
    Ok(())
}

fn parse_clamp(v: &str) -> Result<MaxSamplesClamp> {
    match v.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "column_count" => Ok(MaxSamplesClamp::ColumnCount),
        "sample_count" => Ok(MaxSamplesClamp::SampleCount),
        "none" => Ok(MaxSamplesClamp::None),
        other => Err(anyhow!("unknown max-samples clamp `{}`", other)),
    }
}

/// Expand glob patterns and classify URLs; plain paths pass through.
fn resolve_inputs(inputs: &[String]) -> Result<Vec<Source>> {
    let mut sources = Vec::new();
    for input in inputs {
        if fetch::is_remote(input) {
            sources.push(Source::Remote(Url::parse(input)?));
        } else if input.contains(['*', '?', '[']) {
            let mut matched = 0;
            for entry in glob::glob(input)
                .with_context(|| format!("Failed to read glob pattern '{}'", input))?
            {
                match entry {
                    Ok(path) if path.is_file() => {
                        sources.push(Source::Local(path));
                        matched += 1;
                    }
                    Ok(_) => {}
                    Err(e) => warn!("cannot read glob entry: {}", e),
                }
            }
            if matched == 0 {
                warn!(pattern = %input, "glob matched no files");
            }
        } else {
            sources.push(Source::Local(PathBuf::from(input)));
        }
    }
    Ok(sources)
}

async fn scan_one(
    client: &Client,
    credentials: Option<&Credentials>,
    source: &Source,
    cfg: &RunConfig,
    out: &Path,
) -> Result<()> {
    let name = source.name();
    let raw: RawTable = match source {
        Source::Local(path) => table::load_csv(path)?,
        Source::Remote(url) => {
            let body = fetch::fetch_csv(client, url, credentials).await?;
            table::load_csv_bytes(&body).with_context(|| format!("parsing CSV from {}", url))?
        }
    };

    // offload the per-row fits to the blocking pool
    let run: DetectionRun = tokio::task::spawn_blocking({
        let detection = cfg.detection.clone();
        move || run_detection(&raw, &detection)
    })
    .await??;

    let explanations = explanation_frequency(run.explanations());
    let groups = group_summary(&run, &cfg.chart)?;
    print_summary(&name, &run, &explanations, &groups);

    let dest = out.join(report_dir_name(&name));
    report::write_reports(
        &run,
        &name,
        (!cfg.chart.group_by.is_empty()).then_some(groups.as_slice()),
        &dest,
    )?;
    println!("  reports: {}", dest.display());
    Ok(())
}

fn report_dir_name(source_name: &str) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| source_name.to_string());
    stem.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn print_summary(
    name: &str,
    run: &DetectionRun,
    explanations: &[anomscan::summary::ExplanationCount],
    groups: &[anomscan::summary::GroupCount],
) {
    println!("\n--- {} ({} rows) ---", name, run.num_rows());
    for (result, count) in run.tally() {
        println!("  {:<20} {:>8}", result.as_str(), count);
    }

    println!("\n  Explanation breakdown");
    for e in explanations {
        println!("  {:<32} {:>8} {:>6.1}%", e.explanation, e.count, e.percentage);
    }

    if !groups.is_empty() {
        println!("\n  By group");
        for g in groups {
            println!("  {:<40} {:<20} {:>8}", g.group_label, g.result.as_str(), g.count);
        }
    }
}
