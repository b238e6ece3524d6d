use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use kernel_forge::{config, dsl};
use log::info;

#[derive(Debug, Default, Clone)]
struct Cli {
    kernel_json: Option<PathBuf>,
    config: Option<PathBuf>,
    output: Option<PathBuf>,
    layout_report: Option<PathBuf>,
}

const USAGE: &str = "--kernel-json <kernel.json> [--config <config.json>] [--output <kernel.hlsl>] [--layout-report <layouts.json>]";

fn parse_cli(args: &[String]) -> Result<Cli> {
    let mut cli = Cli::default();
    let mut i = 0;
    while i < args.len() {
        let slot = match args[i].as_str() {
            "--kernel-json" => &mut cli.kernel_json,
            "--config" => &mut cli.config,
            "--output" | "-o" => &mut cli.output,
            "--layout-report" => &mut cli.layout_report,
            other => {
                return Err(anyhow!("unknown argument: {other} (usage: {USAGE})"));
            }
        };
        let Some(v) = args.get(i + 1) else {
            return Err(anyhow!("missing value for {}", args[i]));
        };
        *slot = Some(PathBuf::from(v));
        i += 2;
    }
    Ok(cli)
}

fn run(cli: &Cli) -> Result<()> {
    let kernel_path = cli
        .kernel_json
        .as_deref()
        .ok_or_else(|| anyhow!("--kernel-json is required (usage: {USAGE})"))?;

    let config = match &cli.config {
        Some(path) => config::load_config_from_path(path)?,
        None => config::CompilerConfig::default(),
    };

    let kernel = dsl::load_kernel_from_path(kernel_path)?;
    let built = dsl::build_kernel_unit(&kernel)
        .with_context(|| format!("invalid kernel description {}", kernel_path.display()))?;
    let source = built
        .unit
        .compile(&built.types, &config)
        .with_context(|| format!("failed to compile kernel {}", kernel.name))?;

    match &cli.output {
        Some(path) => {
            write_file(path, &source.text)?;
            info!(
                "[kernel-forge] wrote {} ({} / {})",
                path.display(),
                source.entry_point,
                source.profile
            );
        }
        None => print!("{}", source.text),
    }

    if let Some(path) = &cli.layout_report {
        let report = dsl::build_layout_report(&kernel, &built)?;
        let json = serde_json::to_string_pretty(&report).context("failed to encode layout report")?;
        write_file(path, &json)?;
        info!(
            "[kernel-forge] wrote {} ({} layout(s))",
            path.display(),
            report.layouts.len()
        );
    }
    Ok(())
}

fn write_file(path: &Path, text: &str) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_cli(&args)?;
    run(&cli)
}
