mod aggregator;
mod api_client;
mod assembler;
mod config;
mod error;
mod extractor;
mod normalizer;
mod output;
mod pagination;
mod service;
mod table;

use api_client::HttpTransport;
use assembler::ReportAssembler;
use clap::{Parser, Subcommand};
use config::Config;
use error::Error;
use extractor::Extractor;
use log::error;
use service::ReportService;
use std::sync::Arc;

#[derive(Parser)]
struct Args {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Report,
}

#[derive(Subcommand)]
enum Report {
    /// Report across all platforms
    General {
        #[arg(long, help = "Sum numeric columns per platform")]
        summary: bool,
    },
    /// Report for a single platform
    Platform {
        #[arg(help = "Machine key of the platform, e.g. meta_ads")]
        platform: String,

        #[arg(long, help = "Sum numeric columns per account")]
        summary: bool,
    },
    /// List the machine keys of all platforms
    Platforms,
}

async fn run(args: Args) -> Result<String, Error> {
    let source = Arc::new(Extractor::new(HttpTransport::new(&args.config)));
    let assembler = ReportAssembler::new(source);

    match &args.command {
        Report::General { summary: false } => {
            service(assembler, &args.config).general_report().await
        }
        Report::General { summary: true } => {
            service(assembler, &args.config).general_summary().await
        }
        Report::Platform {
            platform,
            summary: false,
        } => {
            service(assembler, &args.config)
                .platform_report(platform)
                .await
        }
        Report::Platform {
            platform,
            summary: true,
        } => {
            service(assembler, &args.config)
                .platform_summary(platform)
                .await
        }
        Report::Platforms => {
            let keys = extractor::platform_keys(assembler.source()).await?;
            Ok(keys.into_iter().map(|key| key + "\n").collect())
        }
    }
}

fn service(assembler: ReportAssembler, config: &Config) -> ReportService {
    ReportService::new(assembler, &config.output_dir)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    env_logger::init();

    match run(args).await {
        Ok(output) => print!("{}", output),
        Err(err) if err.is_client_error() => {
            error!("invalid request: {}", err);
            std::process::exit(2);
        }
        Err(err) => {
            error!("failed to generate report: {}", err);
            std::process::exit(1);
        }
    }
}
