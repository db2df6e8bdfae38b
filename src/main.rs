#[macro_use]
extern crate log;

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use engine::{DocumentSchema, FinishedOperation, IndexGateway, Settings};
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "feed-index-gateway",
    about = "Demo harness for the feed search index gateway."
)]
struct Options {
    /// The log level filter, any logs above this level won't be displayed.
    #[structopt(long, default_value = "info", env)]
    log_level: LevelFilter,

    /// Disable ANSI colours for log levels. You probably want this if
    /// logging to a file.
    #[structopt(long, env)]
    no_colour: bool,

    /// Directory to store the index in. If omitted, an in-memory index is
    /// used and nothing survives past this run.
    #[structopt(long, env)]
    index_dir: Option<PathBuf>,

    /// Default analysis culture for documents that don't name one.
    #[structopt(long, default_value = "en-US", env)]
    default_culture: String,

    /// Optional file to send persistent logs to.
    #[structopt(long, env)]
    log_file: Option<String>,
}

fn setup_logger(level: LevelFilter, log_file: &Option<String>, colour: bool) -> Result<()> {
    let mut colours = ColoredLevelConfig::new();
    if colour {
        colours = colours
            .info(Color::Green)
            .warn(Color::Yellow)
            .error(Color::BrightRed)
            .debug(Color::Magenta)
            .trace(Color::Cyan);
    }

    let mut builder = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} | {} | {:<5} - {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                colours.color(record.level()),
                message,
            ))
        })
        .level(level)
        .chain(std::io::stdout());

    if let Some(file) = log_file {
        builder = builder.chain(fern::log_file(file)?);
    }

    builder.apply()?;
    Ok(())
}

/// Parses CLI/env settings and wires up logging before anything else runs.
fn setup() -> Result<Options> {
    let options = Options::from_args();
    setup_logger(options.log_level, &options.log_file, !options.no_colour)?;
    Ok(options)
}

fn main() -> Result<()> {
    let options = setup()?;

    let settings = match &options.index_dir {
        Some(path) => Settings::on_disk(path.clone(), options.default_culture.clone()),
        None => Settings::in_memory(options.default_culture.clone()),
    };

    let observer = Arc::new(|finished: FinishedOperation| {
        if finished.succeeded {
            info!("finished {} (enqueued at {})", finished.label, finished.enqueued_at);
        } else {
            warn!("operation {} did not complete cleanly", finished.label);
        }
    });

    let mut gateway = IndexGateway::start(
        "feed-index-gateway-demo",
        &settings,
        DocumentSchema::default_schema(),
        observer,
    )?;

    info!("reading '<key>\\t<body>' pairs from stdin, one document per line");

    let stdin = std::io::stdin();
    let mut count = 0u64;
    for line in stdin.lock().lines() {
        let line = line?;
        let Some((key, body)) = line.split_once('\t') else {
            warn!("skipping line without a tab-separated key: {:?}", line);
            continue;
        };

        let document = DocumentSchema::default_schema().make_document(key, body);
        gateway.add(document, None);
        count += 1;
    }

    info!("enqueued {} documents, flushing", count);
    gateway.flush(false);

    match gateway.num_documents() {
        Ok(n) => info!("index now holds {} documents", n),
        Err(err) => error!("could not read document count: {}", err),
    }

    gateway.stop();
    Ok(())
}
