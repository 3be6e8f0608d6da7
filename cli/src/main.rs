//! Entry point: parses arguments, wires up logging and error reporting,
//! and drives `iterate_state::run` with a fixed-field printer.

mod args;
mod print;

use color_eyre::eyre::Result;
use structopt::StructOpt;
use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use args::Opt;
use print::Printer;

fn init_tracing(quiet: bool) -> Result<()> {
    let default_level = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    Registry::default().with(filter).with(fmt_layer).with(ErrorLayer::default()).try_init()?;
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let opt = Opt::from_args();
    init_tracing(opt.quiet)?;

    let config = opt.to_config();
    let mut printer = Printer::new(&opt);

    iterate_state::run(&config, &mut printer)?;
    Ok(())
}
