use clap::Parser;
use log::info;
use tubes::{BoxError, Fount, Outputs, Siphon, StopReason, Tube};

use demos::helpers::{IterFount, Printer, init_logger};

#[derive(Parser)]
#[command(name = "Doubling Pipeline")]
#[command(author = "Rusty Rain <y@ngr.tc>")]
#[command(version = "0.1.0")]
#[command(about = "An example of a synchronous tubes pipeline", long_about = None)]
struct Cli {
    #[arg(short, long)]
    debug: bool,
    #[arg(long, default_value_t = 10)]
    count: u32,
    #[arg(long, default_value_t = format!("INFO"))]
    log_level: String,
}

struct Doubler;

impl Tube for Doubler {
    type Input = u32;
    type Output = u32;

    fn name(&self) -> &str {
        "Doubler"
    }

    fn received(&mut self, item: u32) -> Result<Outputs<u32>, BoxError> {
        Ok(Outputs::one(item * 2))
    }
}

/// Labels each item with the running total and reports the sum at the end.
#[derive(Default)]
struct Tally {
    total: u64,
}

impl Tube for Tally {
    type Input = u32;
    type Output = String;

    fn name(&self) -> &str {
        "Tally"
    }

    fn received(&mut self, item: u32) -> Result<Outputs<String>, BoxError> {
        self.total += u64::from(item);
        Ok(Outputs::one(format!("{item:>4} (running {})", self.total)))
    }

    fn stopped(&mut self, reason: &StopReason) -> Result<Outputs<String>, BoxError> {
        Ok(Outputs::one(format!("total {} ({reason})", self.total)))
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.debug, &cli.log_level)?;

    let source = IterFount::new(1..=cli.count);
    let doubler = Siphon::new(Doubler);
    let tally = Siphon::new(Tally::default());
    let printer = Printer::<String>::new("doubled");

    source.flow_to(Some(doubler.as_drain()))?;
    doubler.as_fount().flow_to(Some(tally.as_drain()))?;
    tally.as_fount().flow_to(Some(printer.clone()))?;

    info!("pumping {} items", cli.count);
    source.pump();

    info!(
        "printer received {} items and {} stop",
        printer.received(),
        printer.stops()
    );
    Ok(())
}
