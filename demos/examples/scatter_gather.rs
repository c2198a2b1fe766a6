use clap::Parser;
use log::info;
use std::rc::Rc;
use tubes::{BoxError, Drain, Fount, Outputs, Siphon, Thru, Tube};
use tubes_rt::{LocalExecutorBuilder, spawn_deferred, yield_local};

use demos::helpers::{IterFount, Printer, init_logger};

#[derive(Parser)]
#[command(name = "Scatter Gather")]
#[command(author = "Rusty Rain <y@ngr.tc>")]
#[command(version = "0.1.0")]
#[command(about = "An example of fan-out, fan-in and pending values", long_about = None)]
struct Cli {
    #[arg(short, long)]
    debug: bool,
    #[arg(long, default_value_t = format!("INFO"))]
    log_level: String,
    /// Words to send through both branches
    #[arg(default_values_t = [format!("alpha"), format!("beta"), format!("gamma")])]
    words: Vec<String>,
}

struct Shout;

impl Tube for Shout {
    type Input = String;
    type Output = String;

    fn name(&self) -> &str {
        "Shout"
    }

    fn received(&mut self, word: String) -> Result<Outputs<String>, BoxError> {
        Ok(Outputs::one(word.to_uppercase()))
    }
}

/// Counts letters on the executor; the flow pauses until each count arrives.
struct Measure;

impl Tube for Measure {
    type Input = String;
    type Output = String;

    fn name(&self) -> &str {
        "Measure"
    }

    fn received(&mut self, word: String) -> Result<Outputs<String>, BoxError> {
        Ok(Outputs::pending(spawn_deferred(async move {
            yield_local().await;
            format!("{word} has {} letters", word.chars().count())
        })))
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.debug, &cli.log_level)?;

    LocalExecutorBuilder::default()
        .name("scatter-gather")
        .run(async move {
            let expected = cli.words.len() * 2;
            let source = IterFount::new(cli.words);
            let thru = Thru::<String, String>::new(vec![
                Siphon::new(Shout).as_drain(),
                Siphon::new(Measure).as_drain(),
            ]);
            let printer = Printer::<String>::new("gathered");

            let thru_drain: Rc<dyn Drain<String>> = thru.clone();
            source.flow_to(Some(thru_drain))?;
            thru.fount().flow_to(Some(printer.clone()))?;

            source.pump();
            while printer.stops() < 2 {
                yield_local().await;
            }

            info!(
                "printer received {}/{} items",
                printer.received(),
                expected
            );
            Ok::<_, anyhow::Error>(())
        })
}
