//! Report printers selected by the `--json`, `--verbose` and `--quiet` flags.

mod human;
mod json;
mod report;

pub use report::ReportPrinter;

use crate::cli::Cli;
use human::TextPrinter;
use json::JsonPrinter;

/// `--json` wins over the text flags.
pub fn printer_for(cli: &Cli) -> Box<dyn ReportPrinter> {
    if cli.json {
        Box::new(JsonPrinter)
    } else {
        Box::new(TextPrinter::new(cli.verbose, cli.quiet))
    }
}
