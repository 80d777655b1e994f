use clap::Parser;
use console::style;
use dev_report::cli::Cli;
use dev_report::error::PipelineError;
use std::process::ExitCode;

const EXIT_INTERRUPTED: u8 = 130;

fn main() -> ExitCode {
    let cli = <Cli as Parser>::parse();
    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if matches!(e.downcast_ref::<PipelineError>(), Some(PipelineError::Cancelled)) => {
            eprintln!("{}", style("Interrupted").yellow());
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
