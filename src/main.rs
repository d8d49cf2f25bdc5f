use cloudmon::{cli_parse, init_logging, run};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = cli_parse();
    init_logging(cli.verbose, cli.quiet);
    log::debug!("logging initialized");

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
