use std::process::ExitCode;

use clap::Parser;
use db_cloner::args::Args;

fn main() -> ExitCode {
    let args = Args::parse();
    if !args.quiet {
        tracing_subscriber::fmt()
            .with_max_level(args.log_level)
            .init();
    }
    return match db_cloner::run(&args) {
        Ok(report) => {
            if args.json {
                match report.to_json() {
                    Ok(rendered) => println!("{rendered}"),
                    Err(err) => {
                        eprintln!("Failed to render the run report: {err:#}");
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                print!("{report}");
            }
            if report.succeeded() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("Run aborted: {err:#}");
            ExitCode::FAILURE
        }
    };
}
