use journal_brief::config::PACKAGE;
use std::process::ExitCode;

fn main() -> ExitCode {
    match journal_brief::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{PACKAGE}: {e:#}");
            ExitCode::FAILURE
        }
    }
}
