use std::process::ExitCode;

fn main() -> ExitCode {
    lynco_cli::run()
}
