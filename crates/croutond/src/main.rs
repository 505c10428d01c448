use std::process::ExitCode;

use tracing::error;

fn main() -> ExitCode {
    match croutond::run_server() {
        Ok(()) => ExitCode::SUCCESS,
        Err(launch_error) => {
            error!(
                target: concat!(env!("CARGO_PKG_NAME"), "::process"),
                error = %launch_error,
                "server exited with an error"
            );
            eprintln!("croutond: {launch_error}");
            ExitCode::FAILURE
        }
    }
}
