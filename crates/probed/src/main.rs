use std::process::ExitCode;

fn main() -> ExitCode {
    match probed::run_server() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("probed: {error}");
            ExitCode::FAILURE
        }
    }
}
