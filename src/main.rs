use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match interleaf::run().await {
        Ok(report) => {
            if !report.is_complete() {
                eprintln!(
                    "finished with {} untranslated unit(s){}",
                    report.failures.len(),
                    if report.stopped.is_some() { ", run stopped early" } else { "" }
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "interleaf failed");
            eprintln!("interleaf: {e}");
            ExitCode::FAILURE
        }
    }
}
