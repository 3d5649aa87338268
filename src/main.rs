// Prints the initial screen as JSON for the UI shell.
#[tokio::main]
async fn main() -> std::process::ExitCode {
    match docintake_lib::run().await {
        Ok((_state, report, screen)) => {
            let out = serde_json::json!({ "screen": screen, "mount": report });
            println!("{out}");
            std::process::ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Startup failed: {e}");
            eprintln!("docintake: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}
