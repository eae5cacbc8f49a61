use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    weekly_planner::init_tracing();

    match weekly_planner::run(|key| std::env::var(key).ok()).await {
        Ok(dashboard) => match serde_json::to_string_pretty(&dashboard) {
            Ok(rendered) => {
                println!("{rendered}");
                ExitCode::SUCCESS
            }
            Err(error) => {
                tracing::error!(%error, "failed to render dashboard");
                ExitCode::FAILURE
            }
        },
        Err(error) => {
            tracing::error!(%error, "planner failed");
            ExitCode::FAILURE
        }
    }
}
