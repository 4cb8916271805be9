mod cli;
mod commands;
mod infra;
mod routes;
mod server;

use pt_jobs::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
