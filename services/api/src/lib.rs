mod cli;
mod demo;
mod infra;
mod replay;
mod routes;
mod server;

use tenant_lifecycle::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
