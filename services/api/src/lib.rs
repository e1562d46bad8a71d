mod cli;
mod demo;
mod infra;
mod routes;
mod server;
mod snapshot;

use sirepre::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
