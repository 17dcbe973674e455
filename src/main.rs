//! mongo-watch entry point: parses the CLI, connects and prints the change stream.

use log::info;
use rs_mongo_watch::{cli, MongoStream, MongoStreamError};
use tokio::sync::mpsc;

async fn run() -> Result<(), MongoStreamError> {
    let config = cli::parse()?;
    let (stream, options) = MongoStream::open(&config).await?;

    let (close_tx, mut close_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received");
            let _ = close_tx.send(()).await;
        }
    });

    let mut out = std::io::stdout();
    stream
        .run(config.pipeline, options, config.display, &mut out, &mut close_rx)
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}
