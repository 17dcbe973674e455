//! Core functionality for consuming a MongoDB change stream.
//!
//! This module provides the `MongoStream` type, which owns the client
//! connection and opens the stream, and [`consume`], the loop that writes each
//! event to the output sink.

use std::io::Write;

use log::{debug, info};
use mongodb::{
    bson::{doc, Document},
    change_stream::ChangeStream,
    options::ChangeStreamOptions,
    Client,
};
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt};

use crate::cli::StreamConfig;
use crate::error::MongoStreamError;
use crate::format::{DisplayOptions, EventPrinter};

/// A connection to one collection whose changes are streamed.
///
/// The client is released by [`MongoStream::run`] whatever the outcome.
pub struct MongoStream {
    /// The connected client
    client: Client,
    /// Name of the watched database
    database: String,
    /// Name of the watched collection
    collection: String,
}

impl MongoStream {
    /// Connects to the deployment and checks that it answers.
    ///
    /// # Arguments
    ///
    /// * `url` - The connection string.
    /// * `database` - The database holding the collection.
    /// * `collection` - The collection to watch.
    ///
    /// # Returns
    ///
    /// A `MongoStream` ready to open the change stream, or a
    /// `ConnectionFailure` when the deployment cannot be reached.
    pub async fn connect(
        url: &str,
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Result<Self, MongoStreamError> {
        let client = Client::with_uri_str(url)
            .await
            .map_err(MongoStreamError::ConnectionFailure)?;

        if let Err(e) = client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
        {
            client.shutdown().await;
            return Err(MongoStreamError::ConnectionFailure(e));
        }

        Ok(Self {
            client,
            database: database.into(),
            collection: collection.into(),
        })
    }

    /// Validates the start options and connects, in that order, so that
    /// configuration errors never reach the network.
    pub async fn open(config: &StreamConfig) -> Result<(Self, ChangeStreamOptions), MongoStreamError> {
        let options = config.start.to_stream_options()?;
        let stream = Self::connect(&config.url, &config.database, &config.collection).await?;
        Ok((stream, options))
    }

    /// Opens the change stream as raw event documents.
    pub async fn watch(
        &self,
        pipeline: Vec<Document>,
        options: ChangeStreamOptions,
    ) -> Result<ChangeStream<Document>, MongoStreamError> {
        let stream = self
            .client
            .database(&self.database)
            .collection::<Document>(&self.collection)
            .watch(pipeline, options)
            .await?;

        Ok(stream.with_type::<Document>())
    }

    /// Streams events to `out` until the limit, the end of the stream, an
    /// error, or a close signal, then shuts the client down.
    ///
    /// # Returns
    ///
    /// The number of events written.
    pub async fn run<W: Write>(
        self,
        pipeline: Vec<Document>,
        options: ChangeStreamOptions,
        display: DisplayOptions,
        out: &mut W,
        close: &mut mpsc::Receiver<()>,
    ) -> Result<u64, MongoStreamError> {
        let result = self.stream_to(pipeline, options, display, out, close).await;
        self.client.shutdown().await;
        result
    }

    async fn stream_to<W: Write>(
        &self,
        pipeline: Vec<Document>,
        options: ChangeStreamOptions,
        display: DisplayOptions,
        out: &mut W,
        close: &mut mpsc::Receiver<()>,
    ) -> Result<u64, MongoStreamError> {
        let stream = self.watch(pipeline, options).await?;
        info!(
            "Watching collection '{}.{}'",
            self.database, self.collection
        );

        let events = stream.map(|next| next.map_err(MongoStreamError::from));
        let emitted = consume(events, EventPrinter::new(display), display.limit, out, close).await?;

        info!(
            "Stream for collection '{}.{}' stopped after {} events",
            self.database, self.collection, emitted
        );
        Ok(emitted)
    }
}

/// Writes events to `out` in arrival order.
///
/// Stops when `limit` events were written (`None` or `0` is unlimited), when
/// the stream ends, or when a close signal arrives. The close signal is
/// checked before each event, so nothing is written once it is received. The
/// first error ends the loop and is returned.
///
/// # Returns
///
/// The number of events written.
pub async fn consume<S, W>(
    events: S,
    printer: EventPrinter,
    limit: Option<u64>,
    out: &mut W,
    close: &mut mpsc::Receiver<()>,
) -> Result<u64, MongoStreamError>
where
    S: Stream<Item = Result<Document, MongoStreamError>>,
    W: Write,
{
    tokio::pin!(events);
    let limit = limit.filter(|&n| n > 0);
    let mut emitted = 0u64;

    loop {
        tokio::select! {
            biased;

            Some(()) = close.recv() => {
                info!("Close signal received, stopping the stream");
                break;
            }
            next_event = events.next() => {
                match next_event {
                    Some(Ok(raw)) => {
                        let text = printer.render(&raw)?;
                        out.write_all(text.as_bytes())?;
                        out.flush()?;
                        emitted += 1;
                        debug!(
                            "Emitted {} event #{}",
                            raw.get_str("operationType").unwrap_or("unknown"),
                            emitted
                        );

                        if limit.is_some_and(|n| emitted >= n) {
                            info!("Limit of {} events reached", emitted);
                            break;
                        }
                    }
                    Some(Err(e)) => return Err(e),
                    None => {
                        info!("Change stream has ended");
                        break;
                    }
                }
            }
        }
    }

    Ok(emitted)
}
