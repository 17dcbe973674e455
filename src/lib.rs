/// # MongoDB Change Stream Printer
///
/// This crate opens a change stream on one MongoDB collection and writes each
/// event to standard output, either as a raw JSON line or as a table row.
///
/// ## Features
///
/// - Start from now, from a UTC timestamp, or after a resume token
/// - One server-side pipeline stage given as a JSON object
/// - Table output with optional event id column and document truncation
/// - Stop after a number of events, on stream end, or on Ctrl-C
///
/// ## Example
///
/// ```rust,ignore
/// use rs_mongo_watch::{MongoStream, StreamConfig};
/// use tokio::sync::mpsc;
///
/// async fn example(config: StreamConfig) -> Result<u64, rs_mongo_watch::MongoStreamError> {
///     // Validate the start options and connect
///     let (stream, options) = MongoStream::open(&config).await?;
///
///     // Never fired here; the binary feeds it from Ctrl-C
///     let (_close_tx, mut close_rx) = mpsc::channel(1);
///
///     // Print events until the limit or the end of the stream
///     stream
///         .run(config.pipeline, options, config.display, &mut std::io::stdout(), &mut close_rx)
///         .await
/// }
/// ```
pub mod cli;
mod error;
mod event;
mod format;
mod options;
mod stream;

pub use cli::StreamConfig;
pub use error::MongoStreamError;
pub use event::{ChangeEvent, EventValue, Namespace};
pub use format::{
    document_display, format_row, DisplayOptions, EventPrinter, OutputFormat, MAX_DOCUMENT_CHARS,
    TRUNCATION_MARKER,
};
pub use options::{parse_pipeline, parse_start_at, validate_start_condition, StartCondition};
pub use stream::{consume, MongoStream};
