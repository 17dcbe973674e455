use chrono::{DateTime, Utc};
use clap::Parser;
use mongodb::bson::Document;

use crate::error::MongoStreamError;
use crate::format::{DisplayOptions, OutputFormat};
use crate::options::{parse_pipeline, parse_start_at, validate_start_condition, StartCondition};

/// Immutable configuration used for the whole run
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    pub url: String,
    pub database: String,
    pub collection: String,
    pub start: StartCondition,
    pub pipeline: Vec<Document>,
    pub display: DisplayOptions,
}

/// User-facing CLI arguments
#[derive(Parser, Debug)]
#[command(
    name = "mongo-watch",
    version,
    about = "Print the change stream of a MongoDB collection as json or a table"
)]
pub struct Args {
    /// Database name: dbname
    #[arg(long)]
    pub database: String,

    /// Collection name: mycollection
    #[arg(long)]
    pub collection: String,

    /// Connection string: mongodb://localhost:27017
    #[arg(long)]
    pub url: String,

    /// Start at UTC timestamp: YYYY-MM-DD HH:MM:SS
    #[arg(long, value_name = "TIMESTAMP", value_parser = start_at_parser)]
    pub start_at: Option<DateTime<Utc>>,

    /// Resume after the event identified by this token
    #[arg(long, value_name = "TOKEN")]
    pub resume_token: Option<String>,

    /// Single stage appended to the stream, as a JSON object: '{"$match": {...}}'
    #[arg(long, value_name = "JSON", default_value = "")]
    pub pipeline: String,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::Json)]
    pub output: OutputFormat,

    /// Include the event id column (table output)
    #[arg(long)]
    pub include_event_id: bool,

    /// Do not truncate the full document (table output)
    #[arg(long)]
    pub show_full_document: bool,

    /// Stop after N events (0 means no limit)
    #[arg(long, value_name = "N")]
    pub limit: Option<u64>,
}

fn start_at_parser(value: &str) -> Result<DateTime<Utc>, String> {
    parse_start_at(value).map_err(|e| e.to_string())
}

impl TryFrom<Args> for StreamConfig {
    type Error = MongoStreamError;

    /// Runs every configuration check; nothing here touches the network.
    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let start = validate_start_condition(args.start_at, args.resume_token.as_deref())?;
        let pipeline = parse_pipeline(&args.pipeline)?;

        Ok(StreamConfig {
            url: args.url,
            database: args.database,
            collection: args.collection,
            start,
            pipeline,
            display: DisplayOptions {
                output: args.output,
                include_event_id: args.include_event_id,
                show_full_document: args.show_full_document,
                limit: args.limit.filter(|&n| n > 0),
            },
        })
    }
}

/// Parse CLI options into a validated `StreamConfig`
pub fn parse() -> Result<StreamConfig, MongoStreamError> {
    StreamConfig::try_from(Args::parse())
}
