//! Rendering of change events for standard output.

use clap::ValueEnum;
use comfy_table::{presets::ASCII_FULL, Table};
use mongodb::bson::{Bson, Document};

use crate::error::MongoStreamError;
use crate::event::{extjson, ChangeEvent};

/// Longest document text shown in table mode unless `--show-full-document` is set.
pub const MAX_DOCUMENT_CHARS: usize = 100;

/// Appended to a document cut at [`MAX_DOCUMENT_CHARS`].
pub const TRUNCATION_MARKER: &str = "...";

/// How each event is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// The raw event as one line of relaxed Extended JSON.
    #[default]
    Json,
    /// One bordered row per event.
    Table,
}

/// Display settings derived from the command line, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayOptions {
    pub output: OutputFormat,
    /// Table mode: prepend the event id column.
    pub include_event_id: bool,
    /// Table mode: never truncate the full document.
    pub show_full_document: bool,
    /// Stop after this many events. `None` is unlimited.
    pub limit: Option<u64>,
}

/// Shortens a document's text for display.
///
/// Text longer than [`MAX_DOCUMENT_CHARS`] characters is cut and marked with
/// [`TRUNCATION_MARKER`] unless `show_full` is set.
pub fn document_display(text: String, show_full: bool) -> String {
    if show_full || text.chars().count() <= MAX_DOCUMENT_CHARS {
        return text;
    }

    let mut shown: String = text.chars().take(MAX_DOCUMENT_CHARS).collect();
    shown.push_str(TRUNCATION_MARKER);
    shown
}

/// Builds the table columns for one event.
///
/// Columns are `[event id], wall clock time, operation type, document key,
/// full document`; the event id is only there when `include_event_id` is set.
pub fn format_row(event: &ChangeEvent, include_event_id: bool, show_full_document: bool) -> Vec<String> {
    let mut row = Vec::with_capacity(5);
    if include_event_id {
        row.push(event.id_display());
    }
    row.push(event.wall_clock_display());
    row.push(event.operation_type.clone());
    row.push(event.document_key_display());
    row.push(document_display(event.full_document_text(), show_full_document));
    row
}

/// Turns raw change stream documents into output text.
#[derive(Debug, Clone, Copy)]
pub struct EventPrinter {
    options: DisplayOptions,
}

impl EventPrinter {
    pub fn new(options: DisplayOptions) -> Self {
        Self { options }
    }

    /// Renders one event, including the trailing newline.
    ///
    /// JSON mode passes the event through untouched. Table mode decodes it
    /// first, so a malformed event fails here.
    pub fn render(&self, raw: &Document) -> Result<String, MongoStreamError> {
        match self.options.output {
            OutputFormat::Json => Ok(format!("{}\n", extjson(Bson::Document(raw.clone())))),
            OutputFormat::Table => {
                let event = ChangeEvent::from_document(raw.clone())?;
                let row = format_row(
                    &event,
                    self.options.include_event_id,
                    self.options.show_full_document,
                );

                let mut table = Table::new();
                table.load_preset(ASCII_FULL);
                table.add_row(row);
                Ok(format!("{table}\n"))
            }
        }
    }
}
