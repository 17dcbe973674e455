//! Validation and parsing of the options that shape the change stream.
//!
//! Everything here runs before a connection is made, so configuration mistakes
//! surface without touching the network.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use mongodb::{
    bson::{self, doc, Bson, Document, Timestamp},
    change_stream::event::ResumeToken,
    options::ChangeStreamOptions,
};

use crate::error::MongoStreamError;

/// Layout accepted by `--start-at`, always interpreted as UTC.
pub const START_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Where the change stream begins.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StartCondition {
    /// From the moment the stream is opened.
    #[default]
    Now,
    /// From the given operation time.
    StartAt(DateTime<Utc>),
    /// Right after the event identified by the token.
    ResumeAfter(String),
}

impl StartCondition {
    /// Builds the driver options for this start condition.
    ///
    /// A timestamp maps to the first operation in that second; a token is
    /// wrapped as `{ "_data": token }`, the shape the server issues.
    pub fn to_stream_options(&self) -> Result<ChangeStreamOptions, MongoStreamError> {
        let mut options = ChangeStreamOptions::default();

        match self {
            Self::Now => {}
            Self::StartAt(at) => {
                let time = u32::try_from(at.timestamp()).map_err(|_| {
                    MongoStreamError::InvalidStartAt(format!("{} is out of range", at))
                })?;
                options.start_at_operation_time = Some(Timestamp { time, increment: 1 });
            }
            Self::ResumeAfter(token) => {
                options.resume_after = Some(resume_token(token)?);
            }
        }

        Ok(options)
    }
}

/// Checks that at most one start condition was requested.
///
/// An empty token counts as unset. Both unset means "start from now".
///
/// # Errors
///
/// `ConflictingStartCondition` when both a timestamp and a non-empty token are given.
pub fn validate_start_condition(
    start_at: Option<DateTime<Utc>>,
    resume_token: Option<&str>,
) -> Result<StartCondition, MongoStreamError> {
    let resume_token = resume_token.filter(|token| !token.is_empty());

    match (start_at, resume_token) {
        (Some(_), Some(_)) => Err(MongoStreamError::ConflictingStartCondition),
        (Some(at), None) => Ok(StartCondition::StartAt(at)),
        (None, Some(token)) => Ok(StartCondition::ResumeAfter(token.to_string())),
        (None, None) => Ok(StartCondition::Now),
    }
}

/// Parses a `--start-at` value such as `2025-01-01 00:00:00` as a UTC instant.
pub fn parse_start_at(text: &str) -> Result<DateTime<Utc>, MongoStreamError> {
    NaiveDateTime::parse_from_str(text.trim(), START_AT_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|err| {
            MongoStreamError::InvalidStartAt(format!(
                "'{}' does not match YYYY-MM-DD HH:MM:SS: {}",
                text, err
            ))
        })
}

/// Parses the `--pipeline` flag into the stages appended to the change stream.
///
/// The input is a single JSON object describing one stage, e.g.
/// `{"$match": {"operationType": "insert"}}`. Extended JSON such as
/// `{"$oid": "..."}` is understood and key order is kept. Only one stage can
/// be given per invocation; composing several is out of scope for this tool.
///
/// An empty (or blank) string yields no stages.
///
/// # Errors
///
/// `InvalidPipelineSyntax` when the text is not well-formed JSON or not an object.
pub fn parse_pipeline(text: &str) -> Result<Vec<Document>, MongoStreamError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|err| MongoStreamError::InvalidPipelineSyntax(err.to_string()))?;

    if !value.is_object() {
        return Err(MongoStreamError::InvalidPipelineSyntax(
            "expected a single JSON object describing one stage".to_string(),
        ));
    }

    match Bson::try_from(value) {
        Ok(Bson::Document(stage)) => Ok(vec![stage]),
        Ok(other) => Err(MongoStreamError::InvalidPipelineSyntax(format!(
            "expected a stage document, got {}",
            other
        ))),
        Err(err) => Err(MongoStreamError::InvalidPipelineSyntax(err.to_string())),
    }
}

fn resume_token(token: &str) -> Result<ResumeToken, MongoStreamError> {
    let raw = bson::to_vec(&doc! { "_data": token })
        .map_err(|err| MongoStreamError::InvalidResumeToken(err.to_string()))?;
    bson::from_slice(&raw).map_err(|err| MongoStreamError::InvalidResumeToken(err.to_string()))
}
