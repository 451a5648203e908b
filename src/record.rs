//! Structured search records and the parser producing them.
//!
//! A matching line has the form `[<time>] <message>`. The channel and date of
//! a record come from the file it was found in, never from the line, so
//! messages containing colons or brackets cannot confuse the parser.

use crate::error::{ChanlogError, Result};
use crate::search::RawMatch;
use log::debug;
use std::fmt;
use std::str::FromStr;

/// One parsed search result. All fields are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchRecord {
    channel: String,
    date: String,
    time: String,
    message: String,
}

impl SearchRecord {
    /// Build a record, rejecting empty fields.
    pub fn new(
        channel: impl Into<String>,
        date: impl Into<String>,
        time: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Self> {
        let record = Self {
            channel: channel.into(),
            date: date.into(),
            time: time.into(),
            message: message.into(),
        };
        if record.channel.is_empty()
            || record.date.is_empty()
            || record.time.is_empty()
            || record.message.is_empty()
        {
            return Err(ChanlogError::malformed(record.to_string()));
        }
        Ok(record)
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn time(&self) -> &str {
        &self.time
    }

    /// Message text exactly as logged, control characters included.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Display form: `{channel} [{date} {time}]: {message}`
impl fmt::Display for SearchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} {}]: {}",
            self.channel, self.date, self.time, self.message
        )
    }
}

/// Parses the display form back into a record.
impl FromStr for SearchRecord {
    type Err = ChanlogError;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || ChanlogError::malformed(s);
        let (channel, rest) = s.split_once(" [").ok_or_else(malformed)?;
        let (date, rest) = rest.split_once(' ').ok_or_else(malformed)?;
        let (time, message) = rest.split_once("]: ").ok_or_else(malformed)?;
        Self::new(channel, date, time, message)
    }
}

/// Turns raw matches into records, counting the lines it had to drop.
#[derive(Debug, Default)]
pub struct RecordParser {
    skipped: usize,
}

impl RecordParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one match.
    ///
    /// # Errors
    /// * `MalformedLine` if the line lacks the `[<time>] ` prefix or a field
    ///   would be empty
    pub fn parse(&self, raw: &RawMatch) -> Result<SearchRecord> {
        let malformed = || ChanlogError::malformed(raw.line.as_str());
        let rest = raw.line.strip_prefix('[').ok_or_else(malformed)?;
        let (time, rest) = rest.split_once(']').ok_or_else(malformed)?;
        let message = rest.strip_prefix(' ').ok_or_else(malformed)?;

        SearchRecord::new(
            raw.file.name.as_str(),
            raw.file.date.as_str(),
            time,
            message,
        )
        .map_err(|_| malformed())
    }

    /// Parse every match, silently dropping malformed lines.
    pub fn parse_all<'a, I>(&mut self, raws: I) -> Vec<SearchRecord>
    where
        I: IntoIterator<Item = &'a RawMatch>,
    {
        let mut records = Vec::new();
        for raw in raws {
            match self.parse(raw) {
                Ok(record) => records.push(record),
                Err(err) => {
                    debug!("{err} in {}", raw.file.path.display());
                    self.skipped += 1;
                }
            }
        }
        records
    }

    /// Lines dropped by [`RecordParser::parse_all`] so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
