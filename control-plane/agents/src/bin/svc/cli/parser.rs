//! The array CLI emits two textual shapes: tabular output with a header row
//! (list verbs) and repeated key/value blocks separated by blank lines
//! (detail verbs). Both use a single-character field delimiter, requested
//! per call and conventionally `!`.

use agents::errors::SvcError;
use indexmap::IndexMap;
use std::sync::Arc;

/// A field value inside one record. A key seen more than once within the
/// same block collapses into a list preserving encounter order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FieldValue {
    /// A single value.
    Scalar(String),
    /// All values of a repeated key, in encounter order.
    List(Vec<String>),
}

impl FieldValue {
    fn push(&mut self, value: String) {
        match self {
            Self::Scalar(first) => {
                *self = Self::List(vec![std::mem::take(first), value]);
            }
            Self::List(values) => values.push(value),
        }
    }

    /// The first (or only) value.
    fn first(&self) -> &str {
        match self {
            Self::Scalar(value) => value,
            Self::List(values) => values.first().map(String::as_str).unwrap_or(""),
        }
    }

    /// All values.
    fn all(&self) -> Vec<&str> {
        match self {
            Self::Scalar(value) => vec![value.as_str()],
            Self::List(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

/// One mapping record parsed out of the CLI output. Field order is the
/// order of the header row or of first encounter within the block.
#[derive(Debug, Clone)]
pub(crate) struct CliRecord {
    command: Arc<str>,
    fields: IndexMap<String, FieldValue>,
}

impl CliRecord {
    fn new(command: Arc<str>) -> Self {
        Self {
            command,
            fields: IndexMap::new(),
        }
    }

    fn insert(&mut self, key: &str, value: String) {
        match self.fields.get_mut(key) {
            Some(existing) => existing.push(value),
            None => {
                self.fields.insert(key.to_string(), FieldValue::Scalar(value));
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look up a field, returning a diagnostic error naming the command
    /// when it is absent.
    pub(crate) fn get(&self, field: &str) -> Result<&str, SvcError> {
        self.get_opt(field).ok_or_else(|| SvcError::MissingField {
            command: self.command.to_string(),
            field: field.to_string(),
        })
    }

    /// Look up a field which may legitimately be absent or blank.
    pub(crate) fn get_opt(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .map(FieldValue::first)
            .filter(|value| !value.is_empty())
    }

    /// All values of a (possibly repeated) field.
    pub(crate) fn get_all(&self, field: &str) -> Vec<&str> {
        self.fields.get(field).map(FieldValue::all).unwrap_or_default()
    }

    /// Look up a numeric field.
    pub(crate) fn get_u64(&self, field: &str) -> Result<u64, SvcError> {
        let value = self.get(field)?;
        value.parse().map_err(|_| SvcError::CliParse {
            command: self.command.to_string(),
            reason: format!("field '{field}' is not a number"),
            output: value.to_string(),
        })
    }

    /// Look up a numeric field.
    pub(crate) fn get_u32(&self, field: &str) -> Result<u32, SvcError> {
        Ok(self.get_u64(field)? as u32)
    }

    /// Look up a yes/no or on/off field.
    pub(crate) fn get_bool(&self, field: &str) -> Result<bool, SvcError> {
        Ok(matches!(self.get(field)?, "yes" | "on"))
    }

    /// Parse a field into an enum derived with `strum::EnumString`.
    pub(crate) fn get_enum<T: std::str::FromStr>(&self, field: &str) -> Result<T, SvcError> {
        let value = self.get(field)?;
        value.parse().map_err(|_| SvcError::CliParse {
            command: self.command.to_string(),
            reason: format!("unknown value for field '{field}'"),
            output: value.to_string(),
        })
    }
}

/// The parsed output of one CLI invocation: an ordered sequence of records.
#[derive(Debug, Clone)]
pub(crate) struct CliResponse {
    command: Arc<str>,
    records: Vec<CliRecord>,
}

impl CliResponse {
    /// Parse raw stdout in header or block mode. Empty input yields zero
    /// records, never an error.
    pub(crate) fn parse(
        command: &str,
        stdout: &str,
        delim: char,
        with_header: bool,
    ) -> Result<Self, SvcError> {
        let command: Arc<str> = Arc::from(command);
        let records = if with_header {
            Self::parse_table(&command, stdout, delim)?
        } else {
            Self::parse_blocks(&command, stdout, delim)?
        };
        Ok(Self { command, records })
    }

    /// Header mode: the first non-blank line names the fields; every
    /// subsequent non-blank line is zipped against it. A row whose field
    /// count differs from the header is a hard parse error, guarding
    /// against output-format drift.
    fn parse_table(
        command: &Arc<str>,
        stdout: &str,
        delim: char,
    ) -> Result<Vec<CliRecord>, SvcError> {
        let mut lines = stdout.lines().filter(|line| !line.trim().is_empty());
        let header: Vec<&str> = match lines.next() {
            Some(line) => line.split(delim).collect(),
            None => return Ok(vec![]),
        };
        let mut records = vec![];
        for line in lines {
            let values: Vec<&str> = line.split(delim).collect();
            if values.len() != header.len() {
                return Err(SvcError::CliParse {
                    command: command.to_string(),
                    reason: format!(
                        "row has {} fields but the header has {}",
                        values.len(),
                        header.len()
                    ),
                    output: line.to_string(),
                });
            }
            let mut record = CliRecord::new(command.clone());
            for (key, value) in header.iter().zip(values) {
                record.insert(key, value.to_string());
            }
            records.push(record);
        }
        Ok(records)
    }

    /// Block mode: each line is `key<delim>value`; a blank line closes the
    /// current record. Trailing content without a final blank line still
    /// yields a closed record.
    fn parse_blocks(
        command: &Arc<str>,
        stdout: &str,
        delim: char,
    ) -> Result<Vec<CliRecord>, SvcError> {
        let mut records = vec![];
        let mut current = CliRecord::new(command.clone());
        for line in stdout.lines() {
            if line.trim().is_empty() {
                if !current.is_empty() {
                    records.push(std::mem::replace(&mut current, CliRecord::new(command.clone())));
                }
                continue;
            }
            match line.split_once(delim) {
                Some((key, value)) => current.insert(key, value.to_string()),
                None => {
                    return Err(SvcError::CliParse {
                        command: command.to_string(),
                        reason: "line without a field delimiter".to_string(),
                        output: line.to_string(),
                    })
                }
            }
        }
        if !current.is_empty() {
            records.push(current);
        }
        Ok(records)
    }

    /// The parsed records.
    pub(crate) fn records(&self) -> &[CliRecord] {
        &self.records
    }

    /// Number of records.
    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the output held no records.
    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The record at `index`, when present.
    pub(crate) fn get(&self, index: usize) -> Option<&CliRecord> {
        self.records.get(index)
    }

    /// The first record, as a diagnostic error when the output was empty.
    pub(crate) fn first(&self) -> Result<&CliRecord, SvcError> {
        self.records.first().ok_or_else(|| SvcError::CliParse {
            command: self.command.to_string(),
            reason: "expected at least one record".to_string(),
            output: String::new(),
        })
    }

    /// Pull the named fields positionally across all records without
    /// materialising full mappings.
    pub(crate) fn select<'a>(
        &'a self,
        fields: &'a [&'a str],
    ) -> impl Iterator<Item = Result<Vec<&'a str>, SvcError>> + 'a {
        self.records.iter().map(move |record| {
            fields
                .iter()
                .map(|field| record.get(field))
                .collect::<Result<Vec<_>, _>>()
        })
    }
}
