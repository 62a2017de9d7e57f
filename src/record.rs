// Copyright 2022 Spanfile
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::{color_key::ColorKey, swatch::Swatch};
use std::io::{self, Read, Write};
use thiserror::Error;

/// One row of output, emitted at most once per distinct piece of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputRecord {
    /// Content that did not decode as an image.
    Opaque { url: String },
    /// A decoded image and its most frequent colors, most frequent first. Holds fewer than three colors only when the
    /// image has fewer distinct colors.
    Decodable { url: String, colors: Vec<ColorKey> },
}

impl OutputRecord {
    pub fn opaque(url: impl Into<String>) -> OutputRecord {
        OutputRecord::Opaque { url: url.into() }
    }

    pub fn decodable(url: impl Into<String>, swatches: &[Swatch]) -> OutputRecord {
        OutputRecord::Decodable {
            url: url.into(),
            colors: swatches.iter().map(|swatch| swatch.key()).collect(),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            OutputRecord::Opaque { url } | OutputRecord::Decodable { url, .. } => url,
        }
    }

    /// The row's fields: the URL followed by either the invalid format reason or one `r g b` field per color.
    pub fn fields(&self) -> Vec<String> {
        match self {
            OutputRecord::Opaque { url } => vec![url.clone(), format!("{url} has an invalid file format")],
            OutputRecord::Decodable { url, colors } => std::iter::once(url.clone())
                .chain(colors.iter().map(ColorKey::to_string))
                .collect(),
        }
    }
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to write record: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush records: {0}")]
    Io(#[from] io::Error),
}

/// A trait used to append output rows in order.
pub trait RecordSink {
    fn append(&mut self, record: &OutputRecord) -> Result<(), WriteError>;

    fn flush(&mut self) -> Result<(), WriteError> {
        Ok(())
    }
}

impl RecordSink for Vec<OutputRecord> {
    fn append(&mut self, record: &OutputRecord) -> Result<(), WriteError> {
        self.push(record.clone());
        Ok(())
    }
}

/// Writes records as CSV rows, one per record. Rows have a varying number of fields.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new().has_headers(false).flexible(true).from_writer(writer),
        }
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> Result<W, WriteError> {
        self.writer
            .into_inner()
            .map_err(|err| WriteError::Io(io::Error::new(err.error().kind(), err.error().to_string())))
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn append(&mut self, record: &OutputRecord) -> Result<(), WriteError> {
        self.writer.write_record(record.fields())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), WriteError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Read input rows, yielding the first field of each as a URL. There is no header row; blank rows are skipped.
pub fn read_urls<R: Read>(reader: R) -> impl Iterator<Item = Result<String, csv::Error>> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
        .into_records()
        .filter_map(|record| match record {
            Ok(record) => record.get(0).filter(|url| !url.is_empty()).map(|url| Ok(url.to_owned())),
            Err(err) => Some(Err(err)),
        })
}
