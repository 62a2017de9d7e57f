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

use crate::{
    fetch::{FetchError, Fetcher},
    fingerprint::{ContentFingerprinter, Fingerprint, Fingerprinter, Namespace},
    histogram::ColorHistogram,
    ledger::DedupLedger,
    record::{OutputRecord, RecordSink, WriteError},
    top_colors::select_top3,
};
use image::{DynamicImage, ImageFormat, ImageResult};
use std::{
    convert::Infallible,
    fmt,
    io::Read,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// What became of a single input URL.
#[derive(Debug)]
pub enum ItemOutcome {
    /// The content was new in its namespace and produced a record.
    Emitted(OutputRecord),
    /// The content had already been seen in its namespace. No record is produced.
    Suppressed {
        namespace: Namespace,
        fingerprint: Fingerprint,
    },
    /// The content could not be retrieved. No record is produced.
    FetchFailed(FetchError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FailedFetch {
    pub url: String,
    pub error: String,
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunSummary {
    pub processed: usize,
    pub emitted_decodable: usize,
    pub emitted_opaque: usize,
    pub suppressed_decodable: usize,
    pub suppressed_opaque: usize,
    pub fetch_failures: Vec<FailedFetch>,
    pub input_errors: usize,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn emitted(&self) -> usize {
        self.emitted_decodable + self.emitted_opaque
    }

    pub fn suppressed(&self) -> usize {
        self.suppressed_decodable + self.suppressed_opaque
    }

    fn record(&mut self, url: &str, outcome: &ItemOutcome) {
        self.processed += 1;

        match outcome {
            ItemOutcome::Emitted(OutputRecord::Decodable { .. }) => self.emitted_decodable += 1,
            ItemOutcome::Emitted(OutputRecord::Opaque { .. }) => self.emitted_opaque += 1,
            ItemOutcome::Suppressed {
                namespace: Namespace::Decodable,
                ..
            } => self.suppressed_decodable += 1,
            ItemOutcome::Suppressed {
                namespace: Namespace::Opaque,
                ..
            } => self.suppressed_opaque += 1,
            ItemOutcome::FetchFailed(err) => self.fetch_failures.push(FailedFetch {
                url: url.to_owned(),
                error: err.to_string(),
            }),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to write record for {url}: {source}")]
    Write {
        url: String,
        #[source]
        source: WriteError,
        summary: Box<RunSummary>,
    },
    #[error("failed to flush output: {source}")]
    Flush {
        #[source]
        source: WriteError,
        summary: Box<RunSummary>,
    },
}

impl PipelineError {
    /// Counters gathered up to the failure.
    pub fn summary(&self) -> &RunSummary {
        match self {
            PipelineError::Write { summary, .. } | PipelineError::Flush { summary, .. } => summary,
        }
    }
}

/// Fetches, deduplicates and analyzes URLs one at a time.
///
/// Each pipeline owns its [`DedupLedger`], so content is deduplicated within one pipeline and never across two.
pub struct Pipeline<F, P = ContentFingerprinter> {
    fetcher: F,
    fingerprinter: P,
    ledger: DedupLedger,
    image_format: Option<ImageFormat>,
    cancel_flag: Option<Arc<AtomicBool>>,
}

pub struct PipelineBuilder<F, P = ContentFingerprinter> {
    fetcher: F,
    fingerprinter: P,
    image_format: Option<ImageFormat>,
    cancel_flag: Option<Arc<AtomicBool>>,
}

impl<F> Pipeline<F>
where
    F: Fetcher,
{
    pub fn new(fetcher: F) -> Self {
        PipelineBuilder::new(fetcher).build()
    }

    pub fn builder(fetcher: F) -> PipelineBuilder<F> {
        PipelineBuilder::new(fetcher)
    }
}

impl<F, P> Pipeline<F, P>
where
    F: Fetcher,
    P: Fingerprinter,
{
    pub fn ledger(&self) -> &DedupLedger {
        &self.ledger
    }

    /// Process every input row in order, appending each emitted record to the sink.
    ///
    /// Per-item failures are counted in the returned summary and never stop the run. Unreadable rows are skipped. A
    /// sink failure stops the run immediately.
    pub fn run<I, E, S>(&mut self, rows: I, sink: &mut S) -> Result<RunSummary, PipelineError>
    where
        I: IntoIterator<Item = Result<String, E>>,
        E: fmt::Display,
        S: RecordSink + ?Sized,
    {
        let mut summary = RunSummary::default();

        for row in rows {
            if self.is_cancelled() {
                info!("run cancelled, stopping before the next item");
                summary.cancelled = true;
                break;
            }

            let url = match row {
                Ok(url) => url,
                Err(err) => {
                    warn!(%err, "skipping unreadable input row");
                    summary.input_errors += 1;
                    continue;
                }
            };

            let outcome = self.process(&url);
            summary.record(&url, &outcome);

            if let ItemOutcome::Emitted(record) = &outcome {
                if let Err(source) = sink.append(record) {
                    return Err(PipelineError::Write {
                        url,
                        source,
                        summary: Box::new(summary),
                    });
                }
            }
        }

        if let Err(source) = sink.flush() {
            return Err(PipelineError::Flush {
                source,
                summary: Box::new(summary),
            });
        }

        info!(
            processed = summary.processed,
            emitted = summary.emitted(),
            suppressed = summary.suppressed(),
            fetch_failures = summary.fetch_failures.len(),
            input_errors = summary.input_errors,
            "run finished"
        );

        Ok(summary)
    }

    /// [`Pipeline::run`] over plain URLs.
    pub fn run_urls<I, S>(&mut self, urls: I, sink: &mut S) -> Result<RunSummary, PipelineError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
        S: RecordSink + ?Sized,
    {
        self.run(urls.into_iter().map(|url| Ok::<_, Infallible>(url.into())), sink)
    }

    /// Run one URL through fetch, classification, deduplication and color extraction.
    pub fn process(&mut self, url: &str) -> ItemOutcome {
        let content = match self.fetch_content(url) {
            Ok(content) => content,
            Err(err) => {
                warn!(url, %err, "failed to fetch content");
                return ItemOutcome::FetchFailed(err);
            }
        };

        match self.decode(&content) {
            Ok(image) => self.process_decodable(url, &image),
            Err(err) => {
                debug!(url, %err, "content is not a decodable image");
                self.process_opaque(url, &content)
            }
        }
    }

    fn fetch_content(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        // the stream lives only within this call
        let mut stream = self.fetcher.fetch(url)?;
        let mut content = Vec::new();
        stream.read_to_end(&mut content)?;

        Ok(content)
    }

    fn decode(&self, content: &[u8]) -> ImageResult<DynamicImage> {
        match self.image_format {
            Some(format) => image::load_from_memory_with_format(content, format),
            None => image::load_from_memory(content),
        }
    }

    fn process_decodable(&mut self, url: &str, image: &DynamicImage) -> ItemOutcome {
        let fingerprint = self.fingerprinter.fingerprint_decodable(image);

        if !self.ledger.check_and_mark(Namespace::Decodable, fingerprint) {
            debug!(url, %fingerprint, "image already seen");
            return ItemOutcome::Suppressed {
                namespace: Namespace::Decodable,
                fingerprint,
            };
        }

        let swatches = select_top3(ColorHistogram::build(image));
        debug!(url, %fingerprint, colors = swatches.len(), "new image");

        ItemOutcome::Emitted(OutputRecord::decodable(url, &swatches))
    }

    fn process_opaque(&mut self, url: &str, mut content: &[u8]) -> ItemOutcome {
        let fingerprint = self.fingerprinter.fingerprint_opaque(&mut content);

        if !self.ledger.check_and_mark(Namespace::Opaque, fingerprint) {
            debug!(url, %fingerprint, "opaque content already seen");
            return ItemOutcome::Suppressed {
                namespace: Namespace::Opaque,
                fingerprint,
            };
        }

        debug!(url, %fingerprint, "new opaque content");
        ItemOutcome::Emitted(OutputRecord::opaque(url))
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }
}

impl<F> PipelineBuilder<F>
where
    F: Fetcher,
{
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            fingerprinter: ContentFingerprinter::new(),
            image_format: None,
            cancel_flag: None,
        }
    }
}

impl<F, P> PipelineBuilder<F, P>
where
    F: Fetcher,
    P: Fingerprinter,
{
    pub fn fingerprinter<Q>(self, fingerprinter: Q) -> PipelineBuilder<F, Q>
    where
        Q: Fingerprinter,
    {
        PipelineBuilder {
            fetcher: self.fetcher,
            fingerprinter,
            image_format: self.image_format,
            cancel_flag: self.cancel_flag,
        }
    }

    /// Only treat content as an image if it decodes in this format. By default the format is guessed from the content.
    pub fn image_format(self, format: ImageFormat) -> Self {
        Self {
            image_format: Some(format),
            ..self
        }
    }

    pub fn any_image_format(self) -> Self {
        Self {
            image_format: None,
            ..self
        }
    }

    /// Stop the run before the next item once the flag is set.
    pub fn cancel_flag(self, flag: Arc<AtomicBool>) -> Self {
        Self {
            cancel_flag: Some(flag),
            ..self
        }
    }

    pub fn build(self) -> Pipeline<F, P> {
        Pipeline {
            fetcher: self.fetcher,
            fingerprinter: self.fingerprinter,
            ledger: DedupLedger::new(),
            image_format: self.image_format,
            cancel_flag: self.cancel_flag,
        }
    }
}
