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

//! A library to deduplicate images fetched from a list of URLs and find their most prevalent colors.
//!
//! Every URL is fetched and decoded. Content that decodes as an image is fingerprinted by its pixels, content that
//! doesn't is fingerprinted by its bytes, and each fingerprint is only reported the first time it is seen. For every
//! new image, the three most frequent colors are reported after quantizing each channel down to four bits.
//!
//! ```no_run
//! use prevalence::{read_urls, CsvSink, HttpFetcher, Pipeline, DEFAULT_FETCH_TIMEOUT};
//! use std::fs::File;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut pipeline = Pipeline::new(HttpFetcher::new(DEFAULT_FETCH_TIMEOUT)?);
//! let mut sink = CsvSink::new(File::create("results.csv")?);
//! let summary = pipeline.run(read_urls(File::open("urls.csv")?), &mut sink)?;
//!
//! println!("{} records written", summary.emitted());
//! # Ok(())
//! # }
//! ```

mod color_key;
mod fetch;
mod fingerprint;
mod histogram;
mod ledger;
mod pipeline;
mod record;
mod swatch;
mod top_colors;

pub use crate::{
    color_key::{ColorKey, QUANTIZE_SHIFT, QUANTIZE_WORD_MAX},
    fetch::{FetchError, Fetcher, HttpFetcher, DEFAULT_FETCH_TIMEOUT},
    fingerprint::{ContentFingerprinter, Fingerprint, Fingerprinter, Namespace},
    histogram::ColorHistogram,
    ledger::DedupLedger,
    pipeline::{FailedFetch, ItemOutcome, Pipeline, PipelineBuilder, PipelineError, RunSummary},
    record::{read_urls, CsvSink, OutputRecord, RecordSink, WriteError},
    swatch::Swatch,
    top_colors::{select_top, select_top3, TOP_COLOR_COUNT},
};
pub use image;
