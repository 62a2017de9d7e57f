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

use anyhow::{Context, Result};
use clap::Parser;
use prevalence::{image::ImageFormat, read_urls, CsvSink, HttpFetcher, Pipeline};
use std::{
    fs::File,
    io::{self, BufReader, BufWriter},
    path::PathBuf,
    time::Duration,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "prevalence",
    about = "Report the three most prevalent colors of every distinct image in a list of URLs"
)]
struct Cli {
    /// CSV file with one image URL per row
    #[arg(long, env = "PREVALENCE_INPUT", default_value = "urls.csv")]
    input: PathBuf,

    /// CSV file the results are written to
    #[arg(long, env = "PREVALENCE_OUTPUT", default_value = "results.csv")]
    output: PathBuf,

    /// Max seconds to wait for each download
    #[arg(
        long,
        env = "PREVALENCE_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout_secs: u64,

    /// Treat only JPEG content as an image
    #[arg(long, env = "PREVALENCE_JPEG_ONLY", default_value_t = false)]
    jpeg_only: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_writer(io::stderr).with_env_filter(filter).with_target(false).init();

    let input = File::open(&cli.input).with_context(|| format!("failed to open {:?}", cli.input))?;
    let output = File::create(&cli.output).with_context(|| format!("failed to create {:?}", cli.output))?;

    let fetcher = HttpFetcher::new(Duration::from_secs(cli.timeout_secs))
        .context("failed to build HTTP client")?;
    let builder = Pipeline::builder(fetcher);
    let mut pipeline = if cli.jpeg_only {
        builder.image_format(ImageFormat::Jpeg).build()
    } else {
        builder.build()
    };

    let mut sink = CsvSink::new(BufWriter::new(output));
    let summary = match pipeline.run(read_urls(BufReader::new(input)), &mut sink) {
        Ok(summary) => summary,
        Err(err) => {
            error!(%err, processed = err.summary().processed, "run aborted");
            return Err(err).with_context(|| format!("failed to write {:?}", cli.output));
        }
    };

    for failure in &summary.fetch_failures {
        warn!(url = %failure.url, error = %failure.error, "skipped");
    }

    info!(
        output = ?cli.output,
        images = summary.emitted_decodable,
        invalid = summary.emitted_opaque,
        duplicates = summary.suppressed(),
        "done"
    );

    Ok(())
}
