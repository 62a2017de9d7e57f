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

use prevalence::image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageBuffer, ImageOutputFormat, Rgb, Rgba};
use prevalence::{
    ColorKey, CsvSink, FetchError, Fetcher, Fingerprint, Fingerprinter, ItemOutcome, Namespace, OutputRecord,
    Pipeline,
};
use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Serves fixed bodies and counts how many streams were opened and dropped.
#[derive(Default)]
struct StubFetcher {
    bodies: HashMap<String, Vec<u8>>,
    broken: Vec<String>,
    opened: Arc<AtomicUsize>,
    dropped: Arc<AtomicUsize>,
}

impl StubFetcher {
    fn with(mut self, url: &str, body: Vec<u8>) -> Self {
        self.bodies.insert(url.to_owned(), body);
        self
    }

    fn with_broken_body(mut self, url: &str) -> Self {
        self.broken.push(url.to_owned());
        self
    }
}

struct TrackedStream {
    inner: Cursor<Vec<u8>>,
    fail_after_data: bool,
    dropped: Arc<AtomicUsize>,
}

impl Read for TrackedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        if read == 0 && self.fail_after_data {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"));
        }
        Ok(read)
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

impl Fetcher for StubFetcher {
    fn fetch(&self, url: &str) -> Result<Box<dyn Read>, FetchError> {
        let broken = self.broken.iter().any(|b| b == url);
        let body = match self.bodies.get(url) {
            Some(body) => body.clone(),
            None if broken => b"half a bo".to_vec(),
            None => return Err(FetchError::Other(format!("unknown host for {url}"))),
        };

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(TrackedStream {
            inner: Cursor::new(body),
            fail_after_data: broken,
            dropped: Arc::clone(&self.dropped),
        }))
    }
}

/// Three vertical bands on 16 pixel boundaries: red 48 columns, green 32, blue 16.
fn banded_image() -> ImageBuffer<Rgb<u8>, Vec<u8>> {
    ImageBuffer::from_fn(96, 16, |x, _| match x {
        0..=47 => Rgb([248, 8, 8]),
        48..=79 => Rgb([8, 248, 8]),
        _ => Rgb([8, 8, 248]),
    })
}

fn jpeg_bytes(image: &ImageBuffer<Rgb<u8>, Vec<u8>>) -> Vec<u8> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, 100)
        .encode_image(image)
        .expect("encode jpeg");
    bytes
}

/// Same JPEG with a comment segment inserted right after the start-of-image marker.
fn jpeg_with_comment(jpeg: &[u8], comment: &[u8]) -> Vec<u8> {
    assert_eq!(&jpeg[..2], &[0xff, 0xd8]);
    let length = (comment.len() + 2) as u16;

    let mut bytes = jpeg[..2].to_vec();
    bytes.extend_from_slice(&[0xff, 0xfe]);
    bytes.extend_from_slice(&length.to_be_bytes());
    bytes.extend_from_slice(comment);
    bytes.extend_from_slice(&jpeg[2..]);
    bytes
}

fn png_bytes(image: DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .expect("encode png");
    bytes
}

fn key(r: u8, g: u8, b: u8) -> ColorKey {
    ColorKey::new((r, g, b))
}

#[test]
fn pixel_identical_jpegs_and_text_yield_two_rows_in_order() {
    let jpeg = jpeg_bytes(&banded_image());
    let variant = jpeg_with_comment(&jpeg, b"re-saved by another tool");
    assert_ne!(jpeg, variant);

    let fetcher = StubFetcher::default()
        .with("http://a/img1.jpg", jpeg)
        .with("http://a/img1-bytewise-different-but-pixel-same.jpg", variant)
        .with("http://b/notanimage.txt", b"just some text\n".to_vec());
    let mut pipeline = Pipeline::new(fetcher);
    let mut records = Vec::new();

    let summary = pipeline
        .run_urls(
            [
                "http://a/img1.jpg",
                "http://a/img1-bytewise-different-but-pixel-same.jpg",
                "http://b/notanimage.txt",
            ],
            &mut records,
        )
        .unwrap();

    assert_eq!(records.len(), 2);
    match &records[0] {
        OutputRecord::Decodable { url, colors } => {
            assert_eq!(url, "http://a/img1.jpg");
            assert_eq!(colors.len(), 3);
            assert_eq!(colors[0], key(15, 0, 0));
        }
        other => panic!("expected a decodable record, got {other:?}"),
    }
    assert_eq!(records[1], OutputRecord::opaque("http://b/notanimage.txt"));

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.emitted_decodable, 1);
    assert_eq!(summary.emitted_opaque, 1);
    assert_eq!(summary.suppressed_decodable, 1);
    assert!(summary.fetch_failures.is_empty());
}

#[test]
fn lossless_image_reports_exact_top_colors() {
    let fetcher = StubFetcher::default().with("http://a/bands.png", png_bytes(DynamicImage::ImageRgb8(banded_image())));
    let mut pipeline = Pipeline::new(fetcher);
    let mut sink = CsvSink::new(Vec::new());

    pipeline.run_urls(["http://a/bands.png"], &mut sink).unwrap();

    let output = String::from_utf8(sink.into_inner().unwrap()).unwrap();
    assert_eq!(output, "http://a/bands.png,15 0 0,0 15 0,0 0 15\n");
}

#[test]
fn same_url_twice_emits_once() {
    let fetcher = StubFetcher::default().with("http://a/x.png", png_bytes(DynamicImage::ImageRgb8(banded_image())));
    let mut pipeline = Pipeline::new(fetcher);
    let mut records = Vec::new();

    let summary = pipeline
        .run_urls(["http://a/x.png", "http://a/x.png"], &mut records)
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(summary.suppressed_decodable, 1);
}

#[test]
fn different_urls_with_identical_bytes_emit_once() {
    let fetcher = StubFetcher::default()
        .with("http://a/readme", b"not an image".to_vec())
        .with("http://mirror/readme", b"not an image".to_vec());
    let mut pipeline = Pipeline::new(fetcher);
    let mut records = Vec::new();

    pipeline
        .run_urls(["http://a/readme", "http://mirror/readme"], &mut records)
        .unwrap();

    assert_eq!(records, vec![OutputRecord::opaque("http://a/readme")]);
}

#[test]
fn monochrome_image_reports_a_single_color() {
    let image = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(4, 4, Rgba([136, 136, 136, 10])));
    let fetcher = StubFetcher::default().with("http://a/grey.png", png_bytes(image));
    let mut pipeline = Pipeline::new(fetcher);
    let mut records = Vec::new();

    pipeline.run_urls(["http://a/grey.png"], &mut records).unwrap();

    assert_eq!(
        records,
        vec![OutputRecord::Decodable {
            url: "http://a/grey.png".to_owned(),
            colors: vec![key(8, 8, 8)],
        }]
    );
}

/// Maps every piece of content to the same fingerprint.
struct CollidingFingerprinter;

impl Fingerprinter for CollidingFingerprinter {
    fn fingerprint_decodable(&self, _: &DynamicImage) -> Fingerprint {
        Fingerprint::from_raw(7)
    }

    fn fingerprint_opaque(&self, content: &mut dyn Read) -> Fingerprint {
        io::copy(content, &mut io::sink()).unwrap();
        Fingerprint::from_raw(7)
    }
}

#[test]
fn colliding_fingerprints_in_different_namespaces_both_emit() {
    let fetcher = StubFetcher::default()
        .with("http://a/img.png", png_bytes(DynamicImage::ImageRgb8(banded_image())))
        .with("http://a/page.html", b"<html></html>".to_vec())
        .with("http://a/other.html", b"<html>other</html>".to_vec());
    let mut pipeline = Pipeline::builder(fetcher).fingerprinter(CollidingFingerprinter).build();
    let mut records = Vec::new();

    let summary = pipeline
        .run_urls(["http://a/img.png", "http://a/page.html", "http://a/other.html"], &mut records)
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[1], OutputRecord::opaque("http://a/page.html"));
    assert_eq!(summary.emitted_decodable, 1);
    assert_eq!(summary.emitted_opaque, 1);
    assert_eq!(summary.suppressed_opaque, 1);
    assert!(pipeline.ledger().seen_decodable(Fingerprint::from_raw(7)));
    assert!(pipeline.ledger().seen_opaque(Fingerprint::from_raw(7)));
}

#[test]
fn fetch_failures_are_skipped_and_reported() {
    let fetcher = StubFetcher::default()
        .with("http://a/ok.txt", b"fine".to_vec())
        .with_broken_body("http://a/cut-off.jpg");
    let mut pipeline = Pipeline::new(fetcher);
    let mut records = Vec::new();

    let summary = pipeline
        .run_urls(["http://nowhere/x.jpg", "http://a/cut-off.jpg", "http://a/ok.txt"], &mut records)
        .unwrap();

    assert_eq!(records, vec![OutputRecord::opaque("http://a/ok.txt")]);
    let failed: Vec<_> = summary.fetch_failures.iter().map(|f| f.url.as_str()).collect();
    assert_eq!(failed, vec!["http://nowhere/x.jpg", "http://a/cut-off.jpg"]);
    assert!(summary.fetch_failures[1].error.contains("connection reset"));
}

#[test]
fn every_opened_stream_is_dropped_once() {
    let jpeg = jpeg_bytes(&banded_image());
    let fetcher = StubFetcher::default()
        .with("http://a/1.jpg", jpeg.clone())
        .with("http://a/2.jpg", jpeg)
        .with("http://a/t.txt", b"text".to_vec())
        .with("http://a/u.txt", b"text".to_vec())
        .with_broken_body("http://a/broken");
    let opened = Arc::clone(&fetcher.opened);
    let dropped = Arc::clone(&fetcher.dropped);
    let mut pipeline = Pipeline::new(fetcher);

    let outcomes: Vec<_> = ["http://a/1.jpg", "http://a/2.jpg", "http://a/t.txt", "http://a/u.txt", "http://a/broken"]
        .into_iter()
        .map(|url| pipeline.process(url))
        .collect();

    assert!(matches!(outcomes[0], ItemOutcome::Emitted(_)));
    assert!(matches!(
        outcomes[1],
        ItemOutcome::Suppressed {
            namespace: Namespace::Decodable,
            ..
        }
    ));
    assert!(matches!(outcomes[2], ItemOutcome::Emitted(_)));
    assert!(matches!(
        outcomes[3],
        ItemOutcome::Suppressed {
            namespace: Namespace::Opaque,
            ..
        }
    ));
    assert!(matches!(outcomes[4], ItemOutcome::FetchFailed(FetchError::Body(_))));
    assert_eq!(opened.load(Ordering::SeqCst), 5);
    assert_eq!(dropped.load(Ordering::SeqCst), 5);
}

/// Raises the cancel flag as soon as the first stream is opened.
struct CancellingFetcher {
    flag: Arc<AtomicBool>,
}

impl Fetcher for CancellingFetcher {
    fn fetch(&self, url: &str) -> Result<Box<dyn Read>, FetchError> {
        self.flag.store(true, Ordering::SeqCst);
        Ok(Box::new(Cursor::new(url.as_bytes().to_vec())))
    }
}

#[test]
fn cancellation_stops_between_items() {
    let flag = Arc::new(AtomicBool::new(false));
    let mut pipeline = Pipeline::builder(CancellingFetcher { flag: Arc::clone(&flag) })
        .cancel_flag(flag)
        .build();
    let mut records = Vec::new();

    let summary = pipeline
        .run_urls(["http://a/1", "http://a/2", "http://a/3"], &mut records)
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.processed, 1);
    assert_eq!(records, vec![OutputRecord::opaque("http://a/1")]);
}

#[test]
fn jpeg_only_pipeline_treats_png_as_opaque() {
    let fetcher = StubFetcher::default().with("http://a/x.png", png_bytes(DynamicImage::ImageRgb8(banded_image())));
    let mut pipeline = Pipeline::builder(fetcher)
        .image_format(prevalence::image::ImageFormat::Jpeg)
        .build();
    let mut records = Vec::new();

    pipeline.run_urls(["http://a/x.png"], &mut records).unwrap();

    assert_eq!(records, vec![OutputRecord::opaque("http://a/x.png")]);
}

#[test]
fn empty_input_produces_no_rows() {
    let mut pipeline = Pipeline::new(StubFetcher::default());
    let mut sink = CsvSink::new(Vec::new());

    let summary = pipeline.run(prevalence::read_urls(&b""[..]), &mut sink).unwrap();

    assert_eq!(summary.processed, 0);
    assert!(sink.into_inner().unwrap().is_empty());
}
