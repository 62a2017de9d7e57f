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

use flate2::{write::GzEncoder, Compression};
use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use std::{
    fmt,
    io::{self, Cursor, Read},
};
use tracing::warn;
use xxhash_rust::xxh64::Xxh64;

const HASH_SEED: u64 = 0;

/// Identity digest of a piece of content. Only meaningful for deduplication within one [`Namespace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub const fn from_raw(value: u64) -> Fingerprint {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// The content class a fingerprint was computed for. Fingerprints are never compared across namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Namespace {
    /// Content that decoded as an image.
    Decodable,
    /// Content that did not decode as an image.
    Opaque,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Decodable => f.write_str("decodable"),
            Namespace::Opaque => f.write_str("opaque"),
        }
    }
}

/// A trait used to compute content fingerprints for deduplication.
///
/// Implementations must be deterministic, and must never fail: when canonicalization goes wrong they fall back to a
/// best-effort digest instead of aborting the pipeline.
pub trait Fingerprinter {
    /// Fingerprint a decoded image by its pixels, so that differently encoded but pixel-identical images collide.
    fn fingerprint_decodable(&self, image: &DynamicImage) -> Fingerprint;

    /// Fingerprint content that is not an image. The reader is consumed to its end.
    fn fingerprint_opaque(&self, content: &mut dyn Read) -> Fingerprint;
}

/// The default [`Fingerprinter`].
///
/// Images are converted to 16-bit RGBA and re-encoded as PNG before hashing. Opaque content is gzipped before hashing. Both
/// paths hash with XXH64.
#[derive(Debug, Clone, Copy)]
pub struct ContentFingerprinter {
    compression: Compression,
}

impl ContentFingerprinter {
    pub fn new() -> Self {
        Self {
            compression: Compression::default(),
        }
    }

    pub fn compression(self, compression: Compression) -> Self {
        Self { compression, ..self }
    }
}

impl Default for ContentFingerprinter {
    fn default() -> Self {
        Self::new()
    }
}

impl Fingerprinter for ContentFingerprinter {
    fn fingerprint_decodable(&self, image: &DynamicImage) -> Fingerprint {
        // 16 bits per channel keeps 16-bit sources apart, 8-bit sources widen losslessly
        let canonical = DynamicImage::ImageRgba16(image.to_rgba16());
        let mut encoded = Vec::new();

        match canonical.write_to(&mut Cursor::new(&mut encoded), ImageOutputFormat::Png) {
            Ok(()) => hash_bytes(&encoded),
            Err(err) => {
                warn!(%err, "failed to re-encode decoded image, hashing raw pixels instead");

                let mut hasher = Xxh64::new(HASH_SEED);
                hasher.update(&canonical.width().to_le_bytes());
                hasher.update(&canonical.height().to_le_bytes());
                if let Some(pixels) = canonical.as_rgba16() {
                    for channel in pixels.as_raw() {
                        hasher.update(&channel.to_le_bytes());
                    }
                }
                Fingerprint(hasher.digest())
            }
        }
    }

    fn fingerprint_opaque(&self, content: &mut dyn Read) -> Fingerprint {
        let mut encoder = GzEncoder::new(Vec::new(), self.compression);

        if let Err(err) = io::copy(&mut *content, &mut encoder) {
            warn!(%err, "failed to compress opaque content, hashing what was compressed so far");
            // still leave the reader drained
            let _ = io::copy(&mut *content, &mut io::sink());
        }

        if let Err(err) = encoder.try_finish() {
            warn!(%err, "failed to finish compressing opaque content");
        }

        hash_bytes(encoder.get_ref())
    }
}

fn hash_bytes(bytes: &[u8]) -> Fingerprint {
    let mut hasher = Xxh64::new(HASH_SEED);
    hasher.update(bytes);
    Fingerprint(hasher.digest())
}
