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

use crate::color_key::ColorKey;
use image::DynamicImage;
use std::collections::HashMap;

/// Occurrence counts of quantized colors within one decoded image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorHistogram {
    counts: HashMap<ColorKey, u32>,
}

impl ColorHistogram {
    /// Build the histogram of every pixel in the image. The alpha channel is never consulted.
    pub fn build(image: &DynamicImage) -> ColorHistogram {
        Self::from_pixels(image.to_rgba16().pixels().map(|pixel| pixel.0))
    }

    /// Build a histogram from raw 16-bit RGBA pixels in any order.
    pub fn from_pixels<I>(pixels: I) -> ColorHistogram
    where
        I: IntoIterator<Item = [u16; 4]>,
    {
        let mut counts = HashMap::new();
        for pixel in pixels {
            *counts.entry(ColorKey::from_rgba16(pixel)).or_insert(0) += 1;
        }

        Self { counts }
    }

    pub fn count(&self, key: ColorKey) -> u32 {
        self.counts.get(&key).copied().unwrap_or(0)
    }

    /// Number of distinct colors.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Total number of pixels counted.
    pub fn population(&self) -> u64 {
        self.counts.values().map(|&count| count as u64).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ColorKey, u32)> + '_ {
        self.counts.iter().map(|(&key, &count)| (key, count))
    }

    pub(crate) fn remove(&mut self, key: ColorKey) -> Option<u32> {
        self.counts.remove(&key)
    }
}

impl FromIterator<(ColorKey, u32)> for ColorHistogram {
    fn from_iter<I: IntoIterator<Item = (ColorKey, u32)>>(iter: I) -> Self {
        let mut counts = HashMap::new();
        for (key, count) in iter {
            *counts.entry(key).or_insert(0) += count;
        }

        Self { counts }
    }
}
