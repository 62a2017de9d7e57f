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

/// A quantized color together with the number of pixels it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Swatch {
    key: ColorKey,
    population: u32,
}

impl Swatch {
    pub fn new(key: ColorKey, population: u32) -> Swatch {
        Self { key, population }
    }

    pub fn key(self) -> ColorKey {
        self.key
    }

    pub fn rgb(self) -> (u8, u8, u8) {
        self.key.rgb()
    }

    pub fn population(self) -> u32 {
        self.population
    }

    /// Whether this swatch should be picked over `other` when scanning for the most frequent color: more pixels wins,
    /// and equal populations fall back to the smaller key.
    pub(crate) fn outranks(self, other: Swatch) -> bool {
        self.population > other.population || (self.population == other.population && self.key < other.key)
    }
}
