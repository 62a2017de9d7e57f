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

use std::fmt;

/// Number of low-order bits discarded from each 16-bit color channel when quantizing.
pub const QUANTIZE_SHIFT: u32 = 12;

const SOURCE_WORD_WIDTH: u32 = 16;

/// Largest value a quantized channel can take.
pub const QUANTIZE_WORD_MAX: u8 = (1 << (SOURCE_WORD_WIDTH - QUANTIZE_SHIFT)) - 1;

/// A quantized RGB color used as a histogram key.
///
/// Keys order lexicographically by red, then green, then blue. That order is what breaks ties between equally
/// frequent colors in [`crate::select_top3`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColorKey {
    red: u8,
    green: u8,
    blue: u8,
}

impl ColorKey {
    /// Create a key from already quantized channels. Channels above [`QUANTIZE_WORD_MAX`] are clamped.
    pub fn new((red, green, blue): (u8, u8, u8)) -> ColorKey {
        Self {
            red: red.min(QUANTIZE_WORD_MAX),
            green: green.min(QUANTIZE_WORD_MAX),
            blue: blue.min(QUANTIZE_WORD_MAX),
        }
    }

    /// Quantize a 16-bit RGBA pixel. Alpha is ignored.
    pub fn from_rgba16([red, green, blue, _]: [u16; 4]) -> ColorKey {
        Self {
            red: quantize(red),
            green: quantize(green),
            blue: quantize(blue),
        }
    }

    pub fn rgb(self) -> (u8, u8, u8) {
        (self.red, self.green, self.blue)
    }
}

impl fmt::Display for ColorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.red, self.green, self.blue)
    }
}

fn quantize(value: u16) -> u8 {
    value.wrapping_shr(QUANTIZE_SHIFT) as u8
}
