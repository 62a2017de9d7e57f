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

use crate::{histogram::ColorHistogram, swatch::Swatch};

/// How many colors are reported per image.
pub const TOP_COLOR_COUNT: usize = 3;

/// Select the three most frequent colors of a histogram, most frequent first.
///
/// See [`select_top`].
pub fn select_top3(histogram: ColorHistogram) -> Vec<Swatch> {
    select_top(histogram, TOP_COLOR_COUNT)
}

/// Select the `count` most frequent colors of a histogram, most frequent first.
///
/// Runs one linear scan per requested color instead of sorting the whole histogram, removing each winner before the
/// next scan. Ties go to the lexicographically smaller [`crate::ColorKey`]. A histogram with fewer distinct colors than
/// requested yields a shorter result; nothing is repeated to fill the gap.
pub fn select_top(mut histogram: ColorHistogram, count: usize) -> Vec<Swatch> {
    let mut selected = Vec::with_capacity(count.min(histogram.len()));

    for round in 0..count {
        let Some(best) = get_max_swatch(&histogram) else {
            break;
        };

        selected.push(best);

        // the last winner can stay, no scan follows it
        if round + 1 < count {
            histogram.remove(best.key());
        }
    }

    selected
}

fn get_max_swatch(histogram: &ColorHistogram) -> Option<Swatch> {
    let mut max_swatch: Option<Swatch> = None;

    for (key, count) in histogram.iter() {
        let swatch = Swatch::new(key, count);

        if max_swatch.map_or(true, |max| swatch.outranks(max)) {
            max_swatch = Some(swatch);
        }
    }

    max_swatch
}
