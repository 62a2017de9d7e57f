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

use crate::fingerprint::{Fingerprint, Namespace};
use std::collections::HashSet;

/// Fingerprints seen so far during one run, kept apart per [`Namespace`].
///
/// The ledger only grows. It is owned by a single [`crate::Pipeline`], so independent runs never share state.
#[derive(Debug, Clone, Default)]
pub struct DedupLedger {
    decodable: HashSet<Fingerprint>,
    opaque: HashSet<Fingerprint>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen_decodable(&self, fingerprint: Fingerprint) -> bool {
        self.decodable.contains(&fingerprint)
    }

    pub fn mark_decodable(&mut self, fingerprint: Fingerprint) {
        self.decodable.insert(fingerprint);
    }

    pub fn seen_opaque(&self, fingerprint: Fingerprint) -> bool {
        self.opaque.contains(&fingerprint)
    }

    pub fn mark_opaque(&mut self, fingerprint: Fingerprint) {
        self.opaque.insert(fingerprint);
    }

    /// Record the fingerprint in the given namespace. Returns `true` if it had not been seen there before.
    ///
    /// The membership test and the insert happen as one step through `&mut self`.
    pub fn check_and_mark(&mut self, namespace: Namespace, fingerprint: Fingerprint) -> bool {
        self.set_mut(namespace).insert(fingerprint)
    }

    pub fn contains(&self, namespace: Namespace, fingerprint: Fingerprint) -> bool {
        match namespace {
            Namespace::Decodable => self.seen_decodable(fingerprint),
            Namespace::Opaque => self.seen_opaque(fingerprint),
        }
    }

    /// Number of distinct fingerprints recorded in the given namespace.
    pub fn len(&self, namespace: Namespace) -> usize {
        match namespace {
            Namespace::Decodable => self.decodable.len(),
            Namespace::Opaque => self.opaque.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.decodable.is_empty() && self.opaque.is_empty()
    }

    fn set_mut(&mut self, namespace: Namespace) -> &mut HashSet<Fingerprint> {
        match namespace {
            Namespace::Decodable => &mut self.decodable,
            Namespace::Opaque => &mut self.opaque,
        }
    }
}
