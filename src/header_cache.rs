// cadencepeek: streaming audio bitstream demuxer
//
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
Cached header info (§4.3).

Unlike the source system's identity-keyed side tables, this cache owns
its records outright in a `HashMap<String, CachedHeader>`, per the
design note in §9 steering away from weak-keyed side tables.

The cache has two purposes: it lets a codec skip re-deriving the
stable fields of a header once it is confident sync has been achieved
(`enable`), and it detects mid-stream codec-parameter changes so the
driver can fire `on_codec_update` exactly once per change
(`check_codec_update`).
*/

use std::collections::HashMap;

/// The subset of a header's fields that, if changed, constitute a
/// codec-parameter change worth reporting through `on_codec_update`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateFields {
    pub sample_rate: u32,
    pub channels: u8,
    pub bit_depth: u8,
}

/// The payload passed to a [`crate::DemuxerOptions`] `on_codec_update`
/// callback: the bitrate that changed, plus the update-field subset
/// current at the time of the change.
#[derive(Debug, Clone, PartialEq)]
pub struct CodecUpdate {
    pub bitrate: u32,
    pub sample_rate: u32,
    pub channels: u8,
    pub bit_depth: u8,
}

#[derive(Clone)]
struct CachedHeader {
    update_fields: UpdateFields,
}

pub(crate) struct HeaderCache {
    enabled: bool,
    records: HashMap<String, CachedHeader>,
    current_key: Option<String>,
    last_bitrate: Option<u32>,
    should_update: bool,
}

impl HeaderCache {
    pub fn new() -> Self {
        HeaderCache {
            enabled: false,
            records: HashMap::new(),
            current_key: None,
            last_bitrate: None,
            should_update: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Called only after a parser has achieved sync (the first frame
    /// has been fully confirmed); before that headers are re-parsed
    /// every attempt so a bogus match can't poison the cache.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Called when a parser de-syncs: wipes the cache and disables it.
    pub fn reset(&mut self) {
        self.enabled = false;
        self.records.clear();
        self.current_key = None;
        self.last_bitrate = None;
        self.should_update = false;
    }

    /// Returns the cached update-field record for `key`, if present,
    /// marking `key` as the current header and flagging an update if
    /// the current header changed from the previously-current one.
    pub fn get_header(&mut self, key: &str) -> Option<UpdateFields> {
        let hit = self.records.get(key).cloned();
        if hit.is_some() {
            let changed = self.current_key.as_deref() != Some(key);
            self.current_key = Some(key.to_string());
            if changed {
                self.should_update = true;
            }
        }
        hit.map(|c| c.update_fields)
    }

    /// No-op unless the cache is `enabled`.
    pub fn set_header(&mut self, key: &str, update_fields: UpdateFields) {
        if !self.enabled {
            return;
        }
        self.records.insert(key.to_string(), CachedHeader { update_fields });
        self.current_key = Some(key.to_string());
    }

    /// If `bitrate` differs from the last observed bitrate, flags an
    /// update. If flagged (by this or a prior `get_header` key change),
    /// invokes `on_update` with the bitrate and the current
    /// update-fields, then clears the flag.
    pub fn check_codec_update<F: FnOnce(u32)>(&mut self, bitrate: u32, on_update: F) {
        if self.last_bitrate != Some(bitrate) {
            self.should_update = true;
            self.last_bitrate = Some(bitrate);
        }
        if self.should_update {
            on_update(bitrate);
            self.should_update = false;
        }
    }
}

impl Default for HeaderCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(sample_rate: u32) -> UpdateFields {
        UpdateFields { sample_rate, channels: 2, bit_depth: 16 }
    }

    #[test]
    fn idempotent_hits_return_equal_records() {
        let mut cache = HeaderCache::new();
        cache.enable();
        cache.set_header("k1", fields(44_100));
        assert_eq!(cache.get_header("k1"), Some(fields(44_100)));
        assert_eq!(cache.get_header("k1"), Some(fields(44_100)));
    }

    #[test]
    fn set_header_noop_when_disabled() {
        let mut cache = HeaderCache::new();
        cache.set_header("k1", fields(44_100));
        assert_eq!(cache.get_header("k1"), None);
    }

    #[test]
    fn codec_update_fires_on_bitrate_change_and_clears() {
        let mut cache = HeaderCache::new();
        cache.enable();
        let mut fired = 0;
        cache.check_codec_update(128_000, |_| fired += 1);
        assert_eq!(fired, 1);
        cache.check_codec_update(128_000, |_| fired += 1);
        assert_eq!(fired, 1);
        cache.check_codec_update(192_000, |_| fired += 1);
        assert_eq!(fired, 2);
    }

    #[test]
    fn reset_disables_and_clears() {
        let mut cache = HeaderCache::new();
        cache.enable();
        cache.set_header("k1", fields(44_100));
        cache.reset();
        assert!(!cache.is_enabled());
        assert_eq!(cache.get_header("k1"), None);
    }
}
