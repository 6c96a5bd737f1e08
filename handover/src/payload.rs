//! The hand-off payload and the queries the kernel runs against it

use crate::record::{PhysRange, Record, Tag};
use crate::{HandoverError, COOLBOOT};
use core_types::{page_align_down, page_align_up};
use serde::{Deserialize, Serialize};

/// Everything the loader tells the kernel
///
/// Records are sorted by start address. Produced once by the loader and
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub magic: u32,
    /// Name of the loader that produced the payload
    pub agent: String,
    pub records: Vec<Record>,
}

impl Payload {
    /// Checks both the magic passed in the entry register and the payload's own
    pub fn is_valid(&self, magic: u32) -> bool {
        magic == COOLBOOT && self.magic == COOLBOOT
    }

    /// Like [`Payload::is_valid`] but says what is wrong
    ///
    /// Also rejects records whose end does not fit in 64 bits, which only a
    /// payload built outside [`crate::PayloadBuilder`] can carry.
    pub fn validate(&self, magic: u32) -> Result<(), HandoverError> {
        if magic != COOLBOOT {
            return Err(HandoverError::BadMagic(magic));
        }
        if self.magic != COOLBOOT {
            return Err(HandoverError::BadMagic(self.magic));
        }
        if let Some(r) = self.records.iter().find(|r| !r.fits()) {
            return Err(HandoverError::Wraps {
                start: r.start,
                size: r.size,
            });
        }
        Ok(())
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// First record with the given tag
    pub fn find_tag(&self, tag: Tag) -> Option<&Record> {
        self.records.iter().find(|r| r.tag == tag)
    }

    /// The FILE record with the given name
    pub fn file_by_name(&self, name: &str) -> Option<&Record> {
        self.records
            .iter()
            .find(|r| r.tag == Tag::File && r.name.as_deref() == Some(name))
    }

    /// Total bytes covered by records of `tag`
    pub fn sum(&self, tag: Tag) -> u64 {
        self.records
            .iter()
            .filter(|r| r.tag == tag)
            .fold(0u64, |acc, r| acc.saturating_add(r.size))
    }

    /// First free record of at least `size` bytes
    pub fn find_free(&self, size: u64) -> Option<&Record> {
        self.records
            .iter()
            .find(|r| r.tag == Tag::Free && r.size >= size)
    }

    /// Smallest range enclosing every free record
    pub fn usable_range(&self) -> Option<PhysRange> {
        let mut bounds: Option<(u64, u64)> = None;
        for r in self.records.iter().filter(|r| r.tag == Tag::Free && !r.is_empty()) {
            bounds = Some(match bounds {
                None => (r.start, r.end()),
                Some((start, end)) => (start.min(r.start), end.max(r.end())),
            });
        }
        bounds.map(|(start, end)| PhysRange::new(start, end - start))
    }

    /// Free memory as whole pages, sorted and merged
    pub fn free_ranges(&self) -> Vec<PhysRange> {
        let mut ranges: Vec<PhysRange> = self
            .records
            .iter()
            .filter(|r| r.tag == Tag::Free)
            .filter_map(|r| {
                let start = page_align_up(r.start);
                let end = page_align_down(r.end());
                (end > start).then(|| PhysRange::new(start, end - start))
            })
            .collect();
        ranges.sort();

        let mut merged: Vec<PhysRange> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match merged.last_mut() {
                Some(last) if last.end() >= range.start => {
                    let end = last.end().max(range.end());
                    last.size = end - last.start;
                }
                _ => merged.push(range),
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PayloadBuilder;

    fn sample() -> Payload {
        let mut builder = PayloadBuilder::new("test-loader");
        builder
            .add(Record::new(Tag::Free, 0x10_0000, 0x40_0000))
            .unwrap()
            .add(Record::new(Tag::Kernel, 0x20_0000, 0x1_0000))
            .unwrap()
            .add(Record::file("init", 0x30_0000, 0x2345))
            .unwrap()
            .add(Record::new(Tag::Free, 0x80_0800, 0x2000))
            .unwrap();
        builder.build()
    }

    #[test]
    fn test_validity() {
        let payload = sample();
        assert!(payload.is_valid(COOLBOOT));
        assert!(!payload.is_valid(0));
        assert_eq!(payload.validate(7), Err(HandoverError::BadMagic(7)));
    }

    #[test]
    fn test_wrapping_record_is_rejected() {
        let json = serde_json::json!({
            "magic": COOLBOOT,
            "agent": "hand-written",
            "records": [
                { "tag": "Free", "flags": 0, "start": 0x1000, "size": 0x4000, "name": null },
                { "tag": "Free", "flags": 0, "start": u64::MAX - 0xfff, "size": 0x2000, "name": null }
            ]
        });
        let payload: Payload = serde_json::from_value(json).unwrap();
        assert_eq!(
            payload.validate(COOLBOOT),
            Err(HandoverError::Wraps {
                start: u64::MAX - 0xfff,
                size: 0x2000
            })
        );
        // queries stay total even on a payload that failed validation
        assert_eq!(payload.free_ranges().first(), Some(&PhysRange::new(0x1000, 0x4000)));
        assert_eq!(payload.usable_range().map(|r| r.start), Some(0x1000));
    }

    #[test]
    fn test_file_lookup() {
        let payload = sample();
        let init = payload.file_by_name("init").unwrap();
        assert_eq!(init.start, 0x30_0000);
        assert_eq!(init.size, 0x2345);
        assert!(payload.file_by_name("missing").is_none());
        assert_eq!(payload.find_tag(Tag::Kernel).unwrap().size, 0x1_0000);
    }

    #[test]
    fn test_free_queries() {
        let payload = sample();
        let usable = payload.usable_range().unwrap();
        assert_eq!(usable.start, 0x10_0000);
        assert_eq!(usable.end(), 0x80_2800);

        let ranges = payload.free_ranges();
        // the unaligned tail record shrinks inward to one whole page
        assert_eq!(ranges.last(), Some(&PhysRange::new(0x80_1000, 0x1000)));
        assert!(ranges.iter().all(|r| !r.overlaps(&PhysRange::new(0x20_0000, 0x1_0000))));
        assert_eq!(payload.find_free(0x1_0000).map(|r| r.start), Some(0x10_0000));
        assert!(payload.find_free(0x1000_0000).is_none());
    }

    #[test]
    fn test_sum() {
        let payload = sample();
        let total = payload.sum(Tag::Free) + payload.sum(Tag::Kernel) + payload.sum(Tag::File);
        assert_eq!(total, 0x40_0000 + 0x2000);
    }

    #[test]
    fn test_empty_payload_has_no_usable_range() {
        let payload = PayloadBuilder::new("empty").build();
        assert_eq!(payload.usable_range(), None);
        assert!(payload.free_ranges().is_empty());
    }
}
