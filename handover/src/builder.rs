//! Loader-side payload construction

use crate::record::{PhysRange, Record, Tag};
use crate::{HandoverError, Payload, COOLBOOT};

/// Accumulates records into a well-formed payload
///
/// Invariants kept after every [`PayloadBuilder::add`]:
/// - records are sorted by start address and never overlap
/// - free memory never overlaps anything else: a used region carves itself
///   out of the free records beneath it
/// - adjacent records of a mergeable tag with equal flags are one record
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    agent: String,
    records: Vec<Record>,
}

impl PayloadBuilder {
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            records: Vec::new(),
        }
    }

    /// Adds a record; empty records are ignored
    pub fn add(&mut self, record: Record) -> Result<&mut Self, HandoverError> {
        if record.start.checked_add(record.size).is_none() {
            return Err(HandoverError::Wraps {
                start: record.start,
                size: record.size,
            });
        }
        if record.tag == Tag::File && record.name.is_none() {
            return Err(HandoverError::UnnamedFile);
        }
        if record.is_empty() {
            return Ok(self);
        }

        if record.tag == Tag::Free {
            self.add_free(record);
        } else {
            self.add_used(record)?;
        }
        self.merge();
        Ok(self)
    }

    fn add_used(&mut self, record: Record) -> Result<(), HandoverError> {
        let range = record.range();
        if let Some(existing) = self
            .records
            .iter()
            .find(|r| r.tag != Tag::Free && r.range().overlaps(&range))
        {
            return Err(HandoverError::Overlap {
                tag: record.tag,
                existing: existing.tag,
                start: record.start,
                end: record.end(),
            });
        }

        let mut carved = Vec::with_capacity(self.records.len() + 2);
        for r in self.records.drain(..) {
            if r.tag == Tag::Free && r.range().overlaps(&range) {
                carved.extend(subtract(&r, &range));
            } else {
                carved.push(r);
            }
        }
        carved.push(record);
        self.records = carved;
        self.sort();
        Ok(())
    }

    fn add_free(&mut self, record: Record) {
        // free memory only fills the holes left by what is already placed
        let mut pieces = vec![record];
        for used in self.records.iter().filter(|r| r.tag != Tag::Free) {
            let range = used.range();
            pieces = pieces
                .into_iter()
                .flat_map(|p| {
                    if p.range().overlaps(&range) {
                        subtract(&p, &range)
                    } else {
                        vec![p]
                    }
                })
                .collect();
        }

        for piece in pieces {
            // overlapping free records collapse into their union
            let mut start = piece.start;
            let mut end = piece.end();
            self.records.retain(|r| {
                let touches = r.tag == Tag::Free && r.flags == piece.flags && r.start < end && start < r.end();
                if touches {
                    start = start.min(r.start);
                    end = end.max(r.end());
                }
                !touches
            });
            self.records.push(Record {
                start,
                size: end - start,
                ..piece
            });
        }
        self.sort();
    }

    fn sort(&mut self) {
        self.records.sort_by_key(|r| (r.start, r.size));
    }

    fn merge(&mut self) {
        let mut merged: Vec<Record> = Vec::with_capacity(self.records.len());
        for r in self.records.drain(..) {
            match merged.last_mut() {
                Some(last)
                    if last.tag == r.tag
                        && last.flags == r.flags
                        && r.tag.should_merge()
                        && last.end() == r.start =>
                {
                    last.size += r.size;
                }
                _ => merged.push(r),
            }
        }
        self.records = merged;
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn build(self) -> Payload {
        Payload {
            magic: COOLBOOT,
            agent: self.agent,
            records: self.records,
        }
    }
}

/// Parts of `record` outside `hole`
fn subtract(record: &Record, hole: &PhysRange) -> Vec<Record> {
    let mut out = Vec::with_capacity(2);
    if record.start < hole.start {
        out.push(Record {
            size: hole.start - record.start,
            ..record.clone()
        });
    }
    if record.end() > hole.end() {
        out.push(Record {
            start: hole.end(),
            size: record.end() - hole.end(),
            ..record.clone()
        });
    }
    out
}
