//! Block-aligned corpus partitions.
//!
//! [`split`] cuts the corpus into contiguous byte ranges that each begin
//! on a record boundary, so every partition can be parsed on its own.
//! Ranges are balanced by record count, not by bytes: partition `i` of `n`
//! holds records `⌊i·R/n⌋ .. ⌊(i+1)·R/n⌋`.

use std::ops::Range;

use serde::Serialize;

use crate::parse::blocks;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Partition {
    pub index: usize,
    pub range: Range<usize>,
    /// Record blocks inside `range`. The preamble is not counted.
    pub records: usize,
}

impl Partition {
    pub fn text<'a>(&self, corpus: &'a str) -> &'a str {
        &corpus[self.range.clone()]
    }
}

/// Split `text` into at most `n` partitions.
///
/// The preamble joins the first partition and the ranges together cover
/// the whole input. Empty partitions are never returned, but the result
/// always has at least one entry, even for empty input.
pub fn split(text: &str, n: usize) -> Vec<Partition> {
    let n = n.max(1);
    let starts: Vec<usize> = blocks(text)
        .filter(|b| b.is_record())
        .map(|b| b.span.start)
        .collect();
    let total = starts.len();

    if total == 0 {
        return vec![Partition {
            index: 0,
            range: 0..text.len(),
            records: 0,
        }];
    }

    let mut parts = Vec::with_capacity(n.min(total));
    let mut cursor = 0;
    for i in 0..n {
        let lo = i * total / n;
        let hi = (i + 1) * total / n;
        if lo == hi {
            continue;
        }
        let end = if hi == total { text.len() } else { starts[hi] };
        parts.push(Partition {
            index: parts.len(),
            range: cursor..end,
            records: hi - lo,
        });
        cursor = end;
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(records: usize) -> String {
        let mut s = String::from("# Full information about Amazon Share the Love products\nTotal items: 0\n\n");
        for i in 0..records {
            s.push_str(&format!("Id:   {i}\nASIN: A{i:04}\n  title: T{i}\n\n"));
        }
        s
    }

    fn assert_covers(text: &str, parts: &[Partition]) {
        assert_eq!(parts.first().unwrap().range.start, 0);
        assert_eq!(parts.last().unwrap().range.end, text.len());
        for pair in parts.windows(2) {
            assert_eq!(pair[0].range.end, pair[1].range.start);
        }
        let joined: String = parts.iter().map(|p| p.text(text)).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn balanced_by_record_count() {
        let text = corpus(10);
        let parts = split(&text, 3);
        let counts: Vec<_> = parts.iter().map(|p| p.records).collect();
        assert_eq!(counts, vec![3, 3, 4]);
        assert_covers(&text, &parts);
    }

    #[test]
    fn every_partition_after_the_first_starts_on_an_anchor() {
        let text = corpus(7);
        let parts = split(&text, 4);
        assert!(parts[0].text(&text).starts_with("# Full information"));
        for p in &parts[1..] {
            assert!(p.text(&text).starts_with("Id:"), "{:?}", p);
        }
    }

    #[test]
    fn fewer_records_than_partitions() {
        let text = corpus(2);
        let parts = split(&text, 8);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts.iter().map(|p| p.records).sum::<usize>(), 2);
        let indexes: Vec<_> = parts.iter().map(|p| p.index).collect();
        assert_eq!(indexes, vec![0, 1]);
        assert_covers(&text, &parts);
    }

    #[test]
    fn empty_and_preamble_only_inputs() {
        let parts = split("", 4);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].range, 0..0);

        let text = corpus(0);
        let parts = split(&text, 4);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].records, 0);
        assert_covers(&text, &parts);
    }

    #[test]
    fn zero_partitions_means_one() {
        let text = corpus(3);
        let parts = split(&text, 0);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].records, 3);
    }
}
