//! # Line Maps
//!
//! A debug artifact relating lines of generated output to the source lines
//! they came from. One generated range may come from several sources, for
//! example when declarations from different files are merged.
//!
//! Lookups run both ways: [`LineMap::sources_for`] is a binary search over
//! generated lines, [`LineMap::generated_for`] a linear scan over sources.
//!
//! ```rust
//! use parselet::source_map::{LineMapBuilder, LineRange};
//!
//! let mut builder = LineMapBuilder::new();
//! builder.append("a;\nb;\n", [("main.src", LineRange::new(0, 2))]);
//! builder.append("c;\n", [("lib.src", LineRange::new(7, 8))]);
//! let map = builder.finish();
//!
//! assert_eq!(map.sources_for(2)[0].file, "lib.src");
//! assert_eq!(map.generated_for("main.src", 1), Some(LineRange::new(0, 2)));
//! ```

use compact_str::CompactString;
use smallvec::SmallVec;

/// Half-open range of zero-based line numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn contains(&self, line: u32) -> bool {
        self.start <= line && line < self.end
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Lines of one source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceLines {
    pub file: CompactString,
    pub lines: LineRange,
}

impl<F: Into<CompactString>> From<(F, LineRange)> for SourceLines {
    fn from((file, lines): (F, LineRange)) -> Self {
        Self {
            file: file.into(),
            lines,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct LineMapEntry {
    pub generated: LineRange,
    pub sources: SmallVec<[SourceLines; 1]>,
}

/// Generated line ranges and their sources, ordered by generated line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct LineMap {
    entries: Vec<LineMapEntry>,
}

impl LineMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `generated` came from `sources`. Empty ranges are
    /// ignored.
    pub fn add<S: Into<SourceLines>>(&mut self, generated: LineRange, sources: impl IntoIterator<Item = S>) {
        if generated.is_empty() {
            return;
        }
        let entry = LineMapEntry {
            generated,
            sources: sources.into_iter().map(Into::into).collect(),
        };
        let at = self
            .entries
            .partition_point(|existing| existing.generated.start <= generated.start);
        self.entries.insert(at, entry);
    }

    /// Sources of generated line `line`; empty when the line is unmapped.
    #[must_use]
    pub fn sources_for(&self, line: u32) -> &[SourceLines] {
        let at = self.entries.partition_point(|entry| entry.generated.start <= line);
        // Ranges may overlap; the latest start at or before `line` wins.
        self.entries[..at]
            .iter()
            .rev()
            .find(|entry| entry.generated.contains(line))
            .map(|entry| entry.sources.as_slice())
            .unwrap_or_default()
    }

    /// The first generated range produced from `line` of `file`.
    #[must_use]
    pub fn generated_for(&self, file: &str, line: u32) -> Option<LineRange> {
        self.entries
            .iter()
            .find(|entry| {
                entry
                    .sources
                    .iter()
                    .any(|source| source.file == file && source.lines.contains(line))
            })
            .map(|entry| entry.generated)
    }

    pub fn entries(&self) -> impl Iterator<Item = &LineMapEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds a [`LineMap`] while output is appended chunk by chunk.
#[derive(Debug, Default)]
pub struct LineMapBuilder {
    map: LineMap,
    line: u32,
}

impl LineMapBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generated line the next chunk starts on.
    #[must_use]
    pub const fn current_line(&self) -> u32 {
        self.line
    }

    /// Account for `chunk` of output produced from `sources`.
    ///
    /// The chunk covers every generated line it writes on, including a
    /// final line without a trailing newline.
    pub fn append<S: Into<SourceLines>>(&mut self, chunk: &str, sources: impl IntoIterator<Item = S>) {
        if chunk.is_empty() {
            return;
        }
        let newlines = memchr::memchr_iter(b'\n', chunk.as_bytes()).count() as u32;
        let end = self.line + newlines + u32::from(!chunk.ends_with('\n'));
        self.map.add(LineRange::new(self.line, end), sources);
        self.line += newlines;
    }

    #[must_use]
    pub fn finish(self) -> LineMap {
        self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LineMap {
        let mut map = LineMap::new();
        map.add(LineRange::new(0, 3), [("a.src", LineRange::new(10, 13))]);
        map.add(
            LineRange::new(3, 5),
            [("b.src", LineRange::new(0, 2)), ("c.src", LineRange::new(4, 6))],
        );
        map.add(LineRange::new(8, 9), [("a.src", LineRange::new(20, 21))]);
        map
    }

    #[test]
    fn sources_are_found_by_generated_line() {
        let map = sample();
        assert_eq!(map.sources_for(0)[0].file, "a.src");
        assert_eq!(map.sources_for(2)[0].lines, LineRange::new(10, 13));
        assert_eq!(map.sources_for(4).len(), 2);
        assert!(map.sources_for(6).is_empty());
        assert_eq!(map.sources_for(8)[0].lines.start, 20);
        assert!(map.sources_for(100).is_empty());
    }

    #[test]
    fn generated_lines_are_found_by_source() {
        let map = sample();
        assert_eq!(map.generated_for("c.src", 5), Some(LineRange::new(3, 5)));
        assert_eq!(map.generated_for("a.src", 20), Some(LineRange::new(8, 9)));
        assert_eq!(map.generated_for("a.src", 15), None);
        assert_eq!(map.generated_for("missing.src", 0), None);
    }

    #[test]
    fn entries_stay_ordered() {
        let mut map = LineMap::new();
        map.add(LineRange::new(5, 6), [("x", LineRange::new(0, 1))]);
        map.add(LineRange::new(1, 2), [("y", LineRange::new(0, 1))]);
        map.add(LineRange::new(3, 3), [("z", LineRange::new(0, 1))]);
        let starts: Vec<u32> = map.entries().map(|entry| entry.generated.start).collect();
        assert_eq!(starts, [1, 5]);
    }

    #[test]
    fn builder_tracks_lines_across_chunks() {
        let mut builder = LineMapBuilder::new();
        builder.append("int a;", [("h", LineRange::new(0, 1))]);
        builder.append(" int b;\n", [("i", LineRange::new(3, 4))]);
        builder.append("x\ny\n", [("j", LineRange::new(0, 2))]);
        assert_eq!(builder.current_line(), 3);
        let map = builder.finish();
        assert_eq!(map.sources_for(0).len(), 1);
        assert_eq!(map.generated_for("i", 3), Some(LineRange::new(0, 1)));
        assert_eq!(map.generated_for("j", 1), Some(LineRange::new(1, 3)));
    }

    #[cfg(feature = "serialize")]
    #[test]
    fn serializes_as_json() {
        let map = sample();
        let json = serde_json::to_string(&map).unwrap();
        let back: LineMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
