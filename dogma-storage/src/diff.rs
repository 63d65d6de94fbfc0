// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Text diffing used by `getDiff` for non-JSON entries and by the mirror
//! scheduler to compute local/remote tree deltas. JSON entries use the
//! JSON Patch diff in `dogma_core::patch` instead.

use similar::{Algorithm, TextDiff};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineChange {
    Context,
    Added,
    Removed,
}

#[derive(Debug, Clone)]
pub struct DiffLine {
    pub change: LineChange,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct DiffHunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<DiffLine>,
}

impl DiffHunk {
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_count, self.new_start, self.new_count
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct TextDiffResult {
    pub hunks: Vec<DiffHunk>,
}

impl TextDiffResult {
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    /// Unified-diff text, suitable for `APPLY_TEXT_PATCH` changes.
    pub fn to_unified(&self, old_path: &str, new_path: &str) -> String {
        let mut out = format!("--- a{old_path}\n+++ b{new_path}\n");
        for hunk in &self.hunks {
            out.push_str(&hunk.header());
            out.push('\n');
            for line in &hunk.lines {
                let prefix = match line.change {
                    LineChange::Context => ' ',
                    LineChange::Added => '+',
                    LineChange::Removed => '-',
                };
                out.push(prefix);
                out.push_str(&line.content);
                out.push('\n');
            }
        }
        out
    }
}

/// Diff two text blobs using the patience algorithm, matching diff
/// conventions readers of unified diffs already expect.
pub fn diff_text(old: &str, new: &str) -> TextDiffResult {
    if old == new {
        return TextDiffResult::default();
    }
    let text_diff = TextDiff::configure()
        .algorithm(Algorithm::Patience)
        .diff_lines(old, new);

    let mut hunks = Vec::new();
    for group in text_diff.grouped_ops(3) {
        let mut lines = Vec::new();
        let mut old_start = None;
        let mut new_start = None;
        let mut old_count = 0usize;
        let mut new_count = 0usize;
        for op in &group {
            for change in text_diff.iter_changes(op) {
                let content = change.value().trim_end_matches('\n').to_string();
                let kind = match change.tag() {
                    similar::ChangeTag::Equal => LineChange::Context,
                    similar::ChangeTag::Insert => LineChange::Added,
                    similar::ChangeTag::Delete => LineChange::Removed,
                };
                if let Some(idx) = change.old_index() {
                    old_start.get_or_insert(idx);
                    old_count += 1;
                }
                if let Some(idx) = change.new_index() {
                    new_start.get_or_insert(idx);
                    new_count += 1;
                }
                lines.push(DiffLine { change: kind, content });
            }
        }
        hunks.push(DiffHunk {
            old_start: old_start.unwrap_or(0) + 1,
            old_count,
            new_start: new_start.unwrap_or(0) + 1,
            new_count,
            lines,
        });
    }
    TextDiffResult { hunks }
}

/// Apply a unified-diff text patch (as produced by [`TextDiffResult::to_unified`])
/// to `old`, producing the new text. Used by `APPLY_TEXT_PATCH` changes.
pub fn apply_unified_text_patch(old: &str, patch: &str) -> dogma_core::CoreResult<String> {
    let old_lines: Vec<&str> = old.lines().collect();
    let mut out = String::new();
    let mut old_idx = 0usize;

    for line in patch.lines() {
        if line.starts_with("--- ") || line.starts_with("+++ ") {
            continue;
        }
        if let Some(header) = line.strip_prefix("@@ ") {
            let old_start = parse_hunk_old_start(header).unwrap_or(1);
            while old_idx < old_start.saturating_sub(1) && old_idx < old_lines.len() {
                out.push_str(old_lines[old_idx]);
                out.push('\n');
                old_idx += 1;
            }
            continue;
        }
        match line.chars().next() {
            Some(' ') => {
                out.push_str(&line[1..]);
                out.push('\n');
                old_idx += 1;
            }
            Some('-') => {
                old_idx += 1;
            }
            Some('+') => {
                out.push_str(&line[1..]);
                out.push('\n');
            }
            _ => {}
        }
    }
    while old_idx < old_lines.len() {
        out.push_str(old_lines[old_idx]);
        out.push('\n');
        old_idx += 1;
    }
    Ok(out)
}

fn parse_hunk_old_start(header: &str) -> Option<usize> {
    let old_part = header.split_whitespace().next()?;
    let digits = old_part.trim_start_matches('-').split(',').next()?;
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_has_no_hunks() {
        let result = diff_text("a\nb\n", "a\nb\n");
        assert!(result.is_empty());
    }

    #[test]
    fn detects_added_and_removed_lines() {
        let result = diff_text("a\nb\nc\n", "a\nx\nc\n");
        assert!(!result.is_empty());
        let all_changes: Vec<_> = result.hunks.iter().flat_map(|h| h.lines.iter()).collect();
        assert!(all_changes.iter().any(|l| l.change == LineChange::Added));
        assert!(all_changes.iter().any(|l| l.change == LineChange::Removed));
    }

    #[test]
    fn unified_output_has_file_headers() {
        let result = diff_text("a\n", "b\n");
        let unified = result.to_unified("/x.txt", "/x.txt");
        assert!(unified.starts_with("--- a/x.txt\n+++ b/x.txt\n"));
    }

    #[test]
    fn apply_unified_patch_round_trips() {
        let old = "a\nb\nc\n";
        let new = "a\nx\nc\n";
        let result = diff_text(old, new);
        let patch = result.to_unified("/f.txt", "/f.txt");
        let applied = apply_unified_text_patch(old, &patch).unwrap();
        assert_eq!(applied, new);
    }
}
