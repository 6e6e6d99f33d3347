//! Unified-diff parser.
//!
//! GitHub's `files[].patch` field contains hunks only (no `---`/`+++`
//! headers), so the parser requires nothing beyond `@@` lines. It also
//! ignores `\ No newline at end of file` markers and detects binary patch
//! messages.

use crate::types::{DiffHunk, DiffLine};

/// Parses a unified diff string into hunks/lines.
/// Robust to missing file headers; only `@@` headers are required.
pub fn parse_unified_diff(s: &str) -> Vec<DiffHunk> {
    let mut hunks = Vec::new();
    let mut cur_old_start = 0u32;
    let mut cur_old_lines = 0u32;
    let mut cur_new_start = 0u32;
    let mut cur_new_lines = 0u32;
    let mut lines_buf: Vec<DiffLine> = Vec::new();
    let mut old_line = 0u32;
    let mut new_line = 0u32;
    let mut in_hunk = false;

    for line in s.lines() {
        if line.starts_with("@@") {
            if in_hunk && !lines_buf.is_empty() {
                hunks.push(DiffHunk {
                    old_start: cur_old_start,
                    old_lines: cur_old_lines,
                    new_start: cur_new_start,
                    new_lines: cur_new_lines,
                    lines: std::mem::take(&mut lines_buf),
                });
            }
            if let Some((left, right)) = line
                .trim_start_matches('@')
                .trim_end_matches(|c| c != '@')
                .trim_end_matches('@')
                .trim()
                .split_once('+')
            {
                let left_nums = left.trim().trim_start_matches('-');
                let right_nums = right.trim();
                let (o_start, o_len) = split_nums(left_nums);
                let (n_start, n_len) = split_nums(right_nums);
                cur_old_start = o_start;
                cur_old_lines = o_len;
                cur_new_start = n_start;
                cur_new_lines = n_len;
                old_line = o_start;
                new_line = n_start;
                in_hunk = true;
            }
            continue;
        }

        // Marker lines are not diff content.
        if line.starts_with("\\ ") {
            continue;
        }

        if !in_hunk {
            // Skip any prelude until the first '@@'.
            continue;
        }

        if let Some(rest) = line.strip_prefix('+') {
            lines_buf.push(DiffLine::Added {
                new_line,
                content: rest.to_string(),
            });
            new_line += 1;
        } else if let Some(rest) = line.strip_prefix('-') {
            lines_buf.push(DiffLine::Removed {
                old_line,
                content: rest.to_string(),
            });
            old_line += 1;
        } else if let Some(rest) = line.strip_prefix(' ') {
            lines_buf.push(DiffLine::Context {
                old_line,
                new_line,
                content: rest.to_string(),
            });
            old_line += 1;
            new_line += 1;
        } else {
            // A weird line sneaked in; treat it as context.
            lines_buf.push(DiffLine::Context {
                old_line,
                new_line,
                content: line.to_string(),
            });
            old_line += 1;
            new_line += 1;
        }
    }

    if in_hunk && !lines_buf.is_empty() {
        hunks.push(DiffHunk {
            old_start: cur_old_start,
            old_lines: cur_old_lines,
            new_start: cur_new_start,
            new_lines: cur_new_lines,
            lines: lines_buf,
        });
    }
    hunks
}

/// Splits "12,7" or "12" into (start, len).
fn split_nums(s: &str) -> (u32, u32) {
    let s = s.trim();
    if let Some((a, b)) = s.split_once(',') {
        (a.parse().unwrap_or(0), b.parse().unwrap_or(0))
    } else {
        (s.parse().unwrap_or(0), 0)
    }
}

/// Simple heuristic to detect binary patches or messages in unified diff.
pub fn looks_like_binary_patch(s: &str) -> bool {
    s.contains("GIT binary patch")
        || s.starts_with("Binary files ")
        || (s.starts_with("Files ") && s.contains(" differ"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATCH: &str = "@@ -10,4 +10,5 @@ class Calculator {\n     int a;\n-    int total() {\n+    int total(int tax) {\n+        audit();\n         return a;\n";

    #[test]
    fn hunks_track_line_numbers() {
        let hunks = parse_unified_diff(PATCH);
        assert_eq!(hunks.len(), 1);
        let h = &hunks[0];
        assert_eq!(h.old_start, 10);
        assert_eq!(h.new_start, 10);

        let added: Vec<(u32, &str)> = h
            .lines
            .iter()
            .filter_map(|l| match l {
                DiffLine::Added { new_line, content } => Some((*new_line, content.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(
            added,
            vec![(11, "    int total(int tax) {"), (12, "        audit();")]
        );

        let removed: Vec<u32> = h
            .lines
            .iter()
            .filter_map(|l| match l {
                DiffLine::Removed { old_line, .. } => Some(*old_line),
                _ => None,
            })
            .collect();
        assert_eq!(removed, vec![11]);
    }

    #[test]
    fn multiple_hunks_split_correctly() {
        let s = "@@ -1,2 +1,2 @@\n-a\n+b\n c\n@@ -10,1 +10,2 @@\n d\n+e\n";
        let hunks = parse_unified_diff(s);
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[1].new_start, 10);
        match &hunks[1].lines[1] {
            DiffLine::Added { new_line, content } => {
                assert_eq!(*new_line, 11);
                assert_eq!(content, "e");
            }
            other => panic!("expected added line, got {other:?}"),
        }
    }

    #[test]
    fn no_newline_marker_is_ignored() {
        let s = "@@ -1,1 +1,1 @@\n-a\n+b\n\\ No newline at end of file\n";
        let hunks = parse_unified_diff(s);
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].lines.len(), 2);
    }

    #[test]
    fn binary_detection() {
        assert!(looks_like_binary_patch("Binary files a/x and b/x differ"));
        assert!(looks_like_binary_patch("GIT binary patch\nliteral 5"));
        assert!(!looks_like_binary_patch(PATCH));
    }

    #[test]
    fn empty_input_yields_no_hunks() {
        assert!(parse_unified_diff("").is_empty());
        assert!(parse_unified_diff("just prose\nno hunks").is_empty());
    }
}
