use super::types::LineInfo;

/// Parse a single file's unified-diff patch into line-numbered additions and deletions.
///
/// The input is the `patch` field of GitHub's file listing: one or more hunks,
/// each introduced by a header of the form
///
///   @@ -{del_start}[,{del_count}] +{add_start}[,{add_count}] @@ [section]
///
/// followed by lines prefixed with:
///   '+' for additions (recorded at the current target line)
///   '-' for deletions (recorded at the current source line)
///   ' ' for context (advances both cursors)
///
/// A header that does not match leaves both cursors where they were. Lines seen
/// before the first valid header have no position and are not recorded.
pub fn parse_patch(patch: Option<&str>) -> LineInfo {
    let mut info = LineInfo::default();
    let Some(patch) = patch.filter(|p| !p.is_empty()) else {
        return info;
    };

    let mut add_line: Option<usize> = None;
    let mut del_line: Option<usize> = None;

    for line in patch.lines() {
        if line.starts_with("@@") {
            if let Some((del_start, add_start)) = parse_hunk_header(line) {
                del_line = Some(del_start);
                add_line = Some(add_start);
            }
            continue;
        }

        if let Some(content) = line.strip_prefix('+') {
            if line.starts_with("+++") {
                continue;
            }
            if let Some(current) = add_line.as_mut() {
                info.additions_lines.push(*current);
                info.addition_content.push(content.to_string());
                *current += 1;
            }
            continue;
        }

        if let Some(content) = line.strip_prefix('-') {
            if line.starts_with("---") {
                continue;
            }
            if let Some(current) = del_line.as_mut() {
                info.deletions_lines.push(*current);
                info.deletion_content.push(content.to_string());
                *current += 1;
            }
            continue;
        }

        // "\ No newline at end of file" annotates the previous line
        if line.starts_with('\\') {
            continue;
        }

        if let Some(current) = add_line.as_mut() {
            *current += 1;
        }
        if let Some(current) = del_line.as_mut() {
            *current += 1;
        }
    }

    info
}

/// Returns `(del_start, add_start)` for a well-formed hunk header.
fn parse_hunk_header(line: &str) -> Option<(usize, usize)> {
    let header = line.strip_prefix("@@ ")?;
    let (ranges, _section) = header.split_once(" @@")?;
    let mut parts = ranges.split_whitespace();
    let del_start = parse_range_start(parts.next()?, '-')?;
    let add_start = parse_range_start(parts.next()?, '+')?;
    if parts.next().is_some() {
        return None;
    }
    Some((del_start, add_start))
}

fn parse_range_start(part: &str, prefix: char) -> Option<usize> {
    let range = part.strip_prefix(prefix)?;
    let (start, count) = match range.split_once(',') {
        Some((start, count)) => (start, count),
        None => (range, ""),
    };
    if !count.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    start.parse::<usize>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_HUNKS: &str = "@@ -1,4 +1,5 @@ fn main() {
 fn main() {
-    println!(\"old\");
+    println!(\"new\");
+    // Added a comment
 }
@@ -20,3 +21,2 @@ impl Config {
 let a = 1;
-let b = 2;
 let c = 3;";

    #[test]
    fn test_cursor_arithmetic_per_line_type() {
        let patch = "@@ -10,3 +20,4 @@\n context\n+foo\n-bar\n context";
        let info = parse_patch(Some(patch));
        assert_eq!(info.additions_lines, vec![21]);
        assert_eq!(info.addition_content, vec!["foo"]);
        assert_eq!(info.deletions_lines, vec![11]);
        assert_eq!(info.deletion_content, vec!["bar"]);
    }

    #[test]
    fn test_multiple_hunks_reset_cursors() {
        let info = parse_patch(Some(TWO_HUNKS));
        assert_eq!(info.additions_lines, vec![2, 3]);
        assert_eq!(
            info.addition_content,
            vec!["    println!(\"new\");", "    // Added a comment"]
        );
        assert_eq!(info.deletions_lines, vec![2, 21]);
        assert_eq!(info.deletion_content, vec!["    println!(\"old\");", "let b = 2;"]);
    }

    #[test]
    fn test_lengths_match_content() {
        let info = parse_patch(Some(TWO_HUNKS));
        assert_eq!(info.additions_lines.len(), info.addition_content.len());
        assert_eq!(info.deletions_lines.len(), info.deletion_content.len());
    }

    #[test]
    fn test_empty_and_absent_patch() {
        assert_eq!(parse_patch(None), LineInfo::default());
        assert_eq!(parse_patch(Some("")), LineInfo::default());
    }

    #[test]
    fn test_patch_without_hunk_header_records_nothing() {
        let info = parse_patch(Some(" context\n+added\n-removed"));
        assert_eq!(info, LineInfo::default());
    }

    #[test]
    fn test_new_file_hunk_without_counts() {
        let info = parse_patch(Some("@@ -0,0 +1 @@\n+only line"));
        assert_eq!(info.additions_lines, vec![1]);
        assert!(info.deletions_lines.is_empty());
    }

    #[test]
    fn test_file_markers_are_skipped() {
        let patch = "--- a/file.txt\n+++ b/file.txt\n@@ -1,2 +1,2 @@\n-hello\n+world\n same";
        let info = parse_patch(Some(patch));
        assert_eq!(info.addition_content, vec!["world"]);
        assert_eq!(info.deletion_content, vec!["hello"]);
        assert_eq!(info.additions_lines, vec![1]);
        assert_eq!(info.deletions_lines, vec![1]);
    }

    #[test]
    fn test_malformed_header_keeps_previous_cursor() {
        let patch = "@@ -5,2 +7,2 @@\n+a\n@@ garbage @@\n+b";
        let info = parse_patch(Some(patch));
        assert_eq!(info.additions_lines, vec![7, 8]);
    }

    #[test]
    fn test_no_newline_marker_does_not_advance() {
        let patch = "@@ -1,1 +1,2 @@\n-old\n\\ No newline at end of file\n+new\n+tail";
        let info = parse_patch(Some(patch));
        assert_eq!(info.deletions_lines, vec![1]);
        assert_eq!(info.additions_lines, vec![1, 2]);
    }

    #[test]
    fn test_parse_hunk_header_variants() {
        assert_eq!(parse_hunk_header("@@ -10,3 +20,4 @@"), Some((10, 20)));
        assert_eq!(parse_hunk_header("@@ -1 +1 @@ fn x()"), Some((1, 1)));
        assert_eq!(parse_hunk_header("@@ -a,3 +20,4 @@"), None);
        assert_eq!(parse_hunk_header("@@ +20,4 -10,3 @@"), None);
        assert_eq!(parse_hunk_header("@@ -10,3 +20,4"), None);
    }
}
