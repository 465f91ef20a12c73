use std::path::PathBuf;

use mira_core::{ChangeType, FileDiff, HunkInfo, MiraError, PatchSet};

/// Parse a unified diff string (as produced by `git diff`) into a [`PatchSet`].
///
/// Handles standard unified diff format including new files, deleted files,
/// renamed files, and binary files. Empty or whitespace-only input yields an
/// empty `PatchSet`; it is not an error.
///
/// # Errors
///
/// Returns [`MiraError::DiffParse`] if a hunk header is malformed.
///
/// # Examples
///
/// ```
/// use mira_diff::parser::parse_unified_diff;
///
/// let patch = parse_unified_diff("").unwrap();
/// assert!(patch.files.is_empty());
/// ```
pub fn parse_unified_diff(input: &str) -> Result<PatchSet, MiraError> {
    let mut files = Vec::new();
    let mut current: Option<RawFile> = None;
    let mut current_hunk: Option<RawHunk> = None;

    for line in input.lines() {
        if line.starts_with("diff --git ") {
            flush_hunk(&mut current, &mut current_hunk);
            if let Some(file) = current.take() {
                files.push(file);
            }
            current = Some(RawFile::default());
            continue;
        }

        // Patches without a "diff --git" line still start with "--- ".
        if line.starts_with("--- ") && current.is_none() {
            current = Some(RawFile::default());
        }

        let Some(file) = current.as_mut() else {
            continue;
        };

        if line.starts_with("Binary files ") && line.ends_with(" differ") {
            file.is_binary = true;
            continue;
        }

        if line.starts_with("new file mode") {
            file.is_new_file = true;
            continue;
        }

        if line.starts_with("deleted file mode") {
            file.is_deleted_file = true;
            continue;
        }

        if line.starts_with("rename from ") || line.starts_with("rename to ") {
            file.is_rename = true;
            continue;
        }

        if line.starts_with("index ") || line.starts_with("similarity index") {
            continue;
        }

        if let Some(path) = line.strip_prefix("--- ") {
            file.old_path = parse_path(path);
            if path == "/dev/null" {
                file.is_new_file = true;
            }
            continue;
        }

        if let Some(path) = line.strip_prefix("+++ ") {
            file.new_path = parse_path(path);
            if path == "/dev/null" {
                file.is_deleted_file = true;
            }
            continue;
        }

        if line.starts_with("@@ ") {
            flush_hunk(&mut current, &mut current_hunk);
            let (old_start, old_lines, new_start, new_lines) = parse_hunk_header(line)?;
            current_hunk = Some(RawHunk {
                source_start: old_start,
                source_length: old_lines,
                target_start: new_start.max(1),
                target_length: new_lines,
                content: format!("{line}\n"),
            });
            continue;
        }

        if line == "\\ No newline at end of file" {
            continue;
        }

        if let Some(hunk) = current_hunk.as_mut() {
            if line.starts_with('+') || line.starts_with('-') || line.starts_with(' ') {
                hunk.content.push_str(line);
                hunk.content.push('\n');
            }
        }
    }

    flush_hunk(&mut current, &mut current_hunk);
    if let Some(file) = current.take() {
        files.push(file);
    }

    let files = files.into_iter().map(RawFile::finalize).collect();
    Ok(PatchSet { files })
}

#[derive(Default)]
struct RawFile {
    old_path: PathBuf,
    new_path: PathBuf,
    hunks: Vec<RawHunk>,
    is_new_file: bool,
    is_deleted_file: bool,
    is_rename: bool,
    is_binary: bool,
}

struct RawHunk {
    source_start: u32,
    source_length: u32,
    target_start: u32,
    target_length: u32,
    content: String,
}

impl RawFile {
    fn finalize(self) -> FileDiff {
        let change_type = if self.is_rename {
            ChangeType::Renamed
        } else if self.is_new_file {
            ChangeType::Added
        } else if self.is_deleted_file {
            ChangeType::Deleted
        } else {
            ChangeType::Modified
        };

        let path = if self.is_deleted_file && !self.is_rename {
            self.old_path.clone()
        } else {
            self.new_path.clone()
        };

        let old_path = if self.is_rename {
            Some(self.old_path)
        } else {
            None
        };

        let mut added_lines = 0;
        let mut deleted_lines = 0;
        for hunk in &self.hunks {
            for line in hunk.content.lines() {
                if line.starts_with('+') && !line.starts_with("+++") {
                    added_lines += 1;
                } else if line.starts_with('-') && !line.starts_with("---") {
                    deleted_lines += 1;
                }
            }
        }

        let language = detect_language(&path);

        let hunks = self
            .hunks
            .into_iter()
            .map(|h| HunkInfo {
                source_start: h.source_start,
                source_length: h.source_length,
                target_start: h.target_start,
                target_length: h.target_length,
                content: h.content,
            })
            .collect();

        FileDiff {
            path,
            change_type,
            hunks,
            language,
            old_path,
            is_binary: self.is_binary,
            added_lines,
            deleted_lines,
        }
    }
}

fn flush_hunk(current: &mut Option<RawFile>, hunk: &mut Option<RawHunk>) {
    if let Some(h) = hunk.take() {
        if let Some(file) = current.as_mut() {
            file.hunks.push(h);
        }
    }
}

fn parse_path(raw: &str) -> PathBuf {
    let normalized = raw.trim_matches('"');

    if normalized == "/dev/null" {
        return PathBuf::from("/dev/null");
    }

    let stripped = normalized
        .strip_prefix("a/")
        .or_else(|| normalized.strip_prefix("b/"))
        .unwrap_or(normalized);

    PathBuf::from(stripped)
}

fn parse_hunk_header(line: &str) -> Result<(u32, u32, u32, u32), MiraError> {
    let inner = line
        .strip_prefix("@@ ")
        .and_then(|s| {
            let end = s.find(" @@")?;
            Some(&s[..end])
        })
        .ok_or_else(|| MiraError::DiffParse(format!("invalid hunk header: {line}")))?;

    let parts: Vec<&str> = inner.split(' ').collect();
    if parts.len() != 2 {
        return Err(MiraError::DiffParse(format!("invalid hunk header: {line}")));
    }

    let old = parts[0]
        .strip_prefix('-')
        .ok_or_else(|| MiraError::DiffParse(format!("invalid old range in hunk: {line}")))?;
    let new = parts[1]
        .strip_prefix('+')
        .ok_or_else(|| MiraError::DiffParse(format!("invalid new range in hunk: {line}")))?;

    let (old_start, old_lines) = parse_range(old, line)?;
    let (new_start, new_lines) = parse_range(new, line)?;

    Ok((old_start, old_lines, new_start, new_lines))
}

fn parse_range(range: &str, context: &str) -> Result<(u32, u32), MiraError> {
    if let Some((start, count)) = range.split_once(',') {
        let s = start
            .parse()
            .map_err(|_| MiraError::DiffParse(format!("invalid range number in: {context}")))?;
        let c = count
            .parse()
            .map_err(|_| MiraError::DiffParse(format!("invalid range count in: {context}")))?;
        Ok((s, c))
    } else {
        let s = range
            .parse()
            .map_err(|_| MiraError::DiffParse(format!("invalid range number in: {context}")))?;
        Ok((s, 1))
    }
}

/// Fixed suffix-to-language table used for detection. Unknown suffixes map to
/// an empty string rather than `None`, per the parser's detection contract.
const EXTENSION_LANGUAGE_MAP: &[(&str, &str)] = &[
    ("rs", "rust"),
    ("py", "python"),
    ("pyi", "python"),
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("mjs", "javascript"),
    ("cjs", "javascript"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("go", "go"),
    ("java", "java"),
    ("kt", "kotlin"),
    ("kts", "kotlin"),
    ("c", "c"),
    ("h", "c"),
    ("cpp", "cpp"),
    ("cc", "cpp"),
    ("cxx", "cpp"),
    ("hpp", "cpp"),
    ("hxx", "cpp"),
    ("cs", "csharp"),
    ("rb", "ruby"),
    ("php", "php"),
    ("swift", "swift"),
    ("m", "objective-c"),
    ("mm", "objective-c"),
    ("scala", "scala"),
    ("clj", "clojure"),
    ("cljs", "clojure"),
    ("ex", "elixir"),
    ("exs", "elixir"),
    ("erl", "erlang"),
    ("hs", "haskell"),
    ("ml", "ocaml"),
    ("mli", "ocaml"),
    ("r", "r"),
    ("jl", "julia"),
    ("lua", "lua"),
    ("pl", "perl"),
    ("pm", "perl"),
    ("sh", "shell"),
    ("bash", "shell"),
    ("zsh", "shell"),
    ("sql", "sql"),
    ("html", "html"),
    ("htm", "html"),
    ("css", "css"),
    ("scss", "scss"),
    ("sass", "sass"),
    ("less", "less"),
    ("vue", "vue"),
    ("json", "json"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
    ("toml", "toml"),
    ("xml", "xml"),
    ("md", "markdown"),
    ("dart", "dart"),
    ("proto", "protobuf"),
    ("graphql", "graphql"),
    ("tf", "terraform"),
    ("zig", "zig"),
    ("nim", "nim"),
    ("cr", "crystal"),
    ("vb", "vbnet"),
    ("fs", "fsharp"),
    ("fsx", "fsharp"),
    ("groovy", "groovy"),
    ("gradle", "groovy"),
];

fn detect_language(path: &std::path::Path) -> String {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return String::new();
    };
    let ext_lower = ext.to_lowercase();
    EXTENSION_LANGUAGE_MAP
        .iter()
        .find(|(suffix, _)| *suffix == ext_lower)
        .map(|(_, lang)| lang.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_diff_returns_empty_patch_set() {
        let patch = parse_unified_diff("").unwrap();
        assert!(patch.files.is_empty());
    }

    #[test]
    fn whitespace_only_diff_returns_empty_patch_set() {
        let patch = parse_unified_diff("   \n\n  ").unwrap();
        assert!(patch.files.is_empty());
    }

    #[test]
    fn single_file_single_hunk() {
        let diff = "\
diff --git a/src/main.rs b/src/main.rs
index abc1234..def5678 100644
--- a/src/main.rs
+++ b/src/main.rs
@@ -1,3 +1,4 @@
 fn main() {
+    println!(\"hello\");
     let x = 1;
 }
";
        let patch = parse_unified_diff(diff).unwrap();
        assert_eq!(patch.files.len(), 1);
        let file = &patch.files[0];
        assert_eq!(file.path, PathBuf::from("src/main.rs"));
        assert_eq!(file.language, "rust");
        assert_eq!(file.change_type, ChangeType::Modified);
        assert_eq!(file.hunks.len(), 1);
        assert_eq!(file.hunks[0].source_start, 1);
        assert_eq!(file.hunks[0].source_length, 3);
        assert_eq!(file.hunks[0].target_start, 1);
        assert_eq!(file.hunks[0].target_length, 4);
        assert!(file.hunks[0].content.starts_with("@@ -1,3 +1,4 @@\n"));
        assert_eq!(file.added_lines, 1);
        assert_eq!(file.deleted_lines, 0);
    }

    #[test]
    fn single_file_multiple_hunks() {
        let diff = "\
diff --git a/lib.rs b/lib.rs
--- a/lib.rs
+++ b/lib.rs
@@ -1,3 +1,4 @@
 fn foo() {
+    bar();
 }
@@ -10,3 +11,4 @@
 fn baz() {
+    qux();
 }
";
        let patch = parse_unified_diff(diff).unwrap();
        assert_eq!(patch.files.len(), 1);
        assert_eq!(patch.files[0].hunks.len(), 2);
        assert_eq!(patch.files[0].hunks[0].source_start, 1);
        assert_eq!(patch.files[0].hunks[1].source_start, 10);
    }

    #[test]
    fn multiple_files() {
        let diff = "\
diff --git a/a.rs b/a.rs
--- a/a.rs
+++ b/a.rs
@@ -1 +1,2 @@
 line1
+line2
diff --git a/b.rs b/b.rs
--- a/b.rs
+++ b/b.rs
@@ -1 +1,2 @@
 line1
+line2
";
        let patch = parse_unified_diff(diff).unwrap();
        assert_eq!(patch.files.len(), 2);
        assert_eq!(patch.files[0].path, PathBuf::from("a.rs"));
        assert_eq!(patch.files[1].path, PathBuf::from("b.rs"));
    }

    #[test]
    fn new_file_is_added() {
        let diff = "\
diff --git a/new.rs b/new.rs
new file mode 100644
--- /dev/null
+++ b/new.rs
@@ -0,0 +1,3 @@
+fn hello() {
+    println!(\"new\");
+}
";
        let patch = parse_unified_diff(diff).unwrap();
        assert_eq!(patch.files.len(), 1);
        let file = &patch.files[0];
        assert_eq!(file.change_type, ChangeType::Added);
        assert_eq!(file.path, PathBuf::from("new.rs"));
        assert!(file.old_path.is_none());
    }

    #[test]
    fn deleted_file_uses_old_path() {
        let diff = "\
diff --git a/old.rs b/old.rs
deleted file mode 100644
--- a/old.rs
+++ /dev/null
@@ -1,3 +0,0 @@
-fn goodbye() {
-    println!(\"old\");
-}
";
        let patch = parse_unified_diff(diff).unwrap();
        assert_eq!(patch.files.len(), 1);
        let file = &patch.files[0];
        assert_eq!(file.change_type, ChangeType::Deleted);
        assert_eq!(file.path, PathBuf::from("old.rs"));
        assert_eq!(file.deleted_lines, 3);
    }

    #[test]
    fn renamed_file_carries_old_path() {
        let diff = "\
diff --git a/old_name.rs b/new_name.rs
similarity index 100%
rename from old_name.rs
rename to new_name.rs
";
        let patch = parse_unified_diff(diff).unwrap();
        assert_eq!(patch.files.len(), 1);
        let file = &patch.files[0];
        assert_eq!(file.change_type, ChangeType::Renamed);
        assert_eq!(file.old_path.as_deref(), Some(PathBuf::from("old_name.rs").as_path()));
    }

    #[test]
    fn binary_files_have_no_hunks() {
        let diff = "\
diff --git a/image.png b/image.png
Binary files a/image.png and b/image.png differ
diff --git a/code.rs b/code.rs
--- a/code.rs
+++ b/code.rs
@@ -1 +1,2 @@
 line1
+line2
";
        let patch = parse_unified_diff(diff).unwrap();
        assert_eq!(patch.files.len(), 2);
        assert!(patch.files[0].is_binary);
        assert!(patch.files[0].hunks.is_empty());
        assert_eq!(patch.files[1].path, PathBuf::from("code.rs"));
    }

    #[test]
    fn no_newline_at_eof_is_not_content() {
        let diff = "\
diff --git a/f.rs b/f.rs
--- a/f.rs
+++ b/f.rs
@@ -1 +1 @@
-old
\\ No newline at end of file
+new
\\ No newline at end of file
";
        let patch = parse_unified_diff(diff).unwrap();
        assert_eq!(patch.files.len(), 1);
        let content = &patch.files[0].hunks[0].content;
        assert!(!content.contains("No newline"));
        assert!(content.contains("-old"));
        assert!(content.contains("+new"));
    }

    #[test]
    fn quoted_paths_are_parsed() {
        let diff = "--- \"a/src/my file.rs\"\n+++ \"b/src/my file.rs\"\n@@ -1 +1,2 @@\n old\n+new\n";
        let patch = parse_unified_diff(diff).unwrap();
        assert_eq!(patch.files.len(), 1);
        assert_eq!(patch.files[0].path, PathBuf::from("src/my file.rs"));
    }

    #[test]
    fn malformed_hunk_header_errors() {
        let diff = "diff --git a/f.rs b/f.rs\n--- a/f.rs\n+++ b/f.rs\n@@ garbage @@\n+x\n";
        let result = parse_unified_diff(diff);
        assert!(result.is_err());
    }

    #[test]
    fn language_detection_covers_common_suffixes() {
        assert_eq!(detect_language(std::path::Path::new("a.rs")), "rust");
        assert_eq!(detect_language(std::path::Path::new("a.py")), "python");
        assert_eq!(detect_language(std::path::Path::new("a.go")), "go");
        assert_eq!(detect_language(std::path::Path::new("a.ts")), "typescript");
        assert_eq!(detect_language(std::path::Path::new("a.unknownext")), "");
        assert_eq!(detect_language(std::path::Path::new("Makefile")), "");
    }

    #[test]
    fn real_world_fixture() {
        let diff = include_str!("../tests/fixtures/simple.diff");
        let patch = parse_unified_diff(diff).unwrap();
        assert!(!patch.files.is_empty());
        for file in &patch.files {
            assert!(!file.hunks.is_empty() || file.is_binary || file.change_type == ChangeType::Renamed);
        }
    }
}
