//! In-process unified diff handling built on `diffy`.
//!
//! Used by the builtin runner and by already-applied detection. Only the
//! single-file unified format that `diff -u` and `git diff` emit is handled.

use anyhow::Context;
use camino::Utf8Path;
use diffy::Patch;
use fs_err as fs;

/// Read a patch file, dropping any preamble before the first `--- ` header.
///
/// `git diff` output starts with `diff --git` and `index` lines that `diffy`
/// does not accept.
pub fn load_patch(path: &Utf8Path) -> anyhow::Result<String> {
    let text = fs::read_to_string(path).with_context(|| format!("read patch {}", path))?;
    Ok(strip_preamble(&text).to_string())
}

fn strip_preamble(text: &str) -> &str {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.starts_with("--- ") {
            return &text[offset..];
        }
        offset += line.len();
    }
    text
}

fn parse(patch_text: &str) -> anyhow::Result<Patch<'_, str>> {
    Patch::from_str(patch_text).context("parse unified diff")
}

/// Apply `patch_text` to `original` in memory.
pub fn apply_to_content(original: &str, patch_text: &str) -> anyhow::Result<String> {
    let patch = parse(patch_text)?;
    diffy::apply(original, &patch).context("patch does not apply")
}

/// True when `current` already holds the patched content: the reversed patch
/// applies cleanly and the forward patch does not.
///
/// Unparseable patches are never considered applied.
pub fn is_already_applied(current: &str, patch_text: &str) -> bool {
    let Ok(patch) = parse(patch_text) else {
        return false;
    };
    if diffy::apply(current, &patch).is_ok() {
        return false;
    }
    diffy::apply(current, &patch.reverse()).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BEFORE: &str = "void uartBegin() {\n    uart->dev->conf1.rxfifo_full_thrhd = 112;\n}\n";
    const AFTER: &str = "void uartBegin() {\n    uart->dev->conf1.rxfifo_full_thrhd = 1;\n}\n";

    fn patch_text() -> String {
        diffy::create_patch(BEFORE, AFTER).to_string()
    }

    #[test]
    fn applies_forward() {
        let out = apply_to_content(BEFORE, &patch_text()).expect("apply");
        assert_eq!(out, AFTER);
    }

    #[test]
    fn forward_fails_on_patched_content() {
        let err = apply_to_content(AFTER, &patch_text()).expect_err("already patched");
        assert!(err.to_string().contains("does not apply"));
    }

    #[test]
    fn detects_applied_state() {
        let patch = patch_text();
        assert!(is_already_applied(AFTER, &patch));
        assert!(!is_already_applied(BEFORE, &patch));
    }

    #[test]
    fn unrelated_content_is_not_applied() {
        assert!(!is_already_applied("int main() {}\n", &patch_text()));
    }

    #[test]
    fn garbage_patch_is_not_applied() {
        assert!(!is_already_applied(AFTER, "@@ this is not a hunk"));
    }

    #[test]
    fn strips_git_preamble() {
        let text = format!(
            "diff --git a/cores/esp32/esp32-hal-uart.c b/cores/esp32/esp32-hal-uart.c\nindex 1111111..2222222 100644\n{}",
            patch_text()
        );
        let stripped = strip_preamble(&text);
        assert!(stripped.starts_with("--- "));
        assert_eq!(apply_to_content(BEFORE, stripped).expect("apply"), AFTER);
    }

    #[test]
    fn text_without_header_is_kept() {
        assert_eq!(strip_preamble("@@ -1 +1 @@\n-a\n+b\n"), "@@ -1 +1 @@\n-a\n+b\n");
    }
}
