use std::path::{Component, Path, PathBuf};

use eyre::{Context, Result};

/// Uppercases the first letter of every word and lowercases the rest. A word
/// starts after any character that is not a letter, so `p99-run` becomes
/// `P99-Run`.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_is_letter = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if prev_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(ch);
            prev_is_letter = false;
        }
    }
    out
}

/// `"php_version"` -> `"Php Version"`
pub fn humanize_key(key: &str) -> String {
    title_case(&key.replace('_', " "))
}

/// Splits `text` after its first `n` characters.
fn split_chars(text: &str, n: usize) -> (&str, &str) {
    match text.char_indices().nth(n) {
        Some((at, _)) => text.split_at(at),
        None => (text, ""),
    }
}

/// Greedy word wrap on whitespace. Words longer than `width` fill the rest of
/// the current line and continue in `width`-sized pieces.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for word in text.split_whitespace() {
        let mut rest = word;
        let mut rest_len = word.chars().count();
        if current_len > 0 && current_len + 1 + rest_len > width {
            let space_left = width.saturating_sub(current_len + 1);
            if rest_len > width && space_left > 0 {
                let (head, tail) = split_chars(rest, space_left);
                current.push(' ');
                current.push_str(head);
                rest = tail;
                rest_len -= space_left;
            }
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        while rest_len > width {
            let (head, tail) = split_chars(rest, width);
            lines.push(head.to_owned());
            rest = tail;
            rest_len -= width;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(rest);
        current_len += rest_len;
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Makes `path` absolute against the working directory and folds `.` and `..`
/// without touching the filesystem.
pub fn absolute_lexical(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path)
        .with_context(|| format!("Resolve absolute path of {}", path.display()))?;
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}

/// Path of `target` relative to the directory `base`, always using `/` as the
/// separator so it can be embedded in Markdown.
pub fn relative_path(target: &Path, base: &Path) -> Result<String> {
    let target = absolute_lexical(target)?;
    let base = absolute_lexical(base)?;

    let target_parts: Vec<_> = target.components().collect();
    let base_parts: Vec<_> = base.components().collect();
    let common = target_parts
        .iter()
        .zip(&base_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = vec!["..".to_owned(); base_parts.len() - common];
    parts.extend(
        target_parts[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    if parts.is_empty() {
        return Ok(".".to_owned());
    }
    Ok(parts.join("/"))
}
