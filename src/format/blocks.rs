//! Line-oriented block structures: tables, lists and line breaks.

use std::sync::LazyLock;

use regex::Regex;

static ORDERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\.\s+(.*)$").expect("Invalid ordered item regex"));

static BULLET_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-\s+(.*)$").expect("Invalid bullet item regex"));

/// Line breaks directly before a block element's opening or closing tag.
static BREAK_BEFORE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:<br>)+(</?(?:h[1-6]|ul|ol|table|div|pre)[\s>])").expect("Invalid break regex")
});

/// Line breaks directly after a block element's closing tag.
static BREAK_AFTER_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(</(?:h[1-6]|ul|ol|table|div|pre)>)(?:<br>)+").expect("Invalid break regex")
});

// ============================================================================
// Tables
// ============================================================================

fn is_table_line(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

/// Split a table row on `|`, ignoring pipes inside closed `[CITE: ...]`
/// tokens. Any other bracket is ordinary cell text.
fn split_cells(line: &str) -> Vec<String> {
    let line = line.trim();
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = line.strip_suffix('|').unwrap_or(line);

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_citation = false;
    for (i, c) in line.char_indices() {
        match c {
            '[' if !in_citation && line[i..].starts_with("[CITE:") && line[i..].contains(']') => {
                in_citation = true;
                current.push(c);
            }
            ']' if in_citation => {
                in_citation = false;
                current.push(c);
            }
            '|' if !in_citation => cells.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    cells.push(current);
    cells.into_iter().map(|c| c.trim().to_string()).collect()
}

fn render_table(lines: &[&str]) -> String {
    let mut html = String::from("<table><thead><tr>");
    for cell in split_cells(lines[0]) {
        html.push_str(&format!("<th>{cell}</th>"));
    }
    html.push_str("</tr></thead><tbody>");
    for row in &lines[2..] {
        html.push_str("<tr>");
        for cell in split_cells(row) {
            html.push_str(&format!("<td>{cell}</td>"));
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    html
}

/// Convert `|`-led blocks whose second line is a `---` separator row.
///
/// Blocks without a separator row are left untouched.
pub fn tables(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        if !is_table_line(lines[i]) {
            out.push(lines[i].to_string());
            i += 1;
            continue;
        }

        let start = i;
        while i < lines.len() && is_table_line(lines[i]) {
            i += 1;
        }
        let block = &lines[start..i];

        if block.len() >= 2 && block[1].contains("---") {
            out.push(render_table(block));
        } else {
            out.extend(block.iter().map(|l| l.to_string()));
        }
    }

    out.join("\n")
}

// ============================================================================
// Lists
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Ordered,
    Bullet,
}

fn classify(line: &str) -> Option<(ListKind, &str)> {
    if let Some(caps) = ORDERED_ITEM.captures(line) {
        return caps.get(2).map(|m| (ListKind::Ordered, m.as_str()));
    }
    BULLET_ITEM
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| (ListKind::Bullet, m.as_str()))
}

fn ordered_start(line: &str) -> u64 {
    ORDERED_ITEM
        .captures(line)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(1)
}

/// Convert runs of `N.` lines to `<ol>` and runs of `-` lines to `<ul>`.
///
/// A run ends at the first line of a different kind, so an ordered run never
/// absorbs bullets and vice versa. Ordered lists keep their first number.
pub fn lists(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let Some((kind, _)) = classify(lines[i]) else {
            out.push(lines[i].to_string());
            i += 1;
            continue;
        };

        let mut html = match kind {
            ListKind::Ordered => match ordered_start(lines[i]) {
                1 => "<ol>".to_string(),
                n => format!("<ol start=\"{n}\">"),
            },
            ListKind::Bullet => "<ul>".to_string(),
        };

        while i < lines.len() {
            match classify(lines[i]) {
                Some((k, item)) if k == kind => {
                    html.push_str(&format!("<li>{}</li>", item.trim_end()));
                    i += 1;
                }
                _ => break,
            }
        }

        html.push_str(match kind {
            ListKind::Ordered => "</ol>",
            ListKind::Bullet => "</ul>",
        });
        out.push(html);
    }

    out.join("\n")
}

// ============================================================================
// Line breaks
// ============================================================================

/// Replace newlines with `<br>` outside `<pre>` regions, then drop breaks
/// that touch block elements.
pub fn line_breaks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find("<pre>") {
        out.push_str(&rest[..open].replace('\n', "<br>"));
        let region = &rest[open..];
        match region.find("</pre>") {
            Some(close) => {
                let end = close + "</pre>".len();
                out.push_str(&region[..end]);
                rest = &region[end..];
            }
            None => {
                out.push_str(region);
                rest = "";
            }
        }
    }
    out.push_str(&rest.replace('\n', "<br>"));

    let out = BREAK_BEFORE_BLOCK.replace_all(&out, "$1");
    BREAK_AFTER_BLOCK.replace_all(&out, "$1").into_owned()
}
