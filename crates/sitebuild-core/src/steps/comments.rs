//! Comment stripping
//!
//! - JavaScript: parse with tree-sitter, drop every comment node
//! - HTML: drop `<!-- ... -->` blocks
//! - CSS: drop `/* ... */` blocks outside of string literals
//!
//! Anything else passes through untouched.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tree_sitter::{Node, Parser};

use super::{extension, Asset};
use crate::error::{BuildError, Result};

const STEP: &str = "strip_comments";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StripOptions {
    /// Keep `/*! ... */` blocks (license banners) in scripts and styles.
    pub preserve_license: bool,
}

pub(crate) fn strip(mut asset: Asset, options: &StripOptions) -> Result<Asset> {
    let ext = extension(&asset.path);
    let stripped = match ext.as_str() {
        "js" | "mjs" | "cjs" | "jsx" => strip_js(&asset.path, asset.text(STEP)?, options)?,
        "html" | "htm" => strip_html(&asset.path, asset.text(STEP)?)?,
        "css" => strip_css(asset.text(STEP)?, options),
        _ => return Ok(asset),
    };
    asset.contents = stripped.into_bytes();
    Ok(asset)
}

fn strip_js(path: &Path, source: &str, options: &StripOptions) -> Result<String> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_javascript::language())
        .map_err(|e| BuildError::transform(STEP, path, e))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| BuildError::transform(STEP, path, "parser returned no tree"))?;

    let mut comments = Vec::new();
    collect_comments(&tree.root_node(), &mut comments);

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for (start, end) in comments {
        let text = &source[start..end];
        if options.preserve_license && text.starts_with("/*!") {
            continue;
        }
        out.push_str(&source[cursor..start]);
        // A block comment spanning lines still terminates a statement under ASI
        if text.starts_with("/*") {
            out.push(if text.contains('\n') { '\n' } else { ' ' });
        }
        cursor = end;
    }
    out.push_str(&source[cursor..]);
    Ok(out)
}

fn collect_comments(node: &Node, out: &mut Vec<(usize, usize)>) {
    if node.kind().contains("comment") {
        out.push((node.start_byte(), node.end_byte()));
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_comments(&child, out);
    }
}

fn strip_html(path: &Path, source: &str) -> Result<String> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find("<!--") {
        out.push_str(&rest[..start]);
        let body = &rest[start + 4..];
        let Some(end) = body.find("-->") else {
            return Err(BuildError::transform(STEP, path, "unterminated <!-- comment"));
        };
        rest = &body[end + 3..];
    }
    out.push_str(rest);
    Ok(out)
}

fn strip_css(source: &str, options: &StripOptions) -> String {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len());
    let mut quote: Option<u8> = None;
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'/' && bytes.get(i + 1) == Some(&b'*') => {
                let end = source[i + 2..].find("*/").map(|e| i + 2 + e + 2).unwrap_or(bytes.len());
                let keep = options.preserve_license && bytes.get(i + 2) == Some(&b'!');
                if !keep {
                    out.push_str(&source[copied..i]);
                    copied = end;
                }
                i = end;
                continue;
            }
            None => {}
        }
        i += 1;
    }
    out.push_str(&source[copied.min(source.len())..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(path: &str, source: &str) -> String {
        let asset = Asset::new(path, source.as_bytes().to_vec());
        let out = strip(asset, &StripOptions::default()).unwrap();
        String::from_utf8(out.contents).unwrap()
    }

    #[test]
    fn test_js_line_and_block_comments_removed() {
        let out = run("a.js", "// header\nvar a = 1; /* inline */ var b = 2;\n");
        assert!(!out.contains("header"));
        assert!(!out.contains("inline"));
        assert!(out.contains("var a = 1;"));
        assert!(out.contains("var b = 2;"));
    }

    #[test]
    fn test_js_comment_markers_in_strings_survive() {
        let out = run("a.js", "var url = \"http://example.com\"; // trailing\n");
        assert!(out.contains("\"http://example.com\""));
        assert!(!out.contains("trailing"));
    }

    #[test]
    fn test_js_license_kept_when_requested() {
        let asset = Asset::new("a.js", b"/*! MIT */\nvar a = 1; // x\n".to_vec());
        let options = StripOptions { preserve_license: true };
        let out = strip(asset, &options).unwrap();
        let out = String::from_utf8(out.contents).unwrap();
        assert!(out.contains("/*! MIT */"));
        assert!(!out.contains("// x"));
    }

    #[test]
    fn test_html_comments_removed() {
        let out = run("index.html", "<div><!-- note --><p>x</p><!--\nmulti\n--></div>");
        assert_eq!(out, "<div><p>x</p></div>");
    }

    #[test]
    fn test_html_unterminated_comment_is_error() {
        let asset = Asset::new("index.html", b"<div><!-- open".to_vec());
        let err = strip(asset, &StripOptions::default()).unwrap_err();
        assert!(matches!(err, BuildError::Transform { .. }));
    }

    #[test]
    fn test_css_comments_removed_outside_strings() {
        let out = run("a.css", "a{content:\"/* keep */\"}/* drop */b{color:red}");
        assert_eq!(out, "a{content:\"/* keep */\"}b{color:red}");
    }

    #[test]
    fn test_other_files_untouched() {
        let out = run("data.txt", "// not a comment here");
        assert_eq!(out, "// not a comment here");
    }
}
