//! Escaping for each context a user-controlled string can end up in.
//!
//! A filter graph is parsed twice by the engine. The graph parser first cuts
//! it into filters and unescapes each filter's argument string (level 2),
//! then the filter splits that string on `:` into options and unescapes each
//! value (level 1). A value therefore goes through [`filter_option_value`]
//! first and the assembled argument string through [`filtergraph_args`].

use std::path::Path;

use greensub_common::error::{GreensubError, GreensubResult};

/// Characters that end an option value or change how it is read.
const OPTION_SPECIAL: &[char] = &['\\', '\'', ':'];

/// Characters the graph parser treats as structure inside filter arguments.
const GRAPH_SPECIAL: &[char] = &['\\', '\'', '[', ']', ',', ';'];

/// Escape a single option value for use inside a filter's argument list.
pub fn filter_option_value(value: &str) -> String {
    escape_with(value, OPTION_SPECIAL)
}

/// Escape a filter's complete argument string for embedding in a graph.
pub fn filtergraph_args(args: &str) -> String {
    escape_with(args, GRAPH_SPECIAL)
}

fn escape_with(input: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    for c in input.chars() {
        if special.contains(&c) || c.is_whitespace() {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// A path as UTF-8 text, or a validation error naming `field`.
pub fn utf8_path<'a>(path: &'a Path, field: &str) -> GreensubResult<&'a str> {
    path.to_str().ok_or_else(|| {
        GreensubError::validation(
            field,
            format!("{} is not valid UTF-8", path.display()),
        )
    })
}

/// A path passed as its own argv entry (input or output).
///
/// The `file:` protocol prefix keeps names that contain `:` or start with
/// `-` from being read as a protocol or an option.
pub fn path_argument(path: &Path, field: &str) -> GreensubResult<String> {
    let text = utf8_path(path, field)?;
    if text.is_empty() {
        return Err(GreensubError::validation(field, "path is empty"));
    }
    Ok(format!("file:{text}"))
}
