use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use super::{Source, SourceError};

const BLANKS: [char; 3] = [' ', '\t', '\x0c'];

/// Reads `key=value` pairs from a `.properties` file.
#[derive(Debug, Clone)]
pub struct PropertiesFileSource {
    path: PathBuf,
    name: String,
}

impl PropertiesFileSource {
    /// Creates a source for the file at `path`. The file is not opened until
    /// the source is read.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();

        Self { path, name }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Source for PropertiesFileSource {
    type Value = String;

    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<HashMap<String, String>, SourceError> {
        let text = fs::read_to_string(&self.path).map_err(|e| SourceError::io(&self.path, &e))?;
        let values = parse_properties(&text);

        debug!(source = %self.name, keys = values.len(), "read properties file");
        Ok(values)
    }
}

/// Parses properties text into a map.
///
/// Keys end at the first unescaped `=`, `:` or blank. Lines starting with
/// `#` or `!` are comments, a trailing odd run of backslashes joins the next
/// line, and `\t`, `\n`, `\r`, `\f` and `\uXXXX` escapes are decoded. When a
/// key repeats, the last occurrence wins.
pub fn parse_properties(text: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        let line = line.trim_start_matches(BLANKS);
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let mut logical = line.to_string();
        while continues(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start_matches(BLANKS)),
                None => break,
            }
        }

        let (key, value) = split_entry(&logical);
        values.insert(unescape(key), unescape(value.trim_end_matches(BLANKS)));
    }

    values
}

fn continues(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();

    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\x0c' => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let rest = line[key_end..].trim_start_matches(BLANKS);
    let rest = rest.strip_prefix(['=', ':']).unwrap_or(rest);

    (&line[..key_end], rest.trim_start_matches(BLANKS))
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }

    out
}
