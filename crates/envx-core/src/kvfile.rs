//! Line-preserving `.env` body model
//!
//! A body is an ordered list of lines. Only assignment lines are ever
//! rewritten; comments, blank lines and unrecognised text are kept verbatim so
//! that a body renders back to exactly the bytes it was parsed from.

/// One line of an env file, without its terminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Blank(String),
    Comment(String),
    Assignment {
        /// Lookup key: text before `=`, trimmed, with any `export ` prefix removed
        key: String,
        /// Text before `=` exactly as written
        raw_key: String,
        /// Text after the first `=` exactly as written
        value: String,
    },
    /// Anything else (no `=`, not a comment)
    Other(String),
}

impl Line {
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Line::Blank(text.to_string());
        }
        if trimmed.starts_with('#') {
            return Line::Comment(text.to_string());
        }
        match text.split_once('=') {
            Some((raw_key, value)) => {
                let key = raw_key.trim();
                let key = key.strip_prefix("export ").map(str::trim).unwrap_or(key);
                if key.is_empty() {
                    Line::Other(text.to_string())
                } else {
                    Line::Assignment {
                        key: key.to_string(),
                        raw_key: raw_key.to_string(),
                        value: value.to_string(),
                    }
                }
            }
            None => Line::Other(text.to_string()),
        }
    }

    pub fn render(&self) -> String {
        match self {
            Line::Blank(s) | Line::Comment(s) | Line::Other(s) => s.clone(),
            Line::Assignment { raw_key, value, .. } => format!("{raw_key}={value}"),
        }
    }

    pub fn is_assignment(&self) -> bool {
        matches!(self, Line::Assignment { .. })
    }
}

/// Parsed env file body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValueBody {
    pub lines: Vec<Line>,
    /// Terminator of each line as found in the source: `"\n"`, `"\r\n"`, or
    /// `""` for a final line without one. Same length as `lines`.
    endings: Vec<&'static str>,
}

impl KeyValueBody {
    pub fn parse(text: &str) -> Self {
        let mut lines = Vec::new();
        let mut endings = Vec::new();
        for chunk in text.split_inclusive('\n') {
            let (content, ending) = if let Some(c) = chunk.strip_suffix("\r\n") {
                (c, "\r\n")
            } else if let Some(c) = chunk.strip_suffix('\n') {
                (c, "\n")
            } else {
                (chunk, "")
            };
            lines.push(Line::parse(content));
            endings.push(ending);
        }
        Self { lines, endings }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (line, ending) in self.lines.iter().zip(&self.endings) {
            out.push_str(&line.render());
            out.push_str(ending);
        }
        out
    }

    /// Iterate `(key, value)` pairs in file order.
    pub fn assignments(&self) -> impl Iterator<Item = (&str, &str)> {
        self.lines.iter().filter_map(|line| match line {
            Line::Assignment { key, value, .. } => Some((key.as_str(), value.as_str())),
            _ => None,
        })
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.assignments().any(|(k, _)| k == key)
    }

    /// Last assignment wins, matching how dotenv loaders resolve duplicates.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.assignments()
            .filter(|(k, _)| *k == key)
            .map(|(_, v)| v)
            .last()
    }
}

/// Strip one layer of matching single or double quotes from a value.
pub fn unquote(value: &str) -> &str {
    let v = value.trim();
    for q in ['"', '\''] {
        if v.len() >= 2 && v.starts_with(q) && v.ends_with(q) {
            return &v[1..v.len() - 1];
        }
    }
    v
}
