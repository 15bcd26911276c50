/// How a line relates the "before" and "after" versions of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Added,
    Removed,
    Unchanged,
}

impl LineKind {
    /// Prefix used for this kind in unified-diff output.
    pub fn marker(self) -> char {
        match self {
            LineKind::Added => '+',
            LineKind::Removed => '-',
            LineKind::Unchanged => ' ',
        }
    }
}

/// A classified line. `text` keeps its line terminator so both versions can
/// be rebuilt byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub kind: LineKind,
    pub text: String,
}

impl DiffLine {
    pub fn added(text: &str) -> Self {
        Self {
            kind: LineKind::Added,
            text: text.to_string(),
        }
    }

    pub fn removed(text: &str) -> Self {
        Self {
            kind: LineKind::Removed,
            text: text.to_string(),
        }
    }

    pub fn unchanged(text: &str) -> Self {
        Self {
            kind: LineKind::Unchanged,
            text: text.to_string(),
        }
    }

    /// Text without its trailing "\n" or "\r\n".
    pub fn content(&self) -> &str {
        let text = self.text.strip_suffix('\n').unwrap_or(&self.text);
        text.strip_suffix('\r').unwrap_or(text)
    }
}

/// Line-level diff of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// File path (e.g., "/src/auth/config.rs")
    pub path: String,
    pub lines: Vec<DiffLine>,
}

impl FileDiff {
    /// Rebuild the "before" version from removed and unchanged lines.
    pub fn before(&self) -> String {
        self.collect(LineKind::Removed)
    }

    /// Rebuild the "after" version from added and unchanged lines.
    pub fn after(&self) -> String {
        self.collect(LineKind::Added)
    }

    pub fn additions(&self) -> usize {
        self.count(LineKind::Added)
    }

    pub fn deletions(&self) -> usize {
        self.count(LineKind::Removed)
    }

    fn collect(&self, side: LineKind) -> String {
        self.lines
            .iter()
            .filter(|l| l.kind == side || l.kind == LineKind::Unchanged)
            .map(|l| l.text.as_str())
            .collect()
    }

    fn count(&self, kind: LineKind) -> usize {
        self.lines.iter().filter(|l| l.kind == kind).count()
    }
}
