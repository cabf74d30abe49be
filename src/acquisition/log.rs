use std::fmt;

/// Append-only run log, written to `<prefix>-log.txt` verbatim.
///
/// Entries may span several lines. Rendering joins them with newlines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionLog {
    entries: Vec<String>,
}

impl AcquisitionLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn push(&mut self, entry: impl Into<String>) {
        self.entries.push(entry.into());
    }

    /// Append an empty separator line.
    pub fn blank(&mut self) {
        self.entries.push(String::new());
    }

    /// Append captured error text.
    pub fn error(&mut self, message: impl fmt::Display) {
        self.entries.push(format!("ERROR: {}", message));
    }

    /// The log as written to disk.
    pub fn render(&self) -> String {
        let mut text = self.entries.join("\n");
        text.push('\n');
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_keeps_order() {
        let mut log = AcquisitionLog::new();
        log.push("first");
        log.blank();
        log.error("stream error (code 1301): boom");
        assert_eq!(log.render(), "first\n\nERROR: stream error (code 1301): boom\n");
        assert_eq!(log.entries.len(), 3);
    }
}
