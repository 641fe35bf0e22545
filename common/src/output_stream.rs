use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputLevel {
    Info,
    Warn,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLine {
    pub level: OutputLevel,
    pub text: String,
}

/// Shared, append-only record of user-facing messages.
#[derive(Debug, Default, Clone)]
pub struct OutputStream(Arc<Mutex<Vec<OutputLine>>>);

impl OutputStream {
    pub fn new() -> Self {
        OutputStream(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn write<S: Into<String>>(&self, level: OutputLevel, s: S) {
        self.0.lock().push(OutputLine {
            level,
            text: s.into(),
        });
    }

    pub fn take(&self) -> Vec<OutputLine> {
        std::mem::take(&mut self.0.lock())
    }

    pub fn lines(&self) -> Vec<OutputLine> {
        self.0.lock().clone()
    }

    pub fn count(&self, level: OutputLevel) -> usize {
        self.0.lock().iter().filter(|line| line.level == level).count()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.0.lock().iter().any(|line| line.text.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_same_buffer() {
        let stream = OutputStream::new();
        let writer = stream.clone();
        writer.write(OutputLevel::Info, "saving masks");
        writer.write(OutputLevel::Warn, "no spot in frame 3");

        assert_eq!(stream.count(OutputLevel::Warn), 1);
        assert!(stream.contains("frame 3"));

        let lines = stream.take();
        assert_eq!(lines.len(), 2);
        assert!(stream.lines().is_empty());
    }
}
