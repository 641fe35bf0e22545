pub trait TailLines {
    /// Returns the suffix holding at most `count` lines, without the final line break.
    fn tail_lines(&self, count: usize) -> &str;
}

impl TailLines for str {
    fn tail_lines(&self, count: usize) -> &str {
        let trimmed = self.trim_end_matches(['\n', '\r']);
        if count == 0 {
            return &trimmed[trimmed.len()..];
        }

        let bytes = trimmed.as_bytes();
        let mut seen = 0;
        let mut idx = bytes.len();
        while idx > 0 {
            if bytes[idx - 1] == b'\n' {
                seen += 1;
                if seen == count {
                    break;
                }
            }
            idx -= 1;
        }
        &trimmed[idx..]
    }
}

impl TailLines for String {
    fn tail_lines(&self, count: usize) -> &str {
        self.as_str().tail_lines(count)
    }
}
