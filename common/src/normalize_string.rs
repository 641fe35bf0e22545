pub trait NormalizeString {
    /// Turns `\r\n` and bare `\r` into `\n` and guarantees a trailing `\n`.
    fn normalize(&self) -> String;
}

impl NormalizeString for str {
    fn normalize(&self) -> String {
        let mut out = String::with_capacity(self.len() + 1);
        let mut chars = self.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '\r' {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            } else {
                out.push(c);
            }
        }

        if !out.ends_with('\n') {
            out.push('\n');
        }
        out
    }
}

impl NormalizeString for String {
    fn normalize(&self) -> String {
        self.as_str().normalize()
    }
}
