//! Appendable UTF-8 buffer with printf-style SQL escaping (§4.2).
//!
//! The host's formatter supports three SQLite-style conversions beyond plain text:
//! `%w` doubles embedded double quotes (for bare identifiers), `%Q` wraps the value in
//! single quotes and doubles embedded single quotes (or emits the literal `NULL`), and
//! `%q` doubles embedded single quotes without adding surrounding quotes. `append_str`
//! is the plain, unescaped path; the `sql_*` helpers below are the escaping ones.

/// Fixed or growable UTF-8 text buffer.
#[derive(Debug, Clone)]
pub struct StringBuffer {
    data: String,
    capacity: Option<usize>,
}

/// Raised when a fixed-capacity buffer would overflow on append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutOfMemory;

impl StringBuffer {
    /// A growable buffer with no capacity ceiling.
    pub fn growable() -> Self {
        StringBuffer {
            data: String::new(),
            capacity: None,
        }
    }

    /// A fixed buffer that rejects appends exceeding `capacity` bytes.
    pub fn fixed(capacity: usize) -> Self {
        StringBuffer {
            data: String::new(),
            capacity: Some(capacity),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_string(self) -> String {
        self.data
    }

    /// Append plain text, growing if necessary. On a fixed buffer that would overflow,
    /// copy the prefix that still fits and report `OutOfMemory` rather than truncating
    /// silently.
    pub fn append_str(&mut self, text: &str) -> Result<(), OutOfMemory> {
        match self.capacity {
            None => {
                self.data.push_str(text);
                Ok(())
            }
            Some(cap) => {
                let room = cap.saturating_sub(self.data.len());
                if text.len() <= room {
                    self.data.push_str(text);
                    Ok(())
                } else {
                    // Copy a whole-char prefix that still leaves room for callers who
                    // treat this buffer as null-terminated text.
                    let mut end = room.min(text.len());
                    while end > 0 && !text.is_char_boundary(end) {
                        end -= 1;
                    }
                    self.data.push_str(&text[..end]);
                    Err(OutOfMemory)
                }
            }
        }
    }

    /// `%w` escaping: double embedded `"` so the value is safe inside a bare SQL
    /// identifier (e.g. a column name assembled into DDL).
    pub fn append_identifier(&mut self, value: &str) -> Result<(), OutOfMemory> {
        self.append_str(&value.replace('"', "\"\""))
    }

    /// `%Q` escaping: a SQL string literal, or the bare keyword `NULL` for `None`.
    pub fn append_quoted(&mut self, value: Option<&str>) -> Result<(), OutOfMemory> {
        match value {
            None => self.append_str("NULL"),
            Some(v) => {
                self.append_str("'")?;
                self.append_str(&v.replace('\'', "''"))?;
                self.append_str("'")
            }
        }
    }

    /// `%q` escaping: double embedded `'` without adding the surrounding quotes.
    pub fn append_escaped(&mut self, value: &str) -> Result<(), OutOfMemory> {
        self.append_str(&value.replace('\'', "''"))
    }
}

impl Default for StringBuffer {
    fn default() -> Self {
        Self::growable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growable_append_never_truncates() {
        let mut buf = StringBuffer::growable();
        buf.append_str("SELECT ").unwrap();
        buf.append_str("1").unwrap();
        assert_eq!(buf.as_str(), "SELECT 1");
    }

    #[test]
    fn fixed_append_reports_out_of_memory_without_losing_what_fits() {
        let mut buf = StringBuffer::fixed(5);
        assert_eq!(buf.append_str("hello world"), Err(OutOfMemory));
        assert_eq!(buf.as_str(), "hello");
    }

    #[test]
    fn sql_quoting_variants() {
        let mut buf = StringBuffer::growable();
        buf.append_quoted(Some("O'Brien")).unwrap();
        assert_eq!(buf.as_str(), "'O''Brien'");

        let mut buf = StringBuffer::growable();
        buf.append_quoted(None).unwrap();
        assert_eq!(buf.as_str(), "NULL");

        let mut buf = StringBuffer::growable();
        buf.append_identifier("weird\"name").unwrap();
        assert_eq!(buf.as_str(), "weird\"\"name");
    }
}
