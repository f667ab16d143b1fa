use thiserror::Error;

pub const MAX_HEADERS: usize = 30;
pub const MAX_LINE_LEN: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitError {
    #[error("header line too long: {actual} bytes (max {max})")]
    LineTooLong { max: usize, actual: usize },
    #[error("too many header lines: {actual} (max {max})")]
    TooManyHeaders { max: usize, actual: usize },
}

pub type LimitResult<T> = Result<T, LimitError>;

/// Bounds on a single header block. Both are fatal when exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLimits {
    pub max_headers: usize,
    pub max_line_len: usize,
}

impl Default for HeaderLimits {
    fn default() -> Self {
        Self { max_headers: MAX_HEADERS, max_line_len: MAX_LINE_LEN }
    }
}

impl HeaderLimits {
    pub fn enforce_line_len(&self, len: usize) -> LimitResult<()> {
        if len > self.max_line_len {
            return Err(LimitError::LineTooLong { max: self.max_line_len, actual: len });
        }
        Ok(())
    }

    pub fn enforce_header_count(&self, count: usize) -> LimitResult<()> {
        if count > self.max_headers {
            return Err(LimitError::TooManyHeaders { max: self.max_headers, actual: count });
        }
        Ok(())
    }
}
