//! Binary and text encodings shared by the two matrix types.
//!
//! Binary: one or two `i32` dimensions, then the elements in native byte order.
//! Text: whitespace separated tokens, `rows cols` first.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::str::{FromStr, SplitWhitespace};

use super::Element;
use crate::error::{Error, Result};

pub(crate) fn write_binary<T: Element>(path: &Path, header: &[i32], values: &[T]) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::write(path, e))?;
    let mut out = BufWriter::new(file);
    for dim in header {
        out.write_all(&dim.to_ne_bytes())
            .map_err(|e| Error::write(path, e))?;
    }
    out.write_all(bytemuck::cast_slice(values))
        .map_err(|e| Error::write(path, e))?;
    out.flush().map_err(|e| Error::write(path, e))
}

/// Reader over a binary matrix file that knows how many bytes are left, so a
/// corrupt header cannot trigger a huge allocation.
pub(crate) struct BinaryReader<'a> {
    path: &'a Path,
    input: BufReader<File>,
    remaining: u64,
}

impl<'a> BinaryReader<'a> {
    pub(crate) fn open(path: &'a Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::read(path, e))?;
        let remaining = file.metadata().map_err(|e| Error::read(path, e))?.len();
        Ok(Self {
            path,
            input: BufReader::new(file),
            remaining,
        })
    }

    pub(crate) fn dimension(&mut self, what: &'static str) -> Result<usize> {
        let mut buf = [0u8; 4];
        self.input
            .read_exact(&mut buf)
            .map_err(|e| Error::read(self.path, e))?;
        self.remaining = self.remaining.saturating_sub(4);
        let value = i32::from_ne_bytes(buf);
        usize::try_from(value).map_err(|_| Error::InvalidDimension {
            path: self.path.to_path_buf(),
            what,
            value: value.into(),
        })
    }

    pub(crate) fn elements<T: Element>(&mut self, count: usize) -> Result<Vec<T>> {
        let size = std::mem::size_of::<T>();
        let available = usize::try_from(self.remaining / size as u64).unwrap_or(usize::MAX);
        if available < count {
            return Err(Error::Truncated {
                path: self.path.to_path_buf(),
                expected: count,
                read: available,
            });
        }
        let mut values = vec![T::zero(); count];
        self.input
            .read_exact(bytemuck::cast_slice_mut(&mut values))
            .map_err(|e| Error::read(self.path, e))?;
        self.remaining -= (count * size) as u64;
        Ok(values)
    }
}

pub(crate) fn write_text<T, F>(
    path: &Path,
    rows: usize,
    cols: usize,
    precision: usize,
    get: F,
) -> Result<()>
where
    T: Element,
    F: Fn(usize, usize) -> T,
{
    let file = File::create(path).map_err(|e| Error::write(path, e))?;
    let mut out = BufWriter::new(file);
    writeln!(out, "{rows}\t{cols}").map_err(|e| Error::write(path, e))?;
    if rows > 0 && cols > 0 {
        for i in 0..rows {
            let line: Vec<String> = (0..cols).map(|j| get(i, j).to_text(precision)).collect();
            writeln!(out, "{}", line.join("\t")).map_err(|e| Error::write(path, e))?;
        }
    }
    out.flush().map_err(|e| Error::write(path, e))
}

pub(crate) fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::read(path, e))
}

pub(crate) struct TextTokens<'a> {
    path: &'a Path,
    tokens: SplitWhitespace<'a>,
}

impl<'a> TextTokens<'a> {
    pub(crate) fn new(path: &'a Path, text: &'a str) -> Self {
        Self {
            path,
            tokens: text.split_whitespace(),
        }
    }

    pub(crate) fn next<V: FromStr>(&mut self) -> Result<V> {
        let token = self.tokens.next().ok_or_else(|| Error::UnexpectedEnd {
            path: self.path.to_path_buf(),
        })?;
        token.parse().map_err(|_| Error::Parse {
            path: self.path.to_path_buf(),
            token: token.to_string(),
        })
    }

    /// Number of elements in a `rows x cols` body, checked against the tokens
    /// still in the file before anything is allocated.
    pub(crate) fn element_count(&self, rows: usize, cols: usize) -> Result<usize> {
        let count = rows.checked_mul(cols).ok_or_else(|| Error::InvalidDimension {
            path: self.path.to_path_buf(),
            what: "number of elements",
            value: i64::try_from(rows).unwrap_or(i64::MAX),
        })?;
        let available = self.tokens.clone().count();
        if available < count {
            return Err(Error::Truncated {
                path: self.path.to_path_buf(),
                expected: count,
                read: available,
            });
        }
        Ok(count)
    }

    pub(crate) fn dimension(&mut self, what: &'static str) -> Result<usize> {
        let value: i64 = self.next()?;
        usize::try_from(value).map_err(|_| Error::InvalidDimension {
            path: self.path.to_path_buf(),
            what,
            value,
        })
    }
}
