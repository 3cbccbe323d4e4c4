/*!
Files written by the sampler.

- The chain file `<root>.txt`: one line per sweep,
  `1<TAB>-2lnL<TAB>param_0<TAB>...<TAB>param_{n-1}`. The leading `1` is the
  repeat count of the row.
- The paramnames file `<root>.paramnames`: `name<TAB>name` per parameter.
- The resume file `<root>resume.dat`: a binary checkpoint, see [`ResumeState`].

# Examples

```rust
use cosmo_mcmc::io::ChainWriter;

let dir = tempfile::tempdir()?;
let path = dir.path().join("chain.txt");
let mut chain = ChainWriter::create(&path)?;
chain.write_row(3.5, &[0.25, -1.0])?;
chain.close()?;
assert_eq!(std::fs::read_to_string(&path)?, "1\t3.5\t0.25\t-1\n");
# Ok::<(), Box<dyn std::error::Error>>(())
```
*/

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::mem::size_of;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Trailing marker of a complete resume file.
pub const RESUME_CODE: i32 = 123456;

/// Appends rows to the chain text file.
#[derive(Debug)]
pub struct ChainWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl ChainWriter {
    /// Opens the chain file, discarding previous contents.
    pub fn create(path: &Path) -> Result<Self> {
        Self::open(path, false)
    }

    /// Opens the chain file for appending, creating it if needed.
    pub fn append(path: &Path) -> Result<Self> {
        Self::open(path, true)
    }

    fn open(path: &Path, append: bool) -> Result<Self> {
        let mut options = OpenOptions::new();
        if append {
            options.append(true).create(true);
        } else {
            options.write(true).create(true).truncate(true);
        }
        let file = options.open(path).map_err(|e| Error::write(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_row(&mut self, likelihood: f64, params: &[f64]) -> Result<()> {
        write!(self.out, "1\t{likelihood}").map_err(|e| Error::write(&self.path, e))?;
        for p in params {
            write!(self.out, "\t{p}").map_err(|e| Error::write(&self.path, e))?;
        }
        writeln!(self.out).map_err(|e| Error::write(&self.path, e))
    }

    /// Closes and reopens the file in append mode so that everything written so
    /// far reaches the disk.
    pub fn reopen(&mut self) -> Result<()> {
        self.out.flush().map_err(|e| Error::write(&self.path, e))?;
        *self = Self::append(&self.path)?;
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        self.out.flush().map_err(|e| Error::write(&self.path, e))
    }
}

/// Writes `name<TAB>name` for every parameter.
pub fn write_param_names(path: &Path, names: &[String]) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::write(path, e))?;
    let mut out = BufWriter::new(file);
    for name in names {
        writeln!(out, "{name}\t{name}").map_err(|e| Error::write(path, e))?;
    }
    out.flush().map_err(|e| Error::write(path, e))
}

/**
Everything needed to continue a chain after the process was killed.

Binary layout, native byte order, no padding:

| field                | type      |
|----------------------|-----------|
| `max_chain_length`   | `u64`     |
| `iteration`          | `u64`     |
| `current_likelihood` | `f64`     |
| `current_prior`      | `f64`     |
| `current`            | `[f64; n]`|
| `previous`           | `[f64; n]`|
| `param_sum`          | `[f64; n]`|
| `param_squared_sum`  | `[f64; n]`|
| `lag1_cross_sum`     | `[f64; n]`|
| code                 | `i32` = [`RESUME_CODE`] |

The code is written last, so a file cut short while writing is detected.
*/
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeState {
    pub max_chain_length: u64,
    pub iteration: u64,
    pub current_likelihood: f64,
    pub current_prior: f64,
    pub current: Vec<f64>,
    pub previous: Vec<f64>,
    pub param_sum: Vec<f64>,
    pub param_squared_sum: Vec<f64>,
    pub lag1_cross_sum: Vec<f64>,
}

impl ResumeState {
    /// Size in bytes of a resume file for `n` parameters.
    pub fn encoded_len(n: usize) -> usize {
        2 * size_of::<u64>() + 2 * size_of::<f64>() + 5 * n * size_of::<f64>() + size_of::<i32>()
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let n = self.current.len();
        let mut bytes = Vec::with_capacity(Self::encoded_len(n));
        bytes.extend_from_slice(&self.max_chain_length.to_ne_bytes());
        bytes.extend_from_slice(&self.iteration.to_ne_bytes());
        bytes.extend_from_slice(&self.current_likelihood.to_ne_bytes());
        bytes.extend_from_slice(&self.current_prior.to_ne_bytes());
        for values in [
            &self.current,
            &self.previous,
            &self.param_sum,
            &self.param_squared_sum,
            &self.lag1_cross_sum,
        ] {
            assert_eq!(values.len(), n, "resume vectors must all have {n} entries");
            bytes.extend_from_slice(bytemuck::cast_slice(values.as_slice()));
        }
        bytes.extend_from_slice(&RESUME_CODE.to_ne_bytes());
        std::fs::write(path, bytes).map_err(|e| Error::write(path, e))
    }

    /// Reads the checkpoint of a chain with `n` parameters.
    ///
    /// `Ok(None)` if there is no file. A short file or a wrong trailing code is an
    /// error.
    pub fn read(path: &Path, n: usize) -> Result<Option<Self>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::read(path, e)),
        };
        let expected = Self::encoded_len(n);
        if bytes.len() < expected {
            return Err(Error::Truncated {
                path: path.to_path_buf(),
                expected,
                read: bytes.len(),
            });
        }

        let mut fields = Fields { bytes: &bytes };
        let state = Self {
            max_chain_length: fields.scalar(),
            iteration: fields.scalar(),
            current_likelihood: fields.scalar(),
            current_prior: fields.scalar(),
            current: fields.vector(n),
            previous: fields.vector(n),
            param_sum: fields.vector(n),
            param_squared_sum: fields.vector(n),
            lag1_cross_sum: fields.vector(n),
        };
        let code: i32 = fields.scalar();
        if code != RESUME_CODE {
            return Err(Error::CorruptResume {
                path: path.to_path_buf(),
                code,
            });
        }
        Ok(Some(state))
    }
}

/// Consumes fixed-size fields from the front of a buffer whose length was
/// already checked.
struct Fields<'a> {
    bytes: &'a [u8],
}

impl<'a> Fields<'a> {
    fn take(&mut self, len: usize) -> &'a [u8] {
        let (head, rest) = self.bytes.split_at(len);
        self.bytes = rest;
        head
    }

    fn scalar<T: bytemuck::Pod>(&mut self) -> T {
        bytemuck::pod_read_unaligned(self.take(size_of::<T>()))
    }

    fn vector(&mut self, n: usize) -> Vec<f64> {
        self.take(n * size_of::<f64>())
            .chunks_exact(size_of::<f64>())
            .map(bytemuck::pod_read_unaligned::<f64>)
            .collect()
    }
}
