//! `.npy` persistence of the training arrays
//!
//! Files are NPY format 1.0: magic, a Python-literal header dict padded to a
//! 64-byte boundary, then raw little-endian data in C order. Only plain
//! numeric dtypes are written, never pickled objects.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use ndarray::{Array2, ArrayBase, Data, Dimension};

use crate::error::{PrepError, Result};
use crate::processing::quantize::QuantizedWaveform;

const MAGIC: &[u8] = b"\x93NUMPY";
const HEADER_ALIGN: usize = 64;

/// Numeric element that can be stored in an `.npy` file.
pub trait NpyElement: Copy {
    const DESCR: &'static str;
    const SIZE: usize;

    fn write_le<W: Write>(&self, out: &mut W) -> std::io::Result<()>;
    fn from_le(bytes: &[u8]) -> Self;
}

impl NpyElement for f32 {
    const DESCR: &'static str = "<f4";
    const SIZE: usize = 4;

    fn write_le<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_all(&self.to_le_bytes())
    }

    fn from_le(bytes: &[u8]) -> Self {
        f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl NpyElement for i16 {
    const DESCR: &'static str = "<i2";
    const SIZE: usize = 2;

    fn write_le<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_all(&self.to_le_bytes())
    }

    fn from_le(bytes: &[u8]) -> Self {
        i16::from_le_bytes([bytes[0], bytes[1]])
    }
}

/// Parsed header of an `.npy` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpyHeader {
    pub descr: String,
    pub shape: Vec<usize>,
}

fn shape_literal(shape: &[usize]) -> String {
    match shape {
        [n] => format!("({},)", n),
        dims => format!(
            "({})",
            dims.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
        ),
    }
}

fn encode_header(descr: &str, shape: &[usize]) -> Vec<u8> {
    let dict = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        descr,
        shape_literal(shape)
    );
    // magic + version + u16 length + dict + trailing newline
    let unpadded = MAGIC.len() + 2 + 2 + dict.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    let header_len = dict.len() + padding + 1;

    let mut out = Vec::with_capacity(unpadded + padding);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header_len as u16).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out.extend(std::iter::repeat(b' ').take(padding));
    out.push(b'\n');
    out
}

/// Write `array` in C order.
pub fn write_npy<P, T, S, D>(path: P, array: &ArrayBase<S, D>) -> Result<()>
where
    P: AsRef<Path>,
    T: NpyElement,
    S: Data<Elem = T>,
    D: Dimension,
{
    let path = path.as_ref();
    let file = File::create(path)
        .map_err(|e| PrepError::io(format!("Cannot create {}: {}", path.display(), e)))?;
    let mut writer = BufWriter::new(file);

    writer.write_all(&encode_header(T::DESCR, array.shape()))?;
    for value in array.iter() {
        value.write_le(&mut writer)?;
    }
    writer.flush()?;
    Ok(())
}

fn parse_header(dict: &str) -> Result<NpyHeader> {
    let malformed = || PrepError::io(format!("Malformed npy header: {}", dict.trim()));

    let descr_start = dict.find("'descr':").ok_or_else(malformed)? + "'descr':".len();
    let descr = dict[descr_start..]
        .split('\'')
        .nth(1)
        .ok_or_else(malformed)?
        .to_string();

    if dict.contains("'fortran_order': True") {
        return Err(PrepError::io("Fortran-ordered npy arrays are not supported"));
    }

    let shape_start = dict.find("'shape':").ok_or_else(malformed)? + "'shape':".len();
    let open = dict[shape_start..].find('(').ok_or_else(malformed)? + shape_start;
    let close = dict[open..].find(')').ok_or_else(malformed)? + open;
    let shape = dict[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|dim| !dim.is_empty())
        .map(|dim| dim.parse::<usize>().map_err(|_| malformed()))
        .collect::<Result<Vec<_>>>()?;

    Ok(NpyHeader { descr, shape })
}

/// Read a version 1.0 `.npy` file written by [`write_npy`].
pub fn read_npy<P: AsRef<Path>, T: NpyElement>(path: P) -> Result<(NpyHeader, Vec<T>)> {
    let path = path.as_ref();
    let mut bytes = Vec::new();
    File::open(path)
        .map_err(|e| PrepError::io(format!("Cannot open {}: {}", path.display(), e)))?
        .read_to_end(&mut bytes)?;

    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err(PrepError::io(format!("{} is not a valid .npy file", path.display())));
    }
    if bytes[6] != 1 {
        return Err(PrepError::io(format!("Unsupported npy version {}.{}", bytes[6], bytes[7])));
    }

    let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
    let data_start = 10 + header_len;
    if bytes.len() < data_start {
        return Err(PrepError::io("Truncated npy header"));
    }
    let header = parse_header(&String::from_utf8_lossy(&bytes[10..data_start]))?;

    if header.descr != T::DESCR {
        return Err(PrepError::io(format!(
            "dtype mismatch: file holds {}, requested {}", header.descr, T::DESCR
        )));
    }

    let count: usize = header.shape.iter().product();
    let data = &bytes[data_start..];
    if data.len() != count * T::SIZE {
        return Err(PrepError::io(format!(
            "npy payload has {} bytes, shape {:?} needs {}", data.len(), header.shape, count * T::SIZE
        )));
    }

    let values = data.chunks_exact(T::SIZE).map(T::from_le).collect();
    Ok((header, values))
}

/// `<stem>-wave.npy`
pub fn wave_filename(stem: &str) -> String {
    format!("{}-wave.npy", stem)
}

/// `<stem>-feats.npy`
pub fn mel_filename(stem: &str) -> String {
    format!("{}-feats.npy", stem)
}

/// Save the encoded waveform in its contract dtype.
pub fn save_waveform<P: AsRef<Path>>(path: P, waveform: &QuantizedWaveform) -> Result<()> {
    match waveform {
        QuantizedWaveform::Codes(codes) => write_npy(path, codes),
        QuantizedWaveform::Samples(samples) => write_npy(path, samples),
    }
}

pub fn save_mel<P: AsRef<Path>>(path: P, mel: &Array2<f32>) -> Result<()> {
    write_npy(path, mel)
}
