//! Minimal binary container for moving an RGB plane to the `groundtruth`
//! process: `i32` width, `i32` height (little-endian), then
//! `width * height * 3` interleaved samples. No magic, no version, no
//! compression; reader and writer must agree on the sample width.

use crate::raw::{RgbPlane, Sample};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum InterchangeError {
    #[error("refusing to write an empty {0}x{1} plane")]
    EmptyPlane(u32, u32),
    #[error("invalid dimensions {0}x{1} in header")]
    InvalidDimensions(i32, i32),
    #[error("dimensions {0}x{1} do not fit the header")]
    Oversized(u32, u32),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub fn write_plane<S: Sample, W: Write>(
    writer: &mut W,
    plane: &RgbPlane<S>,
) -> Result<(), InterchangeError> {
    let (width, height) = plane.dimensions();
    if width == 0 || height == 0 || plane.is_empty() {
        return Err(InterchangeError::EmptyPlane(width, height));
    }
    let w = i32::try_from(width).map_err(|_| InterchangeError::Oversized(width, height))?;
    let h = i32::try_from(height).map_err(|_| InterchangeError::Oversized(width, height))?;

    writer.write_i32::<LittleEndian>(w)?;
    writer.write_i32::<LittleEndian>(h)?;
    for &sample in plane.samples() {
        sample.write_to(writer)?;
    }
    Ok(())
}

pub fn read_plane<S: Sample, R: Read>(reader: &mut R) -> Result<RgbPlane<S>, InterchangeError> {
    let w = reader.read_i32::<LittleEndian>()?;
    let h = reader.read_i32::<LittleEndian>()?;
    if w <= 0 || h <= 0 {
        return Err(InterchangeError::InvalidDimensions(w, h));
    }

    let len = w as usize * h as usize * 3;
    // Header is untrusted until the payload has been read.
    let mut samples = Vec::with_capacity(len.min(1 << 24));
    for _ in 0..len {
        samples.push(S::read_from(reader)?);
    }

    RgbPlane::new(w as u32, h as u32, samples)
        .map_err(|_| InterchangeError::InvalidDimensions(w, h))
}

pub fn save<S: Sample, P: AsRef<Path>>(
    path: P,
    plane: &RgbPlane<S>,
) -> Result<(), InterchangeError> {
    let path = path.as_ref();
    tracing::debug!("Writing interchange plane {}", path.display());
    let mut writer = BufWriter::new(File::create(path)?);
    write_plane(&mut writer, plane)?;
    writer.flush()?;
    Ok(())
}

pub fn load<S: Sample, P: AsRef<Path>>(path: P) -> Result<RgbPlane<S>, InterchangeError> {
    let path = path.as_ref();
    tracing::info!("Loading interchange plane {}", path.display());
    let mut reader = BufReader::new(File::open(path)?);
    read_plane(&mut reader)
}
