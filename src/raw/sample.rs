use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use image::{DynamicImage, ImageBuffer};
use std::fmt::Debug;
use std::io::{self, Read, Write};

/// Channel sample type of an RGB plane: `u8`, or `u16` for high-fidelity builds.
pub trait Sample: image::Primitive + Debug + Send + Sync + 'static {
    /// Size of one sample in an interchange stream.
    const BYTES: usize;

    fn to_unit(self) -> f32;

    /// Quantise a [0, 1] value, clamping anything outside (NaN maps to 0).
    fn from_unit(value: f32) -> Self;

    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self>;

    fn write_to<W: Write>(self, writer: &mut W) -> io::Result<()>;

    /// Interleaved RGB samples of a decoded image.
    fn rgb_samples(image: DynamicImage) -> Vec<Self>;

    /// Wrap single-channel samples; `None` if the length is wrong.
    fn luma_image(width: u32, height: u32, samples: Vec<Self>) -> Option<DynamicImage>;

    /// Wrap interleaved RGB samples; `None` if the length is wrong.
    fn rgb_image(width: u32, height: u32, samples: Vec<Self>) -> Option<DynamicImage>;
}

fn quantise(value: f32, max: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    (value.clamp(0.0, 1.0) * max).round()
}

impl Sample for u8 {
    const BYTES: usize = 1;

    fn to_unit(self) -> f32 {
        self as f32 / u8::MAX as f32
    }

    fn from_unit(value: f32) -> Self {
        quantise(value, u8::MAX as f32) as u8
    }

    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        reader.read_u8()
    }

    fn write_to<W: Write>(self, writer: &mut W) -> io::Result<()> {
        writer.write_u8(self)
    }

    fn rgb_samples(image: DynamicImage) -> Vec<Self> {
        image.into_rgb8().into_raw()
    }

    fn luma_image(width: u32, height: u32, samples: Vec<Self>) -> Option<DynamicImage> {
        ImageBuffer::from_raw(width, height, samples).map(DynamicImage::ImageLuma8)
    }

    fn rgb_image(width: u32, height: u32, samples: Vec<Self>) -> Option<DynamicImage> {
        ImageBuffer::from_raw(width, height, samples).map(DynamicImage::ImageRgb8)
    }
}

impl Sample for u16 {
    const BYTES: usize = 2;

    fn to_unit(self) -> f32 {
        self as f32 / u16::MAX as f32
    }

    fn from_unit(value: f32) -> Self {
        quantise(value, u16::MAX as f32) as u16
    }

    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        reader.read_u16::<LittleEndian>()
    }

    fn write_to<W: Write>(self, writer: &mut W) -> io::Result<()> {
        writer.write_u16::<LittleEndian>(self)
    }

    fn rgb_samples(image: DynamicImage) -> Vec<Self> {
        image.into_rgb16().into_raw()
    }

    fn luma_image(width: u32, height: u32, samples: Vec<Self>) -> Option<DynamicImage> {
        ImageBuffer::from_raw(width, height, samples).map(DynamicImage::ImageLuma16)
    }

    fn rgb_image(width: u32, height: u32, samples: Vec<Self>) -> Option<DynamicImage> {
        ImageBuffer::from_raw(width, height, samples).map(DynamicImage::ImageRgb16)
    }
}

/// Sample width of interchange files and ground-truth outputs in this build.
#[cfg(feature = "sample16")]
pub type BuildSample = u16;
#[cfg(not(feature = "sample16"))]
pub type BuildSample = u8;
