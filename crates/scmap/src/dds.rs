//! Adds support for the DirectDraw Surface containers embedded inside map
//! files, enough to locate the pixel payload and classify its format.
//!
//! A blob is the 4-byte `"DDS "` tag, the 124-byte surface header, and the
//! pixel payload. Nothing here decompresses block-compressed payloads; the
//! map operations only ever composite payloads whose formats already match.
//!
//! [`DdsSlice`] wraps a borrowed blob for reading, [`DdsSliceMut`] adds a
//! mutable payload view. Neither copies the header or the payload.

use bitflags::bitflags;
use snafu::prelude::*;
use zerocopy::{FromBytes, Immutable, KnownLayout, LittleEndian, Unaligned, U32};

/// Error conditions for when reading DDS blobs.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// Thrown if the blob is too short, the magic is wrong, or the declared
    /// header sizes don't match the format.
    #[snafu(display("Not a DDS blob!"))]
    MalformedHeader,
    /// Thrown if the pixel format is not one the map format uses.
    #[snafu(display("Unsupported DDS pixel format!"))]
    UnsupportedPixelFormat,
}
type Result<T> = core::result::Result<T, Error>;

/// Unique identifier that tells us if we're reading a DDS blob.
pub const MAGIC: [u8; 4] = *b"DDS ";

/// Offset of the first payload byte within a blob.
pub const PAYLOAD_OFFSET: usize = 132;

bitflags! {
    /// `dwFlags` of the surface pixel format.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct FormatFlags: u32 {
        /// The format carries alpha data; the alpha mask is valid.
        const ALPHA_PIXELS = 0x1;
        /// Alpha-only format in older files.
        const ALPHA = 0x2;
        /// Compressed data; the FourCC word is valid.
        const FOURCC = 0x4;
        /// Uncompressed data; the bit count and RGB masks are valid.
        const RGB = 0x40;
        /// YUV data in older files.
        const YUV = 0x200;
        /// Single-channel data in older files.
        const LUMINANCE = 0x2_0000;
    }
}

#[derive(FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct PixelFormatHeader {
    /// Structure size, must be 32.
    size: U32<LittleEndian>,
    /// [`FormatFlags`]
    flags: U32<LittleEndian>,
    four_cc: [u8; 4],
    rgb_bit_count: U32<LittleEndian>,
    r_bit_mask: U32<LittleEndian>,
    g_bit_mask: U32<LittleEndian>,
    b_bit_mask: U32<LittleEndian>,
    a_bit_mask: U32<LittleEndian>,
}

#[derive(FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct SurfaceHeader {
    /// Structure size, must be 124.
    size: U32<LittleEndian>,
    flags: U32<LittleEndian>,
    height: U32<LittleEndian>,
    width: U32<LittleEndian>,
    pitch_or_linear_size: U32<LittleEndian>,
    depth: U32<LittleEndian>,
    mip_map_count: U32<LittleEndian>,
    reserved: [U32<LittleEndian>; 11],
    format: PixelFormatHeader,
    caps1: U32<LittleEndian>,
    caps2: U32<LittleEndian>,
    caps3: U32<LittleEndian>,
    caps4: U32<LittleEndian>,
    reserved2: U32<LittleEndian>,
}

/// The pixel formats found inside map containers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Block-compressed RGB.
    Dxt1,
    /// Block-compressed RGBA, explicit alpha.
    Dxt3,
    /// Block-compressed RGBA, interpolated alpha.
    Dxt5,
    /// Uncompressed 32-bit BGRA.
    Bgra8,
    /// Uncompressed 24-bit BGR.
    Bgr8,
}

impl PixelFormat {
    /// Returns `true` for the block-compressed formats.
    #[inline]
    #[must_use]
    pub fn is_compressed(self) -> bool {
        matches!(self, Self::Dxt1 | Self::Dxt3 | Self::Dxt5)
    }
}

#[derive(Clone, Copy, Debug)]
struct Info {
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
    format: PixelFormat,
}

fn parse(data: &[u8]) -> Result<Info> {
    ensure!(data.len() >= 4 + core::mem::size_of::<SurfaceHeader>(), MalformedHeaderSnafu);
    ensure!(data[0..4] == MAGIC, MalformedHeaderSnafu);

    let (header, _) =
        SurfaceHeader::ref_from_prefix(&data[4..]).map_err(|_| Error::MalformedHeader)?;
    ensure!(header.size.get() == 124, MalformedHeaderSnafu);
    ensure!(header.format.size.get() == 32, MalformedHeaderSnafu);

    let width = header.width.get();
    let height = header.height.get();
    ensure!(width > 0 && height > 0, MalformedHeaderSnafu);

    let format = &header.format;
    let flags = FormatFlags::from_bits_retain(format.flags.get());
    let (pixel_format, bytes_per_pixel) =
        if flags.contains(FormatFlags::FOURCC) && format.four_cc != [0u8; 4] {
            let pixel_format = match &format.four_cc {
                b"DXT1" => PixelFormat::Dxt1,
                b"DXT3" => PixelFormat::Dxt3,
                b"DXT5" => PixelFormat::Dxt5,
                _ => return UnsupportedPixelFormatSnafu.fail(),
            };

            // The effective stride of a compressed payload is only knowable
            // from the payload itself, and must come out whole.
            let pixels = width as usize * height as usize;
            let payload = data.len().saturating_sub(PAYLOAD_OFFSET);
            let bytes_per_pixel = payload / pixels;
            ensure!(
                bytes_per_pixel > 0 && bytes_per_pixel * pixels == payload,
                UnsupportedPixelFormatSnafu
            );
            (pixel_format, bytes_per_pixel)
        } else if format.rgb_bit_count.get() == 32
            && format.a_bit_mask.get() == 0xFF00_0000
            && format.r_bit_mask.get() == 0x00FF_0000
            && format.g_bit_mask.get() == 0x0000_FF00
            && format.b_bit_mask.get() == 0x0000_00FF
        {
            (PixelFormat::Bgra8, 4)
        } else if format.rgb_bit_count.get() == 24
            && format.r_bit_mask.get() == 0x00FF_0000
            && format.g_bit_mask.get() == 0x0000_FF00
            && format.b_bit_mask.get() == 0x0000_00FF
        {
            (PixelFormat::Bgr8, 3)
        } else {
            return UnsupportedPixelFormatSnafu.fail();
        };

    Ok(Info { width, height, bytes_per_pixel, format: pixel_format })
}

macro_rules! dds_accessors {
    () => {
        /// Surface width in pixels.
        #[inline]
        #[must_use]
        pub fn width(&self) -> u32 {
            self.info.width
        }

        /// Surface height in pixels.
        #[inline]
        #[must_use]
        pub fn height(&self) -> u32 {
            self.info.height
        }

        /// Stride of one pixel in the payload.
        ///
        /// For block-compressed formats this is derived from the payload
        /// length, not from the header.
        #[inline]
        #[must_use]
        pub fn bytes_per_pixel(&self) -> usize {
            self.info.bytes_per_pixel
        }

        /// The classified pixel format.
        #[inline]
        #[must_use]
        pub fn format(&self) -> PixelFormat {
            self.info.format
        }

        /// Number of payload bytes following the header.
        #[inline]
        #[must_use]
        pub fn payload_len(&self) -> usize {
            self.data.len().saturating_sub(PAYLOAD_OFFSET)
        }

        /// The pixel payload, borrowed from the underlying blob.
        #[inline]
        #[must_use]
        pub fn payload(&self) -> &[u8] {
            &self.data[PAYLOAD_OFFSET.min(self.data.len())..]
        }
    };
}

/// A read-only view over a borrowed DDS blob.
#[derive(Debug)]
pub struct DdsSlice<'a> {
    data: &'a [u8],
    info: Info,
}

impl<'a> DdsSlice<'a> {
    /// Validates the blob header and classifies its pixel format.
    ///
    /// # Errors
    /// Returns [`MalformedHeader`](Error::MalformedHeader) if the blob is not
    /// a DDS container, or [`UnsupportedPixelFormat`](Error::UnsupportedPixelFormat)
    /// if its pixel format is not recognised.
    #[inline]
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let info = parse(data)?;
        Ok(Self { data, info })
    }

    dds_accessors!();
}

/// A mutable view over a borrowed DDS blob. Only the payload is writable.
#[derive(Debug)]
pub struct DdsSliceMut<'a> {
    data: &'a mut [u8],
    info: Info,
}

impl<'a> DdsSliceMut<'a> {
    /// Validates the blob header and classifies its pixel format.
    ///
    /// # Errors
    /// Returns [`MalformedHeader`](Error::MalformedHeader) if the blob is not
    /// a DDS container, or [`UnsupportedPixelFormat`](Error::UnsupportedPixelFormat)
    /// if its pixel format is not recognised.
    #[inline]
    pub fn new(data: &'a mut [u8]) -> Result<Self> {
        let info = parse(data)?;
        Ok(Self { data, info })
    }

    dds_accessors!();

    /// The pixel payload, mutably borrowed from the underlying blob.
    #[inline]
    #[must_use]
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let offset = PAYLOAD_OFFSET.min(self.data.len());
        &mut self.data[offset..]
    }
}
