//! The two high-level editing operations on a parsed container: resizing a
//! map and importing one map into another.
//!
//! Both are defined over the [`raster`] kernels and the [`dds`] payload
//! views. Everything size-dependent moves together: the heightmap, the raw
//! planes, the embedded textures, and every record that carries a world
//! position.

use snafu::prelude::*;

use crate::dds::{DdsSlice, DdsSliceMut};
use crate::raster::{self, OverlayMode, ResampleMode, Texel};
use crate::scmap::{
    Decal, DimensionMismatchSnafu, IncompatiblePixelFormatSnafu, Prop, Result, Scmap,
    UnsupportedPixelFormatSnafu, WaveGenerator,
};

impl Scmap {
    /// Rescales the container to a new extent.
    ///
    /// The heightmap is resampled with the inverse-distance-weighted kernel
    /// and its samples gain `sqrt(sx * sz)` so slopes keep their aspect; the
    /// raw planes are resampled nearest-neighbour at their own
    /// sub-resolution; water elevations, stratum tiling scales and every
    /// world position scale along. The embedded texture blobs are passed
    /// through untouched, the game re-derives them on load.
    ///
    /// # Errors
    /// Returns [`DimensionMismatch`](crate::scmap::Error::DimensionMismatch)
    /// if either dimension is not positive or the container fails
    /// [`validate`](Scmap::validate).
    pub fn resize(&mut self, new_width: i32, new_height: i32) -> Result<()> {
        ensure!(new_width > 0 && new_height > 0, DimensionMismatchSnafu);
        self.validate()?;

        let scale_x = new_width as f32 / self.width as f32;
        let scale_z = new_height as f32 / self.height as f32;
        let scale_y = (scale_x * scale_z).sqrt();

        let resampled = raster::resample(
            &self.height_map,
            self.width as usize + 1,
            self.height as usize + 1,
            new_width as usize + 1,
            new_height as usize + 1,
            ResampleMode::Weighted,
        );
        self.height_map =
            resampled.into_iter().map(|sample| (f32::from(sample) * scale_y) as i16).collect();

        self.water.elevation *= scale_y;
        self.water.elevation_deep *= scale_y;
        self.water.elevation_abyss *= scale_y;

        for generator in &mut self.wave_generators {
            scale_position(&mut generator.position, scale_x, scale_y, scale_z);
        }
        for stratum in &mut self.strata {
            stratum.albedo_scale *= scale_y;
            stratum.normals_scale *= scale_y;
        }
        for decal in &mut self.decals {
            scale_position(&mut decal.position, scale_x, scale_y, scale_z);
            scale_position(&mut decal.scale, scale_x, scale_y, scale_z);
        }
        for prop in &mut self.props {
            scale_position(&mut prop.position, scale_x, scale_y, scale_z);
        }

        let cells = self.width as usize * self.height as usize;
        let (width, height) = (self.width as usize, self.height as usize);
        let (new_width_cells, new_height_cells) = (new_width as usize, new_height as usize);
        for plane in [
            &mut self.water_foam_mask,
            &mut self.water_flatness_mask,
            &mut self.water_depth_bias_mask,
            &mut self.terrain_type,
        ] {
            // Recover the plane's sub-resolution from its length: the mask
            // planes are half resolution in both dimensions, the terrain
            // types are full resolution.
            let side = match cells / plane.len() {
                1 => 1,
                4 => 2,
                _ => return DimensionMismatchSnafu.fail(),
            };
            *plane = raster::resample(
                plane,
                width / side,
                height / side,
                new_width_cells / side,
                new_height_cells / side,
                ResampleMode::Nearest,
            );
        }

        self.width_other =
            (u64::from(self.width_other) * new_width as u64 / self.width as u64) as u32;
        self.height_other =
            (u64::from(self.height_other) * new_height as u64 / self.height as u64) as u32;

        self.preview_width = new_width as f32;
        self.preview_height = new_height as f32;
        self.width = new_width;
        self.height = new_height;
        Ok(())
    }

    /// Composites `other` into this container at pixel offset
    /// `(col0, row0)`.
    ///
    /// The heightmap and terrain types are overlaid (the heightmap
    /// accumulates instead of replacing when `additive` is set); embedded
    /// textures present in both containers are composited pixel-wise in
    /// texture coordinates; wave generators, decals and props inside the
    /// imported rectangle are replaced by deep copies of the source's.
    ///
    /// # Errors
    /// Returns
    /// [`IncompatiblePixelFormat`](crate::scmap::Error::IncompatiblePixelFormat)
    /// if a texture pair disagrees on pixel format, or
    /// [`UnsupportedPixelFormat`](crate::scmap::Error::UnsupportedPixelFormat)
    /// if one has a stride the kernels cannot carry. All checks run before
    /// anything is written, so a failed import leaves the container
    /// untouched.
    pub fn import(&mut self, other: &Scmap, col0: i32, row0: i32, additive: bool) -> Result<()> {
        self.validate()?;
        other.validate()?;

        for (mine, theirs) in [
            (&self.normal_maps, &other.normal_maps),
            (&self.strata_lerps, &other.strata_lerps),
            (&self.water_lerps, &other.water_lerps),
        ] {
            for (dst, src) in mine.iter().zip(theirs.iter()) {
                check_blob_pair(dst, src)?;
            }
        }

        let height_mode = if additive { OverlayMode::Accumulate } else { OverlayMode::Replace };
        raster::overlay(
            &other.height_map,
            other.width as usize + 1,
            other.height as usize + 1,
            &mut self.height_map,
            self.width as usize + 1,
            self.height as usize + 1,
            col0 as isize,
            row0 as isize,
            height_mode,
        );
        raster::overlay(
            &other.terrain_type,
            other.width as usize,
            other.height as usize,
            &mut self.terrain_type,
            self.width as usize,
            self.height as usize,
            col0 as isize,
            row0 as isize,
            OverlayMode::Replace,
        );

        let src_extent = (other.width, other.height);
        let dst_extent = (self.width, self.height);
        for (mine, theirs) in [
            (&mut self.normal_maps, &other.normal_maps),
            (&mut self.strata_lerps, &other.strata_lerps),
            (&mut self.water_lerps, &other.water_lerps),
        ] {
            for (dst, src) in mine.iter_mut().zip(theirs.iter()) {
                import_blob(src, dst, src_extent, dst_extent, col0, row0)?;
            }
        }

        let x0 = col0 as f32;
        let z0 = row0 as f32;
        let x1 = (col0 + other.width) as f32;
        let z1 = (row0 + other.height) as f32;
        merge_items(&mut self.wave_generators, &other.wave_generators, x0, z0, x1, z1);
        merge_items(&mut self.decals, &other.decals, x0, z0, x1, z1);
        merge_items(&mut self.props, &other.props, x0, z0, x1, z1);
        Ok(())
    }
}

fn scale_position(position: &mut [f32; 3], scale_x: f32, scale_y: f32, scale_z: f32) {
    position[0] *= scale_x;
    position[1] *= scale_y;
    position[2] *= scale_z;
}

/// Read-only compatibility pass over a texture pair, run before any part of
/// the destination is mutated.
fn check_blob_pair(dst: &[u8], src: &[u8]) -> Result<()> {
    let src_dds = DdsSlice::new(src)?;
    let dst_dds = DdsSlice::new(dst)?;
    ensure!(
        src_dds.format() == dst_dds.format()
            && src_dds.bytes_per_pixel() == dst_dds.bytes_per_pixel(),
        IncompatiblePixelFormatSnafu
    );
    ensure!(matches!(src_dds.bytes_per_pixel(), 1 | 2 | 4 | 8), UnsupportedPixelFormatSnafu);
    for dds in [&src_dds, &dst_dds] {
        let pixels = dds.width() as usize * dds.height() as usize;
        ensure!(
            dds.payload_len() >= pixels * dds.bytes_per_pixel(),
            UnsupportedPixelFormatSnafu
        );
    }
    Ok(())
}

/// Composites `src` into `dst`, mapping the world offset into each
/// texture's own pixel coordinates.
fn import_blob(
    src: &[u8],
    dst: &mut [u8],
    src_extent: (i32, i32),
    dst_extent: (i32, i32),
    col0: i32,
    row0: i32,
) -> Result<()> {
    let src_dds = DdsSlice::new(src)?;
    let mut dst_dds = DdsSliceMut::new(dst)?;
    ensure!(
        src_dds.format() == dst_dds.format()
            && src_dds.bytes_per_pixel() == dst_dds.bytes_per_pixel(),
        IncompatiblePixelFormatSnafu
    );

    // World cells to destination texture pixels.
    let texture_col = round_half_up(col0 as f32 / dst_extent.0 as f32 * dst_dds.width() as f32);
    let texture_row = round_half_up(row0 as f32 / dst_extent.1 as f32 * dst_dds.height() as f32);

    // The source payload is resampled to the destination-texture extent that
    // corresponds to the source map extent.
    let scaled_width =
        round_half_up(src_extent.0 as f32 / dst_extent.0 as f32 * dst_dds.width() as f32).max(0)
            as usize;
    let scaled_height =
        round_half_up(src_extent.1 as f32 / dst_extent.1 as f32 * dst_dds.height() as f32).max(0)
            as usize;

    match src_dds.bytes_per_pixel() {
        1 => composite::<u8>(&src_dds, &mut dst_dds, scaled_width, scaled_height, texture_col, texture_row),
        2 => composite::<u16>(&src_dds, &mut dst_dds, scaled_width, scaled_height, texture_col, texture_row),
        4 => composite::<u32>(&src_dds, &mut dst_dds, scaled_width, scaled_height, texture_col, texture_row),
        8 => composite::<u64>(&src_dds, &mut dst_dds, scaled_width, scaled_height, texture_col, texture_row),
        _ => return UnsupportedPixelFormatSnafu.fail(),
    }
    Ok(())
}

fn composite<T: Texel>(
    src: &DdsSlice,
    dst: &mut DdsSliceMut,
    scaled_width: usize,
    scaled_height: usize,
    texture_col: i32,
    texture_row: i32,
) {
    let src_width = src.width() as usize;
    let src_height = src.height() as usize;
    let src_plane = decode_plane::<T>(src.payload(), src_width * src_height);
    let scaled = raster::resample(
        &src_plane,
        src_width,
        src_height,
        scaled_width,
        scaled_height,
        ResampleMode::Nearest,
    );

    let dst_width = dst.width() as usize;
    let dst_height = dst.height() as usize;
    let mut dst_plane = decode_plane::<T>(dst.payload(), dst_width * dst_height);
    raster::overlay(
        &scaled,
        scaled_width,
        scaled_height,
        &mut dst_plane,
        dst_width,
        dst_height,
        texture_col as isize,
        texture_row as isize,
        OverlayMode::Replace,
    );
    encode_plane(&dst_plane, dst.payload_mut());
}

fn decode_plane<T: Texel>(payload: &[u8], pixels: usize) -> Vec<T> {
    payload.chunks_exact(T::SIZE).take(pixels).map(T::read_le).collect()
}

fn encode_plane<T: Texel>(plane: &[T], payload: &mut [u8]) {
    for (value, chunk) in plane.iter().zip(payload.chunks_exact_mut(T::SIZE)) {
        value.write_le(chunk);
    }
}

fn round_half_up(value: f32) -> i32 {
    (value + 0.5).floor() as i32
}

/// Anything with a world position that import has to sort into or out of
/// the replaced rectangle.
trait Positioned: Clone {
    fn position(&self) -> [f32; 3];
    fn position_mut(&mut self) -> &mut [f32; 3];
}

macro_rules! positioned_impl {
    ($($t:ty),*) => {
        $(impl Positioned for $t {
            #[inline]
            fn position(&self) -> [f32; 3] {
                self.position
            }

            #[inline]
            fn position_mut(&mut self) -> &mut [f32; 3] {
                &mut self.position
            }
        })*
    };
}
positioned_impl!(WaveGenerator, Decal, Prop);

fn in_rectangle(position: [f32; 3], x0: f32, z0: f32, x1: f32, z1: f32) -> bool {
    position[0] >= x0 && position[0] < x1 && position[2] >= z0 && position[2] < z1
}

/// Keeps every item outside the rectangle, then appends translated copies
/// of the other container's items that land inside it.
fn merge_items<T: Positioned>(items: &mut Vec<T>, other: &[T], x0: f32, z0: f32, x1: f32, z1: f32) {
    let mut merged: Vec<T> =
        items.drain(..).filter(|item| !in_rectangle(item.position(), x0, z0, x1, z1)).collect();
    for item in other {
        let mut copy = item.clone();
        copy.position_mut()[0] += x0;
        copy.position_mut()[2] += z0;
        if in_rectangle(copy.position(), x0, z0, x1, z1) {
            merged.push(copy);
        }
    }
    *items = merged;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dds::tests::build_blob;
    use crate::scmap::tests::test_map;
    use crate::scmap::Error;

    #[test]
    fn resize_rescales_a_flat_map() {
        let mut map = Scmap::new(256, 256);
        map.height_map.fill(512);
        map.height_scale = 1.0 / 128.0;

        map.resize(512, 512).unwrap();

        assert_eq!(map.width, 512);
        assert_eq!(map.height, 512);
        assert_eq!(map.height_map.len(), 513 * 513);
        assert_eq!(map.height_scale, 1.0 / 128.0);
        // sqrt(2 * 2) = 2, and a flat power-of-two field resamples exactly.
        assert_eq!(map.height_at(256, 256), Some(1024));
        assert!(map.height_map.iter().all(|&sample| sample == 1024));
        assert_eq!(map.terrain_type.len(), 512 * 512);
        assert_eq!(map.water_foam_mask.len(), 512 * 512 / 4);
        assert_eq!(map.width_other, 512);
        assert_eq!(map.preview_width, 512.0);
    }

    #[test]
    fn resize_scales_everything_that_has_a_size() {
        let mut map = test_map(56);
        map.resize(16, 16).unwrap();

        // sx = sz = 2, sy = 2
        assert_eq!(map.water.elevation, 35.0);
        assert_eq!(map.water.elevation_deep, 30.0);
        assert_eq!(map.water.elevation_abyss, 5.0);
        assert_eq!(map.wave_generators[0].position, [8.0, 32.0, 8.0]);
        assert_eq!(map.strata[0].albedo_scale, 8.0);
        assert_eq!(map.strata[0].normals_scale, 32.0);
        assert_eq!(map.decals[0].position, [6.0, 0.0, 6.0]);
        assert_eq!(map.decals[0].scale, [4.0, 2.0, 4.0]);
        assert_eq!(map.props[0].position, [10.0, 0.0, 10.0]);
        // Blobs pass through untouched.
        assert_eq!(map.normal_maps, test_map(56).normal_maps);

        // The result still validates and saves.
        map.save().unwrap();
    }

    #[test]
    fn resize_to_the_same_extent_is_the_identity_on_planes() {
        let mut map = test_map(56);
        map.height_map.fill(-256);
        let before = map.clone();

        map.resize(8, 8).unwrap();

        assert_eq!(map.height_map, before.height_map);
        assert_eq!(map.terrain_type, before.terrain_type);
        assert_eq!(map.water_foam_mask, before.water_foam_mask);
        assert_eq!(map.water_flatness_mask, before.water_flatness_mask);
        assert_eq!(map.water_depth_bias_mask, before.water_depth_bias_mask);
        assert_eq!(map.width, before.width);
        assert_eq!(map.height_scale, before.height_scale);
    }

    #[test]
    fn resize_composition_matches_a_direct_resize() {
        let mut twice = test_map(56);
        twice.resize(16, 32).unwrap();
        twice.resize(4, 8).unwrap();

        let mut once = test_map(56);
        once.resize(4, 8).unwrap();

        assert_eq!((twice.width, twice.height), (once.width, once.height));
        assert_eq!(twice.height_scale, once.height_scale);
        assert_eq!(twice.height_map.len(), once.height_map.len());
        assert_eq!(twice.terrain_type.len(), once.terrain_type.len());
    }

    #[test]
    fn resize_rejects_nonpositive_extents() {
        let mut map = test_map(56);
        assert!(matches!(map.resize(0, 8), Err(Error::DimensionMismatch)));
        assert!(matches!(map.resize(8, -8), Err(Error::DimensionMismatch)));
    }

    #[test]
    fn import_of_itself_changes_nothing_it_shouldnt() {
        let mut map = test_map(56);
        let other = map.clone();
        let before = map.clone();

        map.import(&other, 0, 0, false).unwrap();

        assert_eq!(map.height_map, before.height_map);
        assert_eq!(map.terrain_type, before.terrain_type);
        assert_eq!(map.normal_maps, before.normal_maps);
        assert_eq!(map.wave_generators.len(), before.wave_generators.len());
        assert_eq!(map.decals.len(), before.decals.len());
        assert_eq!(map.props.len(), before.props.len());
        assert_eq!(map.width, before.width);
        assert_eq!(map.height, before.height);
        assert_eq!(map.version_minor, before.version_minor);
    }

    #[test]
    fn import_replaces_the_covered_rectangle() {
        let mut target = Scmap::new(16, 16);
        target.props = vec![
            Prop { position: [2.0, 0.0, 2.0], ..Default::default() },
            Prop { position: [10.0, 0.0, 10.0], ..Default::default() },
            Prop { position: [8.0, 0.0, 15.5], ..Default::default() },
        ];
        target.terrain_type.fill(1);

        let mut source = Scmap::new(8, 8);
        source.props = vec![
            Prop { position: [1.0, 0.0, 1.0], ..Default::default() },
            // Outside the source extent, so outside the rectangle after
            // translation.
            Prop { position: [8.5, 0.0, 0.0], ..Default::default() },
        ];
        source.terrain_type.fill(7);

        target.import(&source, 8, 8, false).unwrap();

        // The prop at (2, 2) is outside the rectangle [8,16)x[8,16) and
        // stays; the two inside it are dropped; one source prop translates
        // into the rectangle and is copied over.
        assert_eq!(target.props.len(), 2);
        assert_eq!(target.props[0].position, [2.0, 0.0, 2.0]);
        assert_eq!(target.props[1].position, [9.0, 0.0, 9.0]);

        // Terrain types are overlaid in the same rectangle.
        assert_eq!(target.terrain_type[0], 1);
        assert_eq!(target.terrain_type[8 * 16 + 8], 7);
        assert_eq!(target.terrain_type[15 * 16 + 15], 7);
        assert_eq!(target.terrain_type[7 * 16 + 8], 1);

        // Heightmap: source samples replace the covered window.
        assert_eq!(target.height_map.len(), 17 * 17);
    }

    #[test]
    fn imported_items_are_deep_copies() {
        let mut target = Scmap::new(8, 8);
        let mut source = Scmap::new(8, 8);
        source.props = vec![Prop {
            blueprint_path: b"/env/props/tree.bp".to_vec(),
            position: [1.0, 0.0, 1.0],
            ..Default::default()
        }];

        target.import(&source, 0, 0, false).unwrap();
        source.props[0].blueprint_path = b"changed".to_vec();
        source.props[0].position = [7.0, 7.0, 7.0];

        assert_eq!(target.props[0].blueprint_path, b"/env/props/tree.bp".to_vec());
        assert_eq!(target.props[0].position, [1.0, 0.0, 1.0]);
    }

    #[test]
    fn additive_import_accumulates_the_heightmap() {
        let mut target = Scmap::new(8, 8);
        target.height_map.fill(100);
        let mut source = Scmap::new(8, 8);
        source.height_map.fill(11);

        target.import(&source, 0, 0, true).unwrap();
        assert!(target.height_map.iter().all(|&sample| sample == 111));

        target.import(&source, 0, 0, false).unwrap();
        assert!(target.height_map.iter().all(|&sample| sample == 11));
    }

    #[test]
    fn blob_import_composites_in_texture_coordinates() {
        let mut target = Scmap::new(4, 4);
        let dst_payload: Vec<u8> = (0u8..64).collect();
        target.normal_maps = vec![build_blob(4, 4, None, 32, &dst_payload)];

        let mut source = Scmap::new(2, 2);
        let src_payload = vec![0xEE; 16];
        source.normal_maps = vec![build_blob(2, 2, None, 32, &src_payload)];

        target.import(&source, 2, 2, false).unwrap();

        let blob = &target.normal_maps[0];
        let payload = &blob[crate::dds::PAYLOAD_OFFSET..];
        // The source maps to the 2x2 bottom-right pixel window.
        for row in 0..4 {
            for col in 0..4 {
                let pixel = &payload[(row * 4 + col) * 4..][..4];
                if row >= 2 && col >= 2 {
                    assert_eq!(pixel, &[0xEE; 4]);
                } else {
                    let base = ((row * 4 + col) * 4) as u8;
                    assert_eq!(pixel, &[base, base + 1, base + 2, base + 3]);
                }
            }
        }
    }

    #[test]
    fn mismatched_blob_formats_fail_without_touching_the_target() {
        let mut target = Scmap::new(4, 4);
        target.height_map.fill(5);
        target.normal_maps = vec![build_blob(4, 4, None, 32, &[1u8; 64])];

        let mut source = Scmap::new(4, 4);
        source.height_map.fill(9);
        source.normal_maps = vec![build_blob(4, 4, Some(b"DXT5"), 0, &[2u8; 64])];

        let before = target.clone();
        assert!(matches!(
            target.import(&source, 0, 0, false),
            Err(Error::IncompatiblePixelFormat)
        ));
        assert_eq!(target.height_map, before.height_map);
        assert_eq!(target.normal_maps, before.normal_maps);
    }

    #[test]
    fn undecodable_blob_stride_fails_without_touching_the_target() {
        let mut target = Scmap::new(4, 4);
        target.height_map.fill(5);
        // 3 bytes per pixel: parses as BGR8 but no kernel stride fits.
        target.normal_maps = vec![build_blob(4, 4, None, 24, &[1u8; 48])];

        let mut source = Scmap::new(4, 4);
        source.height_map.fill(9);
        source.normal_maps = vec![build_blob(4, 4, None, 24, &[2u8; 48])];

        let before = target.clone();
        assert!(matches!(
            target.import(&source, 0, 0, false),
            Err(Error::UnsupportedPixelFormat)
        ));
        assert_eq!(target.height_map, before.height_map);

        // A payload that does not divide the pixel count fails while the
        // blob headers are still being checked.
        let mut source = Scmap::new(4, 4);
        source.normal_maps = vec![build_blob(4, 4, Some(b"DXT5"), 0, &[2u8; 63])];
        let mut target = Scmap::new(4, 4);
        target.normal_maps = vec![build_blob(4, 4, Some(b"DXT5"), 0, &[1u8; 64])];
        let before = target.clone();
        assert!(matches!(
            target.import(&source, 0, 0, false),
            Err(Error::UnsupportedPixelFormat)
        ));
        assert_eq!(target.normal_maps, before.normal_maps);
    }
}
