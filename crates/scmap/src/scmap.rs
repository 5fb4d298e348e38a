//! Adds support for the versioned `.scmap` container used by Supreme
//! Commander and its expansions.
//!
//! A container bundles the terrain heightmap, a preview image, lighting and
//! water shader parameters, terrain strata, decals, props, wave generators
//! and several embedded raster layers. [`Scmap::load`] decodes a byte stream
//! into the typed model, [`Scmap::save`] encodes it back; both walk the
//! stream in a single pass, branching on `version_minor` (52 through 60 are
//! recognised, with additive and subtractive fields between minors).
//!
//! Fields the game ships but nobody has identified keep an `unk` prefix and
//! are preserved byte-for-byte, so an untouched load/save round-trips
//! exactly. The edit operations live in [`crate::ops`].

#[cfg(feature = "std")]
use std::path::Path;

use num_enum::FromPrimitive;
use scmaptool_core::prelude::*;
use snafu::prelude::*;

use crate::dds;

/// Error conditions for when working with map containers.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// Thrown if the stream ends before a required field completes.
    #[snafu(display("Unexpected end of map stream!"))]
    Truncated,
    /// Thrown if a magic number, the major version, or a declared header size
    /// is wrong.
    #[snafu(display("Not a map container, or its header is corrupt!"))]
    MalformedHeader,
    /// Thrown if the minor version is outside the recognised range.
    #[snafu(display("Unsupported map version 2.{minor}!"))]
    UnsupportedVersion { minor: i32 },
    /// Thrown if an embedded texture's pixel format is not on the recognised
    /// list.
    #[snafu(display("Unsupported embedded texture pixel format!"))]
    UnsupportedPixelFormat,
    /// Thrown if source and destination textures disagree during an import.
    #[snafu(display("Embedded textures are not in the same pixel format!"))]
    IncompatiblePixelFormat,
    /// Thrown if a size-dependent buffer disagrees with the map extent.
    #[snafu(display("Buffer length does not match the map extent!"))]
    DimensionMismatch,
    /// Thrown if the underlying byte source or sink fails.
    #[snafu(display("Underlying file i/o failed!"))]
    IoError,
}
pub(crate) type Result<T> = core::result::Result<T, Error>;

impl From<data::Error> for Error {
    #[inline]
    fn from(error: data::Error) -> Self {
        match error {
            data::Error::EndOfFile => Self::Truncated,
            _ => Self::Truncated,
        }
    }
}

impl From<dds::Error> for Error {
    #[inline]
    fn from(error: dds::Error) -> Self {
        match error {
            dds::Error::MalformedHeader => Self::MalformedHeader,
            dds::Error::UnsupportedPixelFormat => Self::UnsupportedPixelFormat,
        }
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for Error {
    #[inline]
    fn from(_: std::io::Error) -> Self {
        Self::IoError
    }
}

/// Raw byte string as stored on the wire; the format never declares an
/// encoding, so none is assumed.
pub type ByteString = Vec<u8>;

/// Faction key used for the single environment texture of pre-55 containers.
pub const DEFAULT_FACTION: &[u8] = b"<default>";

/// Minimap palette written by containers older than minor 56.
pub const DEFAULT_MINIMAP_CONTOUR_INTERVAL: i32 = 20;
pub const DEFAULT_MINIMAP_DEEP_WATER_COLOR: u32 = 0xFF0E_3EFF;
pub const DEFAULT_MINIMAP_CONTOUR_COLOR: u32 = 0xFF21_5CFF;
pub const DEFAULT_MINIMAP_SHORE_COLOR: u32 = 0xFF47_85FF;
pub const DEFAULT_MINIMAP_LAND_START_COLOR: u32 = 0xFF4C_9D32;
pub const DEFAULT_MINIMAP_LAND_END_COLOR: u32 = 0xFFFF_FFFF;

fn read_vec<const N: usize>(data: &mut DataCursor) -> Result<[f32; N]> {
    let mut value = [0.0f32; N];
    for slot in &mut value {
        *slot = data.read_f32()?;
    }
    Ok(value)
}

fn write_vec<const N: usize>(out: &mut DataSink, value: [f32; N]) {
    for component in value {
        out.write_f32(component);
    }
}

fn read_array<const N: usize>(data: &mut DataCursor) -> Result<[u8; N]> {
    let mut value = [0u8; N];
    value.copy_from_slice(data.get_slice(N)?);
    Ok(value)
}

/// One of the four wave normal-map layers of the water shader.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WaveTexture {
    pub normal_movement: [f32; 2],
    pub path: ByteString,
    /// Stored apart from the texture records on the wire; the codec reunites
    /// them by index.
    pub normal_repeat: f32,
}

impl WaveTexture {
    fn read(data: &mut DataCursor) -> Result<Self> {
        Ok(Self {
            normal_movement: read_vec(data)?,
            path: data.read_cstr()?,
            normal_repeat: 0.0,
        })
    }

    fn write(&self, out: &mut DataSink) {
        write_vec(out, self.normal_movement);
        out.write_cstr(&self.path);
    }
}

/// Water rendering parameters plus the shoreline elevations.
#[derive(Clone, Debug, PartialEq)]
pub struct WaterShader {
    pub has_water: u8,
    pub elevation: f32,
    pub elevation_deep: f32,
    pub elevation_abyss: f32,
    pub surface_color: [f32; 3],
    pub color_lerp: [f32; 2],
    pub refraction_scale: f32,
    pub fresnel_bias: f32,
    pub fresnel_power: f32,
    pub unit_reflection: f32,
    pub sky_reflection: f32,
    pub sun_shininess: f32,
    pub sun_strength: f32,
    pub sun_direction: [f32; 3],
    pub sun_color: [f32; 3],
    pub sun_reflection: f32,
    pub sun_glow: f32,
    pub cubemap_path: ByteString,
    pub ramp_path: ByteString,
    /// Always exactly four entries.
    pub wave_textures: Vec<WaveTexture>,
}

impl WaterShader {
    /// Elevations assumed when a container carries no water section.
    pub const DEFAULT_ELEVATION: f32 = 17.5;
    pub const DEFAULT_ELEVATION_DEEP: f32 = 15.0;
    pub const DEFAULT_ELEVATION_ABYSS: f32 = 2.5;

    fn read(data: &mut DataCursor) -> Result<Self> {
        let has_water = data.read_u8()?;
        let (elevation, elevation_deep, elevation_abyss) = if has_water == 1 {
            (data.read_f32()?, data.read_f32()?, data.read_f32()?)
        } else {
            data.skip(12)?;
            (
                Self::DEFAULT_ELEVATION,
                Self::DEFAULT_ELEVATION_DEEP,
                Self::DEFAULT_ELEVATION_ABYSS,
            )
        };

        let surface_color = read_vec(data)?;
        let color_lerp = read_vec(data)?;
        let refraction_scale = data.read_f32()?;
        let fresnel_bias = data.read_f32()?;
        let fresnel_power = data.read_f32()?;
        let unit_reflection = data.read_f32()?;
        let sky_reflection = data.read_f32()?;
        let sun_shininess = data.read_f32()?;
        let sun_strength = data.read_f32()?;
        let sun_direction = read_vec(data)?;
        let sun_color = read_vec(data)?;
        let sun_reflection = data.read_f32()?;
        let sun_glow = data.read_f32()?;
        let cubemap_path = data.read_cstr()?;
        let ramp_path = data.read_cstr()?;

        let normal_repeats: [f32; 4] = read_vec(data)?;
        let mut wave_textures = Vec::with_capacity(4);
        for repeat in normal_repeats {
            let mut texture = WaveTexture::read(data)?;
            texture.normal_repeat = repeat;
            wave_textures.push(texture);
        }

        Ok(Self {
            has_water,
            elevation,
            elevation_deep,
            elevation_abyss,
            surface_color,
            color_lerp,
            refraction_scale,
            fresnel_bias,
            fresnel_power,
            unit_reflection,
            sky_reflection,
            sun_shininess,
            sun_strength,
            sun_direction,
            sun_color,
            sun_reflection,
            sun_glow,
            cubemap_path,
            ramp_path,
            wave_textures,
        })
    }

    fn write(&self, out: &mut DataSink) {
        out.write_u8(self.has_water);
        out.write_f32(self.elevation);
        out.write_f32(self.elevation_deep);
        out.write_f32(self.elevation_abyss);

        write_vec(out, self.surface_color);
        write_vec(out, self.color_lerp);
        out.write_f32(self.refraction_scale);
        out.write_f32(self.fresnel_bias);
        out.write_f32(self.fresnel_power);
        out.write_f32(self.unit_reflection);
        out.write_f32(self.sky_reflection);
        out.write_f32(self.sun_shininess);
        out.write_f32(self.sun_strength);
        write_vec(out, self.sun_direction);
        write_vec(out, self.sun_color);
        out.write_f32(self.sun_reflection);
        out.write_f32(self.sun_glow);
        out.write_cstr(&self.cubemap_path);
        out.write_cstr(&self.ramp_path);

        for texture in &self.wave_textures {
            out.write_f32(texture.normal_repeat);
        }
        for texture in &self.wave_textures {
            texture.write(out);
        }
    }
}

impl Default for WaterShader {
    fn default() -> Self {
        Self {
            has_water: 0,
            elevation: Self::DEFAULT_ELEVATION,
            elevation_deep: Self::DEFAULT_ELEVATION_DEEP,
            elevation_abyss: Self::DEFAULT_ELEVATION_ABYSS,
            surface_color: [0.0; 3],
            color_lerp: [0.0; 2],
            refraction_scale: 0.0,
            fresnel_bias: 0.0,
            fresnel_power: 0.0,
            unit_reflection: 0.0,
            sky_reflection: 0.0,
            sun_shininess: 0.0,
            sun_strength: 0.0,
            sun_direction: [0.0; 3],
            sun_color: [0.0; 3],
            sun_reflection: 0.0,
            sun_glow: 0.0,
            cubemap_path: Vec::new(),
            ramp_path: Vec::new(),
            wave_textures: vec![WaveTexture::default(); 4],
        }
    }
}

/// A parametric emitter of water-surface wave sprites.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WaveGenerator {
    pub texture_path: ByteString,
    pub ramp_path: ByteString,
    pub position: [f32; 3],
    pub rotation: f32,
    pub velocity: [f32; 3],
    pub lifetime_first: f32,
    pub lifetime_second: f32,
    pub period_first: f32,
    pub period_second: f32,
    pub scale_first: f32,
    pub scale_second: f32,
    pub frame_count: f32,
    pub frame_rate_first: f32,
    pub frame_rate_second: f32,
    pub strip_count: f32,
}

impl WaveGenerator {
    fn read(data: &mut DataCursor) -> Result<Self> {
        Ok(Self {
            texture_path: data.read_cstr()?,
            ramp_path: data.read_cstr()?,
            position: read_vec(data)?,
            rotation: data.read_f32()?,
            velocity: read_vec(data)?,
            lifetime_first: data.read_f32()?,
            lifetime_second: data.read_f32()?,
            period_first: data.read_f32()?,
            period_second: data.read_f32()?,
            scale_first: data.read_f32()?,
            scale_second: data.read_f32()?,
            frame_count: data.read_f32()?,
            frame_rate_first: data.read_f32()?,
            frame_rate_second: data.read_f32()?,
            strip_count: data.read_f32()?,
        })
    }

    fn write(&self, out: &mut DataSink) {
        out.write_cstr(&self.texture_path);
        out.write_cstr(&self.ramp_path);
        write_vec(out, self.position);
        out.write_f32(self.rotation);
        write_vec(out, self.velocity);
        out.write_f32(self.lifetime_first);
        out.write_f32(self.lifetime_second);
        out.write_f32(self.period_first);
        out.write_f32(self.period_second);
        out.write_f32(self.scale_first);
        out.write_f32(self.scale_second);
        out.write_f32(self.frame_count);
        out.write_f32(self.frame_rate_first);
        out.write_f32(self.frame_rate_second);
        out.write_f32(self.strip_count);
    }
}

/// A terrain material layer: albedo and normal textures with their tiling
/// scales.
#[derive(Clone, Debug, PartialEq)]
pub struct Stratum {
    pub albedo_path: ByteString,
    pub normals_path: ByteString,
    pub albedo_scale: f32,
    pub normals_scale: f32,
}

impl Default for Stratum {
    fn default() -> Self {
        Self {
            albedo_path: Vec::new(),
            normals_path: Vec::new(),
            albedo_scale: 1.0,
            normals_scale: 1.0,
        }
    }
}

impl Stratum {
    fn read(data: &mut DataCursor) -> Result<Self> {
        Ok(Self {
            albedo_path: data.read_cstr()?,
            normals_path: data.read_cstr()?,
            albedo_scale: data.read_f32()?,
            normals_scale: data.read_f32()?,
        })
    }

    fn write(&self, out: &mut DataSink) {
        out.write_cstr(&self.albedo_path);
        out.write_cstr(&self.normals_path);
        out.write_f32(self.albedo_scale);
        out.write_f32(self.normals_scale);
    }

    fn read_albedo(&mut self, data: &mut DataCursor) -> Result<()> {
        self.albedo_path = data.read_cstr()?;
        self.albedo_scale = data.read_f32()?;
        Ok(())
    }

    fn write_albedo(&self, out: &mut DataSink) {
        out.write_cstr(&self.albedo_path);
        out.write_f32(self.albedo_scale);
    }

    fn read_normals(&mut self, data: &mut DataCursor) -> Result<()> {
        self.normals_path = data.read_cstr()?;
        self.normals_scale = data.read_f32()?;
        Ok(())
    }

    fn write_normals(&self, out: &mut DataSink) {
        out.write_cstr(&self.normals_path);
        out.write_f32(self.normals_scale);
    }
}

/// What a decal projects onto the terrain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
#[repr(i32)]
pub enum DecalType {
    #[num_enum(default)]
    Undefined = 0,
    Albedo = 1,
    Normals = 2,
    WaterMask = 3,
    WaterAlbedo = 4,
    WaterNormals = 5,
    Glow = 6,
    NormalsAlpha = 7,
    GlowMask = 8,
}

/// A projected texture placed on the terrain.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Decal {
    pub unk0: u32,
    /// Raw wire value; see [`Decal::kind`].
    pub decal_type: i32,
    /// Length-prefixed on the wire, unlike every other path in the format.
    pub texture_paths: Vec<ByteString>,
    pub scale: [f32; 3],
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub cutoff_lod: f32,
    pub near_cutoff_lod: f32,
    pub owner_army: i32,
}

impl Decal {
    /// The decoded decal type; unrecognised wire values map to
    /// [`DecalType::Undefined`].
    #[inline]
    #[must_use]
    pub fn kind(&self) -> DecalType {
        DecalType::from(self.decal_type)
    }

    fn read(data: &mut DataCursor) -> Result<Self> {
        let unk0 = data.read_u32()?;
        let decal_type = data.read_i32()?;

        let texture_count = data.read_u32()?;
        let mut texture_paths = Vec::new();
        for _ in 0..texture_count {
            let length = data.read_u32()? as usize;
            texture_paths.push(data.get_slice(length)?.to_vec());
        }

        Ok(Self {
            unk0,
            decal_type,
            texture_paths,
            scale: read_vec(data)?,
            position: read_vec(data)?,
            rotation: read_vec(data)?,
            cutoff_lod: data.read_f32()?,
            near_cutoff_lod: data.read_f32()?,
            owner_army: data.read_i32()?,
        })
    }

    fn write(&self, out: &mut DataSink) {
        out.write_u32(self.unk0);
        out.write_i32(self.decal_type);
        out.write_u32(self.texture_paths.len() as u32);
        for path in &self.texture_paths {
            out.write_u32(path.len() as u32);
            out.write_slice(path);
        }
        write_vec(out, self.scale);
        write_vec(out, self.position);
        write_vec(out, self.rotation);
        out.write_f32(self.cutoff_lod);
        out.write_f32(self.near_cutoff_lod);
        out.write_i32(self.owner_army);
    }
}

/// A named grouping of decal indices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecalGroup {
    pub id: i32,
    pub name: ByteString,
    pub members: Vec<i32>,
}

impl DecalGroup {
    fn read(data: &mut DataCursor) -> Result<Self> {
        let id = data.read_i32()?;
        let name = data.read_cstr()?;
        let count = data.read_u32()?;
        let mut members = Vec::new();
        for _ in 0..count {
            members.push(data.read_i32()?);
        }
        Ok(Self { id, name, members })
    }

    fn write(&self, out: &mut DataSink) {
        out.write_i32(self.id);
        out.write_cstr(&self.name);
        out.write_u32(self.members.len() as u32);
        for member in &self.members {
            out.write_i32(*member);
        }
    }
}

/// A blueprint instance (tree, rock, wreck) placed on the terrain.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Prop {
    pub blueprint_path: ByteString,
    pub position: [f32; 3],
    pub rotation_x: [f32; 3],
    pub rotation_y: [f32; 3],
    pub rotation_z: [f32; 3],
    pub unk0: [u8; 12],
}

impl Prop {
    fn read(data: &mut DataCursor) -> Result<Self> {
        Ok(Self {
            blueprint_path: data.read_cstr()?,
            position: read_vec(data)?,
            rotation_x: read_vec(data)?,
            rotation_y: read_vec(data)?,
            rotation_z: read_vec(data)?,
            unk0: read_array(data)?,
        })
    }

    fn write(&self, out: &mut DataSink) {
        out.write_cstr(&self.blueprint_path);
        write_vec(out, self.position);
        write_vec(out, self.rotation_x);
        write_vec(out, self.rotation_y);
        write_vec(out, self.rotation_z);
        out.write_slice(&self.unk0);
    }
}

/// The skybox dome carried by containers of minor 59 and newer.
///
/// The leading fields are well understood; the tail has only been observed,
/// never identified, and is preserved verbatim.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Skybox {
    pub position: [f32; 3],
    pub horizon_height: f32,
    pub scale: f32,
    pub sub_height: f32,
    pub sub_division_x: u32,
    pub sub_division_height: u32,
    pub zenith_height: f32,
    pub horizon_color: [f32; 3],
    pub zenith_color: [f32; 3],
    pub decal_glow_multiplier: f32,
    pub albedo_path: ByteString,
    pub glow_path: ByteString,
    /// 40-byte packed planet sprites.
    pub planets: Vec<[u8; 40]>,
    pub unk_paths: [ByteString; 3],
    pub unk_scale: f32,
    pub unk_color: [f32; 3],
    pub unk_path: ByteString,
    /// 20-byte packed cloud layers.
    pub clouds: Vec<[u8; 20]>,
}

impl Skybox {
    fn read(data: &mut DataCursor) -> Result<Self> {
        let position = read_vec(data)?;
        let horizon_height = data.read_f32()?;
        let scale = data.read_f32()?;
        let sub_height = data.read_f32()?;
        let sub_division_x = data.read_u32()?;
        let sub_division_height = data.read_u32()?;
        let zenith_height = data.read_f32()?;
        let horizon_color = read_vec(data)?;
        let zenith_color = read_vec(data)?;
        let decal_glow_multiplier = data.read_f32()?;
        let albedo_path = data.read_cstr()?;
        let glow_path = data.read_cstr()?;

        let planet_count = data.read_u32()?;
        let mut planets = Vec::new();
        for _ in 0..planet_count {
            planets.push(read_array(data)?);
        }

        let unk_paths = [data.read_cstr()?, data.read_cstr()?, data.read_cstr()?];
        let unk_scale = data.read_f32()?;
        let unk_color = read_vec(data)?;
        let unk_path = data.read_cstr()?;

        let cloud_count = data.read_u32()?;
        let mut clouds = Vec::new();
        for _ in 0..cloud_count {
            clouds.push(read_array(data)?);
        }

        Ok(Self {
            position,
            horizon_height,
            scale,
            sub_height,
            sub_division_x,
            sub_division_height,
            zenith_height,
            horizon_color,
            zenith_color,
            decal_glow_multiplier,
            albedo_path,
            glow_path,
            planets,
            unk_paths,
            unk_scale,
            unk_color,
            unk_path,
            clouds,
        })
    }

    fn write(&self, out: &mut DataSink) {
        write_vec(out, self.position);
        out.write_f32(self.horizon_height);
        out.write_f32(self.scale);
        out.write_f32(self.sub_height);
        out.write_u32(self.sub_division_x);
        out.write_u32(self.sub_division_height);
        out.write_f32(self.zenith_height);
        write_vec(out, self.horizon_color);
        write_vec(out, self.zenith_color);
        out.write_f32(self.decal_glow_multiplier);
        out.write_cstr(&self.albedo_path);
        out.write_cstr(&self.glow_path);

        out.write_u32(self.planets.len() as u32);
        for planet in &self.planets {
            out.write_slice(planet);
        }

        for path in &self.unk_paths {
            out.write_cstr(path);
        }
        out.write_f32(self.unk_scale);
        write_vec(out, self.unk_color);
        out.write_cstr(&self.unk_path);

        out.write_u32(self.clouds.len() as u32);
        for cloud in &self.clouds {
            out.write_slice(cloud);
        }
    }
}

/// Companion records of the v59+ sky section; observed empty in every map in
/// the wild, so the payload stays opaque.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SkyEffect {
    pub unk_path0: ByteString,
    pub unk_path1: ByteString,
    /// 36-byte packed entries.
    pub entries: Vec<[u8; 36]>,
}

impl SkyEffect {
    fn read(data: &mut DataCursor) -> Result<Self> {
        let unk_path0 = data.read_cstr()?;
        let unk_path1 = data.read_cstr()?;
        let count = data.read_u32()?;
        let mut entries = Vec::new();
        for _ in 0..count {
            entries.push(read_array(data)?);
        }
        Ok(Self { unk_path0, unk_path1, entries })
    }

    fn write(&self, out: &mut DataSink) {
        out.write_cstr(&self.unk_path0);
        out.write_cstr(&self.unk_path1);
        out.write_u32(self.entries.len() as u32);
        for entry in &self.entries {
            out.write_slice(entry);
        }
    }
}

/// One faction's environment cube map. Order on the wire is preserved so
/// containers round-trip byte exactly.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnvironmentCubemap {
    pub faction: ByteString,
    pub path: ByteString,
}

/// A parsed map container; the root of the model.
///
/// Every field is public: the codec makes no attempt to keep the model
/// consistent under direct mutation, but [`Scmap::validate`] (run by
/// [`Scmap::save`]) rejects models whose size-dependent buffers disagree
/// with the extent.
#[derive(Clone, Debug)]
pub struct Scmap {
    /// Recognised minors are 52 through 60.
    pub version_minor: i32,
    pub preview_version: u32,
    pub preview_width: f32,
    pub preview_height: f32,
    pub unk_wstring: u16,
    pub unk_zero: u32,
    /// Embedded preview image, an opaque DDS blob.
    pub preview: Vec<u8>,
    /// Map extent in heightmap cells, normally a power of two.
    pub width: i32,
    pub height: i32,
    /// Vertical units per heightmap unit, usually 1/128.
    pub height_scale: f32,
    /// `(width + 1) * (height + 1)` samples, row-major.
    pub height_map: Vec<i16>,
    pub unk_v54_path: ByteString,
    pub terrain_shader: ByteString,
    pub background_path: ByteString,
    pub sky_cubemap_path: ByteString,
    /// Pre-55 containers store a single unnamed entry under
    /// [`DEFAULT_FACTION`].
    pub environment_cubemaps: Vec<EnvironmentCubemap>,
    pub lighting_multiplier: f32,
    pub sun_direction: [f32; 3],
    pub sun_ambience: [f32; 3],
    pub sun_color: [f32; 3],
    pub shadow_fill_color: [f32; 3],
    pub specular_color: [f32; 4],
    pub bloom: f32,
    pub fog_color: [f32; 3],
    pub fog_start: f32,
    pub fog_end: f32,
    pub water: WaterShader,
    pub wave_generators: Vec<WaveGenerator>,
    pub minimap_contour_interval: i32,
    pub minimap_deep_water_color: u32,
    pub minimap_contour_color: u32,
    pub minimap_shore_color: u32,
    pub minimap_land_start_color: u32,
    pub minimap_land_end_color: u32,
    pub unk_v57: [u8; 4],
    /// Pre-54 only; later containers dropped the field.
    pub tileset: ByteString,
    /// How many strata are populated; always 10 from minor 54 on.
    pub stratum_count: u32,
    /// Always exactly 10 slots. Pre-54 containers only populate slots 0..=4
    /// and 9.
    pub strata: Vec<Stratum>,
    pub unk_pre_decals: [u32; 2],
    pub decals: Vec<Decal>,
    pub decal_groups: Vec<DecalGroup>,
    /// Usually the map extent, sometimes half of it.
    pub width_other: u32,
    pub height_other: u32,
    /// Embedded DDS blobs; one in the wild.
    pub normal_maps: Vec<Vec<u8>>,
    /// Embedded DDS blobs; one or two depending on the minor.
    pub strata_lerps: Vec<Vec<u8>>,
    /// Embedded DDS blobs; one in the wild.
    pub water_lerps: Vec<Vec<u8>>,
    /// Raw plane, `width * height / 4` bytes.
    pub water_foam_mask: Vec<u8>,
    pub water_flatness_mask: Vec<u8>,
    pub water_depth_bias_mask: Vec<u8>,
    /// Raw plane, `width * height` bytes.
    pub terrain_type: Vec<u8>,
    /// Pre-53 trailer, observed as two empty strings.
    pub unk_v52_strings: [ByteString; 2],
    /// Present from minor 59 on.
    pub skybox: Option<Skybox>,
    pub sky_effects: Vec<SkyEffect>,
    pub props: Vec<Prop>,
}

impl Scmap {
    /// Unique identifier that tells us if we're reading a map container.
    pub const MAGIC: u32 = 0x1A70_614D;
    /// Second magic, guarding the preview image section.
    pub const MAGIC_PREVIEW: u32 = 0xBEEF_FEED;
    /// The only recognised major version.
    pub const VERSION_MAJOR: i32 = 2;
    /// Recognised minor versions.
    pub const SUPPORTED_MINORS: core::ops::RangeInclusive<i32> = 52..=60;

    /// Builds a blank, valid version-56 container of the given extent.
    ///
    /// # Panics
    /// Panics if either dimension is not positive.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        assert!(width > 0 && height > 0, "map extent must be positive");
        let cells = width as usize * height as usize;
        let samples = (width as usize + 1) * (height as usize + 1);

        Self {
            version_minor: 56,
            preview_version: 0,
            preview_width: width as f32,
            preview_height: height as f32,
            unk_wstring: 0,
            unk_zero: 0,
            preview: Vec::new(),
            width,
            height,
            height_scale: 1.0 / 128.0,
            height_map: vec![0; samples],
            unk_v54_path: Vec::new(),
            terrain_shader: b"TTerrain".to_vec(),
            background_path: Vec::new(),
            sky_cubemap_path: Vec::new(),
            environment_cubemaps: Vec::new(),
            lighting_multiplier: 1.0,
            sun_direction: [0.0; 3],
            sun_ambience: [0.0; 3],
            sun_color: [0.0; 3],
            shadow_fill_color: [0.0; 3],
            specular_color: [0.0; 4],
            bloom: 0.0,
            fog_color: [0.0; 3],
            fog_start: 0.0,
            fog_end: 0.0,
            water: WaterShader::default(),
            wave_generators: Vec::new(),
            minimap_contour_interval: DEFAULT_MINIMAP_CONTOUR_INTERVAL,
            minimap_deep_water_color: DEFAULT_MINIMAP_DEEP_WATER_COLOR,
            minimap_contour_color: DEFAULT_MINIMAP_CONTOUR_COLOR,
            minimap_shore_color: DEFAULT_MINIMAP_SHORE_COLOR,
            minimap_land_start_color: DEFAULT_MINIMAP_LAND_START_COLOR,
            minimap_land_end_color: DEFAULT_MINIMAP_LAND_END_COLOR,
            unk_v57: [0; 4],
            tileset: Vec::new(),
            stratum_count: 10,
            strata: vec![Stratum::default(); 10],
            unk_pre_decals: [0; 2],
            decals: Vec::new(),
            decal_groups: Vec::new(),
            width_other: width as u32,
            height_other: height as u32,
            normal_maps: Vec::new(),
            strata_lerps: vec![Vec::new(), Vec::new()],
            water_lerps: Vec::new(),
            water_foam_mask: vec![0x00; cells / 4],
            water_flatness_mask: vec![0xFF; cells / 4],
            water_depth_bias_mask: vec![0x7F; cells / 4],
            terrain_type: vec![0; cells],
            unk_v52_strings: [Vec::new(), Vec::new()],
            skybox: None,
            sky_effects: Vec::new(),
            props: Vec::new(),
        }
    }

    /// Opens a file on disk and parses it into a new container.
    ///
    /// # Errors
    /// Returns [`IoError`](Error::IoError) if the file cannot be read, or any
    /// of the [`load`](Self::load) errors.
    #[cfg(feature = "std")]
    #[inline]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(std::fs::read(path)?)
    }

    /// Parses a byte stream into a new container.
    ///
    /// Trailing bytes after the final section are ignored; the game appends
    /// sidecar data there that is not part of the container.
    ///
    /// # Errors
    /// Returns [`MalformedHeader`](Error::MalformedHeader) for bad magics or
    /// major version, [`UnsupportedVersion`](Error::UnsupportedVersion) for
    /// unrecognised minors, and [`Truncated`](Error::Truncated) if the stream
    /// ends early.
    #[inline]
    pub fn load<I: Into<Box<[u8]>>>(input: I) -> Result<Self> {
        let mut data = DataCursor::new(input, Endian::Little);
        Self::read(&mut data)
    }

    /// Parses a container from the cursor, leaving it positioned after the
    /// final prop record.
    pub fn read(data: &mut DataCursor) -> Result<Self> {
        // header
        ensure!(data.read_u32()? == Self::MAGIC, MalformedHeaderSnafu);
        ensure!(data.read_i32()? == Self::VERSION_MAJOR, MalformedHeaderSnafu);

        // preview image
        ensure!(data.read_u32()? == Self::MAGIC_PREVIEW, MalformedHeaderSnafu);
        let preview_version = data.read_u32()?;
        let preview_width = data.read_f32()?;
        let preview_height = data.read_f32()?;
        let unk_wstring = data.read_u16()?;
        let unk_zero = data.read_u32()?;
        let preview_length = data.read_u32()? as usize;
        let preview = data.get_slice(preview_length)?.to_vec();

        // heightmap
        let mut version_minor = data.read_i32()?;
        if version_minor <= 0 {
            version_minor = 56;
        }
        ensure!(
            Self::SUPPORTED_MINORS.contains(&version_minor),
            UnsupportedVersionSnafu { minor: version_minor }
        );

        let width = data.read_i32()?;
        let height = data.read_i32()?;
        ensure!(width > 0 && height > 0, MalformedHeaderSnafu);
        let height_scale = data.read_f32()?;

        let samples = (width as usize + 1) * (height as usize + 1);
        let height_map = data
            .get_slice(samples * 2)?
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        let unk_v54_path = if version_minor >= 54 { data.read_cstr()? } else { Vec::new() };

        // texture definitions
        let terrain_shader = data.read_cstr()?;
        let background_path = data.read_cstr()?;
        let sky_cubemap_path = data.read_cstr()?;

        let mut environment_cubemaps = Vec::new();
        if version_minor >= 55 {
            let count = data.read_i32()?;
            for _ in 0..count {
                environment_cubemaps.push(EnvironmentCubemap {
                    faction: data.read_cstr()?,
                    path: data.read_cstr()?,
                });
            }
        } else {
            environment_cubemaps.push(EnvironmentCubemap {
                faction: DEFAULT_FACTION.to_vec(),
                path: data.read_cstr()?,
            });
        }

        let lighting_multiplier = data.read_f32()?;
        let sun_direction = read_vec(data)?;
        let sun_ambience = read_vec(data)?;
        let sun_color = read_vec(data)?;
        let shadow_fill_color = read_vec(data)?;
        let specular_color = read_vec(data)?;
        let bloom = data.read_f32()?;
        let fog_color = read_vec(data)?;
        let fog_start = data.read_f32()?;
        let fog_end = data.read_f32()?;

        // water
        let water = WaterShader::read(data)?;
        let wave_generator_count = data.read_u32()?;
        let mut wave_generators = Vec::new();
        for _ in 0..wave_generator_count {
            wave_generators.push(WaveGenerator::read(data)?);
        }

        // minimap
        let mut minimap_contour_interval = DEFAULT_MINIMAP_CONTOUR_INTERVAL;
        let mut minimap_deep_water_color = DEFAULT_MINIMAP_DEEP_WATER_COLOR;
        let mut minimap_contour_color = DEFAULT_MINIMAP_CONTOUR_COLOR;
        let mut minimap_shore_color = DEFAULT_MINIMAP_SHORE_COLOR;
        let mut minimap_land_start_color = DEFAULT_MINIMAP_LAND_START_COLOR;
        let mut minimap_land_end_color = DEFAULT_MINIMAP_LAND_END_COLOR;
        if version_minor >= 56 {
            minimap_contour_interval = data.read_i32()?;
            minimap_deep_water_color = data.read_u32()?;
            minimap_contour_color = data.read_u32()?;
            minimap_shore_color = data.read_u32()?;
            minimap_land_start_color = data.read_u32()?;
            minimap_land_end_color = data.read_u32()?;
        }

        let unk_v57 = if version_minor >= 57 { read_array(data)? } else { [0; 4] };

        // strata
        let mut tileset = Vec::new();
        let stratum_count;
        let mut strata;
        if version_minor < 54 {
            tileset = data.read_cstr()?;
            stratum_count = data.read_u32()?;

            strata = vec![Stratum::default(); 10];
            let mut remaining = stratum_count;
            for (index, stratum) in strata.iter_mut().enumerate() {
                if remaining == 0 {
                    break;
                }
                if index < 5 || index >= 9 {
                    *stratum = Stratum::read(data)?;
                    remaining -= 1;
                }
            }
        } else {
            stratum_count = 10;
            strata = vec![Stratum::default(); 10];
            for stratum in strata.iter_mut() {
                stratum.read_albedo(data)?;
            }
            // the 10th stratum has no normal texture
            for stratum in strata.iter_mut().take(9) {
                stratum.read_normals(data)?;
            }
        }

        // decals
        let unk_pre_decals = [data.read_u32()?, data.read_u32()?];

        let decal_count = data.read_u32()?;
        let mut decals = Vec::new();
        for _ in 0..decal_count {
            decals.push(Decal::read(data)?);
        }

        let decal_group_count = data.read_u32()?;
        let mut decal_groups = Vec::new();
        for _ in 0..decal_group_count {
            decal_groups.push(DecalGroup::read(data)?);
        }

        let width_other = data.read_u32()?;
        let height_other = data.read_u32()?;

        // normal map blobs
        let normal_map_count = data.read_u32()?;
        let mut normal_maps = Vec::new();
        for _ in 0..normal_map_count {
            let size = data.read_u32()? as usize;
            normal_maps.push(data.get_slice(size)?.to_vec());
        }

        // strata lerp blobs
        let strata_lerp_count =
            if version_minor < 54 { data.read_u32()? } else { 2 };
        let mut strata_lerps = Vec::new();
        for _ in 0..strata_lerp_count {
            let size = data.read_u32()? as usize;
            strata_lerps.push(data.get_slice(size)?.to_vec());
        }

        // water lerp blobs
        let water_lerp_count = data.read_u32()?;
        let mut water_lerps = Vec::new();
        for _ in 0..water_lerp_count {
            let size = data.read_u32()? as usize;
            water_lerps.push(data.get_slice(size)?.to_vec());
        }

        // raw planes
        let cells = width as usize * height as usize;
        let water_foam_mask = data.get_slice(cells / 4)?.to_vec();
        let water_flatness_mask = data.get_slice(cells / 4)?.to_vec();
        let water_depth_bias_mask = data.get_slice(cells / 4)?.to_vec();
        let terrain_type = data.get_slice(cells)?.to_vec();

        let unk_v52_strings = if version_minor < 53 {
            [data.read_cstr()?, data.read_cstr()?]
        } else {
            [Vec::new(), Vec::new()]
        };

        // sky
        let mut skybox = None;
        let mut sky_effects = Vec::new();
        if version_minor >= 59 {
            skybox = Some(Skybox::read(data)?);
            let count = data.read_u32()?;
            for _ in 0..count {
                sky_effects.push(SkyEffect::read(data)?);
            }
        }

        // props
        let prop_count = data.read_u32()?;
        let mut props = Vec::new();
        for _ in 0..prop_count {
            props.push(Prop::read(data)?);
        }

        Ok(Self {
            version_minor,
            preview_version,
            preview_width,
            preview_height,
            unk_wstring,
            unk_zero,
            preview,
            width,
            height,
            height_scale,
            height_map,
            unk_v54_path,
            terrain_shader,
            background_path,
            sky_cubemap_path,
            environment_cubemaps,
            lighting_multiplier,
            sun_direction,
            sun_ambience,
            sun_color,
            shadow_fill_color,
            specular_color,
            bloom,
            fog_color,
            fog_start,
            fog_end,
            water,
            wave_generators,
            minimap_contour_interval,
            minimap_deep_water_color,
            minimap_contour_color,
            minimap_shore_color,
            minimap_land_start_color,
            minimap_land_end_color,
            unk_v57,
            tileset,
            stratum_count,
            strata,
            unk_pre_decals,
            decals,
            decal_groups,
            width_other,
            height_other,
            normal_maps,
            strata_lerps,
            water_lerps,
            water_foam_mask,
            water_flatness_mask,
            water_depth_bias_mask,
            terrain_type,
            unk_v52_strings,
            skybox,
            sky_effects,
            props,
        })
    }

    /// Serialises the container, validating it first.
    ///
    /// # Errors
    /// Returns [`DimensionMismatch`](Error::DimensionMismatch) if
    /// [`validate`](Self::validate) rejects the model.
    pub fn save(&self) -> Result<Vec<u8>> {
        self.validate()?;

        let blob_bytes: usize = self
            .normal_maps
            .iter()
            .chain(&self.strata_lerps)
            .chain(&self.water_lerps)
            .map(Vec::len)
            .sum();
        let capacity = 1024
            + self.preview.len()
            + self.height_map.len() * 2
            + self.terrain_type.len() * 2
            + blob_bytes;
        let mut out = DataSink::with_capacity(capacity, Endian::Little);

        // header
        out.write_u32(Self::MAGIC);
        out.write_i32(Self::VERSION_MAJOR);

        // preview image
        out.write_u32(Self::MAGIC_PREVIEW);
        out.write_u32(self.preview_version);
        out.write_f32(self.preview_width);
        out.write_f32(self.preview_height);
        out.write_u16(self.unk_wstring);
        out.write_u32(self.unk_zero);
        out.write_u32(self.preview.len() as u32);
        out.write_slice(&self.preview);

        // heightmap
        out.write_i32(self.version_minor);
        out.write_i32(self.width);
        out.write_i32(self.height);
        out.write_f32(self.height_scale);
        for sample in &self.height_map {
            out.write_i16(*sample);
        }
        if self.version_minor >= 54 {
            out.write_cstr(&self.unk_v54_path);
        }

        // texture definitions
        out.write_cstr(&self.terrain_shader);
        out.write_cstr(&self.background_path);
        out.write_cstr(&self.sky_cubemap_path);

        if self.version_minor >= 55 {
            out.write_i32(self.environment_cubemaps.len() as i32);
            for entry in &self.environment_cubemaps {
                out.write_cstr(&entry.faction);
                out.write_cstr(&entry.path);
            }
        } else {
            let path = self
                .environment_cubemaps
                .iter()
                .find(|entry| entry.faction == DEFAULT_FACTION)
                .map(|entry| entry.path.as_slice())
                .unwrap_or_default();
            out.write_cstr(path);
        }

        out.write_f32(self.lighting_multiplier);
        write_vec(&mut out, self.sun_direction);
        write_vec(&mut out, self.sun_ambience);
        write_vec(&mut out, self.sun_color);
        write_vec(&mut out, self.shadow_fill_color);
        write_vec(&mut out, self.specular_color);
        out.write_f32(self.bloom);
        write_vec(&mut out, self.fog_color);
        out.write_f32(self.fog_start);
        out.write_f32(self.fog_end);

        // water
        self.water.write(&mut out);
        out.write_u32(self.wave_generators.len() as u32);
        for generator in &self.wave_generators {
            generator.write(&mut out);
        }

        // minimap
        if self.version_minor >= 56 {
            out.write_i32(self.minimap_contour_interval);
            out.write_u32(self.minimap_deep_water_color);
            out.write_u32(self.minimap_contour_color);
            out.write_u32(self.minimap_shore_color);
            out.write_u32(self.minimap_land_start_color);
            out.write_u32(self.minimap_land_end_color);
        }

        if self.version_minor >= 57 {
            out.write_slice(&self.unk_v57);
        }

        // strata
        if self.version_minor < 54 {
            out.write_cstr(&self.tileset);
            out.write_u32(self.stratum_count);

            let mut remaining = self.stratum_count;
            for (index, stratum) in self.strata.iter().enumerate() {
                if remaining == 0 {
                    break;
                }
                if index < 5 || index >= 9 {
                    stratum.write(&mut out);
                    remaining -= 1;
                }
            }
        } else {
            for stratum in &self.strata {
                stratum.write_albedo(&mut out);
            }
            for stratum in self.strata.iter().take(9) {
                stratum.write_normals(&mut out);
            }
        }

        // decals
        out.write_u32(self.unk_pre_decals[0]);
        out.write_u32(self.unk_pre_decals[1]);

        out.write_u32(self.decals.len() as u32);
        for decal in &self.decals {
            decal.write(&mut out);
        }

        out.write_u32(self.decal_groups.len() as u32);
        for group in &self.decal_groups {
            group.write(&mut out);
        }

        out.write_u32(self.width_other);
        out.write_u32(self.height_other);

        // normal map blobs
        out.write_u32(self.normal_maps.len() as u32);
        for blob in &self.normal_maps {
            out.write_u32(blob.len() as u32);
            out.write_slice(blob);
        }

        // strata lerp blobs
        if self.version_minor < 54 {
            out.write_u32(self.strata_lerps.len() as u32);
        }
        for blob in &self.strata_lerps {
            out.write_u32(blob.len() as u32);
            out.write_slice(blob);
        }

        // water lerp blobs
        out.write_u32(self.water_lerps.len() as u32);
        for blob in &self.water_lerps {
            out.write_u32(blob.len() as u32);
            out.write_slice(blob);
        }

        // raw planes
        out.write_slice(&self.water_foam_mask);
        out.write_slice(&self.water_flatness_mask);
        out.write_slice(&self.water_depth_bias_mask);
        out.write_slice(&self.terrain_type);

        if self.version_minor < 53 {
            out.write_cstr(&self.unk_v52_strings[0]);
            out.write_cstr(&self.unk_v52_strings[1]);
        }

        // sky
        if self.version_minor >= 59 {
            if let Some(skybox) = &self.skybox {
                skybox.write(&mut out);
            } else {
                Skybox::default().write(&mut out);
            }
            out.write_u32(self.sky_effects.len() as u32);
            for effect in &self.sky_effects {
                effect.write(&mut out);
            }
        }

        // props
        out.write_u32(self.props.len() as u32);
        for prop in &self.props {
            prop.write(&mut out);
        }

        Ok(out.into_inner())
    }

    /// Serialises the container to a file on disk.
    ///
    /// # Errors
    /// Returns any [`save`](Self::save) error, or
    /// [`IoError`](Error::IoError) if the file cannot be written.
    #[cfg(feature = "std")]
    #[inline]
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        Ok(std::fs::write(path, self.save()?)?)
    }

    /// Renders a human-readable summary of the container.
    #[must_use]
    pub fn map_info(&self) -> String {
        use core::fmt::Write;

        fn text(bytes: &[u8]) -> String {
            String::from_utf8_lossy(bytes).into_owned()
        }

        fn blob_info(blob: &[u8]) -> String {
            match dds::DdsSlice::new(blob) {
                Ok(dds) => format!(
                    "{}x{} {:?}, {} byte(s)/pixel, {} bytes",
                    dds.width(),
                    dds.height(),
                    dds.format(),
                    dds.bytes_per_pixel(),
                    blob.len()
                ),
                Err(_) => format!("{} bytes (not a readable DDS)", blob.len()),
            }
        }

        let mut info = String::new();
        let _ = writeln!(info, "version: {}.{}", Self::VERSION_MAJOR, self.version_minor);
        let _ = writeln!(info, "size: {}x{} (scale {})", self.width, self.height, self.height_scale);
        let _ = writeln!(info, "preview: {}", blob_info(&self.preview));
        let _ = writeln!(info, "terrainShader: {}", text(&self.terrain_shader));
        let _ = writeln!(info, "backgroundPath: {}", text(&self.background_path));
        let _ = writeln!(info, "skyCubemapPath: {}", text(&self.sky_cubemap_path));
        for entry in &self.environment_cubemaps {
            let _ = writeln!(
                info,
                "environmentCubemap[{}]: {}",
                text(&entry.faction),
                text(&entry.path)
            );
        }
        let _ = writeln!(info, "lightingMultiplier: {}", self.lighting_multiplier);
        let _ = writeln!(info, "bloom: {}", self.bloom);
        let _ = writeln!(
            info,
            "water: present={} elevations=({}, {}, {})",
            self.water.has_water,
            self.water.elevation,
            self.water.elevation_deep,
            self.water.elevation_abyss
        );
        let _ = writeln!(info, "waveGenerators: {}", self.wave_generators.len());
        let _ = writeln!(
            info,
            "strata: {} populated of {}",
            self.stratum_count,
            self.strata.len()
        );
        for stratum in self.strata.iter().filter(|s| !s.albedo_path.is_empty()) {
            let _ = writeln!(
                info,
                "  stratum: {} (x{}) / {} (x{})",
                text(&stratum.albedo_path),
                stratum.albedo_scale,
                text(&stratum.normals_path),
                stratum.normals_scale
            );
        }
        let _ = writeln!(info, "decals: {}", self.decals.len());
        let _ = writeln!(info, "decalGroups: {}", self.decal_groups.len());
        let _ = writeln!(info, "sizeOther: {}x{}", self.width_other, self.height_other);
        for blob in &self.normal_maps {
            let _ = writeln!(info, "normalMap: {}", blob_info(blob));
        }
        for blob in &self.strata_lerps {
            let _ = writeln!(info, "strataLerp: {}", blob_info(blob));
        }
        for blob in &self.water_lerps {
            let _ = writeln!(info, "waterLerp: {}", blob_info(blob));
        }
        let _ = writeln!(info, "maskPlanes: {} bytes each", self.water_foam_mask.len());
        let _ = writeln!(info, "terrainType: {} bytes", self.terrain_type.len());
        let _ = writeln!(info, "skybox: {}", self.skybox.is_some());
        let _ = writeln!(info, "props: {}", self.props.len());
        info
    }

    /// Writes the preview, every embedded texture blob and every raw plane
    /// to `<prefix><name>` files for inspection with external tools.
    ///
    /// # Errors
    /// Returns [`IoError`](Error::IoError) if any file cannot be written.
    #[cfg(feature = "std")]
    pub fn dump_textures(&self, prefix: &str) -> Result<()> {
        std::fs::write(format!("{prefix}preview.dds"), &self.preview)?;
        for (index, blob) in self.normal_maps.iter().enumerate() {
            std::fs::write(format!("{prefix}normalmap{index}.dds"), blob)?;
        }
        for (index, blob) in self.strata_lerps.iter().enumerate() {
            std::fs::write(format!("{prefix}texturemap{index}.dds"), blob)?;
        }
        for (index, blob) in self.water_lerps.iter().enumerate() {
            std::fs::write(format!("{prefix}watermap{index}.dds"), blob)?;
        }
        std::fs::write(format!("{prefix}water_foam_mask.dat"), &self.water_foam_mask)?;
        std::fs::write(format!("{prefix}water_flatness_mask.dat"), &self.water_flatness_mask)?;
        std::fs::write(format!("{prefix}water_depth_bias_mask.dat"), &self.water_depth_bias_mask)?;
        std::fs::write(format!("{prefix}terrain_type.dat"), &self.terrain_type)?;
        Ok(())
    }

    /// Rechecks the size invariants the codec relies on.
    ///
    /// # Errors
    /// Returns [`DimensionMismatch`](Error::DimensionMismatch) if any
    /// size-dependent buffer disagrees with the extent, the fixed-length
    /// record sequences have the wrong length, or an environment faction is
    /// listed twice.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.width > 0 && self.height > 0, DimensionMismatchSnafu);

        let cells = self.width as usize * self.height as usize;
        let samples = (self.width as usize + 1) * (self.height as usize + 1);
        ensure!(self.height_map.len() == samples, DimensionMismatchSnafu);
        ensure!(self.water_foam_mask.len() == cells / 4, DimensionMismatchSnafu);
        ensure!(self.water_flatness_mask.len() == cells / 4, DimensionMismatchSnafu);
        ensure!(self.water_depth_bias_mask.len() == cells / 4, DimensionMismatchSnafu);
        ensure!(self.terrain_type.len() == cells, DimensionMismatchSnafu);

        ensure!(self.water.wave_textures.len() == 4, DimensionMismatchSnafu);
        ensure!(self.strata.len() == 10, DimensionMismatchSnafu);

        for (index, entry) in self.environment_cubemaps.iter().enumerate() {
            ensure!(
                !self.environment_cubemaps[..index]
                    .iter()
                    .any(|other| other.faction == entry.faction),
                DimensionMismatchSnafu
            );
        }

        Ok(())
    }

    /// Returns the heightmap sample at `(x, z)`, or `None` outside the grid.
    #[inline]
    #[must_use]
    pub fn height_at(&self, x: i32, z: i32) -> Option<i16> {
        if x < 0 || z < 0 || x > self.width || z > self.height {
            return None;
        }
        let stride = self.width as usize + 1;
        self.height_map.get(z as usize * stride + x as usize).copied()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dds::tests::build_blob;

    /// A small but fully populated container at the requested minor.
    pub(crate) fn test_map(version_minor: i32) -> Scmap {
        let mut map = Scmap::new(8, 8);
        map.version_minor = version_minor;

        for (index, sample) in map.height_map.iter_mut().enumerate() {
            *sample = (index % 100) as i16;
        }
        map.height_scale = 1.0 / 128.0;
        map.preview = vec![0xAA; 16];
        map.preview_version = 2;
        map.background_path = b"/textures/environment/defaultbackground.dds".to_vec();
        map.sky_cubemap_path = b"/textures/environment/defaultskycube.dds".to_vec();
        map.unk_v54_path = b"unused.scmlua".to_vec();
        map.tileset = b"No Tileset".to_vec();

        map.water.has_water = 1;
        map.water.elevation = 17.5;
        map.water.elevation_deep = 15.0;
        map.water.elevation_abyss = 2.5;
        for (index, texture) in map.water.wave_textures.iter_mut().enumerate() {
            texture.path = format!("/textures/engine/waves{index}.dds").into_bytes();
            texture.normal_movement = [0.5, index as f32];
            texture.normal_repeat = 0.0009765625; // 1/1024
        }

        map.wave_generators.push(WaveGenerator {
            texture_path: b"/textures/engine/waves.dds".to_vec(),
            ramp_path: b"/textures/engine/waterramp.dds".to_vec(),
            position: [4.0, 16.0, 4.0],
            rotation: 0.25,
            velocity: [0.0, 0.0, 1.0],
            lifetime_first: 1.0,
            lifetime_second: 2.0,
            period_first: 3.0,
            period_second: 4.0,
            scale_first: 0.5,
            scale_second: 0.75,
            frame_count: 8.0,
            frame_rate_first: 15.0,
            frame_rate_second: 30.0,
            strip_count: 1.0,
        });

        if version_minor >= 55 {
            map.environment_cubemaps = vec![
                EnvironmentCubemap {
                    faction: b"<default>".to_vec(),
                    path: b"/textures/environment/defaultenvcube.dds".to_vec(),
                },
                EnvironmentCubemap {
                    faction: b"<aeon>".to_vec(),
                    path: b"/textures/environment/aeonenvcube.dds".to_vec(),
                },
            ];
        } else {
            map.environment_cubemaps = vec![EnvironmentCubemap {
                faction: DEFAULT_FACTION.to_vec(),
                path: b"/textures/environment/defaultenvcube.dds".to_vec(),
            }];
        }

        for (index, stratum) in map.strata.iter_mut().enumerate() {
            stratum.albedo_path = format!("/env/layers/albedo{index}.dds").into_bytes();
            stratum.normals_path = format!("/env/layers/normals{index}.dds").into_bytes();
            stratum.albedo_scale = 4.0;
            stratum.normals_scale = 16.0;
        }
        if version_minor < 54 {
            map.stratum_count = 6;
        }

        map.decals.push(Decal {
            unk0: 0,
            decal_type: DecalType::Albedo as i32,
            texture_paths: vec![b"/env/decals/dirt.dds".to_vec()],
            scale: [2.0, 1.0, 2.0],
            position: [3.0, 0.0, 3.0],
            rotation: [0.0, 1.5, 0.0],
            cutoff_lod: 1000.0,
            near_cutoff_lod: 0.0,
            owner_army: -1,
        });
        map.decal_groups.push(DecalGroup {
            id: 1,
            name: b"group".to_vec(),
            members: vec![0],
        });

        map.normal_maps = vec![build_blob(8, 8, Some(b"DXT5"), 0, &[0x80; 64])];
        map.strata_lerps = vec![
            build_blob(8, 8, None, 32, &[0x40; 256]),
            build_blob(8, 8, None, 32, &[0x20; 256]),
        ];
        map.water_lerps = vec![build_blob(8, 8, Some(b"DXT5"), 0, &[0x10; 64])];

        for (index, byte) in map.terrain_type.iter_mut().enumerate() {
            *byte = (index % 7) as u8;
        }

        if version_minor < 53 {
            map.unk_v52_strings = [Vec::new(), Vec::new()];
        }

        if version_minor >= 59 {
            map.skybox = Some(Skybox {
                position: [4.0, 0.0, 4.0],
                horizon_height: -2.5,
                scale: 2343.0,
                sub_height: 1.25,
                sub_division_x: 16,
                sub_division_height: 6,
                zenith_height: 165.0,
                horizon_color: [0.9, 0.95, 0.97],
                zenith_color: [0.18, 0.43, 0.55],
                decal_glow_multiplier: 0.1,
                albedo_path: b"/textures/environment/decal_albedo.dds".to_vec(),
                glow_path: b"/textures/environment/decal_glow.dds".to_vec(),
                planets: vec![[7u8; 40], [9u8; 40]],
                unk_paths: [b"a".to_vec(), b"b".to_vec(), b"c".to_vec()],
                unk_scale: 1.8,
                unk_color: [1.0, 1.0, 1.0],
                unk_path: b"d".to_vec(),
                clouds: vec![[3u8; 20]],
            });
            map.sky_effects.push(SkyEffect {
                unk_path0: b"effect".to_vec(),
                unk_path1: b"ramp".to_vec(),
                entries: vec![[5u8; 36]],
            });
        }

        map.props.push(Prop {
            blueprint_path: b"/env/props/rock01_prop.bp".to_vec(),
            position: [5.0, 0.0, 5.0],
            rotation_x: [1.0, 0.0, 0.0],
            rotation_y: [0.0, 1.0, 0.0],
            rotation_z: [0.0, 0.0, 1.0],
            unk0: [0; 12],
        });

        map
    }

    #[test]
    fn round_trips_every_supported_minor_branch() {
        for version_minor in [52, 53, 54, 55, 56, 57, 58, 59, 60] {
            let bytes = test_map(version_minor).save().unwrap();
            let loaded = Scmap::load(bytes.clone()).unwrap();
            assert_eq!(loaded.version_minor, version_minor);
            assert_eq!(loaded.save().unwrap(), bytes, "minor {version_minor}");
        }
    }

    #[test]
    fn loaded_model_matches_what_was_saved() {
        let map = test_map(56);
        let loaded = Scmap::load(map.save().unwrap()).unwrap();

        assert_eq!(loaded.width, 8);
        assert_eq!(loaded.height, 8);
        assert_eq!(loaded.height_map, map.height_map);
        assert_eq!(loaded.terrain_type, map.terrain_type);
        assert_eq!(loaded.props, map.props);
        assert_eq!(loaded.decals, map.decals);
        assert_eq!(loaded.wave_generators, map.wave_generators);
        assert_eq!(loaded.environment_cubemaps, map.environment_cubemaps);
        assert_eq!(loaded.normal_maps, map.normal_maps);
        assert_eq!(loaded.water.wave_textures, map.water.wave_textures);
        assert_eq!(loaded.decals[0].kind(), DecalType::Albedo);
    }

    #[test]
    fn rejects_bad_magic_after_consuming_it() {
        let mut bytes = test_map(56).save().unwrap();
        bytes[0] ^= 0xFF;
        let mut data = DataCursor::new(bytes, Endian::Little);
        assert!(matches!(Scmap::read(&mut data), Err(Error::MalformedHeader)));
        assert_eq!(data.position(), 4);
    }

    #[test]
    fn rejects_wrong_major_version() {
        let mut bytes = test_map(56).save().unwrap();
        bytes[4] = 3;
        assert!(matches!(Scmap::load(bytes), Err(Error::MalformedHeader)));
    }

    #[test]
    fn rejects_unsupported_minor_versions() {
        let map = test_map(56);
        for minor in [42, 51, 61] {
            let mut other = map.clone();
            other.version_minor = minor;
            let bytes = other.save().unwrap();
            assert!(matches!(
                Scmap::load(bytes),
                Err(Error::UnsupportedVersion { minor: m }) if m == minor
            ));
        }
    }

    #[test]
    fn nonpositive_minor_is_remapped_to_56() {
        let map = test_map(56);
        let mut bytes = map.save().unwrap();
        // The minor sits right after the preview section: 34 header bytes
        // plus the preview blob.
        let offset = 34 + map.preview.len();
        assert_eq!(&bytes[offset..offset + 4], &56i32.to_le_bytes());
        bytes[offset..offset + 4].copy_from_slice(&(-1i32).to_le_bytes());

        let loaded = Scmap::load(bytes).unwrap();
        assert_eq!(loaded.version_minor, 56);
    }

    #[test]
    fn truncated_streams_fail_with_truncated() {
        let bytes = test_map(56).save().unwrap();
        for length in [6, 30, bytes.len() / 2, bytes.len() - 1] {
            assert!(matches!(Scmap::load(&bytes[..length]), Err(Error::Truncated)));
        }
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut bytes = test_map(56).save().unwrap();
        let expected = bytes.clone();
        bytes.extend_from_slice(b"sidecar junk the game appends");
        let loaded = Scmap::load(bytes).unwrap();
        assert_eq!(loaded.save().unwrap(), expected);
    }

    #[test]
    fn missing_water_section_defaults_the_elevations() {
        let mut map = test_map(56);
        map.water.has_water = 0;
        map.water.elevation = 99.0;
        map.water.elevation_deep = 98.0;
        map.water.elevation_abyss = 97.0;

        // The 12 elevation bytes are still on the wire but must be skipped.
        let loaded = Scmap::load(map.save().unwrap()).unwrap();
        assert_eq!(loaded.water.has_water, 0);
        assert_eq!(loaded.water.elevation, WaterShader::DEFAULT_ELEVATION);
        assert_eq!(loaded.water.elevation_deep, WaterShader::DEFAULT_ELEVATION_DEEP);
        assert_eq!(loaded.water.elevation_abyss, WaterShader::DEFAULT_ELEVATION_ABYSS);
        // Everything after the skipped bytes still lines up.
        assert_eq!(loaded.water.wave_textures, map.water.wave_textures);
    }

    #[test]
    fn pre55_environment_section_is_a_single_string() {
        let map = test_map(54);
        let bytes = map.save().unwrap();
        let loaded = Scmap::load(bytes).unwrap();
        assert_eq!(loaded.environment_cubemaps.len(), 1);
        assert_eq!(loaded.environment_cubemaps[0].faction, DEFAULT_FACTION);
        assert_eq!(
            loaded.environment_cubemaps[0].path,
            b"/textures/environment/defaultenvcube.dds".to_vec()
        );
    }

    #[test]
    fn pre54_strata_skip_the_middle_slots() {
        let map = test_map(53);
        let loaded = Scmap::load(map.save().unwrap()).unwrap();
        assert_eq!(loaded.stratum_count, 6);
        // Slots 0..=4 and 9 carry data, 5..=8 are defaults.
        for index in 0..5 {
            assert_eq!(loaded.strata[index], map.strata[index]);
        }
        for index in 5..9 {
            assert_eq!(loaded.strata[index], Stratum::default());
        }
        assert_eq!(loaded.strata[9], map.strata[9]);
    }

    #[test]
    fn validate_rejects_inconsistent_buffers() {
        let mut map = test_map(56);
        map.height_map.pop();
        assert!(matches!(map.save(), Err(Error::DimensionMismatch)));

        let mut map = test_map(56);
        map.terrain_type.push(0);
        assert!(matches!(map.validate(), Err(Error::DimensionMismatch)));

        let mut map = test_map(56);
        map.water.wave_textures.pop();
        assert!(matches!(map.validate(), Err(Error::DimensionMismatch)));

        let mut map = test_map(56);
        map.strata.pop();
        assert!(matches!(map.validate(), Err(Error::DimensionMismatch)));

        let mut map = test_map(56);
        let duplicate = map.environment_cubemaps[0].clone();
        map.environment_cubemaps.push(duplicate);
        assert!(matches!(map.validate(), Err(Error::DimensionMismatch)));
    }

    #[test]
    fn height_samples_are_addressable_by_cell() {
        let map = test_map(56);
        assert_eq!(map.height_at(0, 0), Some(map.height_map[0]));
        assert_eq!(map.height_at(8, 8), Some(map.height_map[80]));
        assert_eq!(map.height_at(3, 2), Some(map.height_map[2 * 9 + 3]));
        assert_eq!(map.height_at(9, 0), None);
        assert_eq!(map.height_at(-1, 0), None);
    }
}
