use std::collections::BTreeSet;

use rayon::prelude::*;
use thiserror::Error;

use crate::enums::ByteOrder;
use crate::multi_mask::MultiMaskTracker;
use crate::texture::{CombinedTextureData, MaskTextureData};
use crate::volume::{ConsensusVolume, VolumeDataChunk};

/// Each axis of the consensus volume is padded up to a multiple of this, so
/// the texture dimensions stay friendly to GPU multi-byte alignment.
pub const GPU_MULTIBYTE_DIVISIBILITY_VALUE: usize = 8;

/// The fragment shader handles two-byte cells well, so the output width
/// never drops below this even when every input is single-byte.
const SHADER_FRIENDLY_BYTE_COUNT: usize = 2;

#[derive(Debug, Error)]
pub enum MaskBuilderError {
    #[error("no mask sources registered")]
    NoSourcesRegistered,

    #[error(
        "read at offset {offset} in source \"{filename}\" is out of range: \
         {sx}x{sy}x{sz} voxels at {byte_count} bytes/voxel declared, \
         {available} bytes available"
    )]
    SourceOutOfRange {
        filename: String,
        offset: usize,
        sx: usize,
        sy: usize,
        sz: usize,
        byte_count: usize,
        available: usize,
    },

    #[error("request {offset} exceeds capacity of {length}")]
    OffsetOutOfRange { offset: usize, length: usize },
}

/// Merges any number of per-object mask volumes into one consensus volume
/// ready for texture upload.
///
/// Sources may disagree on bytes-per-voxel, byte order and channel count;
/// registration reconciles them into a consensus format (larger byte width
/// wins, otherwise first seen wins) with a warning per mismatch, never a
/// failure. The consolidation pass itself runs lazily on first access to
/// the volume and is memoized.
///
/// Without a tracker attached, a voxel claimed by several sources keeps the
/// last value written. Attach a [`MultiMaskTracker`] to resolve such
/// overlaps into composite ids instead.
pub struct VolumeMaskBuilder<'a> {
    sources: Vec<MaskTextureData>,
    consensus_byte_order: Option<ByteOrder>,
    consensus_byte_count: usize,
    consensus_channel_count: usize,
    coord_coverage: [f32; 3],
    first_filename: Option<String>,
    tracker: Option<&'a mut MultiMaskTracker>,
    cached: Option<ConsensusVolume>,
}

impl Default for VolumeMaskBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> VolumeMaskBuilder<'a> {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            consensus_byte_order: None,
            consensus_byte_count: SHADER_FRIENDLY_BYTE_COUNT,
            consensus_channel_count: 0,
            coord_coverage: [1.0; 3],
            first_filename: None,
            tracker: None,
            cached: None,
        }
    }

    /// Registers one per-object source and folds its format into the
    /// consensus. Mismatches are logged, never rejected.
    pub fn set_texture_data(&mut self, texture: MaskTextureData) {
        let byte_count = texture.pixel_byte_count;
        if byte_count != self.consensus_byte_count {
            log::warn!(
                "Mismatch in pixel byte count. Previously saw {}, now seeing {}. Sticking with higher value.",
                self.consensus_byte_count,
                byte_count
            );
            if byte_count > self.consensus_byte_count {
                self.consensus_byte_count = byte_count;
            }
        }

        if self.first_filename.is_none() {
            self.first_filename = Some(texture.filename.clone());
        }

        match self.consensus_byte_order {
            None => self.consensus_byte_order = Some(texture.byte_order),
            Some(order) if order != texture.byte_order => {
                log::warn!(
                    "Mismatch in byte order. Previously saw {:?}, now seeing {:?}. Sticking with former value.",
                    order,
                    texture.byte_order
                );
            }
            Some(_) => {}
        }

        if self.consensus_channel_count == 0 {
            self.consensus_channel_count = texture.channel_count;
            if self.consensus_channel_count != 1 {
                log::warn!("Mask sources expect one-channel data.");
            }
        } else if self.consensus_channel_count != texture.channel_count {
            log::warn!(
                "Mismatch in channel count. Expecting value of {}. Instead seeing {}. Using former value.",
                self.consensus_channel_count,
                texture.channel_count
            );
        }

        self.sources.push(texture);
    }

    /// Opts the build into overlap-aware writes: every write onto a
    /// non-zero voxel is settled through `tracker` and the resolved value
    /// is stored instead of the raw one. One tracker per build.
    pub fn set_multi_mask_tracker(&mut self, tracker: &'a mut MultiMaskTracker) {
        self.tracker = Some(tracker);
    }

    pub fn is_volume_available(&self) -> bool {
        !self.sources.is_empty()
    }

    /// Size of the consensus volume in voxels: the per-axis maximum over
    /// all registered sources, each axis independently padded up to the
    /// GPU divisibility multiple. Records the per-axis coverage fraction
    /// (`true / padded`) so consumers can map coordinates back.
    pub fn get_volume_mask_voxels(&mut self) -> (usize, usize, usize) {
        let mut voxels = [0usize; 3];
        for source in &self.sources {
            for (max, dim) in voxels.iter_mut().zip([source.sx, source.sy, source.sz]) {
                if dim > *max {
                    *max = dim;
                }
            }
        }

        self.coord_coverage = [1.0; 3];
        for (axis, coverage) in voxels.iter_mut().zip(self.coord_coverage.iter_mut()) {
            let leftover = *axis % GPU_MULTIBYTE_DIVISIBILITY_VALUE;
            if leftover > 0 {
                let expansion = GPU_MULTIBYTE_DIVISIBILITY_VALUE - leftover;
                let padded = *axis + expansion;
                *coverage = *axis as f32 / padded as f32;
                *axis = padded;
                log::info!("Expanding edge by {expansion}");
            }
        }

        (voxels[0], voxels[1], voxels[2])
    }

    pub fn get_pixel_byte_count(&self) -> usize {
        self.consensus_byte_count
    }

    pub fn get_pixel_byte_order(&self) -> ByteOrder {
        self.consensus_byte_order.unwrap_or_default()
    }

    pub fn get_coord_coverage(&self) -> [f32; 3] {
        self.coord_coverage
    }

    /// The consolidated volume cut into z-slab chunks, running the
    /// consolidation pass first if it has not happened yet.
    pub fn get_volume_chunks(&mut self) -> Result<Vec<VolumeDataChunk<'_>>, MaskBuilderError> {
        Ok(self.consolidated()?.chunks())
    }

    /// Single byte of the consolidated volume, zero when nothing has been
    /// registered.
    pub fn get_value_at(&mut self, offset: usize) -> Result<u8, MaskBuilderError> {
        if self.sources.is_empty() {
            return Ok(0);
        }
        self.consolidated()?.value_at(offset)
    }

    /// Total size of the consolidated volume in bytes.
    pub fn length(&mut self) -> Result<usize, MaskBuilderError> {
        if self.sources.is_empty() {
            return Ok(0);
        }
        Ok(self.consolidated()?.len())
    }

    /// Consumes the builder and hands off the frozen volume together with
    /// the consensus format and coordinate coverage.
    pub fn into_combined_texture_data(mut self) -> Result<CombinedTextureData, MaskBuilderError> {
        self.consolidated()?;
        let volume = match self.cached.take() {
            Some(volume) => volume,
            None => return Err(MaskBuilderError::NoSourcesRegistered),
        };
        Ok(CombinedTextureData {
            byte_order: self.consensus_byte_order.unwrap_or_default(),
            pixel_byte_count: volume.cell_byte_count(),
            channel_count: self.consensus_channel_count,
            coord_coverage: self.coord_coverage,
            voxel_micrometers: [1.0; 3],
            filename: self.first_filename,
            volume,
        })
    }

    fn consolidated(&mut self) -> Result<&ConsensusVolume, MaskBuilderError> {
        if self.sources.is_empty() {
            return Err(MaskBuilderError::NoSourcesRegistered);
        }
        if self.cached.is_none() {
            let volume = self.build_volume()?;
            self.cached = Some(volume);
        }
        match self.cached.as_ref() {
            Some(volume) => Ok(volume),
            None => Err(MaskBuilderError::NoSourcesRegistered),
        }
    }

    fn build_volume(&mut self) -> Result<ConsensusVolume, MaskBuilderError> {
        let dim = self.get_volume_mask_voxels();

        // A lone source with no label mapping never writes anything through
        // the scan, so its own buffer serves verbatim.
        if self.sources.len() == 1 && self.sources[0].label_mapping.is_none() {
            let source = &self.sources[0];
            return Ok(ConsensusVolume::from_raw(
                source.data.clone(),
                (source.sx, source.sy, source.sz),
                source.pixel_byte_count,
            ));
        }

        let consensus_byte_count = self.consensus_byte_count;
        let consensus_byte_order = self.consensus_byte_order.unwrap_or_default();
        let mut volume = ConsensusVolume::zeroed(dim, consensus_byte_count);

        let mut tracker = self.tracker.as_deref_mut();
        for source in &self.sources {
            let values = scan_source(
                source,
                &mut volume,
                consensus_byte_count,
                consensus_byte_order,
                tracker.as_deref_mut(),
            )?;
            let seen: Vec<String> = values.iter().map(u32::to_string).collect();
            log::info!(
                "Values seen in file \"{}\": {}",
                source.filename,
                seen.join(",")
            );
        }

        Ok(volume)
    }
}

/// Scans every voxel of `source` into `volume`. Without a tracker the scan
/// is parallelised over z-slabs of the output, which never overlap; with a
/// tracker it runs serially because composite allocation is
/// order-dependent.
fn scan_source(
    source: &MaskTextureData,
    volume: &mut ConsensusVolume,
    consensus_byte_count: usize,
    consensus_byte_order: ByteOrder,
    tracker: Option<&mut MultiMaskTracker>,
) -> Result<BTreeSet<u32>, MaskBuilderError> {
    let (consensus_x, consensus_y, consensus_z) = volume.dim();
    // A source exceeding the consensus extent is read only within it.
    let dim_x = source.sx.min(consensus_x);
    let dim_y = source.sy.min(consensus_y);
    let dim_z = source.sz.min(consensus_z);
    let slab_bytes = consensus_x * consensus_y * consensus_byte_count;
    if dim_x == 0 || dim_y == 0 || dim_z == 0 || slab_bytes == 0 {
        return Ok(BTreeSet::new());
    }

    let data = volume.data_mut();
    match tracker {
        Some(tracker) => {
            let mut values = BTreeSet::new();
            for (z, slab) in data.chunks_mut(slab_bytes).take(dim_z).enumerate() {
                values.extend(scan_slab(
                    source,
                    z,
                    slab,
                    consensus_x,
                    (dim_x, dim_y),
                    consensus_byte_count,
                    consensus_byte_order,
                    Some(&mut *tracker),
                )?);
            }
            Ok(values)
        }
        None => {
            let slabs: Result<Vec<BTreeSet<u32>>, MaskBuilderError> = data
                .par_chunks_mut(slab_bytes)
                .take(dim_z)
                .enumerate()
                .map(|(z, slab)| {
                    scan_slab(
                        source,
                        z,
                        slab,
                        consensus_x,
                        (dim_x, dim_y),
                        consensus_byte_count,
                        consensus_byte_order,
                        None,
                    )
                })
                .collect();
            Ok(slabs?.into_iter().flatten().collect())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn scan_slab(
    source: &MaskTextureData,
    z: usize,
    slab: &mut [u8],
    consensus_x: usize,
    (dim_x, dim_y): (usize, usize),
    consensus_byte_count: usize,
    consensus_byte_order: ByteOrder,
    mut tracker: Option<&mut MultiMaskTracker>,
) -> Result<BTreeSet<u32>, MaskBuilderError> {
    let mask_byte_count = source.pixel_byte_count;
    let z_offset_input = z * source.sx * source.sy * mask_byte_count;
    let mut values = BTreeSet::new();

    for y in 0..dim_y {
        let y_input = if source.inverted { source.sy - y - 1 } else { y };
        let y_offset_input = z_offset_input + y_input * source.sx * mask_byte_count;
        let y_offset_output = y * consensus_x * consensus_byte_count;

        for x in 0..dim_x {
            let input_offset = y_offset_input + x * mask_byte_count;
            let output_offset = y_offset_output + x * consensus_byte_count;

            // Multi-byte voxels accumulate little-endian here regardless of
            // the order the source declares; the declared order governs only
            // the output write.
            let mut voxel_val: u32 = 0;
            for mi in 0..mask_byte_count {
                let next_byte = source.value_at(input_offset + mi).inspect_err(|err| {
                    log::error!("{err} while scanning x={x} y={y} z={z}");
                })?;
                voxel_val += (next_byte as u32) << (mi * 8);
            }

            if voxel_val == 0 {
                continue;
            }
            values.insert(voxel_val);

            let Some(mapping) = source.label_mapping.as_ref() else {
                continue;
            };
            let Some(&translated) = mapping.get(&voxel_val) else {
                continue;
            };
            if translated == 0 {
                continue;
            }

            let cell = &mut slab[output_offset..output_offset + consensus_byte_count];
            let stored = match tracker.as_deref_mut() {
                Some(tracker) => {
                    let occupant = decode_cell(cell, consensus_byte_order);
                    tracker.get_mask(translated, occupant)
                }
                None => translated,
            };
            encode_cell(cell, consensus_byte_order, stored);
        }
    }

    Ok(values)
}

// The consensus width may exceed a source's own width; writing the full
// cell zero-extends the high-order bytes as required.
fn encode_cell(cell: &mut [u8], order: ByteOrder, value: u32) {
    let byte_count = cell.len();
    for mi in 0..byte_count {
        let index = match order {
            ByteOrder::LittleEndian => mi,
            ByteOrder::BigEndian => byte_count - 1 - mi,
        };
        cell[index] = ((value >> (mi * 8)) & 0xFF) as u8;
    }
}

fn decode_cell(cell: &[u8], order: ByteOrder) -> u32 {
    let byte_count = cell.len();
    let mut value = 0u32;
    for mi in 0..byte_count {
        let index = match order {
            ByteOrder::LittleEndian => mi,
            ByteOrder::BigEndian => byte_count - 1 - mi,
        };
        value += (cell[index] as u32) << (mi * 8);
    }
    value
}
