use std::collections::HashMap;

use crate::enums::ByteOrder;
use crate::mask_builder::MaskBuilderError;
use crate::volume::{ConsensusVolume, VolumeDataChunk};

/// One per-object mask/channel stream as handed over by an upstream file
/// reader: the raw voxel bytes plus the metadata needed to scan them.
///
/// `label_mapping` translates the raw label values found in `data` into the
/// numbers written to the consensus volume. A source without a mapping
/// contributes nothing to a multi-source build.
#[derive(Clone, Debug, Default)]
pub struct MaskTextureData {
    pub data: Vec<u8>,
    pub sx: usize,
    pub sy: usize,
    pub sz: usize,
    pub pixel_byte_count: usize,
    pub channel_count: usize,
    pub byte_order: ByteOrder,
    /// Walk the y axis in reverse while scanning.
    pub inverted: bool,
    pub filename: String,
    pub label_mapping: Option<HashMap<u32, u32>>,
}

impl MaskTextureData {
    pub fn new(data: Vec<u8>, dim: (usize, usize, usize), pixel_byte_count: usize) -> Self {
        let (sx, sy, sz) = dim;
        Self {
            data,
            sx,
            sy,
            sz,
            pixel_byte_count,
            channel_count: 1,
            byte_order: ByteOrder::LittleEndian,
            inverted: false,
            filename: String::new(),
            label_mapping: None,
        }
    }

    /// Raw byte at `offset`. The declared extent exceeding the bytes
    /// actually present is a data-integrity failure of the producer.
    pub fn value_at(&self, offset: usize) -> Result<u8, MaskBuilderError> {
        match self.data.get(offset) {
            Some(&value) => Ok(value),
            None => Err(MaskBuilderError::SourceOutOfRange {
                filename: self.filename.clone(),
                offset,
                sx: self.sx,
                sy: self.sy,
                sz: self.sz,
                byte_count: self.pixel_byte_count,
                available: self.data.len(),
            }),
        }
    }
}

/// The finalized consolidation product: the frozen volume bundled with the
/// consensus format and the coordinate-coverage fractions consumers need to
/// map texture coordinates back to true extents.
#[derive(Clone, Debug)]
pub struct CombinedTextureData {
    pub volume: ConsensusVolume,
    pub byte_order: ByteOrder,
    pub pixel_byte_count: usize,
    pub channel_count: usize,
    pub coord_coverage: [f32; 3],
    /// Physical calibration is not tracked at this stage; the combined
    /// product is fixed at 1.0 micrometer per voxel.
    pub voxel_micrometers: [f64; 3],
    pub filename: Option<String>,
}

impl CombinedTextureData {
    pub fn chunks(&self) -> Vec<VolumeDataChunk<'_>> {
        self.volume.chunks()
    }
}
