use crate::mask_builder::MaskBuilderError;

/// The frozen product of one consolidation pass: a flat byte buffer holding
/// a 3D grid of fixed-width cells.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsensusVolume {
    data: Vec<u8>,
    sx: usize,
    sy: usize,
    sz: usize,
    cell_byte_count: usize,
}

/// One z-slab of a [`ConsensusVolume`], sized for streamed upload.
#[derive(Clone, Copy, Debug)]
pub struct VolumeDataChunk<'a> {
    pub start_z: usize,
    pub data: &'a [u8],
}

impl ConsensusVolume {
    pub(crate) fn zeroed(dim: (usize, usize, usize), cell_byte_count: usize) -> Self {
        let (sx, sy, sz) = dim;
        Self {
            data: vec![0; sx * sy * sz * cell_byte_count],
            sx,
            sy,
            sz,
            cell_byte_count,
        }
    }

    pub(crate) fn from_raw(data: Vec<u8>, dim: (usize, usize, usize), cell_byte_count: usize) -> Self {
        let (sx, sy, sz) = dim;
        Self {
            data,
            sx,
            sy,
            sz,
            cell_byte_count,
        }
    }

    /// Get the dimensions of the volume (width, height, depth)
    pub fn dim(&self) -> (usize, usize, usize) {
        (self.sx, self.sy, self.sz)
    }

    pub fn cell_byte_count(&self) -> usize {
        self.cell_byte_count
    }

    /// Total size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Single byte at `offset`; an offset past [`len`](Self::len) is a
    /// caller error, not recoverable within this build.
    pub fn value_at(&self, offset: usize) -> Result<u8, MaskBuilderError> {
        match self.data.get(offset) {
            Some(&value) => Ok(value),
            None => Err(MaskBuilderError::OffsetOutOfRange {
                offset,
                length: self.data.len(),
            }),
        }
    }

    /// The buffer cut into per-z-slab chunks.
    pub fn chunks(&self) -> Vec<VolumeDataChunk<'_>> {
        let slab_bytes = self.sx * self.sy * self.cell_byte_count;
        if slab_bytes == 0 {
            return Vec::new();
        }
        self.data
            .chunks(slab_bytes)
            .enumerate()
            .map(|(start_z, data)| VolumeDataChunk { start_z, data })
            .collect()
    }
}
