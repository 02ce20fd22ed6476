//! # mask-volume library
//!
//! This crate consolidates multiple per-object voxel mask volumes — one per
//! labeled anatomical object, e.g. a neuron fragment — into a single
//! consensus 3D volume suitable for GPU texture upload.
//!
//! Per-object sources are registered as [`MaskTextureData`] records and may
//! disagree on bytes-per-voxel, byte order and channel count; the
//! [`VolumeMaskBuilder`] reconciles them into one consensus format, pads
//! the bounding volume to GPU-friendly dimensions and scans every voxel of
//! every source into one flat buffer. Voxels claimed by more than one
//! object are either overwritten in registration order or, with a
//! [`MultiMaskTracker`] attached, resolved into composite identifiers that
//! record exactly which labels overlap where.
//!
//! Reading the source mask/channel files and uploading the finished texture
//! are left to the surrounding application; this crate begins at raw voxel
//! buffers and ends at a frozen [`CombinedTextureData`].
//!
//! # Examples
//!
//! ## Consolidating two overlapping masks
//!
//! Two single-voxel masks claim the same location. With a tracker attached,
//! the consolidated voxel holds a freshly allocated composite id instead of
//! whichever label was written last.
//!
//! ```
//! # use mask_volume::{MaskTextureData, MultiMaskTracker, VolumeMaskBuilder};
//! # use std::collections::HashMap;
//! let mut tracker = MultiMaskTracker::new(100);
//! let mut builder = VolumeMaskBuilder::new();
//! builder.set_multi_mask_tracker(&mut tracker);
//!
//! let mut neuron_a = MaskTextureData::new(vec![7], (1, 1, 1), 1);
//! neuron_a.label_mapping = Some(HashMap::from([(7, 1)]));
//! builder.set_texture_data(neuron_a);
//!
//! let mut neuron_b = MaskTextureData::new(vec![9], (1, 1, 1), 1);
//! neuron_b.label_mapping = Some(HashMap::from([(9, 2)]));
//! builder.set_texture_data(neuron_b);
//!
//! let combined = builder
//!     .into_combined_texture_data()
//!     .expect("should have consolidated both sources");
//! // Labels 1 and 2 overlap, so the voxel holds composite 100.
//! assert_eq!(combined.volume.value_at(0).unwrap(), 100);
//! assert_eq!(tracker.get_multi_mask_bean(100).unwrap().members(), &[1, 2]);
//! ```

pub mod enums;
pub mod mask_builder;
pub mod multi_mask;
pub mod texture;
pub mod volume;

pub use enums::ByteOrder;
pub use mask_builder::{GPU_MULTIBYTE_DIVISIBILITY_VALUE, MaskBuilderError, VolumeMaskBuilder};
pub use multi_mask::{MultiMaskBean, MultiMaskTracker};
pub use texture::{CombinedTextureData, MaskTextureData};
pub use volume::{ConsensusVolume, VolumeDataChunk};
