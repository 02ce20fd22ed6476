use std::collections::HashMap;

use mask_volume::{ByteOrder, MaskTextureData, MultiMaskTracker, VolumeMaskBuilder};

fn mapping(pairs: &[(u32, u32)]) -> Option<HashMap<u32, u32>> {
    Some(pairs.iter().copied().collect())
}

#[test]
fn single_unmapped_source_is_passed_through_byte_for_byte() {
    let bytes: Vec<u8> = (0..8).collect();
    let mut builder = VolumeMaskBuilder::new();
    builder.set_texture_data(MaskTextureData::new(bytes.clone(), (2, 2, 2), 1));

    let combined = builder
        .into_combined_texture_data()
        .expect("should have consolidated the lone source");

    assert_eq!(combined.volume.data(), bytes.as_slice());
    assert_eq!(combined.volume.dim(), (2, 2, 2));
    assert_eq!(combined.pixel_byte_count, 1);
    assert_eq!(combined.coord_coverage, [0.25, 0.25, 0.25]);
}

#[test]
fn overlapping_sources_resolve_through_the_tracker() {
    let mut tracker = MultiMaskTracker::new(100);
    let mut builder = VolumeMaskBuilder::new();
    builder.set_multi_mask_tracker(&mut tracker);

    // Fragment one claims the first two voxels of the row.
    let mut first = MaskTextureData::new(vec![7, 7, 0, 0], (4, 1, 1), 1);
    first.label_mapping = mapping(&[(7, 1)]);
    builder.set_texture_data(first);

    // Fragment two claims the middle two, overlapping at x == 1.
    let mut second = MaskTextureData::new(vec![0, 9, 9, 0], (4, 1, 1), 1);
    second.label_mapping = mapping(&[(9, 2)]);
    builder.set_texture_data(second);

    let combined = builder
        .into_combined_texture_data()
        .expect("should have consolidated both sources");

    let cell = |x: usize| {
        let data = combined.volume.data();
        u32::from(data[x * 2]) | (u32::from(data[x * 2 + 1]) << 8)
    };
    assert_eq!(cell(0), 1); // fragment one alone
    assert_eq!(cell(1), 100); // overlap became a composite
    assert_eq!(cell(2), 2); // fragment two alone
    assert_eq!(cell(3), 0);

    let bean = tracker
        .get_multi_mask_bean(100)
        .expect("overlap should have allocated a composite");
    assert_eq!(bean.members(), &[1, 2]);
    assert_eq!(bean.voxel_count(), 1);
    assert_eq!(tracker.get_multi_mask_beans().count(), 1);
}

#[test]
fn combined_descriptor_carries_consensus_format_and_coverage() {
    let mut builder = VolumeMaskBuilder::new();

    let mut first = MaskTextureData::new(vec![1; 10], (10, 1, 1), 1);
    first.byte_order = ByteOrder::LittleEndian;
    first.filename = "fragment_0.mask".into();
    first.label_mapping = mapping(&[(1, 1)]);
    builder.set_texture_data(first);

    let mut second = MaskTextureData::new(vec![2, 0], (1, 1, 1), 2);
    second.byte_order = ByteOrder::BigEndian; // logged, first order wins
    second.filename = "fragment_1.mask".into();
    second.label_mapping = mapping(&[(2, 2)]);
    builder.set_texture_data(second);

    let combined = builder
        .into_combined_texture_data()
        .expect("should have consolidated both sources");

    assert_eq!(combined.byte_order, ByteOrder::LittleEndian);
    assert_eq!(combined.pixel_byte_count, 2);
    assert_eq!(combined.channel_count, 1);
    assert_eq!(combined.voxel_micrometers, [1.0; 3]);
    assert_eq!(combined.filename.as_deref(), Some("fragment_0.mask"));
    assert_eq!(combined.volume.dim(), (16, 8, 8));
    assert_eq!(combined.coord_coverage, [0.625, 0.125, 0.125]);

    let chunks = combined.chunks();
    assert_eq!(chunks.len(), 8);
    assert!(chunks.iter().all(|chunk| chunk.data.len() == 16 * 8 * 2));
}

#[test]
fn repeated_access_serves_the_memoized_volume() {
    let mut builder = VolumeMaskBuilder::new();
    let mut source = MaskTextureData::new(vec![3], (1, 1, 1), 1);
    source.label_mapping = mapping(&[(3, 5)]);
    builder.set_texture_data(source);
    let mut other = MaskTextureData::new(vec![0], (1, 1, 1), 1);
    other.label_mapping = mapping(&[(3, 5)]);
    builder.set_texture_data(other);

    let length = builder.length().expect("should have built the volume");
    assert_eq!(length, 8 * 8 * 8 * 2);
    assert_eq!(builder.get_value_at(0).unwrap(), 5);
    // Same answer again, served from the cached build.
    assert_eq!(builder.length().unwrap(), length);
    assert_eq!(builder.get_value_at(0).unwrap(), 5);
}
