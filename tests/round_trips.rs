use zarrn5::array::{
    codec::{BloscCompressor, BloscShuffleMode, Compression},
    DataType, Dataset, DatasetBuilder,
};
use zarrn5::array_subset::ArraySubset;
use zarrn5::hierarchy::File;
use zarrn5::metadata::DataFormat;
use zarrn5::storage::AccessMode;

fn subset(start: &[u64], shape: &[u64]) -> ArraySubset {
    ArraySubset::new_with_start_shape(start.to_vec(), shape.to_vec()).unwrap()
}

/// A small deterministic generator for reproducible test data.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 33
    }
}

#[test]
fn zarr_raw_partial_write_reads_fill_outside() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::TempDir::new()?;
    let file = File::create(dir.path().join("data.zarr"), DataFormat::Zarr, AccessMode::Append)?;
    let dataset = DatasetBuilder::new(vec![100, 100, 100], DataType::Int32, vec![10, 10, 10])
        .fill_value(42i64)
        .build(&file, "ints")?;

    dataset.store_array_subset(&vec![7i32; 20 * 20 * 20], &subset(&[0, 0, 0], &[20, 20, 20]), 1)?;

    let mut read = vec![0i32; 40 * 40 * 40];
    dataset.retrieve_array_subset(&mut read, &subset(&[0, 0, 0], &[40, 40, 40]), 1)?;
    for z in 0..40u64 {
        for y in 0..40u64 {
            for x in 0..40u64 {
                let expected = if z < 20 && y < 20 && x < 20 { 7 } else { 42 };
                let index = usize::try_from(z * 1600 + y * 40 + x)?;
                assert_eq!(read[index], expected, "at [{z}, {y}, {x}]");
            }
        }
    }
    Ok(())
}

#[test]
fn n5_gzip_full_array_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::TempDir::new()?;
    let file = File::create(dir.path().join("data.n5"), DataFormat::N5, AccessMode::Append)?;
    let dataset = DatasetBuilder::new(vec![100, 100, 100], DataType::Float64, vec![10, 10, 10])
        .compression(Compression::Zlib {
            level: 5,
            zlib_framing: false,
        })
        .build(&file, "pi")?;

    let data = vec![std::f64::consts::PI; 100 * 100 * 100];
    dataset.store_array_subset(&data, &subset(&[0, 0, 0], &[100, 100, 100]), 4)?;

    let mut read = vec![0.0f64; 31 * 17 * 5];
    dataset.retrieve_array_subset(&mut read, &subset(&[13, 42, 95], &[31, 17, 5]), 2)?;
    assert!(read
        .iter()
        .all(|value| value.to_bits() == std::f64::consts::PI.to_bits()));
    Ok(())
}

#[test]
fn zarr_blosc_irregular_chunks_disjoint_rois() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::TempDir::new()?;
    let file = File::create(dir.path().join("data.zarr"), DataFormat::Zarr, AccessMode::Append)?;
    let dataset = DatasetBuilder::new(vec![100, 100, 100], DataType::UInt16, vec![23, 17, 11])
        .compression(Compression::Blosc {
            cname: BloscCompressor::LZ4,
            clevel: 5,
            shuffle: BloscShuffleMode::Shuffle,
        })
        .build(&file, "random")?;

    // 25 disjoint regions: one slab of thickness 4 along axis 0 per region,
    // with generator-driven offsets and shapes on the other axes
    let mut lcg = Lcg(0x5eed);
    let mut regions = Vec::new();
    for slab in 0..25u64 {
        let offset = vec![slab * 4, lcg.next() % 50, lcg.next() % 50];
        let shape = vec![
            1 + lcg.next() % 4,
            1 + lcg.next() % 50,
            1 + lcg.next() % 50,
        ];
        let roi = subset(&offset, &shape);
        let data: Vec<u16> = (0..roi.num_elements())
            .map(|_| u16::try_from(lcg.next() % 65536).unwrap())
            .collect();
        dataset.store_array_subset(&data, &roi, 2)?;
        regions.push((roi, data));
    }

    for (roi, data) in &regions {
        let mut read = vec![0u16; data.len()];
        dataset.retrieve_array_subset(&mut read, roi, 2)?;
        assert_eq!(&read, data, "mismatch in {roi}");
    }
    Ok(())
}

#[test]
fn n5_all_zero_write_materialises_no_chunks() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::TempDir::new()?;
    let file = File::create(dir.path().join("data.n5"), DataFormat::N5, AccessMode::Append)?;
    let dataset =
        DatasetBuilder::new(vec![7, 5, 3], DataType::Int8, vec![4, 4, 4]).build(&file, "zeros")?;

    dataset.store_array_subset(&vec![0i8; 7 * 5 * 3], &subset(&[0, 0, 0], &[7, 5, 3]), 1)?;

    // no chunk blobs exist, only the metadata document
    let entries: Vec<_> = walk(dataset.handle().path());
    assert_eq!(entries, vec!["attributes.json".to_string()]);

    let mut read = vec![1i8; 7 * 5 * 3];
    dataset.retrieve_array_subset(&mut read, &subset(&[0, 0, 0], &[7, 5, 3]), 1)?;
    assert!(read.iter().all(|&value| value == 0));
    Ok(())
}

fn walk(path: &std::path::Path) -> Vec<String> {
    let mut files = Vec::new();
    for entry in walk_entries(path) {
        files.push(entry);
    }
    files.sort();
    files
}

fn walk_entries(path: &std::path::Path) -> Vec<String> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(path).unwrap() {
        let entry = entry.unwrap();
        if entry.path().is_dir() {
            files.extend(walk_entries(&entry.path()));
        } else {
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    files
}

#[test]
fn zarr_zlib_second_handle_reads_back() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::TempDir::new()?;
    let root = dir.path().join("data.zarr");
    let data: Vec<f32> = (0..64).map(|v| v as f32 * 0.5).collect();
    {
        let file = File::create(&root, DataFormat::Zarr, AccessMode::Append)?;
        let dataset = DatasetBuilder::new(vec![8, 8], DataType::Float32, vec![8, 8])
            .compression(Compression::Zlib {
                level: 5,
                zlib_framing: true,
            })
            .build(&file, "floats")?;
        dataset.store_array_subset(&data, &subset(&[0, 0], &[8, 8]), 1)?;
    }

    let document: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(root.join("floats/.zarray"))?)?;
    assert_eq!(
        document["compressor"],
        serde_json::json!({"id": "zlib", "level": 5})
    );

    let file = File::open(&root, AccessMode::ReadOnly)?;
    let dataset = Dataset::open(&file, "floats")?;
    let mut read = vec![0.0f32; 64];
    dataset.retrieve_array_subset(&mut read, &subset(&[0, 0], &[8, 8]), 1)?;
    assert_eq!(read, data);
    Ok(())
}

#[test]
fn n5_small_gzip_payload_uses_zlib_framing() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::TempDir::new()?;
    let file = File::create(dir.path().join("data.n5"), DataFormat::N5, AccessMode::Append)?;
    let dataset = DatasetBuilder::new(vec![4, 4], DataType::UInt8, vec![4, 4])
        .compression(Compression::Zlib {
            level: 5,
            zlib_framing: false,
        })
        .build(&file, "small")?;

    // 16 payload bytes, below the 22-byte gzip cutoff
    let data: Vec<u8> = (1..=16).collect();
    dataset.store_chunk(&[0, 0], &data)?;

    let blob = std::fs::read(dataset.handle().path().join("0/0"))?;
    // 12-byte header, then a zlib stream (0x78), not the gzip magic
    assert_eq!(blob[12], 0x78);

    assert_eq!(dataset.retrieve_chunk::<u8>(&[0, 0])?, data);
    Ok(())
}

#[test]
fn nan_payloads_round_trip_bit_exactly() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::TempDir::new()?;
    let file = File::create(dir.path().join("data.n5"), DataFormat::N5, AccessMode::Append)?;
    let dataset =
        DatasetBuilder::new(vec![4], DataType::Float32, vec![4]).build(&file, "nans")?;

    let data = [
        f32::NAN,
        f32::from_bits(f32::NAN.to_bits() ^ 0xbeef),
        f32::INFINITY,
        f32::NEG_INFINITY,
    ];
    dataset.store_chunk(&[0], &data)?;
    let read = dataset.retrieve_chunk::<f32>(&[0])?;
    for (read, written) in read.iter().zip(&data) {
        assert_eq!(read.to_bits(), written.to_bits());
    }
    Ok(())
}

#[test]
fn thread_counts_produce_identical_results() -> Result<(), Box<dyn std::error::Error>> {
    let data: Vec<u32> = {
        let mut lcg = Lcg(99);
        (0..50 * 40).map(|_| u32::try_from(lcg.next() & 0xffff_ffff).unwrap_or(0)).collect()
    };
    let mut outputs = Vec::new();
    for threads in [1, 2, 4, 8] {
        let dir = tempfile::TempDir::new()?;
        let file = File::create(dir.path().join("data.zarr"), DataFormat::Zarr, AccessMode::Append)?;
        let dataset = DatasetBuilder::new(vec![60, 50], DataType::UInt32, vec![16, 16])
            .compression(Compression::Bzip2 { level: 5 })
            .fill_value(1u64)
            .build(&file, "sweep")?;

        let roi = subset(&[5, 5], &[50, 40]);
        dataset.store_array_subset(&data, &roi, threads)?;
        let mut read = vec![0u32; data.len()];
        dataset.retrieve_array_subset(&mut read, &roi, threads)?;
        outputs.push(read);
    }
    assert!(outputs.iter().all(|output| output == &outputs[0]));
    assert_eq!(outputs[0], data);
    Ok(())
}

#[test]
fn every_data_type_round_trips() -> Result<(), Box<dyn std::error::Error>> {
    fn check<T: zarrn5::array::Element + std::fmt::Debug>(
        format: DataFormat,
        make: impl Fn(u64) -> T,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::TempDir::new()?;
        let file = File::create(dir.path().join("data"), format, AccessMode::Append)?;
        let dataset =
            DatasetBuilder::new(vec![6, 6], T::DATA_TYPE, vec![4, 4]).build(&file, "cells")?;
        let data: Vec<T> = (0..36).map(&make).collect();
        dataset.store_array_subset(&data, &subset(&[0, 0], &[6, 6]), 1)?;
        let mut read = vec![make(0); 36];
        dataset.retrieve_array_subset(&mut read, &subset(&[0, 0], &[6, 6]), 1)?;
        assert_eq!(read, data, "{} round trip failed", T::DATA_TYPE);
        Ok(())
    }

    for format in [DataFormat::Zarr, DataFormat::N5] {
        check(format, |v| v as i8)?;
        check(format, |v| v as i16 - 7)?;
        check(format, |v| v as i32 * -3)?;
        check(format, |v| v as i64 * 1_000_000_007)?;
        check(format, |v| v as u8)?;
        check(format, |v| v as u16 * 1000)?;
        check(format, |v| v as u32 * 100_000)?;
        check(format, |v| v * 1_000_000_007)?;
        check(format, |v| v as f32 * 0.25 - 3.0)?;
        check(format, |v| v as f64 * 0.125 - 2.0)?;
    }
    Ok(())
}
