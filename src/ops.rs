//! Parallel whole-dataset operations.
//!
//! These utilities sweep every chunk of a dataset with a pool of workers:
//! deleting datasets, pruning single-valued chunks, and accumulating the set
//! of unique values. Absent chunks are skipped; they are not counted as fill.

use std::collections::HashMap;

use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::{
    array::{ArrayError, ArrayIndices, Dataset, Element},
    storage::StorageError,
};

fn build_pool(threads: usize) -> Result<rayon::ThreadPool, ArrayError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
        .map_err(|err| ArrayError::ThreadPool(err.to_string()))
}

fn check_writable(dataset: &Dataset) -> Result<(), ArrayError> {
    if dataset.handle().mode().can_write() {
        Ok(())
    } else {
        Err(StorageError::PermissionDenied(dataset.handle().mode(), "write").into())
    }
}

/// Apply `f` to the grid coordinates of every chunk of `dataset`, with
/// `threads` workers.
///
/// Chunks are visited in no particular order; the first error fails the call.
///
/// # Errors
/// Returns [`ArrayError`] if the worker pool cannot be built or `f` fails.
pub fn for_each_chunk<F>(dataset: &Dataset, threads: usize, f: F) -> Result<(), ArrayError>
where
    F: Fn(&Dataset, &[u64]) -> Result<(), ArrayError> + Send + Sync,
{
    let num_chunks = dataset.chunk_grid().num_chunks();
    if threads <= 1 {
        for chunk_index in 0..num_chunks {
            let chunk_indices = dataset.chunk_grid().chunk_index_to_indices(chunk_index);
            f(dataset, &chunk_indices)?;
        }
        Ok(())
    } else {
        let pool = build_pool(threads)?;
        pool.install(|| {
            (0..num_chunks).into_par_iter().try_for_each(|chunk_index| {
                let chunk_indices = dataset.chunk_grid().chunk_index_to_indices(chunk_index);
                f(dataset, &chunk_indices)
            })
        })
    }
}

/// Delete every chunk of `dataset`, then its directory.
///
/// # Errors
/// Returns [`ArrayError`] if the access mode forbids writing or a deletion fails.
pub fn remove_dataset(dataset: &Dataset, threads: usize) -> Result<(), ArrayError> {
    check_writable(dataset)?;
    for_each_chunk(dataset, threads, |dataset, chunk_indices| {
        dataset.remove_chunk(chunk_indices)
    })?;
    dataset.handle().remove()?;
    Ok(())
}

/// Delete the chunks of `dataset` whose elements are all equal.
///
/// With `value`, only single-valued chunks holding that value are deleted.
/// Such chunks often hold a background value different from the fill value.
///
/// # Errors
/// Returns [`ArrayError`] on a type, codec, or storage failure.
pub fn remove_trivial_chunks<T: Element>(
    dataset: &Dataset,
    threads: usize,
    value: Option<T>,
) -> Result<(), ArrayError> {
    check_writable(dataset)?;
    dataset.check_data_type::<T>()?;
    for_each_chunk(dataset, threads, |dataset, chunk_indices| {
        let Some(data) = dataset.retrieve_chunk_if_exists::<T>(chunk_indices)? else {
            return Ok(());
        };
        let Some(&first) = data.first() else {
            return Ok(());
        };
        let trivial = data.iter().all(|element| *element == first)
            && value.map_or(true, |value| first == value);
        if trivial {
            dataset.remove_chunk(chunk_indices)?;
        }
        Ok(())
    })
}

/// Accumulate unique values across the chunks of `dataset`, keyed by bit pattern.
fn unique_impl<T: Element>(
    dataset: &Dataset,
    threads: usize,
) -> Result<HashMap<u64, (T, u64)>, ArrayError> {
    dataset.check_data_type::<T>()?;
    let num_chunks = dataset.chunk_grid().num_chunks();
    let accumulate = |accumulator: &mut HashMap<u64, (T, u64)>,
                      chunk_index: u64|
     -> Result<(), ArrayError> {
        let chunk_indices = dataset.chunk_grid().chunk_index_to_indices(chunk_index);
        let Some(data) = dataset.retrieve_chunk_if_exists::<T>(&chunk_indices)? else {
            return Ok(());
        };
        for element in data {
            accumulator
                .entry(element.bit_key())
                .or_insert((element, 0))
                .1 += 1;
        }
        Ok(())
    };

    if threads <= 1 {
        let mut accumulator = HashMap::new();
        for chunk_index in 0..num_chunks {
            accumulate(&mut accumulator, chunk_index)?;
        }
        Ok(accumulator)
    } else {
        let pool = build_pool(threads)?;
        pool.install(|| {
            (0..num_chunks)
                .into_par_iter()
                .try_fold(HashMap::new, |mut accumulator, chunk_index| {
                    accumulate(&mut accumulator, chunk_index)?;
                    Ok(accumulator)
                })
                .try_reduce(HashMap::new, |mut merged, accumulator| {
                    for (key, (element, count)) in accumulator {
                        merged.entry(key).or_insert((element, 0)).1 += count;
                    }
                    Ok(merged)
                })
        })
    }
}

/// Return the unique values stored in `dataset`, sorted by bit pattern.
///
/// Absent chunks are skipped, so the fill value only appears if some chunk
/// holds it explicitly.
///
/// # Errors
/// Returns [`ArrayError`] on a type, codec, or storage failure.
pub fn unique<T: Element>(dataset: &Dataset, threads: usize) -> Result<Vec<T>, ArrayError> {
    Ok(unique_with_counts(dataset, threads)?
        .into_iter()
        .map(|(element, _)| element)
        .collect())
}

/// Return the unique values stored in `dataset` with their occurrence counts,
/// sorted by bit pattern.
///
/// # Errors
/// Returns [`ArrayError`] on a type, codec, or storage failure.
pub fn unique_with_counts<T: Element>(
    dataset: &Dataset,
    threads: usize,
) -> Result<Vec<(T, u64)>, ArrayError> {
    let accumulator = unique_impl::<T>(dataset, threads)?;
    let mut entries: Vec<(u64, (T, u64))> = accumulator.into_iter().collect();
    entries.sort_by_key(|(key, _)| *key);
    Ok(entries
        .into_iter()
        .map(|(_, (element, count))| (element, count))
        .collect())
}

/// Return the smallest written coordinates along `dim`, in elements.
///
/// This is the origin of the existing chunk with the smallest grid coordinate
/// along `dim`, or [`None`] if no chunk has been written.
///
/// # Errors
/// Returns [`ArrayError`] on a storage failure.
pub fn find_minimum_coordinates(
    dataset: &Dataset,
    dim: usize,
) -> Result<Option<ArrayIndices>, ArrayError> {
    let chunks = dataset
        .handle()
        .enumerate_chunks(dataset.format())
        .map_err(ArrayError::StorageError)?;
    Ok(chunks
        .into_iter()
        .filter(|chunk_indices| chunk_indices.len() == dataset.dimensionality())
        .min_by_key(|chunk_indices| chunk_indices[dim])
        .map(|chunk_indices| dataset.chunk_grid().chunk_origin(&chunk_indices)))
}

/// Return the largest written coordinates along `dim`, in elements (exclusive,
/// clipped to the array shape).
///
/// # Errors
/// Returns [`ArrayError`] on a storage failure.
pub fn find_maximum_coordinates(
    dataset: &Dataset,
    dim: usize,
) -> Result<Option<ArrayIndices>, ArrayError> {
    let chunks = dataset
        .handle()
        .enumerate_chunks(dataset.format())
        .map_err(ArrayError::StorageError)?;
    Ok(chunks
        .into_iter()
        .filter(|chunk_indices| chunk_indices.len() == dataset.dimensionality())
        .max_by_key(|chunk_indices| chunk_indices[dim])
        .map(|chunk_indices| dataset.chunk_grid().chunk_subset_bounded(&chunk_indices).end_exc()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{DataType, DatasetBuilder};
    use crate::array_subset::ArraySubset;
    use crate::hierarchy::File;
    use crate::metadata::DataFormat;
    use crate::storage::AccessMode;

    fn make_dataset(dir: &std::path::Path, format: DataFormat) -> Dataset {
        let file = File::create(dir.join("data"), format, AccessMode::Append).unwrap();
        let mut builder = DatasetBuilder::new(vec![8, 8], DataType::UInt16, vec![4, 4]);
        builder.fill_value(0u64);
        builder.build(&file, "values").unwrap()
    }

    #[test]
    fn unique_and_counts() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::TempDir::new()?;
        let dataset = make_dataset(dir.path(), DataFormat::Zarr);
        dataset.store_chunk(&[0, 0], &[3u16; 16])?;
        let mut mixed = [5u16; 16];
        mixed[..4].fill(3);
        dataset.store_chunk(&[1, 1], &mixed)?;

        for threads in [1, 4] {
            assert_eq!(unique::<u16>(&dataset, threads)?, vec![3, 5]);
            assert_eq!(
                unique_with_counts::<u16>(&dataset, threads)?,
                vec![(3, 20), (5, 12)]
            );
        }
        Ok(())
    }

    #[test]
    fn remove_trivial_chunks_prunes_single_valued() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::TempDir::new()?;
        let dataset = make_dataset(dir.path(), DataFormat::N5);
        dataset.store_chunk(&[0, 0], &[3u16; 16])?;
        dataset.store_chunk(&[0, 1], &[4u16; 16])?;
        let mut mixed = [5u16; 16];
        mixed[0] = 6;
        dataset.store_chunk(&[1, 0], &mixed)?;

        // only chunks holding the requested value are pruned
        remove_trivial_chunks(&dataset, 2, Some(3u16))?;
        assert!(!dataset.chunk_exists(&[0, 0])?);
        assert!(dataset.chunk_exists(&[0, 1])?);

        // without a value, every single-valued chunk is pruned
        remove_trivial_chunks::<u16>(&dataset, 2, None)?;
        assert!(!dataset.chunk_exists(&[0, 1])?);
        assert!(dataset.chunk_exists(&[1, 0])?);
        Ok(())
    }

    #[test]
    fn remove_dataset_deletes_the_directory() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::TempDir::new()?;
        let dataset = make_dataset(dir.path(), DataFormat::Zarr);
        dataset.store_array_subset(
            &vec![1u16; 64],
            &ArraySubset::new_with_shape(vec![8, 8]),
            1,
        )?;
        let path = dataset.handle().path().to_path_buf();
        assert!(path.is_dir());
        remove_dataset(&dataset, 2)?;
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn min_max_coordinates() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::TempDir::new()?;
        let dataset = make_dataset(dir.path(), DataFormat::N5);
        assert_eq!(find_minimum_coordinates(&dataset, 0)?, None);

        dataset.store_chunk(&[1, 0], &[1u16; 16])?;
        dataset.store_chunk(&[1, 1], &[2u16; 16])?;
        assert_eq!(
            find_minimum_coordinates(&dataset, 1)?,
            Some(vec![4, 0])
        );
        assert_eq!(
            find_maximum_coordinates(&dataset, 1)?,
            Some(vec![8, 8])
        );
        Ok(())
    }
}
