//! Data loader

use std::collections::HashSet;

use rand::{Rng, seq::SliceRandom};
use thiserror::Error;

use crate::values::Value;

/// Errors for the dataloader
#[derive(Debug, Error)]
pub enum DataLoaderError {
    #[error(
        "All input vectors must have the same dimension. Received different sizes: {input_dims:?}"
    )]
    InputDimensionMismatch { input_dims: HashSet<usize> },
    #[error("Labels must have the same length as the data")]
    LabelLengthMismatch { label_len: usize, data_len: usize },
    #[error("Batch size must be at least 1")]
    ZeroBatchSize,
}

/// Data loader, returns batches of inputs and targets optionally shuffled
/// Takes inspiration from the PyTorch DataLoader
/// <https://pytorch.org/docs/stable/data.html#torch.utils.data.DataLoader>
pub struct DataLoader {
    // inputs are converted to leaves once and reused across epochs
    data: Vec<Vec<Value>>,
    targets: Vec<f64>,
    batch_size: usize,
    shuffle: bool,
}

impl DataLoader {
    pub fn new(
        data: Vec<Vec<f64>>,
        targets: Vec<f64>,
        batch_size: usize,
        shuffle: bool,
    ) -> Result<Self, DataLoaderError> {
        if batch_size == 0 {
            return Err(DataLoaderError::ZeroBatchSize);
        }
        if data.len() != targets.len() {
            return Err(DataLoaderError::LabelLengthMismatch {
                label_len: targets.len(),
                data_len: data.len(),
            });
        }
        let input_dims = data.iter().map(|d| d.len()).collect::<HashSet<_>>();
        if input_dims.len() > 1 {
            return Err(DataLoaderError::InputDimensionMismatch { input_dims });
        }
        let data = data.iter().map(|d| Value::from_slice(d)).collect();
        Ok(Self {
            data,
            targets,
            batch_size,
            shuffle,
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> DataLoaderIterator<'_> {
        self.iter_with_rng(&mut rand::rng())
    }

    /// Like [`DataLoader::iter`] but shuffles with the given generator
    pub fn iter_with_rng<R: Rng>(&self, rng: &mut R) -> DataLoaderIterator<'_> {
        let mut indices = (0..self.data.len()).collect::<Vec<_>>();
        if self.shuffle {
            indices.shuffle(rng);
        }
        DataLoaderIterator {
            data: &self.data,
            targets: &self.targets,
            batch_size: self.batch_size,
            indices,
            curr_iter: 0,
        }
    }
}

/// An iterator which returns mini batches of inputs and targets until the end of the dataset.
/// The last batch holds the remainder and may be smaller than the batch size.
pub struct DataLoaderIterator<'a> {
    data: &'a [Vec<Value>],
    targets: &'a [f64],
    batch_size: usize,
    // optionally shuffled indices
    indices: Vec<usize>,
    curr_iter: usize,
}

impl<'a> Iterator for DataLoaderIterator<'a> {
    type Item = (Vec<&'a [Value]>, Vec<f64>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.curr_iter >= self.indices.len() {
            return None;
        }
        let end = (self.curr_iter + self.batch_size).min(self.indices.len());
        let batch = &self.indices[self.curr_iter..end];
        let batch_data = batch
            .iter()
            .map(|&i| self.data[i].as_slice())
            .collect::<Vec<_>>();
        let batch_targets = batch.iter().map(|&i| self.targets[i]).collect::<Vec<_>>();
        self.curr_iter = end;
        Some((batch_data, batch_targets))
    }
}
