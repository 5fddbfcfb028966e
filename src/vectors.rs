//! In-memory vector types and the blob codec used at the store boundary.
//!
//! Blobs are tagged little-endian layouts:
//! - sparse: `0x53`, u32 dimension, u32 nnz, then nnz pairs of (u32 index, f32 value)
//! - dense: `0x44`, u32 length, then length f32 values
//!
//! Nothing outside this module depends on the byte layout.

use crate::error::VectorCodecError;

const SPARSE_TAG: u8 = 0x53;
const DENSE_TAG: u8 = 0x44;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SparseVector {
    dimension: u32,
    indices: Vec<u32>,
    values: Vec<f32>,
}

impl SparseVector {
    pub fn new(dimension: u32, mut entries: Vec<(u32, f32)>) -> Self {
        entries.sort_by_key(|(index, _)| *index);

        let mut indices = Vec::<u32>::with_capacity(entries.len());
        let mut values = Vec::<f32>::with_capacity(entries.len());
        for (index, value) in entries {
            if indices.last() == Some(&index) {
                if let Some(last) = values.last_mut() {
                    *last += value;
                }
                continue;
            }
            indices.push(index);
            values.push(value);
        }

        let mut out = Self {
            dimension,
            indices: Vec::with_capacity(values.len()),
            values: Vec::with_capacity(values.len()),
        };
        for (index, value) in indices.into_iter().zip(values) {
            if value != 0.0 {
                out.indices.push(index);
                out.values.push(value);
            }
        }
        out
    }

    #[cfg(test)]
    pub fn dimension(&self) -> u32 {
        self.dimension
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    pub fn norm(&self) -> f64 {
        self.values
            .iter()
            .map(|value| f64::from(*value) * f64::from(*value))
            .sum::<f64>()
            .sqrt()
    }

    pub fn dot(&self, other: &SparseVector) -> f64 {
        let mut left = 0usize;
        let mut right = 0usize;
        let mut total = 0.0_f64;

        while left < self.indices.len() && right < other.indices.len() {
            match self.indices[left].cmp(&other.indices[right]) {
                std::cmp::Ordering::Less => left += 1,
                std::cmp::Ordering::Greater => right += 1,
                std::cmp::Ordering::Equal => {
                    total += f64::from(self.values[left]) * f64::from(other.values[right]);
                    left += 1;
                    right += 1;
                }
            }
        }

        total
    }

    pub fn normalized(mut self) -> Self {
        let norm = self.norm();
        if norm > 0.0 {
            for value in &mut self.values {
                *value = (f64::from(*value) / norm) as f32;
            }
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DenseVector(Vec<f32>);

impl DenseVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub fn encode_sparse_blob(vector: &SparseVector) -> Vec<u8> {
    let mut out = Vec::<u8>::with_capacity(9 + vector.nnz() * 8);
    out.push(SPARSE_TAG);
    out.extend_from_slice(&vector.dimension.to_le_bytes());
    out.extend_from_slice(&(vector.nnz() as u32).to_le_bytes());
    for (index, value) in vector.iter() {
        out.extend_from_slice(&index.to_le_bytes());
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

pub fn decode_sparse_blob(blob: &[u8]) -> Result<SparseVector, VectorCodecError> {
    let body = strip_tag(blob, SPARSE_TAG)?;
    if body.len() < 8 {
        return Err(VectorCodecError::LengthMismatch {
            expected: 9,
            actual: blob.len(),
        });
    }

    let dimension = read_u32(&body[0..4]);
    let nnz = read_u32(&body[4..8]) as usize;
    let entries = &body[8..];
    let expected = nnz.saturating_mul(8);
    if entries.len() != expected {
        return Err(VectorCodecError::LengthMismatch {
            expected: expected + 9,
            actual: blob.len(),
        });
    }

    let mut indices = Vec::<u32>::with_capacity(nnz);
    let mut values = Vec::<f32>::with_capacity(nnz);
    for pair in entries.chunks_exact(8) {
        let index = read_u32(&pair[0..4]);
        let in_order = indices.last().is_none_or(|previous| *previous < index);
        if !in_order || index >= dimension {
            return Err(VectorCodecError::InvalidIndex { index, dimension });
        }
        indices.push(index);
        values.push(f32::from_le_bytes([pair[4], pair[5], pair[6], pair[7]]));
    }

    Ok(SparseVector {
        dimension,
        indices,
        values,
    })
}

pub fn encode_dense_blob(vector: &DenseVector) -> Vec<u8> {
    let mut out = Vec::<u8>::with_capacity(5 + vector.len() * 4);
    out.push(DENSE_TAG);
    out.extend_from_slice(&(vector.len() as u32).to_le_bytes());
    for value in vector.as_slice() {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

pub fn decode_dense_blob(blob: &[u8]) -> Result<DenseVector, VectorCodecError> {
    let body = strip_tag(blob, DENSE_TAG)?;
    if body.len() < 4 {
        return Err(VectorCodecError::LengthMismatch {
            expected: 5,
            actual: blob.len(),
        });
    }

    let len = read_u32(&body[0..4]) as usize;
    let values = &body[4..];
    if values.len() != len.saturating_mul(4) {
        return Err(VectorCodecError::LengthMismatch {
            expected: len.saturating_mul(4) + 5,
            actual: blob.len(),
        });
    }

    let mut out = Vec::<f32>::with_capacity(len);
    for chunk in values.chunks_exact(4) {
        out.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(DenseVector(out))
}

fn strip_tag(blob: &[u8], expected: u8) -> Result<&[u8], VectorCodecError> {
    let Some((&found, body)) = blob.split_first() else {
        return Err(VectorCodecError::Empty);
    };
    if found != expected {
        return Err(VectorCodecError::UnexpectedTag { expected, found });
    }
    Ok(body)
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

pub struct Chunked<I: Iterator> {
    inner: I,
    size: usize,
}

pub fn chunked<I: IntoIterator>(items: I, size: usize) -> Chunked<I::IntoIter> {
    Chunked {
        inner: items.into_iter(),
        size: size.max(1),
    }
}

impl<I: Iterator> Iterator for Chunked<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch = self.inner.by_ref().take(self.size).collect::<Vec<_>>();
        if batch.is_empty() { None } else { Some(batch) }
    }
}
