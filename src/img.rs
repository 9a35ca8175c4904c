//! Dense N-dimensional sample containers and the factories that allocate
//! them.
//!
//! Dimension 0 varies fastest in storage. Every container carries an
//! origin (`min`) so that a field need not start at coordinate zero, and the
//! factory that produced it so derived fields can be allocated the same way.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::num::{Complex32, RealSample};

/// Errors raised while building or allocating containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImgError {
    /// Two per-dimension descriptions disagree on the number of dimensions.
    DimensionMismatch { expected: usize, actual: usize },
    /// The backing storage does not hold `product(dims)` samples.
    LengthMismatch { expected: usize, actual: usize },
    /// The factory cannot produce complex floating-point containers.
    IncompatibleType,
}

impl fmt::Display for ImgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImgError::DimensionMismatch { expected, actual } => {
                write!(f, "expected {} dimensions, got {}", expected, actual)
            }
            ImgError::LengthMismatch { expected, actual } => {
                write!(f, "expected {} samples, got {}", expected, actual)
            }
            ImgError::IncompatibleType => {
                write!(f, "factory cannot allocate complex float containers")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ImgError {}

/// Allocation strategy for [`Img`] containers of element type `T`.
pub trait ImgFactory<T>: Send + Sync + fmt::Debug {
    /// Allocate a zero-filled (`T::default()`), zero-min container.
    fn create(&self, dims: &[usize]) -> Img<T>;

    /// Derive a factory for complex spectra using the same storage strategy.
    ///
    /// Factories that cannot hold complex samples keep the default, which
    /// reports [`ImgError::IncompatibleType`].
    fn complex_factory(&self) -> Result<Arc<dyn ImgFactory<Complex32>>, ImgError> {
        Err(ImgError::IncompatibleType)
    }
}

/// Contiguous, heap-backed storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArrayImgFactory;

impl<T: Copy + Default + Send + Sync + 'static> ImgFactory<T> for ArrayImgFactory {
    fn create(&self, dims: &[usize]) -> Img<T> {
        Img::from_parts(
            dims.to_vec(),
            vec![0; dims.len()],
            vec![T::default(); element_count(dims)],
            Arc::new(ArrayImgFactory),
        )
    }

    fn complex_factory(&self) -> Result<Arc<dyn ImgFactory<Complex32>>, ImgError> {
        Ok(Arc::new(ArrayImgFactory))
    }
}

/// Number of samples in a field with the given extents.
pub fn element_count(dims: &[usize]) -> usize {
    if dims.is_empty() {
        0
    } else {
        dims.iter().product()
    }
}

/// Visit every zero-min coordinate of `dims` in storage order, passing the
/// coordinate and its linear index.
pub fn for_each_position<F>(dims: &[usize], mut f: F)
where
    F: FnMut(&[usize], usize),
{
    let total = element_count(dims);
    if total == 0 {
        return;
    }
    let mut position = vec![0usize; dims.len()];
    for linear in 0..total {
        f(&position, linear);
        for (p, &extent) in position.iter_mut().zip(dims) {
            *p += 1;
            if *p < extent {
                break;
            }
            *p = 0;
        }
    }
}

/// N-dimensional field of samples with an explicit origin.
#[derive(Clone)]
pub struct Img<T> {
    dims: Vec<usize>,
    min: Vec<i64>,
    data: Vec<T>,
    factory: Arc<dyn ImgFactory<T>>,
}

impl<T> Img<T> {
    /// Assemble a container from raw parts. Callers guarantee
    /// `data.len() == product(dims)` and `min.len() == dims.len()`.
    pub fn from_parts(
        dims: Vec<usize>,
        min: Vec<i64>,
        data: Vec<T>,
        factory: Arc<dyn ImgFactory<T>>,
    ) -> Self {
        debug_assert_eq!(dims.len(), min.len());
        debug_assert_eq!(element_count(&dims), data.len());
        Self {
            dims,
            min,
            data,
            factory,
        }
    }

    pub fn num_dimensions(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn dimension(&self, d: usize) -> usize {
        self.dims[d]
    }

    pub fn min(&self) -> &[i64] {
        &self.min
    }

    /// Largest coordinate along `d` (inclusive).
    pub fn max(&self, d: usize) -> i64 {
        self.min[d] + self.dims[d] as i64 - 1
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// The factory this container was allocated with.
    pub fn factory(&self) -> Arc<dyn ImgFactory<T>> {
        Arc::clone(&self.factory)
    }

    /// Move the origin of the container to `min`.
    pub fn set_min(&mut self, min: &[i64]) -> Result<(), ImgError> {
        if min.len() != self.dims.len() {
            return Err(ImgError::DimensionMismatch {
                expected: self.dims.len(),
                actual: min.len(),
            });
        }
        self.min.copy_from_slice(min);
        Ok(())
    }

    pub fn translated(mut self, min: &[i64]) -> Result<Self, ImgError> {
        self.set_min(min)?;
        Ok(self)
    }

    /// Linear index of a zero-min coordinate.
    #[inline]
    pub fn index_of(&self, local: &[usize]) -> usize {
        let mut index = 0;
        let mut stride = 1;
        for (&p, &extent) in local.iter().zip(&self.dims) {
            index += p * stride;
            stride *= extent;
        }
        index
    }

    fn local_of(&self, position: &[i64]) -> Option<usize> {
        if position.len() != self.dims.len() {
            return None;
        }
        let mut index = 0;
        let mut stride = 1;
        for d in 0..self.dims.len() {
            let offset = position[d] - self.min[d];
            if offset < 0 || offset >= self.dims[d] as i64 {
                return None;
            }
            index += offset as usize * stride;
            stride *= self.dims[d];
        }
        Some(index)
    }
}

impl<T: Copy> Img<T> {
    #[inline]
    pub fn get_local(&self, local: &[usize]) -> T {
        self.data[self.index_of(local)]
    }

    #[inline]
    pub fn set_local(&mut self, local: &[usize], value: T) {
        let index = self.index_of(local);
        self.data[index] = value;
    }

    /// Sample at an absolute coordinate, `None` outside the interval.
    pub fn get(&self, position: &[i64]) -> Option<T> {
        self.local_of(position).map(|i| self.data[i])
    }
}

impl<T: Copy + Default + Send + Sync + 'static> Img<T> {
    /// Wrap `data` (dimension 0 fastest) as a zero-min container backed by
    /// [`ArrayImgFactory`].
    pub fn from_vec(dims: &[usize], data: Vec<T>) -> Result<Self, ImgError> {
        let expected = element_count(dims);
        if data.len() != expected {
            return Err(ImgError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self::from_parts(
            dims.to_vec(),
            vec![0; dims.len()],
            data,
            Arc::new(ArrayImgFactory),
        ))
    }
}

impl<T: RealSample> Img<T> {
    /// Build a container by evaluating `f` at every zero-min coordinate.
    pub fn from_fn<F>(dims: &[usize], mut f: F) -> Self
    where
        F: FnMut(&[usize]) -> T,
    {
        let mut data = Vec::with_capacity(element_count(dims));
        for_each_position(dims, |pos, _| data.push(f(pos)));
        Self::from_parts(
            dims.to_vec(),
            vec![0; dims.len()],
            data,
            Arc::new(ArrayImgFactory),
        )
    }
}

impl<T: fmt::Debug> fmt::Debug for Img<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Img")
            .field("dims", &self.dims)
            .field("min", &self.min)
            .field("len", &self.data.len())
            .field("factory", &self.factory)
            .finish()
    }
}

impl<T: PartialEq> PartialEq for Img<T> {
    fn eq(&self, other: &Self) -> bool {
        self.dims == other.dims && self.min == other.min && self.data == other.data
    }
}
