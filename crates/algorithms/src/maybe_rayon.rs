//! rayon when the `parallel` feature is on, plain iterators otherwise.
//!
//! Only `into_par_iter` is used (row-parallel flow direction and the
//! scenario fan-out), so the sequential stand-in maps it to `into_iter` and
//! lets the rest of the chain resolve to `Iterator` methods.

#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
mod sequential {
    pub trait IntoParallelIterator {
        type Iter;
        type Item;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        type Item = I::Item;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }
}

#[cfg(not(feature = "parallel"))]
pub use sequential::*;
