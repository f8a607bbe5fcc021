/// Parallel or sequential execution depending on the `threading` feature.
///
/// With `threading` this re-exports rayon's prelude and `join`. Without it,
/// `par_iter()` falls back to `iter()` and `join` runs both closures in
/// order, so call sites read the same either way.
#[cfg(feature = "threading")]
pub use rayon::prelude::*;

#[cfg(feature = "threading")]
pub use rayon::join;

#[cfg(not(feature = "threading"))]
mod sequential {
    /// Sequential stand-in for `rayon::prelude::IntoParallelRefIterator`.
    pub trait IntoParallelRefIterator<'data> {
        type Iter: Iterator<Item = Self::Item>;
        type Item: 'data;
        fn par_iter(&'data self) -> Self::Iter;
    }

    impl<'data, T: 'data> IntoParallelRefIterator<'data> for [T] {
        type Iter = std::slice::Iter<'data, T>;
        type Item = &'data T;
        fn par_iter(&'data self) -> Self::Iter {
            self.iter()
        }
    }

    /// Sequential stand-in for `rayon::join`.
    pub fn join<A, B, RA, RB>(a: A, b: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send,
    {
        (a(), b())
    }
}

#[cfg(not(feature = "threading"))]
pub use sequential::*;
