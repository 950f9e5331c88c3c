use parking_lot::RwLock;
use std::sync::Arc;

/// A host-owned value written from callbacks and read by metric producers.
/// Writers replace the whole value; the last write wins.
#[derive(Debug, Default)]
pub struct SharedValue<T> {
    inner: Arc<RwLock<T>>,
}

impl<T> Clone for SharedValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> SharedValue<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value)),
        }
    }

    pub fn get(&self) -> T {
        self.inner.read().clone()
    }

    pub fn set(&self, value: T) {
        *self.inner.write() = value;
    }
}
