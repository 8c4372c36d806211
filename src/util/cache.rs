use crate::error::Result;

/// Single-slot cache. The value is computed by `fill` on the first `get`
/// and reused until `invalidate` or `refresh` is called.
///
/// Not shared: callers hold it by `&mut` on one thread.
pub struct Memo<T> {
    slot: Option<T>,
    fill: Box<dyn FnMut() -> Result<T>>,
}

impl<T> Memo<T> {
    pub fn new(fill: impl FnMut() -> Result<T> + 'static) -> Self {
        Self { slot: None, fill: Box::new(fill) }
    }

    /// Cached value, computing it first if the slot is empty.
    /// A failed computation leaves the slot empty.
    pub fn get(&mut self) -> Result<&T> {
        let value = match self.slot.take() {
            Some(v) => v,
            None    => (self.fill)()?,
        };
        Ok(self.slot.insert(value))
    }

    pub fn invalidate(&mut self) {
        self.slot = None;
    }

    /// Recompute now, replacing any cached value.
    pub fn refresh(&mut self) -> Result<&T> {
        self.invalidate();
        self.get()
    }

    pub fn is_cached(&self) -> bool {
        self.slot.is_some()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo").field("slot", &self.slot).finish_non_exhaustive()
    }
}
