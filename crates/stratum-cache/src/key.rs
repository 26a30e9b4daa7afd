//! Typed cache keys.

use std::fmt;
use std::marker::PhantomData;

/// A cache key that remembers the type of value stored under it.
///
/// Declaring keys once and reusing them makes a namespace collision a
/// compile error at the call site instead of a panic at read time.
///
/// ```rust,ignore
/// let key: CacheKey<Profile> = CacheKey::new("user:42");
/// cache.put_typed(&key, profile, None);
/// let profile = cache.get_typed(&key);
/// ```
pub struct CacheKey<T> {
    name: String,
    _value: PhantomData<fn() -> T>,
}

impl<T> CacheKey<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            _value: PhantomData,
        }
    }

    /// The raw string key.
    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl<T> Clone for CacheKey<T> {
    fn clone(&self) -> Self {
        Self::new(self.name.clone())
    }
}

impl<T> fmt::Debug for CacheKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CacheKey").field(&self.name).finish()
    }
}

impl<T> fmt::Display for CacheKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl<T> AsRef<str> for CacheKey<T> {
    fn as_ref(&self) -> &str {
        &self.name
    }
}
