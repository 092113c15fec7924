//! Strongly typed named values
//!
//! `NamedValue<T, Tag>` gives a plain value a distinct nominal type so that
//! arguments of the same underlying type (window width vs. height, stencil vs.
//! vsync) cannot be swapped by accident. Construction is explicit; reading the
//! value back is ergonomic through `Deref`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::Deref;

/// A value of type `T` carrying the nominal type `Tag`
///
/// # Examples
/// ```
/// # use laser_engine::foundation::named::NamedValue;
/// enum WidthTag {}
/// type Width = NamedValue<u32, WidthTag>;
///
/// let width = Width::new(640);
/// assert_eq!(*width, 640);
/// assert_eq!(width.into_inner() + 1, 641);
/// ```
pub struct NamedValue<T, Tag> {
    value: T,
    _tag: PhantomData<fn() -> Tag>,
}

impl<T, Tag> NamedValue<T, Tag> {
    /// Wrap a value
    pub const fn new(value: T) -> Self {
        Self { value, _tag: PhantomData }
    }

    /// Borrow the wrapped value
    pub const fn value(&self) -> &T {
        &self.value
    }

    /// Mutably borrow the wrapped value
    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }

    /// Unwrap into the plain value
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: Copy, Tag> NamedValue<T, Tag> {
    /// Copy the wrapped value out
    pub const fn get(&self) -> T {
        self.value
    }
}

impl<T, Tag> Deref for NamedValue<T, Tag> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

// Manual impls keep `Tag` free of trait bounds; tags are usually uninhabited enums.

impl<T: Clone, Tag> Clone for NamedValue<T, Tag> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T: Copy, Tag> Copy for NamedValue<T, Tag> {}

impl<T: Default, Tag> Default for NamedValue<T, Tag> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: PartialEq, Tag> PartialEq for NamedValue<T, Tag> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: Eq, Tag> Eq for NamedValue<T, Tag> {}

impl<T: PartialOrd, Tag> PartialOrd for NamedValue<T, Tag> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.value.partial_cmp(&other.value)
    }
}

impl<T: Ord, Tag> Ord for NamedValue<T, Tag> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<T: Hash, Tag> Hash for NamedValue<T, Tag> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T: fmt::Debug, Tag> fmt::Debug for NamedValue<T, Tag> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl<T: fmt::Display, Tag> fmt::Display for NamedValue<T, Tag> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl<T: Serialize, Tag> Serialize for NamedValue<T, Tag> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>, Tag> Deserialize<'de> for NamedValue<T, Tag> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    enum WidthTag {}
    enum HeightTag {}
    type Width = NamedValue<u32, WidthTag>;
    type Height = NamedValue<u32, HeightTag>;

    fn area(width: Width, height: Height) -> u32 {
        *width * *height
    }

    #[test]
    fn test_named_values_keep_argument_order() {
        assert_eq!(area(Width::new(640), Height::new(480)), 307_200);
    }

    #[test]
    fn test_comparison_delegates_to_value() {
        assert!(Width::new(1) < Width::new(2));
        assert_eq!(Width::new(7), Width::new(7));
        assert_eq!(Width::default().get(), 0);
    }

    #[test]
    fn test_mutation_through_value_mut() {
        let mut width = Width::new(10);
        *width.value_mut() += 5;
        assert_eq!(width.get(), 15);
        assert_eq!(format!("{width}"), "15");
    }
}
