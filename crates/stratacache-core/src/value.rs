//! The result of a cache read.

/// A cache lookup result that distinguishes "found a value" from "found
/// nothing", where nothing includes a deliberately cached negative result.
///
/// `NoValue` is the canonical miss signal: callers that cache nulls see it
/// both for a true miss and for a stored negative entry, and the two are
/// intentionally indistinguishable at this level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue<T> {
    /// A value was found.
    Value(T),
    /// Nothing usable was found.
    NoValue,
}

impl<T> CacheValue<T> {
    /// True when a value is present.
    pub fn has_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Borrow the value, if present.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            Self::NoValue => None,
        }
    }

    /// Consume into an `Option`.
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            Self::NoValue => None,
        }
    }

    /// Consume into the value or a caller-provided default.
    pub fn into_value_or(self, default: T) -> T {
        match self {
            Self::Value(v) => v,
            Self::NoValue => default,
        }
    }

    /// Map the contained value, preserving `NoValue`.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> CacheValue<U> {
        match self {
            Self::Value(v) => CacheValue::Value(f(v)),
            Self::NoValue => CacheValue::NoValue,
        }
    }
}

impl<T> From<Option<T>> for CacheValue<T> {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => Self::Value(v),
            None => Self::NoValue,
        }
    }
}
