//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects carry no identity and are compared by their attribute values.
/// They are immutable: to "change" one, construct a new value.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct DisplayName {
///     first: String,
///     last: String,
/// }
///
/// impl ValueObject for DisplayName {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
