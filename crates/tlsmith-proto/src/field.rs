//! Computed-or-forced message fields.
//!
//! Every wire field of a message is a [`Field`]. Preparation fills in the
//! computed value; a test author may instead force a value, after which
//! preparation leaves it alone and serialisation emits it verbatim, even when
//! it contradicts the rest of the message (a wrong length, a bogus version).
//!
//! Each variant lists its overridable fields through [`ModifiableFields`],
//! generated by the `modifiable_fields!` macro, so fields can be enumerated,
//! read and forced by name.

use std::fmt;

use rand::{RngCore, seq::SliceRandom};

use crate::errors::{ProtocolError, Result};

/// A message field that is unset, computed, or forced by the caller.
#[derive(Clone, PartialEq, Eq)]
pub enum Field<T> {
    /// Neither computed nor forced yet
    Unset,
    /// Computed during preparation or read by a parser
    Set(T),
    /// Pinned by the caller; never overwritten by preparation
    Forced(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Unset
    }
}

impl<T: fmt::Debug> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => f.write_str("Unset"),
            Self::Set(value) => value.fmt(f),
            Self::Forced(value) => write!(f, "Forced({value:?})"),
        }
    }
}

impl<T> Field<T> {
    /// A field holding a computed value.
    pub fn new(value: T) -> Self {
        Self::Set(value)
    }

    /// Current value, forced or computed.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Unset => None,
            Self::Set(value) | Self::Forced(value) => Some(value),
        }
    }

    /// Current value, or [`ProtocolError::FieldUnset`] naming the field.
    pub fn require(&self, name: &'static str) -> Result<&T> {
        self.value().ok_or(ProtocolError::FieldUnset { field: name })
    }

    /// Store a computed value unless the field is forced.
    pub fn compute(&mut self, value: T) {
        if !self.is_forced() {
            *self = Self::Set(value);
        }
    }

    /// Pin the field to `value`.
    pub fn force(&mut self, value: T) {
        *self = Self::Forced(value);
    }

    /// Drop a computed value. Forced values are kept.
    pub fn clear_computed(&mut self) {
        if !self.is_forced() {
            *self = Self::Unset;
        }
    }

    /// True if the caller pinned this field.
    pub fn is_forced(&self) -> bool {
        matches!(self, Self::Forced(_))
    }

    /// True if the field holds any value.
    pub fn is_set(&self) -> bool {
        !matches!(self, Self::Unset)
    }
}

impl<T: Copy> Field<T> {
    /// Current value by copy.
    pub fn get(&self) -> Option<T> {
        self.value().copied()
    }
}

/// Shape of a field on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// One byte
    U8,
    /// Two bytes, big endian
    U16,
    /// Three bytes, big endian
    U24,
    /// Four bytes, big endian
    U32,
    /// Opaque byte string
    Bytes,
}

/// A field value detached from its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// One byte
    U8(u8),
    /// Two bytes
    U16(u16),
    /// Three bytes stored in a u32
    U24(u32),
    /// Four bytes
    U32(u32),
    /// Opaque bytes
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// Kind of this value.
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::U8(_) => FieldKind::U8,
            Self::U16(_) => FieldKind::U16,
            Self::U24(_) => FieldKind::U24,
            Self::U32(_) => FieldKind::U32,
            Self::Bytes(_) => FieldKind::Bytes,
        }
    }
}

/// Static description of one overridable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Name used by [`ModifiableFields::field`] and friends
    pub name: &'static str,
    /// Wire shape
    pub kind: FieldKind,
}

/// Conversion between a field's Rust type and [`FieldValue`].
pub trait FieldType: Sized {
    /// Wrap `self` as a value of the given kind.
    fn to_value(&self, kind: FieldKind) -> FieldValue;

    /// Unwrap a value, or `None` when it does not fit the kind.
    fn from_value(value: FieldValue, kind: FieldKind) -> Option<Self>;
}

impl FieldType for u8 {
    fn to_value(&self, _kind: FieldKind) -> FieldValue {
        FieldValue::U8(*self)
    }

    fn from_value(value: FieldValue, _kind: FieldKind) -> Option<Self> {
        match value {
            FieldValue::U8(v) => Some(v),
            _ => None,
        }
    }
}

impl FieldType for u16 {
    fn to_value(&self, _kind: FieldKind) -> FieldValue {
        FieldValue::U16(*self)
    }

    fn from_value(value: FieldValue, _kind: FieldKind) -> Option<Self> {
        match value {
            FieldValue::U16(v) => Some(v),
            _ => None,
        }
    }
}

impl FieldType for u32 {
    fn to_value(&self, kind: FieldKind) -> FieldValue {
        match kind {
            FieldKind::U24 => FieldValue::U24(*self),
            _ => FieldValue::U32(*self),
        }
    }

    fn from_value(value: FieldValue, kind: FieldKind) -> Option<Self> {
        match (value, kind) {
            (FieldValue::U24(v), FieldKind::U24) if v <= 0x00FF_FFFF => Some(v),
            (FieldValue::U32(v), FieldKind::U32) => Some(v),
            _ => None,
        }
    }
}

impl FieldType for Vec<u8> {
    fn to_value(&self, _kind: FieldKind) -> FieldValue {
        FieldValue::Bytes(self.clone())
    }

    fn from_value(value: FieldValue, _kind: FieldKind) -> Option<Self> {
        match value {
            FieldValue::Bytes(v) => Some(v),
            _ => None,
        }
    }
}

/// Named access to the overridable fields of a message.
pub trait ModifiableFields {
    /// Every overridable field, in wire order.
    fn descriptors(&self) -> &'static [FieldDescriptor];

    /// Current value of `name`, `None` if unset.
    fn field(&self, name: &str) -> Result<Option<FieldValue>>;

    /// Pin `name` to `value`.
    fn force_field(&mut self, name: &str, value: FieldValue) -> Result<()>;

    /// True if `name` is pinned.
    fn is_forced(&self, name: &str) -> Result<bool>;

    /// Descriptor for `name`.
    fn descriptor(&self, name: &str) -> Option<&'static FieldDescriptor> {
        self.descriptors().iter().find(|d| d.name == name)
    }
}

/// Pick one overridable field uniformly at random.
///
/// Returns `None` for messages without overridable fields.
pub fn random_field(
    fields: &dyn ModifiableFields,
    rng: &mut dyn RngCore,
) -> Option<&'static FieldDescriptor> {
    fields.descriptors().choose(rng)
}

/// Convert `value` for a field, reporting a mismatch against its descriptor.
pub fn coerce<T: FieldType>(name: &str, kind: FieldKind, value: FieldValue) -> Result<T> {
    let actual = value.kind();
    T::from_value(value, kind).ok_or_else(|| ProtocolError::FieldKindMismatch {
        field: name.to_string(),
        expected: kind,
        actual,
    })
}

/// Implement [`ModifiableFields`] for a struct from a list of
/// `"name" => path.to.field : Kind` entries.
macro_rules! modifiable_fields {
    ($ty:ty { $($name:literal => $($path:ident).+ : $kind:ident),* $(,)? }) => {
        impl $crate::field::ModifiableFields for $ty {
            fn descriptors(&self) -> &'static [$crate::field::FieldDescriptor] {
                const DESCRIPTORS: &[$crate::field::FieldDescriptor] = &[
                    $($crate::field::FieldDescriptor {
                        name: $name,
                        kind: $crate::field::FieldKind::$kind,
                    }),*
                ];
                DESCRIPTORS
            }

            fn field(
                &self,
                name: &str,
            ) -> $crate::errors::Result<Option<$crate::field::FieldValue>> {
                match name {
                    $($name => Ok(self.$($path).+.value().map(|v| {
                        $crate::field::FieldType::to_value(v, $crate::field::FieldKind::$kind)
                    })),)*
                    _ => Err($crate::errors::ProtocolError::UnknownField { name: name.to_string() }),
                }
            }

            fn force_field(
                &mut self,
                name: &str,
                value: $crate::field::FieldValue,
            ) -> $crate::errors::Result<()> {
                match name {
                    $($name => {
                        let v = $crate::field::coerce(name, $crate::field::FieldKind::$kind, value)?;
                        self.$($path).+.force(v);
                        Ok(())
                    },)*
                    _ => {
                        let _ = value;
                        Err($crate::errors::ProtocolError::UnknownField { name: name.to_string() })
                    },
                }
            }

            fn is_forced(&self, name: &str) -> $crate::errors::Result<bool> {
                match name {
                    $($name => Ok(self.$($path).+.is_forced()),)*
                    _ => Err($crate::errors::ProtocolError::UnknownField { name: name.to_string() }),
                }
            }
        }
    };
}

pub(crate) use modifiable_fields;
