use std::any::{TypeId, type_name};
use std::borrow::Cow;
use std::fmt;

/// Identifies a registration in the [`Container`](crate::container::Container).
///
/// Typed registrations are keyed by [`TypeId`], named registrations by any string. The two
/// never collide: `Key::of::<Auth>()` and `Key::from("my_app::Auth")` are different keys
/// even though both display as `my_app::Auth`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Type { id: TypeId, name: &'static str },
    Name(Cow<'static, str>),
}

impl Key {
    /// The key under which values of type `T` are registered.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Key::Type { id: TypeId::of::<T>(), name: type_name::<T>() }
    }

    /// The registered name, or the type's name for typed keys.
    #[inline]
    pub fn as_str(&self) -> &str {
        match self {
            Key::Type { name, .. } => name,
            Key::Name(name) => name,
        }
    }
}

impl From<&'static str> for Key {
    fn from(value: &'static str) -> Self {
        Key::Name(Cow::Borrowed(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Name(Cow::Owned(value))
    }
}

impl From<&Key> for Key {
    fn from(value: &Key) -> Self {
        value.clone()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
