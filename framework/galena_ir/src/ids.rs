//! Arena ids for the test model.
//!
//! Each id is a `u32` index into the arena owned by `TestModel`. Ids are only
//! meaningful for the model that issued them.

use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub const fn new(index: u32) -> Self {
                $name(index)
            }

            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            /// Id for the next slot of an arena holding `len` entries.
            ///
            /// # Panics
            /// Panics if the arena outgrows `u32`.
            #[inline]
            pub fn from_len(len: usize) -> Self {
                let Ok(raw) = u32::try_from(len) else {
                    panic!(concat!(stringify!($name), " arena overflow"));
                };
                $name(raw)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

define_id!(
    /// Index of a `Test` in the model arena.
    TestId
);

define_id!(
    /// Index of a `TestParameter` in the model arena.
    ParameterId
);

define_id!(
    /// Index of a data context in the model arena.
    DataContextId
);
