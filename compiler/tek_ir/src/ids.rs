//! 1-based handles into the compiler's shared tables.

use std::fmt;
use std::num::NonZeroU32;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// From the raw 1-based value; `0` is "none".
            #[inline]
            pub const fn new(raw: u32) -> Option<Self> {
                match NonZeroU32::new(raw) {
                    Some(raw) => Some($name(raw)),
                    None => None,
                }
            }

            /// From a 0-based table slot.
            #[inline]
            #[expect(
                clippy::cast_possible_truncation,
                reason = "table capacities are capped at u32::MAX slots"
            )]
            pub const fn from_index(index: usize) -> Self {
                match NonZeroU32::new(index as u32 + 1) {
                    Some(raw) => $name(raw),
                    None => panic!("table slot out of id range"),
                }
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0.get()
            }

            /// The 0-based table slot.
            #[inline]
            pub const fn index(self) -> usize {
                (self.0.get() - 1) as usize
            }

            #[inline]
            pub const fn key(self) -> NonZeroU32 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

define_id!(
    /// An interned string.
    StrId
);
define_id!(
    /// A registered source file.
    FileId
);
define_id!(
    /// A registered library.
    LibId
);
