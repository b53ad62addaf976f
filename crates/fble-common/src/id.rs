//! `u32` newtype ids, the idiom used throughout this workspace for anything
//! allocated in an arena (heap objects, interned types, bytecode blocks,
//! profiler blocks). Keeping them as distinct types catches the "wrong
//! kind of index" bugs that plain `u32` would let through.

/// Declare a `u32`-backed id newtype with the common set of derives and
/// conversions every arena index in this workspace needs.
#[macro_export]
macro_rules! define_id {
    ($(#[$meta:meta])* $vis:vis struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        $vis struct $name(pub u32);

        impl $name {
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub const fn from_index(i: usize) -> Self {
                $name(i as u32)
            }
        }

        impl From<u32> for $name {
            fn from(v: u32) -> Self {
                $name(v)
            }
        }

        impl From<$name> for u32 {
            fn from(v: $name) -> Self {
                v.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }
    };
}
