//! Densely numbered entity references.
//!
//! Every other crate in the compiler identifies its long-lived values — code-things, slots, AIR
//! instructions, string constants, ELF things — by a small `Copy` index type rather than by
//! pointer or `Rc`. This crate provides the `EntityRef` trait plus two map types built on top of
//! it: `PrimaryMap`, which owns a dense `Vec` and hands out fresh keys, and `SecondaryMap`, which
//! associates extra data with keys it didn't allocate.

mod keys;
mod map;
mod primary;

pub use keys::Keys;
pub use map::SecondaryMap;
pub use primary::PrimaryMap;

/// A type that can be used as a key in a dense entity map.
///
/// Implementors are required to be small `Copy` values, usually a single `u32`, so that
/// `PrimaryMap`/`SecondaryMap` can store them cheaply and convert to/from a plain `usize` index.
pub trait EntityRef: Copy + Eq {
    fn new(index: usize) -> Self;
    fn index(self) -> usize;
}

/// Declare a new entity reference type wrapping a `u32`.
///
/// ```ignore
/// entity_ref!(pub struct Slot);
/// ```
#[macro_export]
macro_rules! entity_ref {
    ($(#[$attr:meta])* $vis:vis struct $name:ident) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        $vis struct $name(u32);

        impl $crate::EntityRef for $name {
            fn new(index: usize) -> Self {
                debug_assert!(index < (u32::MAX as usize));
                $name(index as u32)
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(f, "{}{}", stringify!($name), self.0)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(f, "{}{}", stringify!($name), self.0)
            }
        }
    };
}
