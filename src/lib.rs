//! This crate provides clonable type-erased containers that store small values
//! inline without heap allocation.
//!
//! [`SmallAny`] holds a value of any `Clone + 'static` type.
//! [`SmallSendAny`] is the same for `Send + Sync` types and can be shared across threads.
//! [`SmallVariant`] holds a value whose type is one of a fixed list, checked at compile time.
//!
//! Values up to [`INLINE_CAPACITY`] bytes with alignment up to [`INLINE_ALIGN`]
//! are stored inside the container. Anything larger is moved to the heap.
//! Each stored type gets one static table of operations, shared by every
//! container holding that type, which is used to clone, drop and identify the
//! value once its static type is gone.
//!
//! ## Usage
//!
//! ```
//! use smallany::{Error, SmallAny, SmallVariant};
//!
//! // i32 fits inline storage, so no allocation is performed.
//! let mut a = SmallAny::new(42i32);
//! assert_eq!(a.extract::<i32>(), Some(&42));
//!
//! // Reassign with a value of another type.
//! a.assign(String::from("hello"));
//! assert_eq!(a.extract::<String>().map(String::as_str), Some("hello"));
//! assert_eq!(a.extract::<i32>(), None);
//!
//! // The failing form reports a mismatch and returns a copy on success.
//! assert!(matches!(a.extract_or_fail::<i32>(), Err(Error::TypeMismatch { .. })));
//! let copy: String = a.extract_or_fail().unwrap();
//! assert_eq!(copy, "hello");
//!
//! // Large values go to the heap and still clone independently.
//! let big = SmallAny::new([7u8; 64]);
//! assert!(!big.is_inline());
//! let cloned = big.clone();
//! drop(big);
//! assert_eq!(cloned.extract::<[u8; 64]>(), Some(&[7u8; 64]));
//!
//! // Closed set of accepted types.
//! let v: SmallVariant<(u32, String)> = SmallVariant::new(5u32);
//! assert_eq!(v.index(), 0);
//! ```

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

mod any;
mod error;
mod raw;
mod storage;
mod variant;

pub use self::{
    any::{SmallAny, SmallSendAny},
    error::{Error, Result},
    storage::{INLINE_ALIGN, INLINE_CAPACITY},
    variant::{At, Member, SmallVariant, TypeList},
};

#[cfg(test)]
mod tests;
