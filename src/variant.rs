//! Closed-set container.
//!
//! A [`SmallVariant<L>`] holds one value whose type is a member of the tuple
//! `L`. Membership is checked by the compiler through [`Member`], so storing
//! any other type does not build:
//!
//! ```compile_fail
//! # use smallany::SmallVariant;
//! let v: SmallVariant<(i32, bool)> = SmallVariant::new(1.5f64);
//! ```
//!
//! Storage, dispatch, cloning and extraction are the same as for
//! [`SmallAny`], which it can be widened into and narrowed from.

use core::{any::TypeId, fmt, marker::PhantomData};

use crate::{
    any::{or_alloc_error, SmallAny},
    error::{Error, Result},
    raw::RawAny,
};

mod sealed {
    pub trait Sealed {}
}

/// Position marker used to tell apart the members of a type list.
/// Inferred at call sites, never named by callers.
#[derive(Debug)]
pub struct At<const N: usize>;

/// A tuple of clonable `'static` types usable as the type list of [`SmallVariant`].
///
/// Implemented for tuples of one to eight elements.
pub trait TypeList: sealed::Sealed + 'static {
    /// Number of types in the list.
    const LEN: usize;

    /// Returns the position of the first list member with the given type id.
    fn index_of(id: TypeId) -> Option<usize>;
}

/// Proof that `T` is a member of the list, at position `I`.
pub trait Member<T, I>: TypeList {
    /// Position of `T` in the list.
    const INDEX: usize;
}

macro_rules! impl_member {
    ([$($all:ident),+] $idx:literal $t:ident) => {
        impl<$($all: Clone + 'static),+> Member<$t, At<$idx>> for ($($all,)+) {
            const INDEX: usize = $idx;
        }
    };
}

macro_rules! impl_type_list {
    (@list [$($all:ident),+]) => {
        impl<$($all: Clone + 'static),+> sealed::Sealed for ($($all,)+) {}

        impl<$($all: Clone + 'static),+> TypeList for ($($all,)+) {
            const LEN: usize = [$(stringify!($all)),+].len();

            fn index_of(id: TypeId) -> Option<usize> {
                [$(TypeId::of::<$all>()),+].iter().position(|member| *member == id)
            }
        }
    };
    ($list:tt; $($idx:literal => $t:ident),+) => {
        impl_type_list!(@list $list);
        $( impl_member!($list $idx $t); )+
    };
}

impl_type_list!([A]; 0 => A);
impl_type_list!([A, B]; 0 => A, 1 => B);
impl_type_list!([A, B, C]; 0 => A, 1 => B, 2 => C);
impl_type_list!([A, B, C, D]; 0 => A, 1 => B, 2 => C, 3 => D);
impl_type_list!([A, B, C, D, E]; 0 => A, 1 => B, 2 => C, 3 => D, 4 => E);
impl_type_list!([A, B, C, D, E, F]; 0 => A, 1 => B, 2 => C, 3 => D, 4 => E, 5 => F);
impl_type_list!([A, B, C, D, E, F, G]; 0 => A, 1 => B, 2 => C, 3 => D, 4 => E, 5 => F, 6 => G);
impl_type_list!([A, B, C, D, E, F, G, H]; 0 => A, 1 => B, 2 => C, 3 => D, 4 => E, 5 => F, 6 => G, 7 => H);

/// Type-erased value restricted to the members of `L`, with fixed-size inlined storage.
///
/// # Example
///
/// ```
/// # use smallany::SmallVariant;
/// let mut v: SmallVariant<(i32, String)> = SmallVariant::new(7i32);
/// assert_eq!(v.index(), 0);
///
/// v.assign(String::from("seven"));
/// assert_eq!(v.index(), 1);
/// assert_eq!(v.extract::<String, _>().map(String::as_str), Some("seven"));
/// ```
pub struct SmallVariant<L: TypeList> {
    raw: RawAny,
    index: usize,
    list: PhantomData<fn() -> L>,
}

impl<L: TypeList> Clone for SmallVariant<L> {
    #[inline]
    fn clone(&self) -> Self {
        SmallVariant {
            raw: or_alloc_error(self.raw.duplicate()),
            index: self.index,
            list: PhantomData,
        }
    }
}

impl<L: TypeList> fmt::Debug for SmallVariant<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmallVariant")
            .field("index", &self.index)
            .field("type_name", &self.type_name())
            .field("inline", &self.is_inline())
            .finish_non_exhaustive()
    }
}

impl<L: TypeList> SmallVariant<L> {
    /// Returns `true` if the type `T` can be stored without allocation.
    pub const fn fits<T>() -> bool {
        RawAny::fits::<T>()
    }

    /// Construct new [`SmallVariant`] holding `value`.
    ///
    /// `T` must be a member of `L`. Allocation failure aborts, see
    /// [`SmallVariant::try_new`] for the fallible form.
    #[inline]
    pub fn new<T, I>(value: T) -> Self
    where
        T: Clone + 'static,
        L: Member<T, I>,
    {
        SmallVariant {
            raw: or_alloc_error(RawAny::install(value)),
            index: <L as Member<T, I>>::INDEX,
            list: PhantomData,
        }
    }

    /// Construct new [`SmallVariant`], reporting allocation failure as [`Error::AllocationFailure`].
    #[inline]
    pub fn try_new<T, I>(value: T) -> Result<Self>
    where
        T: Clone + 'static,
        L: Member<T, I>,
    {
        Ok(SmallVariant {
            raw: RawAny::install(value)?,
            index: <L as Member<T, I>>::INDEX,
            list: PhantomData,
        })
    }

    /// Narrows an open container into this variant if its value's type is a member of `L`.
    ///
    /// Otherwise returns [`Error::InvalidConcreteType`] together with the untouched container.
    ///
    /// # Example
    ///
    /// ```
    /// # use smallany::{Error, SmallAny, SmallVariant};
    /// let v = SmallVariant::<(u8, bool)>::try_from_any(SmallAny::new(true)).unwrap();
    /// assert_eq!(v.index(), 1);
    ///
    /// let (error, any) = SmallVariant::<(u8, bool)>::try_from_any(SmallAny::new(1.0f32)).unwrap_err();
    /// assert!(matches!(error, Error::InvalidConcreteType { .. }));
    /// assert_eq!(any.extract::<f32>(), Some(&1.0));
    /// ```
    pub fn try_from_any(any: SmallAny) -> core::result::Result<Self, (Error, SmallAny)> {
        match L::index_of(any.identity()) {
            Some(index) => Ok(SmallVariant {
                raw: any.into_raw(),
                index,
                list: PhantomData,
            }),
            None => {
                tracing::debug!(
                    type_name = any.type_name(),
                    "value type is not a member of the variant type list"
                );
                let error = Error::InvalidConcreteType {
                    found: any.type_name(),
                };
                Err((error, any))
            }
        }
    }

    /// Widens into an open container. The value is not copied.
    #[inline]
    pub fn into_any(self) -> SmallAny {
        SmallAny::from_raw(self.raw)
    }

    /// Replaces the held value with another member of `L`.
    ///
    /// The new value is stored first and the previous one dropped afterwards.
    #[inline]
    pub fn assign<T, I>(&mut self, value: T)
    where
        T: Clone + 'static,
        L: Member<T, I>,
    {
        *self = Self::new(value);
    }

    /// Fallible form of [`SmallVariant::assign`].
    /// On error the previously held value is left in place.
    #[inline]
    pub fn try_assign<T, I>(&mut self, value: T) -> Result<()>
    where
        T: Clone + 'static,
        L: Member<T, I>,
    {
        *self = Self::try_new(value)?;
        Ok(())
    }

    /// Clones the container, reporting allocation failure as [`Error::AllocationFailure`].
    #[inline]
    pub fn try_clone(&self) -> Result<Self> {
        Ok(SmallVariant {
            raw: self.raw.duplicate()?,
            index: self.index,
            list: PhantomData,
        })
    }

    /// Position in `L` of the held value's type.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the type id of the stored value.
    #[inline]
    pub fn identity(&self) -> TypeId {
        self.raw.type_id()
    }

    /// Returns the name of the stored value's type, for diagnostics.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.raw.type_name()
    }

    /// Returns `true` if the stored value is of type `T`.
    #[inline]
    pub fn is<T, I>(&self) -> bool
    where
        T: 'static,
        L: Member<T, I>,
    {
        self.raw.is::<T>()
    }

    /// Returns `true` if the value lives in the inline buffer rather than on the heap.
    #[inline]
    pub fn is_inline(&self) -> bool {
        self.raw.is_inline()
    }

    /// Returns some reference to the stored value if it is of type `T`.
    /// Otherwise returns none.
    #[inline]
    pub fn extract<T, I>(&self) -> Option<&T>
    where
        T: 'static,
        L: Member<T, I>,
    {
        self.raw.downcast_ref()
    }

    /// Returns some mutable reference to the stored value if it is of type `T`.
    /// Otherwise returns none.
    #[inline]
    pub fn extract_mut<T, I>(&mut self) -> Option<&mut T>
    where
        T: 'static,
        L: Member<T, I>,
    {
        self.raw.downcast_mut()
    }

    /// Returns a clone of the stored value if it is of type `T`.
    /// Otherwise returns [`Error::TypeMismatch`] and leaves the container untouched.
    pub fn extract_or_fail<T, I>(&self) -> Result<T>
    where
        T: Clone + 'static,
        L: Member<T, I>,
    {
        self.extract::<T, I>()
            .cloned()
            .ok_or_else(|| Error::TypeMismatch {
                expected: core::any::type_name::<T>(),
                found: self.type_name(),
            })
    }

    /// Returns the stored value if it is of type `T`.
    /// Otherwise return self back.
    #[inline]
    pub fn downcast<T, I>(self) -> core::result::Result<T, Self>
    where
        T: 'static,
        L: Member<T, I>,
    {
        let index = self.index;
        self.raw.downcast().map_err(|raw| SmallVariant {
            raw,
            index,
            list: PhantomData,
        })
    }
}
