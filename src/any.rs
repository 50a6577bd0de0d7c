use core::{any::TypeId, fmt};

use alloc::alloc::handle_alloc_error;

use crate::{
    error::{Error, Result},
    raw::RawAny,
    storage::HeapAllocError,
};

/// Unwraps an engine result, treating allocation failure like `Box::new` does.
pub(crate) fn or_alloc_error<T>(result: core::result::Result<T, HeapAllocError>) -> T {
    match result {
        Ok(value) => value,
        Err(HeapAllocError { layout }) => handle_alloc_error(layout),
    }
}

/// Clonable `dyn Any` with fixed-size inlined storage.
///
/// Types that fit in [`INLINE_CAPACITY`] bytes with alignment up to
/// [`INLINE_ALIGN`] are stored without allocation. Types that are too large
/// or too aligned are moved to the heap.
///
/// Cloning a [`SmallAny`] clones the held value into storage of the same kind.
///
/// [`INLINE_CAPACITY`]: crate::INLINE_CAPACITY
/// [`INLINE_ALIGN`]: crate::INLINE_ALIGN
pub struct SmallAny {
    raw: RawAny,
}

impl Clone for SmallAny {
    #[inline]
    fn clone(&self) -> Self {
        SmallAny {
            raw: or_alloc_error(self.raw.duplicate()),
        }
    }
}

impl fmt::Debug for SmallAny {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmallAny")
            .field("type_name", &self.type_name())
            .field("inline", &self.is_inline())
            .finish_non_exhaustive()
    }
}

impl SmallAny {
    /// Returns `true` if the type `T` fits and can be stored without allocation.
    /// If `true`, then `SmallAny::new::<T>` is guaranteed to not allocate.
    ///
    /// # Example
    ///
    /// ```
    /// # use smallany::SmallAny;
    /// assert!(SmallAny::fits::<u32>());
    /// assert!(!SmallAny::fits::<[u8; 64]>());
    /// ```
    pub const fn fits<T>() -> bool {
        RawAny::fits::<T>()
    }

    /// Construct new [`SmallAny`] with the given value.
    ///
    /// If the type `T` fits in the storage, it is stored without allocation.
    /// Otherwise, it will be boxed. Allocation failure aborts like `Box::new`,
    /// see [`SmallAny::try_new`] for the fallible form.
    ///
    /// Passing another [`SmallAny`] stores that container as the value, so the
    /// result holds a `SmallAny`, not the inner value. Use [`Clone::clone`] to
    /// copy a container.
    ///
    /// # Example
    ///
    /// ```
    /// # use smallany::SmallAny;
    /// let a = SmallAny::new(42i32);
    ///
    /// assert_eq!(a.extract::<i32>(), Some(&42));
    /// ```
    #[inline]
    pub fn new<T>(value: T) -> Self
    where
        T: Clone + 'static,
    {
        SmallAny {
            raw: or_alloc_error(RawAny::install(value)),
        }
    }

    /// Construct new [`SmallAny`], reporting allocation failure as [`Error::AllocationFailure`].
    #[inline]
    pub fn try_new<T>(value: T) -> Result<Self>
    where
        T: Clone + 'static,
    {
        Ok(SmallAny {
            raw: RawAny::install(value)?,
        })
    }

    pub(crate) fn from_raw(raw: RawAny) -> Self {
        SmallAny { raw }
    }

    pub(crate) fn into_raw(self) -> RawAny {
        self.raw
    }

    /// Replaces the held value with `value`, which may be of a different type.
    ///
    /// The new value is stored first and the previous one dropped afterwards.
    /// As with [`SmallAny::new`], assigning a [`SmallAny`] nests it.
    /// To copy another container, write `*self = other.clone()`.
    ///
    /// # Example
    ///
    /// ```
    /// # use smallany::SmallAny;
    /// let mut a = SmallAny::new(42i32);
    /// a.assign(String::from("hello"));
    ///
    /// assert_eq!(a.extract::<String>().map(String::as_str), Some("hello"));
    /// assert_eq!(a.extract::<i32>(), None);
    /// ```
    #[inline]
    pub fn assign<T>(&mut self, value: T)
    where
        T: Clone + 'static,
    {
        *self = Self::new(value);
    }

    /// Fallible form of [`SmallAny::assign`].
    /// On error the previously held value is left in place.
    #[inline]
    pub fn try_assign<T>(&mut self, value: T) -> Result<()>
    where
        T: Clone + 'static,
    {
        *self = Self::try_new(value)?;
        Ok(())
    }

    /// Clones the container, reporting allocation failure as [`Error::AllocationFailure`].
    #[inline]
    pub fn try_clone(&self) -> Result<Self> {
        Ok(SmallAny {
            raw: self.raw.duplicate()?,
        })
    }

    /// Returns the type id of the stored value.
    ///
    /// # Example
    ///
    /// ```
    /// # use smallany::SmallAny;
    /// use core::any::TypeId;
    ///
    /// let a = SmallAny::new(42u32);
    ///
    /// assert_eq!(a.identity(), TypeId::of::<u32>());
    /// ```
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
    pub fn is<T>(&self) -> bool
    where
        T: 'static,
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
    pub fn extract<T>(&self) -> Option<&T>
    where
        T: 'static,
    {
        self.raw.downcast_ref()
    }

    /// Returns some mutable reference to the stored value if it is of type `T`.
    /// Otherwise returns none.
    #[inline]
    pub fn extract_mut<T>(&mut self) -> Option<&mut T>
    where
        T: 'static,
    {
        self.raw.downcast_mut()
    }

    /// Returns a clone of the stored value if it is of type `T`.
    /// Otherwise returns [`Error::TypeMismatch`] and leaves the container untouched.
    ///
    /// # Example
    ///
    /// ```
    /// # use smallany::{Error, SmallAny};
    /// let a = SmallAny::new(42i32);
    ///
    /// assert_eq!(a.extract_or_fail::<i32>(), Ok(42));
    /// assert!(matches!(a.extract_or_fail::<u8>(), Err(Error::TypeMismatch { .. })));
    /// ```
    pub fn extract_or_fail<T>(&self) -> Result<T>
    where
        T: Clone + 'static,
    {
        self.extract::<T>()
            .cloned()
            .ok_or_else(|| Error::TypeMismatch {
                expected: core::any::type_name::<T>(),
                found: self.type_name(),
            })
    }

    /// Returns the stored value if it is of type `T`.
    /// Otherwise return self back.
    ///
    /// This will unbox the value if it was stored as boxed.
    #[inline]
    pub fn downcast<T>(self) -> core::result::Result<T, SmallAny>
    where
        T: 'static,
    {
        self.raw.downcast().map_err(SmallAny::from_raw)
    }

    /// Returns reference to the stored value without type checking.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the type is correct.
    #[inline]
    pub unsafe fn extract_unchecked<T>(&self) -> &T
    where
        T: 'static,
    {
        unsafe { self.raw.downcast_ref_unchecked() }
    }
}

/// Clonable `dyn Any` with fixed-size inlined storage that can cross threads.
///
/// Same storage and dispatch as [`SmallAny`], but every stored type must be
/// `Send` and `Sync`, and the container itself is `Send` and `Sync`.
/// It performs no synchronization: share it behind a lock to mutate it from
/// several threads.
///
/// # Example
///
/// ```
/// # use smallany::SmallSendAny;
/// use std::sync::{Arc, Mutex};
///
/// let shared = Arc::new(Mutex::new(SmallSendAny::new(1u32)));
/// let worker = {
///     let shared = Arc::clone(&shared);
///     std::thread::spawn(move || shared.lock().unwrap().assign(String::from("done")))
/// };
/// worker.join().unwrap();
///
/// assert_eq!(shared.lock().unwrap().extract::<String>().map(String::as_str), Some("done"));
/// ```
#[derive(Clone)]
pub struct SmallSendAny {
    inner: SmallAny,
}

// Safety: every constructor requires the stored type to be `Send + Sync`.
// Clones, drops and shared references all act on a value of that type only.
unsafe impl Send for SmallSendAny {}
unsafe impl Sync for SmallSendAny {}

impl From<SmallSendAny> for SmallAny {
    #[inline(always)]
    fn from(value: SmallSendAny) -> Self {
        value.inner
    }
}

impl fmt::Debug for SmallSendAny {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmallSendAny")
            .field("type_name", &self.type_name())
            .field("inline", &self.is_inline())
            .finish_non_exhaustive()
    }
}

impl SmallSendAny {
    /// Returns `true` if the type `T` fits and can be stored without allocation.
    pub const fn fits<T>() -> bool {
        RawAny::fits::<T>()
    }

    /// Construct new [`SmallSendAny`] with the given value.
    ///
    /// Type of value must implement both `Send` and `Sync`.
    /// For types that do not, use [`SmallAny`].
    #[inline]
    pub fn new<T>(value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        SmallSendAny {
            inner: SmallAny::new(value),
        }
    }

    /// Construct new [`SmallSendAny`], reporting allocation failure as [`Error::AllocationFailure`].
    #[inline]
    pub fn try_new<T>(value: T) -> Result<Self>
    where
        T: Clone + Send + Sync + 'static,
    {
        Ok(SmallSendAny {
            inner: SmallAny::try_new(value)?,
        })
    }

    /// Replaces the held value with `value`, which may be of a different type.
    #[inline]
    pub fn assign<T>(&mut self, value: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        self.inner.assign(value);
    }

    /// Fallible form of [`SmallSendAny::assign`].
    /// On error the previously held value is left in place.
    #[inline]
    pub fn try_assign<T>(&mut self, value: T) -> Result<()>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.inner.try_assign(value)
    }

    /// Clones the container, reporting allocation failure as [`Error::AllocationFailure`].
    #[inline]
    pub fn try_clone(&self) -> Result<Self> {
        Ok(SmallSendAny {
            inner: self.inner.try_clone()?,
        })
    }

    /// Returns the type id of the stored value.
    #[inline]
    pub fn identity(&self) -> TypeId {
        self.inner.identity()
    }

    /// Returns the name of the stored value's type, for diagnostics.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.inner.type_name()
    }

    /// Returns `true` if the stored value is of type `T`.
    #[inline]
    pub fn is<T>(&self) -> bool
    where
        T: 'static,
    {
        self.inner.is::<T>()
    }

    /// Returns `true` if the value lives in the inline buffer rather than on the heap.
    #[inline]
    pub fn is_inline(&self) -> bool {
        self.inner.is_inline()
    }

    /// Returns some reference to the stored value if it is of type `T`.
    #[inline]
    pub fn extract<T>(&self) -> Option<&T>
    where
        T: 'static,
    {
        self.inner.extract()
    }

    /// Returns some mutable reference to the stored value if it is of type `T`.
    #[inline]
    pub fn extract_mut<T>(&mut self) -> Option<&mut T>
    where
        T: 'static,
    {
        self.inner.extract_mut()
    }

    /// Returns a clone of the stored value if it is of type `T`.
    /// Otherwise returns [`Error::TypeMismatch`].
    #[inline]
    pub fn extract_or_fail<T>(&self) -> Result<T>
    where
        T: Clone + 'static,
    {
        self.inner.extract_or_fail()
    }

    /// Returns the stored value if it is of type `T`.
    /// Otherwise return self back.
    #[inline]
    pub fn downcast<T>(self) -> core::result::Result<T, SmallSendAny>
    where
        T: 'static,
    {
        self.inner
            .downcast()
            .map_err(|inner| SmallSendAny { inner })
    }
}
