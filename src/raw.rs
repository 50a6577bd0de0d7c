//! Type-erasure engine shared by [`SmallAny`] and [`SmallVariant`].
//!
//! [`RawAny`] owns exactly one value, either inline or in a heap block, and a
//! `&'static` [`VTable`] instantiated for that value's type. The vtable is the
//! only place where the concrete type is still known. The table is a promoted
//! constant, so containers holding the same type normally share it, but its
//! address is not a type identity: comparisons always go through `TypeId`.
//!
//! # Safety Invariant
//!
//! The vtable's type matches the value stored in the slot, and a `Slot::Heap`
//! pointer was allocated with `vtable.layout`. Both are fixed in
//! [`RawAny::install`] and [`RawAny::duplicate`] and never change afterwards.
//!
//! [`SmallAny`]: crate::SmallAny
//! [`SmallVariant`]: crate::SmallVariant

use core::{
    alloc::Layout,
    any::{type_name, TypeId},
    marker::PhantomData,
    mem::ManuallyDrop,
    ptr,
};

use scopeguard::ScopeGuard;

use crate::{
    storage::{heap_alloc, heap_dealloc, heap_guard, HeapAllocError, InlineStorage, Slot},
};

unsafe fn drop_in_place<T>(value: *mut u8) {
    // Safety: It was initialized as `T`.
    unsafe { ptr::drop_in_place(value.cast::<T>()) }
}

unsafe fn clone_into<T: Clone>(src: *const u8, dst: *mut u8) {
    // Safety: `src` holds an initialized `T`, `dst` is valid for writing a `T`.
    unsafe {
        let value = (*src.cast::<T>()).clone();
        dst.cast::<T>().write(value);
    }
}

/// Per-type operations, built at compile time for each stored type.
pub(crate) struct VTable {
    type_id: fn() -> TypeId,
    type_name: fn() -> &'static str,
    layout: Layout,
    drop_in_place: unsafe fn(*mut u8),
    clone_into: unsafe fn(*const u8, *mut u8),
}

impl VTable {
    const fn of<T: Clone + 'static>() -> &'static Self {
        const {
            &VTable {
                type_id: TypeId::of::<T>,
                type_name: type_name::<T>,
                layout: Layout::new::<T>(),
                drop_in_place: drop_in_place::<T>,
                clone_into: clone_into::<T>,
            }
        }
    }
}

pub(crate) struct RawAny {
    vtable: &'static VTable,
    slot: Slot,
    unsend: PhantomData<*mut u8>,
}

impl Drop for RawAny {
    #[inline]
    fn drop(&mut self) {
        self.release();
    }
}

impl RawAny {
    pub const fn fits<T>() -> bool {
        InlineStorage::fits::<T>()
    }

    /// Stores `value` inline if it fits, otherwise in a fresh heap block.
    ///
    /// On allocation failure `value` is dropped and the error returned.
    pub fn install<T>(value: T) -> Result<Self, HeapAllocError>
    where
        T: Clone + 'static,
    {
        let vtable = VTable::of::<T>();

        let slot = if InlineStorage::fits::<T>() {
            let mut storage = InlineStorage::new();
            // Safety: `T` fits the storage in size and alignment.
            unsafe { storage.as_mut_ptr().cast::<T>().write(value) };
            Slot::Inline(storage)
        } else {
            tracing::trace!(
                type_name = type_name::<T>(),
                size = vtable.layout.size(),
                align = vtable.layout.align(),
                "erased value does not fit inline, moving it to the heap"
            );
            let ptr = heap_alloc(vtable.layout)?;
            // Safety: block was allocated for `T`'s layout.
            unsafe { ptr.cast::<T>().write(value) };
            Slot::Heap(ptr)
        };

        Ok(RawAny {
            vtable,
            slot,
            unsend: PhantomData,
        })
    }

    /// Clones the held value into storage of the same kind.
    pub fn duplicate(&self) -> Result<Self, HeapAllocError> {
        let slot = match &self.slot {
            Slot::Inline(source) => {
                let mut storage = InlineStorage::new();
                // Safety: vtable matches the stored value, which fits inline.
                unsafe { (self.vtable.clone_into)(source.as_ptr(), storage.as_mut_ptr()) };
                Slot::Inline(storage)
            }
            Slot::Heap(source) => {
                tracing::trace!(
                    type_name = self.type_name(),
                    size = self.vtable.layout.size(),
                    "duplicating heap-stored erased value"
                );
                let guard = heap_guard(heap_alloc(self.vtable.layout)?, self.vtable.layout);
                // Safety: vtable matches the stored value and the new block uses its layout.
                unsafe { (self.vtable.clone_into)(source.as_ptr(), guard.as_ptr()) };
                Slot::Heap(ScopeGuard::into_inner(guard))
            }
        };

        Ok(RawAny {
            vtable: self.vtable,
            slot,
            unsend: PhantomData,
        })
    }

    /// Drops the held value and frees its heap block, if any.
    /// Called exactly once, from `Drop`.
    fn release(&mut self) {
        match &mut self.slot {
            Slot::Inline(storage) => unsafe {
                (self.vtable.drop_in_place)(storage.as_mut_ptr());
            },
            Slot::Heap(ptr) => {
                // Frees the block even if the value's destructor panics.
                let _guard = heap_guard(*ptr, self.vtable.layout);
                unsafe { (self.vtable.drop_in_place)(ptr.as_ptr()) };
            }
        }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        (self.vtable.type_id)()
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        (self.vtable.type_name)()
    }

    #[inline]
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id() == TypeId::of::<T>()
    }

    #[inline]
    pub fn is_inline(&self) -> bool {
        matches!(self.slot, Slot::Inline(_))
    }

    #[inline]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        if self.is::<T>() {
            Some(unsafe { self.downcast_ref_unchecked::<T>() })
        } else {
            None
        }
    }

    #[inline]
    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        if self.is::<T>() {
            Some(unsafe { self.downcast_mut_unchecked::<T>() })
        } else {
            None
        }
    }

    #[inline]
    pub fn downcast<T: 'static>(self) -> Result<T, Self> {
        if self.is::<T>() {
            Ok(unsafe { self.downcast_unchecked() })
        } else {
            Err(self)
        }
    }

    /// # Safety
    ///
    /// The held value must be a `T`.
    #[inline]
    pub unsafe fn downcast_ref_unchecked<T: 'static>(&self) -> &T {
        debug_assert!(self.is::<T>());
        unsafe { &*self.slot.as_ptr().cast::<T>() }
    }

    /// # Safety
    ///
    /// The held value must be a `T`.
    #[inline]
    pub unsafe fn downcast_mut_unchecked<T: 'static>(&mut self) -> &mut T {
        debug_assert!(self.is::<T>());
        unsafe { &mut *self.slot.as_mut_ptr().cast::<T>() }
    }

    /// Moves the value out, freeing the heap block without dropping the value.
    ///
    /// # Safety
    ///
    /// The held value must be a `T`.
    pub unsafe fn downcast_unchecked<T: 'static>(self) -> T {
        debug_assert!(self.is::<T>());
        // Prevent dropping using `vtable.drop_in_place`.
        let me = ManuallyDrop::new(self);

        let value = unsafe { me.slot.as_ptr().cast::<T>().read() };

        if let Slot::Heap(ptr) = me.slot {
            unsafe { heap_dealloc(ptr, me.vtable.layout) };
        }

        value
    }
}
