use core::{
    alloc::Layout,
    mem::{align_of, size_of, MaybeUninit},
    ptr::{self, NonNull},
};

use scopeguard::ScopeGuard;

use crate::error::Error;

/// Number of bytes a value may occupy and still be stored inline.
pub const INLINE_CAPACITY: usize = 16;

/// Largest alignment a value may require and still be stored inline.
pub const INLINE_ALIGN: usize = 16;

/// Storage type that can hold any value of size `INLINE_CAPACITY` and alignment `INLINE_ALIGN`.
#[repr(C, align(16))] // alignment value is in synced with `INLINE_ALIGN`
#[derive(Clone, Copy)]
pub(crate) struct InlineStorage {
    storage: MaybeUninit<[u8; INLINE_CAPACITY]>,
}

const _: () = assert!(align_of::<InlineStorage>() == INLINE_ALIGN);
const _: () = assert!(size_of::<InlineStorage>() == INLINE_CAPACITY);

impl InlineStorage {
    /// Construct new storage without initializing any value in it.
    pub fn new() -> Self {
        InlineStorage {
            storage: MaybeUninit::uninit(),
        }
    }

    /// Returns `true` if the type `T` fits into the storage.
    pub const fn fits<T>() -> bool {
        size_of::<T>() <= INLINE_CAPACITY && align_of::<T>() <= INLINE_ALIGN
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.storage.as_ptr().cast()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.storage.as_mut_ptr().cast()
    }
}

/// Where the payload of a container lives.
///
/// The variant is the placement flag: every operation that touches the payload
/// matches on it first.
pub(crate) enum Slot {
    Inline(InlineStorage),
    Heap(NonNull<u8>),
}

impl Slot {
    pub fn as_ptr(&self) -> *const u8 {
        match self {
            Slot::Inline(storage) => storage.as_ptr(),
            Slot::Heap(ptr) => ptr.as_ptr(),
        }
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        match self {
            Slot::Inline(storage) => storage.as_mut_ptr(),
            Slot::Heap(ptr) => ptr.as_ptr(),
        }
    }
}

/// The allocator returned null for `layout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HeapAllocError {
    pub layout: Layout,
}

impl From<HeapAllocError> for Error {
    fn from(error: HeapAllocError) -> Self {
        Error::AllocationFailure {
            layout: error.layout,
        }
    }
}

/// Allocates a block for `layout`.
///
/// Zero-sized layouts get a dangling pointer with the right alignment.
pub(crate) fn heap_alloc(layout: Layout) -> Result<NonNull<u8>, HeapAllocError> {
    if layout.size() == 0 {
        // Safety: alignment is never zero.
        return Ok(unsafe { NonNull::new_unchecked(ptr::without_provenance_mut(layout.align())) });
    }

    // Safety: layout has non-zero size.
    let raw = unsafe { alloc::alloc::alloc(layout) };

    NonNull::new(raw).ok_or_else(|| {
        tracing::debug!(
            size = layout.size(),
            align = layout.align(),
            "heap allocation for erased value failed"
        );
        HeapAllocError { layout }
    })
}

/// Frees a block obtained from [`heap_alloc`] with the same `layout`.
///
/// # Safety
///
/// `ptr` must come from `heap_alloc(layout)` and must not be freed twice.
pub(crate) unsafe fn heap_dealloc(ptr: NonNull<u8>, layout: Layout) {
    if layout.size() != 0 {
        unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

/// Guard that frees a fresh heap block unless defused with `ScopeGuard::into_inner`.
/// Keeps the block from leaking when writing a value into it panics.
pub(crate) fn heap_guard(
    ptr: NonNull<u8>,
    layout: Layout,
) -> ScopeGuard<NonNull<u8>, impl FnOnce(NonNull<u8>)> {
    scopeguard::guard(ptr, move |ptr| unsafe { heap_dealloc(ptr, layout) })
}
