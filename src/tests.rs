use core::{any::TypeId, cell::Cell};

use alloc::{rc::Rc, string::String, vec, vec::Vec};

use static_assertions::{assert_impl_all, assert_not_impl_any};

use crate::{Error, SmallAny, SmallSendAny, SmallVariant, INLINE_ALIGN, INLINE_CAPACITY};

assert_not_impl_any!(SmallAny: Send, Sync);
assert_not_impl_any!(SmallVariant<(u32, String)>: Send, Sync);
assert_impl_all!(SmallSendAny: Send, Sync, Clone);

/// Counts live instances through a shared counter.
#[derive(Debug)]
struct Tracked<P> {
    live: Rc<Cell<usize>>,
    payload: P,
}

impl<P> Tracked<P> {
    fn new(live: &Rc<Cell<usize>>, payload: P) -> Self {
        live.set(live.get() + 1);
        Tracked {
            live: live.clone(),
            payload,
        }
    }
}

impl<P: Clone> Clone for Tracked<P> {
    fn clone(&self) -> Self {
        Tracked::new(&self.live, self.payload.clone())
    }
}

impl<P> Drop for Tracked<P> {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

#[repr(C, align(16))]
#[derive(Clone, Debug, PartialEq)]
struct Exact([u8; INLINE_CAPACITY]);

#[repr(align(32))]
#[derive(Clone, Debug, PartialEq)]
struct OverAligned(u8);

#[repr(align(32))]
#[derive(Clone, Debug, PartialEq)]
struct OverAlignedZst;

#[derive(Clone, Debug, PartialEq)]
struct Big {
    words: [u64; 8],
}

#[test]
fn test_int_then_string() {
    let mut a = SmallAny::new(42i32);
    assert_eq!(a.extract::<i32>(), Some(&42));

    a.assign(String::from("hello"));
    assert_eq!(a.extract::<String>().map(String::as_str), Some("hello"));
    assert_eq!(a.extract::<i32>(), None);
}

#[test]
fn test_small_primitive() {
    let mut a = SmallAny::new(42u32);
    assert!(a.is_inline());
    assert!(a.is::<u32>());
    assert!(!a.is::<u64>());
    assert_eq!(a.identity(), TypeId::of::<u32>());
    assert_eq!(a.extract::<u32>(), Some(&42));
    assert_eq!(a.extract::<u64>(), None);
    assert_eq!(a.extract_mut::<u32>(), Some(&mut 42));
    assert_eq!(a.extract_mut::<u64>(), None);
}

#[test]
fn test_big_struct_on_heap() {
    let big = Big {
        words: [1, 2, 3, 4, 5, 6, 7, 8],
    };
    assert_eq!(core::mem::size_of::<Big>(), 64);

    let a = SmallAny::new(big.clone());
    assert!(!a.is_inline());
    assert_eq!(a.extract::<Big>(), Some(&big));

    let b = a.clone();
    assert!(!b.is_inline());
    assert_eq!(b.extract::<Big>(), Some(&big));
    assert_eq!(a.extract_or_fail::<Big>(), Ok(big));
}

#[test]
fn test_storage_boundary() {
    assert_eq!(core::mem::size_of::<Exact>(), INLINE_CAPACITY);
    assert_eq!(core::mem::align_of::<Exact>(), INLINE_ALIGN);

    let exact = SmallAny::new(Exact([9; INLINE_CAPACITY]));
    assert!(exact.is_inline());
    assert_eq!(exact.extract::<Exact>(), Some(&Exact([9; INLINE_CAPACITY])));

    let larger = SmallAny::new([9u8; INLINE_CAPACITY + 1]);
    assert!(!larger.is_inline());
    assert_eq!(
        larger.extract::<[u8; INLINE_CAPACITY + 1]>(),
        Some(&[9u8; INLINE_CAPACITY + 1])
    );

    let aligned = SmallAny::new(OverAligned(3));
    assert!(!aligned.is_inline());
    assert_eq!(aligned.extract::<OverAligned>(), Some(&OverAligned(3)));
    let ptr = aligned.extract::<OverAligned>().unwrap() as *const OverAligned;
    assert_eq!(ptr as usize % 32, 0);

    let zst = SmallAny::new(OverAlignedZst);
    assert!(!zst.is_inline());
    assert_eq!(zst.clone().extract::<OverAlignedZst>(), Some(&OverAlignedZst));

    assert!(SmallAny::fits::<Exact>());
    assert!(!SmallAny::fits::<[u8; INLINE_CAPACITY + 1]>());
    assert!(!SmallAny::fits::<OverAligned>());
}

#[test]
fn test_copy_independence() {
    let mut original = SmallAny::new(vec![1, 2, 3]);
    let copy = original.clone();

    original.extract_mut::<Vec<i32>>().unwrap().push(4);
    assert_eq!(copy.extract::<Vec<i32>>(), Some(&vec![1, 2, 3]));

    original.assign(0u8);
    drop(original);
    assert_eq!(copy.extract::<Vec<i32>>(), Some(&vec![1, 2, 3]));

    let mut heap = SmallAny::new([5u32; 32]);
    let heap_copy = heap.clone();
    heap.extract_mut::<[u32; 32]>().unwrap()[0] = 0;
    drop(heap);
    assert_eq!(heap_copy.extract::<[u32; 32]>(), Some(&[5u32; 32]));
}

#[test]
fn test_extract_or_fail_keeps_value() {
    let a = SmallAny::new(String::from("kept"));

    match a.extract_or_fail::<u64>() {
        Err(Error::TypeMismatch { expected, found }) => {
            assert_eq!(expected, "u64");
            assert_eq!(found, core::any::type_name::<String>());
        }
        other => panic!("expected type mismatch, got {other:?}"),
    }

    assert_eq!(a.extract::<String>().map(String::as_str), Some("kept"));
    assert_eq!(a.extract_or_fail::<String>().as_deref(), Ok("kept"));
}

#[test]
fn test_downcast() {
    let mut a = SmallAny::new(42u32);

    a = match a.downcast::<u64>() {
        Ok(_) => panic!("expected downcast to fail"),
        Err(a) => a,
    };

    match a.downcast::<u32>() {
        Ok(v) => assert_eq!(v, 42),
        Err(_) => panic!("expected downcast to succeed"),
    }

    let big = Big { words: [3; 8] };
    match SmallAny::new(big.clone()).downcast::<Big>() {
        Ok(v) => assert_eq!(v, big),
        Err(_) => panic!("expected downcast to succeed"),
    }
}

#[test]
fn test_no_leak_or_double_drop() {
    let live = Rc::new(Cell::new(0));

    {
        let mut a = SmallAny::new(Tracked::new(&live, 0u8));
        assert!(a.is_inline());

        for i in 0..10u8 {
            a.assign(Tracked::new(&live, i));
            assert_eq!(live.get(), 1);
        }

        for i in 0..10u64 {
            if i % 2 == 0 {
                a.assign(Tracked::new(&live, [i; 8]));
                assert!(!a.is_inline());
            } else {
                a.assign(Tracked::new(&live, i as u8));
                assert!(a.is_inline());
            }
            assert_eq!(live.get(), 1);
        }

        let b = a.clone();
        let c = b.clone();
        assert_eq!(live.get(), 3);

        assert!(c.extract_or_fail::<u8>().is_err());
        let copy = c.extract_or_fail::<Tracked<u8>>().unwrap();
        assert_eq!(copy.payload, 9);
        assert_eq!(live.get(), 4);
        drop(copy);

        let taken = match b.downcast::<Tracked<u8>>() {
            Ok(taken) => taken,
            Err(_) => panic!("expected downcast to succeed"),
        };
        assert_eq!(live.get(), 3);
        drop(taken);
        assert_eq!(live.get(), 2);

        let heap = SmallAny::new(Tracked::new(&live, [0u64; 8]));
        let heap_copy = heap.clone();
        assert_eq!(live.get(), 4);
        match heap.downcast::<Tracked<[u64; 8]>>() {
            Ok(taken) => drop(taken),
            Err(_) => panic!("expected downcast to succeed"),
        }
        drop(heap_copy);
        assert_eq!(live.get(), 2);
    }

    assert_eq!(live.get(), 0);
}

#[test]
fn test_panicking_clone_does_not_leak() {
    #[derive(Debug)]
    struct PanicOnClone(Tracked<[u64; 8]>);

    impl Clone for PanicOnClone {
        fn clone(&self) -> Self {
            panic!("clone refused");
        }
    }

    let live = Rc::new(Cell::new(0));
    let a = SmallAny::new(PanicOnClone(Tracked::new(&live, [0; 8])));
    assert!(!a.is_inline());

    let result = std::panic::catch_unwind(core::panic::AssertUnwindSafe(|| a.clone()));
    assert!(result.is_err());
    assert_eq!(live.get(), 1);
    assert!(a.extract::<PanicOnClone>().is_some());

    drop(a);
    assert_eq!(live.get(), 0);
}

#[test]
fn test_variant_members() {
    type List = (u8, String, Big);

    let mut v: SmallVariant<List> = SmallVariant::new(1u8);
    assert_eq!(v.index(), 0);
    assert!(v.is_inline());
    assert!(v.is::<u8, _>());
    assert_eq!(v.extract::<u8, _>(), Some(&1));
    assert_eq!(v.extract::<String, _>(), None);

    v.assign(Big { words: [2; 8] });
    assert_eq!(v.index(), 2);
    assert!(!v.is_inline());
    assert_eq!(v.identity(), TypeId::of::<Big>());

    let copy = v.clone();
    v.extract_mut::<Big, _>().unwrap().words[0] = 0;
    assert_eq!(copy.extract::<Big, _>(), Some(&Big { words: [2; 8] }));
    assert_eq!(copy.index(), 2);

    assert!(matches!(
        copy.extract_or_fail::<u8, _>(),
        Err(Error::TypeMismatch { .. })
    ));
    assert_eq!(copy.extract_or_fail::<Big, _>(), Ok(Big { words: [2; 8] }));

    match v.downcast::<String, _>() {
        Ok(_) => panic!("expected downcast to fail"),
        Err(v) => assert_eq!(v.index(), 2),
    }
}

#[test]
fn test_variant_any_conversion() {
    type List = (i64, String);

    let any = SmallAny::new(String::from("both"));
    let v = match SmallVariant::<List>::try_from_any(any) {
        Ok(v) => v,
        Err((error, _)) => panic!("expected conversion to succeed: {error}"),
    };
    assert_eq!(v.index(), 1);
    assert_eq!(v.extract::<String, _>().map(String::as_str), Some("both"));

    let any = v.into_any();
    assert_eq!(any.extract::<String>().map(String::as_str), Some("both"));

    match SmallVariant::<List>::try_from_any(SmallAny::new(1i32)) {
        Ok(_) => panic!("expected conversion to fail"),
        Err((error, any)) => {
            assert_eq!(error, Error::InvalidConcreteType { found: "i32" });
            assert_eq!(any.extract::<i32>(), Some(&1));
        }
    }
}

#[test]
fn test_variant_no_leak() {
    let live = Rc::new(Cell::new(0));

    {
        let mut v: SmallVariant<(Tracked<u8>, Tracked<[u64; 8]>)> =
            SmallVariant::new(Tracked::new(&live, 0u8));

        for i in 0..6u8 {
            if i % 2 == 0 {
                v.assign(Tracked::new(&live, [u64::from(i); 8]));
                assert_eq!(v.index(), 1);
            } else {
                v.assign(Tracked::new(&live, i));
                assert_eq!(v.index(), 0);
            }
            assert_eq!(live.get(), 1);
        }

        let copy = v.try_clone().unwrap();
        assert_eq!(live.get(), 2);
        drop(v);
        assert_eq!(copy.extract::<Tracked<u8>, _>().map(|t| t.payload), Some(5));
    }

    assert_eq!(live.get(), 0);
}

#[test]
fn test_try_forms() {
    let mut a = SmallAny::try_new(1u16).unwrap();
    a.try_assign([0u8; 100]).unwrap();
    assert!(!a.is_inline());
    let b = a.try_clone().unwrap();
    assert_eq!(b.extract::<[u8; 100]>(), Some(&[0u8; 100]));

    let mut v = SmallVariant::<(u16, [u8; 100])>::try_new(1u16).unwrap();
    v.try_assign([1u8; 100]).unwrap();
    assert_eq!(v.index(), 1);
}

#[test]
fn test_debug_output() {
    let a = SmallAny::new(3u8);
    let text = alloc::format!("{a:?}");
    assert!(text.contains("u8"));
    assert!(text.contains("inline: true"));
}

#[test]
fn test_new_from_container_nests() {
    let a = SmallAny::new(5i32);

    let nested = SmallAny::new(a.clone());
    assert!(nested.is::<SmallAny>());
    assert_eq!(nested.extract::<i32>(), None);
    assert_eq!(
        nested.extract::<SmallAny>().and_then(|inner| inner.extract::<i32>()),
        Some(&5)
    );

    let copy = a.clone();
    assert_eq!(copy.extract::<i32>(), Some(&5));
}

#[test]
fn test_send_any_across_threads() {
    use std::sync::{Arc, Mutex};

    let shared = Arc::new(Mutex::new(SmallSendAny::new(1u32)));

    let workers: Vec<_> = (0..4u32)
        .map(|_| {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                let mut guard = shared.lock().unwrap();
                *guard.extract_mut::<u32>().unwrap() += 1;
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    let mut guard = shared.lock().unwrap();
    assert_eq!(guard.extract::<u32>(), Some(&5));

    guard.assign([9u64; 8]);
    assert!(!guard.is_inline());
    let moved = guard.clone();
    drop(guard);

    let handle = std::thread::spawn(move || moved.extract_or_fail::<[u64; 8]>());
    assert_eq!(handle.join().unwrap(), Ok([9u64; 8]));

    let open: SmallAny = SmallSendAny::new(String::from("open")).into();
    assert_eq!(open.extract::<String>().map(String::as_str), Some("open"));
}
