//! Bounds-checked view over a foreign array's backing memory
//!
//! All pointer arithmetic into runtime-owned buffers goes through
//! `ForeignBuffer::copy_from` / `copy_into`.

use crate::error::{BridgeError, BridgeResult};
use std::ffi::c_void;
use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};

/// Null check for pointers handed back by the runtime
pub fn check_null<T>(ptr: *mut T, origin: &str) -> BridgeResult<NonNull<T>> {
    NonNull::new(ptr).ok_or_else(|| BridgeError::NullPointer(origin.to_string()))
}

/// Typed window of `len` elements of `T` starting at a foreign address
///
/// The element stride is `size_of::<T>()`.
pub struct ForeignBuffer<'a, T> {
    ptr: NonNull<T>,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

impl<'a, T: Copy> ForeignBuffer<'a, T> {
    /// Create a view with null and alignment checks
    ///
    /// # Safety
    ///
    /// `base` must point to at least `len` initialized elements of `T` that
    /// stay valid, and are not accessed through any other path, for `'a`.
    pub unsafe fn new(base: *mut c_void, len: usize) -> BridgeResult<Self> {
        let ptr = check_null(base.cast::<T>(), "array data")?;
        let align = mem::align_of::<T>();
        if (ptr.as_ptr() as usize) % align != 0 {
            return Err(BridgeError::Misaligned {
                address: ptr.as_ptr() as usize,
                align,
            });
        }
        Ok(Self {
            ptr,
            len,
            _marker: PhantomData,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Convert and copy `src` into the foreign buffer; lengths must match exactly
    pub fn copy_from<U: Copy>(&mut self, src: &[U], mut convert: impl FnMut(U) -> T) -> BridgeResult<()> {
        self.check_len(src.len())?;
        for (index, value) in src.iter().enumerate() {
            // SAFETY: `new` guarantees `len` valid, aligned, exclusively borrowed elements
            unsafe { self.ptr.as_ptr().add(index).write(convert(*value)) };
        }
        Ok(())
    }

    /// Copy the foreign buffer into `dst`, converting each element; lengths
    /// must match exactly
    pub fn copy_into<U>(&self, dst: &mut [U], mut convert: impl FnMut(T) -> U) -> BridgeResult<()> {
        self.check_len(dst.len())?;
        for (index, slot) in dst.iter_mut().enumerate() {
            // SAFETY: see `copy_from`
            *slot = convert(unsafe { self.ptr.as_ptr().add(index).read() });
        }
        Ok(())
    }

    /// Copy the foreign buffer into a fresh vector
    pub fn to_vec(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len);
        // SAFETY: see `copy_from`; `out` has capacity for `len` elements
        unsafe {
            ptr::copy_nonoverlapping(self.ptr.as_ptr(), out.as_mut_ptr(), self.len);
            out.set_len(self.len);
        }
        out
    }

    fn check_len(&self, other: usize) -> BridgeResult<()> {
        if other != self.len {
            return Err(BridgeError::LengthMismatch {
                expected: other,
                found: self.len,
            });
        }
        Ok(())
    }
}
