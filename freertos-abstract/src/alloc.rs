use core::alloc::{GlobalAlloc, Layout};
use core::marker::PhantomData;
#[cfg(feature = "static_allocation")]
use core::{cell::UnsafeCell, mem::MaybeUninit};

#[cfg(feature = "static_allocation")]
use alloc2::boxed::Box;

use crate::shim::{pvPortMalloc, vPortFree};

/// Alignment guaranteed by `pvPortMalloc` (`portBYTE_ALIGNMENT`).
const PORT_BYTE_ALIGNMENT: usize = 8;

/// An allocator based on the FreeRTOS Memory Management API.
///
/// The heap implementation is selected with the `heap_*` features. Layouts
/// aligned above `portBYTE_ALIGNMENT` are over-allocated, with the address
/// returned by the heap stored just below the aligned block.
///
/// # Usage
///
/// ```
/// use freertos_abstract::Allocator;
///
/// #[global_allocator]
/// static ALLOC: Allocator = Allocator;
/// ```
pub struct Allocator;

unsafe impl GlobalAlloc for Allocator {
  unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
    if layout.align() <= PORT_BYTE_ALIGNMENT {
      return pvPortMalloc(layout.size() as _).cast()
    }

    let Some(total) = layout.size().checked_add(layout.align()) else {
      return core::ptr::null_mut()
    };

    let raw = pvPortMalloc(total as _).cast::<u8>();
    if raw.is_null() {
      return raw
    }

    // `raw` is aligned to `PORT_BYTE_ALIGNMENT`, so there is room for one
    // pointer between it and the next aligned address.
    let offset = layout.align() - (raw as usize & (layout.align() - 1));
    let aligned = raw.add(offset);
    aligned.cast::<*mut u8>().sub(1).write(raw);
    aligned
  }

  unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
    let raw = if layout.align() <= PORT_BYTE_ALIGNMENT {
      ptr
    } else {
      ptr.cast::<*mut u8>().sub(1).read()
    };

    vPortFree(raw.cast())
  }
}

/// Kernel control block storage owned by a wrapper object.
///
/// With the `static_allocation` feature this is a block handed to the kernel's
/// `*Static` creation function, which lives exactly as long as the wrapper.
/// Otherwise the kernel allocates the control block itself and this is empty.
pub(crate) struct Storage<T> {
  #[cfg(feature = "static_allocation")]
  block: Box<UnsafeCell<MaybeUninit<T>>>,
  _type: PhantomData<T>,
}

// The contents are only ever accessed by the kernel.
unsafe impl<T> Send for Storage<T> {}
unsafe impl<T> Sync for Storage<T> {}

impl<T> Storage<T> {
  pub(crate) fn new() -> Self {
    Self {
      #[cfg(feature = "static_allocation")]
      block: Box::new(UnsafeCell::new(MaybeUninit::uninit())),
      _type: PhantomData,
    }
  }

  #[cfg(feature = "static_allocation")]
  pub(crate) fn as_mut_ptr(&self) -> *mut T {
    self.block.get().cast()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn allocator_roundtrip() {
    let layout = Layout::from_size_align(64, 8).unwrap();
    unsafe {
      let ptr = Allocator.alloc(layout);
      assert!(!ptr.is_null());
      assert_eq!(ptr as usize % 8, 0);
      ptr.write_bytes(0, 64);
      Allocator.dealloc(ptr, layout);
    }
  }

  #[test]
  fn allocator_honours_large_alignments() {
    for align in [16, 64, 128, 4096] {
      let layout = Layout::from_size_align(100, align).unwrap();
      unsafe {
        let ptr = Allocator.alloc(layout);
        assert!(!ptr.is_null());
        assert_eq!(ptr as usize % align, 0);
        ptr.write_bytes(0xa5, 100);
        Allocator.dealloc(ptr, layout);
      }
    }
  }
}
