// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::stack::{MIN_STACK_SIZE, Stack, StackPointer};
use std::io::Error;
use std::{fmt, io, ptr};

/// A `mmap`ed fiber stack with a guard page at its lowest address.
pub struct FiberStack {
    base: StackPointer,
    limit: StackPointer,
    mmap_len: usize,
}

impl FiberStack {
    /// Creates a new stack which has at least the given capacity.
    ///
    /// The requested size is clamped to [`MIN_STACK_SIZE`] and rounded up to a whole number of
    /// pages, one additional guard page is reserved below the usable region.
    ///
    /// # Errors
    ///
    /// Returns the OS error if reserving or protecting the memory fails.
    pub fn new(size: usize) -> io::Result<Self> {
        // Apply minimum stack size.
        let size = size.max(MIN_STACK_SIZE);

        // Add a guard page to the requested size and round the size up to
        // a page boundary.
        let page_size = page_size();
        let mmap_len = size
            .checked_add(page_size + page_size - 1)
            .ok_or_else(|| Error::other("integer overflow while calculating stack size"))?
            & !(page_size - 1);

        // OpenBSD requires MAP_STACK on anything that is used as a stack.
        cfg_if::cfg_if! {
            if #[cfg(target_os = "openbsd")] {
                let map_flags = libc::MAP_ANONYMOUS | libc::MAP_PRIVATE | libc::MAP_STACK;
            } else {
                let map_flags = libc::MAP_ANONYMOUS | libc::MAP_PRIVATE;
            }
        }

        // Safety: anonymous private mapping of fresh address space, no existing memory is touched
        let mmap = unsafe { libc::mmap(ptr::null_mut(), mmap_len, libc::PROT_NONE, map_flags, -1, 0) };
        if mmap == libc::MAP_FAILED {
            return Err(Error::last_os_error());
        }

        let bottom = mmap as usize;
        let (Some(base), Some(limit)) = (
            StackPointer::new(bottom + mmap_len),
            StackPointer::new(bottom + page_size),
        ) else {
            return Err(Error::other("mmap returned a null mapping"));
        };

        // Create the result here. If the mprotect call fails then this will
        // be dropped and the memory will be unmapped.
        let out = Self {
            base,
            limit,
            mmap_len,
        };

        // Make everything except the guard page writable.
        // Safety: the range lies entirely within the mapping created above
        let ret = unsafe {
            libc::mprotect(
                mmap.cast::<u8>().add(page_size).cast(),
                mmap_len - page_size,
                libc::PROT_READ | libc::PROT_WRITE,
            )
        };
        if ret != 0 {
            return Err(Error::last_os_error());
        }

        tracing::trace!(base = ?out.base, len = mmap_len, "allocated fiber stack");

        Ok(out)
    }

    /// Returns the number of usable bytes of this stack, excluding the guard page.
    pub fn size(&self) -> usize {
        self.base.get() - self.limit.get()
    }
}

impl Drop for FiberStack {
    fn drop(&mut self) {
        let mmap = self.base.get() - self.mmap_len;
        // Safety: the mapping was created in `new` with exactly this address and length and is
        // not referenced by any fiber anymore
        let ret = unsafe { libc::munmap(mmap as *mut libc::c_void, self.mmap_len) };
        debug_assert_eq!(ret, 0);
    }
}

impl fmt::Debug for FiberStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiberStack")
            .field("base", &format_args!("{:#x}", self.base.get()))
            .field("limit", &format_args!("{:#x}", self.limit.get()))
            .field("mmap_len", &self.mmap_len)
            .finish()
    }
}

// Safety: `base` and `limit` describe a valid, writable and exclusively owned memory region that
// stays mapped until the stack is dropped. Both are page aligned and therefore aligned to the
// platform stack alignment.
unsafe impl Stack for FiberStack {
    fn base(&self) -> StackPointer {
        self.base
    }

    fn limit(&self) -> StackPointer {
        self.limit
    }
}

fn page_size() -> usize {
    // Safety: sysconf has no preconditions
    let pagesize = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    let pagesize = usize::try_from(pagesize).unwrap_or(4096);
    debug_assert!(pagesize.is_power_of_two());
    pagesize
}
