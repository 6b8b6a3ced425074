//! Memory-mapped region
//!
//! [`MappedRegion`] owns one `mmap` of the target file for the whole run.
//! It offers two ways in:
//!
//! - a **raw** path (`load_raw` / `store_raw`) that takes any byte offset,
//!   including offsets past the end of the mapping. This is what the access
//!   engine uses, because touching memory beyond EOF under overcommit is the
//!   point of the tool.
//! - a **checked** path (`read_u32` / `write_u32`) that refuses offsets
//!   whose word would not fit, for setup code and tests.
//!
//! No access is synchronized. Workers race on the same cache lines by design.

use crate::config::workload::{UnmapPolicy, Visibility};
use crate::error::MaptrapError;
use std::fs::File;
use std::os::unix::io::{IntoRawFd, RawFd};
use std::ptr;

/// Size of the word every general-mode access loads or stores
pub const WORD: u64 = std::mem::size_of::<u32>() as u64;

/// System page size
pub fn page_size() -> u64 {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as u64
    } else {
        4096
    }
}

/// A file mapped read/write into the address space
#[derive(Debug)]
pub struct MappedRegion {
    /// First mapped byte
    base: *mut u8,
    /// Mapped length in bytes
    size: u64,
}

// Safety: the region is a plain address range valid until unmapped. Workers
// share it on purpose and only ever touch it through volatile word accesses.
unsafe impl Send for MappedRegion {}
unsafe impl Sync for MappedRegion {}

impl MappedRegion {
    /// Map `size` bytes of `fd` from offset 0
    ///
    /// The mapping is `PROT_READ | PROT_WRITE` with `MAP_NORESERVE`, so a
    /// size larger than the file is accepted and faults only when touched.
    pub fn establish(fd: RawFd, size: u64, visibility: Visibility) -> Result<Self, MaptrapError> {
        if size == 0 {
            return Err(MaptrapError::resource("cannot mmap a zero-length region"));
        }
        let len = usize::try_from(size)
            .map_err(|_| MaptrapError::resource(format!("mapping size {} exceeds address space", size)))?;

        log::debug!("mmap(fd {}) offset 0 for {} bytes, {}", fd, size, visibility);

        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                visibility.mmap_flag() | libc::MAP_NORESERVE,
                fd,
                0,
            )
        };

        if addr == libc::MAP_FAILED {
            let err = std::io::Error::last_os_error();
            return Err(MaptrapError::resource(format!(
                "mmap failed: fd={}, size={}: {}",
                fd, size, err
            )));
        }

        let region = Self {
            base: addr as *mut u8,
            size,
        };

        log::info!(
            "PID = {}, map range = {:#x} - {:#x}",
            std::process::id(),
            region.base_addr(),
            region.last_addr()
        );
        if let Some(line) = region.proc_maps_line() {
            log::debug!("{}", line);
        }

        Ok(region)
    }

    /// Address of the first mapped byte
    pub fn base_addr(&self) -> usize {
        self.base as usize
    }

    /// Address of the last mapped byte (`base + size - 1`)
    pub fn last_addr(&self) -> usize {
        self.base as usize + (self.size as usize - 1)
    }

    /// Mapped length in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Address of `offset`, which may lie beyond the mapping
    #[inline(always)]
    pub fn addr_of(&self, offset: u64) -> usize {
        self.base.wrapping_add(offset as usize) as usize
    }

    #[inline(always)]
    fn word_ptr(&self, offset: u64) -> *mut u32 {
        self.base.wrapping_add(offset as usize) as *mut u32
    }

    /// Load the word at `offset` without any bounds check
    ///
    /// # Safety
    ///
    /// The caller accepts whatever the kernel does for an address outside
    /// the mapping (typically SIGBUS or SIGSEGV). Inside the mapping the
    /// load may race with stores from other threads.
    #[inline(always)]
    pub unsafe fn load_raw(&self, offset: u64) -> u32 {
        let p = self.word_ptr(offset);
        if (p as usize) % std::mem::align_of::<u32>() == 0 {
            ptr::read_volatile(p)
        } else {
            std::hint::black_box(ptr::read_unaligned(p))
        }
    }

    /// Store `value` at `offset` without any bounds check
    ///
    /// # Safety
    ///
    /// Same contract as [`load_raw`](Self::load_raw).
    #[inline(always)]
    pub unsafe fn store_raw(&self, offset: u64, value: u32) {
        let p = self.word_ptr(offset);
        if (p as usize) % std::mem::align_of::<u32>() == 0 {
            ptr::write_volatile(p, value)
        } else {
            ptr::write_unaligned(std::hint::black_box(p), value)
        }
    }

    /// True if the whole word at `offset` lies inside the mapping
    pub fn contains_word(&self, offset: u64) -> bool {
        offset
            .checked_add(WORD)
            .map_or(false, |end| end <= self.size)
    }

    /// Bounds-checked load
    pub fn read_u32(&self, offset: u64) -> Option<u32> {
        if self.contains_word(offset) {
            Some(unsafe { self.load_raw(offset) })
        } else {
            None
        }
    }

    /// Bounds-checked store; returns false if the word does not fit
    pub fn write_u32(&self, offset: u64, value: u32) -> bool {
        if self.contains_word(offset) {
            unsafe { self.store_raw(offset, value) };
            true
        } else {
            false
        }
    }

    /// msync(MS_SYNC) the page that contains `offset`
    pub fn msync_page(&self, offset: u64) -> std::io::Result<()> {
        let page = page_size() as usize;
        let addr = self.addr_of(offset) & !(page - 1);
        let result = unsafe { libc::msync(addr as *mut libc::c_void, page, libc::MS_SYNC) };
        if result < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }

    /// The `/proc/self/maps` line describing this mapping, if readable
    fn proc_maps_line(&self) -> Option<String> {
        let maps = std::fs::read_to_string("/proc/self/maps").ok()?;
        let prefix = format!("{:x}-", self.base_addr());
        maps.lines()
            .find(|line| line.starts_with(&prefix))
            .map(str::to_string)
    }

    /// Unmap according to `policy` and close the descriptor
    ///
    /// Best effort: the process is about to exit, so failures are logged and
    /// otherwise ignored.
    pub fn release(self, file: File, policy: UnmapPolicy) {
        let length = match policy {
            UnmapPolicy::Full => Some(self.size as usize),
            UnmapPolicy::LegacyPage => Some(page_size() as usize),
            UnmapPolicy::Skip => None,
        };

        if let Some(length) = length {
            log::debug!("final munmap({:#x}, {})", self.base_addr(), length);
            let result = unsafe { libc::munmap(self.base as *mut libc::c_void, length) };
            if result < 0 {
                log::error!("munmap failed: {}", std::io::Error::last_os_error());
            }
        }
        std::mem::forget(self);

        log::debug!("final close");
        let fd = file.into_raw_fd();
        if unsafe { libc::close(fd) } < 0 {
            log::error!("final close failed: {}", std::io::Error::last_os_error());
        }
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        let result = unsafe { libc::munmap(self.base as *mut libc::c_void, self.size as usize) };
        if result < 0 {
            log::warn!("munmap on drop failed: {}", std::io::Error::last_os_error());
        }
    }
}
