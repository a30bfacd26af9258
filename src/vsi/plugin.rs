//! Serve a VSI prefix from a Rust key/value store.
//!
//! After `register_handler("myscheme://", store, ..)`, opening
//! `"myscheme://path/to/file.tif"` with any GDAL function reads the bytes of key
//! `"path/to/file.tif"` from `store`. Only reading is supported.
//!
//! ```rust, no_run
//! use std::io;
//! use std::sync::Arc;
//! use gdal_io::vsi::{register_handler, KeyReader, VsiHandlerOptions};
//!
//! struct Static(&'static [u8]);
//!
//! impl KeyReader for Static {
//!     fn size(&self, _key: &str) -> io::Result<u64> {
//!         Ok(self.0.len() as u64)
//!     }
//!
//!     fn read_at(&self, _key: &str, buf: &mut [u8], offset: u64) -> io::Result<usize> {
//!         let data = self.0.get(offset as usize..).unwrap_or_default();
//!         let n = buf.len().min(data.len());
//!         buf[..n].copy_from_slice(&data[..n]);
//!         Ok(n)
//!     }
//! }
//!
//! register_handler("static://", Arc::new(Static(b"hello")), VsiHandlerOptions::default())?;
//! # Ok::<(), gdal_io::errors::GdalError>(())
//! ```

use std::collections::HashMap;
use std::ffi::CString;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use gdal_sys::{vsi_l_offset, VSIStatBufL};
use libc::{c_char, c_int, c_void, size_t};
use once_cell::sync::Lazy;

use crate::diagnostics::{CallOptions, CallScope};
use crate::errors::{GdalError, Result, CPLE_APP_DEFINED, CPLE_FILE_IO};
use crate::utils::{_string, _string_array};
use crate::vsi::cache::BlockCache;

const VSI_STAT_SIZE_FLAG: c_int = 0x04;

/// A read-only key/value store.
///
/// Implementations are called from whichever thread GDAL reads on, possibly
/// several at once.
pub trait KeyReader: Send + Sync {
    /// Size of `key` in bytes. An error of kind [`io::ErrorKind::NotFound`] means the
    /// key does not exist; other errors are reported to GDAL as I/O failures.
    fn size(&self, key: &str) -> io::Result<u64>;

    /// Read up to `buf.len()` bytes of `key` starting at `offset`. Returning fewer
    /// bytes means the end of the key was reached.
    fn read_at(&self, key: &str, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// The batch capability of this store, if it has one.
    fn multi_reader(&self) -> Option<&dyn MultiKeyReader> {
        None
    }
}

/// Stores that can serve several ranges of a key in one request.
pub trait MultiKeyReader {
    /// Fill each buffer from the matching offset, returning the bytes read into each.
    fn read_at_multi(
        &self,
        key: &str,
        bufs: &mut [&mut [u8]],
        offsets: &[u64],
    ) -> io::Result<Vec<usize>>;
}

/// Options for [`register_handler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VsiHandlerOptions {
    /// Pass keys to the store without the prefix.
    pub strip_prefix: bool,
    /// Size of the read-ahead block kept by each open file, and of the blocks
    /// fetched from the store. 64 KiB by default, 0 disables read-ahead and the
    /// shared cache.
    pub buffer_size: usize,
    /// Bytes of `buffer_size` blocks kept in an LRU cache shared by all files of
    /// the prefix. 128 KiB by default, 0 disables the shared cache.
    pub cache_size: usize,
}

impl Default for VsiHandlerOptions {
    fn default() -> Self {
        VsiHandlerOptions {
            strip_prefix: true,
            buffer_size: 64 * 1024,
            cache_size: 2 * 64 * 1024,
        }
    }
}

struct PluginHandler {
    prefix: String,
    store: Arc<dyn KeyReader>,
    options: VsiHandlerOptions,
    cache: Option<BlockCache>,
}

impl PluginHandler {
    fn key<'f>(&self, filename: &'f str) -> &'f str {
        if self.options.strip_prefix {
            filename.strip_prefix(self.prefix.as_str()).unwrap_or(filename)
        } else {
            filename
        }
    }

    /// Reads until `buf` is full or the store reports the end of the key.
    fn read_full(&self, key: &str, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.store.read_at(key, &mut buf[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    /// Reads at the file position. Requests smaller than `buffer_size` are served
    /// from the file's read-ahead block, larger ones go to the cache or the store.
    fn read(&self, file: &mut PluginFile, buf: &mut [u8]) -> io::Result<usize> {
        let block_size = self.options.buffer_size as u64;
        if block_size == 0 {
            return self.read_full(&file.key, buf, file.position);
        }
        if buf.len() as u64 >= block_size {
            return self.read_blocks(file, file.position, buf);
        }

        let mut filled = 0;
        while filled < buf.len() {
            let position = file.position + filled as u64;
            let mut n = file.read_ahead.copy_to(position, &mut buf[filled..]);
            if n == 0 {
                if position >= file.size {
                    break;
                }
                let offset = position - position % block_size;
                let mut data = vec![0; block_size.min(file.size - offset) as usize];
                let read = self.read_blocks(file, offset, &mut data)?;
                data.truncate(read);
                file.read_ahead = ReadAhead { offset, data };
                n = file.read_ahead.copy_to(position, &mut buf[filled..]);
                if n == 0 {
                    break;
                }
            }
            filled += n;
        }
        Ok(filled)
    }

    fn read_blocks(&self, file: &PluginFile, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        match &self.cache {
            Some(cache) => cache.read(&file.key, file.size, offset, buf, |off, out| {
                self.read_full(&file.key, out, off)
            }),
            None => self.read_full(&file.key, buf, offset),
        }
    }

    fn read_ranges(&self, key: &str, ranges: &mut [Range<'_>]) -> io::Result<()> {
        let mut merged = coalesce(ranges);
        log::trace!(
            "{}{key}: {} range(s) read as {} request(s)",
            self.prefix,
            ranges.len(),
            merged.len()
        );
        let multi = self.store.multi_reader().ok_or_else(|| {
            io::Error::new(io::ErrorKind::Unsupported, "store has no multi-range reads")
        })?;
        let offsets: Vec<u64> = merged.iter().map(|m| m.offset).collect();
        let mut bufs: Vec<&mut [u8]> = merged.iter_mut().map(|m| m.data.as_mut_slice()).collect();
        let counts = multi.read_at_multi(key, &mut bufs, &offsets)?;
        if counts.len() != bufs.len() || counts.iter().zip(&bufs).any(|(n, b)| *n != b.len()) {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "short read in multi-range request",
            ));
        }
        scatter(&merged, ranges);
        Ok(())
    }
}

/// A destination of a multi-range read.
struct Range<'a> {
    offset: u64,
    data: &'a mut [u8],
}

/// Adjacent ranges merged into one request.
struct MergedRange {
    offset: u64,
    data: Vec<u8>,
    /// Indices of the ranges served by this request.
    members: std::ops::Range<usize>,
}

fn coalesce(ranges: &[Range<'_>]) -> Vec<MergedRange> {
    let mut merged: Vec<MergedRange> = Vec::new();
    for (i, range) in ranges.iter().enumerate() {
        match merged.last_mut() {
            Some(last) if last.offset + last.data.len() as u64 == range.offset => {
                last.data.resize(last.data.len() + range.data.len(), 0);
                last.members.end = i + 1;
            }
            _ => merged.push(MergedRange {
                offset: range.offset,
                data: vec![0; range.data.len()],
                members: i..i + 1,
            }),
        }
    }
    merged
}

fn scatter(merged: &[MergedRange], ranges: &mut [Range<'_>]) {
    for m in merged {
        let mut from = 0;
        for range in &mut ranges[m.members.clone()] {
            let len = range.data.len();
            range.data.copy_from_slice(&m.data[from..from + len]);
            from += len;
        }
    }
}

/// The last block fetched for one open file.
#[derive(Default)]
struct ReadAhead {
    offset: u64,
    data: Vec<u8>,
}

impl ReadAhead {
    /// Copy the buffered bytes at `position` into `buf`, returning how many.
    fn copy_to(&self, position: u64, buf: &mut [u8]) -> usize {
        let Some(from) = position.checked_sub(self.offset) else {
            return 0;
        };
        if from >= self.data.len() as u64 {
            return 0;
        }
        let from = from as usize;
        let n = buf.len().min(self.data.len() - from);
        buf[..n].copy_from_slice(&self.data[from..from + n]);
        n
    }
}

/// State of one open file, owned by GDAL through the `pFile` pointer.
struct PluginFile {
    handler: &'static PluginHandler,
    key: Arc<str>,
    size: u64,
    position: u64,
    eof: bool,
    read_ahead: ReadAhead,
}

static HANDLERS: Lazy<Mutex<HashMap<String, &'static PluginHandler>>> =
    Lazy::new(Default::default);

/// Report a store error as a GDAL diagnostic, unless it is a missing key.
fn report(handler: &PluginHandler, filename: &str, err: &io::Error) {
    if err.kind() == io::ErrorKind::NotFound {
        return;
    }
    log::warn!("{} store error on {filename}: {err}", handler.prefix);
    emit_failure(CPLE_FILE_IO, &format!("{filename}: {err}"));
}

fn emit_failure(number: c_int, msg: &str) {
    let msg = CString::new(msg.replace('\0', "")).unwrap_or_default();
    unsafe { gdal_sys::CPLError(gdal_sys::CPLErr::CE_Failure, number, c"%s".as_ptr(), msg.as_ptr()) };
}

/// Runs a callback body, turning a panic into a GDAL failure and `fallback`.
fn guarded<R>(fallback: R, f: impl FnOnce() -> R) -> R {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            emit_failure(CPLE_APP_DEFINED, "panic in VSI plugin callback");
            fallback
        }
    }
}

/// Handlers are leaked on registration, so the user data outlives every callback.
unsafe fn handler_from(user_data: *mut c_void) -> &'static PluginHandler {
    &*(user_data as *const PluginHandler)
}

unsafe fn file_from<'f>(file: *mut c_void) -> &'f mut PluginFile {
    &mut *(file as *mut PluginFile)
}

unsafe extern "C" fn stat_cb(
    user_data: *mut c_void,
    filename: *const c_char,
    stat_buf: *mut VSIStatBufL,
    flags: c_int,
) -> c_int {
    guarded(-1, || {
        let handler = handler_from(user_data);
        let filename = _string(filename);
        match handler.store.size(handler.key(&filename)) {
            Ok(size) => {
                // gdal-sys exposes `VSIStatBufL` as an opaque struct; it is the C `struct stat64`
                let stat_buf = stat_buf as *mut libc::stat64;
                std::ptr::write_bytes(stat_buf, 0, 1);
                (*stat_buf).st_mode = libc::S_IFREG as _;
                if flags & VSI_STAT_SIZE_FLAG != 0 {
                    (*stat_buf).st_size = size as _;
                }
                0
            }
            Err(e) => {
                report(handler, &filename, &e);
                -1
            }
        }
    })
}

unsafe extern "C" fn open_cb(
    user_data: *mut c_void,
    filename: *const c_char,
    access: *const c_char,
) -> *mut c_void {
    guarded(std::ptr::null_mut(), || {
        let handler = handler_from(user_data);
        let access = _string(access);
        if access.contains('w') || access.contains('+') {
            emit_failure(CPLE_APP_DEFINED, "Only read-only mode is supported");
            return std::ptr::null_mut();
        }
        let filename = _string(filename);
        let key = handler.key(&filename);
        match handler.store.size(key) {
            Ok(size) => {
                let file = Box::new(PluginFile {
                    handler,
                    key: Arc::from(key),
                    size,
                    position: 0,
                    eof: false,
                    read_ahead: ReadAhead::default(),
                });
                Box::into_raw(file) as *mut c_void
            }
            Err(e) => {
                report(handler, &filename, &e);
                std::ptr::null_mut()
            }
        }
    })
}

unsafe extern "C" fn tell_cb(file: *mut c_void) -> vsi_l_offset {
    file_from(file).position
}

unsafe extern "C" fn seek_cb(file: *mut c_void, offset: vsi_l_offset, whence: c_int) -> c_int {
    let file = file_from(file);
    file.position = match whence {
        libc::SEEK_SET => offset,
        libc::SEEK_CUR => file.position.wrapping_add(offset),
        libc::SEEK_END => file.size.wrapping_add(offset),
        _ => return -1,
    };
    file.eof = false;
    0
}

unsafe extern "C" fn read_cb(
    file: *mut c_void,
    buffer: *mut c_void,
    size: size_t,
    count: size_t,
) -> size_t {
    guarded(0, || {
        let file = file_from(file);
        let Some(total) = size.checked_mul(count) else {
            return 0;
        };
        if total == 0 {
            return 0;
        }
        let buf = std::slice::from_raw_parts_mut(buffer as *mut u8, total);
        let handler = file.handler;
        match handler.read(file, buf) {
            Ok(n) => {
                if n < total {
                    file.eof = true;
                }
                let whole = n / size;
                file.position += (whole * size) as u64;
                whole
            }
            Err(e) => {
                let filename = format!("{}{}", file.handler.prefix, file.key);
                report(file.handler, &filename, &e);
                if e.kind() == io::ErrorKind::NotFound {
                    file.eof = true;
                }
                0
            }
        }
    })
}

unsafe extern "C" fn read_multi_range_cb(
    file: *mut c_void,
    n_ranges: c_int,
    data: *mut *mut c_void,
    offsets: *const vsi_l_offset,
    sizes: *const size_t,
) -> c_int {
    guarded(-1, || {
        let file = file_from(file);
        if n_ranges <= 0 {
            return 0;
        }
        let n = n_ranges as usize;
        let data = std::slice::from_raw_parts(data, n);
        let offsets = std::slice::from_raw_parts(offsets, n);
        let sizes = std::slice::from_raw_parts(sizes, n);
        let mut ranges: Vec<Range<'_>> = (0..n)
            .map(|i| Range {
                offset: offsets[i],
                data: std::slice::from_raw_parts_mut(data[i] as *mut u8, sizes[i]),
            })
            .collect();
        match file.handler.read_ranges(&file.key, &mut ranges) {
            Ok(()) => 0,
            Err(e) => {
                let filename = format!("{}{}", file.handler.prefix, file.key);
                report(file.handler, &filename, &e);
                -1
            }
        }
    })
}

unsafe extern "C" fn eof_cb(file: *mut c_void) -> c_int {
    file_from(file).eof as c_int
}

unsafe extern "C" fn close_cb(file: *mut c_void) -> c_int {
    drop(Box::from_raw(file as *mut PluginFile));
    0
}

#[cfg(any(major_ge_4, all(major_is_3, minor_ge_2)))]
unsafe extern "C" fn sibling_files_cb(
    _user_data: *mut c_void,
    _dirname: *const c_char,
) -> *mut *mut c_char {
    // an empty list, as opposed to NULL, tells GDAL not to probe for sidecar files
    gdal_sys::VSICalloc(1, std::mem::size_of::<*mut c_char>()) as *mut *mut c_char
}

fn prefix_in_use(prefix: &str) -> bool {
    let c_prefixes = unsafe { gdal_sys::VSIGetFileSystemsPrefixes() };
    let prefixes = _string_array(c_prefixes);
    unsafe { gdal_sys::CSLDestroy(c_prefixes) };
    prefixes.iter().any(|p| p == prefix)
}

/// Serve `prefix` from `store`.
///
/// Fails with [`GdalError::DuplicatePrefix`] if the prefix is already handled,
/// by this crate or by GDAL itself (`"/vsimem/"`, `"/vsicurl/"`, ...).
/// Handlers stay installed for the life of the process.
pub fn register_handler(
    prefix: &str,
    store: Arc<dyn KeyReader>,
    options: VsiHandlerOptions,
) -> Result<()> {
    let c_prefix = CString::new(prefix)?;
    let mut handlers = match HANDLERS.lock() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    };
    crate::driver::_register_drivers();
    if handlers.contains_key(prefix) || prefix_in_use(prefix) {
        return Err(GdalError::DuplicatePrefix(prefix.to_string()));
    }

    let handler: &'static PluginHandler = Box::leak(Box::new(PluginHandler {
        prefix: prefix.to_string(),
        store,
        options,
        cache: BlockCache::new(options.buffer_size, options.cache_size),
    }));

    let scope = CallScope::enter(&CallOptions::default())?;
    let rv = unsafe {
        let cb = gdal_sys::VSIAllocFilesystemPluginCallbacksStruct();
        (*cb).pUserData = handler as *const PluginHandler as *mut c_void;
        (*cb).stat = Some(stat_cb);
        (*cb).open = Some(open_cb);
        (*cb).tell = Some(tell_cb);
        (*cb).seek = Some(seek_cb);
        (*cb).read = Some(read_cb);
        // without the callback GDAL reads ranges one by one through `read`
        if handler.store.multi_reader().is_some() {
            (*cb).read_multi_range = Some(read_multi_range_cb);
        }
        (*cb).eof = Some(eof_cb);
        (*cb).close = Some(close_cb);
        #[cfg(any(major_ge_4, all(major_is_3, minor_ge_2)))]
        {
            (*cb).sibling_files = Some(sibling_files_cb);
        }
        // buffering and caching happen in BlockCache
        (*cb).nBufferSize = 0;
        (*cb).nCacheSize = 0;
        let rv = gdal_sys::VSIInstallPluginHandler(c_prefix.as_ptr(), cb);
        gdal_sys::VSIFreeFilesystemPluginCallbacksStruct(cb);
        rv
    };
    if rv != 0 {
        scope.check(gdal_sys::CPLErr::CE_Failure, "VSIInstallPluginHandler")?;
    } else {
        scope.finish()?;
    }

    handlers.insert(prefix.to_string(), handler);
    log::info!(
        "registered VSI handler on {prefix} (buffer {} bytes, cache {} bytes)",
        options.buffer_size,
        options.cache_size
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges<'a>(bufs: &'a mut [Vec<u8>], offsets: &[u64]) -> Vec<Range<'a>> {
        bufs.iter_mut()
            .zip(offsets)
            .map(|(b, &offset)| Range {
                offset,
                data: b.as_mut_slice(),
            })
            .collect()
    }

    #[test]
    fn adjacent_ranges_are_merged() {
        let mut bufs = vec![vec![0; 4], vec![0; 4], vec![0; 2], vec![0; 2]];
        let r = ranges(&mut bufs, &[0, 4, 100, 102]);
        let merged = coalesce(&r);
        let shape: Vec<_> = merged
            .iter()
            .map(|m| (m.offset, m.data.len(), m.members.clone()))
            .collect();
        assert_eq!(shape, vec![(0, 8, 0..2), (100, 4, 2..4)]);
    }

    #[test]
    fn scatter_splits_merged_data() {
        let mut bufs = vec![vec![0; 2], vec![0; 3], vec![0; 1]];
        let mut r = ranges(&mut bufs, &[10, 12, 50]);
        let mut merged = coalesce(&r);
        merged[0].data.copy_from_slice(&[1, 2, 3, 4, 5]);
        merged[1].data.copy_from_slice(&[9]);
        scatter(&merged, &mut r);
        drop(r);
        assert_eq!(bufs, vec![vec![1, 2], vec![3, 4, 5], vec![9]]);
    }

    #[test]
    fn unordered_ranges_are_not_merged() {
        let mut bufs = vec![vec![0; 4], vec![0; 4]];
        let r = ranges(&mut bufs, &[4, 0]);
        assert_eq!(coalesce(&r).len(), 2);
    }

    #[test]
    fn read_ahead_serves_buffered_bytes_only() {
        let block = ReadAhead {
            offset: 16,
            data: (16..24).collect(),
        };
        let mut buf = [0_u8; 4];
        assert_eq!(block.copy_to(8, &mut buf), 0);
        assert_eq!(block.copy_to(18, &mut buf), 4);
        assert_eq!(buf, [18, 19, 20, 21]);
        assert_eq!(block.copy_to(22, &mut buf), 2);
        assert_eq!(&buf[..2], &[22, 23]);
        assert_eq!(block.copy_to(24, &mut buf), 0);
        assert_eq!(ReadAhead::default().copy_to(0, &mut buf), 0);
    }

    #[test]
    fn builtin_prefix_is_rejected() {
        struct Empty;
        impl KeyReader for Empty {
            fn size(&self, _: &str) -> io::Result<u64> {
                Err(io::ErrorKind::NotFound.into())
            }
            fn read_at(&self, _: &str, _: &mut [u8], _: u64) -> io::Result<usize> {
                Ok(0)
            }
        }
        let err = register_handler("/vsimem/", Arc::new(Empty), VsiHandlerOptions::default())
            .unwrap_err();
        assert_eq!(err, GdalError::DuplicatePrefix("/vsimem/".to_string()));
    }
}
