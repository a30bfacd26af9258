//! GDAL virtual file systems.
//!
//! Helpers for `/vsimem/` files, a [`VsiFile`] reader usable with any VSI path,
//! and [`plugin`] to serve a custom prefix from Rust.

use std::io::{self, Read, Seek, SeekFrom};
use std::mem::MaybeUninit;
use std::path::Path;
use std::ptr;

use gdal_sys::{VSIFCloseL, VSIFileFromMemBuffer, VSIFree, VSIGetMemFileBuffer, VSIUnlink, VSILFILE};
use libc::{c_int, c_void, SEEK_END, SEEK_SET};

use crate::diagnostics::{CallOptions, CallScope};
use crate::errors::{CplErrType, GdalError, Result, CPLE_OPEN_FAILED};
use crate::utils::{_last_null_pointer_err, _path_to_c_string};

mod cache;
pub mod plugin;

pub use plugin::{register_handler, KeyReader, MultiKeyReader, VsiHandlerOptions};

/// Creates a new VSIMemFile holding a copy of `data`.
pub fn create_mem_file<P: AsRef<Path>>(file_name: P, data: &[u8]) -> Result<()> {
    _create_mem_file(file_name.as_ref(), data)
}

fn _create_mem_file(file_name: &Path, data: &[u8]) -> Result<()> {
    let file_name = _path_to_c_string(file_name)?;

    // GDAL frees the buffer with VSIFree, so it must come from VSIMalloc
    let buffer = unsafe { gdal_sys::VSIMalloc(data.len().max(1)) } as *mut u8;
    if buffer.is_null() {
        return Err(_last_null_pointer_err("VSIMalloc"));
    }
    unsafe { ptr::copy_nonoverlapping(data.as_ptr(), buffer, data.len()) };

    let handle = unsafe {
        VSIFileFromMemBuffer(file_name.as_ptr(), buffer, data.len() as u64, true as c_int)
    };
    if handle.is_null() {
        unsafe { VSIFree(buffer as *mut c_void) };
        return Err(_last_null_pointer_err("VSIFileFromMemBuffer"));
    }
    unsafe { VSIFCloseL(handle) };
    Ok(())
}

/// Unlink a VSIMemFile.
pub fn unlink_mem_file<P: AsRef<Path>>(file_name: P) -> Result<()> {
    let file_name = file_name.as_ref();
    let file_name_c = _path_to_c_string(file_name)?;
    let rv = unsafe { VSIUnlink(file_name_c.as_ptr()) };
    if rv != 0 {
        return Err(GdalError::UnlinkMemFile {
            file_name: file_name.display().to_string(),
        });
    }
    Ok(())
}

/// Copies the bytes of the VSIMemFile with given `file_name`.
/// Takes the ownership and frees the memory of the VSIMemFile.
pub fn get_vsi_mem_file_bytes_owned<P: AsRef<Path>>(file_name: P) -> Result<Vec<u8>> {
    let file_name = _path_to_c_string(file_name)?;
    let mut length: u64 = 0;
    let bytes = unsafe { VSIGetMemFileBuffer(file_name.as_ptr(), &mut length, true as c_int) };
    if bytes.is_null() {
        return Err(_last_null_pointer_err("VSIGetMemFileBuffer"));
    }
    let owned = unsafe { std::slice::from_raw_parts(bytes, length as usize) }.to_vec();
    unsafe { VSIFree(bytes as *mut c_void) };
    Ok(owned)
}

/// Computes a function on the bytes of the vsi in-memory file with given `file_name`.
/// This method is useful if you don't want to take the ownership of the memory.
pub fn call_on_mem_file_bytes<F, R, P: AsRef<Path>>(file_name: P, fun: F) -> Result<R>
where
    F: FnOnce(&[u8]) -> R,
{
    let file_name = _path_to_c_string(file_name)?;
    let mut length: u64 = 0;
    let bytes = unsafe { VSIGetMemFileBuffer(file_name.as_ptr(), &mut length, false as c_int) };
    if bytes.is_null() {
        return Err(_last_null_pointer_err("VSIGetMemFileBuffer"));
    }
    Ok(fun(unsafe { std::slice::from_raw_parts(bytes, length as usize) }))
}

/// A read-only file opened through GDAL's virtual file system.
///
/// Works with any path GDAL understands, `/vsimem/`, `/vsicurl/`, or a prefix
/// served by [`register_handler`].
#[derive(Debug)]
pub struct VsiFile {
    handle: *mut VSILFILE,
}

impl VsiFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<VsiFile> {
        Self::open_ex(path, &CallOptions::default())
    }

    pub fn open_ex<P: AsRef<Path>>(path: P, call: &CallOptions<'_>) -> Result<VsiFile> {
        let path = path.as_ref();
        let c_path = _path_to_c_string(path)?;

        let scope = CallScope::enter(call)?;
        let mut stat = MaybeUninit::<gdal_sys::VSIStatBufL>::zeroed();
        if unsafe { gdal_sys::VSIStatL(c_path.as_ptr(), stat.as_mut_ptr()) } != 0 {
            scope.finish()?;
            return Err(GdalError::CplError {
                class: CplErrType::Failure,
                number: CPLE_OPEN_FAILED,
                msg: format!("{}: No such file or directory", path.display()),
            });
        }
        let handle = unsafe { gdal_sys::VSIFOpenExL(c_path.as_ptr(), c"rb".as_ptr(), 1) };
        match scope.check_ptr(handle, "VSIFOpenExL") {
            Ok(handle) => Ok(VsiFile { handle }),
            Err((opened, err)) => {
                if let Some(handle) = opened {
                    unsafe { VSIFCloseL(handle) };
                }
                Err(err)
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_null()
    }

    fn handle(&self) -> io::Result<*mut VSILFILE> {
        if self.handle.is_null() {
            return Err(io::Error::other(GdalError::FileClosed));
        }
        Ok(self.handle)
    }

    /// Close the file. A second call returns [`GdalError::FileClosed`].
    pub fn close(&mut self) -> Result<()> {
        if self.handle.is_null() {
            return Err(GdalError::FileClosed);
        }
        let handle = std::mem::replace(&mut self.handle, ptr::null_mut());
        let scope = CallScope::enter(&CallOptions::default())?;
        if unsafe { VSIFCloseL(handle) } != 0 {
            return scope.check(gdal_sys::CPLErr::CE_Failure, "VSIFCloseL");
        }
        scope.finish()
    }

    fn seek_to(&mut self, offset: u64, whence: c_int) -> io::Result<u64> {
        let handle = self.handle()?;
        if unsafe { gdal_sys::VSIFSeekL(handle, offset, whence) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(unsafe { gdal_sys::VSIFTellL(handle) })
    }
}

impl Read for VsiFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let handle = self.handle()?;
        if buf.is_empty() {
            return Ok(0);
        }
        let scope = CallScope::enter(&CallOptions::default()).map_err(io::Error::other)?;
        let n = unsafe { gdal_sys::VSIFReadL(buf.as_mut_ptr() as *mut c_void, 1, buf.len(), handle) };
        scope.finish().map_err(io::Error::other)?;
        Ok(n)
    }
}

impl Seek for VsiFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => return self.seek_to(offset, SEEK_SET),
            SeekFrom::End(delta) => self.seek_to(0, SEEK_END)?.checked_add_signed(delta),
            SeekFrom::Current(delta) => {
                let current = unsafe { gdal_sys::VSIFTellL(self.handle()?) };
                current.checked_add_signed(delta)
            }
        };
        match target {
            Some(offset) => self.seek_to(offset, SEEK_SET),
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}

impl Drop for VsiFile {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe { VSIFCloseL(self.handle) };
        }
    }
}
