//! Call-scoped capture of GDAL diagnostics.
//!
//! GDAL reports warnings and errors through a callback rather than through return
//! values. Every native call made by this crate runs inside a [`CallScope`] that
//! pushes a thread-local handler for the duration of the call and pops it again on
//! every exit path. Diagnostics emitted during the call are collected in emission
//! order and returned as one [`GdalError`].
//!
//! Which diagnostics become errors is decided by a handler, resolved in this order:
//!
//! 1. the handler passed in [`CallOptions::error_handler`] for this call,
//! 2. the process default installed with [`install_error_handler`],
//! 3. [`default_policy`]: warnings and above are errors, debug messages go to the
//!    `log` crate at debug level.
//!
//! ```
//! use gdal_io::diagnostics::{capture, skip_warnings, CallOptions};
//!
//! let options = CallOptions {
//!     error_handler: Some(&skip_warnings),
//!     ..Default::default()
//! };
//! capture(&options, || {
//!     // raw gdal_sys calls go here
//! })
//! .unwrap();
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use gdal_sys::{CPLErr, CPLErrorNum};
use libc::{c_char, c_int, c_void};
use once_cell::sync::Lazy;

use crate::config::ScopedConfig;
use crate::errors::{CplErrType, GdalError, Result, CPLE_APP_DEFINED};
use crate::utils::_string;

/// Decides whether a diagnostic is an error.
///
/// Returning `Err` appends the error to the result of the current call, returning
/// `Ok(())` drops the diagnostic.
pub type ErrorHandler<'a> = dyn Fn(CplErrType, c_int, &str) -> Result<()> + Send + Sync + 'a;

/// Options shared by every operation that calls into GDAL.
#[derive(Clone, Copy, Default)]
pub struct CallOptions<'a> {
    /// Replaces the default classification for this call only.
    pub error_handler: Option<&'a ErrorHandler<'a>>,
    /// Thread-local configuration options set for this call only.
    pub config: &'a [(&'a str, &'a str)],
}

impl fmt::Debug for CallOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallOptions")
            .field("error_handler", &self.error_handler.map(|_| "Fn"))
            .field("config", &self.config)
            .finish()
    }
}

/// Warnings and above become errors. Debug messages are logged.
pub fn default_policy(class: CplErrType, number: c_int, msg: &str) -> Result<()> {
    match class {
        CplErrType::None => Ok(()),
        CplErrType::Debug => {
            log::debug!(target: "gdal_io::diagnostics", "{msg}");
            Ok(())
        }
        CplErrType::Warning | CplErrType::Failure | CplErrType::Fatal => Err(GdalError::CplError {
            class,
            number,
            msg: msg.to_string(),
        }),
    }
}

/// Like [`default_policy`], except that warnings are logged instead of returned.
pub fn skip_warnings(class: CplErrType, number: c_int, msg: &str) -> Result<()> {
    if class == CplErrType::Warning {
        log::warn!(target: "gdal_io::diagnostics", "{msg}");
        return Ok(());
    }
    default_policy(class, number, msg)
}

type InstalledHandler = (u64, Arc<ErrorHandler<'static>>);

/// Installed handlers, most recent last. The last one is the process default.
static INSTALLED_HANDLERS: Lazy<RwLock<Vec<InstalledHandler>>> = Lazy::new(Default::default);
static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(0);

fn default_handler() -> Option<Arc<ErrorHandler<'static>>> {
    let handlers = match INSTALLED_HANDLERS.read() {
        Ok(guard) => guard,
        // a poisoned lock still holds valid entries
        Err(poison_error) => poison_error.into_inner(),
    };
    handlers.last().map(|(_, handler)| handler.clone())
}

fn with_installed_handlers<R>(f: impl FnOnce(&mut Vec<InstalledHandler>) -> R) -> R {
    let mut lock = match INSTALLED_HANDLERS.write() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    };
    f(&mut lock)
}

/// Install a process-wide handler used by calls that do not pass their own.
///
/// The most recently installed handler that is still alive is the default.
/// Dropping the returned guard uninstalls this handler only, so guards may be
/// dropped in any order.
///
/// Scopes that are already running keep the handler they started with.
#[must_use = "the handler is uninstalled when the guard is dropped"]
pub fn install_error_handler<F>(handler: F) -> ErrorHandlerGuard
where
    F: Fn(CplErrType, c_int, &str) -> Result<()> + Send + Sync + 'static,
{
    let id = NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed);
    with_installed_handlers(|handlers| handlers.push((id, Arc::new(handler))));
    ErrorHandlerGuard { id }
}

pub struct ErrorHandlerGuard {
    id: u64,
}

impl Drop for ErrorHandlerGuard {
    fn drop(&mut self) {
        with_installed_handlers(|handlers| handlers.retain(|(id, _)| *id != self.id));
    }
}

struct CallContext<'a> {
    handler: Option<&'a ErrorHandler<'a>>,
    default: Option<Arc<ErrorHandler<'static>>>,
    errors: RefCell<Vec<GdalError>>,
    saw_failure: Cell<bool>,
}

impl CallContext<'_> {
    fn dispatch(&self, class: CplErrType, number: c_int, msg: &str) {
        if class >= CplErrType::Failure {
            self.saw_failure.set(true);
        }
        let outcome = if let Some(handler) = self.handler {
            handler(class, number, msg)
        } else if let Some(handler) = &self.default {
            handler(class, number, msg)
        } else {
            default_policy(class, number, msg)
        };
        if let Err(err) = outcome {
            self.push(err);
        }
    }

    fn push(&self, err: GdalError) {
        if let Ok(mut errors) = self.errors.try_borrow_mut() {
            errors.push(err);
        }
    }
}

unsafe extern "C" fn call_scope_handler(
    class: CPLErr::Type,
    number: CPLErrorNum,
    msg_ptr: *const c_char,
) {
    let context = gdal_sys::CPLGetErrorHandlerUserData() as *const CallContext<'static>;
    if context.is_null() {
        return;
    }
    let context = &*context;
    let msg = _string(msg_ptr);
    let class = CplErrType::from(class);

    // unwinding into C is undefined behaviour
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| context.dispatch(class, number, &msg)));
    if outcome.is_err() {
        context.push(GdalError::CplError {
            class: CplErrType::Failure,
            number: CPLE_APP_DEFINED,
            msg: format!("error handler panicked on: {msg}"),
        });
    }
}

/// Scoped registration of a capturing error handler on the current thread.
///
/// Must be dropped on the thread that created it, which is why it is neither
/// `Send` nor `Sync`.
pub(crate) struct CallScope<'a> {
    context: Box<CallContext<'a>>,
    _config: ScopedConfig,
    _private: PhantomData<*mut c_void>,
}

impl<'a> CallScope<'a> {
    pub(crate) fn enter(options: &CallOptions<'a>) -> Result<Self> {
        let config = ScopedConfig::apply(options.config)?;
        let context = Box::new(CallContext {
            handler: options.error_handler,
            default: default_handler(),
            errors: RefCell::new(Vec::new()),
            saw_failure: Cell::new(false),
        });
        let user_data = &*context as *const CallContext<'a> as *mut c_void;
        unsafe { gdal_sys::CPLPushErrorHandlerEx(Some(call_scope_handler), user_data) };
        Ok(CallScope {
            context,
            _config: config,
            _private: PhantomData,
        })
    }

    fn take_error(&self) -> Option<GdalError> {
        let errors = std::mem::take(&mut *self.context.errors.borrow_mut());
        GdalError::combine(errors)
    }

    /// Report a native failure that produced no diagnostic of failure severity.
    ///
    /// The synthetic message goes through the same handler as real ones.
    fn force_failure(&self, method_name: &'static str, code: Option<c_int>) {
        if self.context.saw_failure.get() || !self.context.errors.borrow().is_empty() {
            return;
        }
        let msg = GdalError::UnknownFailure { method_name, code }.to_string();
        self.context.dispatch(CplErrType::Failure, CPLE_APP_DEFINED, &msg);
    }

    /// Ends the scope, returning the captured diagnostics as an error.
    pub(crate) fn finish(self) -> Result<()> {
        match self.take_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Ends the scope after a call that returned a `CPLErr`.
    pub(crate) fn check(self, rv: CPLErr::Type, method_name: &'static str) -> Result<()> {
        if rv >= CPLErr::CE_Failure {
            self.force_failure(method_name, Some(rv as c_int));
        }
        self.finish()
    }

    /// Ends the scope after a call that returns a handle, `NULL` meaning failure.
    ///
    /// A non-null handle is returned alongside the captured error, if any, so the
    /// caller can release it.
    pub(crate) fn check_ptr<T>(
        self,
        ptr: *mut T,
        method_name: &'static str,
    ) -> std::result::Result<*mut T, (Option<*mut T>, GdalError)> {
        if ptr.is_null() {
            self.force_failure(method_name, None);
            let err = self
                .take_error()
                .unwrap_or(GdalError::UnknownFailure {
                    method_name,
                    code: None,
                });
            return Err((None, err));
        }
        match self.take_error() {
            Some(err) => Err((Some(ptr), err)),
            None => Ok(ptr),
        }
    }
}

impl Drop for CallScope<'_> {
    fn drop(&mut self) {
        unsafe { gdal_sys::CPLPopErrorHandler() };
    }
}

/// Run `f` with GDAL diagnostics captured as for any call made by this crate.
///
/// Useful to bracket raw `gdal_sys` calls. Diagnostics are returned as the error
/// even when `f` produced a value.
pub fn capture<T, F>(options: &CallOptions<'_>, f: F) -> Result<T>
where
    F: FnOnce() -> T,
{
    let scope = CallScope::enter(options)?;
    let value = f();
    scope.finish().map(|()| value)
}
