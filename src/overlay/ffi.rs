//! Flat `extern "C"` surface loaded by the automation host.
//!
//! Every call returns an HRESULT-style status. Handles are created by
//! `overlay_create*`, closed by `overlay_destroy` and freed by
//! `overlay_dispose_handle`.

use crate::logging;
use crate::overlay::error::{status_of, OverlayError, Result, STATUS_POINTER, STATUS_UNEXPECTED};
use crate::overlay::geometry::{MouseMovement, Point};
use crate::overlay::platform::DefaultPlatform;
use crate::overlay::{spawn_drawable_overlay, spawn_path_overlay, OverlayHost};
use crate::settings::OverlaySettings;
use once_cell::sync::OnceCell;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

/// Receives the drawn path (null when empty) and its length.
pub type WindowClosingCallback = extern "C" fn(*const MouseMovement, i32);

static LOGGING: OnceCell<()> = OnceCell::new();

fn load_settings() -> OverlaySettings {
    let settings = OverlaySettings::from_env();
    LOGGING.get_or_init(|| logging::init(settings.debug_logging, settings.log_file.clone()));
    settings
}

fn guarded(call: impl FnOnce() -> Result<()>) -> i32 {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => {
            if let Err(err) = &result {
                tracing::debug!("overlay call failed: {err}");
            }
            status_of(&result)
        }
        Err(_) => {
            tracing::error!("panic caught at the overlay C boundary");
            STATUS_UNEXPECTED
        }
    }
}

unsafe fn slice_arg<'a, T>(data: *const T, len: i32, what: &'static str) -> Result<&'a [T]> {
    if data.is_null() || len <= 0 {
        return Err(OverlayError::InvalidArgument(what));
    }
    Ok(unsafe { std::slice::from_raw_parts(data, len as usize) })
}

unsafe fn host_mut<'a>(handle: *mut OverlayHost) -> Result<&'a mut OverlayHost> {
    unsafe { handle.as_mut() }.ok_or(OverlayError::NullHandle)
}

/// Creates a click-through overlay, optionally seeded with `points`.
/// Blocks until the window is shown or has failed.
///
/// # Safety
/// `points` must be null or point to `len` values; `out` must be writable.
#[no_mangle]
pub unsafe extern "C" fn overlay_create(
    points: *const Point,
    len: i32,
    out: *mut *mut OverlayHost,
) -> i32 {
    if out.is_null() {
        return STATUS_POINTER;
    }
    unsafe { *out = ptr::null_mut() };
    guarded(|| {
        let initial = if points.is_null() {
            &[][..]
        } else {
            unsafe { slice_arg(points, len, "initial point list is empty") }?
        };
        let settings = load_settings();
        let host = spawn_path_overlay(DefaultPlatform::default(), &settings, initial)?;
        unsafe { *out = Box::into_raw(Box::new(host)) };
        Ok(())
    })
}

/// Creates an overlay the user draws on. `callback` receives the drawn path
/// when the user presses Escape.
///
/// # Safety
/// `movements` must be null or point to `len` values; `out` must be writable.
#[no_mangle]
pub unsafe extern "C" fn overlay_create_drawable(
    movements: *const MouseMovement,
    len: i32,
    callback: Option<WindowClosingCallback>,
    out: *mut *mut OverlayHost,
) -> i32 {
    if out.is_null() {
        return STATUS_POINTER;
    }
    unsafe { *out = ptr::null_mut() };
    guarded(|| {
        let callback = callback.ok_or(OverlayError::InvalidArgument("closing callback is null"))?;
        let initial = if movements.is_null() {
            Vec::new()
        } else {
            unsafe { slice_arg(movements, len, "initial movement list is empty") }?.to_vec()
        };
        let settings = load_settings();
        let on_closing = Box::new(move |path: &[MouseMovement]| {
            let data = if path.is_empty() {
                ptr::null()
            } else {
                path.as_ptr()
            };
            callback(data, path.len() as i32);
        });
        let host =
            spawn_drawable_overlay(DefaultPlatform::default(), &settings, initial, on_closing)?;
        unsafe { *out = Box::into_raw(Box::new(host)) };
        Ok(())
    })
}

/// Closes the window and waits for its thread. The handle stays allocated.
///
/// # Safety
/// `handle` must be null or come from `overlay_create*` and not be disposed.
#[no_mangle]
pub unsafe extern "C" fn overlay_destroy(handle: *mut OverlayHost) -> i32 {
    guarded(|| unsafe { host_mut(handle) }?.close())
}

/// # Safety
/// See [`overlay_destroy`].
#[no_mangle]
pub unsafe extern "C" fn overlay_add_point(
    handle: *mut OverlayHost,
    point: Point,
    render: bool,
) -> i32 {
    guarded(|| unsafe { host_mut(handle) }?.add_point(point, false, render))
}

/// # Safety
/// See [`overlay_destroy`]; `points` must point to `len` values.
#[no_mangle]
pub unsafe extern "C" fn overlay_add_points(
    handle: *mut OverlayHost,
    points: *const Point,
    len: i32,
) -> i32 {
    guarded(|| {
        let host = unsafe { host_mut(handle) }?;
        let points = unsafe { slice_arg(points, len, "point list is empty") }?;
        host.add_points(points, false)
    })
}

/// # Safety
/// See [`overlay_destroy`].
#[no_mangle]
pub unsafe extern "C" fn overlay_clear_points(handle: *mut OverlayHost) -> i32 {
    guarded(|| unsafe { host_mut(handle) }?.clear_points())
}

/// # Safety
/// See [`overlay_destroy`].
#[no_mangle]
pub unsafe extern "C" fn overlay_render(handle: *mut OverlayHost) -> i32 {
    guarded(|| unsafe { host_mut(handle) }?.render())
}

/// Frees the handle. A window still open is closed on the way out.
///
/// # Safety
/// `handle` must be null or come from `overlay_create*`; it is invalid
/// afterwards.
#[no_mangle]
pub unsafe extern "C" fn overlay_dispose_handle(handle: *mut OverlayHost) {
    if handle.is_null() {
        return;
    }
    let host = unsafe { Box::from_raw(handle) };
    if panic::catch_unwind(AssertUnwindSafe(move || drop(host))).is_err() {
        tracing::error!("panic caught while disposing an overlay handle");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::error::{STATUS_INVALID_ARG, STATUS_OK};

    #[test]
    fn null_handles_are_rejected() {
        unsafe {
            assert_eq!(overlay_render(ptr::null_mut()), STATUS_POINTER);
            assert_eq!(overlay_destroy(ptr::null_mut()), STATUS_POINTER);
            assert_eq!(
                overlay_add_point(ptr::null_mut(), Point::new(1, 1), true),
                STATUS_POINTER
            );
            overlay_dispose_handle(ptr::null_mut());
        }
    }

    #[test]
    fn creation_arguments_are_validated_before_spawning() {
        let mut handle = ptr::null_mut();
        let points = [Point::new(0, 0)];
        unsafe {
            assert_eq!(overlay_create(points.as_ptr(), 0, &mut handle), STATUS_INVALID_ARG);
            assert!(handle.is_null());
            assert_eq!(
                overlay_create_drawable(ptr::null(), 0, None, &mut handle),
                STATUS_INVALID_ARG
            );
            assert!(handle.is_null());
            assert_eq!(
                overlay_create(ptr::null(), 0, ptr::null_mut()),
                STATUS_POINTER
            );
        }
    }

    #[test]
    fn panics_become_unexpected() {
        assert_eq!(guarded(|| panic!("boom")), STATUS_UNEXPECTED);
        assert_eq!(guarded(|| Ok(())), STATUS_OK);
    }
}
