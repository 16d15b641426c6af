#![cfg(not(windows))]

use path_overlay::overlay::error::{STATUS_FAIL, STATUS_INVALID_ARG, STATUS_OK, STATUS_POINTER};
use path_overlay::overlay::ffi::{
    overlay_add_point, overlay_add_points, overlay_clear_points, overlay_create,
    overlay_create_drawable, overlay_destroy, overlay_dispose_handle, overlay_render,
};
use path_overlay::overlay::platform::message_kind::{
    MK_LBUTTON, VK_ESCAPE, WM_KEYUP, WM_LBUTTONDOWN, WM_MOUSEMOVE,
};
use path_overlay::overlay::platform::RawMessage;
use path_overlay::overlay::MouseMovement;
use path_overlay::{OverlayHost, Point};
use serial_test::serial;
use std::ptr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

static CLOSED_PATH: Mutex<Option<Vec<MouseMovement>>> = Mutex::new(None);

extern "C" fn record_path(data: *const MouseMovement, len: i32) {
    let path = if data.is_null() {
        Vec::new()
    } else {
        unsafe { std::slice::from_raw_parts(data, len as usize) }.to_vec()
    };
    *CLOSED_PATH.lock().unwrap() = Some(path);
}

fn send(handle: *mut OverlayHost, message: RawMessage) {
    let host = unsafe { &*handle };
    host.proxy()
        .expect("running overlay")
        .send_input(message)
        .expect("deliver input");
}

#[test]
#[serial]
fn handle_lifecycle_through_the_c_surface() {
    let points = [Point::new(0, 0), Point::new(10, 0), Point::new(10, 10)];
    let mut handle: *mut OverlayHost = ptr::null_mut();
    unsafe {
        assert_eq!(
            overlay_create(points.as_ptr(), points.len() as i32, &mut handle),
            STATUS_OK
        );
        assert!(!handle.is_null());

        assert_eq!(overlay_add_point(handle, Point::new(20, 20), true), STATUS_OK);
        assert_eq!(
            overlay_add_points(handle, points.as_ptr(), points.len() as i32),
            STATUS_OK
        );
        assert_eq!(overlay_add_points(handle, ptr::null(), 0), STATUS_INVALID_ARG);
        assert_eq!(overlay_clear_points(handle), STATUS_OK);
        assert_eq!(overlay_render(handle), STATUS_OK);

        assert_eq!(overlay_destroy(handle), STATUS_OK);
        // The handle outlives its window until disposed.
        assert_eq!(overlay_destroy(handle), STATUS_FAIL);
        assert_eq!(overlay_render(handle), STATUS_FAIL);
        overlay_dispose_handle(handle);
    }
}

#[test]
#[serial]
fn create_without_points_opens_an_empty_overlay() {
    let mut handle: *mut OverlayHost = ptr::null_mut();
    unsafe {
        assert_eq!(overlay_create(ptr::null(), 0, &mut handle), STATUS_OK);
        assert_eq!(overlay_render(handle), STATUS_OK);
        overlay_dispose_handle(handle);
    }
}

#[test]
#[serial]
fn invalid_arguments_map_to_status_codes() {
    let mut handle: *mut OverlayHost = ptr::null_mut();
    unsafe {
        assert_eq!(overlay_create(ptr::null(), 0, ptr::null_mut()), STATUS_POINTER);
        assert_eq!(
            overlay_create_drawable(ptr::null(), 0, None, &mut handle),
            STATUS_INVALID_ARG
        );
        assert!(handle.is_null());
        assert_eq!(overlay_clear_points(ptr::null_mut()), STATUS_POINTER);
    }
}

#[test]
#[serial]
fn drawable_overlay_reports_the_path_through_the_callback() {
    *CLOSED_PATH.lock().unwrap() = None;
    let seeded = [MouseMovement::new(Point::new(5, 5), 0)];
    let mut handle: *mut OverlayHost = ptr::null_mut();
    unsafe {
        assert_eq!(
            overlay_create_drawable(
                seeded.as_ptr(),
                seeded.len() as i32,
                Some(record_path),
                &mut handle
            ),
            STATUS_OK
        );
    }

    send(handle, RawMessage::mouse(WM_LBUTTONDOWN, MK_LBUTTON, Point::new(40, 40)));
    send(handle, RawMessage::mouse(WM_MOUSEMOVE, MK_LBUTTON, Point::new(60, 40)));
    send(handle, RawMessage::new(WM_KEYUP, VK_ESCAPE, 0));

    let deadline = Instant::now() + Duration::from_secs(5);
    let path = loop {
        if let Some(path) = CLOSED_PATH.lock().unwrap().take() {
            break path;
        }
        assert!(Instant::now() < deadline, "callback never ran");
        std::thread::sleep(Duration::from_millis(10));
    };
    assert_eq!(
        path,
        vec![
            MouseMovement::new(Point::new(5, 5), 0),
            MouseMovement::new(Point::new(40, 40), 0),
            MouseMovement::new(Point::new(60, 40), 1),
        ]
    );
    unsafe { overlay_dispose_handle(handle) };
}
