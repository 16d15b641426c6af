//! Win32 layered popup composited through Direct2D over a WIC bitmap.

use super::{
    disconnected, HostMessage, NativeWindow, Platform, RawMessage, WindowMessage, WindowOptions,
    WindowProxy,
};
use crate::overlay::compositor::{DeviceResources, RenderBackend, StrokeSettings};
use crate::overlay::error::{InitStage, OverlayError, Result, STATUS_RECREATE_TARGET};
use crate::overlay::geometry::Point;
use crate::overlay::placement::{overlay_bounds, ScreenRect, SurfaceSize};
use crate::overlay::raster::Rgba;
use std::collections::VecDeque;
use std::ffi::c_void;
use std::marker::PhantomData;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Once;
use windows::core::{Interface, PCWSTR};
use windows::Win32::Foundation::{COLORREF, HWND, LPARAM, LRESULT, POINT, SIZE, WPARAM};
use windows::Win32::Graphics::Direct2D::Common::{
    D2D1_ALPHA_MODE_PREMULTIPLIED, D2D1_COLOR_F, D2D1_FIGURE_BEGIN_HOLLOW, D2D1_FIGURE_END_OPEN,
    D2D1_PIXEL_FORMAT, D2D_POINT_2F,
};
use windows::Win32::Graphics::Direct2D::{
    D2D1CreateFactory, ID2D1Factory, ID2D1GdiInteropRenderTarget, ID2D1RenderTarget,
    ID2D1SolidColorBrush, ID2D1StrokeStyle, D2D1_CAP_STYLE_FLAT, D2D1_DASH_STYLE_SOLID,
    D2D1_DC_INITIALIZE_MODE_COPY, D2D1_FACTORY_TYPE_SINGLE_THREADED, D2D1_FEATURE_LEVEL_DEFAULT,
    D2D1_LINE_JOIN_ROUND, D2D1_RENDER_TARGET_PROPERTIES, D2D1_RENDER_TARGET_TYPE_DEFAULT,
    D2D1_RENDER_TARGET_USAGE_GDI_COMPATIBLE, D2D1_STROKE_STYLE_PROPERTIES,
};
use windows::Win32::Graphics::Dxgi::Common::DXGI_FORMAT_B8G8R8A8_UNORM;
use windows::Win32::Graphics::Gdi::{AC_SRC_ALPHA, AC_SRC_OVER, BLENDFUNCTION, HDC};
use windows::Win32::Graphics::Imaging::{
    CLSID_WICImagingFactory, GUID_WICPixelFormat32bppPBGRA, IWICBitmap, IWICImagingFactory,
    WICBitmapCacheOnLoad,
};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoUninitialize, CLSCTX_INPROC_SERVER,
    COINIT_APARTMENTTHREADED,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::HiDpi::GetDpiForWindow;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW,
    GetSystemMetrics, IsWindow, IsWindowVisible, PostMessageW, PostQuitMessage, RegisterClassW,
    SetWindowPos, ShowWindow, TranslateMessage, UpdateLayeredWindow, HWND_TOPMOST, MSG,
    SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN, SM_YVIRTUALSCREEN, SWP_NOACTIVATE,
    SW_SHOWNOACTIVATE, ULW_ALPHA, WINDOW_EX_STYLE, WINDOW_STYLE, WM_APP, WM_CLOSE, WM_DESTROY,
    WM_DISPLAYCHANGE, WNDCLASSW, WS_EX_LAYERED, WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW,
    WS_EX_TOPMOST, WS_EX_TRANSPARENT, WS_POPUP,
};

const CLASS_NAME: &str = "PathOverlayWindow";
/// Wakes the loop to drain the host queue.
const WM_HOST_WAKE: u32 = WM_APP + 1;
/// Quit code marking a display-mode change.
const DISPLAY_CHANGED_EXIT: i32 = 1;

fn widestring(value: &str) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    std::ffi::OsStr::new(value)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

fn init_error(stage: InitStage, err: windows::core::Error) -> OverlayError {
    OverlayError::Initialization {
        stage,
        code: err.code().0,
        message: err.to_string(),
    }
}

fn render_error(err: windows::core::Error) -> OverlayError {
    OverlayError::Render {
        code: err.code().0,
        message: err.to_string(),
    }
}

fn composition_error(err: windows::core::Error) -> OverlayError {
    OverlayError::Composition {
        code: err.code().0,
        message: err.to_string(),
    }
}

pub fn compose_window_ex_style(clickable: bool) -> WINDOW_EX_STYLE {
    let style = WS_EX_LAYERED | WS_EX_TOPMOST | WS_EX_TOOLWINDOW | WS_EX_NOACTIVATE;
    if clickable {
        style
    } else {
        style | WS_EX_TRANSPARENT
    }
}

/// Single-threaded COM apartment for the overlay thread.
pub struct ComApartment {
    _thread_bound: PhantomData<*const ()>,
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        unsafe { CoUninitialize() };
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Win32Platform;

impl Platform for Win32Platform {
    type Window = Win32Window;
    type Backend = Direct2DBackend;
    type ThreadScope = ComApartment;

    fn enter_thread(&self) -> Result<ComApartment> {
        unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) }
            .ok()
            .map_err(|err| init_error(InitStage::Thread, err))?;
        Ok(ComApartment {
            _thread_bound: PhantomData,
        })
    }

    fn create_backend(&self, stroke: StrokeSettings) -> Result<Direct2DBackend> {
        let factory =
            unsafe { D2D1CreateFactory::<ID2D1Factory>(D2D1_FACTORY_TYPE_SINGLE_THREADED, None) }
                .map_err(|err| init_error(InitStage::Factory, err))?;
        let stroke_style = unsafe {
            factory.CreateStrokeStyle(
                &D2D1_STROKE_STYLE_PROPERTIES {
                    startCap: D2D1_CAP_STYLE_FLAT,
                    endCap: D2D1_CAP_STYLE_FLAT,
                    dashCap: D2D1_CAP_STYLE_FLAT,
                    lineJoin: D2D1_LINE_JOIN_ROUND,
                    miterLimit: 10.0,
                    dashStyle: D2D1_DASH_STYLE_SOLID,
                    dashOffset: 0.0,
                },
                None,
            )
        }
        .map_err(|err| init_error(InitStage::Factory, err))?;
        let imaging = unsafe {
            CoCreateInstance::<_, IWICImagingFactory>(
                &CLSID_WICImagingFactory,
                None,
                CLSCTX_INPROC_SERVER,
            )
        }
        .map_err(|err| init_error(InitStage::Factory, err))?;

        Ok(Direct2DBackend {
            factory,
            stroke_style,
            imaging,
            color: stroke.color,
        })
    }

    fn create_window(&self, options: &WindowOptions) -> Result<Win32Window> {
        static REGISTER_CLASS: Once = Once::new();
        let class_name = widestring(CLASS_NAME);
        let title = widestring(&options.title);
        let hinstance = unsafe { GetModuleHandleW(PCWSTR::null()) }
            .map_err(|err| init_error(InitStage::Window, err))?;

        REGISTER_CLASS.call_once(|| unsafe {
            let wc = WNDCLASSW {
                hInstance: hinstance.into(),
                lpszClassName: PCWSTR(class_name.as_ptr()),
                lpfnWndProc: Some(overlay_wndproc),
                ..Default::default()
            };
            let _ = RegisterClassW(&wc);
        });

        // Created empty: the DPI is only known once the window exists.
        let hwnd = unsafe {
            CreateWindowExW(
                compose_window_ex_style(options.clickable),
                PCWSTR(class_name.as_ptr()),
                PCWSTR(title.as_ptr()),
                WINDOW_STYLE(WS_POPUP.0),
                0,
                0,
                0,
                0,
                None,
                None,
                hinstance,
                None,
            )
        }
        .map_err(|err| init_error(InitStage::Window, err))?;

        let (sender, queue) = channel();
        Ok(Win32Window {
            hwnd,
            bounds: ScreenRect::default(),
            sender,
            queue,
            pending: VecDeque::new(),
            finished: false,
        })
    }
}

/// Messages the window procedure owns; every other message posted to the
/// window goes to the input collaborator before default handling.
fn handled_by_window_proc(kind: u32) -> bool {
    matches!(kind, WM_CLOSE | WM_DESTROY | WM_DISPLAYCHANGE)
}

unsafe extern "system" fn overlay_wndproc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_CLOSE => {
            let _ = unsafe { DestroyWindow(hwnd) };
            LRESULT(0)
        }
        WM_DESTROY => {
            unsafe { PostQuitMessage(0) };
            LRESULT(0)
        }
        WM_DISPLAYCHANGE => {
            unsafe { PostQuitMessage(DISPLAY_CHANGED_EXIT) };
            LRESULT(0)
        }
        _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}

#[derive(Debug, Clone)]
pub struct Win32Proxy {
    sender: Sender<HostMessage>,
    hwnd: isize,
}

impl WindowProxy for Win32Proxy {
    fn post(&self, message: HostMessage) -> Result<()> {
        self.sender.send(message).map_err(|_| disconnected("post"))?;
        unsafe {
            PostMessageW(
                HWND(self.hwnd as *mut c_void),
                WM_HOST_WAKE,
                WPARAM(0),
                LPARAM(0),
            )
        }
        .map_err(|err| OverlayError::ThreadCommunication(err.to_string()))
    }
}

pub struct Win32Window {
    hwnd: HWND,
    bounds: ScreenRect,
    sender: Sender<HostMessage>,
    queue: Receiver<HostMessage>,
    pending: VecDeque<HostMessage>,
    finished: bool,
}

impl Win32Window {
    fn finish(&mut self) {
        self.finished = true;
        if unsafe { IsWindow(self.hwnd) }.as_bool() {
            let _ = unsafe { DestroyWindow(self.hwnd) };
        }
    }
}

impl NativeWindow for Win32Window {
    type Proxy = Win32Proxy;

    fn proxy(&self) -> Win32Proxy {
        Win32Proxy {
            sender: self.sender.clone(),
            hwnd: self.hwnd.0 as isize,
        }
    }

    fn place(&mut self) -> Result<()> {
        let dpi = unsafe { GetDpiForWindow(self.hwnd) };
        let virtual_screen = unsafe {
            ScreenRect::new(
                GetSystemMetrics(SM_XVIRTUALSCREEN),
                GetSystemMetrics(SM_YVIRTUALSCREEN),
                GetSystemMetrics(SM_CXVIRTUALSCREEN),
                GetSystemMetrics(SM_CYVIRTUALSCREEN),
            )
        };
        let bounds = overlay_bounds(virtual_screen, dpi);
        unsafe {
            SetWindowPos(
                self.hwnd,
                HWND_TOPMOST,
                bounds.x,
                bounds.y,
                bounds.width,
                bounds.height,
                SWP_NOACTIVATE,
            )
        }
        .map_err(|err| init_error(InitStage::Placement, err))?;
        tracing::debug!(dpi, ?bounds, "overlay window placed");
        self.bounds = bounds;
        Ok(())
    }

    fn show(&mut self) -> Result<()> {
        let _ = unsafe { ShowWindow(self.hwnd, SW_SHOWNOACTIVATE) };
        if unsafe { IsWindowVisible(self.hwnd) }.as_bool() {
            Ok(())
        } else {
            Err(OverlayError::init(InitStage::Show, "window is not visible after show"))
        }
    }

    fn client_size(&self) -> SurfaceSize {
        self.bounds.size()
    }

    fn client_origin(&self) -> Point {
        Point::new(self.bounds.x, self.bounds.y)
    }

    fn next_message(&mut self) -> Result<Option<WindowMessage>> {
        if self.finished {
            return Ok(None);
        }
        let mut msg = MSG::default();
        loop {
            if let Some(message) = self.pending.pop_front() {
                match message {
                    HostMessage::Close => {
                        let _ = unsafe { DestroyWindow(self.hwnd) };
                    }
                    HostMessage::Command { command, reply } => {
                        return Ok(Some(WindowMessage::Command { command, reply }));
                    }
                }
                continue;
            }

            let status = unsafe { GetMessageW(&mut msg, HWND::default(), 0, 0) };
            match status.0 {
                -1 => {
                    self.finish();
                    return Err(OverlayError::EventLoop(
                        windows::core::Error::from_win32().to_string(),
                    ));
                }
                0 => {
                    self.finish();
                    return if msg.wParam.0 == DISPLAY_CHANGED_EXIT as usize {
                        Err(OverlayError::DisplayChanged)
                    } else {
                        Ok(None)
                    };
                }
                _ => {}
            }

            match msg.message {
                WM_HOST_WAKE => self.pending.extend(self.queue.try_iter()),
                kind if msg.hwnd == self.hwnd && !handled_by_window_proc(kind) => {
                    // Keyboard input still produces its character messages.
                    let _ = unsafe { TranslateMessage(&msg) };
                    return Ok(Some(WindowMessage::Input(RawMessage::new(
                        kind,
                        msg.wParam.0,
                        msg.lParam.0,
                    ))));
                }
                _ => unsafe {
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                },
            }
        }
    }

    fn default_handling(&self, message: RawMessage) {
        unsafe {
            DefWindowProcW(
                self.hwnd,
                message.kind,
                WPARAM(message.wparam),
                LPARAM(message.lparam),
            );
        }
    }
}

impl Drop for Win32Window {
    fn drop(&mut self) {
        if !self.finished {
            self.finish();
        }
    }
}

pub struct Direct2DBackend {
    factory: ID2D1Factory,
    stroke_style: ID2D1StrokeStyle,
    imaging: IWICImagingFactory,
    color: Rgba,
}

fn color_f(color: Rgba) -> D2D1_COLOR_F {
    D2D1_COLOR_F {
        r: color.r as f32 / 255.0,
        g: color.g as f32 / 255.0,
        b: color.b as f32 / 255.0,
        a: color.a as f32 / 255.0,
    }
}

impl RenderBackend for Direct2DBackend {
    type Target = Win32Window;
    type Resources = Direct2DResources;

    fn create_device_resources(&self, target: &Win32Window) -> Result<Direct2DResources> {
        let size = target.client_size();
        if size.is_empty() {
            return Err(OverlayError::render("window has no client area"));
        }
        let properties = D2D1_RENDER_TARGET_PROPERTIES {
            r#type: D2D1_RENDER_TARGET_TYPE_DEFAULT,
            pixelFormat: D2D1_PIXEL_FORMAT {
                format: DXGI_FORMAT_B8G8R8A8_UNORM,
                alphaMode: D2D1_ALPHA_MODE_PREMULTIPLIED,
            },
            dpiX: 0.0,
            dpiY: 0.0,
            usage: D2D1_RENDER_TARGET_USAGE_GDI_COMPATIBLE,
            minLevel: D2D1_FEATURE_LEVEL_DEFAULT,
        };

        unsafe {
            let bitmap = self
                .imaging
                .CreateBitmap(
                    size.width,
                    size.height,
                    &GUID_WICPixelFormat32bppPBGRA,
                    WICBitmapCacheOnLoad,
                )
                .map_err(render_error)?;
            let render_target = self
                .factory
                .CreateWicBitmapRenderTarget(&bitmap, &properties)
                .map_err(render_error)?;
            let brush = render_target
                .CreateSolidColorBrush(&color_f(self.color), None)
                .map_err(render_error)?;
            let interop = render_target
                .cast::<ID2D1GdiInteropRenderTarget>()
                .map_err(render_error)?;

            Ok(Direct2DResources {
                interop,
                brush,
                render_target,
                _bitmap: bitmap,
                factory: self.factory.clone(),
                stroke_style: self.stroke_style.clone(),
            })
        }
    }
}

pub struct Direct2DResources {
    interop: ID2D1GdiInteropRenderTarget,
    brush: ID2D1SolidColorBrush,
    render_target: ID2D1RenderTarget,
    _bitmap: IWICBitmap,
    factory: ID2D1Factory,
    stroke_style: ID2D1StrokeStyle,
}

fn point_2f(point: &Point) -> D2D_POINT_2F {
    D2D_POINT_2F {
        x: point.x as f32,
        y: point.y as f32,
    }
}

impl DeviceResources for Direct2DResources {
    type Target = Win32Window;

    fn begin_draw(&mut self) {
        unsafe { self.render_target.BeginDraw() };
    }

    fn clear(&mut self) {
        unsafe {
            self.render_target.Clear(Some(&D2D1_COLOR_F {
                r: 0.0,
                g: 0.0,
                b: 0.0,
                a: 0.0,
            }))
        };
    }

    fn stroke_polyline(&mut self, points: &[Point], width: f32) -> Result<()> {
        let Some((first, rest)) = points.split_first() else {
            return Ok(());
        };
        let lines: Vec<D2D_POINT_2F> = rest.iter().map(point_2f).collect();
        unsafe {
            let geometry = self.factory.CreatePathGeometry().map_err(render_error)?;
            let sink = geometry.Open().map_err(render_error)?;
            sink.BeginFigure(point_2f(first), D2D1_FIGURE_BEGIN_HOLLOW);
            sink.AddLines(&lines);
            sink.EndFigure(D2D1_FIGURE_END_OPEN);
            sink.Close().map_err(render_error)?;
            self.render_target
                .DrawGeometry(&geometry, &self.brush, width, &self.stroke_style);
        }
        Ok(())
    }

    fn present(&mut self, target: &Win32Window) -> Result<()> {
        let hdc = unsafe { self.interop.GetDC(D2D1_DC_INITIALIZE_MODE_COPY) }
            .map_err(composition_error)?;
        let updated = update_layered_window(target, hdc);
        let released = unsafe { self.interop.ReleaseDC(None) };
        updated?;
        released.map_err(composition_error)
    }

    fn end_draw(&mut self) -> Result<()> {
        unsafe { self.render_target.EndDraw(None, None) }.map_err(|err| {
            if err.code().0 == STATUS_RECREATE_TARGET {
                OverlayError::DeviceLost
            } else {
                render_error(err)
            }
        })
    }
}

fn update_layered_window(target: &Win32Window, source: HDC) -> Result<()> {
    let destination = POINT {
        x: target.bounds.x,
        y: target.bounds.y,
    };
    let size = SIZE {
        cx: target.bounds.width,
        cy: target.bounds.height,
    };
    let source_origin = POINT { x: 0, y: 0 };
    let blend = BLENDFUNCTION {
        BlendOp: AC_SRC_OVER as u8,
        BlendFlags: 0,
        SourceConstantAlpha: 255,
        AlphaFormat: AC_SRC_ALPHA as u8,
    };
    unsafe {
        UpdateLayeredWindow(
            target.hwnd,
            HDC::default(),
            Some(&destination),
            Some(&size),
            source,
            Some(&source_origin),
            COLORREF(0),
            Some(&blend),
            ULW_ALPHA,
        )
    }
    .map_err(composition_error)
}
