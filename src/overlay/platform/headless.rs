//! In-process platform: a channel stands in for the native message queue and
//! frames are rasterised in software. Used off Windows and by tests, which
//! observe it (and arm one-shot faults) through a [`HeadlessProbe`].

use super::{
    disconnected, HostMessage, NativeWindow, Platform, RawMessage, WindowMessage, WindowOptions,
    WindowProxy,
};
use crate::overlay::compositor::{DeviceResources, RenderBackend, StrokeSettings};
use crate::overlay::error::{InitStage, OverlayError, Result};
use crate::overlay::geometry::Point;
use crate::overlay::placement::{overlay_bounds, ScreenRect, SurfaceSize};
use crate::overlay::raster::{Frame, Rgba};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessDisplay {
    pub virtual_screen: ScreenRect,
    pub dpi: u32,
}

impl Default for HeadlessDisplay {
    fn default() -> Self {
        Self {
            virtual_screen: ScreenRect::new(0, 0, 1920, 1080),
            dpi: 96,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    EnterThread,
    Factory,
    Window,
    Place,
    Show,
    DeviceResources,
    Geometry,
    Present,
    DeviceLoss,
    EventLoop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedFrame {
    pub frame: Frame,
    /// Polylines stroked into this frame.
    pub polylines: usize,
    /// Device resource generation that produced it.
    pub generation: u64,
}

#[derive(Debug, Default)]
struct ProbeState {
    armed: Vec<Fault>,
    live_windows: usize,
    visible_windows: usize,
    resource_generations: u64,
    frames_presented: u64,
    last_frame: Option<PresentedFrame>,
}

/// Observation and fault-injection point shared by everything a
/// [`HeadlessPlatform`] creates.
#[derive(Debug, Clone, Default)]
pub struct HeadlessProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl HeadlessProbe {
    fn lock(&self) -> MutexGuard<'_, ProbeState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Arms `fault` for the next time its operation runs.
    pub fn arm(&self, fault: Fault) {
        self.lock().armed.push(fault);
    }

    pub fn live_windows(&self) -> usize {
        self.lock().live_windows
    }

    pub fn visible_windows(&self) -> usize {
        self.lock().visible_windows
    }

    pub fn resource_generations(&self) -> u64 {
        self.lock().resource_generations
    }

    pub fn frames_presented(&self) -> u64 {
        self.lock().frames_presented
    }

    pub fn last_frame(&self) -> Option<PresentedFrame> {
        self.lock().last_frame.clone()
    }

    fn trip(&self, fault: Fault) -> bool {
        let mut state = self.lock();
        match state.armed.iter().position(|armed| *armed == fault) {
            Some(index) => {
                state.armed.remove(index);
                tracing::debug!(?fault, "headless fault triggered");
                true
            }
            None => false,
        }
    }

    fn window_created(&self) {
        self.lock().live_windows += 1;
    }

    fn window_shown(&self) {
        self.lock().visible_windows += 1;
    }

    fn window_destroyed(&self, was_visible: bool) {
        let mut state = self.lock();
        state.live_windows = state.live_windows.saturating_sub(1);
        if was_visible {
            state.visible_windows = state.visible_windows.saturating_sub(1);
        }
    }

    fn resources_created(&self) -> u64 {
        let mut state = self.lock();
        state.resource_generations += 1;
        state.resource_generations
    }

    fn publish(&self, frame: PresentedFrame) {
        let mut state = self.lock();
        state.frames_presented += 1;
        state.last_frame = Some(frame);
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeadlessPlatform {
    display: HeadlessDisplay,
    probe: HeadlessProbe,
}

impl HeadlessPlatform {
    pub fn new(display: HeadlessDisplay) -> Self {
        Self {
            display,
            probe: HeadlessProbe::default(),
        }
    }

    pub fn with_probe(display: HeadlessDisplay, probe: HeadlessProbe) -> Self {
        Self { display, probe }
    }

    pub fn probe(&self) -> HeadlessProbe {
        self.probe.clone()
    }
}

impl Platform for HeadlessPlatform {
    type Window = HeadlessWindow;
    type Backend = SoftwareBackend;
    type ThreadScope = ();

    fn enter_thread(&self) -> Result<()> {
        if self.probe.trip(Fault::EnterThread) {
            return Err(OverlayError::init(InitStage::Thread, "thread setup rejected"));
        }
        Ok(())
    }

    fn create_backend(&self, stroke: StrokeSettings) -> Result<SoftwareBackend> {
        if self.probe.trip(Fault::Factory) {
            return Err(OverlayError::init(InitStage::Factory, "factory unavailable"));
        }
        Ok(SoftwareBackend {
            stroke_color: stroke.color,
            probe: self.probe.clone(),
        })
    }

    fn create_window(&self, options: &WindowOptions) -> Result<HeadlessWindow> {
        if self.probe.trip(Fault::Window) {
            return Err(OverlayError::init(InitStage::Window, "window creation refused"));
        }
        let (sender, queue) = channel();
        self.probe.window_created();
        Ok(HeadlessWindow {
            options: options.clone(),
            display: self.display,
            bounds: None,
            sender,
            queue,
            probe: self.probe.clone(),
            visible: false,
            destroyed: false,
        })
    }
}

#[derive(Debug)]
enum Envelope {
    Host(HostMessage),
    Input(RawMessage),
    DisplayChange,
}

#[derive(Debug, Clone)]
pub struct HeadlessProxy {
    sender: Sender<Envelope>,
    clickable: bool,
}

impl HeadlessProxy {
    /// Delivers input as the OS would. Click-through windows never see it.
    pub fn send_input(&self, message: RawMessage) -> Result<()> {
        if !self.clickable {
            tracing::debug!(kind = message.kind, "input passed through click-through window");
            return Ok(());
        }
        self.sender
            .send(Envelope::Input(message))
            .map_err(|_| disconnected("input"))
    }

    pub fn simulate_display_change(&self) -> Result<()> {
        self.sender
            .send(Envelope::DisplayChange)
            .map_err(|_| disconnected("display change"))
    }
}

impl WindowProxy for HeadlessProxy {
    fn post(&self, message: HostMessage) -> Result<()> {
        self.sender
            .send(Envelope::Host(message))
            .map_err(|_| disconnected("post"))
    }
}

#[derive(Debug)]
pub struct HeadlessWindow {
    options: WindowOptions,
    display: HeadlessDisplay,
    bounds: Option<ScreenRect>,
    sender: Sender<Envelope>,
    queue: Receiver<Envelope>,
    probe: HeadlessProbe,
    visible: bool,
    destroyed: bool,
}

impl HeadlessWindow {
    pub fn bounds(&self) -> Option<ScreenRect> {
        self.bounds
    }

    pub fn is_clickable(&self) -> bool {
        self.options.clickable
    }

    fn destroy(&mut self) {
        if !self.destroyed {
            self.destroyed = true;
            self.probe.window_destroyed(self.visible);
            self.visible = false;
        }
    }
}

impl NativeWindow for HeadlessWindow {
    type Proxy = HeadlessProxy;

    fn proxy(&self) -> HeadlessProxy {
        HeadlessProxy {
            sender: self.sender.clone(),
            clickable: self.options.clickable,
        }
    }

    fn place(&mut self) -> Result<()> {
        if self.probe.trip(Fault::Place) {
            return Err(OverlayError::init(InitStage::Placement, "monitor query failed"));
        }
        self.bounds = Some(overlay_bounds(self.display.virtual_screen, self.display.dpi));
        Ok(())
    }

    fn show(&mut self) -> Result<()> {
        if self.probe.trip(Fault::Show) {
            return Err(OverlayError::init(InitStage::Show, "window could not be shown"));
        }
        if !self.visible {
            self.visible = true;
            self.probe.window_shown();
        }
        Ok(())
    }

    fn client_size(&self) -> SurfaceSize {
        self.bounds.map(|bounds| bounds.size()).unwrap_or_default()
    }

    fn client_origin(&self) -> Point {
        self.bounds
            .map(|bounds| Point::new(bounds.x, bounds.y))
            .unwrap_or_default()
    }

    fn next_message(&mut self) -> Result<Option<WindowMessage>> {
        if self.destroyed {
            return Ok(None);
        }
        if self.probe.trip(Fault::EventLoop) {
            self.destroy();
            return Err(OverlayError::EventLoop("message retrieval failed".into()));
        }
        // The window holds a sender itself, so the queue never disconnects here.
        let envelope = self
            .queue
            .recv()
            .map_err(|_| OverlayError::EventLoop("message queue closed".into()))?;
        match envelope {
            Envelope::Host(HostMessage::Close) => {
                self.destroy();
                Ok(None)
            }
            Envelope::Host(HostMessage::Command { command, reply }) => {
                Ok(Some(WindowMessage::Command { command, reply }))
            }
            Envelope::Input(message) => Ok(Some(WindowMessage::Input(message))),
            Envelope::DisplayChange => {
                self.destroy();
                Err(OverlayError::DisplayChanged)
            }
        }
    }

    fn default_handling(&self, _message: RawMessage) {}
}

impl Drop for HeadlessWindow {
    fn drop(&mut self) {
        self.destroy();
    }
}

pub struct SoftwareBackend {
    stroke_color: Rgba,
    probe: HeadlessProbe,
}

impl RenderBackend for SoftwareBackend {
    type Target = HeadlessWindow;
    type Resources = SoftwareResources;

    fn create_device_resources(&self, target: &HeadlessWindow) -> Result<SoftwareResources> {
        if self.probe.trip(Fault::DeviceResources) {
            return Err(OverlayError::render("render surface creation failed"));
        }
        let size = target.client_size();
        if size.is_empty() {
            return Err(OverlayError::render("window has no client area"));
        }
        Ok(SoftwareResources {
            frame: Frame::new(size.width, size.height),
            color: self.stroke_color,
            polylines: 0,
            generation: self.probe.resources_created(),
            probe: self.probe.clone(),
        })
    }
}

pub struct SoftwareResources {
    frame: Frame,
    color: Rgba,
    polylines: usize,
    generation: u64,
    probe: HeadlessProbe,
}

impl DeviceResources for SoftwareResources {
    type Target = HeadlessWindow;

    fn begin_draw(&mut self) {
        self.polylines = 0;
    }

    fn clear(&mut self) {
        self.frame.clear();
    }

    fn stroke_polyline(&mut self, points: &[Point], width: f32) -> Result<()> {
        if self.probe.trip(Fault::Geometry) {
            return Err(OverlayError::render("path geometry could not be opened"));
        }
        let points: Vec<(f32, f32)> = points.iter().map(|p| (p.x as f32, p.y as f32)).collect();
        self.frame.stroke_polyline(&points, width, self.color);
        self.polylines += 1;
        Ok(())
    }

    fn present(&mut self, target: &HeadlessWindow) -> Result<()> {
        if self.probe.trip(Fault::Present) {
            return Err(OverlayError::composition("layered window update rejected"));
        }
        target.probe.publish(PresentedFrame {
            frame: self.frame.clone(),
            polylines: self.polylines,
            generation: self.generation,
        });
        Ok(())
    }

    fn end_draw(&mut self) -> Result<()> {
        if self.probe.trip(Fault::DeviceLoss) {
            return Err(OverlayError::DeviceLost);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::platform::message_kind::WM_LBUTTONDOWN;

    fn small_display() -> HeadlessDisplay {
        HeadlessDisplay {
            virtual_screen: ScreenRect::new(0, 0, 64, 48),
            dpi: 144,
        }
    }

    #[test]
    fn window_is_placed_for_dpi_and_tracked_by_probe() {
        let platform = HeadlessPlatform::new(small_display());
        let probe = platform.probe();
        let mut window = platform
            .create_window(&WindowOptions::default())
            .expect("window");
        assert_eq!(window.client_size(), SurfaceSize::default());

        window.place().expect("place");
        window.show().expect("show");
        assert_eq!(window.client_size(), SurfaceSize { width: 96, height: 72 });
        assert_eq!(probe.visible_windows(), 1);

        drop(window);
        assert_eq!(probe.live_windows(), 0);
        assert_eq!(probe.visible_windows(), 0);
    }

    #[test]
    fn close_ends_the_queue_and_later_posts_fail_after_drop() {
        let platform = HeadlessPlatform::new(small_display());
        let mut window = platform
            .create_window(&WindowOptions::default())
            .expect("window");
        let proxy = window.proxy();
        proxy.post(HostMessage::Close).expect("post close");
        assert!(window.next_message().expect("loop").is_none());
        assert!(window.next_message().expect("loop").is_none());

        drop(window);
        assert!(matches!(
            proxy.post(HostMessage::Close),
            Err(OverlayError::ThreadCommunication(_))
        ));
    }

    #[test]
    fn click_through_windows_do_not_receive_input() {
        let platform = HeadlessPlatform::new(small_display());
        let mut window = platform
            .create_window(&WindowOptions::default())
            .expect("window");
        let proxy = window.proxy();
        proxy
            .send_input(RawMessage::new(WM_LBUTTONDOWN, 0, 0))
            .expect("input");
        proxy.post(HostMessage::Close).expect("close");
        assert!(window.next_message().expect("loop").is_none());
    }

    #[test]
    fn armed_faults_fire_once() {
        let platform = HeadlessPlatform::new(small_display());
        let probe = platform.probe();
        probe.arm(Fault::Window);
        assert!(platform.create_window(&WindowOptions::default()).is_err());
        assert!(platform.create_window(&WindowOptions::default()).is_ok());
    }
}
