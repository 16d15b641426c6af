//! Interactive overlay: the user draws a path with the mouse and hands it
//! back to the automation host on Escape.

use crate::overlay::compositor::StrokeSettings;
use crate::overlay::error::Result;
use crate::overlay::geometry::{MouseMovement, Point};
use crate::overlay::platform::message_kind::{
    MK_LBUTTON, MK_SHIFT, VK_ESCAPE, WM_KEYUP, WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MOUSEMOVE,
    WM_RBUTTONDOWN,
};
use crate::overlay::platform::{DefaultPlatform, NativeWindow, Platform, RawMessage, WindowOptions};
use crate::overlay::window::{HostedWindow, PathWindow};

/// Receives the recorded path once, when the user finishes drawing.
pub type ClosingCallback = Box<dyn FnOnce(&[MouseMovement]) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeAction {
    AddPoint { point: Point, starts_stroke: bool },
    Clear,
    Finish,
}

/// Turns raw mouse and keyboard input into stroke edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrokeRecorder {
    next_starts_stroke: bool,
    movements: Vec<MouseMovement>,
    /// Screen position of the client area input is reported in.
    origin: Point,
}

impl Default for StrokeRecorder {
    fn default() -> Self {
        Self {
            next_starts_stroke: true,
            movements: Vec::new(),
            origin: Point::default(),
        }
    }
}

impl StrokeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_movements(movements: &[MouseMovement]) -> Self {
        Self {
            movements: movements.to_vec(),
            ..Self::default()
        }
    }

    /// Recorded points are reported in screen coordinates from here on.
    pub fn set_origin(&mut self, origin: Point) {
        self.origin = origin;
    }

    pub fn movements(&self) -> &[MouseMovement] {
        &self.movements
    }

    pub fn interpret(&mut self, message: RawMessage) -> Option<StrokeAction> {
        match message.kind {
            WM_LBUTTONDOWN => {
                let starts_stroke = message.wparam & MK_SHIFT == 0;
                Some(self.record(message.point(), starts_stroke))
            }
            WM_MOUSEMOVE => {
                if message.wparam & MK_LBUTTON == 0 || message.wparam & MK_SHIFT != 0 {
                    return None;
                }
                Some(self.record(message.point(), self.next_starts_stroke))
            }
            WM_LBUTTONUP => {
                self.next_starts_stroke = true;
                None
            }
            WM_RBUTTONDOWN => {
                self.movements.clear();
                self.next_starts_stroke = true;
                Some(StrokeAction::Clear)
            }
            WM_KEYUP if message.wparam == VK_ESCAPE => Some(StrokeAction::Finish),
            _ => None,
        }
    }

    fn record(&mut self, client_point: Point, starts_stroke: bool) -> StrokeAction {
        let point = client_point.offset_by(self.origin);
        // Real delays are filled in by the host from its own cursor speed.
        let delay_ns = if starts_stroke { 0 } else { 1 };
        self.movements.push(MouseMovement::new(point, delay_ns));
        self.next_starts_stroke = false;
        StrokeAction::AddPoint {
            point,
            starts_stroke,
        }
    }
}

pub struct DrawablePathWindow<P: Platform = DefaultPlatform> {
    window: PathWindow<P>,
    recorder: StrokeRecorder,
    on_closing: Option<ClosingCallback>,
}

impl<P: Platform> DrawablePathWindow<P> {
    /// Seeds the window with `movements`, opening a segment at every
    /// movement with a zero delay. Nothing is rendered until input arrives.
    pub fn new(
        platform: P,
        title: impl Into<String>,
        stroke: StrokeSettings,
        movements: &[MouseMovement],
        on_closing: ClosingCallback,
    ) -> Self {
        let options = WindowOptions {
            title: title.into(),
            clickable: true,
        };
        let mut window = PathWindow::new(platform, options, stroke);
        for movement in movements {
            // Cannot fail: rendering is not requested.
            let _ = window.add_point(movement.position, movement.starts_stroke(), false);
        }
        Self {
            window,
            recorder: StrokeRecorder::with_movements(movements),
            on_closing: Some(on_closing),
        }
    }

    pub fn window(&self) -> &PathWindow<P> {
        &self.window
    }

    pub fn movements(&self) -> &[MouseMovement] {
        self.recorder.movements()
    }
}

fn apply_action<P: Platform>(
    window: &mut PathWindow<P>,
    recorder: &StrokeRecorder,
    on_closing: &mut Option<ClosingCallback>,
    action: StrokeAction,
) {
    let outcome = match action {
        StrokeAction::AddPoint {
            point,
            starts_stroke,
        } => window.add_point(point, starts_stroke, !starts_stroke),
        StrokeAction::Clear => window.clear_points(),
        StrokeAction::Finish => {
            let Some(callback) = on_closing.take() else {
                return;
            };
            tracing::debug!(
                movements = recorder.movements().len(),
                "drawn path handed back"
            );
            callback(recorder.movements());
            window.close()
        }
    };
    if let Err(err) = outcome {
        tracing::warn!(?action, "drawable overlay input failed: {err}");
    }
}

impl<P: Platform> HostedWindow for DrawablePathWindow<P> {
    type Proxy = <P::Window as NativeWindow>::Proxy;

    fn initialize(&mut self) -> Result<()> {
        self.window.initialize()?;
        if let Some(native) = self.window.native() {
            self.recorder.set_origin(native.client_origin());
        }
        Ok(())
    }

    fn run_event_loop(&mut self) -> Result<()> {
        let Self {
            window,
            recorder,
            on_closing,
        } = self;
        window.pump(|window, message| {
            if let Some(action) = recorder.interpret(message) {
                apply_action(window, recorder, on_closing, action);
            }
        })
    }

    fn proxy(&self) -> Option<Self::Proxy> {
        self.window.proxy()
    }
}
