use crate::overlay::compositor::{Compositor, StrokeSettings};
use crate::overlay::error::{InitStage, OverlayError, Result};
use crate::overlay::geometry::{PathSet, Point};
use crate::overlay::platform::{
    send_reply, DefaultPlatform, NativeWindow, Platform, RawMessage, WindowCommand, WindowMessage,
    WindowOptions, WindowProxy,
};

/// A window whose whole lifecycle runs on a [`WindowHost`](crate::overlay::host::WindowHost)
/// thread.
pub trait HostedWindow {
    type Proxy: WindowProxy;

    /// Creates the factory objects, the native window, places it and shows it.
    /// Stops at the first failing step; whatever that call allocated is
    /// released before returning.
    fn initialize(&mut self) -> Result<()>;

    /// Blocks until the window processes its close signal.
    fn run_event_loop(&mut self) -> Result<()>;

    /// Cross-thread handle, available between a successful `initialize` and
    /// the end of the event loop.
    fn proxy(&self) -> Option<Self::Proxy>;
}

pub type InputHandler<P> = Box<dyn FnMut(&mut PathWindow<P>, RawMessage)>;

/// Click-through overlay tracing the points it is given.
pub struct PathWindow<P: Platform = DefaultPlatform> {
    compositor: Option<Compositor<P::Backend>>,
    native: Option<P::Window>,
    input_handler: Option<InputHandler<P>>,
    paths: PathSet,
    platform: P,
    options: WindowOptions,
    stroke: StrokeSettings,
    // Dropped last: per-thread setup outlives every object created under it.
    thread_scope: Option<P::ThreadScope>,
}

impl<P: Platform> PathWindow<P> {
    pub fn new(platform: P, options: WindowOptions, stroke: StrokeSettings) -> Self {
        Self {
            compositor: None,
            native: None,
            input_handler: None,
            paths: PathSet::new(),
            platform,
            options,
            stroke,
            thread_scope: None,
        }
    }

    /// Routes every input message the core does not interpret to `handler`
    /// before the platform's default handling.
    pub fn set_input_handler(
        &mut self,
        handler: impl FnMut(&mut PathWindow<P>, RawMessage) + 'static,
    ) {
        self.input_handler = Some(Box::new(handler));
    }

    pub fn options(&self) -> &WindowOptions {
        &self.options
    }

    pub fn stroke(&self) -> StrokeSettings {
        self.stroke
    }

    pub fn paths(&self) -> &PathSet {
        &self.paths
    }

    pub fn is_open(&self) -> bool {
        self.native.is_some()
    }

    pub fn has_device_resources(&self) -> bool {
        self.compositor
            .as_ref()
            .is_some_and(Compositor::has_device_resources)
    }

    pub fn native(&self) -> Option<&P::Window> {
        self.native.as_ref()
    }

    pub fn add_point(&mut self, point: Point, start_new_segment: bool, render: bool) -> Result<()> {
        self.paths.push_point(point, start_new_segment);
        if render {
            self.render()
        } else {
            Ok(())
        }
    }

    /// Appends every point to one segment, then renders. An empty slice is
    /// rejected before anything changes.
    pub fn add_points(&mut self, points: &[Point], start_new_segment: bool) -> Result<()> {
        if points.is_empty() {
            return Err(OverlayError::InvalidArgument("point list is empty"));
        }
        self.paths.extend_points(points, start_new_segment);
        self.render()
    }

    pub fn clear_points(&mut self) -> Result<()> {
        self.paths.clear();
        self.render()
    }

    pub fn render(&mut self) -> Result<()> {
        let (Some(compositor), Some(native)) = (self.compositor.as_mut(), self.native.as_ref())
        else {
            return Err(OverlayError::NotRunning);
        };
        compositor.render(native, &self.paths, native.client_origin())
    }

    /// Posts a close signal into this window's own queue without waiting.
    pub fn close(&self) -> Result<()> {
        self.native
            .as_ref()
            .ok_or(OverlayError::NotRunning)?
            .request_close()
    }

    pub fn apply(&mut self, command: WindowCommand) -> Result<()> {
        match command {
            WindowCommand::AddPoint {
                point,
                render,
                start_new_segment,
            } => self.add_point(point, start_new_segment, render),
            WindowCommand::AddPoints {
                points,
                start_new_segment,
            } => self.add_points(&points, start_new_segment),
            WindowCommand::ClearPoints => self.clear_points(),
            WindowCommand::Render => self.render(),
        }
    }

    /// Services the queue until the close signal is processed, handing input
    /// to `on_input`. Device resources and the native window are released on
    /// the way out whatever the exit status.
    pub(crate) fn pump(&mut self, mut on_input: impl FnMut(&mut Self, RawMessage)) -> Result<()> {
        let result = loop {
            let Some(native) = self.native.as_mut() else {
                break Err(OverlayError::NotRunning);
            };
            match native.next_message() {
                Ok(None) => break Ok(()),
                Ok(Some(WindowMessage::Command { command, reply })) => {
                    let outcome = self.apply(command);
                    send_reply(reply, outcome);
                }
                Ok(Some(WindowMessage::Input(message))) => {
                    on_input(self, message);
                    if let Some(native) = self.native.as_ref() {
                        native.default_handling(message);
                    }
                }
                Err(err) => break Err(err),
            }
        };

        if let Some(compositor) = self.compositor.as_mut() {
            compositor.discard_device_resources();
        }
        self.compositor = None;
        self.native = None;
        match &result {
            Ok(()) => tracing::debug!(title = %self.options.title, "overlay event loop finished"),
            Err(err) => {
                tracing::warn!(title = %self.options.title, "overlay event loop failed: {err}")
            }
        }
        result
    }
}

impl<P: Platform> HostedWindow for PathWindow<P> {
    type Proxy = <P::Window as NativeWindow>::Proxy;

    fn initialize(&mut self) -> Result<()> {
        if self.native.is_some() {
            return Err(OverlayError::init(
                InitStage::Window,
                "window is already initialized",
            ));
        }
        let scope = self.platform.enter_thread()?;
        let backend = self.platform.create_backend(self.stroke)?;
        let mut native = self.platform.create_window(&self.options)?;
        native.place()?;
        native.show()?;
        tracing::debug!(
            title = %self.options.title,
            clickable = self.options.clickable,
            size = ?native.client_size(),
            "overlay window shown"
        );

        self.compositor = Some(Compositor::new(backend, self.stroke));
        self.native = Some(native);
        self.thread_scope = Some(scope);
        Ok(())
    }

    fn run_event_loop(&mut self) -> Result<()> {
        let mut handler = self.input_handler.take();
        let result = self.pump(|window, message| {
            if let Some(handler) = handler.as_mut() {
                handler(window, message);
            }
        });
        self.input_handler = handler;
        result
    }

    fn proxy(&self) -> Option<Self::Proxy> {
        self.native.as_ref().map(NativeWindow::proxy)
    }
}
