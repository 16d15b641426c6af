use crate::overlay::error::{InitStage, OverlayError, Result};
use crate::overlay::geometry::Point;
use crate::overlay::platform::{disconnected, HostMessage, WindowCommand, WindowProxy};
use crate::overlay::state::{SharedState, WindowState};
use crate::overlay::window::HostedWindow;
use std::any::Any;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

const THREAD_NAME: &str = "path-overlay";

/// Owns one overlay window and the thread its whole lifecycle runs on.
///
/// Creation blocks until the window is shown or has failed; closing blocks
/// until the thread has exited. Dropping the host closes it.
pub struct WindowHost<X: WindowProxy> {
    proxy: Option<X>,
    thread: Option<JoinHandle<Result<()>>>,
    state: SharedState,
}

impl<X: WindowProxy> WindowHost<X> {
    /// Builds the window on a fresh thread via `factory` and waits for its
    /// initialization. On failure the window has already been destroyed and
    /// the thread joined.
    pub fn spawn<W, F>(factory: F) -> Result<Self>
    where
        W: HostedWindow<Proxy = X>,
        F: FnOnce() -> W + Send + 'static,
    {
        let state = SharedState::default();
        let thread_state = state.clone();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<X>>(1);

        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                thread_state.advance(WindowState::Initializing);
                let mut window = factory();
                let proxy = window.initialize().and_then(|()| {
                    window.proxy().ok_or_else(|| {
                        OverlayError::init(InitStage::Window, "window exposes no queue")
                    })
                });
                let proxy = match proxy {
                    Ok(proxy) => proxy,
                    Err(err) => {
                        drop(window);
                        thread_state.advance(WindowState::Failed);
                        tracing::error!("overlay initialization failed: {err}");
                        let _ = ready_tx.send(Err(err.clone()));
                        return Err(err);
                    }
                };

                thread_state.advance(WindowState::Ready);
                if ready_tx.send(Ok(proxy)).is_err() {
                    tracing::debug!("overlay creator stopped waiting before the window was ready");
                }
                let result = window.run_event_loop();
                thread_state.advance(WindowState::Closing);
                drop(window);
                thread_state.advance(WindowState::Closed);
                result
            })
            .map_err(|err| OverlayError::init(InitStage::Thread, err.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(proxy)) => {
                tracing::debug!("overlay thread running");
                Ok(Self {
                    proxy: Some(proxy),
                    thread: Some(thread),
                    state,
                })
            }
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(err)
            }
            // The thread died before it could report.
            Err(_) => Err(match thread.join() {
                Ok(Err(err)) => err,
                Ok(Ok(())) => disconnected("initialization"),
                Err(payload) => panicked(payload),
            }),
        }
    }

    pub fn state(&self) -> WindowState {
        self.state.get()
    }

    pub fn is_running(&self) -> bool {
        self.proxy.is_some()
    }

    /// Handle to the window's queue until the host is closed.
    pub fn proxy(&self) -> Option<&X> {
        self.proxy.as_ref()
    }

    pub fn add_point(&self, point: Point, start_new_segment: bool, render: bool) -> Result<()> {
        self.request(WindowCommand::AddPoint {
            point,
            render,
            start_new_segment,
        })
    }

    pub fn add_points(&self, points: &[Point], start_new_segment: bool) -> Result<()> {
        if points.is_empty() {
            return Err(OverlayError::InvalidArgument("point list is empty"));
        }
        self.request(WindowCommand::AddPoints {
            points: points.to_vec(),
            start_new_segment,
        })
    }

    pub fn clear_points(&self) -> Result<()> {
        self.request(WindowCommand::ClearPoints)
    }

    pub fn render(&self) -> Result<()> {
        self.request(WindowCommand::Render)
    }

    /// Posts the close signal and waits for the window thread, returning the
    /// status it finished with. A close signal that cannot be delivered is
    /// reported without waiting, and the thread's own status is then returned
    /// by the next call. After that, [`OverlayError::NotRunning`].
    pub fn close(&mut self) -> Result<()> {
        self.ensure_foreign_thread()?;
        let Some(proxy) = self.proxy.take() else {
            // A status not yet collected is handed back once.
            self.join()?;
            return Err(OverlayError::NotRunning);
        };
        self.state.advance(WindowState::Closing);
        if let Err(err) = proxy.post(HostMessage::Close) {
            tracing::warn!("overlay close signal not delivered: {err}");
            return Err(err);
        }
        self.join()
    }

    fn request(&self, command: WindowCommand) -> Result<()> {
        self.ensure_foreign_thread()?;
        let proxy = self.proxy.as_ref().ok_or(OverlayError::NotRunning)?;
        let (reply, response) = mpsc::sync_channel(1);
        proxy.post(HostMessage::Command { command, reply })?;
        response
            .recv()
            .map_err(|_| disconnected("waiting for the overlay reply"))?
    }

    fn join(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        match thread.join() {
            Ok(result) => result,
            Err(payload) => Err(panicked(payload)),
        }
    }

    /// Blocking on the window's own thread would never return.
    fn ensure_foreign_thread(&self) -> Result<()> {
        match &self.thread {
            Some(thread) if thread.thread().id() == thread::current().id() => Err(
                OverlayError::ThreadCommunication("called from the overlay thread".into()),
            ),
            _ => Ok(()),
        }
    }
}

impl<X: WindowProxy> Drop for WindowHost<X> {
    fn drop(&mut self) {
        match self.close() {
            Ok(()) | Err(OverlayError::NotRunning) => {}
            Err(err) => tracing::debug!("overlay closed with error during drop: {err}"),
        }
        if self.ensure_foreign_thread().is_ok() {
            let _ = self.join();
        }
    }
}

fn panicked(payload: Box<dyn Any + Send>) -> OverlayError {
    let panic_message = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!(panic_message, "overlay thread panicked");
    OverlayError::ThreadPanicked(panic_message)
}

#[cfg(test)]
mod tests {
    use super::WindowHost;
    use crate::overlay::compositor::StrokeSettings;
    use crate::overlay::error::OverlayError;
    use crate::overlay::geometry::Point;
    use crate::overlay::placement::ScreenRect;
    use crate::overlay::platform::headless::{
        Fault, HeadlessDisplay, HeadlessPlatform, HeadlessProbe, HeadlessProxy,
    };
    use crate::overlay::platform::WindowOptions;
    use crate::overlay::state::WindowState;
    use crate::overlay::window::PathWindow;

    fn spawn(probe: &HeadlessProbe) -> Result<WindowHost<HeadlessProxy>, OverlayError> {
        let platform = HeadlessPlatform::with_probe(
            HeadlessDisplay {
                virtual_screen: ScreenRect::new(0, 0, 32, 32),
                dpi: 96,
            },
            probe.clone(),
        );
        WindowHost::spawn(move || {
            PathWindow::new(platform, WindowOptions::default(), StrokeSettings::default())
        })
    }

    #[test]
    fn spawn_waits_for_ready_and_close_joins() {
        let probe = HeadlessProbe::default();
        let mut host = spawn(&probe).expect("spawn");
        assert_eq!(host.state(), WindowState::Ready);
        assert_eq!(probe.visible_windows(), 1);

        host.close().expect("close");
        assert_eq!(host.state(), WindowState::Closed);
        assert_eq!(probe.live_windows(), 0);
    }

    #[test]
    fn second_close_reports_not_running() {
        let probe = HeadlessProbe::default();
        let mut host = spawn(&probe).expect("spawn");
        host.close().expect("close");
        assert_eq!(host.close(), Err(OverlayError::NotRunning));
        assert_eq!(host.render(), Err(OverlayError::NotRunning));
    }

    #[test]
    fn failed_initialization_is_reported_to_the_creator() {
        let probe = HeadlessProbe::default();
        probe.arm(Fault::Factory);
        let err = spawn(&probe).err().expect("factory failure");
        assert!(matches!(err, OverlayError::Initialization { .. }));
        assert_eq!(probe.live_windows(), 0);
    }

    #[test]
    fn commands_run_on_the_window_thread() {
        let probe = HeadlessProbe::default();
        let host = spawn(&probe).expect("spawn");
        host.add_point(Point::new(1, 1), true, false).expect("first point");
        host.add_point(Point::new(20, 1), false, true).expect("second point");
        let frame = probe.last_frame().expect("frame");
        assert_eq!(frame.polylines, 1);
        assert_eq!(frame.frame.alpha(10, 1), 179);
        drop(host);
        assert_eq!(probe.live_windows(), 0);
    }

    #[test]
    fn thread_panic_surfaces_on_spawn() {
        let result: Result<WindowHost<HeadlessProxy>, OverlayError> =
            WindowHost::spawn(|| -> PathWindow<HeadlessPlatform> { panic!("factory exploded") });
        assert_eq!(
            result.err(),
            Some(OverlayError::ThreadPanicked("factory exploded".into()))
        );
    }
}
