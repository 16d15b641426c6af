use path_overlay::overlay::placement::ScreenRect;
use path_overlay::overlay::platform::headless::{
    Fault, HeadlessDisplay, HeadlessPlatform, HeadlessProbe,
};
use path_overlay::overlay::ProxyOf;
use path_overlay::{
    spawn_path_overlay, OverlayError, OverlaySettings, Point, WindowHost, WindowState,
};
use std::thread::sleep;
use std::time::{Duration, Instant};

type HeadlessHost = WindowHost<ProxyOf<HeadlessPlatform>>;

fn platform(probe: &HeadlessProbe) -> HeadlessPlatform {
    HeadlessPlatform::with_probe(
        HeadlessDisplay {
            virtual_screen: ScreenRect::new(0, 0, 40, 30),
            dpi: 96,
        },
        probe.clone(),
    )
}

fn spawn(probe: &HeadlessProbe, points: &[Point]) -> Result<HeadlessHost, OverlayError> {
    spawn_path_overlay(platform(probe), &OverlaySettings::default(), points)
}

fn wait_for_state(host: &HeadlessHost, state: WindowState) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while host.state() != state {
        assert!(Instant::now() < deadline, "overlay never reached {state:?}");
        sleep(Duration::from_millis(10));
    }
}

#[test]
fn traces_segments_clears_and_closes() {
    let probe = HeadlessProbe::default();
    let initial = [Point::new(0, 0), Point::new(10, 0), Point::new(10, 10)];
    let mut host = spawn(&probe, &initial).expect("spawn overlay");
    assert_eq!(host.state(), WindowState::Ready);
    assert_eq!(probe.visible_windows(), 1);

    let frame = probe.last_frame().expect("initial frame");
    assert_eq!(frame.polylines, 1);
    assert_eq!(frame.frame.width(), 40);
    assert_eq!(frame.frame.height(), 30);
    assert_eq!(frame.frame.alpha(5, 0), 179);
    assert_eq!(frame.frame.alpha(10, 5), 179);
    assert_eq!(frame.frame.alpha(5, 5), 0);

    host
        .add_point(Point::new(20, 20), true, false)
        .expect("start second segment");
    host
        .add_point(Point::new(30, 20), false, true)
        .expect("extend second segment");
    let frame = probe.last_frame().expect("two segment frame");
    assert_eq!(frame.polylines, 2);
    assert_eq!(frame.frame.alpha(25, 20), 179);
    // The segments are not joined.
    assert_eq!(frame.frame.alpha(15, 15), 0);

    host.clear_points().expect("clear");
    let frame = probe.last_frame().expect("cleared frame");
    assert_eq!(frame.polylines, 0);
    assert!(frame.frame.is_blank());

    host.close().expect("close");
    assert_eq!(host.state(), WindowState::Closed);
    assert_eq!(probe.live_windows(), 0);
    assert_eq!(probe.visible_windows(), 0);
}

#[test]
fn add_point_without_render_presents_nothing() {
    let probe = HeadlessProbe::default();
    let host = spawn(&probe, &[]).expect("spawn overlay");
    host.add_point(Point::new(1, 1), true, false).expect("first");
    host.add_point(Point::new(9, 1), false, false).expect("second");
    assert_eq!(probe.frames_presented(), 0);

    host.render().expect("render");
    assert_eq!(probe.frames_presented(), 1);
    assert_eq!(probe.last_frame().expect("frame").frame.alpha(5, 1), 179);
}

#[test]
fn empty_point_list_is_rejected_without_side_effects() {
    let probe = HeadlessProbe::default();
    let host = spawn(&probe, &[Point::new(0, 0), Point::new(5, 5)]).expect("spawn overlay");
    let presented = probe.frames_presented();

    assert!(matches!(
        host.add_points(&[], true),
        Err(OverlayError::InvalidArgument(_))
    ));
    assert_eq!(probe.frames_presented(), presented);
    assert!(host.is_running());
}

#[test]
fn lost_device_is_rebuilt_on_the_next_render() {
    let probe = HeadlessProbe::default();
    let host = spawn(&probe, &[Point::new(0, 0), Point::new(8, 0)]).expect("spawn overlay");
    assert_eq!(probe.resource_generations(), 1);

    probe.arm(Fault::DeviceLoss);
    host.render().expect("device loss is not an error");
    assert_eq!(probe.resource_generations(), 1);

    host.render().expect("render after loss");
    assert_eq!(probe.resource_generations(), 2);
    host.render().expect("render with rebuilt resources");
    assert_eq!(probe.resource_generations(), 2);
    assert_eq!(probe.last_frame().expect("frame").generation, 2);
}

#[test]
fn failed_geometry_keeps_the_previous_frame() {
    let probe = HeadlessProbe::default();
    let host = spawn(&probe, &[Point::new(0, 0), Point::new(8, 0)]).expect("spawn overlay");
    let before = probe.last_frame().expect("frame");

    probe.arm(Fault::Geometry);
    assert!(matches!(
        host.add_point(Point::new(8, 8), false, true),
        Err(OverlayError::Render { .. })
    ));
    assert_eq!(probe.last_frame(), Some(before));
}

#[test]
fn failed_composition_is_reported_and_resources_survive() {
    let probe = HeadlessProbe::default();
    let host = spawn(&probe, &[Point::new(0, 0), Point::new(8, 0)]).expect("spawn overlay");

    probe.arm(Fault::Present);
    assert!(matches!(host.render(), Err(OverlayError::Composition { .. })));
    host.render().expect("render after failed composition");
    assert_eq!(probe.resource_generations(), 1);
}

#[test]
fn every_initialization_failure_leaves_no_window() {
    for fault in [
        Fault::EnterThread,
        Fault::Factory,
        Fault::Window,
        Fault::Place,
        Fault::Show,
    ] {
        let probe = HeadlessProbe::default();
        probe.arm(fault);
        let err = spawn(&probe, &[]).err().expect("initialization should fail");
        assert!(
            matches!(err, OverlayError::Initialization { .. }),
            "{fault:?} gave {err:?}"
        );
        assert_eq!(probe.live_windows(), 0, "{fault:?}");
        assert_eq!(probe.visible_windows(), 0, "{fault:?}");
    }
}

#[test]
fn failed_initial_trace_closes_the_new_window() {
    let probe = HeadlessProbe::default();
    probe.arm(Fault::DeviceResources);
    let err = spawn(&probe, &[Point::new(0, 0), Point::new(4, 4)])
        .err()
        .expect("initial trace should fail");
    assert!(matches!(err, OverlayError::Render { .. }));
    assert_eq!(probe.live_windows(), 0);
}

#[test]
fn second_close_reports_not_running() {
    let probe = HeadlessProbe::default();
    let mut host = spawn(&probe, &[]).expect("spawn overlay");
    host.close().expect("close");
    assert_eq!(host.close(), Err(OverlayError::NotRunning));
    assert_eq!(host.clear_points(), Err(OverlayError::NotRunning));
}

#[test]
fn display_change_ends_the_loop_and_is_reported_on_close() {
    let probe = HeadlessProbe::default();
    let mut host = spawn(&probe, &[]).expect("spawn overlay");
    host.proxy()
        .expect("running overlay")
        .simulate_display_change()
        .expect("deliver display change");
    wait_for_state(&host, WindowState::Closed);
    assert_eq!(probe.live_windows(), 0);

    assert!(matches!(
        host.close(),
        Err(OverlayError::ThreadCommunication(_))
    ));
    assert_eq!(host.close(), Err(OverlayError::DisplayChanged));
    assert_eq!(host.close(), Err(OverlayError::NotRunning));
}

#[test]
fn event_loop_failure_is_the_thread_status() {
    let probe = HeadlessProbe::default();
    let mut host = spawn(&probe, &[]).expect("spawn overlay");
    probe.arm(Fault::EventLoop);
    // Whether this request is served depends on where the loop was parked.
    let _ = host.render();
    wait_for_state(&host, WindowState::Closed);
    assert!(host.close().is_err());
    assert!(matches!(host.close(), Err(OverlayError::EventLoop(_))));
}

#[test]
fn dropping_the_host_closes_the_window() {
    let probe = HeadlessProbe::default();
    let host = spawn(&probe, &[Point::new(0, 0), Point::new(3, 3)]).expect("spawn overlay");
    assert_eq!(probe.live_windows(), 1);
    drop(host);
    assert_eq!(probe.live_windows(), 0);
}

#[test]
fn click_through_overlay_ignores_input() {
    use path_overlay::overlay::platform::message_kind::{MK_LBUTTON, WM_LBUTTONDOWN};
    use path_overlay::overlay::platform::RawMessage;

    let probe = HeadlessProbe::default();
    let host = spawn(&probe, &[]).expect("spawn overlay");
    host.proxy()
        .expect("running overlay")
        .send_input(RawMessage::mouse(WM_LBUTTONDOWN, MK_LBUTTON, Point::new(4, 4)))
        .expect("input");
    host.render().expect("render");
    let frame = probe.last_frame().expect("frame");
    assert!(frame.frame.is_blank());
}

#[test]
fn coordinates_at_the_integer_limits_keep_the_overlay_alive() {
    let probe = HeadlessProbe::default();
    let mut host = spawn(&probe, &[]).expect("spawn overlay");
    let far = [Point::new(0, 5), Point::new(i32::MAX, 5)];
    host.add_points(&far, true).expect("far point");
    let corners = [Point::new(i32::MIN, i32::MIN), Point::new(i32::MAX, i32::MAX)];
    host.add_points(&corners, true).expect("extreme segment");

    let frame = probe.last_frame().expect("frame");
    assert_eq!(frame.polylines, 2);
    assert_eq!(frame.frame.alpha(39, 5), 179);
    assert!(host.is_running());
    host.close().expect("close");
}

#[test]
fn paths_use_screen_coordinates_when_the_virtual_screen_starts_left_of_zero() {
    let probe = HeadlessProbe::default();
    let platform = HeadlessPlatform::with_probe(
        HeadlessDisplay {
            virtual_screen: ScreenRect::new(-20, -10, 40, 30),
            dpi: 96,
        },
        probe.clone(),
    );
    let initial = [Point::new(-20, 0), Point::new(-10, 0)];
    let host = spawn_path_overlay(platform, &OverlaySettings::default(), &initial)
        .expect("spawn overlay");

    let frame = probe.last_frame().expect("frame");
    assert_eq!(frame.frame.alpha(5, 10), 179);
    assert_eq!(frame.frame.alpha(5, 0), 0);
    drop(host);
}
