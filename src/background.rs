//! Animated topographic backdrop drawn behind every page.
//!
//! The geometry of each frame is a pure function of the surface size and a
//! frame counter ([`compose_frame`]); [`TopographicBackground`] only drives
//! the counter from the platform's frame loop and hands frames to a
//! [`Backdrop`].

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use glam::Vec2;
use log::{debug, info};

use crate::platform::Platform;

/// Vertical gradient stop as `(offset, css colour)`.
pub type GradientStop = (f32, &'static str);

pub const GRADIENT: [GradientStop; 3] = [(0.0, "#0f172a"), (0.5, "#1a2847"), (1.0, "#1e293b")];

const FREQUENCY: f32 = 0.005;
const AMPLITUDE: f32 = 30.0;
const PHASE_SPEED: f32 = 0.0003;
const DRIFT_SPEED: f32 = 0.0002;
const ROW_PHASE: f32 = 0.01;

/// Parameters of one family of contour lines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFamily {
    /// Vertical distance between line origins.
    pub spacing: f32,
    /// Horizontal distance between samples.
    pub step: f32,
    pub amplitude: f32,
    pub drift_amplitude: f32,
    pub stroke: &'static str,
    pub width: f32,
}

pub static MINOR_LINES: LineFamily = LineFamily {
    spacing: 50.0,
    step: 5.0,
    amplitude: AMPLITUDE,
    drift_amplitude: AMPLITUDE * 0.3,
    stroke: "rgba(59, 130, 246, 0.15)",
    width: 1.0,
};

pub static MAJOR_LINES: LineFamily = LineFamily {
    spacing: 150.0,
    step: 8.0,
    amplitude: AMPLITUDE * 1.2,
    drift_amplitude: AMPLITUDE * 0.5,
    stroke: "rgba(59, 130, 246, 0.25)",
    width: 1.5,
};

impl LineFamily {
    /// Height of the line that starts at `origin` at horizontal position `x`.
    pub fn sample(&self, origin: f32, x: f32, time: u64) -> f32 {
        let t = time as f32;
        let wave = (x * FREQUENCY + t * PHASE_SPEED + origin * ROW_PHASE).sin() * self.amplitude;
        let drift = (x * FREQUENCY * 0.5 - t * DRIFT_SPEED).cos() * self.drift_amplitude;
        origin + wave + drift
    }

    /// One polyline per origin `0, spacing, 2·spacing, … < height`, sampled
    /// from `x = 0` to `x <= width`.
    pub fn lines(&'static self, width: u32, height: u32, time: u64) -> Vec<ContourLine> {
        let (width, height) = (width as f32, height as f32);
        let mut lines = Vec::new();
        let mut origin = 0.0;
        while origin < height {
            let mut points = Vec::new();
            let mut x = 0.0;
            while x <= width {
                points.push(Vec2::new(x, self.sample(origin, x, time)));
                x += self.step;
            }
            lines.push(ContourLine {
                family: self,
                points,
            });
            origin += self.spacing;
        }
        lines
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContourLine {
    pub family: &'static LineFamily,
    pub points: Vec<Vec2>,
}

/// Everything needed to paint one frame: gradient first, then minor lines,
/// then major lines.
#[derive(Debug, Clone, PartialEq)]
pub struct BackdropFrame {
    pub width: u32,
    pub height: u32,
    pub time: u64,
    pub gradient: &'static [GradientStop],
    pub lines: Vec<ContourLine>,
}

impl BackdropFrame {
    pub fn count(&self, family: &LineFamily) -> usize {
        self.lines
            .iter()
            .filter(|line| line.family == family)
            .count()
    }
}

pub fn compose_frame(width: u32, height: u32, time: u64) -> BackdropFrame {
    let mut lines = MINOR_LINES.lines(width, height, time);
    lines.extend(MAJOR_LINES.lines(width, height, time));
    BackdropFrame {
        width,
        height,
        time,
        gradient: &GRADIENT,
        lines,
    }
}

/// Full-viewport drawing target for the background.
pub trait Backdrop {
    fn resize(&mut self, width: u32, height: u32);
    fn paint(&mut self, frame: &BackdropFrame);
}

struct BackgroundState<P: Platform, B: Backdrop> {
    backdrop: B,
    size: (u32, u32),
    time: u64,
    running: bool,
    listener: Option<P::Listener>,
    frame: Option<P::FrameRequest>,
    // the request whose callback may currently be executing
    retired_frame: Option<P::FrameRequest>,
}

impl<P: Platform, B: Backdrop> BackgroundState<P, B> {
    fn paint(&mut self) {
        let frame = compose_frame(self.size.0, self.size.1, self.time);
        self.backdrop.paint(&frame);
    }

    fn advance(&mut self) {
        self.paint();
        self.time += 1;
    }
}

/// Running background animation. Stopping is final.
pub struct TopographicBackground<P: Platform, B: Backdrop> {
    state: Option<Rc<RefCell<BackgroundState<P, B>>>>,
}

impl<P: Platform, B: Backdrop + 'static> TopographicBackground<P, B> {
    /// Starts animating `backdrop`. Without a backdrop nothing happens.
    pub fn start(platform: &Rc<P>, backdrop: Option<B>) -> Self {
        let Some(mut backdrop) = backdrop else {
            debug!("no backdrop surface; background disabled");
            return Self { state: None };
        };

        let size = platform.viewport_size();
        backdrop.resize(size.0, size.1);
        let state = Rc::new(RefCell::new(BackgroundState {
            backdrop,
            size,
            time: 0,
            running: true,
            listener: None,
            frame: None,
            retired_frame: None,
        }));

        let weak_state = Rc::downgrade(&state);
        let weak_platform = Rc::downgrade(platform);
        let listener = platform.listen_resize(Box::new(move || {
            let (Some(state), Some(platform)) = (weak_state.upgrade(), weak_platform.upgrade())
            else {
                return;
            };
            let mut state = state.borrow_mut();
            if !state.running {
                return;
            }
            let size = platform.viewport_size();
            state.size = size;
            state.backdrop.resize(size.0, size.1);
            state.paint();
        }));

        {
            let mut state = state.borrow_mut();
            state.listener = Some(listener);
            state.advance();
        }
        schedule_frame(Rc::downgrade(&state), Rc::downgrade(platform));
        info!("background started at {}x{}", size.0, size.1);
        Self { state: Some(state) }
    }

    pub fn is_running(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(|state| state.borrow().running)
    }

    /// Frames painted so far; zero when disabled.
    pub fn time(&self) -> u64 {
        self.state.as_ref().map_or(0, |state| state.borrow().time)
    }

    /// Cancels the pending frame and removes the resize listener.
    pub fn stop(&mut self) {
        let Some(state) = self.state.take() else {
            return;
        };
        let (listener, frame, retired) = {
            let mut state = state.borrow_mut();
            state.running = false;
            (
                state.listener.take(),
                state.frame.take(),
                state.retired_frame.take(),
            )
        };
        drop(listener);
        drop(frame);
        drop(retired);
        debug!("background stopped");
    }
}

impl<P: Platform, B: Backdrop> Drop for TopographicBackground<P, B> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            let mut state = state.borrow_mut();
            state.running = false;
            state.listener = None;
            state.frame = None;
            state.retired_frame = None;
        }
    }
}

fn schedule_frame<P: Platform, B: Backdrop + 'static>(
    state: Weak<RefCell<BackgroundState<P, B>>>,
    platform: Weak<P>,
) {
    let (Some(strong_state), Some(strong_platform)) = (state.upgrade(), platform.upgrade()) else {
        return;
    };
    if !strong_state.borrow().running {
        return;
    }

    let next_state = state.clone();
    let request = strong_platform.request_frame(Box::new(move || {
        let Some(current) = next_state.upgrade() else {
            return;
        };
        {
            let mut current = current.borrow_mut();
            if !current.running {
                return;
            }
            current.advance();
        }
        schedule_frame(next_state, platform);
    }));

    let mut strong_state = strong_state.borrow_mut();
    let previous = strong_state.frame.replace(request);
    strong_state.retired_frame = previous;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::HeadlessPlatform;

    #[derive(Default)]
    struct Recorded {
        sizes: Vec<(u32, u32)>,
        frames: Vec<(u64, usize, usize)>,
    }

    struct RecordingBackdrop(Rc<RefCell<Recorded>>);

    impl Backdrop for RecordingBackdrop {
        fn resize(&mut self, width: u32, height: u32) {
            self.0.borrow_mut().sizes.push((width, height));
        }

        fn paint(&mut self, frame: &BackdropFrame) {
            self.0.borrow_mut().frames.push((
                frame.time,
                frame.count(&MINOR_LINES),
                frame.count(&MAJOR_LINES),
            ));
        }
    }

    #[test]
    fn line_counts_follow_height() {
        let frame = compose_frame(100, 1000, 0);
        assert_eq!(frame.count(&MINOR_LINES), 20);
        assert_eq!(frame.count(&MAJOR_LINES), 7);

        let frame = compose_frame(100, 151, 0);
        assert_eq!(frame.count(&MINOR_LINES), 4);
        assert_eq!(frame.count(&MAJOR_LINES), 2);
    }

    #[test]
    fn samples_cover_the_full_width() {
        let lines = MINOR_LINES.lines(100, 50, 0);
        assert_eq!(lines.len(), 1);
        let xs: Vec<f32> = lines[0].points.iter().map(|p| p.x).collect();
        assert_eq!(xs.len(), 21);
        assert_eq!(xs.first(), Some(&0.0));
        assert_eq!(xs.last(), Some(&100.0));

        assert_eq!(MAJOR_LINES.lines(100, 50, 0)[0].points.len(), 13);
    }

    #[test]
    fn first_sample_matches_the_wave_formula() {
        // origin 0, x 0, time 0: sin(0)*a + cos(0)*drift
        assert!((MINOR_LINES.sample(0.0, 0.0, 0) - 9.0).abs() < 1e-5);
        assert!((MAJOR_LINES.sample(0.0, 0.0, 0) - 15.0).abs() < 1e-5);
        let moved = MINOR_LINES.sample(50.0, 10.0, 1000);
        let expected = 50.0 + (0.05f32 + 0.3 + 0.5).sin() * 30.0 + (0.025f32 - 0.2).cos() * 9.0;
        assert!((moved - expected).abs() < 1e-4);
    }

    #[test]
    fn animates_once_per_frame_and_stops_cleanly() {
        let platform = Rc::new(HeadlessPlatform::new(300, 200));
        let recorded = Rc::new(RefCell::new(Recorded::default()));
        let mut background =
            TopographicBackground::start(&platform, Some(RecordingBackdrop(recorded.clone())));

        assert!(background.is_running());
        assert_eq!(platform.listener_count(), 1);
        assert_eq!(background.time(), 1);
        platform.run_frames();
        platform.run_frames();
        assert_eq!(background.time(), 3);
        {
            let recorded = recorded.borrow();
            let times: Vec<u64> = recorded.frames.iter().map(|f| f.0).collect();
            assert_eq!(times, vec![0, 1, 2]);
            assert_eq!(recorded.frames[0].1, 4);
            assert_eq!(recorded.frames[0].2, 2);
        }

        background.stop();
        assert!(!background.is_running());
        assert_eq!(platform.listener_count(), 0);
        assert_eq!(platform.pending_frames(), 0);
        assert_eq!(platform.run_frames(), 0);
        background.stop();
    }

    #[test]
    fn resize_updates_surface_and_repaints() {
        let platform = Rc::new(HeadlessPlatform::new(300, 200));
        let recorded = Rc::new(RefCell::new(Recorded::default()));
        let _background =
            TopographicBackground::start(&platform, Some(RecordingBackdrop(recorded.clone())));

        platform.resize(640, 480);
        let recorded = recorded.borrow();
        assert_eq!(recorded.sizes, vec![(300, 200), (640, 480)]);
        let last = recorded.frames.last().copied().unwrap();
        assert_eq!(last, (1, 10, 4));
    }

    #[test]
    fn missing_backdrop_is_a_no_op() {
        let platform = Rc::new(HeadlessPlatform::new(300, 200));
        let background = TopographicBackground::<_, RecordingBackdrop>::start(&platform, None);
        assert!(!background.is_running());
        assert_eq!(background.time(), 0);
        assert_eq!(platform.listener_count(), 0);
        assert_eq!(platform.pending_frames(), 0);
    }
}
