//! Session loop
//!
//! Drives a frame source through one of the state machines:
//! 1. Acquire the next frame (a source error ends the session)
//! 2. Normalize it (coordinate scaling, hand limit)
//! 3. Advance the machine
//! 4. Collect any AI answer (canvas)
//! 5. Report the visible state when it changed

use crate::calculator::{CalculatorEvent, CalculatorMachine, CalculatorSnapshot};
use crate::canvas::{CanvasEvent, CanvasMachine, CanvasPhase};
use crate::config::FrameConfig;
use crate::dispatch::CanvasDispatcher;
use crate::hand::HandFrame;
use crate::source::{FrameSource, SourceError, MAX_HANDS_PER_FRAME};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Visible state after a frame that changed something
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FrameReport {
    Calculator {
        t_ms: u64,
        events: Vec<CalculatorEvent>,
        #[serde(flatten)]
        snapshot: CalculatorSnapshot,
    },
    Canvas {
        t_ms: u64,
        events: Vec<CanvasEvent>,
        phase: CanvasPhase,
        segments: usize,
        confirmed: bool,
        response: String,
    },
}

/// Counters for a finished session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub frames: usize,
    pub commits: usize,
    pub evaluations: usize,
    pub dispatches: usize,
    pub responses: usize,
}

/// Apply frame settings to a raw frame
///
/// Normalized coordinates are scaled to the configured resolution, and
/// frames keep at most two hands.
pub fn prepare_frame(mut frame: HandFrame, config: &FrameConfig) -> HandFrame {
    frame.hands.truncate(MAX_HANDS_PER_FRAME);
    if config.normalized_input {
        frame.hands = frame
            .hands
            .iter()
            .map(|hand| hand.scaled(config.width, config.height))
            .collect();
    }
    frame
}

/// Run a calculator session until the source ends
pub fn run_calculator<S, F>(
    source: &mut S,
    frame_config: &FrameConfig,
    machine: &mut CalculatorMachine,
    mut sink: F,
) -> Result<SessionSummary, SourceError>
where
    S: FrameSource + ?Sized,
    F: FnMut(&FrameReport),
{
    let mut summary = SessionSummary::default();
    let mut last_snapshot = machine.snapshot();

    while let Some(frame) = source.next_frame()? {
        let frame = prepare_frame(frame, frame_config);
        let events = machine.process_frame(&frame);
        summary.frames += 1;

        for event in &events {
            match event {
                CalculatorEvent::TokenCommitted { .. } => summary.commits += 1,
                CalculatorEvent::Evaluated { .. } => summary.evaluations += 1,
                _ => {}
            }
        }

        let snapshot = machine.snapshot();
        if !events.is_empty() || snapshot != last_snapshot {
            sink(&FrameReport::Calculator {
                t_ms: frame.timestamp_ms,
                events,
                snapshot: snapshot.clone(),
            });
            last_snapshot = snapshot;
        }
    }

    tracing::info!(
        "Calculator session finished: {} frames, {} commits, {} evaluations",
        summary.frames,
        summary.commits,
        summary.evaluations
    );
    Ok(summary)
}

/// Run a canvas session until the source ends
///
/// With `wait` set, an AI answer still outstanding at the end of the stream
/// is waited for up to that long and reported.
pub fn run_canvas<S, D, F>(
    source: &mut S,
    frame_config: &FrameConfig,
    machine: &mut CanvasMachine<D>,
    wait: Option<Duration>,
    mut sink: F,
) -> Result<SessionSummary, SourceError>
where
    S: FrameSource + ?Sized,
    D: CanvasDispatcher,
    F: FnMut(&FrameReport),
{
    let mut summary = SessionSummary::default();
    let mut last_t_ms = 0;

    while let Some(frame) = source.next_frame()? {
        let frame = prepare_frame(frame, frame_config);
        let segments_before = machine.state().segments.len();
        let phase_before = machine.phase();
        let events = machine.process_frame(&frame);
        summary.frames += 1;
        last_t_ms = frame.timestamp_ms;

        count_canvas_events(&events, &mut summary);

        let changed = !events.is_empty()
            || machine.state().segments.len() != segments_before
            || machine.phase() != phase_before;
        if changed {
            sink(&canvas_report(machine, frame.timestamp_ms, events));
        }
    }

    if let Some(timeout) = wait {
        if machine.dispatcher().is_pending() {
            tracing::info!("Waiting up to {:?} for the AI answer", timeout);
            if let Some(text) = machine.wait_for_response(timeout) {
                let events = vec![CanvasEvent::ResponseReceived { text }];
                count_canvas_events(&events, &mut summary);
                sink(&canvas_report(machine, last_t_ms, events));
            }
        }
    }

    tracing::info!(
        "Canvas session finished: {} frames, {} dispatches, {} responses",
        summary.frames,
        summary.dispatches,
        summary.responses
    );
    Ok(summary)
}

fn count_canvas_events(events: &[CanvasEvent], summary: &mut SessionSummary) {
    for event in events {
        match event {
            CanvasEvent::Dispatched => summary.dispatches += 1,
            CanvasEvent::ResponseReceived { .. } => summary.responses += 1,
            _ => {}
        }
    }
}

fn canvas_report<D: CanvasDispatcher>(
    machine: &CanvasMachine<D>,
    t_ms: u64,
    events: Vec<CanvasEvent>,
) -> FrameReport {
    FrameReport::Canvas {
        t_ms,
        events,
        phase: machine.phase(),
        segments: machine.state().segments.len(),
        confirmed: machine.state().confirmed,
        response: machine.response().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CalculatorConfig, CanvasConfig};
    use crate::dispatch::testing::ScriptedClient;
    use crate::dispatch::{AiWorker, InlineDispatcher};
    use crate::hand::{HandObservation, Landmark, Orientation, PoseVector, LANDMARK_COUNT};
    use crate::source::VecFrameSource;

    const BUTTON: (f32, f32) = (1175.0, 100.0);

    fn canvas_hand(pose: PoseVector, tip: (f32, f32)) -> HandObservation {
        HandObservation::posed_at_index_tip(pose, tip, Orientation::Right)
    }

    fn canvas_frames() -> Vec<HandFrame> {
        let mut frames = vec![
            HandFrame::new(0, vec![canvas_hand(PoseVector::INDEX, (100.0, 300.0))]),
            HandFrame::new(33, vec![canvas_hand(PoseVector::INDEX, (150.0, 320.0))]),
            HandFrame::new(66, vec![canvas_hand(PoseVector::INDEX, (200.0, 340.0))]),
        ];
        for i in 0..10 {
            frames.push(HandFrame::new(
                100 + i * 33,
                vec![canvas_hand(PoseVector::INDEX_MIDDLE, BUTTON)],
            ));
        }
        frames
    }

    #[test]
    fn test_prepare_frame_scales_normalized_input() {
        let config = FrameConfig {
            normalized_input: true,
            ..Default::default()
        };
        let hand = HandObservation::new(vec![Landmark::new(0.5, 0.5); LANDMARK_COUNT]);
        let frame = prepare_frame(HandFrame::new(0, vec![hand; 3]), &config);
        assert_eq!(frame.hands.len(), 2);
        assert_eq!(frame.hands[0].wrist(), Some((640.0, 360.0)));
    }

    #[test]
    fn test_prepare_frame_leaves_pixels_alone() {
        let hand = HandObservation::new(vec![Landmark::new(12.0, 34.0); LANDMARK_COUNT]);
        let frame = prepare_frame(HandFrame::new(0, vec![hand]), &FrameConfig::default());
        assert_eq!(frame.hands[0].wrist(), Some((12.0, 34.0)));
    }

    #[test]
    fn test_calculator_reports_only_changes() {
        let left = HandObservation::posed(PoseVector::INDEX, (200.0, 500.0), Orientation::Left);
        let confirm = HandObservation::posed(PoseVector::OPEN, (1000.0, 500.0), Orientation::Right);
        let mut source = VecFrameSource::new(vec![
            HandFrame::empty(0),
            HandFrame::new(33, vec![left.clone()]),
            HandFrame::new(66, vec![left.clone()]),
            HandFrame::new(99, vec![left, confirm]),
            HandFrame::empty(132),
        ]);

        let mut machine = CalculatorMachine::new(&CalculatorConfig::default());
        let mut reports = Vec::new();
        let summary = run_calculator(&mut source, &FrameConfig::default(), &mut machine, |r| {
            reports.push(r.clone())
        })
        .unwrap();

        assert_eq!(summary.frames, 5);
        assert_eq!(summary.commits, 1);
        assert_eq!(reports.len(), 2);
        match &reports[1] {
            FrameReport::Calculator {
                t_ms,
                events,
                snapshot,
            } => {
                assert_eq!(*t_ms, 99);
                assert_eq!(events.len(), 1);
                assert_eq!(snapshot.expression, "1");
            }
            other => panic!("unexpected report {:?}", other),
        }
    }

    #[test]
    fn test_calculator_report_serialisation() {
        let report = FrameReport::Calculator {
            t_ms: 10,
            events: vec![],
            snapshot: CalculatorSnapshot {
                expression: "3+4".to_string(),
                current: None,
                result: None,
            },
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"mode\":\"calculator\""));
        assert!(json.contains("\"expression\":\"3+4\""));
    }

    #[test]
    fn test_canvas_inline_session() {
        let client = ScriptedClient::answering("left is better");
        let dispatcher = InlineDispatcher::new(client.clone()).unwrap();
        let mut machine =
            CanvasMachine::new(&FrameConfig::default(), &CanvasConfig::default(), dispatcher);
        let mut source = VecFrameSource::new(canvas_frames());

        let mut reports = Vec::new();
        let summary = run_canvas(
            &mut source,
            &FrameConfig::default(),
            &mut machine,
            None,
            |r| reports.push(r.clone()),
        )
        .unwrap();

        assert_eq!(summary.frames, 13);
        assert_eq!(summary.dispatches, 1);
        assert_eq!(summary.responses, 1);
        assert_eq!(client.calls(), 1);
        assert_eq!(machine.response(), "left is better");
        assert_eq!(machine.state().segments.len(), 2);
    }

    #[test]
    fn test_canvas_worker_session_waits_for_answer() {
        let client = ScriptedClient::answering("right").with_delay(Duration::from_millis(100));
        let worker = AiWorker::spawn(client).unwrap();
        let mut machine =
            CanvasMachine::new(&FrameConfig::default(), &CanvasConfig::default(), worker);
        let mut source = VecFrameSource::new(canvas_frames());

        let mut last = None;
        let summary = run_canvas(
            &mut source,
            &FrameConfig::default(),
            &mut machine,
            Some(Duration::from_secs(5)),
            |r| last = Some(r.clone()),
        )
        .unwrap();

        assert_eq!(summary.dispatches, 1);
        assert_eq!(summary.responses, 1);
        match last {
            Some(FrameReport::Canvas { response, .. }) => assert_eq!(response, "right"),
            other => panic!("unexpected report {:?}", other),
        }
    }

    #[test]
    fn test_source_error_is_fatal() {
        struct Broken;
        impl FrameSource for Broken {
            fn next_frame(&mut self) -> Result<Option<HandFrame>, SourceError> {
                Err(SourceError::Read(std::io::Error::other("camera unplugged")))
            }
        }

        let mut machine = CalculatorMachine::new(&CalculatorConfig::default());
        let result = run_calculator(&mut Broken, &FrameConfig::default(), &mut machine, |_| {});
        assert!(matches!(result, Err(SourceError::Read(_))));
    }
}
