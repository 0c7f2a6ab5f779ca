//! Air-drawing canvas state machine
//!
//! ```text
//!              Draw pose
//!   +------+ -----------> +---------+
//!   | Idle |              | Drawing |  (each Draw frame adds a segment)
//!   +------+ <----------- +---------+
//!            other pose /
//!              no hand
//! ```
//!
//! `confirmed` is orthogonal to the phase: the confirm pose over the confirm
//! button sends the drawing once and sets it; only an open hand clears it.

use super::raster::Rasterizer;
use crate::config::{CanvasConfig, FrameConfig};
use crate::dispatch::{prompts, response_text, CanvasDispatcher, VisionRequest};
use crate::hand::{classify, HandFrame, HandObservation, HandPose, Orientation};
use crate::region::{EdgePolicy, RegionMap};
use serde::{Deserialize, Serialize};

/// One straight piece of a stroke, in frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub from: (f32, f32),
    pub to: (f32, f32),
}

/// Drawing phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CanvasPhase {
    #[default]
    Idle,
    Drawing,
}

/// Persistent stroke buffer plus the one-shot confirm flag
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasState {
    pub segments: Vec<Segment>,
    pub confirmed: bool,
}

impl CanvasState {
    pub fn clear(&mut self) {
        self.segments.clear();
        self.confirmed = false;
    }
}

/// Something the canvas did in response to a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanvasEvent {
    StrokeStarted,
    Cleared,
    /// The drawing was handed to the dispatcher
    Dispatched,
    ResponseReceived { text: String },
}

/// Canvas state machine
pub struct CanvasMachine<D> {
    dispatcher: D,
    confirm_button: RegionMap,
    rasterizer: Rasterizer,
    prompt: String,
    state: CanvasState,
    phase: CanvasPhase,
    previous: Option<(f32, f32)>,
    response: String,
}

impl<D: CanvasDispatcher> CanvasMachine<D> {
    pub fn new(frame: &FrameConfig, config: &CanvasConfig, dispatcher: D) -> Self {
        Self {
            dispatcher,
            confirm_button: RegionMap::single(config.confirm.clone(), EdgePolicy::Exclusive),
            rasterizer: Rasterizer::from_config(frame, config),
            prompt: prompts::resolve_prompt(config),
            state: CanvasState::default(),
            phase: CanvasPhase::Idle,
            previous: None,
            response: String::new(),
        }
    }

    pub fn state(&self) -> &CanvasState {
        &self.state
    }

    pub fn phase(&self) -> CanvasPhase {
        self.phase
    }

    /// Latest AI answer, empty until one arrives
    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn rasterizer(&self) -> &Rasterizer {
        &self.rasterizer
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }

    /// Advance by one frame
    pub fn process_frame(&mut self, frame: &HandFrame) -> Vec<CanvasEvent> {
        let mut events = Vec::new();

        let hand = frame.hands.iter().find(|hand| hand.is_complete());
        match hand.and_then(|hand| pose_of(hand).map(|p| (hand, p))) {
            Some((hand, HandPose::Draw)) => self.draw(hand, &mut events),
            Some((_, HandPose::OpenHand)) => {
                self.end_stroke();
                self.reset(&mut events);
            }
            Some((hand, HandPose::Confirm)) => {
                self.end_stroke();
                self.try_confirm(hand, &mut events);
            }
            _ => self.end_stroke(),
        }

        if let Some(text) = self.dispatcher.poll() {
            events.push(self.accept_response(text));
        }

        events
    }

    /// Block up to `timeout` for an outstanding answer
    pub fn wait_for_response(&mut self, timeout: std::time::Duration) -> Option<String> {
        let text = self.dispatcher.wait(timeout)?;
        self.accept_response(text.clone());
        Some(text)
    }

    fn draw(&mut self, hand: &HandObservation, events: &mut Vec<CanvasEvent>) {
        let Some(tip) = hand.index_tip() else {
            return;
        };

        match self.previous {
            Some(from) => self.state.segments.push(Segment { from, to: tip }),
            None => {
                tracing::debug!("Stroke started at ({:.0}, {:.0})", tip.0, tip.1);
                events.push(CanvasEvent::StrokeStarted);
            }
        }

        self.previous = Some(tip);
        self.phase = CanvasPhase::Drawing;
    }

    fn end_stroke(&mut self) {
        self.previous = None;
        self.phase = CanvasPhase::Idle;
    }

    fn reset(&mut self, events: &mut Vec<CanvasEvent>) {
        let had_state = !self.state.segments.is_empty()
            || self.state.confirmed
            || !self.response.is_empty()
            || self.dispatcher.is_pending();

        self.state.clear();
        self.response.clear();
        self.dispatcher.cancel();

        if had_state {
            tracing::info!("Canvas cleared");
            events.push(CanvasEvent::Cleared);
        }
    }

    fn try_confirm(&mut self, hand: &HandObservation, events: &mut Vec<CanvasEvent>) {
        if self.state.confirmed {
            return;
        }
        let Some(tip) = hand.index_tip() else {
            return;
        };
        if self.confirm_button.hit(tip).is_none() {
            return;
        }

        self.state.confirmed = true;
        events.push(CanvasEvent::Dispatched);

        match self.rasterizer.encode_png(&self.state.segments) {
            Ok(image_png) => {
                tracing::info!(
                    "Drawing confirmed ({} segments), sending to AI",
                    self.state.segments.len()
                );
                self.dispatcher
                    .send(VisionRequest::new(self.prompt.clone(), image_png));
            }
            Err(e) => {
                tracing::error!("Failed to encode canvas: {}", e);
                events.push(self.accept_response(response_text(Err(e))));
            }
        }
    }

    fn accept_response(&mut self, text: String) -> CanvasEvent {
        tracing::info!("AI response received ({} characters)", text.len());
        self.response = text.clone();
        CanvasEvent::ResponseReceived { text }
    }
}

/// Named pose of a hand, oriented by the detector's handedness
fn pose_of(hand: &HandObservation) -> Option<HandPose> {
    let orientation = hand.handedness.map(Orientation::from).unwrap_or_default();
    classify(hand, orientation).map(|pose| pose.pose())
}
