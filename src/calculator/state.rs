//! Calculator input state machine
//!
//! Owns the expression buffer, the partial token on display, the last result
//! and the debounce state. Each call to [`CalculatorMachine::process_frame`]
//! advances it by one video frame.

use super::expression::{Evaluation, ExpressionBuffer};
use crate::config::{CalculatorConfig, DELETE_LABEL, RESET_LABEL};
use crate::debounce::{CooldownGate, CooldownTimer, EdgeGate};
use crate::hand::{classify, HandFrame, HandObservation, Orientation};
use crate::region::{EdgePolicy, Region, RegionMap};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Most hands the calculator reads per frame
const MAX_HANDS: usize = 2;

/// Fist poses needed at once to trigger evaluation
const FISTS_TO_EVALUATE: usize = 2;

/// Digit count that signals "confirm" over the confirm region
const CONFIRM_DIGIT: u8 = 5;

/// Something the calculator did in response to a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CalculatorEvent {
    /// A token was appended to the expression
    TokenCommitted { token: String },
    /// The last character of the expression was removed
    CharacterDeleted { character: char },
    /// The expression and result were cleared
    Cleared,
    /// The expression was evaluated
    Evaluated { result: Evaluation },
}

/// Visible calculator state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatorSnapshot {
    pub expression: String,
    pub current: Option<String>,
    pub result: Option<Evaluation>,
}

impl CalculatorSnapshot {
    /// Single-line rendering of the expression and result
    pub fn display_line(&self) -> String {
        match &self.result {
            Some(result) => format!("{} = {}", self.expression, result),
            None => format!("Expression: {}", self.expression),
        }
    }
}

/// Calculator state machine
pub struct CalculatorMachine {
    left_input: Region,
    right_input: Region,
    confirm_region: Region,
    operators: RegionMap,
    expression: ExpressionBuffer,
    current: Option<String>,
    result: Option<Evaluation>,
    confirm_gate: EdgeGate,
    delete_gate: CooldownGate,
    /// Shared by evaluation and token commits
    evaluate_timer: CooldownTimer,
}

impl CalculatorMachine {
    pub fn new(config: &CalculatorConfig) -> Self {
        let machine = Self {
            left_input: config.left_input.clone(),
            right_input: config.right_input.clone(),
            confirm_region: config.confirm.clone(),
            operators: RegionMap::new(config.operators.clone(), EdgePolicy::Inclusive),
            expression: ExpressionBuffer::new(),
            current: None,
            result: None,
            confirm_gate: EdgeGate::new(),
            delete_gate: CooldownGate::new(config.delete_cooldown()),
            evaluate_timer: CooldownTimer::new(config.evaluate_cooldown()),
        };
        tracing::debug!(
            "Calculator ready: {} operators, delete cooldown {:?}, evaluate cooldown {:?}",
            machine.operators.regions().len(),
            machine.delete_cooldown(),
            machine.evaluate_cooldown()
        );
        machine
    }

    pub fn delete_cooldown(&self) -> Duration {
        self.delete_gate.timer().period()
    }

    pub fn evaluate_cooldown(&self) -> Duration {
        self.evaluate_timer.period()
    }

    pub fn expression(&self) -> &ExpressionBuffer {
        &self.expression
    }

    /// Partial token waiting for a confirm
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn result(&self) -> Option<&Evaluation> {
        self.result.as_ref()
    }

    pub fn snapshot(&self) -> CalculatorSnapshot {
        CalculatorSnapshot {
            expression: self.expression.to_string(),
            current: self.current.clone(),
            result: self.result.clone(),
        }
    }

    /// Advance by one frame
    pub fn process_frame(&mut self, frame: &HandFrame) -> Vec<CalculatorEvent> {
        let now = frame.timestamp();
        let mut events = Vec::new();

        // Slots are assigned by wrist position each frame: leftmost is slot 0
        let mut hands: Vec<&HandObservation> =
            frame.hands.iter().filter(|h| h.is_complete()).collect();
        hands.sort_by(|a, b| wrist_x(a).total_cmp(&wrist_x(b)));
        hands.truncate(MAX_HANDS);

        let mut total_digit: Option<u8> = None;
        let mut fists = 0;

        if let Some(hand) = hands.first() {
            if let Some(digit) = self.digit_in(hand, &self.left_input, Orientation::Left) {
                total_digit = Some(digit);
                self.current = Some(digit.to_string());
                if digit == 0 {
                    fists += 1;
                }
            }

            self.select_operator(hand, now, &mut events);
        }

        if let Some(hand) = hands.get(1) {
            if let Some(digit) = self.digit_in(hand, &self.right_input, Orientation::Right) {
                let total = total_digit.unwrap_or(0) + digit;
                self.current = Some(total.to_string());
                if digit == 0 {
                    fists += 1;
                }
            }
        }

        let mut confirm = false;
        for hand in &hands {
            match self.digit_in(hand, &self.confirm_region, Orientation::Right) {
                Some(CONFIRM_DIGIT) => confirm = true,
                Some(0) => fists += 1,
                _ => {}
            }
        }

        if self.confirm_gate.update(confirm) {
            if let Some(token) = self.current.take() {
                self.commit(token, now, &mut events);
            }
        }

        if fists >= FISTS_TO_EVALUATE && self.evaluate_timer.try_fire(now) {
            let result = self.expression.evaluate();
            tracing::info!("Evaluated '{}' = {}", self.expression, result);
            events.push(CalculatorEvent::Evaluated {
                result: result.clone(),
            });
            self.result = Some(result);
        }

        events
    }

    /// Digit count of `hand` if its wrist is inside `region`
    fn digit_in(
        &self,
        hand: &HandObservation,
        region: &Region,
        orientation: Orientation,
    ) -> Option<u8> {
        let wrist = hand.wrist()?;
        if !region.contains(wrist, EdgePolicy::Inclusive) {
            return None;
        }
        classify(hand, orientation).map(|pose| pose.digit())
    }

    fn select_operator(
        &mut self,
        hand: &HandObservation,
        now: Duration,
        events: &mut Vec<CalculatorEvent>,
    ) {
        let Some(tip) = hand.index_tip() else {
            return;
        };
        let Some(label) = self.operators.hit_name(tip).map(str::to_owned) else {
            return;
        };

        match label.as_str() {
            RESET_LABEL => {
                let had_state = !self.expression.is_empty() || self.result.is_some();
                self.expression.clear();
                self.result = None;
                self.current = None;
                if had_state {
                    tracing::info!("Calculator cleared");
                    events.push(CalculatorEvent::Cleared);
                }
            }
            DELETE_LABEL => {
                if self.delete_gate.update(!self.expression.is_empty(), now) {
                    if let Some(character) = self.expression.pop_char() {
                        tracing::info!(
                            "Deleted '{}', expression now '{}'",
                            character,
                            self.expression
                        );
                        events.push(CalculatorEvent::CharacterDeleted { character });
                    }
                    self.current = None;
                }
            }
            symbol => {
                self.current = Some(symbol.to_string());
            }
        }
    }

    fn commit(&mut self, token: String, now: Duration, events: &mut Vec<CalculatorEvent>) {
        match self.expression.push_token(&token) {
            Ok(()) => {
                self.evaluate_timer.mark(now);
                tracing::info!("Committed '{}', expression now '{}'", token, self.expression);
                events.push(CalculatorEvent::TokenCommitted { token });
            }
            Err(e) => {
                tracing::warn!("Rejected token '{}': {}", token, e);
            }
        }
    }
}

fn wrist_x(hand: &HandObservation) -> f32 {
    hand.wrist().map(|(x, _)| x).unwrap_or(f32::MAX)
}
