//! Gesture calculator
//!
//! Digits are shown with finger counts over the two input regions, operators
//! are picked by pointing at the operator buttons, an open hand over the
//! confirm region commits the pending token and two fists evaluate.

pub mod expression;
pub mod state;

pub use expression::{
    evaluate, Evaluation, ExpressionBuffer, ExpressionError, Operator, ERROR_SENTINEL,
};
pub use state::{CalculatorEvent, CalculatorMachine, CalculatorSnapshot};
