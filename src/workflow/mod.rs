pub mod break_controller;

pub use break_controller::{BreakController, BreakEnd, BreakPhase, BreakSync, BreakTick};
