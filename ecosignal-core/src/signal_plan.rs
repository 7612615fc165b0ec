//! Signal timing plans
//!
//! A plan splits the fixed cycle into green, yellow and red for the main
//! approach. Green starts from the strategy's base green, grows with the
//! queue and stays within the safe limits:
//!
//! ```text
//! green = clamp(base_green × (0.5 + queue_ratio), 15, 80)
//! red   = cycle − green − yellow
//! ```

use serde::Serialize;

use crate::constants::{ALL_RED_S, MAX_GREEN_S, MIN_GREEN_S, SIGNAL_CYCLE_S, YELLOW_S};

/// Timing of one signal cycle (seconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalPlan {
    pub cycle_s: u32,
    pub green_s: u32,
    pub yellow_s: u32,
    pub red_s: u32,
    pub all_red_s: u32,
}

impl SignalPlan {
    /// Plan for a base green time and queue occupancy ratio
    pub fn for_queue(base_green_s: u32, queue_ratio: f64) -> Self {
        let ratio = if queue_ratio.is_finite() {
            queue_ratio.max(0.0)
        } else {
            0.0
        };
        let scaled = (base_green_s as f64 * (0.5 + ratio)).round();
        let green = (scaled as u32).clamp(MIN_GREEN_S, MAX_GREEN_S);

        Self {
            cycle_s: SIGNAL_CYCLE_S,
            green_s: green,
            yellow_s: YELLOW_S,
            red_s: SIGNAL_CYCLE_S - green - YELLOW_S,
            all_red_s: ALL_RED_S,
        }
    }

    /// Green start within the cycle for a coordination offset
    pub fn green_start(&self, offset_s: u32) -> u32 {
        offset_s % self.cycle_s
    }
}

/// Shortest distance between two points on a cycle
pub fn circular_distance(a: u32, b: u32, cycle_s: u32) -> u32 {
    if cycle_s == 0 {
        return 0;
    }
    let diff = a.abs_diff(b) % cycle_s;
    diff.min(cycle_s - diff)
}
