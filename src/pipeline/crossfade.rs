//! Crossfade planning for same-owner utterance handoffs.
//!
//! The handoff ramps the outgoing gain 1→0 and the incoming gain 0→1 over a
//! sequence of shrinking overlap windows rather than a single fixed fade.
//! The plan is computed up front and applied to the timeline as ordinary
//! gain ramps, so the whole law is a pure function of two config values.
//! The step law is a coarse equal-power approximation; the invariants that
//! matter are monotonic gains and exact 0/1 endpoints.

/// One step of a crossfade: both gains ramp linearly toward their targets
/// over `window` seconds, starting `offset` seconds into the crossfade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossfadeStep {
    /// Start of this step relative to the crossfade start, in seconds.
    pub offset: f64,
    /// Ramp duration of this step in seconds.
    pub window: f64,
    /// Outgoing gain target at the end of this step.
    pub outgoing_to: f32,
    /// Incoming gain target at the end of this step.
    pub incoming_to: f32,
}

/// A complete crossfade schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossfadePlan {
    /// Steps in time order. The final step's targets are exactly 0 and 1.
    pub steps: Vec<CrossfadeStep>,
    /// Total crossfade duration in seconds.
    pub total: f64,
}

/// Build a crossfade plan from an initial overlap window and a per-step
/// shrink amount.
///
/// Windows shrink arithmetically (`initial`, `initial − shrink`, …) until
/// exhausted; gain targets are spread evenly across the steps so both gains
/// are monotonic and land exactly on 0 / 1 at the end of the final step.
/// A non-positive `initial` yields an empty plan (instant handoff); a
/// non-positive `shrink` collapses to a single full-window step so the plan
/// always terminates.
pub fn plan(initial: f64, shrink: f64) -> CrossfadePlan {
    if initial <= 0.0 {
        return CrossfadePlan {
            steps: Vec::new(),
            total: 0.0,
        };
    }
    let shrink = if shrink > 0.0 { shrink } else { initial };

    let mut windows = Vec::new();
    let mut window = initial;
    while window > 1e-9 {
        windows.push(window);
        window -= shrink;
    }

    let count = windows.len();
    let mut steps = Vec::with_capacity(count);
    let mut offset = 0.0;
    for (k, window) in windows.into_iter().enumerate() {
        let frac = (k + 1) as f32 / count as f32;
        steps.push(CrossfadeStep {
            offset,
            window,
            outgoing_to: 1.0 - frac,
            incoming_to: frac,
        });
        offset += window;
    }

    CrossfadePlan {
        steps,
        total: offset,
    }
}
