// Proportional feedback for a two-switch channel
//
// Each sample tick the regulation error is folded into one of the two duty cycles.
// Switch 1 does the regulating under normal conditions; switch 2 only moves when
// switch 1 has run into one of its rails.

use crate::config::feedback::{DUTY_FULL_SCALE, FUDGE};
use crate::fixed::Fixed;

use super::mode::{ChannelState, Gains, Mode, Regulation};

/// Run one feedback step on a channel's state
///
/// Only the duty cycles are touched; pushing them to the timers is the caller's job
/// (skipped when the outcome is [`Regulation::Idle`]).
pub fn regulate(state: &mut ChannelState) -> Regulation {
    let outcome = match state.mode {
        Mode::Disabled | Mode::ConstantDuty | Mode::MaxPower => return Regulation::Idle,
        Mode::VoltageFeedback => {
            if state.isense > state.ilimit {
                limit(state)
            } else {
                let error = state.vsense as i32 - state.vsetpoint as i32;
                let gains = state.v_gains;
                mix(state, error, &gains)
            }
        }
        Mode::CurrentFeedback => {
            if state.vsense > state.vlimit {
                limit(state)
            } else {
                let error = state.isense as i32 - state.isetpoint as i32;
                let gains = state.i_gains;
                mix(state, error, &gains)
            }
        }
    };

    state.duty1 = state.duty1.clamp_to(Fixed::ZERO, DUTY_FULL_SCALE);
    state.duty2 = state.duty2.clamp_to(Fixed::ZERO, DUTY_FULL_SCALE);
    outcome
}

/// Opposing quantity over its limit: back off both switches
fn limit(state: &mut ChannelState) -> Regulation {
    state.duty1 = state.duty1.halve();
    state.duty2 = state.duty2.halve();
    Regulation::Limited
}

/// Two-switch duty mixing
///
/// A negative error means the regulated quantity is below its setpoint.
fn mix(state: &mut ChannelState, error: i32, gains: &Gains) -> Regulation {
    let full = DUTY_FULL_SCALE.to_bits();
    let duty1 = state.duty1.to_bits();
    let duty2 = state.duty2.to_bits();

    let mut outcome = Regulation::Tracking;
    if error < 0 && duty1 > full - FUDGE && duty2 > full - FUDGE {
        // both switches saturated and still short: output collapsed, start over
        state.duty1 = Fixed::HALF;
        state.duty2 = Fixed::HALF;
        outcome = Regulation::Collapsed;
    } else if error < 0 && duty1 > full - FUDGE {
        // switch 1 at its top rail, push switch 2 up
        state.duty2 = state.duty2.saturating_sub(gains.prop_gain2.scale(error));
    } else if error > 0 && duty1 < FUDGE {
        // switch 1 at its bottom rail, pull switch 2 down
        state.duty2 = state.duty2.saturating_sub(gains.prop_gain2.scale(error));
    } else if error < 0 && duty2 > FUDGE {
        state.duty2 = state.duty2.saturating_add(gains.prop_gain2.scale(error));
    } else {
        state.duty1 = state.duty1.saturating_sub(gains.prop_gain1.scale(error));
    }

    // switch 2 is never on while switch 1 is off
    if state.duty2 > state.duty1 {
        state.duty2 = state.duty1;
    }
    outcome
}
