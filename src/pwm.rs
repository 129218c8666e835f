// Center-aligned PWM synthesis
//
// Turns 16.16 duty fractions into compare-register tick counts and programs one or two
// timers through the `PwmDriver` interface.
//
//            period
//   ╭────────────────────╮
//       t
//   ╭────────╮
// 1 ┌────────┐
// 0 ┘        └───────────┘

use crate::error::Fault;
use crate::fixed::Fixed;
use crate::hal::{MasterMode, Polarity, PwmDriver, PwmOutput, SlaveTrigger};

/// Checked conversion of a duty fraction into compare ticks
///
/// `t = (duty * period) >> 16`. A tick count above the 16-bit compare range is a
/// [`Fault::TickOverflow`]; it can only come from an inconsistent period/duty
/// configuration, never from a transient condition.
#[inline(always)]
pub fn duty_ticks(duty: Fixed, period: u32) -> Result<u16, Fault> {
    duty.ticks(period)
}

/// Update the compare value of a running output
///
/// The new value is preloaded and takes effect on the next update event. Nothing is
/// written when the conversion overflows.
pub fn set_duty<P: PwmDriver>(
    pwm: &mut P,
    output: PwmOutput,
    period: u32,
    duty: Fixed,
) -> Result<(), Fault> {
    let ticks = duty_ticks(duty, period)?;
    pwm.set_compare(output, ticks);
    Ok(())
}

/// Configure a single center-aligned PWM output
///
/// Continuous counting, preload-enabled output compare. `polarity` selects whether the
/// on-time is the leading (`ActiveHigh`) or trailing (`ActiveLow`) part of the cycle.
/// The output is enabled once the timer is configured.
pub fn configure_single<P: PwmDriver>(
    pwm: &mut P,
    output: PwmOutput,
    period: u32,
    polarity: Polarity,
    initial_ticks: u16,
) {
    trace!(
        "PWM {} {}: period={} t={}",
        output.timer,
        output.channel,
        period,
        initial_ticks
    );
    pwm.configure_output(output, period, polarity, initial_ticks);
    pwm.enable_output(output);
}

/// Configure two center-aligned PWM outputs with a relative phase
///
/// ```text
///             period
///      ╭────────────────────╮
///
///        ta
///      ╭────────╮
///    1 ┌────────┐
/// A: 0 ┘        └───────────┘
///
///    1    ┌──┐
/// B: 0 ───┘  └───────────────
///
///         ╰──╯
///          tb
///      ╰──╯
///       dt
/// ```
///
/// Timer A is the master and drives its counter-enable onto the trigger output; timer B
/// is a gated slave that counts only while A is enabled, so stopping and restarting A
/// pauses both without losing their relative phase. The phase is primed once while A
/// is still stopped: A's period is shortened by `phase_offset` ticks, an update event
/// loads it, and the true period is written back into the preload register so it takes
/// effect from the next cycle on.
///
/// The caller starts timer A afterwards; B counts from that moment on.
pub fn configure_dual<P: PwmDriver>(
    pwm: &mut P,
    a: PwmOutput,
    b: PwmOutput,
    trigger: SlaveTrigger,
    period: u32,
    ta: u16,
    tb: u16,
    phase_offset: u32,
) -> Result<(), Fault> {
    if phase_offset >= period {
        return Err(Fault::PhaseOffset {
            offset: phase_offset,
            period,
        });
    }

    // それぞれ独立に構成
    configure_single(pwm, a, period, Polarity::ActiveHigh, ta);
    configure_single(pwm, b, period, Polarity::ActiveHigh, tb);

    // A = マスター（TRGO = CEN）、B = ゲートスレーブ
    pwm.set_master_mode(a.timer, MasterMode::Enable);
    pwm.set_slave_trigger(b.timer, trigger);

    // 1周期だけ短くして位相をずらす
    pwm.set_period(a.timer, period - phase_offset);
    pwm.generate_update(a.timer);
    pwm.set_period(a.timer, period);

    Ok(())
}
