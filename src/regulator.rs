//! レギュレータ制御コア
//!
//! 2チャネル分の状態・パワーステージと共有サンプリングペリフェラルを所有し、
//! 制御プレーン向けAPIとサンプル割り込みからの入口（[`Regulator::on_samples`]）を
//! 提供します。
//!
//! ## モード遷移
//! - Disabled → 非Disabled: ステージ有効化 → サンプリング参照を取得 → 構成
//! - 非Disabled → 非Disabled: 構成のみ（デューティ比は保持）
//! - → Disabled: ステージ停止、動作中だった場合はサンプリング参照を解放
//!
//! 構成に失敗した場合はDisabledに戻し、ステージ停止・参照解放してからエラーを返す。

pub mod feedback;
pub mod mode;
pub mod stage;

pub use mode::{
    Ch2Source, ChannelId, ChannelState, ChannelStatus, Gains, Mode, Regulation, Samples,
};
pub use stage::{Buck, BuckBoost, PowerStage};

use embedded_hal::digital::OutputPin;

use crate::config::ChannelConfig;
use crate::error::{Error, Fault};
use crate::fixed::Fixed;
use crate::hal::{AdcSampler, PwmDriver, TriggerTimer};
use crate::pwm;
use crate::sampling::SharedSampler;

/// チャネル状態 + ステージ
struct Channel<G> {
    state: ChannelState,
    stage: G,
}

/// 1チャネル分の可変参照（チャネル種別を問わず同じ手順で遷移させるため）
struct Parts<'a, P, A, T> {
    pwm: &'a mut P,
    sampler: &'a mut SharedSampler<A, T>,
    state: &'a mut ChannelState,
    stage: &'a mut dyn PowerStage<P>,
}

impl<P: PwmDriver, A: AdcSampler, T: TriggerTimer> Parts<'_, P, A, T> {
    /// 遷移失敗時のロールバック（Disabled + ステージ停止 + 必要なら参照解放）
    fn abort(&mut self, id: ChannelId, fault: Fault, holds_reference: bool) -> Error {
        error!("{}: {} failed, channel disabled", id, fault);
        self.state.mode = Mode::Disabled;
        self.stage.disable(self.pwm);
        if holds_reference {
            self.sampler.release();
        }
        Error::Configure(fault)
    }
}

pub struct Regulator<P, S, A, T> {
    pwm: P,
    sampler: SharedSampler<A, T>,
    ch1: Channel<BuckBoost<S>>,
    ch2: Channel<Buck>,
}

impl<P, S, A, T> Regulator<P, S, A, T>
where
    P: PwmDriver,
    S: OutputPin,
    A: AdcSampler,
    T: TriggerTimer,
{
    /// 両チャネルDisabledで構築する（ハードウェアには触れない。続けて [`Self::init`]）
    pub fn new(
        pwm: P,
        sense_enable: S,
        adc: A,
        trigger: T,
        ch1: &ChannelConfig,
        ch2: &ChannelConfig,
    ) -> Self {
        Self {
            pwm,
            sampler: SharedSampler::new(adc, trigger),
            ch1: Channel {
                state: ChannelState::new(ch1),
                stage: BuckBoost::new(sense_enable),
            },
            ch2: Channel {
                state: ChannelState::new(ch2),
                stage: Buck::new(Ch2Source::default()),
            },
        }
    }

    /// 両チャネルを停止状態にし、共有ペリフェラルの電源を落とす
    pub fn init(&mut self) {
        for id in [ChannelId::One, ChannelId::Two] {
            // Disabledへの遷移は失敗しない
            let _ = self.set_mode(id, Mode::Disabled);
        }
        self.sampler.power_down();
        info!("Regulator initialized");
    }

    fn parts(&mut self, id: ChannelId) -> Parts<'_, P, A, T> {
        match id {
            ChannelId::One => Parts {
                pwm: &mut self.pwm,
                sampler: &mut self.sampler,
                state: &mut self.ch1.state,
                stage: &mut self.ch1.stage,
            },
            ChannelId::Two => Parts {
                pwm: &mut self.pwm,
                sampler: &mut self.sampler,
                state: &mut self.ch2.state,
                stage: &mut self.ch2.stage,
            },
        }
    }

    fn state(&self, id: ChannelId) -> &ChannelState {
        match id {
            ChannelId::One => &self.ch1.state,
            ChannelId::Two => &self.ch2.state,
        }
    }

    fn state_mut(&mut self, id: ChannelId) -> &mut ChannelState {
        match id {
            ChannelId::One => &mut self.ch1.state,
            ChannelId::Two => &mut self.ch2.state,
        }
    }

    pub fn set_mode(&mut self, id: ChannelId, mode: Mode) -> Result<(), Error> {
        if mode == Mode::MaxPower {
            warn!("{}: MaxPower is not supported", id);
            return Err(Error::ReservedMode);
        }

        let mut ch = self.parts(id);
        let old = ch.state.mode;
        ch.state.mode = mode;
        if old != mode {
            info!("{}: {} -> {}", id, old, mode);
        }

        if !old.is_active() && mode.is_active() {
            if let Err(fault) = ch.stage.enable(ch.pwm) {
                return Err(ch.abort(id, fault, false));
            }
            // acquire は失敗時に自分の参照を戻す
            if let Err(fault) = ch.sampler.acquire() {
                return Err(ch.abort(id, fault, false));
            }
        } else if !mode.is_active() {
            ch.stage.disable(ch.pwm);
            if old.is_active() {
                ch.sampler.release();
            }
        }

        if mode.is_active() {
            if let Err(fault) = ch.stage.configure(ch.pwm, ch.state) {
                return Err(ch.abort(id, fault, true));
            }
        }

        Ok(())
    }

    pub fn get_mode(&self, id: ChannelId) -> Mode {
        self.state(id).mode
    }

    /// 固定デューティの設定
    ///
    /// Disabled では値を保持するだけ。ConstantDuty では即座にPWMを再構成する。
    pub fn set_duty_cycle(&mut self, id: ChannelId, d1: Fixed, d2: Fixed) -> Result<(), Error> {
        let state = self.state(id);
        if !matches!(state.mode, Mode::Disabled | Mode::ConstantDuty) {
            warn!("{}: duty cycle rejected in {}", id, state.mode);
            return Err(Error::WrongMode);
        }
        let in_range = |d: Fixed| d >= Fixed::ZERO && d <= Fixed::ONE;
        if !in_range(d1) || !in_range(d2) {
            return Err(Error::DutyOutOfRange);
        }
        if d2 > d1 {
            return Err(Error::DutyOrder);
        }

        if state.mode == Mode::Disabled {
            let state = self.state_mut(id);
            state.duty1 = d1;
            state.duty2 = d2;
            return Ok(());
        }

        // 値を書き換える前にカウント値が収まることを確認
        for duty in [d1, d2] {
            if let Err(fault) = pwm::duty_ticks(duty, state.period) {
                warn!("{}: duty {} rejected: {}", id, duty, fault);
                return Err(Error::DutyTicks(fault));
            }
        }

        let mut ch = self.parts(id);
        ch.state.duty1 = d1;
        ch.state.duty2 = d2;
        if let Err(fault) = ch.stage.configure(ch.pwm, ch.state) {
            return Err(ch.abort(id, fault, true));
        }
        Ok(())
    }

    pub fn get_duty_cycle_1(&self, id: ChannelId) -> Fixed {
        self.state(id).duty1
    }

    pub fn get_duty_cycle_2(&self, id: ChannelId) -> Fixed {
        self.state(id).duty2
    }

    /// 電圧目標値 [V]
    pub fn set_vsetpoint(&mut self, id: ChannelId, volts: Fixed) -> Result<(), Error> {
        self.state_mut(id).set_vsetpoint(volts)
    }

    pub fn get_vsetpoint(&self, id: ChannelId) -> Fixed {
        self.state(id).vsetpoint()
    }

    /// 電流目標値 [A]
    pub fn set_isetpoint(&mut self, id: ChannelId, amps: Fixed) -> Result<(), Error> {
        self.state_mut(id).set_isetpoint(amps)
    }

    pub fn get_isetpoint(&self, id: ChannelId) -> Fixed {
        self.state(id).isetpoint()
    }

    pub fn set_vlimit(&mut self, id: ChannelId, volts: Fixed) -> Result<(), Error> {
        self.state_mut(id).set_vlimit(volts)
    }

    pub fn get_vlimit(&self, id: ChannelId) -> Fixed {
        self.state(id).vlimit()
    }

    pub fn set_ilimit(&mut self, id: ChannelId, amps: Fixed) -> Result<(), Error> {
        self.state_mut(id).set_ilimit(amps)
    }

    pub fn get_ilimit(&self, id: ChannelId) -> Fixed {
        self.state(id).ilimit()
    }

    pub fn set_v_gains(&mut self, id: ChannelId, gains: Gains) {
        self.state_mut(id).v_gains = gains;
    }

    pub fn get_v_gains(&self, id: ChannelId) -> Gains {
        self.state(id).v_gains
    }

    pub fn set_i_gains(&mut self, id: ChannelId, gains: Gains) {
        self.state_mut(id).i_gains = gains;
    }

    pub fn get_i_gains(&self, id: ChannelId) -> Gains {
        self.state(id).i_gains
    }

    /// 最新の検出電圧 [V]
    pub fn get_vsense(&self, id: ChannelId) -> Fixed {
        self.state(id).vsense()
    }

    /// 最新の検出電流 [A]
    pub fn get_isense(&self, id: ChannelId) -> Fixed {
        self.state(id).isense()
    }

    /// チャネル2の出力先切替（Disabled時のみ）
    pub fn set_ch2_source(&mut self, source: Ch2Source) -> Result<(), Error> {
        if self.ch2.state.mode.is_active() {
            warn!("Ch2 source change rejected while active");
            return Err(Error::ChannelActive);
        }
        self.ch2.stage.set_source(source);
        info!("Ch2 source: {}", source);
        Ok(())
    }

    pub fn get_ch2_source(&self) -> Ch2Source {
        self.ch2.stage.source()
    }

    /// PWM周期 [カウント]（Disabled時のみ）
    pub fn set_period(&mut self, id: ChannelId, ticks: u32) -> Result<(), Error> {
        let state = self.state_mut(id);
        if state.mode.is_active() {
            return Err(Error::ChannelActive);
        }
        if ticks == 0 {
            return Err(Error::InvalidPeriod);
        }
        state.period = ticks;
        Ok(())
    }

    pub fn get_period(&self, id: ChannelId) -> u32 {
        self.state(id).period
    }

    pub fn status(&self, id: ChannelId) -> ChannelStatus {
        self.state(id).status()
    }

    pub fn is_sampling(&self) -> bool {
        self.sampler.is_running()
    }

    /// サンプル割り込みからの入口
    ///
    /// 4つの検出値を両チャネルに反映し、それぞれフィードバックを1ステップ進める。
    /// カウント値オーバーフローは致命的フォールトとして返す。
    pub fn on_samples(&mut self, samples: Samples) -> Result<[Regulation; 2], Fault> {
        self.ch1.state.vsense = samples.vsense1;
        self.ch1.state.isense = samples.isense1;
        self.ch2.state.vsense = samples.vsense2;
        self.ch2.state.isense = samples.isense2;

        let mut outcomes = [Regulation::Idle; 2];
        for (i, id) in [ChannelId::One, ChannelId::Two].into_iter().enumerate() {
            let mut ch = self.parts(id);
            let outcome = feedback::regulate(ch.state);
            if outcome != Regulation::Idle {
                ch.stage.update_duty(ch.pwm, ch.state)?;
            }
            outcomes[i] = outcome;
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{OutputChannel, PwmOutput, TimerId};
    use crate::mock::{MockAdc, MockPin, MockPwm, MockTrigger, PwmCall};

    type TestRegulator = Regulator<MockPwm, MockPin, MockAdc, MockTrigger>;

    fn regulator() -> TestRegulator {
        regulator_with(MockAdc::new())
    }

    fn regulator_with(adc: MockAdc) -> TestRegulator {
        let mut reg = Regulator::new(
            MockPwm::new(),
            MockPin::new(),
            adc,
            MockTrigger::new(),
            &ChannelConfig::buck_boost(),
            &ChannelConfig::buck(),
        );
        reg.init();
        reg.pwm.calls.clear();
        reg
    }

    const CH2_BATTERY: PwmOutput = PwmOutput::new(TimerId::Tim3, OutputChannel::Ch1);
    const CH2_INPUT: PwmOutput = PwmOutput::new(TimerId::Tim3, OutputChannel::Ch3);

    #[test]
    fn test_initial_state() {
        let reg = regulator();
        assert_eq!(reg.get_mode(ChannelId::One), Mode::Disabled);
        assert_eq!(reg.get_mode(ChannelId::Two), Mode::Disabled);
        assert_eq!(reg.get_period(ChannelId::One), 400);
        assert_eq!(reg.get_v_gains(ChannelId::Two), Gains::new(Fixed::ONE, Fixed::ONE));
        assert!(!reg.is_sampling());
    }

    #[test]
    fn test_enable_channel1() {
        let mut reg = regulator();
        reg.set_duty_cycle(ChannelId::One, Fixed::HALF, Fixed::ZERO)
            .unwrap();
        reg.set_mode(ChannelId::One, Mode::ConstantDuty).unwrap();

        assert_eq!(reg.get_mode(ChannelId::One), Mode::ConstantDuty);
        assert!(reg.is_sampling());
        assert!(reg.ch1.stage.sense_enable().high);
        assert_eq!(reg.pwm.compare(BuckBoost::<MockPin>::BUCK), Some(200));
        assert!(reg.pwm.running(TimerId::Tim2));
    }

    #[test]
    fn test_disable_releases_sampling() {
        let mut reg = regulator();
        reg.set_mode(ChannelId::One, Mode::VoltageFeedback).unwrap();
        reg.set_mode(ChannelId::Two, Mode::ConstantDuty).unwrap();
        assert_eq!(reg.sampler.active_channels(), 2);

        reg.set_mode(ChannelId::One, Mode::Disabled).unwrap();
        assert!(reg.is_sampling());
        assert!(!reg.pwm.clocked(TimerId::Tim2));

        reg.set_mode(ChannelId::Two, Mode::Disabled).unwrap();
        assert!(!reg.is_sampling());
        assert_eq!(reg.sampler.active_channels(), 0);
    }

    #[test]
    fn test_mode_change_between_active_modes_keeps_reference() {
        let mut reg = regulator();
        reg.set_mode(ChannelId::Two, Mode::ConstantDuty).unwrap();
        reg.set_mode(ChannelId::Two, Mode::CurrentFeedback).unwrap();
        assert_eq!(reg.sampler.active_channels(), 1);
        // 再構成のみ
        assert_eq!(
            reg.pwm
                .calls
                .iter()
                .filter(|c| **c == PwmCall::EnableClock(TimerId::Tim3))
                .count(),
            1
        );
    }

    #[test]
    fn test_max_power_rejected() {
        let mut reg = regulator();
        assert_eq!(
            reg.set_mode(ChannelId::One, Mode::MaxPower),
            Err(Error::ReservedMode)
        );
        assert_eq!(reg.get_mode(ChannelId::One), Mode::Disabled);
        assert!(reg.pwm.calls.is_empty());
    }

    #[test]
    fn test_configure_fault_leaves_disabled() {
        let mut reg = regulator();
        reg.set_period(ChannelId::One, 0x20000).unwrap();
        reg.set_duty_cycle(ChannelId::One, Fixed::ONE, Fixed::ZERO)
            .unwrap();

        assert_eq!(
            reg.set_mode(ChannelId::One, Mode::VoltageFeedback),
            Err(Error::Configure(Fault::TickOverflow { ticks: 0x20000 }))
        );
        assert_eq!(reg.get_mode(ChannelId::One), Mode::Disabled);
        assert!(!reg.is_sampling());
        assert_eq!(reg.sampler.active_channels(), 0);
        assert!(!reg.pwm.clocked(TimerId::Tim2));
        assert!(!reg.ch1.stage.sense_enable().high);
    }

    #[test]
    fn test_adc_timeout_leaves_disabled() {
        let mut reg = regulator_with(MockAdc::failing());
        assert_eq!(
            reg.set_mode(ChannelId::Two, Mode::ConstantDuty),
            Err(Error::Configure(Fault::AdcTimeout))
        );
        assert_eq!(reg.get_mode(ChannelId::Two), Mode::Disabled);
        assert!(!reg.pwm.clocked(TimerId::Tim3));
        assert_eq!(reg.sampler.active_channels(), 0);
    }

    #[test]
    fn test_phase_offset_fault_leaves_disabled() {
        let mut reg = regulator();
        reg.set_period(ChannelId::One, 0x10).unwrap();
        assert_eq!(
            reg.set_mode(ChannelId::One, Mode::ConstantDuty),
            Err(Error::Configure(Fault::PhaseOffset {
                offset: 0x10,
                period: 0x10
            }))
        );
        assert_eq!(reg.get_mode(ChannelId::One), Mode::Disabled);
    }

    #[test]
    fn test_set_duty_cycle_rejections() {
        let mut reg = regulator();
        assert_eq!(
            reg.set_duty_cycle(ChannelId::One, Fixed::from_bits(0x1000), Fixed::HALF),
            Err(Error::DutyOrder)
        );
        assert_eq!(
            reg.set_duty_cycle(ChannelId::One, Fixed::from_bits(0x10001), Fixed::ZERO),
            Err(Error::DutyOutOfRange)
        );
        assert_eq!(
            reg.set_duty_cycle(ChannelId::One, Fixed::HALF, Fixed::from_bits(-1)),
            Err(Error::DutyOutOfRange)
        );

        reg.set_mode(ChannelId::One, Mode::VoltageFeedback).unwrap();
        assert_eq!(
            reg.set_duty_cycle(ChannelId::One, Fixed::HALF, Fixed::ZERO),
            Err(Error::WrongMode)
        );
        assert_eq!(reg.get_duty_cycle_1(ChannelId::One), Fixed::ZERO);
    }

    #[test]
    fn test_set_duty_cycle_disabled_stores_only() {
        let mut reg = regulator();
        reg.set_duty_cycle(ChannelId::Two, Fixed::HALF, Fixed::from_bits(0x100))
            .unwrap();
        assert_eq!(reg.get_duty_cycle_1(ChannelId::Two), Fixed::HALF);
        assert_eq!(reg.get_duty_cycle_2(ChannelId::Two), Fixed::from_bits(0x100));
        assert!(reg.pwm.calls.is_empty());
    }

    #[test]
    fn test_set_duty_cycle_reconfigures_constant_duty() {
        let mut reg = regulator();
        reg.set_mode(ChannelId::Two, Mode::ConstantDuty).unwrap();
        reg.set_duty_cycle(ChannelId::Two, Fixed::from_bits(0xc000), Fixed::ZERO)
            .unwrap();
        assert_eq!(reg.pwm.compare(CH2_BATTERY), Some(300));
        assert!(reg.pwm.running(TimerId::Tim3));
    }

    #[test]
    fn test_set_duty_cycle_overflow_keeps_previous() {
        let mut reg = regulator();
        reg.set_period(ChannelId::Two, 0x20000).unwrap();
        reg.set_mode(ChannelId::Two, Mode::ConstantDuty).unwrap();
        assert_eq!(
            reg.set_duty_cycle(ChannelId::Two, Fixed::ONE, Fixed::ZERO),
            Err(Error::DutyTicks(Fault::TickOverflow { ticks: 0x20000 }))
        );
        assert_eq!(reg.get_duty_cycle_1(ChannelId::Two), Fixed::ZERO);
        assert_eq!(reg.get_mode(ChannelId::Two), Mode::ConstantDuty);
        assert!(reg.pwm.running(TimerId::Tim3));
    }

    #[test]
    fn test_setpoints_and_limits() {
        let mut reg = regulator();
        reg.set_vsetpoint(ChannelId::One, Fixed::from_int(5)).unwrap();
        assert_eq!(reg.get_vsetpoint(ChannelId::One), Fixed::from_int(5));

        reg.set_vlimit(ChannelId::One, Fixed::from_int(2)).unwrap();
        assert_eq!(reg.get_vlimit(ChannelId::One), Fixed::from_int(2));
        assert_eq!(
            reg.set_vsetpoint(ChannelId::One, Fixed::from_int(3)),
            Err(Error::SetpointOutOfRange)
        );

        reg.set_ilimit(ChannelId::Two, Fixed::ONE).unwrap();
        reg.set_isetpoint(ChannelId::Two, Fixed::HALF).unwrap();
        assert_eq!(reg.get_isetpoint(ChannelId::Two), Fixed::HALF);
        assert_eq!(reg.get_ilimit(ChannelId::Two), Fixed::ONE);
    }

    #[test]
    fn test_ch2_source_only_while_disabled() {
        let mut reg = regulator();
        reg.set_ch2_source(Ch2Source::Input).unwrap();
        assert_eq!(reg.get_ch2_source(), Ch2Source::Input);

        reg.set_duty_cycle(ChannelId::Two, Fixed::HALF, Fixed::ZERO)
            .unwrap();
        reg.set_mode(ChannelId::Two, Mode::ConstantDuty).unwrap();
        assert_eq!(reg.pwm.compare(CH2_INPUT), Some(200));
        assert!(reg.pwm.output_enabled(CH2_INPUT));

        assert_eq!(
            reg.set_ch2_source(Ch2Source::Battery),
            Err(Error::ChannelActive)
        );
        assert_eq!(reg.get_ch2_source(), Ch2Source::Input);
    }

    #[test]
    fn test_period_only_while_disabled() {
        let mut reg = regulator();
        assert_eq!(reg.set_period(ChannelId::One, 0), Err(Error::InvalidPeriod));
        reg.set_period(ChannelId::One, 800).unwrap();
        assert_eq!(reg.get_period(ChannelId::One), 800);

        reg.set_mode(ChannelId::One, Mode::ConstantDuty).unwrap();
        assert_eq!(
            reg.set_period(ChannelId::One, 400),
            Err(Error::ChannelActive)
        );
        assert_eq!(reg.get_period(ChannelId::One), 800);
    }

    #[test]
    fn test_on_samples_dispatches_feedback() {
        let mut reg = regulator();
        reg.set_duty_cycle(ChannelId::One, Fixed::HALF, Fixed::ZERO)
            .unwrap();
        // 5V = 2025 コードポイント
        reg.set_vsetpoint(ChannelId::One, Fixed::from_int(5)).unwrap();
        reg.set_mode(ChannelId::One, Mode::VoltageFeedback).unwrap();
        reg.pwm.calls.clear();

        let outcomes = reg
            .on_samples(Samples::from_injected([1925, 0, 1000, 20]))
            .unwrap();
        assert_eq!(outcomes, [Regulation::Tracking, Regulation::Idle]);
        assert_eq!(
            reg.get_duty_cycle_1(ChannelId::One),
            Fixed::from_bits(0x8000 + 100)
        );
        // (0x8064 * 400) >> 16 = 200
        assert_eq!(reg.pwm.compare(BuckBoost::<MockPin>::BUCK), Some(200));
        assert_eq!(reg.pwm.calls.last(), Some(&PwmCall::Start(TimerId::Tim2)));

        // 無効チャネルも検出値は更新される
        assert_eq!(reg.status(ChannelId::Two).isense, Fixed::from_bits(449));
    }

    #[test]
    fn test_gains_applied_by_on_samples() {
        let mut reg = regulator();
        let gains = Gains::new(Fixed::from_int(3), Fixed::HALF);
        reg.set_v_gains(ChannelId::One, gains);
        reg.set_i_gains(ChannelId::One, Gains::new(Fixed::HALF, Fixed::HALF));
        assert_eq!(reg.get_v_gains(ChannelId::One), gains);
        assert_eq!(reg.get_i_gains(ChannelId::Two), ChannelConfig::buck().i_gains);

        reg.set_duty_cycle(ChannelId::One, Fixed::HALF, Fixed::ZERO)
            .unwrap();
        reg.set_vsetpoint(ChannelId::One, Fixed::from_int(5)).unwrap();
        reg.set_mode(ChannelId::One, Mode::VoltageFeedback).unwrap();

        // 誤差 -100 コードポイント × 比例ゲイン1 = 3
        reg.on_samples(Samples::from_injected([1925, 0, 0, 0]))
            .unwrap();
        assert_eq!(
            reg.get_duty_cycle_1(ChannelId::One),
            Fixed::from_bits(0x8000 + 300)
        );

        // 電流フィードバックでは i_gains を使う
        reg.set_mode(ChannelId::One, Mode::Disabled).unwrap();
        reg.set_duty_cycle(ChannelId::One, Fixed::HALF, Fixed::ZERO)
            .unwrap();
        reg.set_ilimit(ChannelId::One, Fixed::ONE).unwrap();
        reg.set_isetpoint(ChannelId::One, Fixed::ONE).unwrap();
        reg.set_mode(ChannelId::One, Mode::CurrentFeedback).unwrap();
        // 1A = 620 コードポイント、検出 420 → 誤差 -200 × 0.5
        reg.on_samples(Samples::from_injected([0, 420, 0, 0])).unwrap();
        assert_eq!(
            reg.get_duty_cycle_1(ChannelId::One),
            Fixed::from_bits(0x8000 + 100)
        );
    }

    #[test]
    fn test_on_samples_over_limit() {
        let mut reg = regulator();
        reg.set_duty_cycle(ChannelId::Two, Fixed::HALF, Fixed::ZERO)
            .unwrap();
        reg.set_isetpoint(ChannelId::Two, Fixed::ZERO).unwrap();
        reg.set_vlimit(ChannelId::Two, Fixed::ONE).unwrap();
        reg.set_mode(ChannelId::Two, Mode::CurrentFeedback).unwrap();

        let outcomes = reg
            .on_samples(Samples::from_injected([0, 0, 406, 0]))
            .unwrap();
        assert_eq!(outcomes[1], Regulation::Limited);
        assert_eq!(reg.get_duty_cycle_1(ChannelId::Two), Fixed::from_bits(0x4000));
        assert_eq!(reg.pwm.compare(CH2_BATTERY), Some(100));
    }

    #[test]
    fn test_on_samples_overflow_is_fatal() {
        let mut reg = regulator();
        reg.set_period(ChannelId::Two, 0x20000).unwrap();
        reg.set_duty_cycle(ChannelId::Two, Fixed::from_bits(0x4000), Fixed::ZERO)
            .unwrap();
        // 100V = 40500 コードポイント
        reg.set_vsetpoint(ChannelId::Two, Fixed::from_int(100)).unwrap();
        reg.set_mode(ChannelId::Two, Mode::VoltageFeedback).unwrap();

        // duty1 = 0x4000 + 40500 → (56884 * 0x20000) >> 16 = 113768
        let result = reg.on_samples(Samples::from_injected([0, 0, 0, 0]));
        assert_eq!(result, Err(Fault::TickOverflow { ticks: 113_768 }));
    }
}
