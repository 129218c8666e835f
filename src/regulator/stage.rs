//! パワーステージ（チャネル固有のハードウェア操作）
//!
//! - [`BuckBoost`]: チャネル1。TIM2 CH3（降圧）がマスター、TIM4 CH3（昇圧）が
//!   ITR1でトリガーされるスレーブ。出力電圧検出用の分圧器をGPIOで有効化する。
//! - [`Buck`]: チャネル2。TIM3のCH1（バッテリー）またはCH3（入力）を使う。

use embedded_hal::digital::OutputPin;

use crate::config::pwm::PHASE_OFFSET_TICKS;
use crate::error::Fault;
use crate::hal::{OutputChannel, Polarity, PwmDriver, PwmOutput, SlaveTrigger, TimerId};
use crate::pwm;

use super::mode::{Ch2Source, ChannelState};

/// チャネル種別ごとの操作
pub trait PowerStage<P: PwmDriver> {
    /// クロック供給など、構成前の準備
    fn enable(&mut self, pwm: &mut P) -> Result<(), Fault>;

    /// 現在のデューティ比でPWMを構成して出力を開始する
    fn configure(&mut self, pwm: &mut P, state: &ChannelState) -> Result<(), Fault>;

    /// PWM出力を止めてクロックを落とす
    fn disable(&mut self, pwm: &mut P);

    /// フィードバックで更新されたデューティ比を反映する
    fn update_duty(&mut self, pwm: &mut P, state: &ChannelState) -> Result<(), Fault>;
}

/// チャネル1: 昇降圧
pub struct BuckBoost<S> {
    /// 出力電圧検出分圧器の有効化ピン（PA5）
    sense_enable: S,
}

impl<S: OutputPin> BuckBoost<S> {
    pub const BUCK: PwmOutput = PwmOutput::new(TimerId::Tim2, OutputChannel::Ch3);
    pub const BOOST: PwmOutput = PwmOutput::new(TimerId::Tim4, OutputChannel::Ch3);
    /// TIM4のITR1 = TIM2 TRGO
    pub const TRIGGER: SlaveTrigger = SlaveTrigger::Itr1;

    pub fn new(sense_enable: S) -> Self {
        Self { sense_enable }
    }

    #[cfg(test)]
    pub(crate) fn sense_enable(&self) -> &S {
        &self.sense_enable
    }
}

impl<P: PwmDriver, S: OutputPin> PowerStage<P> for BuckBoost<S> {
    fn enable(&mut self, pwm: &mut P) -> Result<(), Fault> {
        self.sense_enable.set_high().map_err(|_| Fault::SensePin)?;
        pwm.enable_clock(Self::BUCK.timer);
        pwm.enable_clock(Self::BOOST.timer);
        Ok(())
    }

    fn configure(&mut self, pwm: &mut P, state: &ChannelState) -> Result<(), Fault> {
        let ta = pwm::duty_ticks(state.duty1, state.period)?;
        let tb = pwm::duty_ticks(state.duty2, state.period)?;
        pwm::configure_dual(
            pwm,
            Self::BUCK,
            Self::BOOST,
            Self::TRIGGER,
            state.period,
            ta,
            tb,
            PHASE_OFFSET_TICKS,
        )?;
        // スレーブ（TIM4）はマスターのCENでゲートされる
        pwm.start(Self::BUCK.timer);
        Ok(())
    }

    fn disable(&mut self, pwm: &mut P) {
        pwm.disable_output(Self::BUCK);
        pwm.disable_output(Self::BOOST);
        pwm.stop(Self::BUCK.timer);
        pwm.stop(Self::BOOST.timer);
        pwm.disable_clock(Self::BUCK.timer);
        pwm.disable_clock(Self::BOOST.timer);
        if self.sense_enable.set_low().is_err() {
            warn!("Failed to release vsense divider");
        }
    }

    fn update_duty(&mut self, pwm: &mut P, state: &ChannelState) -> Result<(), Fault> {
        let ta = pwm::duty_ticks(state.duty1, state.period)?;
        let tb = pwm::duty_ticks(state.duty2, state.period)?;

        // マスターを止めるとゲートスレーブも止まり、位相を保ったまま両方を書き換えられる
        pwm.stop(Self::BUCK.timer);
        pwm.set_compare(Self::BUCK, ta);
        pwm.set_compare(Self::BOOST, tb);
        pwm.start(Self::BUCK.timer);
        Ok(())
    }
}

/// チャネル2: 降圧
pub struct Buck {
    source: Ch2Source,
}

impl Buck {
    pub const TIMER: TimerId = TimerId::Tim3;

    pub const fn new(source: Ch2Source) -> Self {
        Self { source }
    }

    /// 出力先の切替。反映は次の構成時
    pub fn set_source(&mut self, source: Ch2Source) {
        self.source = source;
    }

    pub fn source(&self) -> Ch2Source {
        self.source
    }

    pub const fn output(&self) -> PwmOutput {
        match self.source {
            Ch2Source::Battery => PwmOutput::new(Self::TIMER, OutputChannel::Ch1),
            Ch2Source::Input => PwmOutput::new(Self::TIMER, OutputChannel::Ch3),
        }
    }
}

impl<P: PwmDriver> PowerStage<P> for Buck {
    fn enable(&mut self, pwm: &mut P) -> Result<(), Fault> {
        pwm.enable_clock(Self::TIMER);
        Ok(())
    }

    fn configure(&mut self, pwm: &mut P, state: &ChannelState) -> Result<(), Fault> {
        let t = pwm::duty_ticks(state.duty1, state.period)?;
        pwm::configure_single(pwm, self.output(), state.period, Polarity::ActiveHigh, t);
        pwm.start(Self::TIMER);
        Ok(())
    }

    fn disable(&mut self, pwm: &mut P) {
        // ソース切替後でも両方止める
        pwm.disable_output(PwmOutput::new(Self::TIMER, OutputChannel::Ch1));
        pwm.disable_output(PwmOutput::new(Self::TIMER, OutputChannel::Ch3));
        pwm.stop(Self::TIMER);
        pwm.disable_clock(Self::TIMER);
    }

    fn update_duty(&mut self, pwm: &mut P, state: &ChannelState) -> Result<(), Fault> {
        pwm::set_duty(pwm, self.output(), state.period, state.duty1)
    }
}
