//! テスト用の記録モック
//!
//! ドライバ呼び出しを順に記録し、最終的なレジスタ相当の状態も保持します。

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};

use crate::hal::{
    AdcSampler, AdcTimeout, MasterMode, Polarity, PwmDriver, PwmOutput, SlaveTrigger,
    TimerId, TriggerTimer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmCall {
    EnableClock(TimerId),
    DisableClock(TimerId),
    ConfigureOutput {
        output: PwmOutput,
        period: u32,
        polarity: Polarity,
        ticks: u16,
    },
    SetCompare(PwmOutput, u16),
    EnableOutput(PwmOutput),
    DisableOutput(PwmOutput),
    SetPeriod(TimerId, u32),
    Update(TimerId),
    Start(TimerId),
    Stop(TimerId),
    MasterMode(TimerId, MasterMode),
    SlaveTrigger(TimerId, SlaveTrigger),
}

#[derive(Debug, Clone, Copy, Default)]
struct TimerModel {
    clocked: bool,
    running: bool,
    period: Option<u32>,
    compare: [Option<u16>; 4],
    output: [bool; 4],
    master: Option<MasterMode>,
    gate: Option<SlaveTrigger>,
}

#[derive(Debug, Default)]
pub struct MockPwm {
    pub calls: Vec<PwmCall>,
    timers: [TimerModel; 3],
}

/// STM32G4 の TIM3/TIM4 内部トリガー接続
fn itr_source(trigger: SlaveTrigger) -> Option<TimerId> {
    match trigger {
        SlaveTrigger::Itr1 => Some(TimerId::Tim2),
        SlaveTrigger::Itr2 => Some(TimerId::Tim3),
        SlaveTrigger::Itr0 | SlaveTrigger::Itr3 => None,
    }
}

fn timer_index(timer: TimerId) -> usize {
    match timer {
        TimerId::Tim2 => 0,
        TimerId::Tim3 => 1,
        TimerId::Tim4 => 2,
    }
}

impl MockPwm {
    pub fn new() -> Self {
        Self::default()
    }

    fn timer(&mut self, timer: TimerId) -> &mut TimerModel {
        &mut self.timers[timer_index(timer)]
    }

    pub fn compare(&self, output: PwmOutput) -> Option<u16> {
        self.timers[timer_index(output.timer)].compare[output.channel.index()]
    }

    pub fn period(&self, timer: TimerId) -> Option<u32> {
        self.timers[timer_index(timer)].period
    }

    pub fn clocked(&self, timer: TimerId) -> bool {
        self.timers[timer_index(timer)].clocked
    }

    pub fn running(&self, timer: TimerId) -> bool {
        self.timers[timer_index(timer)].running
    }

    /// カウンタが実際に進んでいるか（ゲートスレーブはマスターに従う）
    pub fn counting(&self, timer: TimerId) -> bool {
        let t = &self.timers[timer_index(timer)];
        match t.gate.and_then(itr_source) {
            Some(master) => {
                let m = &self.timers[timer_index(master)];
                m.running && m.master == Some(MasterMode::Enable)
            }
            None => t.running,
        }
    }

    pub fn output_enabled(&self, output: PwmOutput) -> bool {
        self.timers[timer_index(output.timer)].output[output.channel.index()]
    }
}

impl PwmDriver for MockPwm {
    fn enable_clock(&mut self, timer: TimerId) {
        self.calls.push(PwmCall::EnableClock(timer));
        self.timer(timer).clocked = true;
    }

    fn disable_clock(&mut self, timer: TimerId) {
        self.calls.push(PwmCall::DisableClock(timer));
        self.timer(timer).clocked = false;
    }

    fn configure_output(
        &mut self,
        output: PwmOutput,
        period_ticks: u32,
        polarity: Polarity,
        initial_ticks: u16,
    ) {
        self.calls.push(PwmCall::ConfigureOutput {
            output,
            period: period_ticks,
            polarity,
            ticks: initial_ticks,
        });
        // タイマーリセット相当
        let t = self.timer(output.timer);
        *t = TimerModel {
            clocked: t.clocked,
            ..TimerModel::default()
        };
        t.period = Some(period_ticks);
        t.compare[output.channel.index()] = Some(initial_ticks);
    }

    fn set_compare(&mut self, output: PwmOutput, ticks: u16) {
        self.calls.push(PwmCall::SetCompare(output, ticks));
        self.timer(output.timer).compare[output.channel.index()] = Some(ticks);
    }

    fn enable_output(&mut self, output: PwmOutput) {
        self.calls.push(PwmCall::EnableOutput(output));
        self.timer(output.timer).output[output.channel.index()] = true;
    }

    fn disable_output(&mut self, output: PwmOutput) {
        self.calls.push(PwmCall::DisableOutput(output));
        self.timer(output.timer).output[output.channel.index()] = false;
    }

    fn set_period(&mut self, timer: TimerId, period_ticks: u32) {
        self.calls.push(PwmCall::SetPeriod(timer, period_ticks));
        self.timer(timer).period = Some(period_ticks);
    }

    fn generate_update(&mut self, timer: TimerId) {
        self.calls.push(PwmCall::Update(timer));
    }

    fn start(&mut self, timer: TimerId) {
        self.calls.push(PwmCall::Start(timer));
        self.timer(timer).running = true;
    }

    fn stop(&mut self, timer: TimerId) {
        self.calls.push(PwmCall::Stop(timer));
        self.timer(timer).running = false;
    }

    fn set_master_mode(&mut self, timer: TimerId, mode: MasterMode) {
        self.calls.push(PwmCall::MasterMode(timer, mode));
        self.timer(timer).master = Some(mode);
    }

    fn set_slave_trigger(&mut self, timer: TimerId, trigger: SlaveTrigger) {
        self.calls.push(PwmCall::SlaveTrigger(timer, trigger));
        self.timer(timer).gate = Some(trigger);
    }
}

#[derive(Debug, Default)]
pub struct MockAdc {
    pub sequence: Vec<u8>,
    pub scan: bool,
    pub interrupt: bool,
    pub powered: bool,
    pub power_ons: u32,
    fail: bool,
}

impl MockAdc {
    pub fn new() -> Self {
        Self::default()
    }

    /// レディにならないADC
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl AdcSampler for MockAdc {
    fn configure_injected_sequence(&mut self, channels: &[u8]) {
        self.sequence = channels.to_vec();
    }

    fn enable_scan(&mut self) {
        self.scan = true;
    }

    fn enable_conversion_interrupt(&mut self) {
        self.interrupt = true;
    }

    fn power_on(&mut self) -> Result<(), AdcTimeout> {
        self.power_ons += 1;
        if self.fail {
            return Err(AdcTimeout);
        }
        self.powered = true;
        Ok(())
    }

    fn power_off(&mut self) {
        self.interrupt = false;
        self.powered = false;
    }
}

#[derive(Debug, Default)]
pub struct MockTrigger {
    pub rate: Option<u32>,
    pub running: bool,
}

impl MockTrigger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TriggerTimer for MockTrigger {
    fn set_rate(&mut self, hz: u32) {
        self.rate = Some(hz);
    }

    fn start(&mut self) {
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }
}

#[derive(Debug, Default)]
pub struct MockPin {
    pub high: bool,
    fail: bool,
}

impl MockPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            high: false,
            fail: true,
        }
    }
}

impl ErrorType for MockPin {
    type Error = ErrorKind;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if self.fail {
            return Err(ErrorKind::Other);
        }
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if self.fail {
            return Err(ErrorKind::Other);
        }
        self.high = true;
        Ok(())
    }
}
