//! 共有サンプリングペリフェラルのライフサイクル管理
//!
//! ADC（インジェクテッド変換）とトリガータイマーは両チャネルで共有されます。
//! どちらかのチャネルが動作中ならサンプリングを有効化し、両方停止したら
//! ADCの電源・クロックとトリガータイマーを落とします。

use crate::config::sampling::{INJECTED_SEQUENCE, SAMPLE_RATE_HZ};
use crate::error::Fault;
use crate::hal::{AdcSampler, TriggerTimer};

/// ADC + トリガータイマーの参照カウント付き所有者
pub struct SharedSampler<A, T> {
    adc: A,
    trigger: T,
    /// サンプリングを必要とするチャネル数
    active: u8,
    running: bool,
}

impl<A: AdcSampler, T: TriggerTimer> SharedSampler<A, T> {
    pub fn new(adc: A, trigger: T) -> Self {
        Self {
            adc,
            trigger,
            active: 0,
            running: false,
        }
    }

    /// チャネルが動作を開始する
    ///
    /// ADCが起動しなかった場合は参照を戻してから [`Fault::AdcTimeout`] を返す。
    pub fn acquire(&mut self) -> Result<(), Fault> {
        self.active = self.active.saturating_add(1);
        if let Err(fault) = self.apply() {
            self.active -= 1;
            // 他チャネルが使っていなければ電源を落とした状態に戻す
            if self.active == 0 {
                self.power_down();
            }
            return Err(fault);
        }
        Ok(())
    }

    /// チャネルが動作を終了する
    pub fn release(&mut self) {
        if self.active == 0 {
            warn!("Sampler release without matching acquire");
            return;
        }
        self.active -= 1;
        // 停止方向は失敗しない
        let _ = self.apply();
    }

    /// 現在の参照数からペリフェラル状態を再計算する（冪等）
    pub fn apply(&mut self) -> Result<(), Fault> {
        if self.active == 0 {
            self.power_down();
            Ok(())
        } else {
            self.power_up()
        }
    }

    /// 全停止（初期化時）
    pub fn power_down(&mut self) {
        if self.running {
            info!("Sampling stopped");
        }
        self.adc.power_off();
        self.trigger.stop();
        self.running = false;
    }

    fn power_up(&mut self) -> Result<(), Fault> {
        self.adc.configure_injected_sequence(&INJECTED_SEQUENCE);
        self.adc.enable_scan();
        self.adc.enable_conversion_interrupt();
        if self.adc.power_on().is_err() {
            error!("ADC did not become ready");
            return Err(Fault::AdcTimeout);
        }

        self.trigger.set_rate(SAMPLE_RATE_HZ);
        self.trigger.start();

        if !self.running {
            info!(
                "Sampling started: {} Hz, {} channel(s) active",
                SAMPLE_RATE_HZ, self.active
            );
        }
        self.running = true;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn active_channels(&self) -> u8 {
        self.active
    }

    #[cfg(test)]
    pub(crate) fn parts(&self) -> (&A, &T) {
        (&self.adc, &self.trigger)
    }
}
