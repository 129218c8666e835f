//! ADC1 インジェクテッド変換 + TIM6 トリガー（PAC直接操作）
//!
//! ## 動作
//! 1. TIM6 が 1kHz で更新イベントを出し、TRGO を ADC1 のインジェクテッドトリガー
//!    （JEXTSEL = 14: TIM6_TRGO）に供給する
//! 2. ADC1 が 4チャネル（ch1 V/I、ch2 V/I）を順に変換
//! 3. シーケンス完了（JEOS）で ADC1_2 割り込み → [`Regulator::on_samples`]
//!
//! [`Regulator::on_samples`]: g4_regulator::Regulator::on_samples

use embassy_stm32::pac;
use embassy_stm32::pac::adc::vals;

use g4_regulator::config::sampling::ADC_READY_SPINS;
use g4_regulator::hal::{AdcSampler, AdcTimeout, TriggerTimer};
use g4_regulator::{ChannelId, Regulation, Samples};

use crate::state;

/// TIM6_TRGO（ADC12 インジェクテッド外部トリガー）
const JEXTSEL_TIM6_TRGO: u8 = 14;

/// サンプリング時間（24.5サイクル）
const SAMPLE_TIME: vals::SampleTime = vals::SampleTime::CYCLES24_5;

/// 内部電圧レギュレータ起動待ち（20μs @ 170MHz）
const ADVREG_STARTUP_CYCLES: u32 = 170 * 20;

/// TIM6 カウントクロック [Hz]（170MHz ÷ 170）
const TRIGGER_TICK_HZ: u32 = 1_000_000;

/// ADC1 インジェクテッド変換ドライバ
pub struct SampleAdc {
    _private: (),
}

impl SampleAdc {
    /// # Safety
    /// ADC1/ADC12_COMMON を他で使っていないこと
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }

    fn wait_for(mut done: impl FnMut() -> bool) -> Result<(), AdcTimeout> {
        for _ in 0..ADC_READY_SPINS {
            if done() {
                return Ok(());
            }
        }
        Err(AdcTimeout)
    }
}

impl AdcSampler for SampleAdc {
    fn configure_injected_sequence(&mut self, channels: &[u8]) {
        let adc = pac::ADC1;
        pac::RCC.ahb2enr().modify(|w| w.set_adc12en(true));

        // JSQR は ADC 停止中でも書き込める（JADSTART = 0）
        adc.jsqr().write(|w| {
            w.set_jl((channels.len().max(1) - 1) as u8);
            for (i, &ch) in channels.iter().take(4).enumerate() {
                w.set_jsq(i, ch);
            }
            w.set_jextsel(JEXTSEL_TIM6_TRGO);
            w.set_jexten(vals::Exten::RISING_EDGE);
        });

        for &ch in channels {
            let ch = ch as usize;
            if ch < 10 {
                adc.smpr().modify(|w| w.set_smp(ch, SAMPLE_TIME));
            } else {
                adc.smpr2().modify(|w| w.set_smp(ch - 10, SAMPLE_TIME));
            }
        }
    }

    fn enable_scan(&mut self) {
        // インジェクテッドシーケンスは JL に従って常にスキャンされる。
        // 不連続モードと自動インジェクションを明示的に無効化しておく
        pac::ADC1.cfgr().modify(|w| {
            w.set_jdiscen(false);
            w.set_jauto(false);
        });
    }

    fn enable_conversion_interrupt(&mut self) {
        let adc = pac::ADC1;
        adc.isr().write(|w| w.set_jeos(true)); // フラグクリア（1書き込み）
        adc.ier().modify(|w| w.set_jeosie(true));
        unsafe {
            cortex_m::peripheral::NVIC::unmask(pac::Interrupt::ADC1_2);
        }
    }

    fn power_on(&mut self) -> Result<(), AdcTimeout> {
        let adc = pac::ADC1;
        if adc.cr().read().aden() {
            // 既に起動済み（他チャネルが使用中）
            return Ok(());
        }

        // 1. ディープパワーダウン解除、内部レギュレータ起動
        adc.cr().modify(|w| {
            w.set_deeppwd(false);
            w.set_advregen(true);
        });
        cortex_m::asm::delay(ADVREG_STARTUP_CYCLES);

        // 2. キャリブレーション（シングルエンド）
        adc.cr().modify(|w| w.set_adcal(true));
        Self::wait_for(|| !adc.cr().read().adcal())?;

        // 3. 有効化してレディ待ち
        adc.isr().write(|w| w.set_adrdy(true));
        adc.cr().modify(|w| w.set_aden(true));
        Self::wait_for(|| adc.isr().read().adrdy())?;
        adc.isr().write(|w| w.set_adrdy(true));

        // 4. インジェクテッド変換をトリガー待ちで開始
        adc.cr().modify(|w| w.set_jadstart(true));
        Ok(())
    }

    fn power_off(&mut self) {
        let adc = pac::ADC1;
        cortex_m::peripheral::NVIC::mask(pac::Interrupt::ADC1_2);
        adc.ier().modify(|w| w.set_jeosie(false));

        if adc.cr().read().aden() {
            adc.cr().modify(|w| w.set_jadstp(true));
            // 停止・無効化は短時間で完了する。待ちきれなくても電源断に進む
            let _ = Self::wait_for(|| !adc.cr().read().jadstart());
            adc.cr().modify(|w| w.set_addis(true));
            let _ = Self::wait_for(|| !adc.cr().read().aden());
        }

        adc.cr().modify(|w| {
            w.set_advregen(false);
            w.set_deeppwd(true);
        });
        pac::RCC.ahb2enr().modify(|w| w.set_adc12en(false));
    }
}

/// TIM6 によるADCトリガー
pub struct TriggerTim {
    _private: (),
}

impl TriggerTim {
    /// # Safety
    /// TIM6 を他で使っていないこと
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl TriggerTimer for TriggerTim {
    fn set_rate(&mut self, hz: u32) {
        let tim = pac::TIM6;
        pac::RCC.apb1enr1().modify(|w| w.set_tim6en(true));

        tim.cr1().write(|w| w.set_cen(false));
        tim.psc().write_value((170_000_000 / TRIGGER_TICK_HZ - 1) as u16);
        let arr = (TRIGGER_TICK_HZ / hz.max(1)).clamp(1, 0x1_0000) - 1;
        tim.arr().modify(|w| w.set_arr(arr as u16));
        // 更新イベントごとに TRGO
        tim.cr2().modify(|w| w.set_mms(pac::timer::vals::Mms::UPDATE));
        tim.egr().write(|w| w.set_ug(true));
    }

    fn start(&mut self) {
        pac::TIM6.cr1().modify(|w| w.set_cen(true));
    }

    fn stop(&mut self) {
        pac::TIM6.cr1().modify(|w| w.set_cen(false));
        pac::RCC.apb1enr1().modify(|w| w.set_tim6en(false));
    }
}

/// 最新のインジェクテッド変換結果（JDR1..JDR4）
fn read_samples() -> Samples {
    let adc = pac::ADC1;
    let mut data = [0u16; 4];
    for (i, d) in data.iter_mut().enumerate() {
        *d = adc.jdr(i).read().jdata();
    }
    Samples::from_injected(data)
}

/// ADC1_2 割り込みハンドラー（インジェクテッドシーケンス完了）
///
/// # Safety
/// 割り込みコンテキストで実行される。処理はロック内で完結し、待ちを含まない
#[no_mangle]
pub unsafe extern "C" fn ADC1_2() {
    let adc = pac::ADC1;
    if !adc.isr().read().jeos() {
        return;
    }
    adc.isr().write(|w| w.set_jeos(true)); // フラグクリア

    let samples = read_samples();
    let result = state::with_regulator(|reg| reg.on_samples(samples));

    match result {
        Some(Ok(outcomes)) => {
            for (id, outcome) in [ChannelId::One, ChannelId::Two].into_iter().zip(outcomes) {
                if matches!(outcome, Regulation::Limited | Regulation::Collapsed) {
                    state::PROTECTION.signal((id, outcome));
                }
            }
        }
        Some(Err(fault)) => fatal(fault),
        None => {}
    }
}

/// 致命的フォールト: 停止してウォッチドッグリセットを待つ
fn fatal(fault: g4_regulator::Fault) -> ! {
    error!("FATAL: {}", fault);
    panic!("fatal regulator fault");
}
