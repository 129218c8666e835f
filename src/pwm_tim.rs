//! TIM2/TIM3/TIM4 によるPWMドライバ（PAC直接操作）
//!
//! ## ハードウェア構成
//! - クロック: 170MHz (APB1) → PSC=84 で 2MHz カウント
//! - センターアライン（CMS=3）、ARR/CCRプリロード有効
//! - TIM2 は32ビットタイマーだが、周期・比較値は16ビットの範囲でのみ使う。
//!   ARR/CCR は常にレジスタ全体を書き込み、上位ビットを0にする
//!
//! TIM2とTIM3/TIM4のレジスタ配置は共通なので、すべて16ビット汎用タイマーの
//! ビューとして操作する。

use embassy_stm32::pac;
use embassy_stm32::pac::timer::{vals, TimGp16};

use g4_regulator::config::pwm::TIMER_TICK_HZ;
use g4_regulator::hal::{MasterMode, Polarity, PwmDriver, PwmOutput, SlaveTrigger, TimerId};

/// APB1タイマークロック [Hz]
const TIMER_CLOCK_HZ: u32 = 170_000_000;

/// 2MHzカウントのためのプリスケーラ値（PSC = 84）
const PRESCALER: u16 = (TIMER_CLOCK_HZ / TIMER_TICK_HZ - 1) as u16;

fn regs(timer: TimerId) -> TimGp16 {
    let ptr = match timer {
        TimerId::Tim2 => pac::TIM2.as_ptr(),
        TimerId::Tim3 => pac::TIM3.as_ptr(),
        TimerId::Tim4 => pac::TIM4.as_ptr(),
    };
    // SAFETY: TIM2..TIM4 は汎用タイマーのレジスタ配置を共有する
    unsafe { TimGp16::from_ptr(ptr) }
}

/// PWMタイマードライバ
///
/// インスタンスは1つだけ作ること（TIM2..TIM4のレジスタを専有する）。
pub struct TimPwm {
    _private: (),
}

impl TimPwm {
    /// # Safety
    /// TIM2..TIM4 を他で使っていないこと
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl PwmDriver for TimPwm {
    fn enable_clock(&mut self, timer: TimerId) {
        pac::RCC.apb1enr1().modify(|w| match timer {
            TimerId::Tim2 => w.set_tim2en(true),
            TimerId::Tim3 => w.set_tim3en(true),
            TimerId::Tim4 => w.set_tim4en(true),
        });
    }

    fn disable_clock(&mut self, timer: TimerId) {
        pac::RCC.apb1enr1().modify(|w| match timer {
            TimerId::Tim2 => w.set_tim2en(false),
            TimerId::Tim3 => w.set_tim3en(false),
            TimerId::Tim4 => w.set_tim4en(false),
        });
    }

    fn configure_output(
        &mut self,
        output: PwmOutput,
        period_ticks: u32,
        polarity: Polarity,
        initial_ticks: u16,
    ) {
        let tim = regs(output.timer);
        let ch = output.channel.index();

        // 1. タイマーリセット相当（停止、モード・スレーブ設定クリア）
        tim.cr1().write(|w| w.set_cen(false));
        tim.cr2().write(|w| w.set_mms(vals::Mms::RESET));
        tim.smcr().write(|_| {});
        tim.dier().write(|_| {});
        tim.ccer().write(|_| {});
        tim.cnt().write_value(pac::timer::regs::CntCore(0));
        tim.arr().write(|w| w.set_arr(0));
        tim.sr().write(|w| w.0 = 0);

        // 2. 出力比較: PWMモード1/2、プリロード有効
        let ocm = match polarity {
            Polarity::ActiveHigh => vals::Ocm::PWM_MODE1,
            Polarity::ActiveLow => vals::Ocm::PWM_MODE2,
        };
        tim.ccmr_output(ch / 2).modify(|w| {
            w.set_ocm(ch % 2, ocm);
            w.set_ocpe(ch % 2, true);
        });
        tim.ccr(ch).write(|w| w.set_ccr(initial_ticks));

        // 3. センターアライン、ARRプリロード
        tim.cr1().modify(|w| {
            w.set_cms(vals::Cms::CENTER_ALIGNED3);
            w.set_dir(vals::Dir::UP);
            w.set_arpe(true);
        });
        tim.psc().write_value(PRESCALER);
        self.set_period(output.timer, period_ticks);

        // 4. 更新イベントで ARR/CCR/PSC を反映
        tim.egr().write(|w| w.set_ug(true));
    }

    fn set_compare(&mut self, output: PwmOutput, ticks: u16) {
        regs(output.timer)
            .ccr(output.channel.index())
            .write(|w| w.set_ccr(ticks));
    }

    fn enable_output(&mut self, output: PwmOutput) {
        regs(output.timer)
            .ccer()
            .modify(|w| w.set_cce(output.channel.index(), true));
    }

    fn disable_output(&mut self, output: PwmOutput) {
        regs(output.timer)
            .ccer()
            .modify(|w| w.set_cce(output.channel.index(), false));
    }

    fn set_period(&mut self, timer: TimerId, period_ticks: u32) {
        let arr = match u16::try_from(period_ticks) {
            Ok(arr) => arr,
            Err(_) => {
                warn!("{}: period {} exceeds 16 bits, saturated", timer, period_ticks);
                u16::MAX
            }
        };
        // 全体書き込み: TIM2 は32ビットで ARR のリセット値が 0xFFFF_FFFF のため、
        // modify だと上位16ビットが残る
        regs(timer).arr().write(|w| w.set_arr(arr));
    }

    fn generate_update(&mut self, timer: TimerId) {
        regs(timer).egr().write(|w| w.set_ug(true));
    }

    fn start(&mut self, timer: TimerId) {
        regs(timer).cr1().modify(|w| w.set_cen(true));
    }

    fn stop(&mut self, timer: TimerId) {
        regs(timer).cr1().modify(|w| w.set_cen(false));
    }

    fn set_master_mode(&mut self, timer: TimerId, mode: MasterMode) {
        let mms = match mode {
            MasterMode::Reset => vals::Mms::RESET,
            MasterMode::Enable => vals::Mms::ENABLE,
        };
        regs(timer).cr2().modify(|w| w.set_mms(mms));
    }

    fn set_slave_trigger(&mut self, timer: TimerId, trigger: SlaveTrigger) {
        let ts = match trigger {
            SlaveTrigger::Itr0 => vals::Ts::ITR0,
            SlaveTrigger::Itr1 => vals::Ts::ITR1,
            SlaveTrigger::Itr2 => vals::Ts::ITR2,
            SlaveTrigger::Itr3 => vals::Ts::ITR3,
        };
        // SMS = GATED: トリガー入力がハイの間だけカウント
        regs(timer).smcr().modify(|w| {
            w.set_ts(ts);
            w.set_sms(vals::Sms::GATED_MODE);
        });
    }
}
