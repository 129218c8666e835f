//! グローバル共有状態管理
//!
//! レギュレータはサンプル割り込み（ADC1_2）と制御タスクの両方から操作されるため、
//! クリティカルセクションで保護したブロッキングMutexに格納します。

use core::cell::RefCell;

use embassy_stm32::gpio::Output;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;

use g4_regulator::{ChannelId, Regulation, Regulator};

use crate::pwm_tim::TimPwm;
use crate::sample_adc::{SampleAdc, TriggerTim};

/// このボードのレギュレータ型
pub type BoardRegulator = Regulator<TimPwm, Output<'static>, SampleAdc, TriggerTim>;

/// レギュレータ本体（初期化前は None）
pub static REGULATOR: Mutex<CriticalSectionRawMutex, RefCell<Option<BoardRegulator>>> =
    Mutex::new(RefCell::new(None));

/// 保護動作（リミット超過・出力崩壊）の通知（割り込み → ステータスタスク）
pub static PROTECTION: Signal<CriticalSectionRawMutex, (ChannelId, Regulation)> = Signal::new();

/// レギュレータをロックして操作する。未初期化なら None
pub fn with_regulator<R>(f: impl FnOnce(&mut BoardRegulator) -> R) -> Option<R> {
    REGULATOR.lock(|cell| cell.borrow_mut().as_mut().map(f))
}

/// 初期化済みレギュレータを登録
pub fn install(regulator: BoardRegulator) {
    REGULATOR.lock(|cell| {
        cell.replace(Some(regulator));
    });
}
