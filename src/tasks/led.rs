//! LED制御タスク
//!
//! 動作状態を点滅周期で表示します。
//! - 全チャネル停止: 1秒周期でゆっくり点滅
//! - いずれかのチャネルが動作中: 200ms周期で点滅

use embassy_stm32::gpio::Output;
use embassy_time::{Duration, Timer};

use crate::state;

const IDLE_HALF_PERIOD: Duration = Duration::from_millis(500);
const ACTIVE_HALF_PERIOD: Duration = Duration::from_millis(100);

/// LED制御タスク（LEDはアクティブロー）
#[embassy_executor::task]
pub async fn led_task(mut led: Output<'static>) {
    info!("LED task started");

    loop {
        let active = state::with_regulator(|reg| reg.is_sampling()).unwrap_or(false);
        let half_period = if active {
            ACTIVE_HALF_PERIOD
        } else {
            IDLE_HALF_PERIOD
        };

        led.set_low();
        Timer::after(half_period).await;
        led.set_high();
        Timer::after(half_period).await;
    }
}
