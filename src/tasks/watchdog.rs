//! ウォッチドッグタスク
//!
//! 致命的フォールトでコアが停止した場合、キックが止まりIWDGがMCUをリセットします。

use embassy_stm32::peripherals::IWDG;
use embassy_stm32::wdg::IndependentWatchdog;
use embassy_time::{Duration, Ticker};

use g4_regulator::config::watchdog::PET_PERIOD_MS;

#[embassy_executor::task]
pub async fn watchdog_task(mut wdg: IndependentWatchdog<'static, IWDG>) {
    info!("Watchdog task started");

    let mut ticker = Ticker::every(Duration::from_millis(PET_PERIOD_MS));
    loop {
        wdg.pet();
        ticker.next().await;
    }
}
