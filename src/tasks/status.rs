//! ステータス監視タスク
//!
//! 一定周期で両チャネルの状態をログ出力し、割り込みから通知された
//! 保護動作（リミット超過・出力崩壊）を割り込み外でログに残します。

use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Ticker};

use g4_regulator::config::STATUS_PERIOD_MS;
use g4_regulator::{ChannelId, Regulation};

use crate::state::{self, PROTECTION};

#[embassy_executor::task]
pub async fn status_task() {
    info!("Status task started");

    let mut ticker = Ticker::every(Duration::from_millis(STATUS_PERIOD_MS));

    loop {
        match select(ticker.next(), PROTECTION.wait()).await {
            Either::First(()) => report(),
            Either::Second((id, outcome)) => match outcome {
                Regulation::Limited => warn!("{}: limit exceeded, duty halved", id),
                Regulation::Collapsed => warn!("{}: output collapsed, duty reset", id),
                _ => {}
            },
        }
    }
}

fn report() {
    for id in [ChannelId::One, ChannelId::Two] {
        let Some(status) = state::with_regulator(|reg| reg.status(id)) else {
            return;
        };
        if !status.mode.is_active() {
            continue;
        }
        info!(
            "{} {}: V={} I={} d1={} d2={}",
            id, status.mode, status.vsense, status.isense, status.duty1, status.duty2
        );
    }
}
