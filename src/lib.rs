//! 2チャネル スイッチングレギュレータ制御コア
//!
//! - チャネル1: 昇降圧（降圧スイッチ + 昇圧スイッチ、位相同期PWM）
//! - チャネル2: 降圧（PWMソース切替可）
//!
//! 制御コアはハードウェア非依存で、[`hal`] のトレイト経由でタイマー・ADCを操作します。
//! 実機バインディング（STM32G431）はファームウェアバイナリ側にあります。

#![cfg_attr(not(test), no_std)]

// マクロ定義のため最初に宣言
mod fmt;

pub mod config;
pub mod error;
pub mod fixed;
pub mod hal;
pub mod pwm;
pub mod regulator;
pub mod sampling;

#[cfg(test)]
mod mock;

pub use error::{Error, Fault};
pub use crate::fixed::Fixed;
pub use regulator::{
    Ch2Source, ChannelId, ChannelStatus, Gains, Mode, Regulation, Regulator, Samples,
};
pub use sampling::SharedSampler;
