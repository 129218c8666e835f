//! Configuration module
//!
//! このモジュールはレギュレータ制御とハードウェアの設定パラメータを提供します。
//! 電源再投入をまたぐ設定の永続化は行いません（起動時は常にこの値から始まる）。

pub mod params;

// params.rsから主要な定数を再エクスポート
pub use params::*;
