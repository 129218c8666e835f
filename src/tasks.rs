//! タスクモジュール
//!
//! 各タスクの実装を分離して管理します。

pub mod led;
pub mod status;
pub mod watchdog;

// タスク関数を再エクスポート
pub use led::led_task;
pub use status::status_task;
pub use watchdog::watchdog_task;
