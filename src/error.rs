//! エラー型
//!
//! - [`Error`]: 制御プレーンのAPI呼び出しが拒否された、またはモード遷移中に
//!   構成が失敗したことを示す（呼び出し元に返す）
//! - [`Fault`]: ハードウェア設定の不変条件違反。サンプル割り込み内で発生した場合は
//!   致命的フォールトとして扱い、ファームウェアが停止する

/// ハードウェア構成フォールト
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
pub enum Fault {
    /// デューティ比から計算したカウント値が16ビット比較レジスタに収まらない
    TickOverflow { ticks: u32 },

    /// 位相オフセットがPWM周期以上
    PhaseOffset { offset: u32, period: u32 },

    /// ADCが規定時間内にレディにならなかった
    AdcTimeout,

    /// 電圧検出分圧器の制御ピン操作に失敗
    SensePin,
}

/// 制御プレーンAPIのエラー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
pub enum Error {
    /// 現在のモードでは許可されない操作
    WrongMode,

    /// duty2 > duty1（スイッチ2がスイッチ1より長くオンになる）
    DutyOrder,

    /// デューティ比が [0, 1] の範囲外
    DutyOutOfRange,

    /// 設定値がリミットを超える、または負
    SetpointOutOfRange,

    /// チャネルが動作中のため変更できない（周期・ソース切替）
    ChannelActive,

    /// PWM周期が0
    InvalidPeriod,

    /// 予約済みモード（MaxPower）
    ReservedMode,

    /// 固定デューティ設定の拒否: カウント値が比較レジスタに収まらない。
    /// デューティ比もモードも変更されない
    DutyTicks(Fault),

    /// 構成中のハードウェアフォールト（チャネルはDisabledに戻される）
    Configure(Fault),
}

impl From<Fault> for Error {
    fn from(fault: Fault) -> Self {
        Error::Configure(fault)
    }
}
