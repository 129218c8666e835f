//! ハードウェアドライバのインターフェース
//!
//! 制御コアはレジスタに直接触れず、ここで定義する狭いトレイトを通して
//! タイマー・ADC・トリガータイマーを操作します。実機では `sample_adc.rs` /
//! `pwm_tim.rs` がPACで実装し、テストでは `mock.rs` の記録用モックを使います。

/// PWM出力に使うタイマー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
pub enum TimerId {
    /// チャネル1 降圧スイッチ（マスター）
    Tim2,
    /// チャネル2 降圧スイッチ
    Tim3,
    /// チャネル1 昇圧スイッチ（スレーブ）
    Tim4,
}

/// 出力比較チャネル
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
pub enum OutputChannel {
    Ch1,
    Ch2,
    Ch3,
    Ch4,
}

impl OutputChannel {
    /// 0始まりのインデックス（PACのフィールド番号）
    pub const fn index(self) -> usize {
        match self {
            OutputChannel::Ch1 => 0,
            OutputChannel::Ch2 => 1,
            OutputChannel::Ch3 => 2,
            OutputChannel::Ch4 => 3,
        }
    }
}

/// タイマー + 出力比較チャネルの組
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
pub struct PwmOutput {
    pub timer: TimerId,
    pub channel: OutputChannel,
}

impl PwmOutput {
    pub const fn new(timer: TimerId, channel: OutputChannel) -> Self {
        Self { timer, channel }
    }
}

/// PWM極性
///
/// センターアライン波形のどちらの区間を出力アクティブにするかを選ぶ。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
pub enum Polarity {
    /// PWMモード1: CNT < CCR の間アクティブ（立ち上がり先行）
    ActiveHigh,
    /// PWMモード2: CNT < CCR の間インアクティブ（立ち下がり先行）
    ActiveLow,
}

/// マスターモード（TRGO出力の選択）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
pub enum MasterMode {
    /// TRGOを出さない（リセット値）
    Reset,
    /// カウンタ有効信号（CEN）をTRGOに出す
    Enable,
}

/// スレーブタイマーのトリガー入力（内部トリガー ITRx）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
pub enum SlaveTrigger {
    Itr0,
    Itr1,
    Itr2,
    Itr3,
}

/// PWMタイマードライバ
pub trait PwmDriver {
    /// タイマーのクロックを供給
    fn enable_clock(&mut self, timer: TimerId);

    /// タイマーのクロックを停止
    fn disable_clock(&mut self, timer: TimerId);

    /// タイマーをリセットし、連続・センターアラインのPWM出力として構成する
    ///
    /// 出力比較はプリロード有効。周期レジスタを書き込んだ後に更新イベントを
    /// 発生させ、`initial_ticks` を即時反映する。
    fn configure_output(
        &mut self,
        output: PwmOutput,
        period_ticks: u32,
        polarity: Polarity,
        initial_ticks: u16,
    );

    /// 比較値（オン時間）を設定。プリロードのため次の更新イベントで反映される
    fn set_compare(&mut self, output: PwmOutput, ticks: u16);

    fn enable_output(&mut self, output: PwmOutput);

    fn disable_output(&mut self, output: PwmOutput);

    /// 周期レジスタ（ARR）を書き込む
    fn set_period(&mut self, timer: TimerId, period_ticks: u32);

    /// ソフトウェア更新イベント（UG）
    fn generate_update(&mut self, timer: TimerId);

    /// カウンタ開始
    fn start(&mut self, timer: TimerId);

    /// カウンタ停止
    fn stop(&mut self, timer: TimerId);

    fn set_master_mode(&mut self, timer: TimerId, mode: MasterMode);

    /// ゲートモードのスレーブとして構成する
    ///
    /// トリガー入力がハイの間だけカウントする。マスターが `MasterMode::Enable` なら
    /// マスターの停止・再開にそのまま追従する。
    fn set_slave_trigger(&mut self, timer: TimerId, trigger: SlaveTrigger);
}

/// ADCが規定時間内にレディにならなかった
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
pub struct AdcTimeout;

/// インジェクテッド変換用ADCドライバ
pub trait AdcSampler {
    /// インジェクテッドシーケンスを設定（最大4チャネル、変換順）
    fn configure_injected_sequence(&mut self, channels: &[u8]);

    fn enable_scan(&mut self);

    /// シーケンス完了割り込みを有効化
    fn enable_conversion_interrupt(&mut self);

    /// クロック・発振器を有効化してADCを起動する
    ///
    /// レディ待ちは上限付き。上限を超えたら [`AdcTimeout`]。
    fn power_on(&mut self) -> Result<(), AdcTimeout>;

    /// ADCを停止し、割り込み・クロック・入力発振器を無効化する
    fn power_off(&mut self);
}

/// ADCトリガー用タイマー
pub trait TriggerTimer {
    /// トリガー周波数 [Hz]
    fn set_rate(&mut self, hz: u32);

    fn start(&mut self);

    /// 停止してクロックを止める
    fn stop(&mut self);
}
