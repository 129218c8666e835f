//! レギュレータ制御とハードウェアの設定パラメータ

use core::num::NonZeroU32;

use crate::fixed::Fixed;
use crate::regulator::Gains;

/// リミットの初期値（コードポイント、0xffff = 無制限）
pub const DEFAULT_LIMIT: u16 = 0xffff;

/// 比例ゲインの初期値（1.0）
pub const DEFAULT_GAINS: Gains = Gains::new(Fixed::ONE, Fixed::ONE);

/// PWM設定
pub mod pwm {
    /// PWMタイマーのカウントクロック [Hz]（プリスケーラで生成）
    pub const TIMER_TICK_HZ: u32 = 2_000_000;

    /// 周期カウントの基準周波数 [Hz]（センターアラインのため実スイッチング周波数はこの半分）
    pub const DEFAULT_FREQUENCY_HZ: u32 = 5_000;

    /// PWM周期 [カウント]（デフォルト値 = 400）
    pub const DEFAULT_PERIOD: u32 = TIMER_TICK_HZ / DEFAULT_FREQUENCY_HZ;

    /// チャネル1 降圧/昇圧スイッチ間の位相オフセット [カウント]
    pub const PHASE_OFFSET_TICKS: u32 = 0x10;
}

/// ADCサンプリング設定
pub mod sampling {
    /// サンプリング周波数 [Hz]（トリガータイマーの更新周期）
    pub const SAMPLE_RATE_HZ: u32 = 1_000;

    /// チャネル1 電圧検出（PA0 = ADC1_IN1）
    pub const VSENSE1_CHANNEL: u8 = 1;
    /// チャネル1 電流検出（PA1 = ADC1_IN2）
    pub const ISENSE1_CHANNEL: u8 = 2;
    /// チャネル2 電圧検出（PA2 = ADC1_IN3）
    pub const VSENSE2_CHANNEL: u8 = 3;
    /// チャネル2 電流検出（PA3 = ADC1_IN4）
    pub const ISENSE2_CHANNEL: u8 = 4;

    /// インジェクテッド変換の順序（ディスパッチャはこの順で値を受け取る）
    pub const INJECTED_SEQUENCE: [u8; 4] = [
        VSENSE1_CHANNEL,
        ISENSE1_CHANNEL,
        VSENSE2_CHANNEL,
        ISENSE2_CHANNEL,
    ];

    /// ADCレディ待ちの上限ループ回数
    pub const ADC_READY_SPINS: u32 = 100_000;
}

/// フィードバック制御
pub mod feedback {
    use crate::fixed::Fixed;

    /// デューティ比の上限（クランプ値、0xffff）
    pub const DUTY_FULL_SCALE: Fixed = Fixed::from_bits(0xffff);

    /// レール付近と判定するマージン（2000/65536 ≒ 3%）
    pub const FUDGE: i32 = 2000;
}

/// 電圧・電流検出回路（12ビットADC、Vref = 3.3V）
pub mod sense {
    use core::num::NonZeroU32;

    /// ADCフルスケール [コードポイント]
    pub const ADC_FULL_SCALE: f32 = 4096.0;

    /// ADC基準電圧 [V]
    pub const VREF: f32 = 3.3;

    /// 出力電圧分圧抵抗（上側68k、下側33k）
    pub const DIVIDER_UPPER_K: f32 = 68.0;
    pub const DIVIDER_LOWER_K: f32 = 33.0;

    /// シャント抵抗 [Ω]
    pub const SHUNT_OHMS: f32 = 0.05;

    /// 電流検出アンプのゲイン
    pub const CH1_CURRENT_AMP_GAIN: f32 = 10.0;
    pub const CH2_CURRENT_AMP_GAIN: f32 = 47.0;

    /// 電圧検出ゲイン [コードポイント/V]
    pub const VSENSE_GAIN: NonZeroU32 =
        gain(ADC_FULL_SCALE / VREF * DIVIDER_LOWER_K / (DIVIDER_LOWER_K + DIVIDER_UPPER_K));

    /// チャネル1 電流検出ゲイン [コードポイント/A]
    pub const CH1_ISENSE_GAIN: NonZeroU32 =
        gain(ADC_FULL_SCALE / (VREF / SHUNT_OHMS / CH1_CURRENT_AMP_GAIN));

    /// チャネル2 電流検出ゲイン [コードポイント/A]
    pub const CH2_ISENSE_GAIN: NonZeroU32 =
        gain(ADC_FULL_SCALE / (VREF / SHUNT_OHMS / CH2_CURRENT_AMP_GAIN));

    const fn gain(codepoints_per_unit: f32) -> NonZeroU32 {
        match NonZeroU32::new(codepoints_per_unit as u32) {
            Some(g) => g,
            None => panic!("sense gain must be at least one codepoint per unit"),
        }
    }
}

/// 起動プロファイル（電源投入時に制御プレーンが適用するモード・設定値）
pub mod boot {
    use crate::fixed::Fixed;
    use crate::regulator::{Ch2Source, Mode};

    /// チャネル1: 5V定電圧、電流制限1A
    pub const CH1_MODE: Mode = Mode::VoltageFeedback;
    pub const CH1_VSETPOINT: Fixed = Fixed::from_int(5);
    pub const CH1_ILIMIT: Fixed = Fixed::from_int(1);

    /// チャネル2: 起動時は停止、ソースはバッテリー
    pub const CH2_MODE: Mode = Mode::Disabled;
    pub const CH2_SOURCE: Ch2Source = Ch2Source::Battery;
}

/// ステータスログ周期 [ms]
pub const STATUS_PERIOD_MS: u64 = 1_000;

/// ウォッチドッグ設定
pub mod watchdog {
    /// タイムアウト [μs]（致命的フォールトで停止した場合はこの時間でリセット）
    pub const TIMEOUT_US: u32 = 500_000;

    /// キック周期 [ms]
    pub const PET_PERIOD_MS: u64 = 100;
}

/// チャネル構築時のパラメータ
#[derive(Debug, Clone, Copy)]
pub struct ChannelConfig {
    /// PWM周期 [カウント]
    pub period: u32,
    /// 電圧検出ゲイン [コードポイント/V]
    pub vsense_gain: NonZeroU32,
    /// 電流検出ゲイン [コードポイント/A]
    pub isense_gain: NonZeroU32,
    pub v_gains: Gains,
    pub i_gains: Gains,
    /// 電圧リミット [コードポイント]（電流フィードバック時）
    pub vlimit: u16,
    /// 電流リミット [コードポイント]（電圧フィードバック時）
    pub ilimit: u16,
}

impl ChannelConfig {
    /// チャネル1（昇降圧、電圧・電流検出）
    pub const fn buck_boost() -> Self {
        Self {
            period: pwm::DEFAULT_PERIOD,
            vsense_gain: sense::VSENSE_GAIN,
            isense_gain: sense::CH1_ISENSE_GAIN,
            v_gains: DEFAULT_GAINS,
            i_gains: DEFAULT_GAINS,
            vlimit: DEFAULT_LIMIT,
            ilimit: DEFAULT_LIMIT,
        }
    }

    /// チャネル2（降圧、ソース選択可）
    pub const fn buck() -> Self {
        Self {
            isense_gain: sense::CH2_ISENSE_GAIN,
            ..Self::buck_boost()
        }
    }
}
