//! チャネル状態とモード定義

use core::num::NonZeroU32;

use crate::config::ChannelConfig;
use crate::error::Error;
use crate::fixed::Fixed;

/// 動作モード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
pub enum Mode {
    /// 停止（PWM出力なし）
    Disabled,
    /// 固定デューティ（フィードバックなし）
    ConstantDuty,
    /// 定電流（電圧リミット付き）
    CurrentFeedback,
    /// 定電圧（電流リミット付き）
    VoltageFeedback,
    /// 予約（未実装）
    MaxPower,
}

impl Mode {
    pub const fn is_active(self) -> bool {
        !matches!(self, Mode::Disabled)
    }
}

/// チャネル2のPWM出力先
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
pub enum Ch2Source {
    /// TIM3 CH1
    #[default]
    Battery,
    /// TIM3 CH3
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
pub enum ChannelId {
    One,
    Two,
}

/// 比例ゲインの組（スイッチ1用、スイッチ2用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
pub struct Gains {
    pub prop_gain1: Fixed,
    pub prop_gain2: Fixed,
}

impl Gains {
    pub const fn new(prop_gain1: Fixed, prop_gain2: Fixed) -> Self {
        Self {
            prop_gain1,
            prop_gain2,
        }
    }
}

/// 1回のインジェクテッド変換で得られる4つのADC値 [コードポイント]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
pub struct Samples {
    pub vsense1: u16,
    pub isense1: u16,
    pub vsense2: u16,
    pub isense2: u16,
}

impl Samples {
    /// インジェクテッドデータレジスタの順（JDR1..JDR4）から構築
    pub const fn from_injected(data: [u16; 4]) -> Self {
        Self {
            vsense1: data[0],
            isense1: data[1],
            vsense2: data[2],
            isense2: data[3],
        }
    }
}

/// 1サンプル周期のフィードバック結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
pub enum Regulation {
    /// フィードバック対象外のモード
    Idle,
    /// 通常の比例制御
    Tracking,
    /// 反対側の量がリミットを超えたためデューティを半減
    Limited,
    /// 両スイッチがフルスケール付近で出力が崩れたため中点に戻した
    Collapsed,
}

/// ログ出力用のチャネル状態スナップショット
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
pub struct ChannelStatus {
    pub mode: Mode,
    pub period: u32,
    pub duty1: Fixed,
    pub duty2: Fixed,
    /// 電圧 [V]
    pub vsense: Fixed,
    /// 電流 [A]
    pub isense: Fixed,
}

/// 1チャネル分の制御状態
#[derive(Debug, Clone)]
pub struct ChannelState {
    pub(crate) mode: Mode,
    /// PWM周期 [カウント]
    pub(crate) period: u32,
    pub(crate) duty1: Fixed,
    pub(crate) duty2: Fixed,
    /// 最新のADC値 [コードポイント]
    pub(crate) vsense: u16,
    pub(crate) isense: u16,
    pub(crate) vsense_gain: NonZeroU32,
    pub(crate) isense_gain: NonZeroU32,
    /// 電圧フィードバックの目標値と電流リミット [コードポイント]
    pub(crate) vsetpoint: u16,
    pub(crate) ilimit: u16,
    /// 電流フィードバックの目標値と電圧リミット [コードポイント]
    pub(crate) isetpoint: u16,
    pub(crate) vlimit: u16,
    pub(crate) v_gains: Gains,
    pub(crate) i_gains: Gains,
}

impl ChannelState {
    pub fn new(config: &ChannelConfig) -> Self {
        Self {
            mode: Mode::Disabled,
            period: config.period,
            duty1: Fixed::ZERO,
            duty2: Fixed::ZERO,
            vsense: 0,
            isense: 0,
            vsense_gain: config.vsense_gain,
            isense_gain: config.isense_gain,
            vsetpoint: 0,
            ilimit: config.ilimit,
            isetpoint: 0,
            vlimit: config.vlimit,
            v_gains: config.v_gains,
            i_gains: config.i_gains,
        }
    }

    pub fn set_vsetpoint(&mut self, volts: Fixed) -> Result<(), Error> {
        let code = to_codepoints(volts, self.vsense_gain).ok_or(Error::SetpointOutOfRange)?;
        if code > self.vlimit as u32 {
            return Err(Error::SetpointOutOfRange);
        }
        self.vsetpoint = code as u16;
        Ok(())
    }

    pub fn vsetpoint(&self) -> Fixed {
        from_codepoints(self.vsetpoint, self.vsense_gain)
    }

    pub fn set_isetpoint(&mut self, amps: Fixed) -> Result<(), Error> {
        let code = to_codepoints(amps, self.isense_gain).ok_or(Error::SetpointOutOfRange)?;
        if code > self.ilimit as u32 {
            return Err(Error::SetpointOutOfRange);
        }
        self.isetpoint = code as u16;
        Ok(())
    }

    pub fn isetpoint(&self) -> Fixed {
        from_codepoints(self.isetpoint, self.isense_gain)
    }

    /// 電圧リミット。ADCのフルスケールを超える値は無制限（0xffff）として扱う
    pub fn set_vlimit(&mut self, volts: Fixed) -> Result<(), Error> {
        let code = to_codepoints(volts, self.vsense_gain).ok_or(Error::SetpointOutOfRange)?;
        self.vlimit = code.min(u16::MAX as u32) as u16;
        Ok(())
    }

    pub fn vlimit(&self) -> Fixed {
        from_codepoints(self.vlimit, self.vsense_gain)
    }

    pub fn set_ilimit(&mut self, amps: Fixed) -> Result<(), Error> {
        let code = to_codepoints(amps, self.isense_gain).ok_or(Error::SetpointOutOfRange)?;
        self.ilimit = code.min(u16::MAX as u32) as u16;
        Ok(())
    }

    pub fn ilimit(&self) -> Fixed {
        from_codepoints(self.ilimit, self.isense_gain)
    }

    pub fn vsense(&self) -> Fixed {
        from_codepoints(self.vsense, self.vsense_gain)
    }

    pub fn isense(&self) -> Fixed {
        from_codepoints(self.isense, self.isense_gain)
    }

    pub fn status(&self) -> ChannelStatus {
        ChannelStatus {
            mode: self.mode,
            period: self.period,
            duty1: self.duty1,
            duty2: self.duty2,
            vsense: self.vsense(),
            isense: self.isense(),
        }
    }
}

/// 物理量 → コードポイント: `(gain * value) >> 16`（負の値は不可）
fn to_codepoints(value: Fixed, gain: NonZeroU32) -> Option<u32> {
    if value.is_negative() {
        return None;
    }
    let code = (gain.get() as u64 * value.to_bits() as u64) >> 16;
    Some(code.min(u32::MAX as u64) as u32)
}

/// コードポイント → 物理量: `(code << 16) / gain`
fn from_codepoints(code: u16, gain: NonZeroU32) -> Fixed {
    let value = ((code as u64) << 16) / gain.get() as u64;
    Fixed::from_bits(value.min(i32::MAX as u64) as i32)
}
