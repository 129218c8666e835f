//! ハードウェア初期化モジュール
//!
//! クロックツリーと、レギュレータが使うピンの初期化を集約します。
//!
//! ## ピン配置
//! - PB10: TIM2_CH3（チャネル1 降圧スイッチ、AF1）
//! - PB8:  TIM4_CH3（チャネル1 昇圧スイッチ、AF2）
//! - PC6:  TIM3_CH1（チャネル2 バッテリー側、AF2）
//! - PC8:  TIM3_CH3（チャネル2 入力側、AF2）
//! - PA0..PA3: ADC1_IN1..IN4（電圧・電流検出、アナログ）
//! - PA5:  チャネル1 電圧検出分圧器イネーブル（GPIO出力、main側で確保）

use embassy_stm32::{pac, Config};

/// RCCクロック設定を初期化
///
/// HSI → PLL（÷4 × 85 ÷ 2）で170MHz生成。ADC12はSYSCLKで駆動。
pub fn create_clock_config() -> Config {
    let mut config = Config::default();
    {
        use embassy_stm32::rcc::mux::{Adcsel, ClockMux};
        use embassy_stm32::rcc::{Pll, PllMul, PllPreDiv, PllRDiv, PllSource, Sysclk};

        config.rcc.hsi = true;
        config.rcc.pll = Some(Pll {
            source: PllSource::HSI,
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL85,
            divp: None,
            divq: None,
            divr: Some(PllRDiv::DIV2),
        });
        config.rcc.sys = Sysclk::PLL1_R; // システムクロックをPLLに設定

        let mut clock_mux = ClockMux::default();
        clock_mux.adc12sel = Adcsel::SYS;
        config.rcc.mux = clock_mux;
    }
    config
}

/// PWM出力ピンとADC入力ピンの設定
///
/// # Safety
/// PACを使用した直接レジスタ操作を含む。embassy側で同じピンを使わないこと。
pub unsafe fn init_regulator_pins() {
    let rcc = pac::RCC;
    rcc.ahb2enr().modify(|w| {
        w.set_gpioaen(true);
        w.set_gpioben(true);
        w.set_gpiocen(true);
    });

    // PWM出力（プッシュプル、高速）
    set_alternate(pac::GPIOB, 10, 1); // TIM2_CH3
    set_alternate(pac::GPIOB, 8, 2); // TIM4_CH3
    set_alternate(pac::GPIOC, 6, 2); // TIM3_CH1
    set_alternate(pac::GPIOC, 8, 2); // TIM3_CH3

    // ADC入力
    for pin in 0..4 {
        pac::GPIOA
            .moder()
            .modify(|w| w.set_moder(pin, pac::gpio::vals::Moder::ANALOG));
        pac::GPIOA
            .pupdr()
            .modify(|w| w.set_pupdr(pin, pac::gpio::vals::Pupdr::FLOATING));
    }
}

fn set_alternate(port: pac::gpio::Gpio, pin: usize, af: u8) {
    port.moder()
        .modify(|w| w.set_moder(pin, pac::gpio::vals::Moder::ALTERNATE));
    // AFR[0] = ピン0..7、AFR[1] = ピン8..15
    port.afr(pin / 8).modify(|w| w.set_afr(pin % 8, af));
    port.pupdr()
        .modify(|w| w.set_pupdr(pin, pac::gpio::vals::Pupdr::FLOATING));
    port.ospeedr()
        .modify(|w| w.set_ospeedr(pin, pac::gpio::vals::Ospeedr::VERY_HIGH_SPEED));
}
