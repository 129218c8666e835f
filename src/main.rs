#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod fmt;
#[cfg(target_os = "none")]
mod hardware;
#[cfg(target_os = "none")]
mod pwm_tim;
#[cfg(target_os = "none")]
mod sample_adc;
#[cfg(target_os = "none")]
mod state;
#[cfg(target_os = "none")]
mod tasks;

#[cfg(target_os = "none")]
mod firmware {
    #[cfg(not(feature = "defmt"))]
    use panic_halt as _;
    #[cfg(feature = "defmt")]
    use {defmt_rtt as _, panic_probe as _};

    use embassy_executor::Spawner;
    use embassy_stm32::{
        gpio::{Level, Output, Speed},
        pac,
        wdg::IndependentWatchdog,
    };

    use g4_regulator::config::{self, boot, ChannelConfig};
    use g4_regulator::{ChannelId, Error, Regulator};

    use crate::pwm_tim::TimPwm;
    use crate::sample_adc::{SampleAdc, TriggerTim};
    use crate::state::{self, BoardRegulator};
    use crate::tasks::{led_task, status_task, watchdog_task};
    use crate::hardware;

    /// ADC1_2 割り込み優先度（Embassyタスクより高優先度）
    const SAMPLE_IRQ_PRIORITY: u8 = 0x20;

    #[embassy_executor::main]
    async fn main(spawner: Spawner) {
        // ハードウェア初期化
        let clock_config = hardware::create_clock_config();
        let p = embassy_stm32::init(clock_config);

        info!("═══════════════════════════════════════════════════════════════════");
        info!("");
        info!("        Dual-Channel Switching Regulator • STM32G431VB @ 170MHz");
        info!("");
        info!("═══════════════════════════════════════════════════════════════════");

        // ウォッチドッグ起動（以後停止不可）
        let mut wdg = IndependentWatchdog::new(p.IWDG, config::watchdog::TIMEOUT_US);
        wdg.unleash();
        info!("IWDG armed: timeout={}us", config::watchdog::TIMEOUT_US);

        // PWM・ADCピン設定
        unsafe {
            hardware::init_regulator_pins();
        }
        let sense_enable = Output::new(p.PA5, Level::Low, Speed::Low);

        // サンプル割り込み優先度
        unsafe {
            let mut cp = cortex_m::Peripherals::steal();
            cp.NVIC
                .set_priority(pac::Interrupt::ADC1_2, SAMPLE_IRQ_PRIORITY);
        }

        // レギュレータ初期化（割り込みはモード有効化時に許可される）
        let mut regulator: BoardRegulator = unsafe {
            Regulator::new(
                TimPwm::new(),
                sense_enable,
                SampleAdc::new(),
                TriggerTim::new(),
                &ChannelConfig::buck_boost(),
                &ChannelConfig::buck(),
            )
        };
        regulator.init();
        state::install(regulator);

        // 起動プロファイル適用
        let applied = state::with_regulator(apply_boot_profile);
        match applied {
            Some(Ok(())) => info!("Boot profile applied"),
            Some(Err(e)) => error!("Boot profile rejected: {}", e),
            None => error!("Regulator not installed"),
        }

        // LED初期化＆タスク起動
        let led = Output::new(p.PC13, Level::High, Speed::Low);
        spawner.spawn(led_task(led)).unwrap();
        spawner.spawn(status_task()).unwrap();
        spawner.spawn(watchdog_task(wdg)).unwrap();
    }

    fn apply_boot_profile(reg: &mut BoardRegulator) -> Result<(), Error> {
        reg.set_ch2_source(boot::CH2_SOURCE)?;

        reg.set_ilimit(ChannelId::One, boot::CH1_ILIMIT)?;
        reg.set_vsetpoint(ChannelId::One, boot::CH1_VSETPOINT)?;
        reg.set_mode(ChannelId::One, boot::CH1_MODE)?;

        reg.set_mode(ChannelId::Two, boot::CH2_MODE)?;
        Ok(())
    }
}

// ホストビルド（ユニットテスト）用。ファームウェアは組込みターゲットでのみ動作する
#[cfg(not(target_os = "none"))]
fn main() {}
