//! ログ出力マクロ
//!
//! `defmt` フィーチャ有効かつ組込みターゲットの場合のみ defmt に転送します。
//! ホスト（ユニットテスト）では引数を評価するだけで何も出力しません。
#![macro_use]
#![allow(unused)]

macro_rules! trace {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(all(feature = "defmt", target_os = "none"))]
            ::defmt::trace!($s $(, $x)*);
            #[cfg(not(all(feature = "defmt", target_os = "none")))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(all(feature = "defmt", target_os = "none"))]
            ::defmt::debug!($s $(, $x)*);
            #[cfg(not(all(feature = "defmt", target_os = "none")))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! info {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(all(feature = "defmt", target_os = "none"))]
            ::defmt::info!($s $(, $x)*);
            #[cfg(not(all(feature = "defmt", target_os = "none")))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! warn {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(all(feature = "defmt", target_os = "none"))]
            ::defmt::warn!($s $(, $x)*);
            #[cfg(not(all(feature = "defmt", target_os = "none")))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! error {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(all(feature = "defmt", target_os = "none"))]
            ::defmt::error!($s $(, $x)*);
            #[cfg(not(all(feature = "defmt", target_os = "none")))]
            let _ = ($( & $x ),*);
        }
    };
}
