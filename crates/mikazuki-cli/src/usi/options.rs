//! エンジンオプション
//!
//! 名前は大文字小文字を区別せず、`USI_` 前置は外して解決する。
//! `MultiPV` は報告専用、`OwnBook` は受理するだけで未使用。

use mikazuki_core::tt::{DEFAULT_TT_SIZE_MIB, TT_SIZE_RANGE_MIB};

/// オプションの適用結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionChange {
    Hash(usize),
    Threads(usize),
    MultiPv(u32),
    /// 受理したが効果のないオプション
    Ignored,
    Unknown(String),
    InvalidValue(String),
}

/// オプションの現在値
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub hash_mib: usize,
    pub threads: usize,
    pub multi_pv: u32,
    pub own_book: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            hash_mib: DEFAULT_TT_SIZE_MIB,
            threads: 1,
            multi_pv: 1,
            own_book: false,
        }
    }
}

impl EngineOptions {
    /// `usi` 応答のオプション宣言
    pub fn declarations() -> Vec<String> {
        vec![
            format!(
                "option name USI_Hash type spin default {} min {} max {}",
                DEFAULT_TT_SIZE_MIB,
                TT_SIZE_RANGE_MIB.0,
                TT_SIZE_RANGE_MIB.1
            ),
            "option name Threads type spin default 1 min 1 max 256".to_string(),
            "option name MultiPV type spin default 1 min 1 max 1".to_string(),
            "option name OwnBook type check default false".to_string(),
        ]
    }

    /// 名前と値を解釈して適用する
    pub fn apply(&mut self, name: &str, value: Option<&str>) -> OptionChange {
        let mut key = name.to_ascii_lowercase();
        if let Some(stripped) = key.strip_prefix("usi_") {
            key = stripped.to_string();
        }

        match key.as_str() {
            "hash" => match value.and_then(|v| v.parse::<usize>().ok()) {
                Some(mib) => {
                    let mib = mib.clamp(TT_SIZE_RANGE_MIB.0, TT_SIZE_RANGE_MIB.1);
                    self.hash_mib = mib;
                    OptionChange::Hash(mib)
                }
                None => OptionChange::InvalidValue(name.to_string()),
            },
            "threads" => match value.and_then(|v| v.parse::<usize>().ok()) {
                Some(n) => {
                    let n = n.clamp(1, 256);
                    self.threads = n;
                    OptionChange::Threads(n)
                }
                None => OptionChange::InvalidValue(name.to_string()),
            },
            "multipv" => match value.and_then(|v| v.parse::<u32>().ok()) {
                Some(n) => {
                    self.multi_pv = n.max(1);
                    OptionChange::MultiPv(self.multi_pv)
                }
                None => OptionChange::InvalidValue(name.to_string()),
            },
            "ownbook" => {
                self.own_book = matches!(value, Some("true"));
                OptionChange::Ignored
            }
            _ => OptionChange::Unknown(name.to_string()),
        }
    }
}
