//! ネットワークファイルをビルド時に埋め込むための準備。
//!
//! `MIKAZUKI_EVAL_FILE` が指定されていればそのファイルを `OUT_DIR` にコピーし、
//! 指定がなければ宣言形状どおりのゼロ初期化ネットワークを生成する
//! （これにより学習済み重みなしでもビルドが通る）。

use std::env;
use std::fs;
use std::path::PathBuf;

// nnue::arch と一致させること
const KING_BUCKETS: usize = 4;
const FT_SIZE: usize = 2 * (14 * 81 + 38);
const L1: usize = 256;
const L2: usize = 16;
const L3: usize = 32;

const fn network_bytes() -> usize {
    KING_BUCKETS * FT_SIZE * L1 * 2 // ft_weights: i16
        + L1 * 2                    // ft_biases: i16
        + (2 * L1) * L2             // l1_weights: i8
        + L2 * 4                    // l1_biases: i32
        + (2 * L2) * L3 * 4         // l2_weights: i32
        + L3 * 4                    // l2_biases: i32
        + L3 * 4                    // l3_weights: i32
        + 4 // l3_bias: i32
}

fn main() {
    println!("cargo:rerun-if-env-changed=MIKAZUKI_EVAL_FILE");

    let out = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set")).join("mikazuki.nnue");

    if let Ok(path) = env::var("MIKAZUKI_EVAL_FILE") {
        println!("cargo:rerun-if-changed={path}");
        fs::copy(&path, &out).expect("failed to copy MIKAZUKI_EVAL_FILE into OUT_DIR");
    } else {
        let expected = network_bytes();
        let regenerate = match fs::metadata(&out) {
            Ok(meta) => meta.len() as usize != expected,
            Err(_) => true,
        };
        if regenerate {
            fs::write(&out, vec![0u8; expected]).expect("failed to write default network");
        }
    }
}
