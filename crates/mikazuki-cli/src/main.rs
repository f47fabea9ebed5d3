//! Mikazuki USIフロントエンド
//!
//! 標準入出力のテキスト行でGUI/コントローラと対話する。
//! 探索本体は `mikazuki-core` が担い、ここはコマンドの解釈と
//! 応答の整形だけを行う。

mod bench;
mod engine;
mod usi;

use std::io::BufRead;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};

use engine::{CommandResult, Engine};
use usi::parse_usi_command;

#[derive(Parser, Debug)]
#[command(name = "mikazuki", version, about = "Mikazuki USI shogi engine")]
struct Args {
    /// デバッグログを有効にする
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 固定局面のベンチマークを実行する
    Bench {
        /// 探索深さ
        #[arg(default_value_t = 10)]
        depth: i32,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("MIKAZUKI_LOG", filter))
        .target(env_logger::Target::Stderr)
        .init();

    // 埋め込みネットワークの形状検証。壊れていれば起動しない。
    if let Err(e) = mikazuki_core::nnue::network() {
        eprintln!("fatal: embedded network is invalid: {e}");
        return ExitCode::FAILURE;
    }

    if let Some(Command::Bench { depth }) = args.command {
        return match bench::run(depth) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("bench failed: {e}");
                ExitCode::FAILURE
            }
        };
    }

    match run_usi_loop() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_usi_loop() -> Result<()> {
    let mut engine = Engine::new();
    let stdin = std::io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        let start_time = Instant::now();

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match parse_usi_command(trimmed) {
            Ok(command) => {
                if engine.handle(command, start_time) == CommandResult::Quit {
                    break;
                }
            }
            Err(e) => {
                // 不正な入力は報告して読み飛ばす
                usi::send_info_string(&format!("unknown or invalid command: {e}"));
                log::warn!("rejected input: {trimmed}");
            }
        }
    }

    Ok(())
}
