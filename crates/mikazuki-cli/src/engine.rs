//! コマンドの実行
//!
//! USIコマンドを `Searcher` の操作に対応づける。探索中に受け付けない
//! コマンド（position / go / setoption）は報告して読み飛ばす。

use std::sync::Arc;
use std::time::Instant;

use mikazuki_core::movegen::{generate_all, perft, MoveList};
use mikazuki_core::position::{KeyRecord, Position};
use mikazuki_core::search::{
    CompoundLimiter, MoveTimeLimiter, NodeLimiter, Searcher, TimeLimits, TimeManager,
};
use mikazuki_core::types::{Color, Move, MAX_PLY};

use crate::usi::{
    send_info_string, send_line, EngineOptions, GoParams, OptionChange, UsiCommand, UsiReporter,
};

const ENGINE_NAME: &str = "Mikazuki";
const ENGINE_AUTHOR: &str = "Mikazuki developers";

/// コマンド処理の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    Continue,
    Quit,
}

/// エンジンの状態（局面・履歴・オプション・探索器）
pub struct Engine {
    searcher: Searcher,
    options: EngineOptions,
    pos: Position,
    key_history: Vec<KeyRecord>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Engine {
        let options = EngineOptions::default();
        let searcher = Searcher::new(options.hash_mib, Arc::new(UsiReporter));
        Engine {
            searcher,
            options,
            pos: Position::startpos(),
            key_history: Vec::new(),
        }
    }

    pub fn handle(&mut self, command: UsiCommand, start_time: Instant) -> CommandResult {
        match command {
            UsiCommand::Usi => {
                send_line(&format!(
                    "id name {ENGINE_NAME} {}",
                    env!("CARGO_PKG_VERSION")
                ));
                send_line(&format!("id author {ENGINE_AUTHOR}"));
                for decl in EngineOptions::declarations() {
                    send_line(&decl);
                }
                send_line("usiok");
            }

            UsiCommand::IsReady => {
                let t = Instant::now();
                if self.searcher.ensure_ready() {
                    log::info!("tt finalized in {:?}", t.elapsed());
                }
                send_line("readyok");
            }

            UsiCommand::UsiNewGame => {
                if self.searcher.is_searching() {
                    send_info_string("still searching");
                } else {
                    self.searcher.new_game();
                }
            }

            UsiCommand::Position {
                startpos,
                sfen,
                moves,
            } => self.handle_position(startpos, sfen.as_deref(), &moves),

            UsiCommand::Go(params) => self.handle_go(&params, start_time),

            UsiCommand::Stop => {
                if self.searcher.is_searching() {
                    self.searcher.stop();
                } else {
                    send_info_string("not searching");
                }
            }

            UsiCommand::SetOption { name, value } => {
                self.handle_setoption(&name, value.as_deref())
            }

            UsiCommand::GameOver => {}

            UsiCommand::Dump => {
                send_line(&format!("{}", self.pos));
                send_line(&format!("Sfen: {}", self.pos.sfen()));
                send_line(&format!("Key: {:#018x}", self.pos.key()));
            }

            UsiCommand::SplitPerft(depth) => self.handle_splitperft(depth),

            UsiCommand::Quit => {
                self.searcher.stop();
                return CommandResult::Quit;
            }
        }
        CommandResult::Continue
    }

    fn handle_position(&mut self, startpos: bool, sfen: Option<&str>, moves: &[String]) {
        if self.searcher.is_searching() {
            send_info_string("still searching");
            return;
        }

        let mut pos = if startpos {
            Position::startpos()
        } else {
            let Some(sfen) = sfen else {
                send_info_string("position: missing sfen");
                return;
            };
            match Position::from_sfen(sfen) {
                Ok(pos) => pos,
                Err(e) => {
                    send_info_string(&format!("failed to parse sfen: {e}"));
                    return;
                }
            }
        };

        let mut history = Vec::with_capacity(moves.len());
        for raw in moves {
            let Some(mv) = Move::from_usi(raw) else {
                send_info_string(&format!("invalid move: {raw}"));
                return;
            };
            if !pos.pseudo_legal(mv) || !pos.is_legal(mv) {
                send_info_string(&format!("illegal move: {raw}"));
                return;
            }
            history.push(KeyRecord {
                key: pos.key(),
                board_key: pos.board_key(),
                hand: pos.hand(pos.side_to_move()),
            });
            pos = pos.apply_move(mv);
        }

        self.pos = pos;
        self.key_history = history;
    }

    fn handle_go(&mut self, params: &GoParams, start_time: Instant) {
        if self.searcher.is_searching() {
            send_info_string("still searching");
            return;
        }

        if params.mate.is_some() {
            send_line("checkmate notimplemented");
            return;
        }

        let mut limiter = CompoundLimiter::new();
        let max_depth = params.depth.unwrap_or(MAX_PLY - 1);

        if let Some(nodes) = params.nodes {
            limiter.add(Box::new(NodeLimiter::new(nodes)));
        }
        if let Some(movetime) = params.movetime {
            limiter.add(Box::new(MoveTimeLimiter::new(
                start_time,
                std::time::Duration::from_millis(movetime),
            )));
        }

        let (time, inc) = match self.pos.side_to_move() {
            Color::Black => (params.btime, params.binc),
            Color::White => (params.wtime, params.winc),
        };
        if time.is_some() || params.byoyomi.is_some() {
            limiter.add(Box::new(TimeManager::new(
                start_time,
                TimeLimits {
                    remaining_ms: time.unwrap_or(0),
                    increment_ms: inc.unwrap_or(0),
                    byoyomi_ms: params.byoyomi.unwrap_or(0),
                },
            )));
        } else if inc.is_some() {
            send_info_string("warning: increment given but no time, ignoring");
        }

        self.searcher.start_search(
            &self.pos,
            &self.key_history,
            start_time,
            params.infinite,
            max_depth,
            Box::new(limiter),
        );
    }

    fn handle_setoption(&mut self, name: &str, value: Option<&str>) {
        if self.searcher.is_searching() {
            send_info_string("still searching");
            return;
        }

        match self.options.apply(name, value) {
            OptionChange::Hash(mib) => self.searcher.set_tt_size(mib),
            OptionChange::Threads(n) => self.searcher.set_threads(n),
            OptionChange::MultiPv(_) | OptionChange::Ignored => {}
            OptionChange::Unknown(name) => {
                send_info_string(&format!("unknown option: {name}"))
            }
            OptionChange::InvalidValue(name) => {
                send_info_string(&format!("invalid value for option: {name}"))
            }
        }
    }

    fn handle_splitperft(&self, depth: u32) {
        if depth == 0 {
            return;
        }
        let mut list = MoveList::new();
        generate_all(&mut list, &self.pos);

        let mut total = 0u64;
        for ext in list.iter() {
            if !self.pos.is_legal(ext.mv) {
                continue;
            }
            let child = self.pos.apply_move(ext.mv);
            let nodes = perft(&child, depth - 1);
            total += nodes;
            send_line(&format!("{}: {nodes}", ext.mv.to_usi()));
        }
        send_line(&format!("total: {total}"));
    }
}
