//! USIプロトコルの結合テスト
//!
//! ビルドしたバイナリを起動し、標準入出力で一連のコマンドを流して
//! 応答を検証する。

use assert_cmd::Command;
use predicates::prelude::*;

fn mikazuki() -> Command {
    Command::cargo_bin("mikazuki").expect("binary must build")
}

#[test]
fn usi_handshake() {
    mikazuki()
        .write_stdin("usi\nquit\n")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("id name Mikazuki")
                .and(predicate::str::contains("id author"))
                .and(predicate::str::contains("option name USI_Hash type spin"))
                .and(predicate::str::contains("option name Threads type spin"))
                .and(predicate::str::contains("usiok")),
        );
}

#[test]
fn isready_answers_readyok() {
    mikazuki()
        .write_stdin("usi\nisready\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("readyok"));
}

#[test]
fn go_depth_produces_bestmove_and_info() {
    mikazuki()
        .write_stdin("usi\nisready\nposition startpos\ngo depth 3\nquit\n")
        .assert()
        .success()
        .stdout(
            predicate::str::is_match(r"(?m)^info depth \d+ seldepth \d+ time \d+ nodes \d+ nps \d+ score (cp|mate) -?\d+.* pv ")
                .unwrap()
                .and(predicate::str::is_match(r"(?m)^bestmove \S+$").unwrap()),
        );
}

#[test]
fn mate_in_one_is_reported() {
    mikazuki()
        .write_stdin(
            "usi\nisready\nposition sfen k8/9/1G7/9/9/9/9/9/8K b G 1\ngo depth 5\nquit\n",
        )
        .assert()
        .success()
        .stdout(
            predicate::str::contains("score mate 1")
                .and(predicate::str::is_match(r"(?m)^bestmove G\*[89]b$").unwrap()),
        );
}

#[test]
fn stop_after_infinite_emits_bestmove() {
    mikazuki()
        .write_stdin("usi\nisready\nposition startpos\ngo infinite\nstop\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"(?m)^bestmove \S+$").unwrap());
}

#[test]
fn invalid_input_is_reported_not_fatal() {
    mikazuki()
        .write_stdin("usi\nxyzzy\nposition sfen not_a_sfen b - 1\nisready\nquit\n")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("info string unknown or invalid command")
                .and(predicate::str::contains("failed to parse sfen"))
                .and(predicate::str::contains("readyok")),
        );
}

#[test]
fn setoption_threads_and_hash_are_accepted() {
    mikazuki()
        .write_stdin(
            "usi\nsetoption name Threads value 2\nsetoption name USI_Hash value 32\n\
             isready\nposition startpos\ngo movetime 300\nquit\n",
        )
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"(?m)^bestmove \S+$").unwrap());
}

#[test]
fn no_legal_moves_resigns() {
    mikazuki()
        .write_stdin(
            "usi\nisready\nposition sfen 4k4/9/9/9/9/9/9/3gg4/4K4 b - 1\ngo depth 3\nquit\n",
        )
        .assert()
        .success()
        .stdout(predicate::str::contains("bestmove resign"));
}
