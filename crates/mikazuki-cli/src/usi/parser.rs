//! USIコマンドの解析

use anyhow::{anyhow, Result};

use super::commands::{GoParams, UsiCommand};

/// 1行のUSIコマンドを解釈する
pub fn parse_usi_command(line: &str) -> Result<UsiCommand> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.is_empty() {
        return Err(anyhow!("empty command"));
    }

    match parts[0] {
        "usi" => Ok(UsiCommand::Usi),
        "isready" => Ok(UsiCommand::IsReady),
        "usinewgame" => Ok(UsiCommand::UsiNewGame),
        "stop" => Ok(UsiCommand::Stop),
        "gameover" => Ok(UsiCommand::GameOver),
        "quit" => Ok(UsiCommand::Quit),
        "position" => parse_position(&parts[1..]),
        "go" => parse_go(&parts[1..]),
        "setoption" => parse_setoption(&parts[1..]),
        "d" => Ok(UsiCommand::Dump),
        "splitperft" => parse_splitperft(&parts[1..]),
        other => Err(anyhow!("unknown command: {other}")),
    }
}

fn parse_position(parts: &[&str]) -> Result<UsiCommand> {
    if parts.is_empty() {
        return Err(anyhow!("position requires startpos or sfen"));
    }

    let (startpos, sfen, moves_start) = if parts[0] == "startpos" {
        (true, None, 1)
    } else if parts[0] == "sfen" {
        let moves_pos = parts.iter().position(|&p| p == "moves").unwrap_or(parts.len());
        if moves_pos <= 1 {
            return Err(anyhow!("missing sfen body"));
        }
        (false, Some(parts[1..moves_pos].join(" ")), moves_pos)
    } else {
        return Err(anyhow!("position must start with 'startpos' or 'sfen'"));
    };

    let moves = if moves_start < parts.len() && parts[moves_start] == "moves" {
        parts[moves_start + 1..].iter().map(|s| s.to_string()).collect()
    } else {
        Vec::new()
    };

    Ok(UsiCommand::Position {
        startpos,
        sfen,
        moves,
    })
}

fn parse_go(parts: &[&str]) -> Result<UsiCommand> {
    let mut params = GoParams::default();
    let mut i = 0;

    fn value<T: std::str::FromStr>(parts: &[&str], i: &mut usize, name: &str) -> Result<T> {
        *i += 1;
        let raw = parts
            .get(*i)
            .ok_or_else(|| anyhow!("go {name} requires a value"))?;
        raw.parse().map_err(|_| anyhow!("invalid {name} value: {raw}"))
    }

    while i < parts.len() {
        match parts[i] {
            "infinite" => params.infinite = true,
            "ponder" => {
                // ponderは未対応。infinite扱いで探索は継続する。
                params.infinite = true;
            }
            "btime" => params.btime = Some(value(parts, &mut i, "btime")?),
            "wtime" => params.wtime = Some(value(parts, &mut i, "wtime")?),
            "binc" => params.binc = Some(value(parts, &mut i, "binc")?),
            "winc" => params.winc = Some(value(parts, &mut i, "winc")?),
            "byoyomi" => params.byoyomi = Some(value(parts, &mut i, "byoyomi")?),
            "depth" => params.depth = Some(value(parts, &mut i, "depth")?),
            "nodes" => params.nodes = Some(value(parts, &mut i, "nodes")?),
            "movetime" => params.movetime = Some(value(parts, &mut i, "movetime")?),
            "mate" => {
                i += 1;
                params.mate = Some(parts.get(i).copied().unwrap_or("infinite").to_string());
            }
            other => return Err(anyhow!("unknown go parameter: {other}")),
        }
        i += 1;
    }

    Ok(UsiCommand::Go(params))
}

fn parse_setoption(parts: &[&str]) -> Result<UsiCommand> {
    if parts.len() < 2 || parts[0] != "name" {
        return Err(anyhow!("setoption requires 'name <name> [value <value>]'"));
    }

    let value_pos = parts.iter().position(|&p| p == "value");
    let name = match value_pos {
        Some(pos) => parts[1..pos].join(" "),
        None => parts[1..].join(" "),
    };
    if name.is_empty() {
        return Err(anyhow!("missing option name"));
    }

    let value = value_pos.and_then(|pos| {
        let v = parts[pos + 1..].join(" ");
        if v.is_empty() {
            None
        } else {
            Some(v)
        }
    });

    Ok(UsiCommand::SetOption { name, value })
}

fn parse_splitperft(parts: &[&str]) -> Result<UsiCommand> {
    let depth = parts
        .first()
        .ok_or_else(|| anyhow!("splitperft requires a depth"))?
        .parse()
        .map_err(|_| anyhow!("invalid splitperft depth"))?;
    Ok(UsiCommand::SplitPerft(depth))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_usi_command("usi").unwrap(), UsiCommand::Usi);
        assert_eq!(parse_usi_command("isready").unwrap(), UsiCommand::IsReady);
        assert_eq!(parse_usi_command("quit").unwrap(), UsiCommand::Quit);
        assert!(parse_usi_command("xyzzy").is_err());
    }

    #[test]
    fn test_parse_position_startpos_moves() {
        let cmd = parse_usi_command("position startpos moves 7g7f 3c3d").unwrap();
        assert_eq!(
            cmd,
            UsiCommand::Position {
                startpos: true,
                sfen: None,
                moves: vec!["7g7f".into(), "3c3d".into()],
            }
        );
    }

    #[test]
    fn test_parse_position_sfen() {
        let cmd = parse_usi_command(
            "position sfen lnsgkgsnl/1r5b1/ppppppppp/9/9/9/PPPPPPPPP/1B5R1/LNSGKGSNL b - 1 moves 7g7f",
        )
        .unwrap();
        match cmd {
            UsiCommand::Position {
                startpos,
                sfen,
                moves,
            } => {
                assert!(!startpos);
                assert!(sfen.unwrap().starts_with("lnsgkgsnl/"));
                assert_eq!(moves, vec!["7g7f".to_string()]);
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_parse_go_params() {
        let cmd =
            parse_usi_command("go btime 60000 wtime 60000 binc 1000 winc 1000 byoyomi 5000")
                .unwrap();
        match cmd {
            UsiCommand::Go(p) => {
                assert_eq!(p.btime, Some(60000));
                assert_eq!(p.byoyomi, Some(5000));
                assert!(!p.infinite);
            }
            _ => panic!("wrong command"),
        }

        let cmd = parse_usi_command("go infinite").unwrap();
        match cmd {
            UsiCommand::Go(p) => assert!(p.infinite),
            _ => panic!("wrong command"),
        }

        assert!(parse_usi_command("go depth").is_err());
        assert!(parse_usi_command("go nodes abc").is_err());
    }

    #[test]
    fn test_parse_setoption() {
        let cmd = parse_usi_command("setoption name USI_Hash value 256").unwrap();
        assert_eq!(
            cmd,
            UsiCommand::SetOption {
                name: "USI_Hash".into(),
                value: Some("256".into()),
            }
        );

        let cmd = parse_usi_command("setoption name OwnBook").unwrap();
        assert_eq!(
            cmd,
            UsiCommand::SetOption {
                name: "OwnBook".into(),
                value: None,
            }
        );
    }
}
