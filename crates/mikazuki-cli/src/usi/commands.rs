//! USIコマンドの表現

/// goコマンドのパラメータ
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoParams {
    pub btime: Option<u64>,
    pub wtime: Option<u64>,
    pub binc: Option<u64>,
    pub winc: Option<u64>,
    pub byoyomi: Option<u64>,
    pub depth: Option<i32>,
    pub nodes: Option<u64>,
    pub movetime: Option<u64>,
    pub infinite: bool,
    pub mate: Option<String>,
}

/// 解釈済みのUSIコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsiCommand {
    Usi,
    IsReady,
    UsiNewGame,
    Position {
        startpos: bool,
        sfen: Option<String>,
        moves: Vec<String>,
    },
    Go(GoParams),
    Stop,
    SetOption {
        name: String,
        value: Option<String>,
    },
    GameOver,
    Quit,
    /// デバッグ用: 盤面表示
    Dump,
    /// デバッグ用: 分割perft
    SplitPerft(u32),
}
