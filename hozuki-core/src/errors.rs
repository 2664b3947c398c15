//! モニタのエラー型

use crate::watchpoint::WatchpointId;
use hozuki_target::MemoryError;
use thiserror::Error;

/// 字句解析のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    /// 指定位置でどのルールにもマッチしなかった
    #[error("no match at position {position}")]
    NoMatch { position: usize },
    /// トークン文字列が長すぎる
    #[error("token '{text}' at position {position} exceeds {max} characters")]
    TokenTooLong {
        position: usize,
        text: String,
        max: usize,
    },
    /// トークン数が上限を超えた
    #[error("expression has more than {max} tokens")]
    TooManyTokens { max: usize },
}

impl LexError {
    /// 入力と位置を示すキャレット付きの診断文字列を作る
    ///
    /// ```text
    /// no match at position 2
    /// 1 # 2
    ///   ^
    /// ```
    pub fn diagnostic(&self, input: &str) -> String {
        match self {
            LexError::NoMatch { position } | LexError::TokenTooLong { position, .. } => {
                let column = input
                    .get(..*position)
                    .map(|prefix| prefix.chars().count())
                    .unwrap_or(*position);
                format!("{}\n{}\n{}^", self, input, " ".repeat(column))
            }
            LexError::TooManyTokens { .. } => self.to_string(),
        }
    }

    /// 上限超過によるエラーかどうか
    pub fn is_overflow(&self) -> bool {
        !matches!(self, LexError::NoMatch { .. })
    }
}

/// 式評価のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error(transparent)]
    Lex(#[from] LexError),
    /// 存在しないレジスタ名
    #[error("no such register: ${0}")]
    UnknownRegister(String),
    /// 空の範囲、括弧の不一致、葉の位置にある演算子など
    #[error("malformed expression in token range [{p}, {q}]")]
    MalformedRange { p: isize, q: isize },
    #[error("division by zero")]
    DivideByZero,
    /// 32ビットに収まらないリテラル
    #[error("invalid literal '{0}'")]
    InvalidLiteral(String),
    /// 間接参照先がゲストメモリの外
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// ウォッチポイント操作のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchpointError {
    #[error(transparent)]
    Expr(#[from] ExprError),
    /// 空きスロットがない
    #[error("no free watchpoint slot (capacity {capacity})")]
    PoolExhausted { capacity: usize },
    /// 割り当てカウンタが上限に達した
    #[error("watchpoint numbers exhausted")]
    IdsExhausted,
    /// 指定IDのウォッチポイントがない
    #[error("watchpoint {0} not found")]
    NotFound(WatchpointId),
}
