//! 式評価エンジン
//!
//! トークン列のインデックス範囲 `[p, q]` を再帰的に評価します。構文木は作らず、
//! 範囲ごとに支配的な演算子（その範囲の木の根にあたる演算子）を探して左右に分割します。
//!
//! 値はすべて32ビット符号なし整数で、算術はラップアラウンドします。
//! `&&` と `||` は短絡評価をせず、常に両辺を評価します。

use crate::errors::ExprError;
use crate::lexer::{Lexer, Token, TokenKind};
use crate::parse::{parse_decimal, parse_hex};
use hozuki_target::{Register, Target};

/// 評価の結果型
pub type EvalResult<T> = std::result::Result<T, ExprError>;

/// 優先順位表で使う演算子クラス
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    /// 演算子ではない（リテラル、レジスタ、括弧）
    Operand = 0,
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    And,
    Or,
    Not,
    Deref,
    Neg,
}

impl OpClass {
    /// トークン種別から演算子クラスを得る
    pub fn of(kind: TokenKind) -> Self {
        match kind {
            TokenKind::Plus => OpClass::Add,
            TokenKind::Minus => OpClass::Sub,
            TokenKind::Star => OpClass::Mul,
            TokenKind::Slash => OpClass::Div,
            TokenKind::Eq => OpClass::Eq,
            TokenKind::Ne => OpClass::Ne,
            TokenKind::And => OpClass::And,
            TokenKind::Or => OpClass::Or,
            TokenKind::Not => OpClass::Not,
            TokenKind::Deref => OpClass::Deref,
            TokenKind::Neg => OpClass::Neg,
            TokenKind::Dec
            | TokenKind::Hex
            | TokenKind::Register
            | TokenKind::LParen
            | TokenKind::RParen => OpClass::Operand,
        }
    }

    /// 左オペランドを持たない演算子かどうか
    pub fn is_unary(&self) -> bool {
        matches!(self, OpClass::Not | OpClass::Deref | OpClass::Neg)
    }
}

/// 優先順位表
///
/// `PRIORITY[候補][現在]` が1なら候補が現在のトークンより真に弱く結合する（候補を保持）、
/// 0なら現在のトークンで候補を置き換える。同順位の二項演算子は0なので右側が選ばれ、
/// 左結合になる。単項演算子同士は1なので最も左の単項演算子が残る。
///
/// 結合の強さ: `! * -`(単項) > `* /` > `+ -` > `== !=` > `&&` > `||`
#[rustfmt::skip]
const PRIORITY: [[u8; 12]; 12] = [
//   _  +  -  *  / == != && ||  ! '*' '-'
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0], // _
    [1, 0, 0, 1, 1, 0, 0, 0, 0, 1, 1, 1], // +
    [1, 0, 0, 1, 1, 0, 0, 0, 0, 1, 1, 1], // -
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1], // *
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1], // /
    [1, 1, 1, 1, 1, 0, 0, 0, 0, 1, 1, 1], // ==
    [1, 1, 1, 1, 1, 0, 0, 0, 0, 1, 1, 1], // !=
    [1, 1, 1, 1, 1, 1, 1, 0, 0, 1, 1, 1], // &&
    [1, 1, 1, 1, 1, 1, 1, 1, 0, 1, 1, 1], // ||
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1], // !
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1], // deref
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1], // negate
];

/// 候補 `candidate` が `current` より真に優先されるか（候補を保持するか）
pub fn outranks(candidate: OpClass, current: OpClass) -> bool {
    PRIORITY[candidate as usize][current as usize] != 0
}

/// 単項の `*` と `-` を再分類する
///
/// 先頭、または直前がリテラル・レジスタ・`)` 以外のトークンの場合、
/// `*` は間接参照、`-` は符号反転になる。直前の1トークンだけを見る。
pub fn reclassify_unary(tokens: &mut [Token]) {
    for i in 0..tokens.len() {
        let unary_position = i == 0 || {
            let prev = tokens[i - 1].kind;
            !(prev.is_operand() || prev == TokenKind::RParen)
        };
        if !unary_position {
            continue;
        }

        match tokens[i].kind {
            TokenKind::Star => tokens[i].kind = TokenKind::Deref,
            TokenKind::Minus => tokens[i].kind = TokenKind::Neg,
            _ => {}
        }
    }
}

/// `[p, q]` の両端が対応する1組の括弧で囲まれているか
pub fn check_parentheses(tokens: &[Token], p: usize, q: usize) -> bool {
    if tokens[p].kind != TokenKind::LParen || tokens[q].kind != TokenKind::RParen {
        return false;
    }

    let mut depth = 0i32;
    for token in &tokens[p + 1..q] {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return false;
        }
    }
    depth == 0
}

/// 支配的な演算子の位置を探す
///
/// 括弧の深さ0の位置だけを対象に左から走査し、候補が現在のトークンより
/// 真に優先されない限り候補を置き換える。
pub fn find_dominant_op(tokens: &[Token], p: usize, q: usize) -> usize {
    let mut op = p;
    let mut depth = 0i32;

    for (i, token) in tokens.iter().enumerate().take(q + 1).skip(p) {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth -= 1,
            kind if depth == 0 => {
                if !outranks(OpClass::of(tokens[op].kind), OpClass::of(kind)) {
                    op = i;
                }
            }
            _ => {}
        }
    }
    op
}

/// 式評価器
pub struct ExpressionEvaluator<'a, T: Target + ?Sized> {
    lexer: &'a Lexer,
    target: &'a T,
}

impl<'a, T: Target + ?Sized> ExpressionEvaluator<'a, T> {
    /// 新しい式評価器を作成する
    pub fn new(lexer: &'a Lexer, target: &'a T) -> Self {
        Self { lexer, target }
    }

    /// 式を評価する
    ///
    /// 途中のどこかで失敗した場合は値を返さずにエラーになる。
    pub fn evaluate(&self, input: &str) -> EvalResult<u32> {
        let mut tokens = self.lexer.tokenize(input)?;
        reclassify_unary(&mut tokens);
        self.eval(&tokens, 0, tokens.len() as isize - 1)
    }

    /// トークン範囲 `[p, q]` を評価する
    fn eval(&self, tokens: &[Token], p: isize, q: isize) -> EvalResult<u32> {
        if p > q {
            return Err(ExprError::MalformedRange { p, q });
        }

        let (start, end) = (p as usize, q as usize);
        if start == end {
            return self.token_value(&tokens[start], p, q);
        }
        if check_parentheses(tokens, start, end) {
            return self.eval(tokens, p + 1, q - 1);
        }

        let op = find_dominant_op(tokens, start, end);
        let class = OpClass::of(tokens[op].kind);
        if class == OpClass::Operand {
            return Err(ExprError::MalformedRange { p, q });
        }

        let lhs = if class.is_unary() {
            // 単項演算子の左に何かが残っていれば不正な式
            if op != start {
                return Err(ExprError::MalformedRange { p, q });
            }
            0
        } else {
            self.eval(tokens, p, op as isize - 1)?
        };
        let rhs = self.eval(tokens, op as isize + 1, q)?;

        self.apply(class, lhs, rhs)
    }

    /// 演算子を適用する
    fn apply(&self, class: OpClass, lhs: u32, rhs: u32) -> EvalResult<u32> {
        let value = match class {
            OpClass::Add => lhs.wrapping_add(rhs),
            OpClass::Sub => lhs.wrapping_sub(rhs),
            OpClass::Mul => lhs.wrapping_mul(rhs),
            OpClass::Div => lhs.checked_div(rhs).ok_or(ExprError::DivideByZero)?,
            OpClass::Eq => u32::from(lhs == rhs),
            OpClass::Ne => u32::from(lhs != rhs),
            OpClass::And => u32::from(lhs != 0 && rhs != 0),
            OpClass::Or => u32::from(lhs != 0 || rhs != 0),
            OpClass::Not => u32::from(rhs == 0),
            OpClass::Neg => 0u32.wrapping_sub(rhs),
            OpClass::Deref => self.target.read_memory(rhs, 4)?,
            OpClass::Operand => unreachable!("operand is never applied"),
        };
        Ok(value)
    }

    /// 葉の位置にあるトークンの値を得る
    fn token_value(&self, token: &Token, p: isize, q: isize) -> EvalResult<u32> {
        match token.kind {
            TokenKind::Dec => parse_decimal(&token.text),
            TokenKind::Hex => parse_hex(&token.text),
            TokenKind::Register => {
                let name = token.text.trim_start_matches('$');
                Register::from_name(name)
                    .map(|reg| self.target.registers().get(reg))
                    .ok_or_else(|| ExprError::UnknownRegister(name.to_string()))
            }
            _ => Err(ExprError::MalformedRange { p, q }),
        }
    }
}
