//! 式の字句解析
//!
//! 順序付きのルール表を先頭から試し、現在位置に最初にマッチしたルールを採用します
//! （最長一致ではありません）。そのため `==` のような複数文字の演算子は、
//! 紛らわしい1文字のルールより前に置く必要があります。

use crate::config::LexerLimits;
use crate::errors::LexError;
use crate::Result;
use regex::Regex;
use tracing::trace;

/// トークンの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    /// `$` に続くレジスタ名
    Register,
    /// `0x`/`0X` 付きの16進数
    Hex,
    /// 10進数
    Dec,
    Eq,
    Ne,
    And,
    Or,
    Not,
    /// 単項 `*`（字句解析後の再分類でのみ生成される）
    Deref,
    /// 単項 `-`（字句解析後の再分類でのみ生成される）
    Neg,
}

impl TokenKind {
    /// 値を持つトークン（リテラル、レジスタ）かどうか
    pub fn is_operand(&self) -> bool {
        matches!(self, TokenKind::Dec | TokenKind::Hex | TokenKind::Register)
    }

    /// 単項演算子かどうか
    pub fn is_unary(&self) -> bool {
        matches!(self, TokenKind::Not | TokenKind::Deref | TokenKind::Neg)
    }
}

/// トークン
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// マッチした元の文字列
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// ルール表（順序に意味がある）
///
/// 種類が `None` のルールは読み飛ばし（空白）です。
const RULES: &[(&str, Option<TokenKind>)] = &[
    (r"[ \t]+", None),
    (r"\+", Some(TokenKind::Plus)),
    (r"-", Some(TokenKind::Minus)),
    (r"\*", Some(TokenKind::Star)),
    (r"/", Some(TokenKind::Slash)),
    (r"\(", Some(TokenKind::LParen)),
    (r"\)", Some(TokenKind::RParen)),
    (r"\$[a-z]+", Some(TokenKind::Register)),
    (r"0[xX][0-9a-fA-F]+", Some(TokenKind::Hex)),
    (r"[0-9]+", Some(TokenKind::Dec)),
    (r"==", Some(TokenKind::Eq)),
    (r"!=", Some(TokenKind::Ne)),
    (r"&&", Some(TokenKind::And)),
    (r"\|\|", Some(TokenKind::Or)),
    (r"!", Some(TokenKind::Not)),
];

/// コンパイル済みのルール
struct Rule {
    pattern: &'static str,
    regex: Regex,
    kind: Option<TokenKind>,
}

/// 字句解析器
///
/// ルール表はセッション作成時に一度だけコンパイルされ、以後は読み取り専用です。
pub struct Lexer {
    rules: Vec<Rule>,
    limits: LexerLimits,
}

impl Lexer {
    /// ルール表をコンパイルして字句解析器を作成する
    pub fn new(limits: LexerLimits) -> Result<Self> {
        let rules = RULES
            .iter()
            .map(|&(pattern, kind)| -> Result<Rule> {
                // 現在位置に固定してマッチさせる
                let regex = Regex::new(&format!("^(?:{})", pattern)).map_err(|e| {
                    anyhow::anyhow!("regex compilation failed for '{}': {}", pattern, e)
                })?;
                Ok(Rule {
                    pattern,
                    regex,
                    kind,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules, limits })
    }

    /// 入力文字列をトークン列に変換する
    pub fn tokenize(&self, input: &str) -> std::result::Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        let mut position = 0;

        while position < input.len() {
            let rest = &input[position..];

            let (index, rule, len) = self
                .rules
                .iter()
                .enumerate()
                .find_map(|(i, rule)| rule.regex.find(rest).map(|m| (i, rule, m.end())))
                .ok_or(LexError::NoMatch { position })?;

            let text = &rest[..len];
            trace!(
                "match rules[{}] = \"{}\" at position {} with len {}: {}",
                index, rule.pattern, position, len, text
            );

            if let Some(kind) = rule.kind {
                if text.chars().count() > self.limits.max_token_len {
                    return Err(LexError::TokenTooLong {
                        position,
                        text: text.to_string(),
                        max: self.limits.max_token_len,
                    });
                }
                if tokens.len() >= self.limits.max_tokens {
                    return Err(LexError::TooManyTokens {
                        max: self.limits.max_tokens,
                    });
                }
                tokens.push(Token::new(kind, text));
            }

            position += len;
        }

        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexer() -> Lexer {
        Lexer::new(LexerLimits::default()).unwrap()
    }

    fn kinds(input: &str) -> Vec<TokenKind> {
        lexer()
            .tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_tokenize_arithmetic() {
        use TokenKind::*;
        assert_eq!(
            kinds("1 + 0x1f*( $eax -2)/3"),
            vec![Dec, Plus, Hex, Star, LParen, Register, Minus, Dec, RParen, Slash, Dec]
        );
    }

    #[test]
    fn test_token_text_is_preserved() {
        let tokens = lexer().tokenize("$esp==0X10").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::new(TokenKind::Register, "$esp"),
                Token::new(TokenKind::Eq, "=="),
                Token::new(TokenKind::Hex, "0X10"),
            ]
        );
    }

    #[test]
    fn test_rule_order() {
        use TokenKind::*;
        // != は ! より先に試される
        assert_eq!(kinds("1!=2"), vec![Dec, Ne, Dec]);
        assert_eq!(kinds("!1"), vec![Not, Dec]);
        // 0x は10進数ルールより先に試される
        assert_eq!(kinds("0x10"), vec![Hex]);
        assert_eq!(kinds("$a&&$b||1"), vec![Register, And, Register, Or, Dec]);
    }

    #[test]
    fn test_whitespace_only() {
        assert!(lexer().tokenize("  \t ").unwrap().is_empty());
        assert!(lexer().tokenize("").unwrap().is_empty());
    }

    #[test]
    fn test_no_match_position() {
        assert_eq!(
            lexer().tokenize("1 + @"),
            Err(LexError::NoMatch { position: 4 })
        );
        // 単独の = はどのルールにもマッチしない
        assert_eq!(lexer().tokenize("1=1"), Err(LexError::NoMatch { position: 1 }));
        // 大文字のレジスタ名は受け付けない
        assert_eq!(lexer().tokenize("$EAX"), Err(LexError::NoMatch { position: 0 }));
    }

    #[test]
    fn test_token_too_long() {
        let long = "1".repeat(32);
        let err = lexer().tokenize(&format!("2+{}", long)).unwrap_err();
        assert_eq!(
            err,
            LexError::TokenTooLong {
                position: 2,
                text: long,
                max: 31
            }
        );
        assert!(lexer().tokenize(&"1".repeat(31)).is_ok());
    }

    #[test]
    fn test_too_many_tokens() {
        let limits = LexerLimits {
            max_tokens: 3,
            max_token_len: 31,
        };
        let lexer = Lexer::new(limits).unwrap();
        assert!(lexer.tokenize("1 + 2").is_ok());
        assert_eq!(
            lexer.tokenize("1 + 2 + 3"),
            Err(LexError::TooManyTokens { max: 3 })
        );
    }
}
