//! モニタの設定

/// ウォッチポイントプールのデフォルト容量
pub const DEFAULT_WATCHPOINT_CAPACITY: usize = 32;

/// 1式あたりのデフォルト最大トークン数
pub const DEFAULT_MAX_TOKENS: usize = 32;

/// 1トークンのデフォルト最大文字数
pub const DEFAULT_MAX_TOKEN_LEN: usize = 31;

/// 字句解析の上限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexerLimits {
    pub max_tokens: usize,
    pub max_token_len: usize,
}

impl Default for LexerLimits {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            max_token_len: DEFAULT_MAX_TOKEN_LEN,
        }
    }
}

/// 解放されたスロットへのID割り当て方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdScheme {
    /// 1から始まり再利用されない連番
    #[default]
    Monotonic,
    /// 従来方式: スロットiの初期IDはi、解放時は空きリスト末尾のID+1
    /// （空きリストが空ならカウンタの値）に振り直す
    Recycled,
}

/// モニタ全体の設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// ウォッチポイントプールの容量
    pub capacity: usize,
    pub id_scheme: IdScheme,
    pub lexer: LexerLimits,
}

impl MonitorConfig {
    /// デフォルト設定（容量32、連番ID）
    pub fn new() -> Self {
        Self {
            capacity: DEFAULT_WATCHPOINT_CAPACITY,
            id_scheme: IdScheme::default(),
            lexer: LexerLimits::default(),
        }
    }

    /// 容量を変更する
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// ID割り当て方式を変更する
    pub fn with_id_scheme(mut self, id_scheme: IdScheme) -> Self {
        self.id_scheme = id_scheme;
        self
    }

    /// 字句解析の上限を変更する
    pub fn with_lexer_limits(mut self, lexer: LexerLimits) -> Self {
        self.lexer = lexer;
        self
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new()
    }
}
