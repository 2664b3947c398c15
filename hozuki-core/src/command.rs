//! モニタコマンド

use crate::watchpoint::WatchpointId;

/// モニタコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// ヘルプ表示（コマンド名を指定するとその説明だけ）
    Help(Option<String>),
    /// 停止するまで実行継続
    Continue,
    /// 指定した命令数だけステップ実行
    Step(u64),
    /// レジスタ一覧
    InfoRegisters,
    /// ウォッチポイント一覧
    InfoWatchpoints,
    /// 式の値を表示
    Print(String),
    /// 式で指定したアドレスから `count` 語のメモリを表示
    Examine { count: usize, expr: String },
    /// ウォッチポイントを設定
    Watch(String),
    /// ウォッチポイントを削除（IDなしならすべて）
    Delete(Option<WatchpointId>),
    /// 終了
    Quit,
}

/// コマンド名と説明の一覧
pub const COMMANDS: &[(&str, &str)] = &[
    ("help", "Display information about all supported commands"),
    ("c", "Continue the execution of the program"),
    ("si", "Step N instructions exactly (default 1)"),
    ("info", "Show registers (info r) or watchpoints (info w)"),
    ("p", "Evaluate an expression"),
    ("x", "Examine N words of memory starting at an expression"),
    ("w", "Stop when the value of an expression changes"),
    ("d", "Delete a watchpoint by number, or all of them"),
    ("q", "Exit the monitor"),
];

impl Command {
    /// コマンド文字列をパースする
    ///
    /// 式を取るコマンドは、コマンド名以降の残りすべてを式として扱う。
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let (name, rest) = match input.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (input, ""),
        };

        match name {
            "help" | "h" | "?" => Some(Command::Help(
                rest.split_whitespace().next().map(str::to_string),
            )),
            "continue" | "c" => Some(Command::Continue),
            "si" | "step" => {
                if rest.is_empty() {
                    Some(Command::Step(1))
                } else {
                    rest.parse().ok().map(Command::Step)
                }
            }
            "info" | "i" => match rest {
                "r" | "registers" => Some(Command::InfoRegisters),
                "w" | "watchpoints" => Some(Command::InfoWatchpoints),
                _ => None,
            },
            "p" | "print" => non_empty(rest).map(Command::Print),
            "x" => {
                let (count, expr) = rest.split_once(char::is_whitespace)?;
                let count = count.parse().ok()?;
                non_empty(expr.trim()).map(|expr| Command::Examine { count, expr })
            }
            "w" | "watch" => non_empty(rest).map(Command::Watch),
            "d" | "delete" => {
                if rest.is_empty() {
                    Some(Command::Delete(None))
                } else {
                    rest.parse().ok().map(|id| Command::Delete(Some(id)))
                }
            }
            "quit" | "q" | "exit" => Some(Command::Quit),
            _ => None,
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("c"), Some(Command::Continue));
        assert_eq!(Command::parse("si"), Some(Command::Step(1)));
        assert_eq!(Command::parse("si 10"), Some(Command::Step(10)));
        assert_eq!(Command::parse("info r"), Some(Command::InfoRegisters));
        assert_eq!(Command::parse("info w"), Some(Command::InfoWatchpoints));
        assert_eq!(Command::parse("q"), Some(Command::Quit));
        assert_eq!(Command::parse("help si"), Some(Command::Help(Some("si".to_string()))));
    }

    #[test]
    fn test_expression_keeps_spaces() {
        assert_eq!(
            Command::parse("p  $eax + 4 * 2 "),
            Some(Command::Print("$eax + 4 * 2".to_string()))
        );
        assert_eq!(
            Command::parse("x 4 $esp + 8"),
            Some(Command::Examine {
                count: 4,
                expr: "$esp + 8".to_string(),
            })
        );
        assert_eq!(
            Command::parse("w *0x100000 == 0"),
            Some(Command::Watch("*0x100000 == 0".to_string()))
        );
    }

    #[test]
    fn test_delete() {
        assert_eq!(Command::parse("d"), Some(Command::Delete(None)));
        assert_eq!(Command::parse("d 3"), Some(Command::Delete(Some(3))));
        assert_eq!(Command::parse("d three"), None);
    }

    #[test]
    fn test_invalid_commands() {
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse("p"), None);
        assert_eq!(Command::parse("x 4"), None);
        assert_eq!(Command::parse("x four $eax"), None);
        assert_eq!(Command::parse("si -1"), None);
        assert_eq!(Command::parse("info"), None);
        assert_eq!(Command::parse("frobnicate"), None);
    }
}
