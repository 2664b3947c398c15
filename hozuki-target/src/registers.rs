//! レジスタアクセス機能
//!
//! 32ビットx86の汎用レジスタ8本と命令ポインタを保持します。
//! 16ビット・8ビットの名前は汎用レジスタの一部を指す別名です。

/// 32ビット汎用レジスタ名（エンコーディング順）
pub const GPR32_NAMES: [&str; 8] = ["eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi"];

/// 16ビット汎用レジスタ名
pub const GPR16_NAMES: [&str; 8] = ["ax", "cx", "dx", "bx", "sp", "bp", "si", "di"];

/// 8ビット汎用レジスタ名
///
/// 前半4つは eax..ebx の下位バイト、後半4つは同じレジスタの上位バイト
pub const GPR8_NAMES: [&str; 8] = ["al", "cl", "dl", "bl", "ah", "ch", "dh", "bh"];

/// 命令ポインタ名
pub const PC_NAME: &str = "eip";

/// レジスタの指定子
///
/// 名前（`from_name`）か定数からのみ作られるため、インデックスは常に 0..8 に収まる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register(View);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum View {
    /// 32ビット汎用レジスタ
    Gpr32(usize),
    /// 16ビット汎用レジスタ（下位16ビット）
    Gpr16(usize),
    /// 8ビット汎用レジスタ
    Gpr8(usize),
    Eip,
}

impl Register {
    pub const EAX: Register = Register(View::Gpr32(0));
    pub const ECX: Register = Register(View::Gpr32(1));
    pub const EDX: Register = Register(View::Gpr32(2));
    pub const EBX: Register = Register(View::Gpr32(3));
    pub const ESP: Register = Register(View::Gpr32(4));
    pub const EBP: Register = Register(View::Gpr32(5));
    pub const ESI: Register = Register(View::Gpr32(6));
    pub const EDI: Register = Register(View::Gpr32(7));
    pub const EIP: Register = Register(View::Eip);

    /// `info r` で表示する順序
    const DUMP_ORDER: [Register; 9] = [
        Register::EAX,
        Register::ECX,
        Register::EDX,
        Register::EBX,
        Register::ESP,
        Register::EBP,
        Register::ESI,
        Register::EDI,
        Register::EIP,
    ];

    /// レジスタ名から指定子を取得する
    ///
    /// 名前は小文字のみ受け付けます（`$`マーカーは含めない）。
    pub fn from_name(name: &str) -> Option<Self> {
        if name == PC_NAME {
            return Some(Register::EIP);
        }

        let position = |table: &[&str; 8]| table.iter().position(|n| *n == name);

        position(&GPR32_NAMES)
            .map(View::Gpr32)
            .or_else(|| position(&GPR16_NAMES).map(View::Gpr16))
            .or_else(|| position(&GPR8_NAMES).map(View::Gpr8))
            .map(Register)
    }

    /// レジスタ名を取得する
    pub fn name(&self) -> &'static str {
        match self.0 {
            View::Gpr32(i) => GPR32_NAMES[i],
            View::Gpr16(i) => GPR16_NAMES[i],
            View::Gpr8(i) => GPR8_NAMES[i],
            View::Eip => PC_NAME,
        }
    }
}

/// レジスタ情報
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registers {
    gpr: [u32; 8],
    eip: u32,
}

impl Registers {
    /// すべて0のレジスタファイルを作成する
    pub fn new() -> Self {
        Self::default()
    }

    /// レジスタを読み取る
    ///
    /// 8ビットレジスタは al..bl が eax..ebx の下位バイト、
    /// ah..bh が同じレジスタの上位バイト（ビット8-15）です。
    pub fn get(&self, reg: Register) -> u32 {
        match reg.0 {
            View::Gpr32(i) => self.gpr[i],
            View::Gpr16(i) => self.gpr[i] & 0xffff,
            View::Gpr8(i) if i < 4 => self.gpr[i] & 0xff,
            View::Gpr8(i) => (self.gpr[i - 4] >> 8) & 0xff,
            View::Eip => self.eip,
        }
    }

    /// レジスタに書き込む
    ///
    /// 16/8ビットへの書き込みは該当ビット以外を保持します。
    pub fn set(&mut self, reg: Register, value: u32) {
        match reg.0 {
            View::Gpr32(i) => self.gpr[i] = value,
            View::Gpr16(i) => self.gpr[i] = (self.gpr[i] & !0xffff) | (value & 0xffff),
            View::Gpr8(i) if i < 4 => self.gpr[i] = (self.gpr[i] & !0xff) | (value & 0xff),
            View::Gpr8(i) => {
                let r = &mut self.gpr[i - 4];
                *r = (*r & !0xff00) | ((value & 0xff) << 8);
            }
            View::Eip => self.eip = value,
        }
    }

    /// 名前でレジスタを読み取る
    pub fn read_named(&self, name: &str) -> Option<u32> {
        Register::from_name(name).map(|reg| self.get(reg))
    }

    /// プログラムカウンタ（EIP）を取得する
    pub fn get_pc(&self) -> u32 {
        self.eip
    }

    /// プログラムカウンタ（EIP）を設定する
    pub fn set_pc(&mut self, pc: u32) {
        self.eip = pc;
    }

    /// 32ビット汎用レジスタと EIP の一覧
    pub fn dump(&self) -> Vec<(&'static str, u32)> {
        Register::DUMP_ORDER
            .iter()
            .map(|&reg| (reg.name(), self.get(reg)))
            .collect()
    }
}
