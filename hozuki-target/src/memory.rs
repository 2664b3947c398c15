//! メモリアクセス機能
//!
//! ゲストの物理メモリをリトルエンディアンのフラットなバイト列として扱います。

use thiserror::Error;

/// デフォルトのゲストメモリサイズ（128 MiB）
pub const DEFAULT_MEMORY_SIZE: usize = 128 * 1024 * 1024;

/// メモリアクセスのエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// アクセス範囲がゲストメモリの外にある
    #[error("address 0x{addr:08x} (+{len} bytes) is outside guest memory")]
    OutOfBounds { addr: u32, len: usize },
    /// 1, 2, 4 以外のアクセス幅
    #[error("invalid access width: {0} bytes")]
    InvalidWidth(usize),
}

/// メモリ操作の結果型
pub type Result<T> = std::result::Result<T, MemoryError>;

/// メモリから読み取り可能な型
pub trait MemoryReadable: Sized {
    /// リトルエンディアンのバイト配列から値を構築
    fn from_le_slice(bytes: &[u8]) -> Self;

    /// リトルエンディアンバイト配列に変換
    fn to_le_vec(&self) -> Vec<u8>;

    /// 型のサイズ（バイト数）
    fn size() -> usize;
}

impl MemoryReadable for u32 {
    fn from_le_slice(bytes: &[u8]) -> Self {
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn to_le_vec(&self) -> Vec<u8> {
        self.to_le_bytes().to_vec()
    }

    fn size() -> usize {
        4
    }
}

impl MemoryReadable for u16 {
    fn from_le_slice(bytes: &[u8]) -> Self {
        u16::from_le_bytes([bytes[0], bytes[1]])
    }

    fn to_le_vec(&self) -> Vec<u8> {
        self.to_le_bytes().to_vec()
    }

    fn size() -> usize {
        2
    }
}

impl MemoryReadable for u8 {
    fn from_le_slice(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn to_le_vec(&self) -> Vec<u8> {
        vec![*self]
    }

    fn size() -> usize {
        1
    }
}

/// ゲストメモリ
#[derive(Debug, Clone)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    /// 指定サイズのゼロ初期化されたメモリを作成する
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    /// メモリサイズ（バイト数）
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// アクセス範囲を検査してバイト範囲を返す
    fn range(&self, addr: u32, len: usize) -> Result<std::ops::Range<usize>> {
        let start = addr as usize;
        start
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .map(|end| start..end)
            .ok_or(MemoryError::OutOfBounds { addr, len })
    }

    /// メモリからデータを読み取る
    pub fn read(&self, addr: u32, size: usize) -> Result<&[u8]> {
        let range = self.range(addr, size)?;
        Ok(&self.bytes[range])
    }

    /// メモリにデータを書き込む
    pub fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        let range = self.range(addr, data.len())?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    /// プログラムイメージを指定アドレスに配置する
    pub fn load(&mut self, addr: u32, image: &[u8]) -> Result<()> {
        self.write(addr, image)
    }

    /// 型付き値を読み取る（ジェネリック版）
    ///
    /// # Examples
    /// ```
    /// use hozuki_target::Memory;
    ///
    /// let mut memory = Memory::new(16);
    /// memory.write_u32(4, 0xdeadbeef).unwrap();
    /// let value: u32 = memory.read_typed(4).unwrap();
    /// assert_eq!(value, 0xdeadbeef);
    /// ```
    pub fn read_typed<T: MemoryReadable>(&self, addr: u32) -> Result<T> {
        let bytes = self.read(addr, T::size())?;
        Ok(T::from_le_slice(bytes))
    }

    /// 型付き値を書き込む（ジェネリック版）
    pub fn write_typed<T: MemoryReadable>(&mut self, addr: u32, value: &T) -> Result<()> {
        self.write(addr, &value.to_le_vec())
    }

    /// 幅を指定して読み取る（1, 2, 4バイト）
    pub fn read_width(&self, addr: u32, width: usize) -> Result<u32> {
        match width {
            1 => self.read_u8(addr).map(u32::from),
            2 => self.read_u16(addr).map(u32::from),
            4 => self.read_u32(addr),
            _ => Err(MemoryError::InvalidWidth(width)),
        }
    }

    /// u32値を読み取る（リトルエンディアン）
    pub fn read_u32(&self, addr: u32) -> Result<u32> {
        self.read_typed(addr)
    }

    /// u32値を書き込む（リトルエンディアン）
    pub fn write_u32(&mut self, addr: u32, value: u32) -> Result<()> {
        self.write_typed(addr, &value)
    }

    /// u16値を読み取る（リトルエンディアン）
    pub fn read_u16(&self, addr: u32) -> Result<u16> {
        self.read_typed(addr)
    }

    /// u8値を読み取る
    pub fn read_u8(&self, addr: u32) -> Result<u8> {
        self.read_typed(addr)
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_SIZE)
    }
}
