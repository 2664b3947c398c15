//! ウォッチポイント管理
//!
//! 固定容量のスロット配列を、空きリストと使用中リストの2つのインデックス列に分割して管理します。
//! どの時点でも両リストの和はプール全体に等しく、同じスロットが両方に入ることはありません。

use crate::config::IdScheme;
use crate::errors::{ExprError, WatchpointError};
use crate::expr_eval::EvalResult;
use std::collections::VecDeque;
use tracing::{debug, info, trace, warn};

/// ウォッチポイントID
pub type WatchpointId = u32;

/// プール内のスロット
#[derive(Debug, Clone, Default)]
struct Slot {
    id: WatchpointId,
    /// 監視する式（使用中のスロットだけが持つ）
    expr: Option<String>,
    /// 最後に確認された値
    old_value: u32,
    /// 変化が報告された直後の新しい値
    pending: Option<u32>,
}

impl Slot {
    fn reset(&mut self) {
        self.expr = None;
        self.old_value = 0;
        self.pending = None;
    }
}

/// ウォッチポイントの表示用スナップショット
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchpointInfo {
    pub id: WatchpointId,
    pub expr: String,
    pub value: u32,
}

/// スキャン結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// 値が変化したウォッチポイント
    Hit {
        id: WatchpointId,
        old_value: u32,
        new_value: u32,
    },
    /// 以前は評価できた式の再評価に失敗した
    Fault { id: WatchpointId, error: ExprError },
    /// 使用中リストの末尾まで変化なし
    NoChange,
}

/// ウォッチポイントプール
pub struct WatchpointPool {
    slots: Vec<Slot>,
    /// 空きスロット（先頭から割り当て、末尾に返却）
    free: VecDeque<usize>,
    /// 使用中スロット（登録順）
    active: Vec<usize>,
    /// 割り当てごとに進むIDカウンタ
    counter: WatchpointId,
    id_scheme: IdScheme,
    /// スキャンの再開位置（`active` 上の位置）
    cursor: Option<usize>,
    /// 報告済みでまだ確定していないスロット
    hit: Option<usize>,
}

impl WatchpointPool {
    /// 指定容量のプールを作成する
    pub fn new(capacity: usize, id_scheme: IdScheme) -> Self {
        let slots = (0..capacity)
            .map(|i| Slot {
                id: i as WatchpointId,
                ..Default::default()
            })
            .collect();

        let counter = match id_scheme {
            IdScheme::Monotonic => 1,
            IdScheme::Recycled => 0,
        };

        Self {
            slots,
            free: (0..capacity).collect(),
            active: Vec::with_capacity(capacity),
            counter,
            id_scheme,
            cursor: None,
            hit: None,
        }
    }

    /// プールの容量
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 使用中のウォッチポイント数
    pub fn count(&self) -> usize {
        self.active.len()
    }

    /// 空きスロット数
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// 空きリストの先頭を使用中リストの末尾に移す
    ///
    /// 失敗した場合は何も変更しない。
    fn allocate(&mut self) -> Result<usize, WatchpointError> {
        let next = self
            .counter
            .checked_add(1)
            .ok_or(WatchpointError::IdsExhausted)?;
        let index = self.free.pop_front().ok_or(WatchpointError::PoolExhausted {
            capacity: self.capacity(),
        })?;
        self.active.push(index);

        if self.id_scheme == IdScheme::Monotonic {
            self.slots[index].id = self.counter;
        }
        self.counter = next;

        Ok(index)
    }

    /// 使用中のスロットを空きリストに戻す
    fn release(&mut self, position: usize) {
        let index = self.active.remove(position);

        // カーソルは同じ後続要素を指し続ける
        if let Some(cursor) = self.cursor {
            if position < cursor {
                self.cursor = Some(cursor - 1);
            }
        }
        // 報告済みのスロットが消えたら確定するものはない
        if self.hit == Some(index) {
            self.hit = None;
        }

        self.slots[index].reset();
        if self.id_scheme == IdScheme::Recycled {
            self.slots[index].id = match self.free.back() {
                Some(&tail) => self.slots[tail].id.wrapping_add(1),
                None => self.counter,
            };
        }
        self.free.push_back(index);
    }

    /// 式を一度評価し、成功したらその値を基準値としてウォッチポイントを登録する
    ///
    /// 評価に失敗した場合、プールには一切触れない。
    pub fn set<F>(&mut self, expr: &str, evaluate: F) -> Result<WatchpointId, WatchpointError>
    where
        F: FnOnce(&str) -> EvalResult<u32>,
    {
        let value = evaluate(expr)?;

        let index = self.allocate()?;

        let slot = &mut self.slots[index];
        slot.expr = Some(expr.to_string());
        slot.old_value = value;
        slot.pending = None;
        let id = slot.id;

        debug!("Watchpoint {} set on '{}' (value 0x{:08x})", id, expr, value);
        debug_assert!(self.check_partition());
        Ok(id)
    }

    /// 使用中リスト上の位置をIDで探す
    fn position(&self, id: WatchpointId) -> Option<usize> {
        self.active.iter().position(|&i| self.slots[i].id == id)
    }

    /// ウォッチポイントを削除する
    pub fn delete(&mut self, id: WatchpointId) -> Result<(), WatchpointError> {
        let position = self.position(id).ok_or(WatchpointError::NotFound(id))?;
        self.release(position);

        debug!("Watchpoint {} deleted", id);
        debug_assert!(self.check_partition());
        Ok(())
    }

    /// すべてのウォッチポイントを削除する
    pub fn delete_all(&mut self) {
        while !self.active.is_empty() {
            self.release(0);
        }
        self.cursor = None;

        debug!("All watchpoints deleted");
        debug_assert!(self.check_partition());
    }

    /// ウォッチポイントを取得する
    pub fn get(&self, id: WatchpointId) -> Option<WatchpointInfo> {
        self.position(id).map(|position| self.info(self.active[position]))
    }

    /// 使用中のウォッチポイントを登録順に取得する
    pub fn list(&self) -> Vec<WatchpointInfo> {
        self.active.iter().map(|&i| self.info(i)).collect()
    }

    fn info(&self, index: usize) -> WatchpointInfo {
        let slot = &self.slots[index];
        WatchpointInfo {
            id: slot.id,
            expr: slot.expr.clone().unwrap_or_default(),
            value: slot.old_value,
        }
    }

    /// カーソル位置から使用中リストを走査し、最初に値が変化したウォッチポイントを返す
    ///
    /// 変化を見つけたらカーソルをそのスロットに残す。`acknowledge` で進めない限り、
    /// 次のスキャンでも同じ変化が報告される。末尾まで変化がなければカーソルを
    /// 解除し、次回は先頭から走査する。
    pub fn scan<F>(&mut self, mut evaluate: F) -> ScanOutcome
    where
        F: FnMut(&str) -> EvalResult<u32>,
    {
        let start = self.cursor.unwrap_or(0);

        for position in start..self.active.len() {
            let index = self.active[position];
            let slot = &mut self.slots[index];
            let expr = slot.expr.as_deref().unwrap_or_default();

            match evaluate(expr) {
                Ok(value) if value != slot.old_value => {
                    slot.pending = Some(value);
                    self.cursor = Some(position);
                    self.hit = Some(index);
                    info!(
                        "Watchpoint {}: {} changed 0x{:08x} -> 0x{:08x}",
                        slot.id, expr, slot.old_value, value
                    );
                    return ScanOutcome::Hit {
                        id: slot.id,
                        old_value: slot.old_value,
                        new_value: value,
                    };
                }
                Ok(_) => trace!("Watchpoint {} unchanged", slot.id),
                Err(error) => {
                    slot.pending = None;
                    self.cursor = Some(position);
                    self.hit = Some(index);
                    warn!("Watchpoint {}: failed to re-evaluate '{}': {}", slot.id, expr, error);
                    return ScanOutcome::Fault { id: slot.id, error };
                }
            }
        }

        self.cursor = None;
        self.hit = None;
        ScanOutcome::NoChange
    }

    /// 直前に報告された変化を確定し、カーソルを次のスロットに進める
    ///
    /// 変化なら新しい値を基準値にする。再評価の失敗なら基準値はそのまま。
    /// 報告されたスロットが既に削除されていれば何もせず `None` を返す。
    pub fn acknowledge(&mut self) -> Option<WatchpointId> {
        let position = self.cursor?;
        let index = *self.active.get(position)?;
        if self.hit != Some(index) {
            return None;
        }
        self.hit = None;

        let slot = &mut self.slots[index];
        if let Some(value) = slot.pending.take() {
            slot.old_value = value;
        }
        self.cursor = Some(position + 1);
        Some(slot.id)
    }

    /// スキャンのカーソルが指しているウォッチポイント
    pub fn cursor(&self) -> Option<WatchpointId> {
        self.cursor
            .and_then(|position| self.active.get(position))
            .map(|&i| self.slots[i].id)
    }

    /// 空きリストと使用中リストがプールを過不足なく分割しているか検査する
    pub fn check_partition(&self) -> bool {
        let mut seen = vec![false; self.slots.len()];

        for &index in self.free.iter().chain(self.active.iter()) {
            match seen.get_mut(index) {
                Some(flag) if !*flag => *flag = true,
                _ => return false,
            }
        }
        if !seen.iter().all(|&flag| flag) {
            return false;
        }

        let exprs_consistent = self.active.iter().all(|&i| self.slots[i].expr.is_some())
            && self.free.iter().all(|&i| self.slots[i].expr.is_none());

        let mut ids: Vec<_> = self.active.iter().map(|&i| self.slots[i].id).collect();
        ids.sort_unstable();
        ids.dedup();

        exprs_consistent && ids.len() == self.active.len()
    }
}
