//! 标签值缓冲池。
//!
//! # 契约说明（What）
//! - [`LabelBufferPool::acquire`] 返回恰好 `width` 个槽位的 [`LabelBuffer`]，调用方独占所有权；
//!   槽位中可能残留上一次使用的内容，调用方必须在使用前覆盖全部槽位；
//! - [`LabelBufferPool::release`] 按值取回缓冲，归还后调用方不再持有任何引用；
//! - [`LabelBufferPool::lease`] 返回 RAII 租约，离开作用域时自动归还；
//! - 池按宽度分桶，每个宽度再拆成 [`SHARDS_PER_WIDTH`] 个分片，每个分片一把锁，锁内只做一次 `push`/`pop`；
//!   超过 `max_pooled_width` 的宽度不入池，归还时直接释放；
//!   每个宽度最多保留 `max_idle_per_width` 个空闲缓冲（跨分片计数），多余的归还直接丢弃。
//!
//! # 执行逻辑（How）
//! - 每次租借/归还以轮转游标选定起始分片，先用 `try_lock` 依次尝试，跳过被占用的分片；
//! - 租借时若所有分片都被占用，再以阻塞方式扫描一轮，避免在池中仍有空闲缓冲时额外分配；
//! - 空闲计数在入池前预占名额，保证任何时刻计数不小于实际空闲数；统计快照直接读取该计数，不获取分片锁。
//!
//! # 风险提示（Trade-offs）
//! - 槽位 `String` 的容量随使用增长而保留，以换取稳定后零分配；标签值极长时会占用相应内存。

use std::{
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
};

use parking_lot::Mutex;

use crate::config::{LabelPoolConfig, MAX_POOLED_WIDTH_LIMIT};

/// 从池中租借的标签值缓冲。
#[derive(Debug)]
pub struct LabelBuffer {
    slots: Vec<String>,
}

impl LabelBuffer {
    fn with_width(width: usize) -> Self {
        Self {
            slots: vec![String::new(); width],
        }
    }

    /// 槽位数量。
    pub fn width(&self) -> usize {
        self.slots.len()
    }

    /// 只读访问全部槽位。
    pub fn as_slice(&self) -> &[String] {
        &self.slots
    }

    /// 可写访问全部槽位。
    pub fn as_mut_slice(&mut self) -> &mut [String] {
        &mut self.slots
    }

    /// 槽位数据的起始地址，用于判定缓冲实例是否相同。
    pub fn identity(&self) -> *const String {
        self.slots.as_ptr()
    }
}

/// 缓冲池统计快照。
///
/// # 契约说明（What）
/// - `acquired`：累计租借次数；`reused`：其中命中空闲缓冲的次数；`allocated`：新分配次数；
/// - `released`：累计归还次数；`discarded`：归还时因超宽或空闲数已满而释放的次数；
/// - `idle_buffers`：快照时刻池中空闲缓冲总数；
/// - **后置条件**：`acquired == reused + allocated`。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub acquired: u64,
    pub reused: u64,
    pub allocated: u64,
    pub released: u64,
    pub discarded: u64,
    pub idle_buffers: usize,
}

#[derive(Default)]
struct PoolCounters {
    acquired: AtomicU64,
    reused: AtomicU64,
    allocated: AtomicU64,
    released: AtomicU64,
    discarded: AtomicU64,
}

/// 每个宽度的锁分片数。
pub const SHARDS_PER_WIDTH: usize = 4;

/// 单一宽度的空闲缓冲：分片存放，`idle` 为跨分片的空闲计数。
struct WidthClass {
    shards: [Mutex<Vec<LabelBuffer>>; SHARDS_PER_WIDTH],
    idle: AtomicUsize,
}

impl WidthClass {
    fn new() -> Self {
        Self {
            shards: std::array::from_fn(|_| Mutex::new(Vec::new())),
            idle: AtomicUsize::new(0),
        }
    }

    fn shard(&self, start: usize, offset: usize) -> &Mutex<Vec<LabelBuffer>> {
        &self.shards[(start + offset) % SHARDS_PER_WIDTH]
    }

    fn pop(&self, start: usize) -> Option<LabelBuffer> {
        if self.idle.load(Ordering::Relaxed) == 0 {
            return None;
        }
        let mut contended = false;
        for offset in 0..SHARDS_PER_WIDTH {
            match self.shard(start, offset).try_lock() {
                Some(mut idle) => {
                    if let Some(buffer) = idle.pop() {
                        self.idle.fetch_sub(1, Ordering::Relaxed);
                        return Some(buffer);
                    }
                }
                None => contended = true,
            }
        }
        if !contended {
            return None;
        }
        for offset in 0..SHARDS_PER_WIDTH {
            if let Some(buffer) = self.shard(start, offset).lock().pop() {
                self.idle.fetch_sub(1, Ordering::Relaxed);
                return Some(buffer);
            }
        }
        None
    }

    /// 空闲数已达 `cap` 时原样退回缓冲。
    fn push(&self, start: usize, buffer: LabelBuffer, cap: usize) -> Result<(), LabelBuffer> {
        if self.idle.fetch_add(1, Ordering::Relaxed) >= cap {
            self.idle.fetch_sub(1, Ordering::Relaxed);
            return Err(buffer);
        }
        for offset in 0..SHARDS_PER_WIDTH {
            if let Some(mut idle) = self.shard(start, offset).try_lock() {
                idle.push(buffer);
                return Ok(());
            }
        }
        self.shard(start, 0).lock().push(buffer);
        Ok(())
    }

    fn idle_len(&self) -> usize {
        self.idle.load(Ordering::Relaxed)
    }
}

/// 按宽度分桶、桶内分片加锁的标签值缓冲池。
pub struct LabelBufferPool {
    classes: Box<[WidthClass]>,
    max_idle_per_width: usize,
    cursor: AtomicUsize,
    counters: PoolCounters,
}

impl LabelBufferPool {
    /// 按配置创建缓冲池。调用方需先通过 [`LabelPoolConfig::validate`] 校验配置；
    /// 未校验的 `max_pooled_width` 会被截断到 [`MAX_POOLED_WIDTH_LIMIT`]。
    pub fn new(config: &LabelPoolConfig) -> Self {
        let max_width = config.max_pooled_width.min(MAX_POOLED_WIDTH_LIMIT);
        let classes = (0..=max_width)
            .map(|_| WidthClass::new())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            classes,
            max_idle_per_width: config.max_idle_per_width,
            cursor: AtomicUsize::new(0),
            counters: PoolCounters::default(),
        }
    }

    /// 入池的最大宽度。
    pub fn max_pooled_width(&self) -> usize {
        self.classes.len().saturating_sub(1)
    }

    /// 为 `width` 预先分配 `count` 个空闲缓冲（不超过空闲上限）。
    pub fn prewarm(&self, width: usize, count: usize) {
        let Some(class) = self.classes.get(width) else {
            return;
        };
        let target = count.min(self.max_idle_per_width);
        let mut shard = 0;
        while class.idle.load(Ordering::Relaxed) < target {
            if class
                .push(shard, LabelBuffer::with_width(width), target)
                .is_err()
            {
                break;
            }
            shard += 1;
        }
    }

    fn next_shard(&self) -> usize {
        self.cursor.fetch_add(1, Ordering::Relaxed)
    }

    /// 租借 `width` 个槽位的缓冲。
    pub fn acquire(&self, width: usize) -> LabelBuffer {
        self.counters.acquired.fetch_add(1, Ordering::Relaxed);
        let pooled = self
            .classes
            .get(width)
            .and_then(|class| class.pop(self.next_shard()));
        match pooled {
            Some(buffer) => {
                self.counters.reused.fetch_add(1, Ordering::Relaxed);
                buffer
            }
            None => {
                self.counters.allocated.fetch_add(1, Ordering::Relaxed);
                LabelBuffer::with_width(width)
            }
        }
    }

    /// 归还缓冲。
    pub fn release(&self, buffer: LabelBuffer) {
        self.counters.released.fetch_add(1, Ordering::Relaxed);
        let width = buffer.width();
        if let Some(class) = self.classes.get(width) {
            if class
                .push(self.next_shard(), buffer, self.max_idle_per_width)
                .is_ok()
            {
                return;
            }
        }
        self.counters.discarded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(width, "label buffer discarded on release");
    }

    /// 租借缓冲并在租约离开作用域时自动归还。
    pub fn lease(&self, width: usize) -> LabelLease<'_> {
        LabelLease {
            pool: self,
            buffer: Some(self.acquire(width)),
        }
    }

    /// 统计快照。
    pub fn statistics(&self) -> PoolStats {
        PoolStats {
            acquired: self.counters.acquired.load(Ordering::Relaxed),
            reused: self.counters.reused.load(Ordering::Relaxed),
            allocated: self.counters.allocated.load(Ordering::Relaxed),
            released: self.counters.released.load(Ordering::Relaxed),
            discarded: self.counters.discarded.load(Ordering::Relaxed),
            idle_buffers: self.classes.iter().map(WidthClass::idle_len).sum(),
        }
    }
}

impl Default for LabelBufferPool {
    fn default() -> Self {
        Self::new(&LabelPoolConfig::default())
    }
}

impl core::fmt::Debug for LabelBufferPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LabelBufferPool")
            .field("max_pooled_width", &self.max_pooled_width())
            .field("max_idle_per_width", &self.max_idle_per_width)
            .finish_non_exhaustive()
    }
}

/// 缓冲租约；解引用为槽位切片，析构时归还缓冲。
pub struct LabelLease<'p> {
    pool: &'p LabelBufferPool,
    buffer: Option<LabelBuffer>,
}

impl Deref for LabelLease<'_> {
    type Target = [String];

    fn deref(&self) -> &[String] {
        match self.buffer.as_ref() {
            Some(buffer) => buffer.as_slice(),
            None => &[],
        }
    }
}

impl DerefMut for LabelLease<'_> {
    fn deref_mut(&mut self) -> &mut [String] {
        match self.buffer.as_mut() {
            Some(buffer) => buffer.as_mut_slice(),
            None => &mut [],
        }
    }
}

impl Drop for LabelLease<'_> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.pool.release(buffer);
        }
    }
}
