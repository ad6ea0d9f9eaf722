//! 实例缓存
//!
//! 每个服务ID一个槽位。槽位记录构造者线程，保证同一作用域内同一ID最多构造一次；
//! 并发的调用者等待并拿到同一个实例。构造失败时槽位回到空状态。
//! 等待之前经由解析上下文检查等待链，线程间互相等待的循环直接报错而不是死锁。

use super::{Instance, ResolutionContext};
use crate::errors::Result;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, ThreadId};

enum SlotState {
    Empty,
    Building(ThreadId),
    Ready(Instance),
}

struct Slot {
    state: Mutex<SlotState>,
    changed: Condvar,
}

impl Slot {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Empty),
            changed: Condvar::new(),
        }
    }

    fn instance(&self) -> Option<Instance> {
        match &*self.state.lock() {
            SlotState::Ready(instance) => Some(instance.clone()),
            _ => None,
        }
    }
}

/// 构造中的槽位；提前释放（出错或 panic）时把槽位还原为空并唤醒等待者
struct BuildTicket<'a> {
    slot: &'a Slot,
    context: &'a ResolutionContext,
    id: &'a str,
    finished: bool,
}

impl BuildTicket<'_> {
    fn finish(&mut self, instance: Option<Instance>) {
        let mut state = self.slot.state.lock();
        *state = match instance {
            Some(instance) => SlotState::Ready(instance),
            None => SlotState::Empty,
        };
        self.context.release_waiters(self.id);
        self.finished = true;
        drop(state);
        self.slot.changed.notify_all();
    }
}

impl Drop for BuildTicket<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(None);
        }
    }
}

/// 缓存查询结果
pub(crate) enum Lookup {
    Hit(Instance),
    Built(Instance),
}

impl Lookup {
    pub(crate) fn into_instance(self) -> Instance {
        match self {
            Lookup::Hit(instance) | Lookup::Built(instance) => instance,
        }
    }
}

#[derive(Default)]
pub struct InstanceCache {
    slots: DashMap<String, Arc<Slot>>,
}

impl InstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 命中则返回缓存实例，否则调用 `build` 构造并写入。
    ///
    /// 其它线程正在构造同一个ID时等待它完成；等待会形成循环时返回循环依赖错误。
    pub(crate) fn get_or_try_insert<F>(
        &self,
        id: &str,
        context: &ResolutionContext,
        build: F,
    ) -> Result<Lookup>
    where
        F: FnOnce() -> Result<Instance>,
    {
        // 先取出槽位再释放分片锁，构造过程中会递归访问同一个缓存
        let slot = self
            .slots
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Slot::new()))
            .clone();

        let me = thread::current().id();
        let mut state = slot.state.lock();
        loop {
            match &*state {
                SlotState::Ready(instance) => return Ok(Lookup::Hit(instance.clone())),
                SlotState::Empty => break,
                SlotState::Building(owner) => {
                    let owner = *owner;
                    context.wait_for(owner, id)?;
                    tracing::trace!(service_id = id, "等待其它线程完成构造");
                    slot.changed.wait(&mut state);
                    context.stop_waiting();
                }
            }
        }
        *state = SlotState::Building(me);
        drop(state);

        let mut ticket = BuildTicket {
            slot: &slot,
            context,
            id,
            finished: false,
        };
        let instance = build()?;
        ticket.finish(Some(instance.clone()));
        Ok(Lookup::Built(instance))
    }

    pub fn get(&self, id: &str) -> Option<Instance> {
        let slot = self.slots.get(id)?.clone();
        slot.instance()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// 已经构造完成的ID（排序后返回）
    pub fn resolved_ids(&self) -> Vec<String> {
        let slots: Vec<(String, Arc<Slot>)> = self
            .slots
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let mut ids: Vec<String> = slots
            .into_iter()
            .filter(|(_, slot)| slot.instance().is_some())
            .map(|(id, _)| id)
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.resolved_ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for InstanceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceCache")
            .field("slots", &self.slots.len())
            .finish()
    }
}
