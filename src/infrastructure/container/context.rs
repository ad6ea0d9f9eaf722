//! 解析上下文
//!
//! 记录正在构造中的服务ID，用于循环依赖检测。根容器和从它派生的作用域容器
//! 共享同一个上下文，所以跨作用域的循环同样能被发现。每个线程有自己的构造栈：
//! 一条解析链总是在同一个线程里同步完成。
//!
//! 线程之间通过缓存槽位互相等待。上下文同时维护一张等待图（线程 → 它在等的槽位
//! 及其构造者），等待前沿着这张图走一遍，回到当前线程就是跨线程的循环依赖。

use crate::errors::{ContainerError, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::thread::{self, ThreadId};

/// 构造栈上的一帧：请求的ID，以及它实际构造的具体类型
#[derive(Debug, Clone)]
struct Frame {
    id: String,
    concrete: Option<String>,
}

impl Frame {
    fn matches(&self, name: &str) -> bool {
        self.id == name || self.concrete.as_deref() == Some(name)
    }
}

/// 一个线程正在等待的槽位
#[derive(Debug, Clone)]
pub(crate) struct Wait {
    owner: ThreadId,
    id: String,
}

/// 共享的解析上下文
#[derive(Debug, Default)]
pub struct ResolutionContext {
    stacks: DashMap<ThreadId, Vec<Frame>>,
    pub(crate) waits: Mutex<HashMap<ThreadId, Wait>>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 把ID压入当前线程的构造栈；ID已在栈上时返回循环依赖错误
    pub fn enter(&self, id: &str) -> Result<ResolutionGuard<'_>> {
        self.ensure_not_building(id)?;
        let thread = thread::current().id();
        self.stacks.entry(thread).or_default().push(Frame {
            id: id.to_string(),
            concrete: None,
        });
        Ok(ResolutionGuard {
            context: self,
            thread,
        })
    }

    /// 栈顶的ID绑定到了另一个具体类型：两者算同一帧
    pub fn building_as(&self, concrete: &str) -> Result<()> {
        let thread = thread::current().id();
        let already = self
            .stacks
            .get(&thread)
            .and_then(|stack| stack.last().map(|frame| frame.matches(concrete)))
            .unwrap_or(false);
        if already {
            return Ok(());
        }
        self.ensure_not_building(concrete)?;
        if let Some(mut stack) = self.stacks.get_mut(&thread) {
            if let Some(frame) = stack.last_mut() {
                frame.concrete = Some(concrete.to_string());
            }
        }
        Ok(())
    }

    /// 仅检查，不入栈
    pub fn ensure_not_building(&self, id: &str) -> Result<()> {
        let thread = thread::current().id();
        let Some(stack) = self.stacks.get(&thread) else {
            return Ok(());
        };
        match stack.iter().position(|frame| frame.matches(id)) {
            Some(start) => {
                let mut chain = vec![id.to_string()];
                chain.extend(stack[start + 1..].iter().map(|frame| frame.id.clone()));
                chain.push(id.to_string());
                Err(ContainerError::CircularDependency {
                    id: id.to_string(),
                    chain,
                })
            }
            None => Ok(()),
        }
    }

    /// 当前消费者：栈顶的服务ID
    pub fn current_consumer(&self) -> Option<String> {
        let thread = thread::current().id();
        self.stacks.get(&thread)?.last().map(|frame| frame.id.clone())
    }

    /// 当前线程的构造栈快照
    pub fn stack(&self) -> Vec<String> {
        let thread = thread::current().id();
        self.stacks
            .get(&thread)
            .map(|stack| stack.iter().map(|frame| frame.id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn is_building(&self, id: &str) -> bool {
        self.ensure_not_building(id).is_err()
    }

    /// 当前线程准备等待 `owner` 正在构造的 `id`。
    ///
    /// 等待链回到当前线程时返回循环依赖错误，否则登记等待关系。
    /// 调用方必须持有该槽位的锁，登记与检查因此是原子的。
    pub(crate) fn wait_for(&self, owner: ThreadId, id: &str) -> Result<()> {
        let me = thread::current().id();
        let mut waits = self.waits.lock();

        let mut hops = vec![Wait {
            owner,
            id: id.to_string(),
        }];
        let mut seen = HashSet::new();
        loop {
            let last = &hops[hops.len() - 1];
            if last.owner == me {
                let err = self.cross_thread_cycle(me, &hops);
                tracing::warn!(service_id = id, error = %err, "跨线程的循环依赖");
                return Err(err);
            }
            if !seen.insert(last.owner) {
                break;
            }
            match waits.get(&last.owner) {
                Some(next) => hops.push(next.clone()),
                None => break,
            }
        }

        waits.insert(
            me,
            Wait {
                owner,
                id: id.to_string(),
            },
        );
        Ok(())
    }

    /// 当前线程不再等待
    pub(crate) fn stop_waiting(&self) {
        let me = thread::current().id();
        self.waits.lock().remove(&me);
    }

    /// 当前线程结束了 `id` 的构造：等待它的线程不再算作被当前线程阻塞
    pub(crate) fn release_waiters(&self, id: &str) {
        let me = thread::current().id();
        self.waits
            .lock()
            .retain(|_, wait| !(wait.owner == me && wait.id == id));
    }

    /// 按等待链拼出完整的循环：当前线程的栈，经过每个被等待线程的栈，再回到起点
    fn cross_thread_cycle(&self, me: ThreadId, hops: &[Wait]) -> ContainerError {
        let closing = hops[hops.len() - 1].id.clone();
        let mut chain = vec![closing.clone()];
        if let Some(stack) = self.stacks.get(&me) {
            if let Some(start) = stack.iter().position(|frame| frame.matches(&closing)) {
                chain.extend(stack[start + 1..].iter().map(|frame| frame.id.clone()));
            }
        }
        for hop in hops {
            chain.push(hop.id.clone());
            if hop.owner == me {
                break;
            }
            if let Some(stack) = self.stacks.get(&hop.owner) {
                if let Some(start) = stack.iter().position(|frame| frame.matches(&hop.id)) {
                    chain.extend(stack[start + 1..].iter().map(|frame| frame.id.clone()));
                }
            }
        }
        ContainerError::CircularDependency { id: closing, chain }
    }

    fn leave(&self, thread: ThreadId) {
        let now_empty = match self.stacks.get_mut(&thread) {
            Some(mut stack) => {
                stack.pop();
                stack.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.stacks.remove_if(&thread, |_, stack| stack.is_empty());
        }
    }
}

/// 离开作用域时出栈；构造失败时同样出栈
#[must_use = "the id is popped as soon as the guard is dropped"]
pub struct ResolutionGuard<'a> {
    context: &'a ResolutionContext,
    thread: ThreadId,
}

impl Drop for ResolutionGuard<'_> {
    fn drop(&mut self) {
        self.context.leave(self.thread);
    }
}
