//! Task queue of the interactive thread.
//!
//! The thread that calls [`Looper::prepare`] owns the queue and the state the
//! tasks run against. Any other thread, including the background pool, gets a
//! [`MainHandle`] and can only post closures; they run later, in posting order,
//! when the owner drains the queue.

use anyhow::Result;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

type Task<S> = Box<dyn FnOnce(&mut S) + Send>;

pub struct Looper<S> {
    owner: ThreadId,
    sender: Sender<Task<S>>,
    receiver: Receiver<Task<S>>,
}

pub struct MainHandle<S> {
    sender: Sender<Task<S>>,
}

impl<S> Clone for MainHandle<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<S> MainHandle<S> {
    pub fn post<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.sender
            .send(Box::new(f))
            .map_err(|_| anyhow!("looper is gone"))
    }
}

impl<S> Looper<S> {
    pub fn prepare() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            owner: thread::current().id(),
            sender,
            receiver,
        }
    }

    pub fn handle(&self) -> MainHandle<S> {
        MainHandle {
            sender: self.sender.clone(),
        }
    }

    pub fn is_current_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    fn check_thread(&self) -> Result<()> {
        if !self.is_current_thread() {
            bail!(
                "looper of thread {:?} drained from {:?}",
                self.owner,
                thread::current().id()
            );
        }
        Ok(())
    }

    /// Runs every task already queued. Never blocks.
    pub fn run_pending(&self, state: &mut S) -> Result<usize> {
        self.check_thread()?;
        let mut count = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task(state);
            count += 1;
        }
        Ok(count)
    }

    /// Waits up to `timeout` for at least one task, then runs everything
    /// queued.
    pub fn run_with_timeout(&self, state: &mut S, timeout: Duration) -> Result<usize> {
        self.check_thread()?;
        match self.receiver.recv_timeout(timeout) {
            Ok(task) => {
                task(state);
                Ok(1 + self.run_pending(state)?)
            }
            Err(RecvTimeoutError::Timeout) => Ok(0),
            // unreachable while we hold a sender ourselves
            Err(RecvTimeoutError::Disconnected) => bail!("looper channel disconnected"),
        }
    }

    /// Runs tasks until `done` returns true or `timeout` elapses. Returns
    /// whether `done` was satisfied.
    pub fn run_until<P>(&self, state: &mut S, timeout: Duration, mut done: P) -> Result<bool>
    where
        P: FnMut(&S) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if done(state) {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            self.run_with_timeout(state, deadline - now)?;
        }
    }
}
