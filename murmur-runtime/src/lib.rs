//! Tokio runtime and stop signal shared by the murmur binary.
//!
//! The runtime owns one [`CancellationToken`]. Long-running work watches it,
//! [`MurmurHandle::listen_for_shutdown`] raises it on SIGINT/SIGTERM, and
//! [`MurmurRuntime::shutdown`] raises it before tearing the runtime down.
mod signals;

use anyhow::Result;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use signals::wait_for_shutdown_signal;

#[derive(Clone)]
pub struct MurmurHandle {
    inner: Handle,
    cancel: CancellationToken,
}

pub struct MurmurRuntime {
    runtime: Runtime,
    cancel: CancellationToken,
}

impl MurmurRuntime {
    /// Build a multi-threaded runtime with IO and timers enabled.
    ///
    /// ```
    /// use murmur_runtime::MurmurRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = MurmurRuntime::build("doctest-runtime", Some(1))
    ///     .expect("runtime builds");
    /// let value = runtime.block_on(async { 2 + 2 });
    /// assert_eq!(value, 4);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn build(thread_name: &str, worker_threads: Option<usize>) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(thread_name);

        if let Some(workers) = worker_threads {
            builder.worker_threads(workers.max(1));
        }

        let runtime = builder.build()?;
        Ok(Self {
            runtime,
            cancel: CancellationToken::new(),
        })
    }

    /// ```
    /// use murmur_runtime::MurmurRuntime;
    ///
    /// let runtime = MurmurRuntime::build("handle-example", Some(1)).unwrap();
    /// assert!(!runtime.handle().cancellation().is_cancelled());
    /// ```
    pub fn handle(&self) -> MurmurHandle {
        MurmurHandle {
            inner: self.runtime.handle().clone(),
            cancel: self.cancel.clone(),
        }
    }

    pub fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Raise the stop signal, then give tasks `graceful` to finish.
    ///
    /// ```
    /// use murmur_runtime::MurmurRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = MurmurRuntime::build("shutdown-example", Some(1)).unwrap();
    /// let cancel = runtime.handle().cancellation();
    /// runtime.shutdown(Duration::from_millis(5));
    /// assert!(cancel.is_cancelled());
    /// ```
    pub fn shutdown(self, graceful: Duration) {
        self.cancel.cancel();
        self.runtime.shutdown_timeout(graceful);
    }
}

impl MurmurHandle {
    pub fn spawn<F, T>(&self, fut: F) -> JoinHandle<T>
    where
        F: std::future::Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.inner.spawn(fut)
    }

    /// The stop signal shared by every clone of this handle.
    ///
    /// ```
    /// use murmur_runtime::MurmurRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = MurmurRuntime::build("cancel-example", Some(1)).unwrap();
    /// let handle = runtime.handle();
    /// handle.cancellation().cancel();
    /// assert!(handle.cancellation().is_cancelled());
    /// runtime.shutdown(Duration::from_millis(5));
    /// ```
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn a task that raises the stop signal on the first SIGINT or SIGTERM.
    ///
    /// The task ends quietly if the signal is raised some other way first.
    pub fn listen_for_shutdown(&self) -> JoinHandle<()> {
        let cancel = self.cancel.clone();
        self.spawn(async move {
            tokio::select! {
                received = wait_for_shutdown_signal() => match received {
                    Ok(name) => {
                        tracing::warn!(signal = name, "shutdown requested; finishing current request");
                        cancel.cancel();
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "could not install signal handlers");
                    }
                },
                _ = cancel.cancelled() => {}
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_exits_when_cancelled_elsewhere() {
        let runtime = MurmurRuntime::build("listener-test", Some(1)).unwrap();
        let handle = runtime.handle();
        let listener = handle.listen_for_shutdown();
        handle.cancellation().cancel();
        runtime.block_on(async move {
            tokio::time::timeout(Duration::from_secs(1), listener)
                .await
                .expect("listener stops")
                .unwrap();
        });
        runtime.shutdown(Duration::from_millis(10));
    }

    #[test]
    fn spawned_tasks_see_shutdown() {
        let runtime = MurmurRuntime::build("spawn-test", Some(1)).unwrap();
        let handle = runtime.handle();
        let cancel = handle.cancellation();
        let task = handle.spawn(async move {
            cancel.cancelled().await;
            "stopped"
        });
        handle.cancellation().cancel();
        assert_eq!(runtime.block_on(task).unwrap(), "stopped");
        runtime.shutdown(Duration::from_millis(10));
    }
}
