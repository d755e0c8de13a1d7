//! Test doubles for the joiner seam

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use hostns_core::{Error, Namespace, Result};

use crate::joiner::{Join, JoinOutput, JoinerFactory, Work};

type Responder = Arc<dyn Fn() -> Result<JoinOutput> + Send + Sync>;

/// Parameters of one requested joiner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    /// Target namespace directory
    pub namespace_directory: Option<PathBuf>,
    /// Requested namespaces
    pub namespaces: Vec<Namespace>,
    /// Caller-side timeout
    pub timeout: Duration,
}

/// Factory whose joiners never run the submitted work
///
/// Every run answers with the configured responder, after an optional delay.
/// A delay longer than a non-zero timeout produces [`Error::Timeout`], the
/// same way a slow real worker would.
///
/// # Example
/// ```
/// use hostns_namespace::fake::FakeJoinerFactory;
/// use hostns_namespace::JoinOutput;
///
/// let factory = FakeJoinerFactory::returning(|| Ok(JoinOutput::Text("x86_64".into())));
/// assert!(factory.requests().is_empty());
/// ```
#[derive(Clone)]
pub struct FakeJoinerFactory {
    responder: Responder,
    delay: Duration,
    requests: Arc<Mutex<Vec<JoinRequest>>>,
}

impl FakeJoinerFactory {
    /// Answer every run with `responder()`
    pub fn returning<F>(responder: F) -> Self
    where
        F: Fn() -> Result<JoinOutput> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            delay: Duration::ZERO,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer every run with `text`
    #[must_use]
    pub fn with_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::returning(move || Ok(JoinOutput::Text(text.clone())))
    }

    /// Wait `delay` before answering
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Joiners requested so far
    #[must_use]
    pub fn requests(&self) -> Vec<JoinRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for FakeJoinerFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeJoinerFactory")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl JoinerFactory for FakeJoinerFactory {
    fn joiner(
        &self,
        namespace_directory: Option<&Path>,
        namespaces: &[Namespace],
        timeout: Duration,
    ) -> Box<dyn Join> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(JoinRequest {
                namespace_directory: namespace_directory.map(Path::to_path_buf),
                namespaces: namespaces.to_vec(),
                timeout,
            });

        Box::new(FakeJoiner {
            responder: Arc::clone(&self.responder),
            delay: self.delay,
            timeout,
        })
    }
}

/// Joiner built by [`FakeJoinerFactory`]
pub struct FakeJoiner {
    responder: Responder,
    delay: Duration,
    timeout: Duration,
}

#[async_trait]
impl Join for FakeJoiner {
    async fn run(&self, _work: Work) -> Result<JoinOutput> {
        if !self.timeout.is_zero() && self.delay > self.timeout {
            tokio::time::sleep(self.timeout).await;
            return Err(Error::Timeout {
                operation: "waiting for fake joiner".to_string(),
                timeout: self.timeout,
            });
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        (self.responder)()
    }
}
