//! Session bootstrap and readiness
//!
//! A [`Session`] materialises the service description into a private
//! temporary directory, opens a transport client against it and binds
//! NTLM credentials. The outcome is published exactly once through a
//! `watch` channel, so every waiter sees either `Ready` or the error
//! that made the bootstrap fail.

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::transport::{FileStore, SoapClient, Transport};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Service description handed to the transport.
pub const SERVICES_FILE: &str = "Services.wsdl";
/// Schema imported by the service description.
pub const MESSAGES_FILE: &str = "messages.xsd";
/// Schema imported by the service description.
pub const TYPES_FILE: &str = "types.xsd";
/// Token in `Services.wsdl` replaced by the configured endpoint.
pub const ENDPOINT_PLACEHOLDER: &str = "%%EXCHANGE_ASMX_ENDPOINT_LOCATION%%";

/// Lifecycle of a [`Session`].
#[derive(Debug, Clone)]
pub enum SessionState {
    Connecting,
    Ready,
    Failed(Arc<Error>),
}

/// Single-resolution readiness signal.
struct Readiness {
    tx: watch::Sender<SessionState>,
}

impl Readiness {
    fn new() -> (Self, watch::Receiver<SessionState>) {
        let (tx, rx) = watch::channel(SessionState::Connecting);
        (Self { tx }, rx)
    }

    /// Move out of `Connecting`. Any later transition is refused.
    fn signal(&self, next: SessionState) -> Result<()> {
        let accepted = self.tx.send_if_modified(|state| {
            if matches!(state, SessionState::Connecting) {
                *state = next;
                true
            } else {
                false
            }
        });
        if accepted {
            Ok(())
        } else {
            Err(Error::AlreadySignalled)
        }
    }
}

#[derive(Default)]
struct Shared {
    client: OnceLock<Box<dyn SoapClient>>,
    workdir: OnceLock<TempDir>,
}

/// An authenticated connection to an Exchange server.
pub struct Session {
    shared: Arc<Shared>,
    state: watch::Receiver<SessionState>,
    bootstrap: JoinHandle<()>,
}

impl Session {
    /// Start connecting in the background and return immediately.
    ///
    /// Must be called from within a tokio runtime. Use
    /// [`Session::ready`] to wait for the outcome.
    pub fn new(
        config: SessionConfig,
        files: Arc<dyn FileStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (readiness, state) = Readiness::new();
        let shared = Arc::new(Shared::default());

        let bootstrap = tokio::spawn({
            let shared = Arc::clone(&shared);
            async move {
                let outcome =
                    provision(&config, files.as_ref(), transport.as_ref(), &shared).await;
                let next = match outcome {
                    Ok(()) => {
                        info!("Connected to {}", config.endpoint);
                        SessionState::Ready
                    }
                    Err(e) => {
                        error!("Failed to connect to {}: {}", config.endpoint, e);
                        SessionState::Failed(Arc::new(e))
                    }
                };
                if let Err(e) = readiness.signal(next) {
                    error!("{}", e);
                }
            }
        });

        Self {
            shared,
            state,
            bootstrap,
        }
    }

    /// Build a session and wait until it is ready.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionFailed`] wrapping the bootstrap error.
    pub async fn connect(
        config: SessionConfig,
        files: Arc<dyn FileStore>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let session = Self::new(config, files, transport);
        session.ready().await?;
        Ok(session)
    }

    /// Wait for the bootstrap to finish.
    ///
    /// Resolves immediately if it already has; any number of callers
    /// may wait concurrently and each observes the same outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionFailed`] if the bootstrap failed, or
    /// [`Error::NotReady`] if it stopped without reporting an outcome.
    pub async fn ready(&self) -> Result<()> {
        let mut state = self.state.clone();
        let outcome = state
            .wait_for(|s| !matches!(s, SessionState::Connecting))
            .await
            .map(|current| current.clone());
        let Ok(outcome) = outcome else {
            warn!("Session bootstrap ended without signalling readiness");
            return Err(Error::NotReady);
        };
        match outcome {
            SessionState::Failed(cause) => Err(Error::SessionFailed(cause)),
            SessionState::Ready | SessionState::Connecting => Ok(()),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Directory the service description was written to, once ready.
    #[must_use]
    pub fn workdir(&self) -> Option<&Path> {
        self.shared.workdir.get().map(TempDir::path)
    }

    /// The open client, or why there is none.
    pub(crate) fn client(&self) -> Result<&dyn SoapClient> {
        if let Some(client) = self.shared.client.get() {
            return Ok(client.as_ref());
        }
        let state = self.state.borrow().clone();
        match state {
            SessionState::Failed(cause) => Err(Error::SessionFailed(cause)),
            SessionState::Connecting | SessionState::Ready => Err(Error::NotReady),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.bootstrap.abort();
    }
}

async fn provision(
    config: &SessionConfig,
    files: &dyn FileStore,
    transport: &dyn Transport,
    shared: &Shared,
) -> Result<()> {
    let workdir = files.temp_dir().map_err(|source| Error::Provisioning {
        path: std::env::temp_dir(),
        source,
    })?;
    debug!(
        "Provisioning service description in {}",
        workdir.path().display()
    );

    let source = &config.description_dir;
    let (services, messages, types) = futures::try_join!(
        read(files, source.join(SERVICES_FILE)),
        read(files, source.join(MESSAGES_FILE)),
        read(files, source.join(TYPES_FILE)),
    )?;

    let services = String::from_utf8_lossy(&services);
    if !services.contains(ENDPOINT_PLACEHOLDER) {
        warn!("{} has no endpoint placeholder", SERVICES_FILE);
    }
    let services = services.replacen(ENDPOINT_PLACEHOLDER, &config.endpoint, 1);

    let target = workdir.path();
    let service_description = target.join(SERVICES_FILE);
    futures::try_join!(
        write(files, service_description.clone(), services.as_bytes()),
        write(files, target.join(MESSAGES_FILE), &messages),
        write(files, target.join(TYPES_FILE), &types),
    )?;

    let mut client = transport
        .create(&service_description, &config.transport_options())
        .await
        .map_err(Error::Connection)?;
    client
        .set_security(config.ntlm_security())
        .map_err(Error::Connection)?;
    debug!("Bound NTLM credentials for {}", config.username);

    if shared.client.set(client).is_err() || shared.workdir.set(workdir).is_err() {
        return Err(Error::AlreadySignalled);
    }
    Ok(())
}

async fn read(files: &dyn FileStore, path: PathBuf) -> Result<Vec<u8>> {
    match files.read(&path).await {
        Ok(contents) => Ok(contents),
        Err(source) => Err(Error::Provisioning { path, source }),
    }
}

async fn write(files: &dyn FileStore, path: PathBuf, contents: &[u8]) -> Result<()> {
    match files.write(&path, contents).await {
        Ok(()) => Ok(()),
        Err(source) => Err(Error::Provisioning { path, source }),
    }
}
