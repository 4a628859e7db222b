//! Unix domain socket server for the tray
//!
//! Provides request-response communication and pushes engine events to
//! subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::events::EngineEvent;

use super::protocol::{DaemonStatus, Notification, Request, Response};

/// Largest accepted message body
const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// What the tray menu can ask the daemon to do
pub trait TrayActions: Send + Sync {
    fn status(&self) -> DaemonStatus;

    /// Show the help popup
    fn show_help(&self);

    /// Swap in a freshly loaded code mapping, returning its size
    fn reload(&self) -> Result<usize>;

    fn set_show_welcome(&self, enabled: bool) -> Result<()>;

    /// Ask the daemon to exit
    fn quit(&self);
}

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    actions: Arc<dyn TrayActions>,
    events: broadcast::Sender<EngineEvent>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind the socket; must be called inside a runtime
    pub fn new(
        socket_path: &Path,
        actions: Arc<dyn TrayActions>,
        events: broadcast::Sender<EngineEvent>,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))
                .context("failed to restrict socket permissions")?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            actions,
            events,
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let actions = Arc::clone(&self.actions);
                    let events = self.events.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, actions, events) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    ///
    /// Requests are read on a separate task so event notifications can be
    /// written while the client is idle.
    async fn handle_client(
        stream: UnixStream,
        actions: Arc<dyn TrayActions>,
        events: broadcast::Sender<EngineEvent>,
    ) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();
        let (request_tx, mut request_rx) = mpsc::channel(16);

        let reader_task = tokio::spawn(async move {
            loop {
                let body = match read_frame(&mut reader).await {
                    Ok(Some(body)) => body,
                    Ok(None) => {
                        debug!("client disconnected");
                        return;
                    }
                    Err(e) => {
                        warn!(?e, "failed to read request");
                        return;
                    }
                };
                let request = serde_json::from_slice::<Request>(&body).map_err(|e| e.to_string());
                if request_tx.send(request).await.is_err() {
                    return;
                }
            }
        });

        let mut subscription: Option<broadcast::Receiver<EngineEvent>> = None;

        let result: Result<()> = async {
            loop {
                tokio::select! {
                    request = request_rx.recv() => {
                        let Some(request) = request else {
                            return Ok(());
                        };
                        let response = match request {
                            Ok(request) => {
                                debug!(?request, "received request");
                                if request == Request::Subscribe && subscription.is_none() {
                                    subscription = Some(events.subscribe());
                                    debug!("client subscribed to notifications");
                                }
                                Self::process_request(request, actions.as_ref())
                            }
                            Err(message) => Response::Error {
                                code: "bad_request".to_string(),
                                message,
                            },
                        };
                        send_message(&mut writer, &response).await?;
                    }
                    event = next_event(&mut subscription) => match event {
                        Ok(event) => {
                            send_message(&mut writer, &Notification::Event { event }).await?;
                        }
                        Err(RecvError::Lagged(n)) => {
                            warn!(skipped = n, "event subscriber lagged");
                        }
                        Err(RecvError::Closed) => {
                            subscription = None;
                        }
                    },
                }
            }
        }
        .await;

        reader_task.abort();
        result
    }

    /// Process a request and return a response
    fn process_request(request: Request, actions: &dyn TrayActions) -> Response {
        match request {
            Request::Ping => Response::Pong,

            Request::GetStatus => Response::Status(actions.status()),

            Request::ShowHelp => {
                actions.show_help();
                Response::Ok
            }

            Request::Reload => match actions.reload() {
                Ok(count) => Response::Reloaded { count },
                Err(e) => error_response("reload_failed", &e),
            },

            Request::SetShowWelcome { enabled } => match actions.set_show_welcome(enabled) {
                Ok(()) => Response::Ok,
                Err(e) => error_response("preferences_failed", &e),
            },

            Request::Subscribe => Response::Subscribed,

            Request::Quit => {
                info!("quit requested via IPC");
                actions.quit();
                Response::Ok
            }
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

fn error_response(code: &str, error: &anyhow::Error) -> Response {
    warn!(code, error = %error, "request failed");
    Response::Error {
        code: code.to_string(),
        message: format!("{error:#}"),
    }
}

/// Wait for the next event, or forever if not subscribed
async fn next_event(
    subscription: &mut Option<broadcast::Receiver<EngineEvent>>,
) -> Result<EngineEvent, RecvError> {
    match subscription {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Read a length-prefixed message body; `None` on clean EOF
async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_LEN {
        bail!("message too large: {len} bytes");
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Send a length-prefixed JSON message
async fn send_message<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: serde::Serialize,
{
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = u32::try_from(msg_bytes.len())
        .context("message too large")?
        .to_le_bytes();

    writer.write_all(&msg_len).await?;
    writer.write_all(&msg_bytes).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::calibration::Provenance;

    #[derive(Default)]
    struct FakeActions {
        help_shown: AtomicUsize,
        show_welcome: Mutex<Option<bool>>,
        quit: AtomicBool,
        fail_reload: AtomicBool,
    }

    impl TrayActions for FakeActions {
        fn status(&self) -> DaemonStatus {
            DaemonStatus {
                version: "test".to_string(),
                hotkey_active: true,
                calibrated_key: "KeyL".to_string(),
                calibration: Provenance::Detected,
                code_count: 2,
                show_welcome: true,
                uptime_secs: 0,
            }
        }

        fn show_help(&self) {
            self.help_shown.fetch_add(1, Ordering::SeqCst);
        }

        fn reload(&self) -> Result<usize> {
            if self.fail_reload.load(Ordering::SeqCst) {
                bail!("code file is corrupt");
            }
            Ok(42)
        }

        fn set_show_welcome(&self, enabled: bool) -> Result<()> {
            *self.show_welcome.lock().unwrap() = Some(enabled);
            Ok(())
        }

        fn quit(&self) {
            self.quit.store(true, Ordering::SeqCst);
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        server: Arc<Server>,
        actions: Arc<FakeActions>,
        events: broadcast::Sender<EngineEvent>,
        socket_path: PathBuf,
    }

    fn start() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("birdcode.sock");
        let actions = Arc::new(FakeActions::default());
        let (events, _) = broadcast::channel(16);
        let server = Arc::new(Server::new(&socket_path, actions.clone(), events.clone()).unwrap());

        let runner = Arc::clone(&server);
        tokio::spawn(async move { runner.run().await });

        Harness {
            _dir: dir,
            server,
            actions,
            events,
            socket_path,
        }
    }

    async fn request(stream: &mut UnixStream, request: &Request) -> Response {
        send_message(stream, request).await.unwrap();
        receive(stream).await
    }

    async fn receive<T: serde::de::DeserializeOwned>(stream: &mut UnixStream) -> T {
        let body = tokio::time::timeout(Duration::from_secs(2), read_frame(stream))
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_ping_and_status() {
        let harness = start();
        let mut stream = UnixStream::connect(&harness.socket_path).await.unwrap();

        assert_eq!(request(&mut stream, &Request::Ping).await, Response::Pong);
        let Response::Status(status) = request(&mut stream, &Request::GetStatus).await else {
            panic!("expected status");
        };
        assert_eq!(status.calibrated_key, "KeyL");
    }

    #[tokio::test]
    async fn test_actions_are_invoked() {
        let harness = start();
        let mut stream = UnixStream::connect(&harness.socket_path).await.unwrap();

        assert_eq!(request(&mut stream, &Request::ShowHelp).await, Response::Ok);
        assert_eq!(
            request(&mut stream, &Request::Reload).await,
            Response::Reloaded { count: 42 }
        );
        assert_eq!(
            request(&mut stream, &Request::SetShowWelcome { enabled: false }).await,
            Response::Ok
        );
        assert_eq!(request(&mut stream, &Request::Quit).await, Response::Ok);

        assert_eq!(harness.actions.help_shown.load(Ordering::SeqCst), 1);
        assert_eq!(*harness.actions.show_welcome.lock().unwrap(), Some(false));
        assert!(harness.actions.quit.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failed_reload_is_reported() {
        let harness = start();
        harness.actions.fail_reload.store(true, Ordering::SeqCst);
        let mut stream = UnixStream::connect(&harness.socket_path).await.unwrap();

        let Response::Error { code, message } = request(&mut stream, &Request::Reload).await else {
            panic!("expected error");
        };
        assert_eq!(code, "reload_failed");
        assert!(message.contains("corrupt"));
    }

    #[tokio::test]
    async fn test_malformed_request() {
        let harness = start();
        let mut stream = UnixStream::connect(&harness.socket_path).await.unwrap();

        send_message(&mut stream, &serde_json::json!({"type": "launch_rockets"}))
            .await
            .unwrap();
        let response: Response = receive(&mut stream).await;
        assert!(matches!(response, Response::Error { ref code, .. } if code == "bad_request"));

        // Connection stays usable
        assert_eq!(request(&mut stream, &Request::Ping).await, Response::Pong);
    }

    #[tokio::test]
    async fn test_subscribed_client_receives_events() {
        let harness = start();
        let mut stream = UnixStream::connect(&harness.socket_path).await.unwrap();

        assert_eq!(request(&mut stream, &Request::Subscribe).await, Response::Subscribed);
        harness.events.send(EngineEvent::CodesReloaded { count: 3 }).unwrap();

        let note: Notification = receive(&mut stream).await;
        assert_eq!(
            note,
            Notification::Event {
                event: EngineEvent::CodesReloaded { count: 3 }
            }
        );
    }

    #[tokio::test]
    async fn test_shutdown_removes_socket() {
        let harness = start();
        assert!(harness.socket_path.exists());
        harness.server.shutdown().await;
        assert!(!harness.socket_path.exists());
    }
}
