//! TCP front end: accepts controllers and hands each connection to the
//! dispatcher on its own task.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use ptrap_config::Config;
use ptrap_debug::{DebugSession, SessionOptions};
use ptrap_platform::ProcessControl;
use ptrap_scan::Scanner;

use crate::actor::{self, SessionHandle};
use crate::dispatch::serve_connection;
use crate::error::ServerError;

pub struct Server {
    listener: TcpListener,
    session: SessionHandle,
    actor: JoinHandle<()>,
    cancel: Arc<AtomicBool>,
}

impl Server {
    /// Bind the command listener and start the session actor over
    /// `control`.
    pub async fn bind(
        config: &Config,
        control: Box<dyn ProcessControl>,
    ) -> Result<Self, ServerError> {
        let listener =
            TcpListener::bind((config.server.bind.as_str(), config.server.port)).await?;

        let options = SessionOptions {
            notify_port: config.server.notify_port,
            connect_timeout: config.server.connect_timeout(),
        };
        let cancel = Arc::new(AtomicBool::new(false));
        let page_size = usize::try_from(config.scan.page_size)
            .unwrap_or(ptrap_scan::DEFAULT_PAGE_SIZE);
        let scanner = Scanner::new(page_size).with_cancel(Arc::clone(&cancel));
        let (session, actor) = actor::spawn(
            DebugSession::new(control, options),
            scanner,
            config.debug.interrupt_poll(),
        )?;

        info!(addr = %listener.local_addr()?, "listening");
        Ok(Self {
            listener,
            session,
            actor,
            cancel,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// A handle onto the session actor.
    pub fn session(&self) -> SessionHandle {
        self.session.clone()
    }

    /// Serve until Ctrl-C.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Ctrl-C handler unavailable");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serve until `shutdown` completes, then cancel any running scan,
    /// detach the session and stop the actor.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => spawn_connection(stream, peer, self.session.clone()),
                    Err(e) => warn!(error = %e, "accept failed"),
                },
            }
        }

        self.cancel.store(true, Ordering::Relaxed);
        self.session.shutdown();
        let actor = self.actor;
        match tokio::task::spawn_blocking(move || actor.join()).await {
            Ok(Ok(())) => debug!("session actor joined"),
            Ok(Err(_)) => warn!("session actor panicked"),
            Err(e) => warn!(error = %e, "could not join session actor"),
        }
        Ok(())
    }
}

fn spawn_connection(mut stream: TcpStream, peer: SocketAddr, session: SessionHandle) {
    tokio::spawn(async move {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(%peer, error = %e, "set_nodelay failed");
        }
        info!(%peer, "controller connected");
        match serve_connection(&mut stream, peer.ip(), &session).await {
            Ok(()) => info!(%peer, "controller disconnected"),
            Err(e) => warn!(%peer, error = %e, "connection dropped"),
        }
    });
}
