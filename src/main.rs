use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::Router;
use clap::Parser;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto::Builder as HttpBuilder;
use hyper_util::service::TowerToHyperService;
use prometheus_client::registry::Registry;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;
use tracing::{error, info};

use registry_admission::handlers::{self, AppState};
use registry_admission::health::{self, HealthState};
use registry_admission::metrics::AdmissionMetrics;
use registry_admission::{AdmissionEngine, WebhookConfig, tls};

#[derive(Parser)]
#[command(
    name = "registry-admission",
    about = "Kubernetes admission webhook that only admits images from trusted registries"
)]
struct Cli {
    /// Optional YAML file; environment variables take precedence over it
    #[arg(long, env = "REGISTRY_ADMISSION_CONFIG")]
    config: Option<PathBuf>,
}

async fn shutdown_signal(shutdown_tx: watch::Sender<()>) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => tokio::select! {
                _ = ctrl_c => info!("received CTRL+C, starting graceful shutdown"),
                _ = sigterm.recv() => info!("received SIGTERM, starting graceful shutdown"),
            },
            Err(e) => {
                error!("failed to install SIGTERM handler, only CTRL+C will stop the server: {e}");
                let _ = ctrl_c.await;
                info!("received CTRL+C, starting graceful shutdown");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = ctrl_c.await {
            error!("failed to listen for ctrl_c: {e}");
            std::future::pending::<()>().await;
        }
        info!("received CTRL+C, starting graceful shutdown");
    }

    let _ = shutdown_tx.send(());
}

async fn run_https_server(
    listener: TcpListener,
    tls_acceptor: TlsAcceptor,
    router: Router,
    ready: Arc<AtomicBool>,
    mut shutdown_rx: watch::Receiver<()>,
) {
    ready.store(true, Ordering::Relaxed);

    loop {
        let (tcp_stream, remote_addr) = tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("failed to accept TCP connection: {e}");
                        continue;
                    }
                }
            }
            _ = shutdown_rx.changed() => {
                info!("HTTPS server shutting down");
                break;
            }
        };

        let tls_acceptor = tls_acceptor.clone();
        let router = router.clone();

        tokio::spawn(async move {
            let tls_stream = match tls_acceptor.accept(tcp_stream).await {
                Ok(stream) => stream,
                Err(e) => {
                    error!(%remote_addr, "TLS handshake failed: {e}");
                    return;
                }
            };

            let io = TokioIo::new(tls_stream);
            let service = TowerToHyperService::new(router.into_service());

            if let Err(e) = HttpBuilder::new(hyper_util::rt::TokioExecutor::new())
                .serve_connection(io, service)
                .await
            {
                error!(%remote_addr, "error serving connection: {e}");
            }
        });
    }

    ready.store(false, Ordering::Relaxed);
}

async fn run_http_server(
    listener: TcpListener,
    router: Router,
    mut shutdown_rx: watch::Receiver<()>,
) {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
            info!("HTTP health/metrics server shutting down");
        })
        .await
        .unwrap_or_else(|e| error!("HTTP server error: {e}"));
}

fn parse_addr(name: &str, value: &str) -> SocketAddr {
    value.parse().unwrap_or_else(|e| {
        eprintln!("Invalid {name} '{value}': {e}");
        std::process::exit(1);
    })
}

async fn bind(addr: SocketAddr) -> TcpListener {
    TcpListener::bind(addr).await.unwrap_or_else(|e| {
        eprintln!("Failed to bind {addr}: {e}");
        std::process::exit(1);
    })
}

#[tokio::main]
async fn main() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("Failed to install default CryptoProvider");
        std::process::exit(1);
    }

    let cli = Cli::parse();

    let config = WebhookConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("Got malformed configuration: {e}");
        std::process::exit(1);
    });
    let policy = config.registry_policy().unwrap_or_else(|e| {
        eprintln!("Got malformed configuration: {e}");
        std::process::exit(1);
    });

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_filter())),
        )
        .init();

    info!(
        listen_on = %config.listen_on,
        metrics_on = %config.metrics_on,
        tls_cert = %config.tls_cert.display(),
        tls_key = %config.tls_key.display(),
        registries = ?policy.registries(),
        exempt_namespace = policy.exempt_namespace(),
        debug = config.debug,
        build_id = %config.build_id,
        "registry-admission starting"
    );

    let tls_config = tls::load_server_config(&config.tls_cert, &config.tls_key)
        .unwrap_or_else(|e| {
            eprintln!("Failed to load TLS config: {e}");
            std::process::exit(1);
        });
    let tls_acceptor = TlsAcceptor::from(tls_config);

    let mut registry = Registry::default();
    let metrics = AdmissionMetrics::new(&mut registry, &policy, &config.build_id);
    let registry = Arc::new(registry);

    let app_state = Arc::new(AppState {
        engine: AdmissionEngine::new(Arc::new(policy)),
        metrics,
    });
    let webhook_router = handlers::webhook_router(app_state);

    let ready = Arc::new(AtomicBool::new(false));
    let health_router = health::health_router(Arc::new(HealthState {
        registry,
        ready: ready.clone(),
    }));

    let listen_addr = parse_addr("LISTEN_ON", &config.listen_on);
    let metrics_addr = parse_addr("METRICS_ON", &config.metrics_on);

    let https_listener = bind(listen_addr).await;
    info!(addr = %listen_addr, "HTTPS webhook server listening");
    let http_listener = bind(metrics_addr).await;
    info!(addr = %metrics_addr, "HTTP health/metrics server listening");

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let https_shutdown_rx = shutdown_rx.clone();
    let http_shutdown_rx = shutdown_rx;

    tokio::spawn(shutdown_signal(shutdown_tx));

    tokio::join!(
        run_https_server(https_listener, tls_acceptor, webhook_router, ready, https_shutdown_rx),
        run_http_server(http_listener, health_router, http_shutdown_rx),
    );

    info!("registry-admission shut down gracefully");
}
