// src/server/mod.rs
use anyhow::{Context, Result};
use futures::stream;
use std::{
    collections::HashMap,
    convert::Infallible,
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
};
use tokio::{io::AsyncReadExt, sync::oneshot, task::JoinHandle};
use tracing::{error, info, warn};
use warp::{
    filters::BoxedFilter,
    http::{header, HeaderValue, StatusCode, Uri},
    hyper::Body,
    reply::{Reply, Response},
    Filter,
};

use crate::{
    catalog::{RunCatalog, RunsQuery},
    config::Config,
    error::DashboardError,
    ttyrec::{ProcessRetriever, Recording, RecordingRetriever},
};

pub mod diagnostic;

const RUNS_INFO: &str = "/runs_info";
const TTYREC_FILE: &str = "/ttyrec_file";
const CHUNK_SIZE: usize = 64 * 1024;

type Query = HashMap<String, String>;

/// Services shared by every request.
pub struct AppState {
    catalog: RunCatalog,
    retriever: Arc<dyn RecordingRetriever>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self::with_retriever(
            RunCatalog::new(config.data.clone()),
            Arc::new(ProcessRetriever::new(&config.recordings)),
        )
    }

    pub fn with_retriever(catalog: RunCatalog, retriever: Arc<dyn RecordingRetriever>) -> Self {
        Self { catalog, retriever }
    }
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// All routes: `/` redirect, the two API endpoints and, when a directory is
/// given, the dashboard's static files.
pub fn routes(state: Arc<AppState>, static_dir: Option<PathBuf>) -> BoxedFilter<(Response,)> {
    let index = warp::get()
        .and(warp::path::end())
        .map(|| warp::redirect::found(Uri::from_static("/dashboard.html")).into_response());

    let runs_route = warp::get()
        .and(warp::path("runs_info"))
        .and(warp::path::end())
        .and(with_state(state.clone()))
        .and(warp::query::<Query>())
        .and_then(runs_info);

    let ttyrec_route = warp::get()
        .and(warp::path("ttyrec_file"))
        .and(warp::path::end())
        .and(with_state(state))
        .and(warp::query::<Query>())
        .and_then(ttyrec_file);

    let api = index.or(runs_route).unify().or(ttyrec_route).unify();

    match static_dir {
        Some(dir) => api
            .or(warp::fs::dir(dir).map(|f: warp::fs::File| f.into_response()))
            .unify()
            .boxed(),
        None => api.boxed(),
    }
}

/// `GET /runs_info?path=&readLast=&recursively=`
async fn runs_info(state: Arc<AppState>, params: Query) -> Result<Response, Infallible> {
    let raw_path = params.get("path");
    let params_block = format!(
        "path: {}\nreadLast: {}\nrecursively: {}",
        diagnostic::param(raw_path),
        diagnostic::param(params.get("readLast")),
        diagnostic::param(params.get("recursively")),
    );

    let read_last = match params.get("readLast").map(|s| s.trim().parse::<usize>()) {
        None => None,
        Some(Ok(n)) => Some(n),
        Some(Err(_)) => {
            let e = DashboardError::Validation(format!(
                "readLast must be a non-negative integer, got `{}`",
                diagnostic::param(params.get("readLast"))
            ));
            return Ok(runs_info_error(&state, e, &params_block));
        }
    };
    let query = RunsQuery {
        path: raw_path.map(PathBuf::from),
        read_last,
        recursive: params.get("recursively").map(String::as_str) == Some("true"),
    };

    match state.catalog.list_runs(query).await {
        Ok(table) => Ok(warp::reply::json(&table).into_response()),
        Err(e) => Ok(runs_info_error(&state, e, &params_block)),
    }
}

fn runs_info_error(state: &AppState, err: DashboardError, params_block: &str) -> Response {
    match err {
        DashboardError::NotFound { path, pattern } => {
            warn!(path = %path.display(), "no stats file found");
            let expected = pattern
                .unwrap_or_else(|| path.join(&state.catalog.config().stats).display().to_string());
            diagnostic::reply(
                StatusCode::NOT_FOUND,
                RUNS_INFO,
                params_block,
                &format!(
                    "No available stats file has been found.\nPath: {}.\nStats file (not found): {}.",
                    path.display(),
                    expected
                ),
            )
        }
        DashboardError::Validation(msg) => {
            warn!(%msg, "rejected runs_info request");
            diagnostic::reply(StatusCode::BAD_REQUEST, RUNS_INFO, params_block, &msg)
        }
        other => {
            error!(error = ?other, "runs_info failed");
            diagnostic::reply(StatusCode::INTERNAL_SERVER_ERROR, RUNS_INFO, "", "")
        }
    }
}

/// `GET /ttyrec_file?ttyrec=&datapath=`
async fn ttyrec_file(state: Arc<AppState>, params: Query) -> Result<Response, Infallible> {
    let params_block = format!(
        "ttyrec: {}\ndatapath: {}",
        diagnostic::param(params.get("ttyrec")),
        diagnostic::param(params.get("datapath")),
    );
    let (Some(ttyrec), Some(_datapath)) = (params.get("ttyrec"), params.get("datapath")) else {
        warn!("ttyrec_file called without ttyrec/datapath");
        return Ok(diagnostic::reply(
            StatusCode::BAD_REQUEST,
            TTYREC_FILE,
            &params_block,
            "Both ttyrec and datapath must be passed to /ttyrec_file.",
        ));
    };

    let retrieved = match state.catalog.confine(PathBuf::from(ttyrec)).await {
        Ok(path) => state.retriever.retrieve(&path).await,
        Err(e) => Err(e),
    };
    let recording = match retrieved {
        Ok(r) => r,
        Err(DashboardError::Validation(msg)) => {
            warn!(%msg, "rejected ttyrec_file request");
            return Ok(diagnostic::reply(
                StatusCode::BAD_REQUEST,
                TTYREC_FILE,
                &params_block,
                &msg,
            ));
        }
        Err(DashboardError::NotFound { path, .. }) => {
            warn!(path = %path.display(), "recording not found");
            return Ok(diagnostic::reply(
                StatusCode::NOT_FOUND,
                TTYREC_FILE,
                &params_block,
                &format!("File {} not found.", path.display()),
            ));
        }
        Err(e) => {
            error!(error = ?e, "ttyrec_file failed");
            return Ok(diagnostic::reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                TTYREC_FILE,
                "",
                "",
            ));
        }
    };

    match stream_recording(recording).await {
        Ok(resp) => {
            info!(ttyrec = %ttyrec, "serving recording");
            Ok(resp)
        }
        Err(e) => {
            error!(error = ?e, "opening decompressed recording failed");
            Ok(diagnostic::reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                TTYREC_FILE,
                "",
                "",
            ))
        }
    }
}

/// Stream the file in chunks; the recording (and its temp dir) lives until
/// the body is exhausted.
async fn stream_recording(recording: Recording) -> Result<Response> {
    let file = tokio::fs::File::open(recording.path())
        .await
        .with_context(|| format!("opening {}", recording.path().display()))?;
    let len = file.metadata().await?.len();

    let chunks = stream::try_unfold((file, recording), |(mut file, recording)| async move {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let n = file.read(&mut buf).await?;
        buf.truncate(n);
        Ok::<_, std::io::Error>((n > 0).then(|| (buf, (file, recording))))
    });

    let mut resp = Response::new(Body::wrap_stream(chunks));
    let headers = resp.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    Ok(resp)
}

/// A running HTTP server. Dropping it without [`Server::stop`] leaves the
/// listener task running until the runtime shuts down.
pub struct Server {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl Server {
    /// Bind `0.0.0.0:<server_port>` and start serving. Must be called from
    /// inside a tokio runtime.
    pub fn start(config: &Config) -> Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
        let state = Arc::new(AppState::new(config));
        Self::start_with(addr, state, config.static_dir.clone())
    }

    pub fn start_with(
        addr: SocketAddr,
        state: Arc<AppState>,
        static_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let (tx, rx) = oneshot::channel::<()>();
        let routes = routes(state, static_dir).with(warp::trace::request());
        let (bound, serving) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(addr, async move {
                rx.await.ok();
            })
            .with_context(|| {
                format!(
                    "port {} already in use; another dashboard server may be running \
                     (look for it with `ps aux | grep nle-dashboard` and stop it)",
                    addr.port()
                )
            })?;

        info!(addr = %bound, "server listening");
        Ok(Self {
            addr: bound,
            shutdown: tx,
            handle: tokio::spawn(serving),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.handle.await.context("server task panicked")?;
        info!("server stopped");
        Ok(())
    }
}
