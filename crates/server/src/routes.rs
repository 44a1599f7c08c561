use std::io::Write;
use std::net::TcpStream;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use hautfit_core::camera::frame_hub::FrameHub;
use hautfit_core::detection::domain::face_locator::SharedFaceLocator;
use hautfit_core::pipeline::start_session_use_case::{StartSessionRequest, StartSessionUseCase};
use hautfit_core::session::session_recorder::SessionRecorder;
use hautfit_core::streaming::live_overlay_streamer::{LiveOverlayStreamer, StreamHandle};
use hautfit_core::streaming::mjpeg;

use crate::http::{
    read_request, write_json_response, write_response, write_stream_header, HttpError,
    HttpRequest,
};

/// Everything a request handler may touch.
pub struct AppState {
    pub hub: Arc<FrameHub>,
    pub locator: SharedFaceLocator,
    pub start_session: StartSessionUseCase,
    pub recorder: Arc<SessionRecorder>,
    pub ui_dir: PathBuf,
    pub jpeg_quality: u8,
    /// Handles of live streams, stopped together on shutdown.
    pub streams: Mutex<Vec<StreamHandle>>,
}

impl AppState {
    pub fn stop_streams(&self) {
        if let Ok(mut streams) = self.streams.lock() {
            for handle in streams.drain(..) {
                handle.stop();
            }
        }
    }

    fn track_stream(&self, handle: StreamHandle) {
        if let Ok(mut streams) = self.streams.lock() {
            streams.retain(|h| !h.is_stopped());
            streams.push(handle);
        }
    }
}

enum Route {
    Index,
    VideoFeed,
    StartCamera,
    Data,
    Static(String),
    MethodNotAllowed,
    NotFound,
}

fn route(method: &str, path: &str) -> Route {
    match (method, path) {
        ("GET", "/") => Route::Index,
        ("GET", "/video_feed") => Route::VideoFeed,
        ("POST", "/start-camera") => Route::StartCamera,
        ("GET", "/data") => Route::Data,
        (_, "/" | "/video_feed" | "/start-camera" | "/data") => Route::MethodNotAllowed,
        ("GET", p) => Route::Static(p.trim_start_matches('/').to_string()),
        ("POST", _) => Route::NotFound,
        _ => Route::MethodNotAllowed,
    }
}

pub fn handle_connection(mut stream: TcpStream, state: &AppState) -> Result<(), HttpError> {
    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(HttpError::Empty) => return Ok(()),
        Err(e) => {
            write_json_response(&mut stream, 400, &json!({"error": e.to_string()}))?;
            return Err(e);
        }
    };
    log::debug!("{} {}", request.method, request.path);

    match route(&request.method, &request.path) {
        Route::VideoFeed => stream_video(stream, state)?,
        other => dispatch(other, &request, &mut stream, state)?,
    }
    Ok(())
}

fn dispatch<W: Write>(
    route: Route,
    request: &HttpRequest,
    stream: &mut W,
    state: &AppState,
) -> std::io::Result<()> {
    match route {
        Route::Index => serve_static(stream, &state.ui_dir, "index.html"),
        Route::Static(path) => serve_static(stream, &state.ui_dir, &path),
        Route::StartCamera => start_camera(stream, request, state),
        Route::Data => data(stream, state),
        Route::MethodNotAllowed => {
            write_json_response(stream, 405, &json!({"error": "method not allowed"}))
        }
        Route::NotFound | Route::VideoFeed => {
            write_json_response(stream, 404, &json!({"error": "not found"}))
        }
    }
}

fn start_camera<W: Write>(
    stream: &mut W,
    request: &HttpRequest,
    state: &AppState,
) -> std::io::Result<()> {
    let body: StartSessionRequest = serde_json::from_slice(&request.body).unwrap_or_else(|e| {
        if !request.body.is_empty() {
            log::warn!("Ignoring malformed start request body: {e}");
        }
        StartSessionRequest::default()
    });

    match state.start_session.execute(&body) {
        Ok(merged) => write_json_response(
            stream,
            200,
            &json!({"message": "Camera session started", "data": Value::Object(merged)}),
        ),
        Err(e) => {
            log::error!("Session failed: {e}");
            write_json_response(stream, 500, &json!({"error": e.to_string()}))
        }
    }
}

fn data<W: Write>(stream: &mut W, state: &AppState) -> std::io::Result<()> {
    match state.recorder.query() {
        Ok(record) => write_json_response(stream, 200, &Value::Object(record)),
        Err(e) => {
            log::error!("Cannot read session: {e}");
            write_json_response(stream, 500, &json!({"error": e.to_string()}))
        }
    }
}

fn stream_video(mut stream: TcpStream, state: &AppState) -> std::io::Result<()> {
    let streamer = LiveOverlayStreamer::new(Box::new(state.hub.subscribe()), state.locator.clone())
        .with_jpeg_quality(state.jpeg_quality);
    let handle = streamer.handle();
    state.track_stream(handle.clone());

    write_stream_header(&mut stream, &mjpeg::content_type())?;
    for chunk in streamer {
        if let Err(e) = stream.write_all(&chunk).and_then(|_| stream.flush()) {
            log::info!("Video client went away: {e}");
            handle.stop();
            break;
        }
    }
    handle.stop();
    Ok(())
}

fn serve_static<W: Write>(stream: &mut W, root: &Path, rel: &str) -> std::io::Result<()> {
    let Some(path) = resolve_static(root, rel) else {
        log::warn!("Rejected static path '{rel}'");
        return write_json_response(stream, 404, &json!({"error": "not found"}));
    };
    match std::fs::read(&path) {
        Ok(bytes) => write_response(stream, 200, content_type_for(&path), &bytes),
        Err(_) => write_json_response(stream, 404, &json!({"error": "not found"})),
    }
}

/// Maps a request path onto a file under `root`. `None` for anything that
/// could escape it.
pub fn resolve_static(root: &Path, rel: &str) -> Option<PathBuf> {
    if rel.is_empty() || rel.contains('\\') || rel.contains('\0') {
        return None;
    }
    let mut path = root.to_path_buf();
    for component in Path::new(rel).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(path)
}

pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
