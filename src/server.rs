//! HTTP front end
//!
//! A thin transport over [`crate::depot::Depot`]: routing, multipart and
//! JSON body parsing, cookie-scoped upload sessions, permissive CORS and
//! static file serving. A fixed pool of worker threads shares one
//! `tiny_http` server so a slow filesystem operation only stalls its own
//! worker. Every protocol decision stays in the depot; this module only
//! translates requests and collapses internal outcomes into the
//! client-visible contract (scene delete and rename-of-missing-source
//! always succeed).

use crate::depot::Depot;
use crate::error::{DepotError, Result};
use crate::types::SceneDocument;
use multipart::server::Multipart;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tiny_http::{Header, Method, Request, Response, Server};

/// Name of the cookie carrying the upload-batch session id
pub const SESSION_COOKIE: &str = "depot_session";

type HttpResponse = Response<Cursor<Vec<u8>>>;

/// Front-end configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address, e.g. `0.0.0.0:5000`
    pub listen: String,
    /// Directory served for `/` and other static paths
    pub public_dir: PathBuf,
    /// Worker threads handling requests
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:5000".to_string(),
            public_dir: PathBuf::from("public"),
            workers: 4,
        }
    }
}

/// Run the server until the listener fails; blocks the calling thread
pub fn run(depot: Arc<Depot>, config: ServerConfig) -> Result<()> {
    let server = Server::http(&config.listen).map_err(|e| {
        DepotError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("failed to bind {}: {}", config.listen, e),
        ))
    })?;
    log::info!("listening on {}", config.listen);

    let server = Arc::new(server);
    let config = Arc::new(config);
    let mut handles = Vec::new();
    for worker in 0..config.workers.max(1) {
        let server = Arc::clone(&server);
        let depot = Arc::clone(&depot);
        let config = Arc::clone(&config);
        let handle = std::thread::Builder::new()
            .name(format!("depot-worker-{}", worker))
            .spawn(move || loop {
                match server.recv() {
                    Ok(request) => handle_request(&depot, &config, request),
                    Err(e) => {
                        log::error!("listener failed: {}", e);
                        break;
                    }
                }
            })?;
        handles.push(handle);
    }
    for handle in handles {
        let _ = handle.join();
    }
    Ok(())
}

fn handle_request(depot: &Depot, config: &ServerConfig, mut request: Request) {
    let method = request.method().clone();
    let url = request.url().to_string();
    log::debug!("{} {}", method, url);

    if method == Method::Options {
        respond(request, Response::from_data(Vec::new()).with_status_code(204));
        return;
    }

    let path = url.split('?').next().unwrap_or(&url);
    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(decode_segment)
        .collect();
    let segs: Vec<&str> = segments.iter().map(String::as_str).collect();

    let response = match (&method, segs.as_slice()) {
        (Method::Post, ["upload"]) => handle_upload(depot, &mut request),
        (Method::Post, ["save-scene"]) => handle_save_scene(depot, &mut request),
        (Method::Get, ["list-scenes"]) => handle_list_scenes(depot),
        (Method::Get, ["scenes", filename]) => handle_get_scene(depot, filename),
        (Method::Delete, ["scenes", filename]) => {
            // always succeeds; the outcome distinction stays internal
            let outcome = depot.delete_scene(filename);
            log::debug!("delete {} -> {:?}", filename, outcome);
            json_ok(json!({ "success": true }))
        }
        (Method::Post, ["scenes", filename, "rename"]) => handle_rename(depot, filename, &mut request),
        (Method::Post, ["save-original-image"]) => handle_save_original_image(depot, &mut request),
        (Method::Get, ["original-images", filename]) => handle_get_image(depot, filename),
        (Method::Delete, ["original-images", scene, index]) => {
            match index.parse::<usize>() {
                Ok(model_index) => match depot.delete_original_image(scene, model_index) {
                    Ok(()) => json_ok(json!({ "success": true })),
                    Err(e) => depot_error(e),
                },
                Err(_) => error_json(400, "invalid model index"),
            }
        }
        (Method::Post, ["migrate-original-image"]) => handle_migrate(depot, &mut request),
        (Method::Get, ["export-scene", filename]) => handle_export(depot, filename),
        (Method::Get, ["uploads", batch, filename]) => handle_get_upload(depot, batch, filename),
        (Method::Get, rest) => serve_public(&config.public_dir, rest),
        _ => error_json(404, "not found"),
    };

    respond(request, response);
}

// ---- route handlers ----

fn handle_upload(depot: &Depot, request: &mut Request) -> HttpResponse {
    if let Some(len) = request.body_length() {
        if len as u64 > depot.max_upload_bytes() {
            return error_json(413, "upload too large");
        }
    }
    let (session, minted) = session_from(request);

    let Some(boundary) = multipart_boundary(request) else {
        return error_json(400, "expected multipart form data");
    };
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut multipart = Multipart::with_body(request.as_reader(), boundary);
    let walked = multipart.foreach_entry(|mut entry| {
        if &*entry.headers.name == "file" {
            let name = entry.headers.filename.clone().unwrap_or_default();
            let mut buf = Vec::new();
            if entry.data.read_to_end(&mut buf).is_ok() {
                file = Some((name, buf));
            }
        }
    });
    if let Err(e) = walked {
        return error_json(400, &format!("malformed upload: {}", e));
    }
    let Some((name, data)) = file else {
        return error_json(400, "no file in request");
    };
    if name.is_empty() {
        return error_json(400, "no file selected");
    }

    match depot.accept_upload(&session, &name, &data) {
        Ok(receipt) => {
            let mut response = json_ok(json!({
                "success": true,
                "filename": receipt.filename,
                "filepath": receipt.filepath,
            }));
            if minted {
                if let Some(h) = try_header(
                    "Set-Cookie",
                    &format!("{}={}; Path=/", SESSION_COOKIE, session),
                ) {
                    response.add_header(h);
                }
            }
            response
        }
        Err(e) => depot_error(e),
    }
}

fn handle_save_scene(depot: &Depot, request: &mut Request) -> HttpResponse {
    let doc: SceneDocument = match serde_json::from_reader(request.as_reader()) {
        Ok(doc) => doc,
        Err(_) => return error_json(400, "invalid request body"),
    };
    match depot.save_scene(doc) {
        Ok(filename) => json_ok(json!({ "success": true, "filename": filename })),
        Err(e) => depot_error(e),
    }
}

fn handle_list_scenes(depot: &Depot) -> HttpResponse {
    match depot.list_scenes() {
        Ok(scenes) => json_ok(json!(scenes)),
        Err(e) => depot_error(e),
    }
}

fn handle_get_scene(depot: &Depot, filename: &str) -> HttpResponse {
    match depot.load_scene(filename) {
        Ok(doc) => match serde_json::to_value(&doc) {
            Ok(value) => json_ok(value),
            Err(e) => depot_error(e.into()),
        },
        Err(e) => depot_error(e),
    }
}

fn handle_rename(depot: &Depot, filename: &str, request: &mut Request) -> HttpResponse {
    let body: Value = match serde_json::from_reader(request.as_reader()) {
        Ok(value) => value,
        Err(_) => return error_json(400, "invalid request body"),
    };
    let new_name = match body.get("newName").and_then(Value::as_str) {
        Some(name) if !name.trim().is_empty() => name,
        _ => return error_json(400, "new name must not be empty"),
    };
    match depot.rename_scene(filename, new_name) {
        Ok(outcome) => json_ok(json!({
            "success": true,
            "newFilename": outcome.new_filename(),
        })),
        Err(e) => depot_error(e),
    }
}

fn handle_save_original_image(depot: &Depot, request: &mut Request) -> HttpResponse {
    if let Some(len) = request.body_length() {
        if len as u64 > depot.max_upload_bytes() {
            return error_json(413, "upload too large");
        }
    }
    let Some(boundary) = multipart_boundary(request) else {
        return error_json(400, "expected multipart form data");
    };
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut scene_name: Option<String> = None;
    let mut model_index: Option<String> = None;

    let mut multipart = Multipart::with_body(request.as_reader(), boundary);
    let walked = multipart.foreach_entry(|mut entry| {
        let mut buf = Vec::new();
        if entry.data.read_to_end(&mut buf).is_err() {
            return;
        }
        match &*entry.headers.name {
            "file" => {
                let name = entry.headers.filename.clone().unwrap_or_default();
                file = Some((name, buf));
            }
            "sceneName" => scene_name = Some(String::from_utf8_lossy(&buf).into_owned()),
            "modelIndex" => model_index = Some(String::from_utf8_lossy(&buf).trim().to_string()),
            _ => {}
        }
    });
    if let Err(e) = walked {
        return error_json(400, &format!("malformed upload: {}", e));
    }

    let Some((name, data)) = file else {
        return error_json(400, "no file in request");
    };
    let Some(scene) = scene_name.filter(|s| !s.trim().is_empty()) else {
        return error_json(400, "sceneName is required");
    };
    let Some(index) = model_index.and_then(|s| s.parse::<usize>().ok()) else {
        return error_json(400, "invalid model index");
    };

    match depot.save_original_image(&scene, index, &name, &data) {
        Ok(filename) => json_ok(json!({ "success": true, "filename": filename })),
        Err(e) => depot_error(e),
    }
}

#[derive(Deserialize)]
struct MigrateBody {
    #[serde(rename = "oldSceneName")]
    old_scene_name: String,
    #[serde(rename = "newSceneName")]
    new_scene_name: String,
    #[serde(rename = "modelIndex")]
    model_index: usize,
}

fn handle_migrate(depot: &Depot, request: &mut Request) -> HttpResponse {
    let body: MigrateBody = match serde_json::from_reader(request.as_reader()) {
        Ok(body) => body,
        Err(_) => return error_json(400, "invalid request body"),
    };
    match depot.migrate_original_image(&body.old_scene_name, &body.new_scene_name, body.model_index) {
        Ok(filename) => json_ok(json!({ "success": true, "filename": filename })),
        Err(e) => depot_error(e),
    }
}

fn handle_export(depot: &Depot, filename: &str) -> HttpResponse {
    match depot.export_scene(filename) {
        Ok(archive) => {
            let mut response = Response::from_data(archive.bytes)
                .with_header(header("Content-Type", "application/zip"));
            if let Some(h) = try_header("Content-Disposition", &disposition(&archive.filename)) {
                response.add_header(h);
            }
            response
        }
        Err(e) => depot_error(e),
    }
}

fn handle_get_upload(depot: &Depot, batch: &str, filename: &str) -> HttpResponse {
    match depot.store().upload_path(batch, filename) {
        Ok(path) => serve_file(&path),
        Err(e) => depot_error(e),
    }
}

fn handle_get_image(depot: &Depot, filename: &str) -> HttpResponse {
    match depot.store().image_path(filename) {
        Ok(path) => serve_file(&path),
        Err(e) => depot_error(e),
    }
}

fn serve_public(public_dir: &Path, segments: &[&str]) -> HttpResponse {
    if segments.iter().any(|s| *s == "..") {
        return error_json(404, "not found");
    }
    let mut path = public_dir.to_path_buf();
    if segments.is_empty() {
        path.push("index.html");
    } else {
        for segment in segments {
            path.push(segment);
        }
    }
    serve_file(&path)
}

fn serve_file(path: &Path) -> HttpResponse {
    match fs::read(path) {
        Ok(bytes) => {
            Response::from_data(bytes).with_header(header("Content-Type", content_type_for(path)))
        }
        Err(_) => error_json(404, "file not found"),
    }
}

// ---- plumbing ----

/// Boundary token from a `multipart/form-data` content type, if any
fn multipart_boundary(request: &Request) -> Option<String> {
    for h in request.headers() {
        if h.field.equiv("Content-Type") {
            let value = h.value.as_str();
            if !value.trim_start().starts_with("multipart/form-data") {
                continue;
            }
            for part in value.split(';') {
                if let Some(boundary) = part.trim().strip_prefix("boundary=") {
                    return Some(boundary.trim_matches('"').to_string());
                }
            }
        }
    }
    None
}

fn decode_segment(segment: &str) -> String {
    match urlencoding::decode(segment) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => segment.to_string(),
    }
}

/// Session id from the request cookie; mints a fresh one when absent.
/// The second value says whether a `Set-Cookie` must go out.
fn session_from(request: &Request) -> (String, bool) {
    for h in request.headers() {
        if h.field.equiv("Cookie") {
            for part in h.value.as_str().split(';') {
                if let Some(value) = part.trim().strip_prefix(SESSION_COOKIE) {
                    if let Some(value) = value.strip_prefix('=') {
                        if !value.is_empty() {
                            return (value.to_string(), false);
                        }
                    }
                }
            }
        }
    }
    (uuid::Uuid::new_v4().to_string(), true)
}

fn disposition(filename: &str) -> String {
    if filename.is_ascii() {
        format!("attachment; filename=\"{}\"", filename)
    } else {
        format!(
            "attachment; filename=\"export.zip\"; filename*=UTF-8''{}",
            urlencoding::encode(filename)
        )
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "application/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("obj") | Some("mtl") => "text/plain; charset=utf-8",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

fn header(name: &str, value: &str) -> Header {
    // only called with static ASCII values
    Header::from_bytes(name.as_bytes(), value.as_bytes()).unwrap()
}

fn try_header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

fn json_ok(value: Value) -> HttpResponse {
    json_response(200, value)
}

fn error_json(status: u16, message: &str) -> HttpResponse {
    json_response(status, json!({ "error": message }))
}

fn json_response(status: u16, value: Value) -> HttpResponse {
    Response::from_data(value.to_string().into_bytes())
        .with_status_code(status)
        .with_header(header("Content-Type", "application/json; charset=utf-8"))
}

/// Map depot errors onto the reported-failure tier
fn depot_error(e: DepotError) -> HttpResponse {
    let status = match &e {
        DepotError::SceneNotFound(_) | DepotError::ImageNotFound { .. } => 404,
        DepotError::SceneExists(_)
        | DepotError::UnsupportedExtension(_)
        | DepotError::InvalidFilename(_)
        | DepotError::InvalidRequest(_) => 400,
        DepotError::UploadTooLarge { .. } => 413,
        DepotError::Archive(_) | DepotError::Io(_) | DepotError::Serde(_) => 500,
    };
    if status == 500 {
        log::error!("request failed: {}", e);
    }
    error_json(status, &e.to_string())
}

fn respond(request: Request, mut response: HttpResponse) {
    // permissive CORS on every response, as the original deployment did
    response.add_header(header("Access-Control-Allow-Origin", "*"));
    response.add_header(header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS"));
    response.add_header(header("Access-Control-Allow-Headers", "Content-Type, Authorization"));
    response.add_header(header("Access-Control-Allow-Credentials", "true"));
    if let Err(e) = request.respond(response) {
        log::warn!("failed to send response: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_mapping() {
        assert_eq!(content_type_for(Path::new("index.html")), "text/html; charset=utf-8");
        assert_eq!(content_type_for(Path::new("a/mesh.OBJ")), "text/plain; charset=utf-8");
        assert_eq!(content_type_for(Path::new("x.bin")), "application/octet-stream");
    }

    #[test]
    fn test_disposition_for_non_ascii_names() {
        assert_eq!(disposition("demo_1.zip"), "attachment; filename=\"demo_1.zip\"");
        let d = disposition("场景_1.zip");
        assert!(d.contains("filename*=UTF-8''"));
        assert!(d.contains("export.zip"));
    }

    #[test]
    fn test_decode_segment() {
        assert_eq!(decode_segment("scene-25%2008.json"), "scene-25 08.json");
        assert_eq!(decode_segment("plain"), "plain");
    }
}
