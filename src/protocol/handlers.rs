//! Route handlers for the drive API.
//!
//! Resolves each request to a [`Route`], checks the method, runs the drive
//! operation on the blocking pool and renders the JSON (or file) response.
//! Every failure is turned into a `{success: false, error}` body.

use log::{debug, warn};
use serde::Deserialize;
use serde_json::json;
use std::io;
use std::sync::Arc;

use crate::drive::Drive;
use crate::error::{DriveError, ProtocolError};
use crate::protocol::encoding::content_disposition;
use crate::protocol::multipart;
use crate::protocol::request::Request;
use crate::protocol::response::{METHOD_NOT_ALLOWED, NOT_FOUND, Response};
use crate::server::config::ServerConfig;
use crate::storage::descriptor::{WalkReport, format_size};
use crate::storage::results::Preview;
use crate::utils::network::local_ip;

/// Every endpoint the server answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Tree,
    Search,
    Stats,
    ServerInfo,
    Upload,
    CreateFolder,
    CreateFile,
    Rename,
    Move,
    Download,
    Preview,
    Delete,
    Restore,
    RestoreAll,
    EmptyTrash,
    PermanentDelete,
}

impl Route {
    pub fn from_path(path: &str) -> Option<Self> {
        let route = match path.trim_end_matches('/') {
            "/api/tree" => Route::Tree,
            "/api/search" => Route::Search,
            "/api/stats" => Route::Stats,
            "/api/server-info" => Route::ServerInfo,
            "/api/upload" => Route::Upload,
            "/api/create-folder" => Route::CreateFolder,
            "/api/create-file" => Route::CreateFile,
            "/api/rename" => Route::Rename,
            "/api/move" => Route::Move,
            "/api/download" => Route::Download,
            "/api/preview" => Route::Preview,
            "/api/delete" => Route::Delete,
            "/api/restore" | "/api/undo-delete" => Route::Restore,
            "/api/restore-all" => Route::RestoreAll,
            "/api/empty-trash" => Route::EmptyTrash,
            "/api/permanent-delete" => Route::PermanentDelete,
            _ => return None,
        };
        Some(route)
    }

    pub fn method(&self) -> &'static str {
        match self {
            Route::Tree
            | Route::Search
            | Route::Stats
            | Route::ServerInfo
            | Route::Download
            | Route::Preview => "GET",
            Route::Delete | Route::PermanentDelete => "DELETE",
            _ => "POST",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CreateBody {
    name: String,
    parent: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RenameBody {
    path: String,
    new_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MoveBody {
    source: String,
    target: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PathBody {
    path: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UndoBody {
    undo_id: String,
}

/// Dispatches a parsed request to its handler.
pub async fn handle_request(drive: Arc<Drive>, config: Arc<ServerConfig>, request: Request) -> Response {
    let Some(route) = Route::from_path(&request.path) else {
        return Response::error(NOT_FOUND, "not found");
    };
    if request.method != route.method() {
        return Response::error(
            METHOD_NOT_ALLOWED,
            format!("method {} not allowed on {}", request.method, request.path),
        )
        .with_header("Allow", route.method());
    }

    let result = match route {
        Route::Tree => handle_tree(drive).await,
        Route::Search => handle_search(drive, &request).await,
        Route::Stats => handle_stats(drive).await,
        Route::ServerInfo => handle_server_info(&config),
        Route::Upload => handle_upload(drive, request).await,
        Route::CreateFolder => handle_create(drive, &request, true).await,
        Route::CreateFile => handle_create(drive, &request, false).await,
        Route::Rename => handle_rename(drive, &request).await,
        Route::Move => handle_move(drive, &request).await,
        Route::Download => handle_download(drive, &request).await,
        Route::Preview => handle_preview(drive, &request).await,
        Route::Delete => handle_delete(drive, &request).await,
        Route::Restore => handle_restore(drive, &request).await,
        Route::RestoreAll => handle_restore_all(drive).await,
        Route::EmptyTrash => handle_empty_trash(drive).await,
        Route::PermanentDelete => handle_permanent_delete(drive, &request).await,
    };

    result.unwrap_or_else(|err| Response::from_error(&err))
}

async fn handle_tree(drive: Arc<Drive>) -> Result<Response, DriveError> {
    let (tree, report) = blocking(move || Ok(drive.tree())).await?;
    log_report("tree", &report);
    Ok(Response::ok(json!({ "tree": tree })))
}

async fn handle_search(drive: Arc<Drive>, request: &Request) -> Result<Response, DriveError> {
    let query = request.query_param("q").unwrap_or_default().to_string();
    let (results, report) = blocking(move || drive.search(&query)).await?;
    log_report("search", &report);
    Ok(Response::ok(json!({ "count": results.len(), "results": results })))
}

async fn handle_stats(drive: Arc<Drive>) -> Result<Response, DriveError> {
    let total = blocking(move || Ok(drive.total_size())).await?;
    Ok(Response::ok(json!({
        "total_size": total,
        "total_size_human": format_size(total),
    })))
}

fn handle_server_info(config: &ServerConfig) -> Result<Response, DriveError> {
    let ip = local_ip();
    Ok(Response::ok(json!({
        "local_ip": ip.to_string(),
        "port": config.port,
        "url": format!("http://{}:{}", ip, config.port),
    })))
}

async fn handle_upload(drive: Arc<Drive>, request: Request) -> Result<Response, DriveError> {
    let boundary = request
        .header("content-type")
        .and_then(multipart::boundary)
        .ok_or_else(|| ProtocolError::MalformedRequest("expected multipart/form-data".into()))?;
    let parts = multipart::parse(&request.body, &boundary)?;

    let folder = parts
        .iter()
        .find(|part| part.name == "folder")
        .map(|part| part.text())
        .unwrap_or_default();
    let file = parts
        .into_iter()
        .find(|part| part.name == "file")
        .ok_or(ProtocolError::MissingField("file"))?;
    let filename = file.filename.unwrap_or_default();
    debug!("Upload of {:?} ({} bytes) into {:?}", filename, file.data.len(), folder);

    let stored = blocking(move || drive.upload(&folder, &filename, &file.data)).await?;
    Ok(Response::ok(json!({ "file": stored })))
}

async fn handle_create(drive: Arc<Drive>, request: &Request, folder: bool) -> Result<Response, DriveError> {
    let body: CreateBody = request.json()?;
    if folder {
        let created = blocking(move || drive.create_folder(&body.parent, &body.name)).await?;
        Ok(Response::ok(json!({ "folder": created })))
    } else {
        let created = blocking(move || drive.create_file(&body.parent, &body.name)).await?;
        Ok(Response::ok(json!({ "file": created })))
    }
}

async fn handle_rename(drive: Arc<Drive>, request: &Request) -> Result<Response, DriveError> {
    let body: RenameBody = request.json()?;
    required(&body.path, "path")?;
    let item = blocking(move || drive.rename(&body.path, &body.new_name)).await?;
    Ok(Response::ok(json!({ "item": item })))
}

async fn handle_move(drive: Arc<Drive>, request: &Request) -> Result<Response, DriveError> {
    let body: MoveBody = request.json()?;
    required(&body.source, "source")?;
    let item = blocking(move || drive.move_item(&body.source, &body.target)).await?;
    Ok(Response::ok(json!({ "item": item })))
}

async fn handle_download(drive: Arc<Drive>, request: &Request) -> Result<Response, DriveError> {
    let path = request.query_param("path").unwrap_or_default().to_string();
    let target = blocking(move || drive.download(&path)).await?;
    Ok(
        Response::file(target.file_path, target.size, "application/octet-stream")
            .with_header("Content-Disposition", &content_disposition(&target.filename)),
    )
}

async fn handle_preview(drive: Arc<Drive>, request: &Request) -> Result<Response, DriveError> {
    let path = request.query_param("path").unwrap_or_default().to_string();
    match blocking(move || drive.preview(&path)).await? {
        Preview::Binary {
            file_path,
            size,
            content_type,
            ..
        } => Ok(Response::file(file_path, size, &content_type)),
        Preview::Text { filename, content } => Ok(Response::ok(json!({
            "type": "text",
            "content": content,
            "filename": filename,
        }))),
    }
}

async fn handle_delete(drive: Arc<Drive>, request: &Request) -> Result<Response, DriveError> {
    let body: PathBody = request.json()?;
    required(&body.path, "path")?;
    let deleted = blocking(move || drive.delete(&body.path)).await?;
    Ok(Response::ok(json!({
        "undo_id": deleted.undo_id,
        "item": deleted.item,
    })))
}

async fn handle_restore(drive: Arc<Drive>, request: &Request) -> Result<Response, DriveError> {
    let body: UndoBody = request.json()?;
    required(&body.undo_id, "undo_id")?;
    let item = blocking(move || drive.restore(&body.undo_id)).await?;
    Ok(Response::ok(json!({ "item": item })))
}

async fn handle_restore_all(drive: Arc<Drive>) -> Result<Response, DriveError> {
    let result = blocking(move || drive.restore_all()).await?;
    Ok(Response::ok(json!({
        "restored_count": result.restored_count,
        "failed_count": result.failed_count,
    })))
}

async fn handle_empty_trash(drive: Arc<Drive>) -> Result<Response, DriveError> {
    let deleted = blocking(move || drive.empty_trash()).await?;
    Ok(Response::ok(json!({ "deleted_count": deleted })))
}

async fn handle_permanent_delete(drive: Arc<Drive>, request: &Request) -> Result<Response, DriveError> {
    let body: UndoBody = request.json()?;
    required(&body.undo_id, "undo_id")?;
    blocking(move || drive.purge(&body.undo_id)).await?;
    Ok(Response::ok(json!({})))
}

/// Runs filesystem work on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, DriveError>
where
    F: FnOnce() -> Result<T, DriveError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| DriveError::IoError(io::Error::other(e)))?
}

fn required(value: &str, field: &'static str) -> Result<(), DriveError> {
    if value.trim().is_empty() {
        return Err(ProtocolError::MissingField(field).into());
    }
    Ok(())
}

fn log_report(operation: &str, report: &WalkReport) {
    if !report.is_clean() {
        warn!(
            "{} was partial: {} unreadable directories, {} skipped entries",
            operation,
            report.unreadable_dirs(),
            report.skipped_entries()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_lookup() {
        assert_eq!(Route::from_path("/api/tree"), Some(Route::Tree));
        assert_eq!(Route::from_path("/api/undo-delete"), Some(Route::Restore));
        assert_eq!(Route::from_path("/api/restore/"), Some(Route::Restore));
        assert_eq!(Route::from_path("/api/nope"), None);
    }

    #[test]
    fn test_route_methods() {
        assert_eq!(Route::Tree.method(), "GET");
        assert_eq!(Route::Upload.method(), "POST");
        assert_eq!(Route::Delete.method(), "DELETE");
        assert_eq!(Route::PermanentDelete.method(), "DELETE");
        assert_eq!(Route::EmptyTrash.method(), "POST");
    }

    #[test]
    fn test_required_rejects_blank() {
        assert!(required("  ", "path").is_err());
        assert!(required("a.txt", "path").is_ok());
    }
}
