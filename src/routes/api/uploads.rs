use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use rocket::form::Form;
use rocket::fs::{NamedFile, TempFile};
use rocket::State;
use serde::Serialize;
use serde_json::json;

use crate::boot::UPLOADS_DIR;
use crate::models::attachment::{Attachment, AttachmentForm};
use crate::routes::{done, ok, reject, ApiResult};
use crate::security::auth::AuthorUser;
use crate::store::Store;

pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg"];
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

static UPLOAD_TYPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_-]+$").expect("valid upload type regex"));

pub fn validate_type(kind: &str) -> Result<(), String> {
    if UPLOAD_TYPE_RE.is_match(kind) {
        Ok(())
    } else {
        Err(format!("Invalid upload type: {}", kind))
    }
}

/// Lower-cased extension of an original file name, if it is on the allow list.
pub fn allowed_extension(name: &str) -> Result<String, String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("File name is required".to_string());
    }
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .ok_or_else(|| "File has no extension".to_string())?;
    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(format!("File type not allowed: {}", ext))
    }
}

pub fn check_size(len: u64) -> Result<(), String> {
    if len == 0 {
        Err("File is empty".to_string())
    } else if len > MAX_UPLOAD_BYTES {
        Err("File exceeds the 10 MB limit".to_string())
    } else {
        Ok(())
    }
}

/// `base/<kind>/<file>` when both parts are single plain names.
pub fn resolve(base: &Path, kind: &str, file: &str) -> Option<PathBuf> {
    validate_type(kind).ok()?;
    let mut components = Path::new(file).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Some(base.join(kind).join(file)),
        _ => None,
    }
}

/// Removes a stored file, but only when it sits inside the uploads directory.
pub fn remove_if_contained(base: &Path, stored: &str) -> bool {
    let (Ok(root), Ok(target)) = (base.canonicalize(), Path::new(stored).canonicalize()) else {
        return false;
    };
    target.starts_with(&root) && target.is_file() && fs::remove_file(&target).is_ok()
}

/// Deletes `<kind>/<file>` under `base` together with the attachment
/// records serving it. Returns how many records were dropped.
pub fn remove_upload(store: &dyn Store, base: &Path, kind: &str, file: &str) -> Result<usize, String> {
    let path = resolve(base, kind, file).ok_or("File not found")?;
    if !remove_if_contained(base, &path.to_string_lossy()) {
        return Err("File not found".to_string());
    }
    store.attachment_delete_by_url(&format!("/api/uploads/{}/{}", kind, file))
}

#[derive(FromForm)]
pub struct UploadForm<'f> {
    pub file: TempFile<'f>,
}

#[derive(FromForm)]
pub struct BatchUploadForm<'f> {
    pub files: Vec<TempFile<'f>>,
}

#[derive(Debug, Serialize)]
pub struct StoredFile {
    pub name: String,
    pub url: String,
    pub size: u64,
}

fn original_name(file: &TempFile<'_>) -> String {
    file.raw_name()
        .map(|n| n.dangerous_unsafe_unsanitized_raw().to_string())
        .and_then(|raw| {
            Path::new(&raw)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
        })
        .unwrap_or_default()
}

/// Writes one upload to `website/uploads/<kind>/<uuid>.<ext>` and records it.
async fn save(
    store: &dyn Store,
    uploader_id: i64,
    kind: &str,
    file: &mut TempFile<'_>,
) -> Result<Attachment, String> {
    validate_type(kind)?;
    let name = original_name(file);
    let ext = allowed_extension(&name)?;
    let size = file.len();
    check_size(size)?;

    let dir = Path::new(UPLOADS_DIR).join(kind);
    fs::create_dir_all(&dir).map_err(|e| e.to_string())?;
    let filename = format!("{}.{}", uuid::Uuid::new_v4(), ext);
    let dest = dir.join(&filename);
    file.persist_to(&dest).await.map_err(|e| format!("Upload failed: {}", e))?;

    let form = AttachmentForm {
        name,
        path: dest.to_string_lossy().to_string(),
        url: format!("/api/uploads/{}/{}", kind, filename),
        media_type: file.content_type().map(|ct| ct.to_string()),
        suffix: Some(ext.clone()),
        size: Some(size as i64),
        width: None,
        height: None,
        r#type: Some(Attachment::type_for_suffix(&ext).to_string()),
    };
    let id = match store.attachment_create(uploader_id, &form) {
        Ok(id) => id,
        Err(e) => {
            let _ = fs::remove_file(&dest);
            return Err(e);
        }
    };
    store
        .attachment_find_by_id(id)
        .ok_or_else(|| "Attachment not found".to_string())
}

#[post("/uploads/<kind>", data = "<form>")]
pub async fn upload(
    author: AuthorUser,
    store: &State<Arc<dyn Store>>,
    kind: &str,
    mut form: Form<UploadForm<'_>>,
) -> ApiResult {
    let attachment = save(&**store.inner(), author.user.id, kind, &mut form.file)
        .await
        .map_err(reject)?;
    ok(attachment)
}

#[post("/uploads/<kind>/batch", data = "<form>")]
pub async fn upload_batch(
    author: AuthorUser,
    store: &State<Arc<dyn Store>>,
    kind: &str,
    mut form: Form<BatchUploadForm<'_>>,
) -> ApiResult {
    validate_type(kind).map_err(reject)?;
    let mut uploaded = Vec::new();
    let mut failed = Vec::new();
    for file in form.files.iter_mut() {
        let name = original_name(file);
        match save(&**store.inner(), author.user.id, kind, file).await {
            Ok(a) => uploaded.push(a),
            Err(e) => failed.push(json!({"name": name, "error": e})),
        }
    }
    ok(json!({"uploaded": uploaded, "failed": failed}))
}

#[get("/uploads/<kind>")]
pub fn list(_author: AuthorUser, kind: &str) -> ApiResult {
    validate_type(kind).map_err(reject)?;
    let dir = Path::new(UPLOADS_DIR).join(kind);
    let mut files: Vec<StoredFile> = match fs::read_dir(&dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .map(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                StoredFile {
                    url: format!("/api/uploads/{}/{}", kind, name),
                    size: e.metadata().map(|m| m.len()).unwrap_or(0),
                    name,
                }
            })
            .collect(),
        Err(_) => vec![],
    };
    files.sort_by(|a, b| a.name.cmp(&b.name));
    ok(files)
}

#[get("/uploads/<kind>/<file>")]
pub async fn fetch(kind: &str, file: &str) -> Option<NamedFile> {
    let path = resolve(Path::new(UPLOADS_DIR), kind, file)?;
    NamedFile::open(path).await.ok()
}

#[delete("/uploads/<kind>/<file>")]
pub fn delete(_author: AuthorUser, store: &State<Arc<dyn Store>>, kind: &str, file: &str) -> ApiResult {
    let removed = remove_upload(&**store.inner(), Path::new(UPLOADS_DIR), kind, file).map_err(reject)?;
    log::info!("[upload] deleted {}/{} and {} attachment record(s)", kind, file, removed);
    done("File deleted")
}

pub fn routes() -> Vec<rocket::Route> {
    routes![upload, upload_batch, list, fetch, delete]
}
