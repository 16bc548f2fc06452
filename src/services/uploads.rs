// src/services/uploads.rs

use std::{
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::LazyLock,
};

use axum::body::Bytes;
use image::{
    ColorType, DynamicImage, ImageFormat, ImageReader, ImageResult,
    codecs::{
        jpeg::JpegEncoder,
        png::{CompressionType, FilterType as PngFilter, PngEncoder},
    },
    imageops::FilterType,
};
use regex::Regex;
use serde::Serialize;
use tokio::{fs, io::AsyncWriteExt};

use crate::{
    config::{MAX_ATTACHMENT_BYTES, MAX_IMAGE_HEIGHT, MAX_IMAGE_WIDTH, MAX_PROOF_IMAGE_BYTES},
    error::AppError,
    models::attachment::AttachmentKind,
};

const MAX_RECORDED_NAME_CHARS: usize = 255;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

const COMPLAINT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "pdf", "doc", "docx", "txt"];
const COMPLAINT_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
];
const PROOF_MIME_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/gif"];

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.-]").expect("static regex"));

/// Where an upload comes from; decides limits, whitelists and namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadContext {
    /// Files a student attaches to a new complaint.
    Complaint,
    /// Proof image an admin attaches when resolving.
    Resolution,
}

impl UploadContext {
    pub fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            Self::Complaint => COMPLAINT_EXTENSIONS,
            Self::Resolution => IMAGE_EXTENSIONS,
        }
    }

    pub fn allowed_mime_types(self) -> &'static [&'static str] {
        match self {
            Self::Complaint => COMPLAINT_MIME_TYPES,
            Self::Resolution => PROOF_MIME_TYPES,
        }
    }

    /// Complaint uploads only log a MIME mismatch.
    pub fn enforces_mime(self) -> bool {
        matches!(self, Self::Resolution)
    }

    pub fn max_bytes(self) -> usize {
        match self {
            Self::Complaint => MAX_ATTACHMENT_BYTES,
            Self::Resolution => MAX_PROOF_IMAGE_BYTES,
        }
    }

    fn subdir(self) -> &'static str {
        match self {
            Self::Complaint => "complaints",
            Self::Resolution => "resolutions",
        }
    }

    fn name_prefix(self) -> &'static str {
        match self {
            Self::Complaint => "",
            Self::Resolution => "resolution_",
        }
    }

    pub fn kind(self) -> AttachmentKind {
        match self {
            Self::Complaint => AttachmentKind::Complaint,
            Self::Resolution => AttachmentKind::Resolution,
        }
    }
}

/// A file part read from a multipart request.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Identity used to build stored file names.
#[derive(Debug, Clone, Copy)]
pub struct Uploader<'a> {
    pub email: &'a str,
    pub user_id: i64,
}

/// Outcome of a successful `store`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub original_filename: String,
    pub stored_filename: String,
    /// Path relative to the upload root, always `/`-separated.
    pub relative_path: String,
    pub size: i64,
    pub file_type: String,
}

/// An upload that passed every check and may be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedUpload {
    pub extension: String,
    pub safe_name: String,
}

/// Lowercase extension after the last dot, if any.
pub fn extension_of(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.trim().to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

pub fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext)
}

/// Reduces a client file name to a filesystem-safe basename.
/// Directory components are dropped, whitespace becomes `_`, and anything
/// outside `[A-Za-z0-9_.-]` is removed.
pub fn sanitize_filename(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let joined = base.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(&joined, "");
    cleaned.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Client file name as recorded with the upload, capped to the column width.
pub fn recorded_name(file_name: &str) -> String {
    file_name.trim().chars().take(MAX_RECORDED_NAME_CHARS).collect()
}

fn email_local_part(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(local, "").replace('.', "_");
    if cleaned.is_empty() { "user".to_string() } else { cleaned }
}

/// Runs every check on an upload without touching the disk.
pub fn check_upload(file: &IncomingFile, ctx: UploadContext) -> Result<CheckedUpload, AppError> {
    let extension = extension_of(&file.file_name)
        .filter(|ext| ctx.allowed_extensions().contains(&ext.as_str()))
        .ok_or_else(|| {
            AppError::invalid(format!(
                "Tipo de archivo no permitido: {}. Permitidos: {}",
                file.file_name,
                ctx.allowed_extensions().join(", ")
            ))
        })?;

    if let Some(content_type) = file.content_type.as_deref() {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if !mime.is_empty() && !ctx.allowed_mime_types().contains(&mime.as_str()) {
            if ctx.enforces_mime() {
                return Err(AppError::invalid(format!(
                    "Tipo de contenido no permitido para {}: {}",
                    file.file_name, mime
                )));
            }
            tracing::warn!(
                "Unexpected content type {} for {}, accepting by extension",
                mime,
                file.file_name
            );
        }
    }

    if file.data.is_empty() {
        return Err(AppError::invalid(format!("El archivo {} está vacío", file.file_name)));
    }
    if file.data.len() > ctx.max_bytes() {
        return Err(AppError::invalid(format!(
            "El archivo {} excede el tamaño máximo de {} MB",
            file.file_name,
            ctx.max_bytes() / (1024 * 1024)
        )));
    }

    let safe_name = sanitize_filename(&file.file_name);
    if safe_name.is_empty() || extension_of(&safe_name).is_none() {
        return Err(AppError::invalid(format!("Nombre de archivo inválido: {}", file.file_name)));
    }

    Ok(CheckedUpload { extension, safe_name })
}

/// Upload directory on local disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn absolute(&self, relative_path: &str) -> PathBuf {
        self.root.join(relative_path)
    }

    /// Validates and writes one upload.
    ///
    /// `discriminator` is the position of the file in its request for
    /// complaint uploads and the ticket id for resolution proofs; together
    /// with the uploader and the current second it makes the stored name unique.
    pub async fn store(
        &self,
        file: &IncomingFile,
        ctx: UploadContext,
        uploader: Uploader<'_>,
        discriminator: i64,
    ) -> Result<StoredFile, AppError> {
        let checked = check_upload(file, ctx)?;

        let stored_filename = format!(
            "{}{}_{}_{}_{}.{}",
            ctx.name_prefix(),
            email_local_part(uploader.email),
            uploader.user_id,
            chrono::Utc::now().timestamp(),
            discriminator,
            checked.extension
        );
        let dir = self.root.join(ctx.subdir());
        let path = dir.join(&stored_filename);

        fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::StorageError(format!("create {}: {}", dir.display(), e)))?;

        if let Err(e) = write_new_file(&path, &file.data).await {
            if e.kind() != std::io::ErrorKind::AlreadyExists {
                let _ = fs::remove_file(&path).await;
            }
            return Err(AppError::StorageError(format!("write {}: {}", path.display(), e)));
        }

        let written = file_len(&path).await?;
        if written != file.data.len() as u64 {
            let _ = fs::remove_file(&path).await;
            return Err(AppError::StorageError(format!(
                "size mismatch for {}: expected {}, found {}",
                path.display(),
                file.data.len(),
                written
            )));
        }

        if is_image_extension(&checked.extension) {
            let image_path = path.clone();
            let ext = checked.extension.clone();
            match tokio::task::spawn_blocking(move || normalize_image(&image_path, &ext)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("Keeping original {}: re-encode failed: {}", path.display(), e),
                Err(e) => tracing::warn!("Keeping original {}: re-encode task failed: {}", path.display(), e),
            }
        }

        let size = file_len(&path).await?;
        tracing::info!("Stored upload {} as {} ({} bytes)", checked.safe_name, stored_filename, size);

        Ok(StoredFile {
            original_filename: recorded_name(&file.file_name),
            relative_path: format!("{}/{}", ctx.subdir(), stored_filename),
            stored_filename,
            size: size as i64,
            file_type: checked.extension,
        })
    }

    /// Best-effort removal of stored files; failures are only logged.
    pub async fn cleanup(&self, files: &[StoredFile]) {
        for file in files {
            let path = self.absolute(&file.relative_path);
            match fs::remove_file(&path).await {
                Ok(()) => tracing::info!("Removed stored file {}", path.display()),
                Err(e) => tracing::warn!("Could not remove {}: {}", path.display(), e),
            }
        }
    }
}

async fn write_new_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    // create_new: a name collision fails instead of overwriting another upload
    let mut out = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    out.write_all(data).await?;
    out.sync_all().await
}

async fn file_len(path: &Path) -> Result<u64, AppError> {
    fs::metadata(path)
        .await
        .map(|m| m.len())
        .map_err(|e| AppError::StorageError(format!("stat {}: {}", path.display(), e)))
}

/// Re-encodes a stored image in place: JPEGs are flattened to RGB and every
/// image is scaled to fit inside the configured bounds.
fn normalize_image(path: &Path, ext: &str) -> ImageResult<()> {
    let mut img = ImageReader::open(path)?.with_guessed_format()?.decode()?;

    if matches!(ext, "jpg" | "jpeg") && img.color() != ColorType::Rgb8 {
        img = DynamicImage::ImageRgb8(img.to_rgb8());
    }
    if img.width() > MAX_IMAGE_WIDTH || img.height() > MAX_IMAGE_HEIGHT {
        img = img.resize(MAX_IMAGE_WIDTH, MAX_IMAGE_HEIGHT, FilterType::Lanczos3);
    }

    let tmp = path.with_extension(format!("{}.tmp", ext));
    if let Err(e) = encode_image(&img, &tmp, ext) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn encode_image(img: &DynamicImage, path: &Path, ext: &str) -> ImageResult<()> {
    let mut out = BufWriter::new(std::fs::File::create(path)?);
    match ext {
        "jpg" | "jpeg" => img.write_with_encoder(JpegEncoder::new_with_quality(&mut out, 85))?,
        "png" => img.write_with_encoder(PngEncoder::new_with_quality(
            &mut out,
            CompressionType::Best,
            PngFilter::Adaptive,
        ))?,
        _ => img.write_to(&mut out, ImageFormat::Gif)?,
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, Rgba};
    use std::io::Cursor;

    const UPLOADER: Uploader<'static> = Uploader {
        email: "ana.ruiz@uni.mx",
        user_id: 5,
    };

    fn incoming(name: &str, content_type: Option<&str>, data: Vec<u8>) -> IncomingFile {
        IncomingFile {
            file_name: name.to_string(),
            content_type: content_type.map(str::to_string),
            data: Bytes::from(data),
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(width, height, Rgb([40u8, 90, 160]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn rgba_png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(width, height, Rgba([40u8, 90, 160, 128]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img).write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn sanitize_strips_paths_and_unsafe_characters() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\x\\foto aula 301.JPG"), "foto_aula_301.JPG");
        assert_eq!(sanitize_filename("Informe día.pdf"), "Informe_da.pdf");
        assert_eq!(sanitize_filename("..."), "");
    }

    #[test]
    fn recorded_name_keeps_client_text_within_column() {
        assert_eq!(recorded_name(" Informe día.pdf "), "Informe día.pdf");
        let long = format!("{}.pdf", "ñ".repeat(300));
        assert_eq!(recorded_name(&long).chars().count(), 255);
    }

    #[test]
    fn extension_is_case_insensitive_after_last_dot() {
        assert_eq!(extension_of("a.tar.GZ").as_deref(), Some("gz"));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of("trailing."), None);
    }

    #[test]
    fn complaint_mime_mismatch_is_advisory() {
        let file = incoming("notas.txt", Some("application/octet-stream"), b"hola".to_vec());
        let checked = check_upload(&file, UploadContext::Complaint).unwrap();
        assert_eq!(checked.extension, "txt");
    }

    #[test]
    fn proof_mime_mismatch_is_rejected() {
        let file = incoming("evidencia.png", Some("application/pdf"), png_bytes(4, 4));
        let err = check_upload(&file, UploadContext::Resolution).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn proof_rejects_documents() {
        let file = incoming("reporte.pdf", Some("application/pdf"), b"%PDF".to_vec());
        assert!(check_upload(&file, UploadContext::Resolution).is_err());
    }

    #[test]
    fn size_limits_depend_on_context() {
        let six_mb = vec![1u8; 6 * 1024 * 1024];
        let doc = incoming("big.txt", None, six_mb.clone());
        assert!(check_upload(&doc, UploadContext::Complaint).is_ok());
        let proof = incoming("big.jpg", Some("image/jpeg"), six_mb);
        assert!(check_upload(&proof, UploadContext::Resolution).is_err());

        let empty = incoming("vacio.txt", None, Vec::new());
        assert!(check_upload(&empty, UploadContext::Complaint).is_err());
    }

    #[test]
    fn name_that_sanitizes_away_is_rejected() {
        let file = incoming("ñññ.pdf", None, b"%PDF".to_vec());
        // "ñññ.pdf" sanitizes to "pdf" which has no extension left
        assert!(check_upload(&file, UploadContext::Complaint).is_err());
    }

    #[tokio::test]
    async fn disallowed_extension_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let file = incoming("script.exe", None, b"MZ".to_vec());

        let err = store.store(&file, UploadContext::Complaint, UPLOADER, 1).await.unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(!dir.path().join("complaints").exists());
    }

    #[tokio::test]
    async fn stores_document_under_generated_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let file = incoming("Acta de hechos.PDF", Some("application/pdf"), b"%PDF-1.4 test".to_vec());

        let stored = store.store(&file, UploadContext::Complaint, UPLOADER, 2).await.unwrap();

        assert_eq!(stored.file_type, "pdf");
        assert_eq!(stored.original_filename, "Acta de hechos.PDF");
        assert_eq!(stored.size, 13);
        assert!(stored.stored_filename.starts_with("ana_ruiz_5_"));
        assert!(stored.stored_filename.ends_with("_2.pdf"));
        assert_eq!(stored.relative_path, format!("complaints/{}", stored.stored_filename));
        let on_disk = std::fs::read(store.absolute(&stored.relative_path)).unwrap();
        assert_eq!(on_disk, b"%PDF-1.4 test");
    }

    #[tokio::test]
    async fn large_images_are_scaled_within_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let file = incoming("pasillo.png", Some("image/png"), png_bytes(2400, 600));

        let stored = store.store(&file, UploadContext::Complaint, UPLOADER, 1).await.unwrap();

        let (w, h) = image::image_dimensions(store.absolute(&stored.relative_path)).unwrap();
        assert_eq!((w, h), (1920, 480));
        let on_disk = std::fs::metadata(store.absolute(&stored.relative_path)).unwrap().len();
        assert_eq!(stored.size as u64, on_disk);
    }

    #[tokio::test]
    async fn jpeg_named_uploads_are_flattened_to_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let file = incoming("foto.jpg", Some("image/jpeg"), rgba_png_bytes(32, 16));

        let stored = store.store(&file, UploadContext::Resolution, UPLOADER, 42).await.unwrap();

        assert!(stored.stored_filename.starts_with("resolution_ana_ruiz_5_"));
        assert!(stored.stored_filename.ends_with("_42.jpg"));
        let img = image::open(store.absolute(&stored.relative_path)).unwrap();
        assert_eq!(img.color(), ColorType::Rgb8);
        assert_eq!((img.width(), img.height()), (32, 16));
    }

    #[tokio::test]
    async fn undecodable_image_is_kept_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let file = incoming("roto.png", Some("image/png"), b"not really a png".to_vec());

        let stored = store.store(&file, UploadContext::Complaint, UPLOADER, 1).await.unwrap();

        assert_eq!(stored.size, 16);
        let on_disk = std::fs::read(store.absolute(&stored.relative_path)).unwrap();
        assert_eq!(on_disk, b"not really a png");
    }

    #[tokio::test]
    async fn same_name_twice_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let file = incoming("a.txt", None, b"uno".to_vec());

        let first = store.store(&file, UploadContext::Complaint, UPLOADER, 9).await.unwrap();
        let second = store.store(&file, UploadContext::Complaint, UPLOADER, 9).await;

        // only collides when both land in the same second
        if let Err(e) = second {
            assert!(matches!(e, AppError::StorageError(_)));
            let on_disk = std::fs::read(store.absolute(&first.relative_path)).unwrap();
            assert_eq!(on_disk, b"uno");
        }
    }

    #[tokio::test]
    async fn cleanup_removes_files_and_tolerates_missing_ones() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let file = incoming("a.txt", None, b"uno".to_vec());
        let stored = store.store(&file, UploadContext::Complaint, UPLOADER, 1).await.unwrap();
        let missing = StoredFile {
            relative_path: "complaints/ghost.txt".to_string(),
            ..stored.clone()
        };

        store.cleanup(&[stored.clone(), missing]).await;

        assert!(!store.absolute(&stored.relative_path).exists());
    }
}
