use axum::extract::multipart::{Field, Multipart, MultipartRejection};
use axum::extract::{Path, State};
use bytes::BytesMut;
use chrono::Utc;
use pageant_core::{GalleryPhoto, StoredPhoto};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResponse, ApiResult};
use crate::media::{
    MediaError, UploadFile, GALLERY_FOLDER, MAX_GALLERY_UPLOAD, MAX_PHOTO_BYTES, PROFILE_FOLDER,
};
use crate::state::AppState;

fn multipart(
    upload: Result<Multipart, MultipartRejection>,
) -> Result<Multipart, ApiError> {
    upload.map_err(|rejection| ApiError::Validation(rejection.body_text()))
}

fn malformed(error: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::Validation(error.body_text())
}

/// Read one file part, stopping as soon as it exceeds [`MAX_PHOTO_BYTES`]
async fn read_file(mut field: Field<'_>) -> Result<UploadFile, ApiError> {
    let content_type = field.content_type().unwrap_or_default().to_string();
    if !content_type.starts_with("image/") {
        return Err(MediaError::NotAnImage.into());
    }
    let file_name = field.file_name().map(str::to_string);

    let mut buffer = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(malformed)? {
        if buffer.len() + chunk.len() > MAX_PHOTO_BYTES {
            return Err(MediaError::TooLarge {
                size: buffer.len() + chunk.len(),
                limit: MAX_PHOTO_BYTES,
            }
            .into());
        }
        buffer.extend_from_slice(&chunk);
    }

    let file = UploadFile {
        file_name,
        content_type,
        bytes: buffer.freeze(),
    };
    file.validate()?;
    Ok(file)
}

pub async fn profile_photo(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    upload: Result<Multipart, MultipartRejection>,
) -> ApiResult<StoredPhoto> {
    let mut form = multipart(upload)?;

    let mut file = None;
    while let Some(field) = form.next_field().await.map_err(malformed)? {
        if field.name() == Some("photo") && file.is_none() {
            file = Some(read_file(field).await?);
        }
    }
    let file = file.ok_or_else(|| ApiError::Validation("Please upload an image".to_string()))?;

    let photo = state.photos.upload(PROFILE_FOLDER, file).await?;

    let stored = photo.clone();
    let saved = state
        .update_account(user.id, move |account| {
            Ok(account.replace_profile_photo(stored, Utc::now()))
        })
        .await;
    let displaced = match saved {
        Ok((_, displaced)) => displaced,
        Err(e) => {
            if let Err(cleanup) = state.photos.delete(&photo.id).await {
                warn!(account_id = %user.id, photo_id = %photo.id, error = %cleanup, "Failed to remove unsaved profile photo");
            }
            return Err(e);
        }
    };

    if let Some(old) = displaced {
        if let Err(e) = state.photos.delete(&old.id).await {
            warn!(account_id = %user.id, photo_id = %old.id, error = %e, "Failed to delete old profile photo");
        }
    }

    info!(account_id = %user.id, photo_id = %photo.id, "Profile photo updated");
    Ok(ApiResponse::ok(photo))
}

pub async fn competition_photos(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    upload: Result<Multipart, MultipartRejection>,
) -> ApiResult<Vec<GalleryPhoto>> {
    let mut form = multipart(upload)?;

    let mut files = Vec::new();
    let mut captions = Vec::new();
    while let Some(field) = form.next_field().await.map_err(malformed)? {
        match field.name() {
            Some("photos") => {
                if files.len() == MAX_GALLERY_UPLOAD {
                    return Err(ApiError::Validation(format!(
                        "At most {MAX_GALLERY_UPLOAD} photos can be uploaded at once"
                    )));
                }
                files.push(read_file(field).await?);
            }
            Some("captions") => captions.push(field.text().await.map_err(malformed)?),
            _ => {}
        }
    }
    if files.is_empty() {
        return Err(ApiError::Validation(
            "Please upload at least one image".to_string(),
        ));
    }

    let mut photos = Vec::with_capacity(files.len());
    for (index, file) in files.into_iter().enumerate() {
        let stored = state.photos.upload(GALLERY_FOLDER, file).await?;
        photos.push(GalleryPhoto {
            id: stored.id,
            url: stored.url,
            caption: captions.get(index).cloned().unwrap_or_default(),
        });
    }

    let added = photos.clone();
    state
        .update_account(user.id, move |account| {
            account.add_gallery_photos(&added, Utc::now());
            Ok(())
        })
        .await?;

    info!(account_id = %user.id, count = photos.len(), "Competition photos uploaded");
    Ok(ApiResponse::ok(photos))
}

pub async fn delete_competition_photo(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(photo_id): Path<String>,
) -> ApiResult<()> {
    if user.gallery_photo(&photo_id).is_none() {
        return Err(ApiError::NotFound("Photo not found".to_string()));
    }

    state.photos.delete(&photo_id).await?;

    state
        .update_account(user.id, move |account| {
            account.remove_gallery_photo(&photo_id, Utc::now())?;
            Ok(())
        })
        .await?;

    Ok(ApiResponse::with_message((), "Photo deleted successfully"))
}
