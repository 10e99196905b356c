//! Raw S3 upload calls. Errors come back as display strings with the SDK
//! error context already rendered; [`super::S3Store`] attaches the path,
//! bucket and key.

use std::path::Path;

use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use aws_smithy_types::byte_stream::Length;
use tracing::{debug, warn};

/// Size of every part but the last one in a multipart upload.
pub const CHUNK_SIZE: u64 = 1024 * 1024 * 5;
/// S3 limit on the number of parts.
pub const MAX_CHUNKS: u64 = 10000;

pub async fn upload_file(
    client: &Client,
    bucket: &str,
    key: &str,
    path: &Path,
) -> Result<(), String> {
    let body = ByteStream::from_path(path)
        .await
        .map_err(|e| e.to_string())?;

    client
        .put_object()
        .bucket(bucket)
        .key(key)
        .body(body)
        .send()
        .await
        .map_err(|e| DisplayErrorContext(e).to_string())?;
    Ok(())
}

/// Returns `(chunk_count, size_of_last_chunk)` for a file of `file_size` bytes.
pub fn chunk_layout(file_size: u64) -> Result<(u64, u64), String> {
    if file_size == 0 {
        return Err("cannot split an empty file into parts".to_string());
    }
    let mut chunk_count = (file_size / CHUNK_SIZE) + 1;
    let mut size_of_last_chunk = file_size % CHUNK_SIZE;
    if size_of_last_chunk == 0 {
        size_of_last_chunk = CHUNK_SIZE;
        chunk_count -= 1;
    }
    if chunk_count > MAX_CHUNKS {
        return Err(format!(
            "{file_size} bytes needs {chunk_count} parts, more than {MAX_CHUNKS}"
        ));
    }
    Ok((chunk_count, size_of_last_chunk))
}

pub async fn upload_parts(
    client: &Client,
    bucket: &str,
    key: &str,
    path: &Path,
    file_size: u64,
) -> Result<(), String> {
    let (chunk_count, size_of_last_chunk) = chunk_layout(file_size)?;

    let multipart_upload_res = client
        .create_multipart_upload()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| DisplayErrorContext(e).to_string())?;
    let upload_id = multipart_upload_res
        .upload_id()
        .ok_or("create multipart upload returned no upload id")?
        .to_string();
    debug!(key, upload_id = %upload_id, chunk_count, "started multipart upload");

    let sent = send_parts(
        client,
        bucket,
        key,
        path,
        &upload_id,
        chunk_count,
        size_of_last_chunk,
    )
    .await;
    let upload_parts = match sent {
        Ok(parts) => parts,
        Err(message) => {
            // leave no orphaned parts behind
            if let Err(e) = client
                .abort_multipart_upload()
                .bucket(bucket)
                .key(key)
                .upload_id(&upload_id)
                .send()
                .await
            {
                warn!(
                    key,
                    upload_id = %upload_id,
                    "failed to abort multipart upload: {}",
                    DisplayErrorContext(e)
                );
            }
            return Err(message);
        }
    };

    let completed_multipart_upload = CompletedMultipartUpload::builder()
        .set_parts(Some(upload_parts))
        .build();

    client
        .complete_multipart_upload()
        .bucket(bucket)
        .key(key)
        .multipart_upload(completed_multipart_upload)
        .upload_id(&upload_id)
        .send()
        .await
        .map_err(|e| DisplayErrorContext(e).to_string())?;

    Ok(())
}

async fn send_parts(
    client: &Client,
    bucket: &str,
    key: &str,
    path: &Path,
    upload_id: &str,
    chunk_count: u64,
    size_of_last_chunk: u64,
) -> Result<Vec<CompletedPart>, String> {
    let mut upload_parts: Vec<CompletedPart> = Vec::new();

    for chunk_index in 0..chunk_count {
        let this_chunk = if chunk_count - 1 == chunk_index {
            size_of_last_chunk
        } else {
            CHUNK_SIZE
        };
        let stream = ByteStream::read_from()
            .path(path)
            .offset(chunk_index * CHUNK_SIZE)
            .length(Length::Exact(this_chunk))
            .build()
            .await
            .map_err(|e| e.to_string())?;
        // Chunk index needs to start at 0, but part numbers start at 1.
        let part_number = (chunk_index as i32) + 1;
        let upload_part_res = client
            .upload_part()
            .key(key)
            .bucket(bucket)
            .upload_id(upload_id)
            .body(stream)
            .part_number(part_number)
            .send()
            .await
            .map_err(|e| DisplayErrorContext(e).to_string())?;

        upload_parts.push(
            CompletedPart::builder()
                .e_tag(upload_part_res.e_tag.unwrap_or_default())
                .part_number(part_number)
                .build(),
        );
    }

    Ok(upload_parts)
}
