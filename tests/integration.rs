use image::{DynamicImage, ImageFormat, RgbImage};
use image_handler::{
    app::{App, AppServices},
    config::ImageConfig,
    image::{ImageProcessor, MockImageProcessor},
    models::{SizeMap, StoredImage, UploadRequest, VariantSpec},
    paths::{resolve, ImageLocation, Variant},
    storage::{Disks, LocalStorage, MockStorage, StorageService},
    Error,
};
use pretty_assertions::assert_eq;
use std::io::Cursor;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

const PNG_HEADER: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

fn config(widths: &[u32]) -> ImageConfig {
    ImageConfig {
        widths: VariantSpec::new(widths.iter().copied()).unwrap(),
        ..ImageConfig::default()
    }
}

fn mock_app(storage: &MockStorage, images: MockImageProcessor, widths: &[u32]) -> App {
    App::with_services(
        AppServices {
            disks: Disks::new().with_disk("disk1", Arc::new(storage.clone())),
            images: Arc::new(images),
        },
        config(widths),
        "disk1".to_string(),
    )
    .unwrap()
}

fn location() -> ImageLocation {
    ImageLocation::new("store7", "product", "disk1")
}

fn encode_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

async fn assert_all_blobs(storage: &dyn StorageService, stored: &StoredImage, present: bool) {
    let loc = location();
    assert_eq!(
        storage
            .exists(&resolve(&loc, Variant::Original, &stored.name).key)
            .await
            .unwrap(),
        present
    );
    for (width, _) in stored.sizes.iter() {
        let key = resolve(&loc, Variant::Width(width), &stored.name).key;
        assert_eq!(storage.exists(&key).await.unwrap(), present, "{}", key);
    }
}

#[tokio::test]
async fn test_example_1200x900_sizes_in_descending_order() {
    let storage = MockStorage::new();
    let app = mock_app(&storage, MockImageProcessor::new(), &[200, 800, 400]);

    let stored = app
        .upload(UploadRequest::new(PNG_HEADER.to_vec(), location()).with_thumbnails(true))
        .await
        .unwrap();

    assert_eq!(
        stored.sizes.iter().collect::<Vec<_>>(),
        vec![(800, 600), (400, 300), (200, 150)]
    );
    assert_eq!(
        serde_json::to_string(&stored.sizes).unwrap(),
        r#"{"800":600,"400":300,"200":150}"#
    );
    assert_all_blobs(&storage, &stored, true).await;
}

#[tokio::test]
async fn test_upload_then_delete_leaves_no_residue() {
    let storage = MockStorage::new();
    let app = mock_app(&storage, MockImageProcessor::new(), &[640, 320, 160]);

    let stored = app
        .upload(UploadRequest::new(PNG_HEADER.to_vec(), location()).with_thumbnails(true))
        .await
        .unwrap();
    assert_eq!(storage.get_files().len(), 4);

    assert_ok!(app.delete(&stored.name, &location(), Some(&stored.sizes)).await);
    assert!(storage.get_files().is_empty());

    // Second delete of the same image is a no-op.
    assert_ok!(app.delete(&stored.name, &location(), Some(&stored.sizes)).await);
}

#[tokio::test]
async fn test_delete_example_issues_four_calls() {
    let storage = MockStorage::new();
    let app = mock_app(&storage, MockImageProcessor::new(), &[800, 400, 200]);
    let sizes: SizeMap = serde_json::from_str(r#"{"800":600,"400":300,"200":150}"#).unwrap();

    app.delete("product_123_ab12cd34.jpg", &location(), Some(&sizes))
        .await
        .unwrap();

    assert_eq!(
        storage.get_deletes(),
        vec![
            "store7/product/original/product_123_ab12cd34.jpg",
            "store7/product/w800/product_123_ab12cd34.jpg",
            "store7/product/w400/product_123_ab12cd34.jpg",
            "store7/product/w200/product_123_ab12cd34.jpg",
        ]
    );
}

#[tokio::test]
async fn test_narrow_image_writes_nothing() {
    let storage = MockStorage::new();
    let app = mock_app(
        &storage,
        MockImageProcessor::new().with_dimensions(499, 800),
        &[800, 400],
    );

    let err = app
        .upload(UploadRequest::new(PNG_HEADER.to_vec(), location()).with_thumbnails(true))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TooNarrow { actual: 499, min: 500 }));
    assert_eq!(storage.get_write_count(), 0);
}

#[tokio::test]
async fn test_failed_upload_keeps_no_orphans() {
    let storage = MockStorage::new().with_write_failure("/w200/");
    let app = mock_app(&storage, MockImageProcessor::new(), &[800, 400, 200]);

    let err = app
        .upload(UploadRequest::new(PNG_HEADER.to_vec(), location()).with_thumbnails(true))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::VariantWriteFailed { width: 200, .. }));
    assert!(storage.get_files().is_empty());
}

#[tokio::test]
async fn test_concurrent_uploads_do_not_collide() {
    let storage = MockStorage::new();
    let app = Arc::new(mock_app(&storage, MockImageProcessor::new(), &[400]));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let app = Arc::clone(&app);
        handles.push(tokio::spawn(async move {
            app.upload(UploadRequest::new(PNG_HEADER.to_vec(), location()).with_thumbnails(true))
                .await
                .unwrap()
        }));
    }

    let mut names = std::collections::HashSet::new();
    for handle in handles {
        names.insert(handle.await.unwrap().name);
    }

    assert_eq!(names.len(), 16);
    assert_eq!(storage.get_files().len(), 32);
}

#[tokio::test]
async fn test_local_disk_round_trip_with_real_images() {
    let dir = tempfile::tempdir().unwrap();
    let local = LocalStorage::new(dir.path(), "https://img.test".to_string())
        .await
        .unwrap();
    let probe = local.clone();

    let app = App::with_services(
        AppServices {
            disks: Disks::new().with_disk("disk1", Arc::new(local)),
            images: Arc::new(ImageProcessor::new(85)),
        },
        ImageConfig {
            min_width: 300,
            ..config(&[160, 320])
        },
        "disk1".to_string(),
    )
    .unwrap();

    let stored = app
        .upload(UploadRequest::new(encode_png(640, 480), location()).with_thumbnails(true))
        .await
        .unwrap();

    assert!(stored.name.starts_with("product_") && stored.name.ends_with(".png"));
    assert_eq!(stored.url, format!("https://img.test/{}", stored.path));
    assert_eq!(stored.sizes.iter().collect::<Vec<_>>(), vec![(320, 240), (160, 120)]);
    assert_all_blobs(&probe, &stored, true).await;

    let variant = std::fs::read(
        dir.path()
            .join(resolve(&location(), Variant::Width(160), &stored.name).key),
    )
    .unwrap();
    let decoded = image::load_from_memory_with_format(&variant, ImageFormat::Png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (160, 120));

    app.delete_record(&stored.record(), &location()).await.unwrap();
    assert_all_blobs(&probe, &stored, false).await;
}

#[tokio::test]
async fn test_real_processor_rejects_non_images() {
    let storage = MockStorage::new();
    let app = App::with_services(
        AppServices {
            disks: Disks::new().with_disk("disk1", Arc::new(storage.clone())),
            images: Arc::new(ImageProcessor::default()),
        },
        ImageConfig::default(),
        "disk1".to_string(),
    )
    .unwrap();

    let result = app
        .upload(UploadRequest::new(b"<html></html>".to_vec(), location()))
        .await;

    assert_err!(&result);
    assert!(matches!(result, Err(Error::NotAnImage)));
    assert_eq!(storage.get_write_count(), 0);
}

#[tokio::test]
async fn test_undecodable_image_is_rolled_back() {
    let storage = MockStorage::new();
    let app = App::with_services(
        AppServices {
            disks: Disks::new().with_disk("disk1", Arc::new(storage.clone())),
            images: Arc::new(ImageProcessor::default()),
        },
        ImageConfig::default(),
        "disk1".to_string(),
    )
    .unwrap();

    // Header and dimensions survive, pixel data does not.
    let mut truncated = encode_png(640, 480);
    truncated.truncate(60);

    let err = app
        .upload(UploadRequest::new(truncated, location()).with_thumbnails(true))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Image(_)));
    assert_eq!(storage.get_write_count(), 1);
    assert_eq!(storage.get_delete_count(), 4);
    assert!(storage.get_files().is_empty());
}
