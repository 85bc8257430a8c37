//! End-to-end behavior of the variation pipeline: idempotence,
//! single-flight, geometry, and cache/storage reconciliation.

mod support;

use support::{decoded_size, harness, source_png_200x100};
use vario::cache::key;
use vario::{CropMode, Error, ImageFormat, TransformSpec};

fn fill_50() -> TransformSpec {
    TransformSpec::new(50, 50, CropMode::Fill, ImageFormat::Png)
}

#[tokio::test]
async fn repeated_fetches_transform_exactly_once() {
    let h = harness();
    let record = h.service.upload(&source_png_200x100(), None).await.unwrap();
    let decodes_after_upload = h.codec.decode_count();

    let first = h.service.fetch_variation(&record.id, &fill_50()).await.unwrap();
    let second = h.service.fetch_variation(&record.id, &fill_50()).await.unwrap();

    assert_eq!(first.bytes, second.bytes);
    assert_eq!(first.key, second.key);
    // One decode of the original, one encode of the variation; the second
    // fetch was a cache hit.
    assert_eq!(h.codec.decode_count(), decodes_after_upload + 1);
    assert_eq!(h.codec.encode_count(), 1);
}

#[tokio::test]
async fn concurrent_fetches_are_single_flight() {
    let h = harness();
    let record = h.service.upload(&source_png_200x100(), None).await.unwrap();
    let decodes_after_upload = h.codec.decode_count();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = h.service.clone();
        let id = record.id.clone();
        handles.push(tokio::spawn(async move {
            service.fetch_variation(&id, &fill_50()).await
        }));
    }

    let mut outputs = Vec::new();
    for handle in handles {
        outputs.push(handle.await.unwrap().unwrap().bytes);
    }

    for bytes in &outputs {
        assert_eq!(bytes, &outputs[0]);
    }
    assert_eq!(h.codec.decode_count(), decodes_after_upload + 1);
    assert_eq!(h.codec.encode_count(), 1);
}

#[tokio::test]
async fn fill_and_fit_geometry_through_the_pipeline() {
    let h = harness();
    let record = h.service.upload(&source_png_200x100(), None).await.unwrap();

    let filled = h.service.fetch_variation(&record.id, &fill_50()).await.unwrap();
    assert_eq!(decoded_size(&filled.bytes), (50, 50));

    let fit = TransformSpec::new(50, 50, CropMode::Fit, ImageFormat::Png);
    let fitted = h.service.fetch_variation(&record.id, &fit).await.unwrap();
    assert_eq!(decoded_size(&fitted.bytes), (50, 25));

    // Distinct specs, distinct keys, both persisted.
    assert_ne!(filled.key, fitted.key);
    assert_eq!(h.cache.len(), 2);
}

#[tokio::test]
async fn evicted_cache_entries_are_refilled_from_storage() {
    let h = harness();
    let record = h.service.upload(&source_png_200x100(), None).await.unwrap();
    let spec = fill_50();

    let first = h.service.fetch_variation(&record.id, &spec).await.unwrap();
    let encodes = h.codec.encode_count();

    // Simulate eviction: storage still holds the variation.
    use vario::VariationCache;
    let derived = key::derive(&record.id, &spec);
    h.cache.remove(&derived).await;
    assert_eq!(h.cache.len(), 0);

    let again = h.service.fetch_variation(&record.id, &spec).await.unwrap();
    assert_eq!(again.bytes, first.bytes);
    // Served from disk, not recomputed, and the cache is warm again.
    assert_eq!(h.codec.encode_count(), encodes);
    assert_eq!(h.cache.len(), 1);
}

#[tokio::test]
async fn transform_failures_propagate_and_are_never_cached() {
    let h = harness();
    let record = h.service.upload(&source_png_200x100(), None).await.unwrap();

    let out_of_bounds = TransformSpec::new(
        40,
        40,
        CropMode::Region {
            x: 150,
            y: 0,
            width: 100,
            height: 50,
        },
        ImageFormat::Png,
    );

    for _ in 0..2 {
        match h.service.fetch_variation(&record.id, &out_of_bounds).await {
            Err(Error::InvalidTransform(_)) => {}
            other => panic!("expected InvalidTransform, got {other:?}"),
        }
    }
    assert!(h.cache.is_empty());

    // The asset itself is untouched; a valid spec still works.
    let ok = h.service.fetch_variation(&record.id, &fill_50()).await.unwrap();
    assert_eq!(decoded_size(&ok.bytes), (50, 50));
}

#[tokio::test]
async fn unknown_asset_is_not_found() {
    let h = harness();
    let ghost = vario::AssetId::parse("no-such-asset").unwrap();
    assert!(matches!(
        h.service.fetch_variation(&ghost, &fill_50()).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn variation_urls_are_sharded_under_the_root() {
    let h = harness();
    let record = h.service.upload(&source_png_200x100(), None).await.unwrap();
    let served = h.service.fetch_variation(&record.id, &fill_50()).await.unwrap();

    assert!(served.url.starts_with("/assets/"));
    assert!(served.url.ends_with(&format!("{}.png", served.key)));
    // Root + two shard levels + file name.
    assert_eq!(served.url.matches('/').count(), 4);
}
