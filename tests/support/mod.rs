//! Shared fixtures for the integration suites.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{DynamicImage, GenericImageView, ImageBuffer, Rgb};
use vario::{
    AssetService, AssetStore, Codec, ImageCodec, ImageFormat, MemoryCache,
    Result, UrlResolver,
};

/// Codec double that counts invocations while delegating to the real codec.
#[derive(Debug, Default)]
pub struct CountingCodec {
    inner: ImageCodec,
    decodes: AtomicUsize,
    encodes: AtomicUsize,
}

impl CountingCodec {
    pub fn decode_count(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }

    pub fn encode_count(&self) -> usize {
        self.encodes.load(Ordering::SeqCst)
    }
}

impl Codec for CountingCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        self.inner.decode(bytes)
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: ImageFormat,
        quality: u8,
    ) -> Result<Vec<u8>> {
        self.encodes.fetch_add(1, Ordering::SeqCst);
        self.inner.encode(image, format, quality)
    }
}

pub struct Harness {
    pub service: Arc<AssetService>,
    pub cache: Arc<MemoryCache>,
    pub codec: Arc<CountingCodec>,
    // Held so the storage root outlives the test.
    pub dir: tempfile::TempDir,
}

pub fn harness() -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(AssetStore::open(dir.path()).expect("open store"));
    let cache = Arc::new(MemoryCache::new());
    let codec = Arc::new(CountingCodec::default());
    let resolver = UrlResolver::new("/assets").expect("resolver");
    let service = Arc::new(AssetService::new(
        store,
        cache.clone(),
        codec.clone(),
        resolver,
    ));
    Harness {
        service,
        cache,
        codec,
        dir,
    }
}

/// A 200x100 gradient, PNG-encoded.
pub fn source_png_200x100() -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(ImageBuffer::from_fn(
        200,
        100,
        |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 96]),
    ));
    let mut buf = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut buf, image::ImageFormat::Png)
        .expect("encode fixture");
    buf.into_inner()
}

pub fn decoded_size(bytes: &[u8]) -> (u32, u32) {
    let image = image::load_from_memory(bytes).expect("decode output");
    (image.width(), image.height())
}
