//! Asset cache.
//!
//! Resolves appearances into decoded frame images. Every frame is fetched and
//! decoded on its own task; completions come back as [`AssetEvent`]s on the
//! cache's ready channel and only become visible once the owner passes them to
//! [`AssetCache::complete`]. Frames finish in any order, so a partially loaded
//! appearance is normal and lookups simply miss until their frame lands.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::Arc,
};

use anyhow::Context;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::RgbaImage;
use plaza_shared::{
    config::ClientConfig,
    model::{Appearance, Direction},
    render::Image,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Fetches the raw bytes behind an image source string.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, src: &str) -> anyhow::Result<Vec<u8>>;
}

/// Handles `data:` URLs, `http(s)://` URLs and paths relative to either an
/// asset base URL or an asset directory.
pub struct DefaultImageSource {
    http: reqwest::Client,
    assets_dir: PathBuf,
    base_url: Option<String>,
}

impl DefaultImageSource {
    pub fn new(assets_dir: impl Into<PathBuf>, base_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            assets_dir: assets_dir.into(),
            base_url,
        }
    }

    pub fn from_config(cfg: &ClientConfig) -> Self {
        Self::new(&cfg.assets_dir, cfg.asset_base_url.clone())
    }

    async fn get(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        let body = response.bytes().await.context("read response body")?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl ImageSource for DefaultImageSource {
    async fn fetch(&self, src: &str) -> anyhow::Result<Vec<u8>> {
        if src.starts_with("data:") {
            return decode_data_url(src);
        }
        if src.starts_with("http://") || src.starts_with("https://") {
            return self.get(src).await;
        }
        if let Some(base) = &self.base_url {
            let url = format!("{}/{}", base.trim_end_matches('/'), src.trim_start_matches('/'));
            return self.get(&url).await;
        }
        let path = self.assets_dir.join(src);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("read {}", path.display()))
    }
}

/// Decodes the payload of a `data:[<mime>][;base64],<data>` URL.
pub fn decode_data_url(url: &str) -> anyhow::Result<Vec<u8>> {
    let rest = url.strip_prefix("data:").context("not a data url")?;
    let (header, data) = rest.split_once(',').context("data url without payload")?;
    if header.ends_with(";base64") {
        STANDARD.decode(data.trim()).context("base64 payload")
    } else {
        Ok(data.as_bytes().to_vec())
    }
}

/// Encodes bytes as a base64 `data:` URL.
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

pub fn decode_image(bytes: &[u8]) -> anyhow::Result<RgbaImage> {
    let img = image::load_from_memory(bytes).context("decode image")?;
    Ok(img.to_rgba8())
}

async fn load_image(source: &dyn ImageSource, src: &str) -> anyhow::Result<Image> {
    let bytes = source.fetch(src).await?;
    let img = tokio::task::spawn_blocking(move || decode_image(&bytes))
        .await
        .context("decode task")??;
    Ok(Arc::new(img))
}

struct FrameKey {
    appearance: String,
    generation: u64,
    direction: Direction,
    index: usize,
}

fn spawn_frame_load(
    source: Arc<dyn ImageSource>,
    tx: mpsc::UnboundedSender<AssetEvent>,
    key: FrameKey,
    src: String,
) {
    tokio::spawn(async move {
        let result = load_image(source.as_ref(), &src).await;
        let _ = tx.send(AssetEvent::Frame {
            appearance: key.appearance,
            generation: key.generation,
            direction: key.direction,
            index: key.index,
            result,
        });
    });
}

/// A finished load, delivered on the ready channel.
#[derive(Debug)]
pub enum AssetEvent {
    Frame {
        appearance: String,
        generation: u64,
        direction: Direction,
        index: usize,
        result: anyhow::Result<Image>,
    },
    Background {
        generation: u64,
        result: anyhow::Result<Image>,
    },
}

#[derive(Debug, Clone)]
enum Slot {
    Pending,
    Ready(Image),
    Failed,
}

impl Slot {
    fn image(&self) -> Option<&Image> {
        match self {
            Slot::Ready(img) => Some(img),
            Slot::Pending | Slot::Failed => None,
        }
    }
}

struct AppearanceAssets {
    appearance: Appearance,
    generation: u64,
    frames: HashMap<(Direction, usize), Slot>,
}

struct BackgroundAsset {
    source: String,
    generation: u64,
    slot: Slot,
}

pub struct AssetCache {
    source: Arc<dyn ImageSource>,
    appearances: HashMap<String, AppearanceAssets>,
    background: Option<BackgroundAsset>,
    next_generation: u64,
    tx: mpsc::UnboundedSender<AssetEvent>,
    rx: mpsc::UnboundedReceiver<AssetEvent>,
}

impl AssetCache {
    pub fn new(source: Arc<dyn ImageSource>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            source,
            appearances: HashMap::new(),
            background: None,
            next_generation: 0,
            tx,
            rx,
        }
    }

    fn generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Starts loading every frame of `appearance` unless the same definition
    /// is already cached. For a cached definition, frames whose earlier load
    /// failed are queued again. Returns whether loads were started.
    ///
    /// Must be called from within a tokio runtime.
    pub fn ensure_loaded(&mut self, appearance: &Appearance) -> bool {
        if let Some(known) = self.appearances.get(&appearance.name) {
            if known.appearance == *appearance {
                return self.retry_failed(appearance);
            }
            debug!(avatar = %appearance.name, "Avatar definition changed, reloading");
        }

        let generation = self.generation();
        let mut frames = HashMap::new();
        for (direction, index, src) in appearance.sources() {
            frames.insert((direction, index), Slot::Pending);
            spawn_frame_load(
                self.source.clone(),
                self.tx.clone(),
                FrameKey {
                    appearance: appearance.name.clone(),
                    generation,
                    direction,
                    index,
                },
                src.to_string(),
            );
        }
        debug!(avatar = %appearance.name, frames = frames.len(), "Loading avatar");

        self.appearances.insert(
            appearance.name.clone(),
            AppearanceAssets {
                appearance: appearance.clone(),
                generation,
                frames,
            },
        );
        true
    }

    fn retry_failed(&mut self, appearance: &Appearance) -> bool {
        let Some(entry) = self.appearances.get_mut(&appearance.name) else {
            return false;
        };
        let mut retried = 0;
        for (direction, index, src) in appearance.sources() {
            let Some(slot) = entry.frames.get_mut(&(direction, index)) else {
                continue;
            };
            if !matches!(slot, Slot::Failed) {
                continue;
            }
            *slot = Slot::Pending;
            retried += 1;
            spawn_frame_load(
                self.source.clone(),
                self.tx.clone(),
                FrameKey {
                    appearance: appearance.name.clone(),
                    generation: entry.generation,
                    direction,
                    index,
                },
                src.to_string(),
            );
        }
        if retried > 0 {
            debug!(avatar = %appearance.name, frames = retried, "Retrying failed avatar frames");
        }
        retried > 0
    }

    /// Starts loading the background map image. A repeat call with the same
    /// source is a no-op.
    pub fn load_background(&mut self, src: &str) -> bool {
        if self.background.as_ref().is_some_and(|bg| bg.source == src) {
            return false;
        }
        let generation = self.generation();
        self.background = Some(BackgroundAsset {
            source: src.to_string(),
            generation,
            slot: Slot::Pending,
        });

        let source = self.source.clone();
        let tx = self.tx.clone();
        let src = src.to_string();
        tokio::spawn(async move {
            let result = load_image(source.as_ref(), &src).await;
            let _ = tx.send(AssetEvent::Background { generation, result });
        });
        true
    }

    /// Waits for the next finished load.
    pub async fn next_event(&mut self) -> Option<AssetEvent> {
        self.rx.recv().await
    }

    /// Installs a finished load. Returns `true` when a new image became
    /// drawable.
    pub fn complete(&mut self, event: AssetEvent) -> bool {
        match event {
            AssetEvent::Frame {
                appearance,
                generation,
                direction,
                index,
                result,
            } => {
                let Some(entry) = self.appearances.get_mut(&appearance) else {
                    return false;
                };
                if entry.generation != generation {
                    debug!(avatar = %appearance, "Dropping stale frame load");
                    return false;
                }
                let slot = match result {
                    Ok(img) => Slot::Ready(img),
                    Err(e) => {
                        warn!(avatar = %appearance, %direction, index, error = %format!("{e:#}"), "Avatar frame failed to load");
                        Slot::Failed
                    }
                };
                let ready = matches!(slot, Slot::Ready(_));
                entry.frames.insert((direction, index), slot);
                ready
            }
            AssetEvent::Background { generation, result } => {
                let Some(bg) = self.background.as_mut() else {
                    return false;
                };
                if bg.generation != generation {
                    return false;
                }
                match result {
                    Ok(img) => {
                        debug!(source = %bg.source, w = img.width(), h = img.height(), "Background loaded");
                        bg.slot = Slot::Ready(img);
                        true
                    }
                    Err(e) => {
                        warn!(source = %bg.source, error = %format!("{e:#}"), "Background failed to load");
                        bg.slot = Slot::Failed;
                        false
                    }
                }
            }
        }
    }

    /// A decoded frame, or `None` while it is not available. West is never
    /// stored; callers mirror east.
    pub fn frame_for(&self, appearance: &str, direction: Direction, index: usize) -> Option<&Image> {
        self.appearances
            .get(appearance)?
            .frames
            .get(&(direction, index))?
            .image()
    }

    /// Length of the frame sequence for a stored direction.
    pub fn frame_count(&self, appearance: &str, direction: Direction) -> usize {
        self.appearances
            .get(appearance)
            .map_or(0, |a| a.appearance.frames.get(direction).len())
    }

    pub fn background(&self) -> Option<&Image> {
        self.background.as_ref()?.slot.image()
    }

    /// Loads started but not yet installed.
    pub fn pending(&self) -> usize {
        let frames = self
            .appearances
            .values()
            .flat_map(|a| a.frames.values())
            .filter(|s| matches!(s, Slot::Pending))
            .count();
        let background = self
            .background
            .as_ref()
            .is_some_and(|bg| matches!(bg.slot, Slot::Pending));
        frames + usize::from(background)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use plaza_shared::model::DirectionFrames;
    use std::io::Cursor;

    /// Serves `<w>x<h>` sources as solid PNGs and fails everything else.
    pub(crate) struct SizedPngSource;

    pub(crate) fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 10, 10, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[async_trait]
    impl ImageSource for SizedPngSource {
        async fn fetch(&self, src: &str) -> anyhow::Result<Vec<u8>> {
            let (w, h) = src
                .split_once('x')
                .and_then(|(w, h)| Some((w.parse().ok()?, h.parse().ok()?)))
                .context("unknown source")?;
            Ok(png(w, h))
        }
    }

    pub(crate) async fn drain(cache: &mut AssetCache) {
        while cache.pending() > 0 {
            let event = cache.next_event().await.unwrap();
            cache.complete(event);
        }
    }

    fn appearance(name: &str, east: &[&str]) -> Appearance {
        Appearance {
            name: name.into(),
            frames: DirectionFrames {
                north: vec!["16x32".into()],
                south: vec!["16x32".into(), "16x32".into()],
                east: east.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    #[test]
    fn data_url_roundtrip() {
        let url = encode_data_url("image/png", b"\x89PNG");
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(decode_data_url(&url).unwrap(), b"\x89PNG");
        assert!(decode_data_url("data:image/png;base64").is_err());
    }

    #[tokio::test]
    async fn loads_all_stored_directions() {
        let mut cache = AssetCache::new(Arc::new(SizedPngSource));
        let knight = appearance("knight", &["20x40"]);
        assert!(cache.ensure_loaded(&knight));
        assert_eq!(cache.pending(), 4);
        drain(&mut cache).await;

        assert!(cache.frame_for("knight", Direction::North, 0).is_some());
        assert!(cache.frame_for("knight", Direction::South, 1).is_some());
        assert_eq!(cache.frame_for("knight", Direction::East, 0).unwrap().width(), 20);
        assert!(cache.frame_for("knight", Direction::West, 0).is_none());
        assert_eq!(cache.frame_count("knight", Direction::South), 2);
    }

    #[tokio::test]
    async fn ensure_loaded_is_idempotent() {
        let mut cache = AssetCache::new(Arc::new(SizedPngSource));
        let knight = appearance("knight", &["20x40"]);
        assert!(cache.ensure_loaded(&knight));
        assert!(!cache.ensure_loaded(&knight));
        drain(&mut cache).await;
        assert!(!cache.ensure_loaded(&knight));
        assert_eq!(cache.pending(), 0);
    }

    #[tokio::test]
    async fn failed_frame_leaves_others_usable() {
        let mut cache = AssetCache::new(Arc::new(SizedPngSource));
        cache.ensure_loaded(&appearance("knight", &["broken"]));
        drain(&mut cache).await;

        assert!(cache.frame_for("knight", Direction::East, 0).is_none());
        assert!(cache.frame_for("knight", Direction::North, 0).is_some());
    }

    /// Fails every fetch until brought up.
    struct OutageSource {
        up: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl ImageSource for OutageSource {
        async fn fetch(&self, src: &str) -> anyhow::Result<Vec<u8>> {
            if !self.up.load(std::sync::atomic::Ordering::SeqCst) {
                anyhow::bail!("asset host unreachable");
            }
            SizedPngSource.fetch(src).await
        }
    }

    #[tokio::test]
    async fn failed_frames_are_retried_on_next_ensure() {
        let source = Arc::new(OutageSource {
            up: std::sync::atomic::AtomicBool::new(false),
        });
        let mut cache = AssetCache::new(source.clone());
        let knight = appearance("knight", &["20x40"]);
        cache.ensure_loaded(&knight);
        drain(&mut cache).await;
        assert!(cache.frame_for("knight", Direction::East, 0).is_none());

        source.up.store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(cache.ensure_loaded(&knight));
        assert_eq!(cache.pending(), 4);
        drain(&mut cache).await;
        assert_eq!(cache.frame_for("knight", Direction::East, 0).unwrap().width(), 20);
        assert!(!cache.ensure_loaded(&knight));
    }

    #[tokio::test]
    async fn changed_definition_discards_stale_loads() {
        let mut cache = AssetCache::new(Arc::new(SizedPngSource));
        cache.ensure_loaded(&appearance("knight", &["20x40"]));
        let first = cache.next_event().await.unwrap();

        assert!(cache.ensure_loaded(&appearance("knight", &["10x10"])));
        assert!(!cache.complete(first));
        drain(&mut cache).await;
        assert_eq!(cache.frame_for("knight", Direction::East, 0).unwrap().width(), 10);
    }

    #[tokio::test]
    async fn background_loads_once() {
        let mut cache = AssetCache::new(Arc::new(SizedPngSource));
        assert!(cache.background().is_none());
        assert!(cache.load_background("64x64"));
        assert!(!cache.load_background("64x64"));
        let event = cache.next_event().await.unwrap();
        assert!(cache.complete(event));
        assert_eq!(cache.background().unwrap().height(), 64);
    }
}
