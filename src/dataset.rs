//! The Fashion-MNIST dataset.
//!
//! Fashion-MNIST is a drop-in replacement for MNIST made of Zalando article images: 70,000 28x28
//! grayscale images in 10 classes, split into 60,000 training images and 10,000 test images.
//!
//! The gzip files are downloaded once from the [Fashion-MNIST mirror](https://github.com/zalandoresearch/fashion-mnist)
//! and decompressed into a cache directory, then decoded from the idx format into memory.

use std::fmt;
use std::fs::{create_dir_all, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use burn::data::dataset::{
    transform::{Mapper, MapperDataset},
    Dataset, InMemDataset,
};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};

use crate::network::download_file_as_bytes;

const URL: &str = "http://fashion-mnist.s3-website.eu-central-1.amazonaws.com/";
const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
const TEST_IMAGES: &str = "t10k-images-idx3-ubyte";
const TEST_LABELS: &str = "t10k-labels-idx1-ubyte";

const IMAGES_MAGIC: u32 = 2051;
const LABELS_MAGIC: u32 = 2049;

/// Image width in pixels.
pub const WIDTH: usize = 28;
/// Image height in pixels.
pub const HEIGHT: usize = 28;
/// Number of article classes.
pub const NUM_CLASSES: usize = 10;

/// Only one thread downloads the dataset files at a time.
static DOWNLOAD_LOCK: Mutex<()> = Mutex::new(());

/// Errors raised while fetching or decoding the dataset.
#[derive(thiserror::Error, Debug)]
pub enum DatasetError {
    /// Reading or writing the cache directory failed.
    #[error("dataset I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote file could not be fetched.
    #[error("failed to download {url}: {source}")]
    Download {
        /// Requested URL.
        url: String,
        /// Transport or HTTP status error.
        source: reqwest::Error,
    },

    /// An idx file does not match the expected layout.
    #[error("malformed idx file {file}: {reason}")]
    Malformed {
        /// Offending file.
        file: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl DatasetError {
    fn malformed(file: &Path, reason: impl Into<String>) -> Self {
        Self::Malformed {
            file: file.display().to_string(),
            reason: reason.into(),
        }
    }
}

/// Dataset partition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Split {
    /// 60,000 training samples.
    Train,
    /// 10,000 held-out samples.
    Test,
}

impl Split {
    fn dir_name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
        }
    }

    fn images_file(&self) -> &'static str {
        match self {
            Split::Train => TRAIN_IMAGES,
            Split::Test => TEST_IMAGES,
        }
    }

    fn labels_file(&self) -> &'static str {
        match self {
            Split::Train => TRAIN_LABELS,
            Split::Test => TEST_LABELS,
        }
    }
}

/// The ten Fashion-MNIST article classes, in label order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FashionClass {
    TShirt,
    Trouser,
    Pullover,
    Dress,
    Coat,
    Sandal,
    Shirt,
    Sneaker,
    Bag,
    AnkleBoot,
}

impl FashionClass {
    /// All classes, indexed by label.
    pub const ALL: [FashionClass; NUM_CLASSES] = [
        FashionClass::TShirt,
        FashionClass::Trouser,
        FashionClass::Pullover,
        FashionClass::Dress,
        FashionClass::Coat,
        FashionClass::Sandal,
        FashionClass::Shirt,
        FashionClass::Sneaker,
        FashionClass::Bag,
        FashionClass::AnkleBoot,
    ];

    /// Returns the class of a label, `None` when the label is out of range.
    pub fn from_label(label: usize) -> Option<Self> {
        Self::ALL.get(label).copied()
    }

    /// The label of the class.
    pub fn label(&self) -> u8 {
        *self as u8
    }

    /// Human readable class name.
    pub fn name(&self) -> &'static str {
        match self {
            FashionClass::TShirt => "T-shirt/top",
            FashionClass::Trouser => "Trouser",
            FashionClass::Pullover => "Pullover",
            FashionClass::Dress => "Dress",
            FashionClass::Coat => "Coat",
            FashionClass::Sandal => "Sandal",
            FashionClass::Shirt => "Shirt",
            FashionClass::Sneaker => "Sneaker",
            FashionClass::Bag => "Bag",
            FashionClass::AnkleBoot => "Ankle boot",
        }
    }
}

impl fmt::Display for FashionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fashion-MNIST item.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FashionMnistItem {
    /// Image as a 2D array of raw intensities (0 to 255).
    pub image: [[f32; WIDTH]; HEIGHT],

    /// Label of the image, in `[0, 9]`.
    pub label: u8,
}

#[derive(Debug, Clone)]
struct FashionMnistItemRaw {
    pub image_bytes: Vec<u8>,
    pub label: u8,
}

struct BytesToImage;

impl Mapper<FashionMnistItemRaw, FashionMnistItem> for BytesToImage {
    fn map(&self, item: &FashionMnistItemRaw) -> FashionMnistItem {
        debug_assert_eq!(item.image_bytes.len(), WIDTH * HEIGHT);

        let mut image = [[0f32; WIDTH]; HEIGHT];
        for (i, pixel) in item.image_bytes.iter().enumerate() {
            image[i / WIDTH][i % WIDTH] = *pixel as f32;
        }

        FashionMnistItem {
            image,
            label: item.label,
        }
    }
}

type MappedDataset =
    MapperDataset<InMemDataset<FashionMnistItemRaw>, BytesToImage, FashionMnistItemRaw>;

/// The Fashion-MNIST dataset, held in memory.
///
/// Train images (u8): 28 * 28 * 60000 = 47.04Mb, test images: 7.84Mb.
pub struct FashionMnistDataset {
    dataset: MappedDataset,
}

impl Dataset<FashionMnistItem> for FashionMnistDataset {
    fn get(&self, index: usize) -> Option<FashionMnistItem> {
        self.dataset.get(index)
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }
}

impl FashionMnistDataset {
    /// Loads the train split, downloading it under `root` on first use.
    pub fn train<P: AsRef<Path>>(root: P) -> Result<Self, DatasetError> {
        Self::new(root, Split::Train)
    }

    /// Loads the test split, downloading it under `root` on first use.
    pub fn test<P: AsRef<Path>>(root: P) -> Result<Self, DatasetError> {
        Self::new(root, Split::Test)
    }

    /// Loads a split, downloading it under `root` on first use.
    pub fn new<P: AsRef<Path>>(root: P, split: Split) -> Result<Self, DatasetError> {
        let split_dir = Self::download(root.as_ref(), split)?;
        Self::from_dir(split_dir, split)
    }

    /// Loads a split from a directory holding the extracted idx files.
    ///
    /// No network access is made.
    pub fn from_dir<P: AsRef<Path>>(dir: P, split: Split) -> Result<Self, DatasetError> {
        let dir = dir.as_ref();
        let images = read_images(&dir.join(split.images_file()))?;
        let labels = read_labels(&dir.join(split.labels_file()))?;

        if images.len() != labels.len() {
            return Err(DatasetError::malformed(
                dir,
                format!("{} images but {} labels", images.len(), labels.len()),
            ));
        }

        let items: Vec<_> = images
            .into_iter()
            .zip(labels)
            .map(|(image_bytes, label)| FashionMnistItemRaw { image_bytes, label })
            .collect();

        log::info!(
            "Loaded {} Fashion-MNIST {} samples from {}",
            items.len(),
            split.dir_name(),
            dir.display()
        );

        let dataset = MapperDataset::new(InMemDataset::new(items), BytesToImage);

        Ok(Self { dataset })
    }

    /// Makes sure the files of a split exist under `root`, returns the split directory.
    fn download(root: &Path, split: Split) -> Result<PathBuf, DatasetError> {
        // A poisoned lock only means another download panicked; the files are checked again.
        let _lock = DOWNLOAD_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let split_dir = root.join("fashion-mnist").join(split.dir_name());
        create_dir_all(&split_dir)?;

        Self::download_file(split.images_file(), &split_dir)?;
        Self::download_file(split.labels_file(), &split_dir)?;

        Ok(split_dir)
    }

    /// Downloads and decompresses one file, unless it is already cached.
    fn download_file(name: &str, dest_dir: &Path) -> Result<PathBuf, DatasetError> {
        let file_name = dest_dir.join(name);

        if !file_name.exists() {
            let url = format!("{URL}{name}.gz");
            let bytes = download_file_as_bytes(&url, name)
                .map_err(|source| DatasetError::Download { url, source })?;

            // Decompress next to the target so a partial write never looks like a cached file.
            let partial = dest_dir.join(format!("{name}.part"));
            let mut output_file = File::create(&partial)?;
            let mut gz_buffer = GzDecoder::new(&bytes[..]);
            std::io::copy(&mut gz_buffer, &mut output_file)?;
            std::fs::rename(&partial, &file_name)?;
        }

        Ok(file_name)
    }
}

/// Writes `items` as the extracted idx files of `split` in the download cache under `root`.
#[cfg(test)]
pub(crate) fn write_cached_split(
    root: &Path,
    split: Split,
    items: &[FashionMnistItem],
) -> std::io::Result<()> {
    let split_dir = root.join("fashion-mnist").join(split.dir_name());
    create_dir_all(&split_dir)?;

    let mut images = Vec::new();
    images.extend(IMAGES_MAGIC.to_be_bytes());
    images.extend((items.len() as u32).to_be_bytes());
    images.extend((HEIGHT as u32).to_be_bytes());
    images.extend((WIDTH as u32).to_be_bytes());
    let mut labels = Vec::new();
    labels.extend(LABELS_MAGIC.to_be_bytes());
    labels.extend((items.len() as u32).to_be_bytes());

    for item in items {
        let pixels = item.image.iter().flatten().map(|pixel| *pixel as u8);
        images.extend(pixels);
        labels.push(item.label);
    }

    std::fs::write(split_dir.join(split.images_file()), images)?;
    std::fs::write(split_dir.join(split.labels_file()), labels)
}

fn read_header(bytes: &[u8], offset: usize) -> Option<u32> {
    let field = bytes.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([field[0], field[1], field[2], field[3]]))
}

/// Reads an idx3 image file, each image is a vector of `WIDTH * HEIGHT` bytes.
fn read_images(path: &Path) -> Result<Vec<Vec<u8>>, DatasetError> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    parse_images(&bytes).map_err(|reason| DatasetError::malformed(path, reason))
}

/// Reads an idx1 label file.
fn read_labels(path: &Path) -> Result<Vec<u8>, DatasetError> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    parse_labels(&bytes).map_err(|reason| DatasetError::malformed(path, reason))
}

fn parse_images(bytes: &[u8]) -> Result<Vec<Vec<u8>>, String> {
    // 16-byte header: magic, count, rows, columns.
    let header = |offset| read_header(bytes, offset).ok_or("truncated header");

    let magic = header(0)?;
    if magic != IMAGES_MAGIC {
        return Err(format!("expected magic number {IMAGES_MAGIC}, found {magic}"));
    }

    let size = header(4)? as usize;
    let rows = header(8)? as usize;
    let cols = header(12)? as usize;
    if rows != HEIGHT || cols != WIDTH {
        return Err(format!("expected {HEIGHT}x{WIDTH} images, found {rows}x{cols}"));
    }

    let payload = &bytes[16..];
    if payload.len() != size * WIDTH * HEIGHT {
        return Err(format!(
            "expected {} bytes of pixels for {size} images, found {}",
            size * WIDTH * HEIGHT,
            payload.len()
        ));
    }

    Ok(payload
        .chunks(WIDTH * HEIGHT)
        .map(|chunk| chunk.to_vec())
        .collect())
}

fn parse_labels(bytes: &[u8]) -> Result<Vec<u8>, String> {
    // 8-byte header: magic, count.
    let header = |offset| read_header(bytes, offset).ok_or("truncated header");

    let magic = header(0)?;
    if magic != LABELS_MAGIC {
        return Err(format!("expected magic number {LABELS_MAGIC}, found {magic}"));
    }

    let size = header(4)? as usize;
    let labels = &bytes[8..];
    if labels.len() != size {
        return Err(format!("expected {size} labels, found {}", labels.len()));
    }

    if let Some(label) = labels.iter().find(|label| **label as usize >= NUM_CLASSES) {
        return Err(format!("label {label} is out of range"));
    }

    Ok(labels.to_vec())
}
