use image::DynamicImage;
use image_hasher::{HashAlg, Hasher, HasherConfig};
use std::path::Path;

use super::{FingerprintError, FingerprintSource, OcrService};
use crate::core::fingerprint::{Hash, ImageHashSet};

/// Side length, in bits, of every hash grid.
pub const DEFAULT_HASH_SIZE: u32 = 16;

const IMAGE_EXTENSIONS: [&str; 6] = [".png", ".jpg", ".jpeg", ".bmp", ".gif", ".svg"];

/// Whether `filename` looks like an image we can fingerprint.
///
/// Also accepts names with `.jpg` in the middle, which is how some hosts
/// serve resized copies (`photo.jpg:large`).
pub fn is_image(filename: &str) -> bool {
    let name = filename.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) || name.contains(".jpg")
}

/// Computes the three image hashes with `image_hasher` and delegates text
/// extraction to an [`OcrService`].
pub struct PerceptualService {
    perceptual: Hasher,
    horizontal: Hasher,
    vertical: Hasher,
    ocr: OcrService,
}

impl PerceptualService {
    pub fn new(hash_size: u32, ocr: OcrService) -> Self {
        let perceptual = HasherConfig::new()
            .hash_size(hash_size, hash_size)
            .hash_alg(HashAlg::Median)
            .preproc_dct()
            .to_hasher();
        let horizontal = HasherConfig::new()
            .hash_size(hash_size, hash_size)
            .hash_alg(HashAlg::Gradient)
            .to_hasher();
        let vertical = HasherConfig::new()
            .hash_size(hash_size, hash_size)
            .hash_alg(HashAlg::VertGradient)
            .to_hasher();

        Self {
            perceptual,
            horizontal,
            vertical,
            ocr,
        }
    }

    pub fn hash_dynamic(&self, image: &DynamicImage) -> ImageHashSet {
        ImageHashSet::new(
            Hash::from_bytes(self.perceptual.hash_image(image).as_bytes()),
            Hash::from_bytes(self.horizontal.hash_image(image).as_bytes()),
            Hash::from_bytes(self.vertical.hash_image(image).as_bytes()),
        )
    }

    pub fn horizontal_dynamic(&self, image: &DynamicImage) -> Hash {
        Hash::from_bytes(self.horizontal.hash_image(image).as_bytes())
    }

    fn open(path: &Path) -> Result<DynamicImage, FingerprintError> {
        Ok(image::ImageReader::open(path)?.with_guessed_format()?.decode()?)
    }
}

impl Default for PerceptualService {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_SIZE, OcrService::default())
    }
}

impl FingerprintSource for PerceptualService {
    fn hash_image(&self, path: &Path) -> Result<ImageHashSet, FingerprintError> {
        let image = Self::open(path)?;
        Ok(self.hash_dynamic(&image))
    }

    fn hash_frame(&self, path: &Path) -> Result<Hash, FingerprintError> {
        let image = Self::open(path)?;
        Ok(self.horizontal_dynamic(&image))
    }

    fn ocr_text(&self, path: &Path) -> Result<String, FingerprintError> {
        self.ocr.extract_text(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::similarity::hash_similarity;
    use image::{GrayImage, Luma};
    use tempfile::TempDir;

    fn gradient(width: u32, height: u32, invert: bool) -> DynamicImage {
        let img = GrayImage::from_fn(width, height, |x, y| {
            let v = ((x * 255 / width.max(1)) + (y * 64 / height.max(1))).min(255) as u8;
            Luma([if invert { 255 - v } else { v }])
        });
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn test_is_image() {
        assert!(is_image("meme.PNG"));
        assert!(is_image("photo.jpeg"));
        assert!(is_image("photo.jpg:large"));
        assert!(is_image("vector.svg"));
        assert!(!is_image("clip.mp4"));
        assert!(!is_image("notes.txt"));
    }

    #[test]
    fn test_hashes_are_256_bit_hex() {
        let service = PerceptualService::default();
        let hashes = service.hash_dynamic(&gradient(128, 96, false));

        for hash in hashes.as_array() {
            assert_eq!(hash.len(), 64);
            assert!(hash.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_resized_copy_scores_higher_than_inverted() {
        let service = PerceptualService::default();
        let original = service.hash_dynamic(&gradient(256, 192, false));
        let resized = service.hash_dynamic(&gradient(128, 96, false));
        let inverted = service.hash_dynamic(&gradient(256, 192, true));

        let same = hash_similarity(&original.horizontal, &resized.horizontal).unwrap();
        let other = hash_similarity(&original.horizontal, &inverted.horizontal).unwrap();
        assert!(same > other, "resized {} vs inverted {}", same, other);
    }

    #[test]
    fn test_hash_image_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("frame.png");
        gradient(64, 64, false).save(&path).unwrap();

        let service = PerceptualService::default();
        let from_file = service.hash_frame(&path).unwrap();
        let hashes = service.hash_image(&path).unwrap();
        assert_eq!(from_file, hashes.horizontal);
    }

    #[test]
    fn test_unreadable_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();

        let service = PerceptualService::default();
        assert!(service.hash_image(&path).is_err());
        assert!(service
            .hash_image(&temp_dir.path().join("missing.png"))
            .is_err());
    }
}
