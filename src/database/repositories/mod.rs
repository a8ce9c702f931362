pub mod image;
pub mod video;

pub use image::ImageRepository;
pub use video::VideoRepository;

use super::{Database, DatabaseError, DbConnection};
use crate::core::fingerprint::{StoredImageRecord, StoredVideoRecord};
use crate::database::models::{NewImage, NewVideo};

pub trait Repository {
    fn database(&self) -> &Database;

    fn get_connection(&self) -> Result<DbConnection<'_>, DatabaseError> {
        self.database().connection()
    }
}

/// Append-only collection of fingerprinted images.
pub trait ImageStore: Send + Sync {
    fn insert_image(&self, image: &NewImage) -> Result<i64, DatabaseError>;

    fn all_images(&self) -> Result<Vec<StoredImageRecord>, DatabaseError>;
}

/// Append-only collection of fingerprinted videos.
pub trait VideoStore: Send + Sync {
    fn insert_video(&self, video: &NewVideo) -> Result<i64, DatabaseError>;

    fn all_videos(&self) -> Result<Vec<StoredVideoRecord>, DatabaseError>;
}
