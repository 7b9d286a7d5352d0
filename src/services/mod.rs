pub mod file;
pub mod media;
pub mod repository;
pub mod rollback;
pub mod validator;

pub use file::MediaService;
pub use media::{ImageProcessor, NearestNeighbor, ThumbnailFormat, ThumbnailScaler};
pub use repository::FileRepository;
pub use rollback::Rollback;
pub use validator::{is_image_file, UploadValidator};
