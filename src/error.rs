/// Errors from the collaborators around the pipeline: configuration and asset loading.
///
/// The pipeline itself never fails; misuse of it panics.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Config(#[from] ron::error::SpannedError),
    #[error("OBJ load error: {0}")]
    Obj(#[from] obj::ObjError),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("no shader named {0:?}")]
    UnknownShader(String),
    #[error("no display buffer named {0:?}")]
    UnknownDisplayBuffer(String),
}

pub type Result<T> = std::result::Result<T, Error>;
