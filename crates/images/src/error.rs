pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("error while loading or encoding the image (via the `image` crate): {0}")]
	Image(#[from] image::ImageError),
	#[error("there was an i/o error: {0}")]
	Io(#[from] std::io::Error),
	#[error("error while encoding to webp: {0}")]
	WebPEncoding(String),
	#[error("the media type `{0}` is unsupported")]
	Unsupported(String),
	#[error("panicked while encoding <image='{0}'>")]
	Panic(String),
	#[error("the encoding task was dropped before reporting back")]
	TaskDropped,
	#[error("encoder failed: {0}")]
	Encoding(String),
}
