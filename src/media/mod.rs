pub mod chunking;
pub mod ffmpeg;
